use std::num::NonZeroUsize;
use std::sync::Mutex;

use lru::LruCache;
use once_cell::sync::Lazy;

use crate::constants::{self, Endianness};
use crate::dtypes::{self, DtypeName};
use crate::result::{Error, Result};

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Token {
    pub name: DtypeName,
    pub length: Option<u32>,
    pub value: Option<String>,
}

impl Token {
    pub fn is_stretchy(&self) -> bool {
        let def = self.name.definition();
        self.length.is_none()
            && self.value.is_none()
            && !*def.variable_length()
            && def.allowed().only_one().is_none()
            && self.name != DtypeName::Pad
    }
}

#[derive(Debug, Clone, Default)]
pub(crate) struct TokenList {
    pub tokens: Vec<Token>,
}

impl TokenList {
    pub fn stretchy_count(&self) -> usize {
        self.tokens.iter().filter(|t| t.is_stretchy()).count()
    }
}

static PARSE_CACHE: Lazy<Mutex<LruCache<String, TokenList>>> = Lazy::new(|| {
    Mutex::new(LruCache::new(
        NonZeroUsize::new(constants::CACHE_SIZE).expect("cache size is non-zero"),
    ))
});

pub(crate) fn tokenize(fmt: &str) -> Result<TokenList> {
    if let Ok(mut cache) = PARSE_CACHE.lock() {
        if let Some(hit) = cache.get(fmt) {
            return Ok(hit.clone());
        }
    }
    let expanded = expand_brackets(fmt)?;
    let mut tokens = Vec::new();
    for item in expanded.split(',') {
        let item: String = item.chars().filter(|c| !c.is_whitespace()).collect();
        if item.is_empty() {
            continue;
        }
        parse_item(&item, &mut tokens)?;
    }
    let list = TokenList { tokens };
    if let Ok(mut cache) = PARSE_CACHE.lock() {
        cache.put(fmt.to_owned(), list.clone());
    }
    Ok(list)
}

pub(crate) fn expand_brackets(fmt: &str) -> Result<String> {
    let mut s = fmt.to_owned();
    loop {
        let Some(open) = s.find('(') else {
            return Ok(s);
        };
        // The factor is the digit run directly before the '*('.
        let head = &s[..open];
        let star = head
            .trim_end()
            .strip_suffix('*')
            .ok_or_else(|| Error::value(format!("could not parse bracketed token in '{fmt}'")))?
            .trim_end();
        let digits_at = star
            .rfind(|c: char| !c.is_ascii_digit())
            .map(|i| i + 1)
            .unwrap_or(0);
        let factor: usize = star[digits_at..]
            .parse()
            .map_err(|_| Error::value(format!("could not parse bracket factor in '{fmt}'")))?;
        let mut depth = 1usize;
        let mut close = None;
        for (offset, c) in s[open + 1..].char_indices() {
            match c {
                '(' => depth += 1,
                ')' => {
                    depth -= 1;
                    if depth == 0 {
                        close = Some(open + 1 + offset);
                        break;
                    }
                }
                _ => {}
            }
        }
        let close =
            close.ok_or_else(|| Error::value(format!("unbalanced brackets in '{fmt}'")))?;
        let inner = s[open + 1..close].to_owned();
        let expansion = vec![inner; factor].join(",");
        s = format!("{}{}{}", &star[..digits_at], expansion, &s[close + 1..]);
    }
}

fn parse_item(item: &str, out: &mut Vec<Token>) -> Result<()> {
    if let Some(token) = parse_literal(item)? {
        out.push(token);
        return Ok(());
    }
    if let Some(mut tokens) = parse_struct(item) {
        out.append(&mut tokens);
        return Ok(());
    }
    if let Some((digits, rest)) = item.split_once('*') {
        if !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit()) {
            let factor: usize = digits
                .parse()
                .map_err(|_| Error::value(format!("could not parse factor in token '{item}'")))?;
            if factor == 0 {
                return Err(Error::value(format!(
                    "token factor must be a positive integer in '{item}'"
                )));
            }
            let mut expansion = Vec::new();
            parse_item(rest, &mut expansion)?;
            for _ in 0..factor {
                out.extend(expansion.iter().cloned());
            }
            return Ok(());
        }
    }
    let (head, value) = match item.split_once('=') {
        Some((head, value)) => (head, Some(value.to_owned())),
        None => (item, None),
    };
    let (name_part, explicit_length) = match head.split_once(':') {
        Some((name, length)) => {
            let length: u32 = length.parse().map_err(|_| {
                Error::value(format!("could not parse length in token '{item}'"))
            })?;
            (name, Some(length))
        }
        None => (head, None),
    };
    let (name, embedded_length) = dtypes::split_token(name_part)
        .map_err(|_| Error::value(format!("could not parse token '{item}'")))?;
    let length = match (explicit_length, embedded_length) {
        (Some(a), Some(b)) if a != b => {
            return Err(Error::value(format!(
                "conflicting lengths in token '{item}'"
            )))
        }
        (a, b) => a.or(b),
    };
    out.push(Token { name, length, value });
    Ok(())
}

fn parse_literal(item: &str) -> Result<Option<Token>> {
    if item.contains('=') {
        return Ok(None);
    }
    let (name, bits_per_char) = match item.get(..2) {
        Some("0x") | Some("0X") => (DtypeName::Hex, 4),
        Some("0o") | Some("0O") => (DtypeName::Oct, 3),
        Some("0b") | Some("0B") => (DtypeName::Bin, 1),
        _ => return Ok(None),
    };
    let digits = &item[2..];
    let count = digits.chars().filter(|c| *c != '_').count() as u32;
    if count == 0 {
        return Err(Error::value(format!("empty literal token '{item}'")));
    }
    Ok(Some(Token {
        name,
        length: Some(count * bits_per_char),
        value: Some(digits.to_owned()),
    }))
}

fn parse_struct(item: &str) -> Option<Vec<Token>> {
    let mut chars = item.chars();
    let endian = Endianness::from_prefix(chars.next()?)?;
    let fields = parse_struct_fields(chars.as_str(), endian)?;
    if fields.is_empty() {
        return None;
    }
    Some(fields)
}

fn parse_struct_fields(fmt: &str, endian: Endianness) -> Option<Vec<Token>> {
    let mut out = Vec::new();
    let mut digits = String::new();
    for c in fmt.chars() {
        if c.is_ascii_digit() {
            digits.push(c);
            continue;
        }
        let name_str = constants::struct_code_token(c, endian)?;
        let repeat: usize = if digits.is_empty() {
            1
        } else {
            digits.parse().ok()?
        };
        digits.clear();
        let (name, length) = dtypes::split_token(name_str).ok()?;
        for _ in 0..repeat {
            out.push(Token {
                name,
                length,
                value: None,
            });
        }
    }
    if !digits.is_empty() {
        return None;
    }
    Some(out)
}

// Byte widths for BitArray::byteswap; the endian prefix is optional here
// since only the chunk sizes matter.
pub(crate) fn parse_byteswap_widths(fmt: &str) -> Result<Vec<u32>> {
    let stripped: String = fmt.chars().filter(|c| !c.is_whitespace()).collect();
    let body = match stripped.chars().next() {
        Some(c) if Endianness::from_prefix(c).is_some() => &stripped[1..],
        _ => stripped.as_str(),
    };
    let mut out = Vec::new();
    let mut digits = String::new();
    for c in body.chars() {
        if c.is_ascii_digit() {
            digits.push(c);
            continue;
        }
        let size = constants::pack_code_bytes(c).ok_or_else(|| {
            Error::value(format!("invalid character '{c}' in byteswap format '{fmt}'"))
        })?;
        let repeat: usize = if digits.is_empty() {
            1
        } else {
            digits
                .parse()
                .map_err(|_| Error::value(format!("bad repeat count in byteswap format '{fmt}'")))?
        };
        digits.clear();
        out.extend(std::iter::repeat(size).take(repeat));
    }
    if !digits.is_empty() || out.is_empty() {
        return Err(Error::value(format!(
            "could not parse byteswap format '{fmt}'"
        )));
    }
    Ok(out)
}
