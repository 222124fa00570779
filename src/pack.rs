use crate::bits::Bits;
use crate::dtypes::{Dtype, DtypeName, Value};
use crate::result::{Error, Result};
use crate::stream::BitStream;
use crate::tokens;

// Packs positional values into a `BitStream` according to a format string.
pub fn pack<I>(fmt: &str, values: I) -> Result<BitStream>
where
    I: IntoIterator,
    I::Item: Into<Value>,
{
    pack_with(fmt, values, &[])
}

// As `pack`, with keyword values substituted for tokens that name them.
pub fn pack_with<I>(fmt: &str, values: I, kwargs: &[(&str, Value)]) -> Result<BitStream>
where
    I: IntoIterator,
    I::Item: Into<Value>,
{
    let list = tokens::tokenize(fmt).map_err(|e| Error::creation(e.to_string()))?;
    let mut positional = values.into_iter().map(Into::into);
    let mut assembled = Bits::new();
    for token in &list.tokens {
        let dtype = Dtype::resolve(token.name, token.length, None)?;
        let piece = match &token.value {
            Some(text) => match kwargs.iter().find(|(k, _)| *k == text.trim()) {
                Some((_, value)) => dtype.build(value)?,
                None => dtype
                    .build_from_str(text)
                    .map_err(|e| Error::creation(e.to_string()))?,
            },
            None if token.name == DtypeName::Pad => {
                let length = token
                    .length
                    .ok_or_else(|| Error::creation("a pad token needs a length"))?;
                Bits::zeros(length as usize)
            }
            None => {
                let value = positional
                    .next()
                    .ok_or_else(|| Error::creation("not enough values provided to pack"))?;
                dtype.build(&value)?
            }
        };
        assembled = assembled.concat(&piece);
    }
    if positional.next().is_some() {
        return Err(Error::creation("too many values provided to pack"));
    }
    Ok(BitStream::from(assembled))
}
