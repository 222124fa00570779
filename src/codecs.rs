use half::{bf16, f16};

use crate::result::{Error, Result};
use crate::store::BitStore;
use crate::utils::{sign_extend, strip_digit_separators};

pub(crate) const NATIVE_LITTLE: bool = cfg!(target_endian = "little");

// Unsigned and signed integers, arbitrary width 1..=128, MSB first.

pub(crate) fn uint_to_store(value: u128, length: u32) -> Result<BitStore> {
    if length == 0 {
        return Err(Error::creation("a uint cannot have a length of zero bits"));
    }
    if length > 128 {
        return Err(Error::creation(format!(
            "uint of length {length} bits exceeds the supported maximum of 128"
        )));
    }
    if length < 128 && value >> length != 0 {
        return Err(Error::creation(format!(
            "{value} is too large an unsigned integer for a bitstring of length {length}"
        )));
    }
    let mut store = BitStore::zeros(length as usize);
    store.store_uint(0, length as usize, value);
    Ok(store)
}

pub(crate) fn store_to_uint(store: &BitStore) -> Result<u128> {
    if store.is_empty() {
        return Err(Error::interpret("cannot interpret an empty bitstring as a uint"));
    }
    if store.len() > 128 {
        return Err(Error::interpret(format!(
            "uint of length {} bits exceeds the supported maximum of 128",
            store.len()
        )));
    }
    Ok(store.load_uint(0, store.len()))
}

pub(crate) fn int_to_store(value: i128, length: u32) -> Result<BitStore> {
    if length == 0 {
        return Err(Error::creation("an int cannot have a length of zero bits"));
    }
    if length > 128 {
        return Err(Error::creation(format!(
            "int of length {length} bits exceeds the supported maximum of 128"
        )));
    }
    let (lo, hi) = if length == 128 {
        (i128::MIN, i128::MAX)
    } else {
        (-(1i128 << (length - 1)), (1i128 << (length - 1)) - 1)
    };
    if value < lo || value > hi {
        return Err(Error::creation(format!(
            "{value} is out of range for an int of length {length}"
        )));
    }
    // Two's complement: encode value mod 2^length.
    let unsigned = if length == 128 {
        value as u128
    } else {
        (value as u128) & ((1u128 << length) - 1)
    };
    let mut store = BitStore::zeros(length as usize);
    store.store_uint(0, length as usize, unsigned);
    Ok(store)
}

pub(crate) fn store_to_int(store: &BitStore) -> Result<i128> {
    let raw = store_to_uint(store).map_err(|_| {
        Error::interpret(format!(
            "cannot interpret {} bits as an int; lengths of 1 to 128 are supported",
            store.len()
        ))
    })?;
    Ok(sign_extend(raw, store.len() as u32))
}

fn check_whole_bytes(length: u32, name: &str) -> Result<()> {
    if length == 0 || length % 8 != 0 {
        return Err(Error::creation(format!(
            "a {name} must have a length that is a positive multiple of 8 bits, not {length}"
        )));
    }
    Ok(())
}

fn reverse_bytes(store: &BitStore) -> BitStore {
    let mut bytes = store.to_bytes();
    bytes.reverse();
    BitStore::from_bytes(&bytes)
}

pub(crate) fn uintbe_to_store(value: u128, length: u32) -> Result<BitStore> {
    check_whole_bytes(length, "uintbe")?;
    uint_to_store(value, length)
}

pub(crate) fn store_to_uintbe(store: &BitStore) -> Result<u128> {
    if store.len() % 8 != 0 {
        return Err(Error::interpret(format!(
            "a uintbe must be a whole number of bytes, not {} bits",
            store.len()
        )));
    }
    store_to_uint(store)
}

pub(crate) fn intbe_to_store(value: i128, length: u32) -> Result<BitStore> {
    check_whole_bytes(length, "intbe")?;
    int_to_store(value, length)
}

pub(crate) fn store_to_intbe(store: &BitStore) -> Result<i128> {
    if store.len() % 8 != 0 {
        return Err(Error::interpret(format!(
            "an intbe must be a whole number of bytes, not {} bits",
            store.len()
        )));
    }
    store_to_int(store)
}

pub(crate) fn uintle_to_store(value: u128, length: u32) -> Result<BitStore> {
    check_whole_bytes(length, "uintle")?;
    Ok(reverse_bytes(&uint_to_store(value, length)?))
}

pub(crate) fn store_to_uintle(store: &BitStore) -> Result<u128> {
    if store.len() % 8 != 0 {
        return Err(Error::interpret(format!(
            "a uintle must be a whole number of bytes, not {} bits",
            store.len()
        )));
    }
    store_to_uint(&reverse_bytes(store))
}

pub(crate) fn intle_to_store(value: i128, length: u32) -> Result<BitStore> {
    check_whole_bytes(length, "intle")?;
    Ok(reverse_bytes(&int_to_store(value, length)?))
}

pub(crate) fn store_to_intle(store: &BitStore) -> Result<i128> {
    if store.len() % 8 != 0 {
        return Err(Error::interpret(format!(
            "an intle must be a whole number of bytes, not {} bits",
            store.len()
        )));
    }
    store_to_int(&reverse_bytes(store))
}

pub(crate) fn uintne_to_store(value: u128, length: u32) -> Result<BitStore> {
    if NATIVE_LITTLE {
        uintle_to_store(value, length)
    } else {
        uintbe_to_store(value, length)
    }
}

pub(crate) fn store_to_uintne(store: &BitStore) -> Result<u128> {
    if NATIVE_LITTLE {
        store_to_uintle(store)
    } else {
        store_to_uintbe(store)
    }
}

pub(crate) fn intne_to_store(value: i128, length: u32) -> Result<BitStore> {
    if NATIVE_LITTLE {
        intle_to_store(value, length)
    } else {
        intbe_to_store(value, length)
    }
}

pub(crate) fn store_to_intne(store: &BitStore) -> Result<i128> {
    if NATIVE_LITTLE {
        store_to_intle(store)
    } else {
        store_to_intbe(store)
    }
}

// Text radix families: one character per 1/3/4 bits, MSB first.

pub(crate) fn bin_to_store(s: &str) -> Result<BitStore> {
    let digits = strip_digit_separators(s.strip_prefix("0b").or(s.strip_prefix("0B")).unwrap_or(s));
    let mut store = BitStore::with_capacity(digits.len());
    for c in digits.chars() {
        match c {
            '0' => store.push(false),
            '1' => store.push(true),
            _ => {
                return Err(Error::creation(format!(
                    "invalid character '{c}' in binary initialiser '{s}'"
                )))
            }
        }
    }
    Ok(store)
}

pub(crate) fn store_to_bin(store: &BitStore) -> String {
    store.into_iter().map(|b| if b { '1' } else { '0' }).collect()
}

pub(crate) fn oct_to_store(s: &str) -> Result<BitStore> {
    let digits = strip_digit_separators(s.strip_prefix("0o").or(s.strip_prefix("0O")).unwrap_or(s));
    let mut store = BitStore::with_capacity(digits.len() * 3);
    for c in digits.chars() {
        let value = c.to_digit(8).ok_or_else(|| {
            Error::creation(format!("invalid character '{c}' in octal initialiser '{s}'"))
        })?;
        for shift in (0..3).rev() {
            store.push(value >> shift & 1 != 0);
        }
    }
    Ok(store)
}

pub(crate) fn store_to_oct(store: &BitStore) -> Result<String> {
    if store.len() % 3 != 0 {
        return Err(Error::interpret(format!(
            "cannot convert to octal unambiguously, length of {} is not a multiple of 3 bits",
            store.len()
        )));
    }
    let mut out = String::with_capacity(store.len() / 3);
    for chunk in 0..store.len() / 3 {
        let value = store.load_uint(chunk * 3, chunk * 3 + 3) as u32;
        out.push(char::from_digit(value, 8).unwrap_or('0'));
    }
    Ok(out)
}

pub(crate) fn hex_to_store(s: &str) -> Result<BitStore> {
    let digits = strip_digit_separators(s.strip_prefix("0x").or(s.strip_prefix("0X")).unwrap_or(s));
    let mut store = BitStore::with_capacity(digits.len() * 4);
    for c in digits.chars() {
        let value = c.to_digit(16).ok_or_else(|| {
            Error::creation(format!("invalid character '{c}' in hex initialiser '{s}'"))
        })?;
        for shift in (0..4).rev() {
            store.push(value >> shift & 1 != 0);
        }
    }
    Ok(store)
}

pub(crate) fn store_to_hex(store: &BitStore) -> Result<String> {
    if store.len() % 4 != 0 {
        return Err(Error::interpret(format!(
            "cannot convert to hex unambiguously, length of {} is not a multiple of 4 bits",
            store.len()
        )));
    }
    let mut out = String::with_capacity(store.len() / 4);
    for chunk in 0..store.len() / 4 {
        let value = store.load_uint(chunk * 4, chunk * 4 + 4) as u32;
        out.push(char::from_digit(value, 16).unwrap_or('0'));
    }
    Ok(out)
}

pub(crate) fn bytes_to_store(data: &[u8]) -> BitStore {
    BitStore::from_bytes(data)
}

pub(crate) fn store_to_exact_bytes(store: &BitStore) -> Result<Vec<u8>> {
    if store.len() % 8 != 0 {
        return Err(Error::interpret(format!(
            "cannot interpret as bytes, length of {} is not a multiple of 8 bits",
            store.len()
        )));
    }
    Ok(store.to_bytes())
}

pub(crate) fn bool_to_store(value: bool) -> BitStore {
    let mut store = BitStore::zeros(1);
    store.set(0, value);
    store
}

pub(crate) fn store_to_bool(store: &BitStore) -> Result<bool> {
    if store.len() != 1 {
        return Err(Error::interpret(format!(
            "a bool must be a single bit, but this bitstring is {} bits long",
            store.len()
        )));
    }
    Ok(store.get(0))
}

// IEEE floats and bfloat16. NaN payloads of same-width round trips are
// preserved because encode/decode go through the raw bit pattern.

pub(crate) fn float_to_store(value: f64, length: u32) -> Result<BitStore> {
    let (bits, length) = match length {
        16 => (f16::from_f64(value).to_bits() as u128, 16),
        32 => ((value as f32).to_bits() as u128, 32),
        64 => (value.to_bits() as u128, 64),
        other => {
            return Err(Error::creation(format!(
                "floats can only be 16, 32 or 64 bits long, not {other}"
            )))
        }
    };
    uint_to_store(bits, length)
}

pub(crate) fn store_to_float(store: &BitStore) -> Result<f64> {
    match store.len() {
        16 => Ok(f16::from_bits(store.load_uint(0, 16) as u16).to_f64()),
        32 => Ok(f32::from_bits(store.load_uint(0, 32) as u32) as f64),
        64 => Ok(f64::from_bits(store.load_uint(0, 64) as u64)),
        other => Err(Error::interpret(format!(
            "floats can only be 16, 32 or 64 bits long, not {other}"
        ))),
    }
}

pub(crate) fn floatle_to_store(value: f64, length: u32) -> Result<BitStore> {
    Ok(reverse_bytes(&float_to_store(value, length)?))
}

pub(crate) fn store_to_floatle(store: &BitStore) -> Result<f64> {
    if store.len() % 8 != 0 {
        return Err(Error::interpret(format!(
            "little-endian floats must be a whole number of bytes, not {} bits",
            store.len()
        )));
    }
    store_to_float(&reverse_bytes(store))
}

pub(crate) fn floatne_to_store(value: f64, length: u32) -> Result<BitStore> {
    if NATIVE_LITTLE {
        floatle_to_store(value, length)
    } else {
        float_to_store(value, length)
    }
}

pub(crate) fn store_to_floatne(store: &BitStore) -> Result<f64> {
    if NATIVE_LITTLE {
        store_to_floatle(store)
    } else {
        store_to_float(store)
    }
}

pub(crate) fn bfloat_to_store(value: f64) -> Result<BitStore> {
    uint_to_store(bf16::from_f64(value).to_bits() as u128, 16)
}

pub(crate) fn store_to_bfloat(store: &BitStore) -> Result<f64> {
    if store.len() != 16 {
        return Err(Error::interpret(format!(
            "bfloats must be 16 bits long, not {} bits",
            store.len()
        )));
    }
    Ok(bf16::from_bits(store.load_uint(0, 16) as u16).to_f64())
}

pub(crate) fn bfloatle_to_store(value: f64) -> Result<BitStore> {
    Ok(reverse_bytes(&bfloat_to_store(value)?))
}

pub(crate) fn store_to_bfloatle(store: &BitStore) -> Result<f64> {
    if store.len() != 16 {
        return Err(Error::interpret(format!(
            "bfloats must be 16 bits long, not {} bits",
            store.len()
        )));
    }
    store_to_bfloat(&reverse_bytes(store))
}

pub(crate) fn bfloatne_to_store(value: f64) -> Result<BitStore> {
    if NATIVE_LITTLE {
        bfloatle_to_store(value)
    } else {
        bfloat_to_store(value)
    }
}

pub(crate) fn store_to_bfloatne(store: &BitStore) -> Result<f64> {
    if NATIVE_LITTLE {
        store_to_bfloatle(store)
    } else {
        store_to_bfloat(store)
    }
}

// Exponential-Golomb codes. Decoders return (value, consumed_bits).

pub(crate) fn ue_to_store(value: u128) -> Result<BitStore> {
    let code_num = value
        .checked_add(1)
        .ok_or_else(|| Error::creation("exponential-Golomb value is too large to encode"))?;
    let bits = 128 - code_num.leading_zeros();
    let mut store = BitStore::zeros((2 * bits - 1) as usize);
    store.store_uint((bits - 1) as usize, (2 * bits - 1) as usize, code_num);
    Ok(store)
}

pub(crate) fn read_ue(store: &BitStore, pos: usize) -> Result<(u128, usize)> {
    let one = store
        .first_one_from(pos)
        .ok_or_else(|| Error::read("exponential-Golomb code ran off the end of the bitstring"))?;
    let leading_zeros = one - pos;
    if leading_zeros >= 128 {
        return Err(Error::read("exponential-Golomb code is too long to decode"));
    }
    let end = one + leading_zeros + 1;
    if end > store.len() {
        return Err(Error::read("exponential-Golomb code ran off the end of the bitstring"));
    }
    let code_num = store.load_uint(one, end);
    Ok((code_num - 1, end - pos))
}

pub(crate) fn se_to_store(value: i128) -> Result<BitStore> {
    let mapped = if value > 0 {
        2 * (value as u128) - 1
    } else {
        value
            .unsigned_abs()
            .checked_mul(2)
            .ok_or_else(|| Error::creation("exponential-Golomb value is too large to encode"))?
    };
    ue_to_store(mapped)
}

pub(crate) fn read_se(store: &BitStore, pos: usize) -> Result<(i128, usize)> {
    let (mapped, consumed) = read_ue(store, pos)?;
    let value = if mapped == 0 {
        0
    } else if mapped % 2 == 1 {
        ((mapped + 1) / 2) as i128
    } else {
        -((mapped / 2) as i128)
    };
    Ok((value, consumed))
}

pub(crate) fn uie_to_store(value: u128) -> Result<BitStore> {
    let code_num = value
        .checked_add(1)
        .ok_or_else(|| Error::creation("exponential-Golomb value is too large to encode"))?;
    let bits = 128 - code_num.leading_zeros();
    let mut store = BitStore::with_capacity((2 * bits - 1) as usize);
    for shift in (0..bits - 1).rev() {
        store.push(false);
        store.push(code_num >> shift & 1 != 0);
    }
    store.push(true);
    Ok(store)
}

pub(crate) fn read_uie(store: &BitStore, pos: usize) -> Result<(u128, usize)> {
    let mut p = pos;
    let mut code_num: u128 = 1;
    loop {
        if p >= store.len() {
            return Err(Error::read(
                "interleaved exponential-Golomb code ran off the end of the bitstring",
            ));
        }
        if store.get(p) {
            p += 1;
            break;
        }
        p += 1;
        if p >= store.len() {
            return Err(Error::read(
                "interleaved exponential-Golomb code ran off the end of the bitstring",
            ));
        }
        code_num = code_num
            .checked_shl(1)
            .ok_or_else(|| Error::read("interleaved exponential-Golomb code is too long to decode"))?;
        code_num |= store.get(p) as u128;
        p += 1;
    }
    Ok((code_num - 1, p - pos))
}

pub(crate) fn sie_to_store(value: i128) -> Result<BitStore> {
    let mut store = uie_to_store(value.unsigned_abs())?;
    if value != 0 {
        store.push(value < 0);
    }
    Ok(store)
}

pub(crate) fn read_sie(store: &BitStore, pos: usize) -> Result<(i128, usize)> {
    let (magnitude, consumed) = read_uie(store, pos)?;
    if magnitude == 0 {
        return Ok((0, consumed));
    }
    if pos + consumed >= store.len() {
        return Err(Error::read(
            "interleaved exponential-Golomb code ran off the end of the bitstring",
        ));
    }
    let negative = store.get(pos + consumed);
    let value = if negative {
        -(magnitude as i128)
    } else {
        magnitude as i128
    };
    Ok((value, consumed + 1))
}
