use std::ops::Deref;

use crate::bitarray::BitArray;
use crate::bits::Bits;
use crate::dtypes::{Dtype, DtypeName, Value};
use crate::options;
use crate::result::{Error, Result};
use crate::tokens;

fn ensure_msb0() -> Result<()> {
    if options::lsb0() {
        return Err(Error::value("bit streams are not available in lsb0 mode"));
    }
    Ok(())
}

fn check_pos(pos: usize, len: usize) -> Result<()> {
    if pos > len {
        return Err(Error::value(format!(
            "bit position {pos} is outside the bitstring length of {len}"
        )));
    }
    Ok(())
}

fn read_bits_n(bits: &Bits, pos: &mut usize, n: usize) -> Result<Bits> {
    ensure_msb0()?;
    if *pos + n > bits.len() {
        return Err(Error::read(format!(
            "cannot read {n} bits, only {} available",
            bits.len() - *pos
        )));
    }
    let out = bits.slice_msb0(*pos, *pos + n);
    *pos += n;
    Ok(out)
}

fn read_fmt(bits: &Bits, pos: &mut usize, fmt: &str) -> Result<Value> {
    ensure_msb0()?;
    let list = tokens::tokenize(fmt)?;
    if list.tokens.len() != 1 {
        return Err(Error::value(format!(
            "format string '{fmt}' should describe a single token for read or peek"
        )));
    }
    let token = &list.tokens[0];
    if token.name == DtypeName::Pad {
        let length = token
            .length
            .ok_or_else(|| Error::value("a pad token needs a length for reading"))?
            as usize;
        if *pos + length > bits.len() {
            return Err(Error::read(format!(
                "needed {length} bits of padding but only {} were available",
                bits.len() - *pos
            )));
        }
        *pos += length;
        return Ok(Value::None);
    }
    let dtype = if token.is_stretchy() {
        let remaining = bits.len() - *pos;
        let bits_per_item = *token.name.definition().bits_per_item() as usize;
        if remaining % bits_per_item != 0 {
            return Err(Error::interpret(format!(
                "the {remaining} remaining bits do not fit a whole number of '{}' items",
                token.name.as_str()
            )));
        }
        Dtype::resolve(token.name, Some((remaining / bits_per_item) as u32), None)
            .map_err(|e| Error::interpret(e.to_string()))?
    } else {
        Dtype::resolve(token.name, token.length, None)?
    };
    read_dtype_at(bits, pos, &dtype)
}

fn read_dtype_at(bits: &Bits, pos: &mut usize, dtype: &Dtype) -> Result<Value> {
    ensure_msb0()?;
    let (value, new_pos) = dtype.read(bits, *pos)?;
    *pos = new_pos;
    Ok(value)
}

fn read_list(bits: &Bits, pos: &mut usize, fmt: &str) -> Result<Vec<Value>> {
    ensure_msb0()?;
    let list = tokens::tokenize(fmt)?;
    let (values, new_pos) = bits.read_token_values(&list, *pos)?;
    *pos = new_pos;
    Ok(values)
}

fn read_to(bits: &Bits, pos: &mut usize, sub: &Bits, bytealigned: Option<bool>) -> Result<Bits> {
    ensure_msb0()?;
    if sub.is_empty() {
        return Err(Error::value("cannot find an empty bitstring"));
    }
    let bytealigned = bytealigned.unwrap_or_else(options::bytealigned);
    let found = bits
        .find_msb0(sub.store(), *pos, bits.len(), bytealigned)
        .ok_or_else(|| Error::read("substring not found"))?;
    let out = bits.slice_msb0(*pos, found + sub.len());
    *pos = found + sub.len();
    Ok(out)
}

fn byte_align(len: usize, pos: &mut usize) -> Result<usize> {
    let skipped = (8 - *pos % 8) % 8;
    if *pos + skipped > len {
        return Err(Error::value(
            "cannot byte align when fewer bits remain than are needed to align",
        ));
    }
    *pos += skipped;
    Ok(skipped)
}

// A `Bits` with a read cursor.
#[derive(Debug, Clone, Default)]
pub struct ConstBitStream {
    bits: Bits,
    pos: usize,
}

impl Deref for ConstBitStream {
    type Target = Bits;

    fn deref(&self) -> &Bits {
        &self.bits
    }
}

impl From<Bits> for ConstBitStream {
    fn from(bits: Bits) -> ConstBitStream {
        ConstBitStream { bits, pos: 0 }
    }
}

impl ConstBitStream {
    pub fn new(bits: Bits) -> ConstBitStream {
        ConstBitStream { bits, pos: 0 }
    }

    pub fn with_pos(bits: Bits, pos: usize) -> Result<ConstBitStream> {
        check_pos(pos, bits.len())?;
        Ok(ConstBitStream { bits, pos })
    }

    pub fn from_string(s: &str) -> Result<ConstBitStream> {
        Ok(ConstBitStream::new(Bits::from_string(s)?))
    }

    pub fn into_bits(self) -> Bits {
        self.bits
    }

    pub fn pos(&self) -> usize {
        self.pos
    }

    pub fn set_pos(&mut self, pos: usize) -> Result<()> {
        check_pos(pos, self.bits.len())?;
        self.pos = pos;
        Ok(())
    }

    pub fn byte_pos(&self) -> Result<usize> {
        if self.pos % 8 != 0 {
            return Err(Error::value("the current position is not byte aligned"));
        }
        Ok(self.pos / 8)
    }

    pub fn set_byte_pos(&mut self, byte_pos: usize) -> Result<()> {
        self.set_pos(byte_pos * 8)
    }

    pub fn read(&mut self, fmt: &str) -> Result<Value> {
        read_fmt(&self.bits, &mut self.pos, fmt)
    }

    pub fn read_bits(&mut self, n: usize) -> Result<Bits> {
        read_bits_n(&self.bits, &mut self.pos, n)
    }

    pub fn read_dtype(&mut self, dtype: &Dtype) -> Result<Value> {
        read_dtype_at(&self.bits, &mut self.pos, dtype)
    }

    pub fn readlist(&mut self, fmt: &str) -> Result<Vec<Value>> {
        read_list(&self.bits, &mut self.pos, fmt)
    }

    pub fn peek(&self, fmt: &str) -> Result<Value> {
        let mut pos = self.pos;
        read_fmt(&self.bits, &mut pos, fmt)
    }

    pub fn peek_bits(&self, n: usize) -> Result<Bits> {
        let mut pos = self.pos;
        read_bits_n(&self.bits, &mut pos, n)
    }

    pub fn peeklist(&self, fmt: &str) -> Result<Vec<Value>> {
        let mut pos = self.pos;
        read_list(&self.bits, &mut pos, fmt)
    }

    pub fn readto(&mut self, sub: &Bits, bytealigned: Option<bool>) -> Result<Bits> {
        read_to(&self.bits, &mut self.pos, sub, bytealigned)
    }

    pub fn bytealign(&mut self) -> Result<usize> {
        byte_align(self.bits.len(), &mut self.pos)
    }
}

// A mutable bit stream; edits that change the length reset the cursor.
#[derive(Debug, Clone, Default)]
pub struct BitStream {
    data: BitArray,
    pos: usize,
}

impl Deref for BitStream {
    type Target = BitArray;

    fn deref(&self) -> &BitArray {
        &self.data
    }
}

impl From<BitArray> for BitStream {
    fn from(data: BitArray) -> BitStream {
        BitStream { data, pos: 0 }
    }
}

impl From<Bits> for BitStream {
    fn from(bits: Bits) -> BitStream {
        BitStream {
            data: BitArray::from(bits),
            pos: 0,
        }
    }
}

impl From<ConstBitStream> for BitStream {
    fn from(stream: ConstBitStream) -> BitStream {
        BitStream {
            data: BitArray::from(stream.bits),
            pos: stream.pos,
        }
    }
}

impl BitStream {
    pub fn new() -> BitStream {
        BitStream::default()
    }

    pub fn from_string(s: &str) -> Result<BitStream> {
        Ok(BitStream::from(BitArray::from_string(s)?))
    }

    pub fn into_bitarray(self) -> BitArray {
        self.data
    }

    pub fn into_bits(self) -> Bits {
        self.data.into()
    }

    pub fn pos(&self) -> usize {
        self.pos
    }

    pub fn set_pos(&mut self, pos: usize) -> Result<()> {
        check_pos(pos, self.data.len())?;
        self.pos = pos;
        Ok(())
    }

    pub fn byte_pos(&self) -> Result<usize> {
        if self.pos % 8 != 0 {
            return Err(Error::value("the current position is not byte aligned"));
        }
        Ok(self.pos / 8)
    }

    pub fn read(&mut self, fmt: &str) -> Result<Value> {
        read_fmt(&self.data, &mut self.pos, fmt)
    }

    pub fn read_bits(&mut self, n: usize) -> Result<Bits> {
        read_bits_n(&self.data, &mut self.pos, n)
    }

    pub fn read_dtype(&mut self, dtype: &Dtype) -> Result<Value> {
        read_dtype_at(&self.data, &mut self.pos, dtype)
    }

    pub fn readlist(&mut self, fmt: &str) -> Result<Vec<Value>> {
        read_list(&self.data, &mut self.pos, fmt)
    }

    pub fn peek(&self, fmt: &str) -> Result<Value> {
        let mut pos = self.pos;
        read_fmt(&self.data, &mut pos, fmt)
    }

    pub fn peek_bits(&self, n: usize) -> Result<Bits> {
        let mut pos = self.pos;
        read_bits_n(&self.data, &mut pos, n)
    }

    pub fn peeklist(&self, fmt: &str) -> Result<Vec<Value>> {
        let mut pos = self.pos;
        read_list(&self.data, &mut pos, fmt)
    }

    pub fn readto(&mut self, sub: &Bits, bytealigned: Option<bool>) -> Result<Bits> {
        read_to(&self.data, &mut self.pos, sub, bytealigned)
    }

    pub fn bytealign(&mut self) -> Result<usize> {
        byte_align(self.data.len(), &mut self.pos)
    }

    // Length-changing edits reset the cursor to the start.

    pub fn append(&mut self, bs: &Bits) {
        self.data.append(bs);
        self.pos = 0;
    }

    pub fn prepend(&mut self, bs: &Bits) {
        self.data.prepend(bs);
        self.pos = 0;
    }

    pub fn insert(&mut self, bs: &Bits, pos: usize) -> Result<()> {
        self.data.insert(bs, pos)?;
        self.pos = 0;
        Ok(())
    }

    pub fn overwrite(&mut self, bs: &Bits, pos: usize) -> Result<()> {
        self.data.overwrite(bs, pos)?;
        self.pos = 0;
        Ok(())
    }

    pub fn delete_range(&mut self, start: Option<usize>, end: Option<usize>) -> Result<()> {
        self.data.delete_range(start, end)?;
        self.pos = 0;
        Ok(())
    }

    pub fn replace(
        &mut self,
        old: &Bits,
        new: &Bits,
        start: Option<usize>,
        end: Option<usize>,
        count: Option<usize>,
        bytealigned: Option<bool>,
    ) -> Result<usize> {
        let n = self.data.replace(old, new, start, end, count, bytealigned)?;
        self.pos = 0;
        Ok(n)
    }

    pub fn set_slice(&mut self, start: usize, end: usize, bs: &Bits) -> Result<()> {
        self.data.set_slice(start, end, bs)?;
        self.pos = 0;
        Ok(())
    }

    pub fn clear(&mut self) {
        self.data.clear();
        self.pos = 0;
    }

    // Direct mutable access; the cursor rewinds since any edit may move it.
    pub fn as_mut_bitarray(&mut self) -> &mut BitArray {
        self.pos = 0;
        &mut self.data
    }
}

impl PartialEq for BitStream {
    fn eq(&self, other: &BitStream) -> bool {
        self.data == other.data
    }
}

impl PartialEq for ConstBitStream {
    fn eq(&self, other: &ConstBitStream) -> bool {
        self.bits == other.bits
    }
}

impl PartialEq<Bits> for ConstBitStream {
    fn eq(&self, other: &Bits) -> bool {
        &self.bits == other
    }
}

impl PartialEq<Bits> for BitStream {
    fn eq(&self, other: &Bits) -> bool {
        self.data == *other
    }
}
