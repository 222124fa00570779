use std::fmt;
use std::ops::Deref;

use crate::bits::Bits;
use crate::dtypes::{Dtype, Value};
use crate::options;
use crate::result::{Error, Result};
use crate::store::BitStore;
use crate::tokens;

// A mutable bit sequence; derefs to `Bits` for all read operations.
#[derive(Debug, Clone, Default)]
#[repr(transparent)]
pub struct BitArray {
    bits: Bits,
}

impl Deref for BitArray {
    type Target = Bits;

    fn deref(&self) -> &Bits {
        &self.bits
    }
}

impl From<Bits> for BitArray {
    fn from(bits: Bits) -> BitArray {
        BitArray { bits }
    }
}

impl From<BitArray> for Bits {
    fn from(array: BitArray) -> Bits {
        array.bits
    }
}

impl BitArray {
    pub fn new() -> BitArray {
        BitArray { bits: Bits::new() }
    }

    pub fn zeros(length: usize) -> BitArray {
        BitArray { bits: Bits::zeros(length) }
    }

    pub fn ones(length: usize) -> BitArray {
        BitArray { bits: Bits::ones(length) }
    }

    pub fn from_string(s: &str) -> Result<BitArray> {
        Ok(BitArray { bits: Bits::from_string(s)? })
    }

    pub fn from_hex(s: &str) -> Result<BitArray> {
        Ok(BitArray { bits: Bits::from_hex(s)? })
    }

    pub fn from_bin(s: &str) -> Result<BitArray> {
        Ok(BitArray { bits: Bits::from_bin(s)? })
    }

    pub fn from_oct(s: &str) -> Result<BitArray> {
        Ok(BitArray { bits: Bits::from_oct(s)? })
    }

    pub fn from_bytes(data: &[u8]) -> BitArray {
        BitArray { bits: Bits::from_bytes(data) }
    }

    pub fn from_dtype(dtype: &Dtype, value: &Value) -> Result<BitArray> {
        Ok(BitArray { bits: dtype.build(value)? })
    }

    pub fn to_bits(&self) -> Bits {
        self.bits.clone()
    }

    pub(crate) fn bits_mut(&mut self) -> &mut Bits {
        &mut self.bits
    }

    fn store_mut(&mut self) -> &mut BitStore {
        self.bits.store_mut()
    }

    pub fn append(&mut self, bs: &Bits) {
        if options::lsb0() {
            self.store_mut().prepend(bs.store());
        } else {
            self.store_mut().append(bs.store());
        }
    }

    pub fn prepend(&mut self, bs: &Bits) {
        if options::lsb0() {
            self.store_mut().append(bs.store());
        } else {
            self.store_mut().prepend(bs.store());
        }
    }

    pub fn insert(&mut self, bs: &Bits, pos: usize) -> Result<()> {
        if pos > self.len() {
            return Err(Error::value(format!(
                "insert position {pos} is outside a bitstring of length {}",
                self.len()
            )));
        }
        let mpos = if options::lsb0() { self.len() - pos } else { pos };
        self.store_mut().insert_at(mpos, bs.store());
        Ok(())
    }

    pub fn overwrite(&mut self, bs: &Bits, pos: usize) -> Result<()> {
        if pos > self.len() {
            return Err(Error::value(format!(
                "overwrite position {pos} is outside a bitstring of length {}",
                self.len()
            )));
        }
        if options::lsb0() {
            if pos + bs.len() > self.len() {
                let needed = pos + bs.len() - self.len();
                self.store_mut().prepend(&BitStore::zeros(needed));
            }
            let mpos = self.len() - pos - bs.len();
            self.store_mut().overwrite_at(mpos, bs.store());
        } else {
            self.store_mut().overwrite_at(pos, bs.store());
        }
        Ok(())
    }

    pub fn delete_range(&mut self, start: Option<usize>, end: Option<usize>) -> Result<()> {
        let (start, end) = self.validate_range(start, end)?;
        let (mstart, mend) = self.range_msb0(start, end);
        self.store_mut().remove_range(mstart, mend);
        Ok(())
    }

    // Replaces occurrences of `old` with `new`, returning how many were made.
    pub fn replace(
        &mut self,
        old: &Bits,
        new: &Bits,
        start: Option<usize>,
        end: Option<usize>,
        count: Option<usize>,
        bytealigned: Option<bool>,
    ) -> Result<usize> {
        if old.is_empty() {
            return Err(Error::value("empty bitstring cannot be replaced"));
        }
        let (start, end) = self.validate_range(start, end)?;
        let (mut pos, mut end) = self.range_msb0(start, end);
        let bytealigned = bytealigned.unwrap_or_else(options::bytealigned);
        let limit = count.unwrap_or(usize::MAX);
        let mut replacements = 0;
        while replacements < limit {
            let Some(found) = self.bits.find_msb0(old.store(), pos, end, bytealigned) else {
                break;
            };
            self.store_mut().remove_range(found, found + old.len());
            self.store_mut().insert_at(found, new.store());
            end = end - old.len() + new.len();
            // Restart past the inserted bits, not the replaced ones.
            pos = found + new.len();
            replacements += 1;
        }
        Ok(replacements)
    }

    pub fn reverse(&mut self, start: Option<usize>, end: Option<usize>) -> Result<()> {
        let (start, end) = self.validate_range(start, end)?;
        let (mstart, mend) = self.range_msb0(start, end);
        self.store_mut().reverse_range(mstart, mend);
        Ok(())
    }

    pub fn rol(&mut self, n: usize, start: Option<usize>, end: Option<usize>) -> Result<()> {
        if options::lsb0() {
            self.rotate_right(n, start, end)
        } else {
            self.rotate_left(n, start, end)
        }
    }

    pub fn ror(&mut self, n: usize, start: Option<usize>, end: Option<usize>) -> Result<()> {
        if options::lsb0() {
            self.rotate_left(n, start, end)
        } else {
            self.rotate_right(n, start, end)
        }
    }

    fn rotate_range(&self, start: Option<usize>, end: Option<usize>) -> Result<(usize, usize)> {
        let (start, end) = self.validate_range(start, end)?;
        if start == end {
            return Err(Error::value("cannot rotate an empty bitstring"));
        }
        Ok(self.range_msb0(start, end))
    }

    fn rotate_left(&mut self, n: usize, start: Option<usize>, end: Option<usize>) -> Result<()> {
        let (start, end) = self.rotate_range(start, end)?;
        let n = n % (end - start);
        if n == 0 {
            return Ok(());
        }
        let moved = self.store().slice(start, start + n);
        self.store_mut().remove_range(start, start + n);
        self.store_mut().insert_at(end - n, &moved);
        Ok(())
    }

    fn rotate_right(&mut self, n: usize, start: Option<usize>, end: Option<usize>) -> Result<()> {
        let (start, end) = self.rotate_range(start, end)?;
        let n = n % (end - start);
        if n == 0 {
            return Ok(());
        }
        let moved = self.store().slice(end - n, end);
        self.store_mut().remove_range(end - n, end);
        self.store_mut().insert_at(start, &moved);
        Ok(())
    }

    pub fn set_all(&mut self, value: bool) {
        let len = self.len();
        self.store_mut().set_range(0, len, value);
    }

    pub fn set(&mut self, value: bool, pos: &[isize]) -> Result<()> {
        for &p in pos {
            let index = self.resolve_index(p)?;
            self.store_mut().set(index, value);
        }
        Ok(())
    }

    pub fn set_bit(&mut self, value: bool, pos: isize) -> Result<()> {
        self.set(value, &[pos])
    }

    pub fn invert_all(&mut self) {
        self.store_mut().invert_all();
    }

    pub fn invert(&mut self, pos: &[isize]) -> Result<()> {
        for &p in pos {
            let index = self.resolve_index(p)?;
            self.store_mut().invert_bit(index);
        }
        Ok(())
    }

    pub fn invert_bit(&mut self, pos: isize) -> Result<()> {
        self.invert(&[pos])
    }

    // Replaces the bits in `[start, end)` with `bs`; lengths may differ.
    pub fn set_slice(&mut self, start: usize, end: usize, bs: &Bits) -> Result<()> {
        let (start, end) = self.validate_range(Some(start), Some(end))?;
        let (mstart, mend) = self.range_msb0(start, end);
        self.store_mut().remove_range(mstart, mend);
        self.store_mut().insert_at(mstart, bs.store());
        Ok(())
    }

    pub fn byteswap(
        &mut self,
        widths: &[u32],
        start: Option<usize>,
        end: Option<usize>,
        repeat: bool,
    ) -> Result<usize> {
        if widths.is_empty() {
            return Err(Error::value("no byte widths given to byteswap"));
        }
        if widths.iter().any(|w| *w == 0) {
            return Err(Error::value("improper byte length of 0 in byteswap"));
        }
        let (start, end) = self.validate_range(start, end)?;
        let (mstart, mend) = self.range_msb0(start, end);
        let mut pos = mstart;
        let mut repetitions = 0;
        'outer: loop {
            for &width in widths {
                let bits = width as usize * 8;
                if pos + bits > mend {
                    break 'outer;
                }
                let mut bytes = self.store().slice(pos, pos + bits).to_bytes();
                bytes.reverse();
                self.store_mut().overwrite_at(pos, &BitStore::from_bytes(&bytes));
                pos += bits;
            }
            repetitions += 1;
            if !repeat {
                break;
            }
        }
        Ok(repetitions)
    }

    pub fn byteswap_all(&mut self, start: Option<usize>, end: Option<usize>) -> Result<usize> {
        let (vstart, vend) = self.validate_range(start, end)?;
        if (vend - vstart) % 8 != 0 {
            return Err(Error::value(format!(
                "cannot byteswap a range of {} bits as it is not a whole number of bytes",
                vend - vstart
            )));
        }
        if vstart == vend {
            return Ok(0);
        }
        self.byteswap(&[((vend - vstart) / 8) as u32], start, end, false)
    }

    pub fn byteswap_width(
        &mut self,
        width: u32,
        start: Option<usize>,
        end: Option<usize>,
        repeat: bool,
    ) -> Result<usize> {
        self.byteswap(&[width], start, end, repeat)
    }

    pub fn byteswap_fmt(
        &mut self,
        fmt: &str,
        start: Option<usize>,
        end: Option<usize>,
        repeat: bool,
    ) -> Result<usize> {
        let widths = tokens::parse_byteswap_widths(fmt)?;
        self.byteswap(&widths, start, end, repeat)
    }

    pub fn shl_in_place(&mut self, n: usize) -> Result<()> {
        self.bits = self.bits.shl(n)?;
        Ok(())
    }

    pub fn shr_in_place(&mut self, n: usize) -> Result<()> {
        self.bits = self.bits.shr(n)?;
        Ok(())
    }

    pub fn and_in_place(&mut self, other: &Bits) -> Result<()> {
        self.bits = self.bits.and(other)?;
        Ok(())
    }

    pub fn or_in_place(&mut self, other: &Bits) -> Result<()> {
        self.bits = self.bits.or(other)?;
        Ok(())
    }

    pub fn xor_in_place(&mut self, other: &Bits) -> Result<()> {
        self.bits = self.bits.xor(other)?;
        Ok(())
    }

    pub fn repeat_in_place(&mut self, n: usize) {
        self.bits = self.bits.repeat(n);
    }

    pub fn clear(&mut self) {
        self.store_mut().clear();
    }
}

impl fmt::Display for BitArray {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.bits.fmt(f)
    }
}

impl PartialEq for BitArray {
    fn eq(&self, other: &BitArray) -> bool {
        self.bits == other.bits
    }
}

impl Eq for BitArray {}

impl PartialEq<Bits> for BitArray {
    fn eq(&self, other: &Bits) -> bool {
        &self.bits == other
    }
}

impl PartialEq<BitArray> for Bits {
    fn eq(&self, other: &BitArray) -> bool {
        self == &other.bits
    }
}

impl PartialEq<&str> for BitArray {
    fn eq(&self, other: &&str) -> bool {
        self.bits == *other
    }
}
