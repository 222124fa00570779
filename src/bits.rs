use std::fmt;
use std::hash::{Hash, Hasher};
use std::io;
use std::path::Path;

use crate::codecs;
use crate::constants::MAX_CHARS;
use crate::dtypes::{self, Dtype, DtypeName, Value};
use crate::options::{self, Colour};
use crate::result::{Error, Result};
use crate::store::BitStore;
use crate::tokens::{self, TokenList};

// An immutable sequence of bits. The mutable counterpart is `BitArray`.
#[derive(Debug, Clone, Default)]
pub struct Bits {
    store: BitStore,
}

impl Bits {
    pub fn new() -> Bits {
        Bits { store: BitStore::new() }
    }

    pub fn zeros(length: usize) -> Bits {
        Bits { store: BitStore::zeros(length) }
    }

    pub fn ones(length: usize) -> Bits {
        Bits { store: BitStore::ones(length) }
    }

    pub(crate) fn from_store(store: BitStore) -> Bits {
        Bits { store }
    }

    pub(crate) fn store(&self) -> &BitStore {
        &self.store
    }

    pub(crate) fn store_mut(&mut self) -> &mut BitStore {
        &mut self.store
    }

    pub fn from_bin(s: &str) -> Result<Bits> {
        Ok(Bits { store: codecs::bin_to_store(s)? })
    }

    pub fn from_oct(s: &str) -> Result<Bits> {
        Ok(Bits { store: codecs::oct_to_store(s)? })
    }

    pub fn from_hex(s: &str) -> Result<Bits> {
        Ok(Bits { store: codecs::hex_to_store(s)? })
    }

    pub fn from_bytes(data: &[u8]) -> Bits {
        Bits { store: BitStore::from_bytes(data) }
    }

    pub fn from_bytes_offset(data: &[u8], bit_offset: usize, bit_length: usize) -> Result<Bits> {
        if bit_offset + bit_length > data.len() * 8 {
            return Err(Error::creation(format!(
                "offset of {bit_offset} and length of {bit_length} bits needs more than the {} bits provided",
                data.len() * 8
            )));
        }
        Ok(Bits {
            store: BitStore::from_bytes_offset(data, bit_offset, bit_length),
        })
    }

    pub fn from_bools<I>(values: I) -> Bits
    where
        I: IntoIterator<Item = bool>,
    {
        Bits { store: BitStore::from_bools(values) }
    }

    pub fn from_uint(value: u128, length: u32) -> Result<Bits> {
        Ok(Bits { store: codecs::uint_to_store(value, length)? })
    }

    pub fn from_int(value: i128, length: u32) -> Result<Bits> {
        Ok(Bits { store: codecs::int_to_store(value, length)? })
    }

    pub fn from_uintbe(value: u128, length: u32) -> Result<Bits> {
        Ok(Bits { store: codecs::uintbe_to_store(value, length)? })
    }

    pub fn from_intbe(value: i128, length: u32) -> Result<Bits> {
        Ok(Bits { store: codecs::intbe_to_store(value, length)? })
    }

    pub fn from_uintle(value: u128, length: u32) -> Result<Bits> {
        Ok(Bits { store: codecs::uintle_to_store(value, length)? })
    }

    pub fn from_intle(value: i128, length: u32) -> Result<Bits> {
        Ok(Bits { store: codecs::intle_to_store(value, length)? })
    }

    pub fn from_uintne(value: u128, length: u32) -> Result<Bits> {
        Ok(Bits { store: codecs::uintne_to_store(value, length)? })
    }

    pub fn from_intne(value: i128, length: u32) -> Result<Bits> {
        Ok(Bits { store: codecs::intne_to_store(value, length)? })
    }

    pub fn from_float(value: f64, length: u32) -> Result<Bits> {
        Ok(Bits { store: codecs::float_to_store(value, length)? })
    }

    pub fn from_floatle(value: f64, length: u32) -> Result<Bits> {
        Ok(Bits { store: codecs::floatle_to_store(value, length)? })
    }

    pub fn from_floatne(value: f64, length: u32) -> Result<Bits> {
        Ok(Bits { store: codecs::floatne_to_store(value, length)? })
    }

    pub fn from_bfloat(value: f64) -> Result<Bits> {
        Ok(Bits { store: codecs::bfloat_to_store(value)? })
    }

    pub fn from_bfloatle(value: f64) -> Result<Bits> {
        Ok(Bits { store: codecs::bfloatle_to_store(value)? })
    }

    pub fn from_bfloatne(value: f64) -> Result<Bits> {
        Ok(Bits { store: codecs::bfloatne_to_store(value)? })
    }

    pub fn from_bool(value: bool) -> Bits {
        Bits { store: codecs::bool_to_store(value) }
    }

    pub fn from_ue(value: u128) -> Result<Bits> {
        Ok(Bits { store: codecs::ue_to_store(value)? })
    }

    pub fn from_se(value: i128) -> Result<Bits> {
        Ok(Bits { store: codecs::se_to_store(value)? })
    }

    pub fn from_uie(value: u128) -> Result<Bits> {
        Ok(Bits { store: codecs::uie_to_store(value)? })
    }

    pub fn from_sie(value: i128) -> Result<Bits> {
        Ok(Bits { store: codecs::sie_to_store(value)? })
    }

    pub fn from_dtype(dtype: &Dtype, value: &Value) -> Result<Bits> {
        dtype.build(value)
    }

    // Builds from a token string such as `"uint:12=100, 0b110, 0xff"`.
    pub fn from_string(s: &str) -> Result<Bits> {
        let list = tokens::tokenize(s).map_err(|e| Error::creation(e.to_string()))?;
        let mut out = Bits::new();
        for token in &list.tokens {
            let dtype = Dtype::resolve(token.name, token.length, None)?;
            let piece = match (&token.value, token.name) {
                (Some(value), _) => dtype.build_from_str(value)?,
                (None, DtypeName::Pad) => {
                    let length = token.length.ok_or_else(|| {
                        Error::creation("a pad token needs a length".to_string())
                    })?;
                    Bits::zeros(length as usize)
                }
                (None, _) => {
                    return Err(Error::creation(format!(
                        "token '{dtype}' in a creation string needs a value"
                    )))
                }
            };
            out.store.append(piece.store());
        }
        Ok(out)
    }

    pub fn from_file<P: AsRef<Path>>(
        path: P,
        bit_offset: Option<usize>,
        bit_length: Option<usize>,
    ) -> Result<Bits> {
        let data = std::fs::read(path)?;
        let offset = bit_offset.unwrap_or(0);
        let total = data.len() * 8;
        if offset > total {
            return Err(Error::creation(format!(
                "offset of {offset} bits is past the end of the {total} bit file"
            )));
        }
        let length = bit_length.unwrap_or(total - offset);
        Bits::from_bytes_offset(&data, offset, length)
    }

    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    // Position translation at the LSB0 boundary. Storage stays MSB0.

    pub(crate) fn pos_msb0(&self, pos: usize) -> usize {
        if options::lsb0() {
            self.len() - 1 - pos
        } else {
            pos
        }
    }

    pub(crate) fn range_msb0(&self, start: usize, end: usize) -> (usize, usize) {
        if options::lsb0() {
            (self.len() - end, self.len() - start)
        } else {
            (start, end)
        }
    }

    pub(crate) fn validate_range(
        &self,
        start: Option<usize>,
        end: Option<usize>,
    ) -> Result<(usize, usize)> {
        let start = start.unwrap_or(0);
        let end = end.unwrap_or(self.len());
        if end > self.len() {
            return Err(Error::value(format!(
                "end of {end} is past the end of the bitstring of length {}",
                self.len()
            )));
        }
        if start > end {
            return Err(Error::value(format!(
                "start of {start} is after the end of {end}"
            )));
        }
        Ok((start, end))
    }

    pub(crate) fn resolve_index(&self, pos: isize) -> Result<usize> {
        let len = self.len() as isize;
        let resolved = if pos < 0 { pos + len } else { pos };
        if resolved < 0 || resolved >= len {
            return Err(Error::index(format!(
                "bit position {pos} is out of range for a bitstring of length {len}"
            )));
        }
        Ok(self.pos_msb0(resolved as usize))
    }

    pub fn get(&self, pos: usize) -> Result<bool> {
        if pos >= self.len() {
            return Err(Error::index(format!(
                "bit position {pos} is out of range for a bitstring of length {}",
                self.len()
            )));
        }
        Ok(self.store.get(self.pos_msb0(pos)))
    }

    pub fn slice(&self, start: usize, end: usize) -> Result<Bits> {
        let (start, end) = self.validate_range(Some(start), Some(end))?;
        let (start, end) = self.range_msb0(start, end);
        Ok(Bits { store: self.store.slice(start, end) })
    }

    pub fn slice_step(&self, start: usize, end: usize, step: usize) -> Result<Bits> {
        if step == 0 {
            return Err(Error::value("slice step cannot be zero"));
        }
        let (start, end) = self.validate_range(Some(start), Some(end))?;
        if options::lsb0() {
            let mut samples = Vec::with_capacity((end - start) / step + 1);
            let mut k = 0;
            while start + k < end {
                samples.push(self.store.get(self.len() - 1 - (start + k)));
                k += step;
            }
            // The result is addressed LSB0 too, so its storage runs the other way.
            samples.reverse();
            Ok(Bits { store: BitStore::from_bools(samples) })
        } else {
            Ok(Bits { store: self.store.slice_step(start, end, step) })
        }
    }

    pub(crate) fn slice_msb0(&self, start: usize, end: usize) -> Bits {
        Bits { store: self.store.slice(start, end) }
    }

    pub fn concat(&self, other: &Bits) -> Bits {
        let mut store = self.store.clone();
        store.append(other.store());
        Bits { store }
    }

    pub fn repeat(&self, n: usize) -> Bits {
        let mut store = BitStore::with_capacity(self.len() * n);
        for _ in 0..n {
            store.append(&self.store);
        }
        Bits { store }
    }

    pub fn join(&self, parts: &[Bits]) -> Bits {
        let mut out = Bits::new();
        for (i, part) in parts.iter().enumerate() {
            if i != 0 {
                out.store.append(&self.store);
            }
            out.store.append(part.store());
        }
        out
    }

    fn check_same_length(&self, other: &Bits, op: &str) -> Result<()> {
        if self.len() != other.len() {
            return Err(Error::value(format!(
                "bitstrings must have the same length for the {op} operator; got {} and {}",
                self.len(),
                other.len()
            )));
        }
        Ok(())
    }

    pub fn and(&self, other: &Bits) -> Result<Bits> {
        self.check_same_length(other, "&")?;
        Ok(Bits { store: self.store.and(other.store()) })
    }

    pub fn or(&self, other: &Bits) -> Result<Bits> {
        self.check_same_length(other, "|")?;
        Ok(Bits { store: self.store.or(other.store()) })
    }

    pub fn xor(&self, other: &Bits) -> Result<Bits> {
        self.check_same_length(other, "^")?;
        Ok(Bits { store: self.store.xor(other.store()) })
    }

    pub fn invert(&self) -> Result<Bits> {
        if self.is_empty() {
            return Err(Error::value("cannot invert an empty bitstring"));
        }
        let mut store = self.store.clone();
        store.invert_all();
        Ok(Bits { store })
    }

    pub fn shl(&self, n: usize) -> Result<Bits> {
        if self.is_empty() {
            return Err(Error::value("cannot shift an empty bitstring"));
        }
        let n = n.min(self.len());
        let mut store = self.store.slice(n, self.len());
        store.append(&BitStore::zeros(n));
        Ok(Bits { store })
    }

    pub fn shr(&self, n: usize) -> Result<Bits> {
        if self.is_empty() {
            return Err(Error::value("cannot shift an empty bitstring"));
        }
        let n = n.min(self.len());
        let mut store = BitStore::zeros(n);
        store.append(&self.store.slice(0, self.len() - n));
        Ok(Bits { store })
    }

    pub fn count(&self, value: bool) -> usize {
        if value {
            self.store.count_ones()
        } else {
            self.len() - self.store.count_ones()
        }
    }

    pub(crate) fn find_msb0(
        &self,
        sub: &BitStore,
        start: usize,
        end: usize,
        bytealigned: bool,
    ) -> Option<usize> {
        if sub.is_empty() || sub.len() > end.saturating_sub(start) {
            return None;
        }
        let step = if bytealigned { 8 } else { 1 };
        let mut pos = if bytealigned {
            crate::utils::div_ceil(start, 8) * 8
        } else {
            start
        };
        while pos + sub.len() <= end {
            if self.store.matches_at(sub, pos) {
                return Some(pos);
            }
            pos += step;
        }
        None
    }

    pub(crate) fn rfind_msb0(
        &self,
        sub: &BitStore,
        start: usize,
        end: usize,
        bytealigned: bool,
    ) -> Option<usize> {
        if sub.is_empty() || sub.len() > end.saturating_sub(start) {
            return None;
        }
        let step = if bytealigned { 8 } else { 1 };
        let mut pos = end - sub.len();
        if bytealigned {
            pos = pos / 8 * 8;
        }
        loop {
            if self.store.matches_at(sub, pos) && pos >= start {
                return Some(pos);
            }
            if pos < start + step {
                return None;
            }
            pos -= step;
        }
    }

    pub fn find(
        &self,
        sub: &Bits,
        start: Option<usize>,
        end: Option<usize>,
        bytealigned: Option<bool>,
    ) -> Result<Option<usize>> {
        if sub.is_empty() {
            return Err(Error::value("cannot find an empty bitstring"));
        }
        let (start, end) = self.validate_range(start, end)?;
        let bytealigned = bytealigned.unwrap_or_else(options::bytealigned);
        if options::lsb0() {
            let (mstart, mend) = self.range_msb0(start, end);
            Ok(self
                .rfind_msb0(sub.store(), mstart, mend, bytealigned)
                .map(|p| self.len() - p - sub.len()))
        } else {
            Ok(self.find_msb0(sub.store(), start, end, bytealigned))
        }
    }

    pub fn rfind(
        &self,
        sub: &Bits,
        start: Option<usize>,
        end: Option<usize>,
        bytealigned: Option<bool>,
    ) -> Result<Option<usize>> {
        if sub.is_empty() {
            return Err(Error::value("cannot find an empty bitstring"));
        }
        let (start, end) = self.validate_range(start, end)?;
        let bytealigned = bytealigned.unwrap_or_else(options::bytealigned);
        if options::lsb0() {
            let (mstart, mend) = self.range_msb0(start, end);
            Ok(self
                .find_msb0(sub.store(), mstart, mend, bytealigned)
                .map(|p| self.len() - p - sub.len()))
        } else {
            Ok(self.rfind_msb0(sub.store(), start, end, bytealigned))
        }
    }

    // All occurrences, overlapping matches included.
    pub fn find_all<'a>(
        &'a self,
        sub: &Bits,
        start: Option<usize>,
        end: Option<usize>,
        count: Option<usize>,
        bytealigned: Option<bool>,
    ) -> Result<impl Iterator<Item = usize> + 'a> {
        if sub.is_empty() {
            return Err(Error::value("cannot find an empty bitstring"));
        }
        let (start, end) = self.validate_range(start, end)?;
        let bytealigned = bytealigned.unwrap_or_else(options::bytealigned);
        let lsb0 = options::lsb0();
        let (mstart, mend) = self.range_msb0(start, end);
        let sub = sub.store().clone();
        let sub_len = sub.len();
        let step = if bytealigned { 8 } else { 1 };
        let mut cursor = mstart;
        let mut rcursor = mend;
        let mut remaining = count.unwrap_or(usize::MAX);
        let iter = std::iter::from_fn(move || {
            if remaining == 0 {
                return None;
            }
            let found = if lsb0 {
                let p = self.rfind_msb0(&sub, mstart, rcursor, bytealigned)?;
                rcursor = (p + sub_len).saturating_sub(step);
                Some(self.len() - p - sub_len)
            } else {
                let p = self.find_msb0(&sub, cursor, mend, bytealigned)?;
                cursor = p + step;
                Some(p)
            };
            remaining -= 1;
            found
        });
        Ok(iter)
    }

    pub fn contains(&self, sub: &Bits) -> bool {
        !sub.is_empty()
            && self
                .find_msb0(sub.store(), 0, self.len(), false)
                .is_some()
    }

    pub fn startswith(&self, prefix: &Bits, start: Option<usize>, end: Option<usize>) -> Result<bool> {
        let (start, end) = self.validate_range(start, end)?;
        if start + prefix.len() > end {
            return Ok(false);
        }
        let (mstart, mend) = self.range_msb0(start, end);
        let probe = if options::lsb0() {
            self.store.slice(mend - prefix.len(), mend)
        } else {
            self.store.slice(mstart, mstart + prefix.len())
        };
        Ok(&probe == prefix.store())
    }

    pub fn endswith(&self, suffix: &Bits, start: Option<usize>, end: Option<usize>) -> Result<bool> {
        let (start, end) = self.validate_range(start, end)?;
        if start + suffix.len() > end {
            return Ok(false);
        }
        let (mstart, mend) = self.range_msb0(start, end);
        let probe = if options::lsb0() {
            self.store.slice(mstart, mstart + suffix.len())
        } else {
            self.store.slice(mend - suffix.len(), mend)
        };
        Ok(&probe == suffix.store())
    }

    pub fn all(&self, value: bool, pos: Option<&[isize]>) -> Result<bool> {
        match pos {
            None => Ok(if value {
                self.store.count_ones() == self.len()
            } else {
                self.store.count_ones() == 0
            }),
            Some(positions) => {
                for &p in positions {
                    if self.store.get(self.resolve_index(p)?) != value {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
        }
    }

    pub fn any(&self, value: bool, pos: Option<&[isize]>) -> Result<bool> {
        match pos {
            None => Ok(if value {
                self.store.count_ones() > 0
            } else {
                self.store.count_ones() < self.len()
            }),
            Some(positions) => {
                for &p in positions {
                    if self.store.get(self.resolve_index(p)?) == value {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
        }
    }

    pub fn cut<'a>(
        &'a self,
        bits: usize,
        start: Option<usize>,
        end: Option<usize>,
        count: Option<usize>,
    ) -> Result<impl Iterator<Item = Bits> + 'a> {
        if bits == 0 {
            return Err(Error::value("cannot cut into chunks of zero bits"));
        }
        let (start, end) = self.validate_range(start, end)?;
        let (mstart, mend) = self.range_msb0(start, end);
        let lsb0 = options::lsb0();
        let mut remaining = count.unwrap_or(usize::MAX);
        let mut taken = 0usize;
        let iter = std::iter::from_fn(move || {
            if remaining == 0 || taken + bits > mend - mstart {
                return None;
            }
            let chunk = if lsb0 {
                self.slice_msb0(mend - taken - bits, mend - taken)
            } else {
                self.slice_msb0(mstart + taken, mstart + taken + bits)
            };
            taken += bits;
            remaining -= 1;
            Some(chunk)
        });
        Ok(iter)
    }

    pub fn split(
        &self,
        delimiter: &Bits,
        start: Option<usize>,
        end: Option<usize>,
        count: Option<usize>,
        bytealigned: Option<bool>,
    ) -> Result<Vec<Bits>> {
        if delimiter.is_empty() {
            return Err(Error::value("cannot split on an empty bitstring"));
        }
        let positions: Vec<usize> =
            self.find_all(delimiter, start, end, None, bytealigned)?.collect();
        let (start, end) = self.validate_range(start, end)?;
        let limit = count.unwrap_or(usize::MAX);
        let mut out = Vec::new();
        if limit == 0 {
            return Ok(out);
        }
        match positions.first() {
            None => {
                out.push(self.slice(start, end)?);
                return Ok(out);
            }
            Some(&first) => out.push(self.slice(start, first)?),
        }
        for (i, &pos) in positions.iter().enumerate() {
            if out.len() >= limit {
                break;
            }
            let section_end = positions.get(i + 1).copied().unwrap_or(end);
            out.push(self.slice(pos, section_end)?);
        }
        Ok(out)
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        self.store.to_bytes()
    }

    pub fn to_file<W: io::Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_all(&self.to_bytes())?;
        Ok(())
    }

    pub fn value(&self, dtype: &Dtype) -> Result<Value> {
        dtype.parse(self)
    }

    pub fn uint(&self) -> Result<u128> {
        codecs::store_to_uint(&self.store)
    }

    pub fn int(&self) -> Result<i128> {
        codecs::store_to_int(&self.store)
    }

    pub fn uintbe(&self) -> Result<u128> {
        codecs::store_to_uintbe(&self.store)
    }

    pub fn intbe(&self) -> Result<i128> {
        codecs::store_to_intbe(&self.store)
    }

    pub fn uintle(&self) -> Result<u128> {
        codecs::store_to_uintle(&self.store)
    }

    pub fn intle(&self) -> Result<i128> {
        codecs::store_to_intle(&self.store)
    }

    pub fn uintne(&self) -> Result<u128> {
        codecs::store_to_uintne(&self.store)
    }

    pub fn intne(&self) -> Result<i128> {
        codecs::store_to_intne(&self.store)
    }

    pub fn float(&self) -> Result<f64> {
        codecs::store_to_float(&self.store)
    }

    pub fn floatle(&self) -> Result<f64> {
        codecs::store_to_floatle(&self.store)
    }

    pub fn floatne(&self) -> Result<f64> {
        codecs::store_to_floatne(&self.store)
    }

    pub fn bfloat(&self) -> Result<f64> {
        codecs::store_to_bfloat(&self.store)
    }

    pub fn bfloatle(&self) -> Result<f64> {
        codecs::store_to_bfloatle(&self.store)
    }

    pub fn bfloatne(&self) -> Result<f64> {
        codecs::store_to_bfloatne(&self.store)
    }

    pub fn hex(&self) -> Result<String> {
        codecs::store_to_hex(&self.store)
    }

    pub fn oct(&self) -> Result<String> {
        codecs::store_to_oct(&self.store)
    }

    pub fn bin(&self) -> String {
        codecs::store_to_bin(&self.store)
    }

    pub fn bytes(&self) -> Result<Vec<u8>> {
        codecs::store_to_exact_bytes(&self.store)
    }

    pub fn bool(&self) -> Result<bool> {
        codecs::store_to_bool(&self.store)
    }

    pub fn ue(&self) -> Result<u128> {
        match dtypes::decode_raw(DtypeName::Ue, &self.store)? {
            Value::Uint(v) => Ok(v),
            _ => unreachable!(),
        }
    }

    pub fn se(&self) -> Result<i128> {
        match dtypes::decode_raw(DtypeName::Se, &self.store)? {
            Value::Int(v) => Ok(v),
            _ => unreachable!(),
        }
    }

    pub fn uie(&self) -> Result<u128> {
        match dtypes::decode_raw(DtypeName::Uie, &self.store)? {
            Value::Uint(v) => Ok(v),
            _ => unreachable!(),
        }
    }

    pub fn sie(&self) -> Result<i128> {
        match dtypes::decode_raw(DtypeName::Sie, &self.store)? {
            Value::Int(v) => Ok(v),
            _ => unreachable!(),
        }
    }

    // Interprets the whole bitstring using a format string.
    pub fn unpack(&self, fmt: &str) -> Result<Vec<Value>> {
        let list = tokens::tokenize(fmt)?;
        let (values, _) = self.read_token_values(&list, 0)?;
        Ok(values)
    }

    pub(crate) fn read_token_values(
        &self,
        list: &TokenList,
        mut pos: usize,
    ) -> Result<(Vec<Value>, usize)> {
        let stretchy_count = list.stretchy_count();
        if stretchy_count > 1 {
            return Err(Error::value(
                "only one token in a read can have an unknown length",
            ));
        }
        let mut stretchy_bits = None;
        if stretchy_count == 1 {
            if list.tokens.iter().any(|t| *t.name.definition().variable_length()) {
                return Err(Error::value(
                    "a token with an unknown length cannot be used with variable-length tokens",
                ));
            }
            let mut known = 0usize;
            for token in list.tokens.iter().filter(|t| !t.is_stretchy()) {
                let dtype = Dtype::resolve(token.name, token.length, None)?;
                let bit_length = dtype.bit_length().ok_or_else(|| {
                    Error::value(format!("token '{dtype}' needs a length for reading"))
                })?;
                known += bit_length as usize;
            }
            let available = self.len().saturating_sub(pos);
            if known > available {
                return Err(Error::read(format!(
                    "the format needs at least {known} bits but only {available} are available"
                )));
            }
            stretchy_bits = Some(available - known);
        }
        let mut values = Vec::with_capacity(list.tokens.len());
        for token in &list.tokens {
            if token.name == DtypeName::Pad {
                let length = token.length.ok_or_else(|| {
                    Error::value("a pad token needs a length for reading")
                })? as usize;
                if pos + length > self.len() {
                    return Err(Error::read(format!(
                        "needed {length} bits of padding but only {} were available",
                        self.len() - pos
                    )));
                }
                pos += length;
                continue;
            }
            let dtype = if token.is_stretchy() {
                let bits = stretchy_bits.take().ok_or_else(|| {
                    Error::value("only one token in a read can have an unknown length")
                })?;
                let bits_per_item = *token.name.definition().bits_per_item() as usize;
                if bits % bits_per_item != 0 {
                    return Err(Error::interpret(format!(
                        "the {bits} remaining bits do not fit a whole number of '{}' items",
                        token.name.as_str()
                    )));
                }
                Dtype::resolve(token.name, Some((bits / bits_per_item) as u32), None)
                    .map_err(|e| Error::interpret(e.to_string()))?
            } else {
                Dtype::resolve(token.name, token.length, None)?
            };
            let (value, new_pos) = dtype.read(self, pos)?;
            values.push(value);
            pos = new_pos;
        }
        Ok((values, pos))
    }

    // Pretty print to any writer; empty input prints nothing and succeeds.
    pub fn pp<W: io::Write>(
        &self,
        fmt: Option<&str>,
        width: usize,
        sep: &str,
        show_offset: bool,
        writer: &mut W,
    ) -> Result<()> {
        if self.is_empty() {
            return Ok(());
        }
        let (first, second, bits_per_group) = parse_pp_fmt(fmt)?;
        if self.len() % pp_char_bits(first) != 0
            || second.map_or(false, |s| self.len() % pp_char_bits(s) != 0)
        {
            return Err(Error::interpret(format!(
                "bitstring length {} is not a multiple of the group format size",
                self.len()
            )));
        }
        let colour = Colour::current();
        let offset_width = format!("{}", self.len()).len().max(3);
        let group_chars = pp_chars_per_group(first, bits_per_group)
            + second.map_or(0, |s| pp_chars_per_group(s, bits_per_group) + sep.len() + 2);
        let available = width.saturating_sub(if show_offset { offset_width + 2 } else { 0 });
        let groups_per_line = (available / (group_chars + sep.len())).max(1);
        let mut pos = 0usize;
        while pos < self.len() {
            if show_offset {
                write!(
                    writer,
                    "{}{:>offset_width$}: {}",
                    colour.purple, pos, colour.off
                )?;
            }
            let mut first_groups = Vec::new();
            let mut second_groups = Vec::new();
            let line_end = (pos + bits_per_group * groups_per_line).min(self.len());
            let mut p = pos;
            while p < line_end {
                let group_end = (p + bits_per_group).min(self.len());
                let group = self.slice_msb0(p, group_end);
                first_groups.push(pp_render(first, &group)?);
                if let Some(second) = second {
                    second_groups.push(pp_render(second, &group)?);
                }
                p = group_end;
            }
            write!(writer, "{}{}{}", colour.blue, first_groups.join(sep), colour.off)?;
            if second.is_some() {
                write!(writer, " : {}{}{}", colour.green, second_groups.join(sep), colour.off)?;
            }
            writeln!(writer)?;
            pos = line_end;
        }
        Ok(())
    }
}

fn parse_pp_fmt(fmt: Option<&str>) -> Result<(DtypeName, Option<DtypeName>, usize)> {
    let fmt = fmt.unwrap_or("bin, hex");
    let mut names = Vec::new();
    let mut group_bits = None;
    for item in fmt.split(',') {
        let item: String = item.chars().filter(|c| !c.is_whitespace()).collect();
        if item.is_empty() {
            continue;
        }
        let (name, length) = dtypes::split_token(&item)
            .map_err(|_| Error::value(format!("could not parse pp format '{fmt}'")))?;
        if !matches!(
            name,
            DtypeName::Bin | DtypeName::Oct | DtypeName::Hex | DtypeName::Bytes
        ) {
            return Err(Error::value(format!(
                "pretty printing only supports bin, oct, hex and bytes groups, not '{}'",
                name.as_str()
            )));
        }
        if let Some(length) = length {
            let bits = if name == DtypeName::Bytes { length * 8 } else { length };
            match group_bits {
                Some(existing) if existing != bits as usize => {
                    return Err(Error::value(
                        "both pp formats must use the same number of bits per group",
                    ))
                }
                _ => group_bits = Some(bits as usize),
            }
        }
        names.push(name);
    }
    let first = *names
        .first()
        .ok_or_else(|| Error::value(format!("could not parse pp format '{fmt}'")))?;
    if names.len() > 2 {
        return Err(Error::value("pp takes at most two group formats"));
    }
    let bits = group_bits.unwrap_or(match first {
        DtypeName::Oct => 12,
        DtypeName::Bytes => 32,
        _ => 8,
    });
    Ok((first, names.get(1).copied(), bits))
}

fn pp_char_bits(name: DtypeName) -> usize {
    match name {
        DtypeName::Hex => 4,
        DtypeName::Oct => 3,
        DtypeName::Bytes => 8,
        _ => 1,
    }
}

fn pp_chars_per_group(name: DtypeName, bits_per_group: usize) -> usize {
    bits_per_group / pp_char_bits(name)
}

fn pp_render(name: DtypeName, group: &Bits) -> Result<String> {
    match name {
        DtypeName::Bin => Ok(group.bin()),
        DtypeName::Oct => group.oct(),
        DtypeName::Hex => group.hex(),
        DtypeName::Bytes => Ok(group
            .bytes()?
            .iter()
            .map(|b| {
                let c = *b as char;
                if c.is_ascii_graphic() || c == ' ' {
                    c
                } else {
                    '.'
                }
            })
            .collect()),
        _ => Err(Error::value("unsupported pp format")),
    }
}

impl fmt::Display for Bits {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let length = self.len();
        if length == 0 {
            return Ok(());
        }
        if length > MAX_CHARS * 4 {
            let head = self.slice_msb0(0, MAX_CHARS * 4);
            return write!(f, "0x{}...", head.hex().map_err(|_| fmt::Error)?);
        }
        if length < 32 && length % 4 != 0 {
            return write!(f, "0b{}", self.bin());
        }
        if length % 4 == 0 {
            return write!(f, "0x{}", self.hex().map_err(|_| fmt::Error)?);
        }
        let cut = length - length % 4;
        let head = self.slice_msb0(0, cut);
        let tail = self.slice_msb0(cut, length);
        write!(
            f,
            "0x{}, 0b{}",
            head.hex().map_err(|_| fmt::Error)?,
            tail.bin()
        )
    }
}

impl PartialEq for Bits {
    fn eq(&self, other: &Bits) -> bool {
        self.store == other.store
    }
}

impl Eq for Bits {}

impl PartialEq<&str> for Bits {
    fn eq(&self, other: &&str) -> bool {
        Bits::from_string(other).map(|bits| bits == *self).unwrap_or(false)
    }
}

impl Hash for Bits {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.to_bytes().hash(state);
        self.len().hash(state);
    }
}

impl std::str::FromStr for Bits {
    type Err = Error;

    fn from_str(s: &str) -> Result<Bits> {
        Bits::from_string(s)
    }
}

impl std::ops::Add<&Bits> for &Bits {
    type Output = Bits;

    fn add(self, rhs: &Bits) -> Bits {
        self.concat(rhs)
    }
}

impl std::ops::Add<Bits> for Bits {
    type Output = Bits;

    fn add(self, rhs: Bits) -> Bits {
        self.concat(&rhs)
    }
}

impl<'a> IntoIterator for &'a Bits {
    type Item = bool;
    type IntoIter = BitIter<'a>;

    fn into_iter(self) -> BitIter<'a> {
        BitIter { bits: self, index: 0 }
    }
}

#[derive(Debug)]
pub struct BitIter<'a> {
    bits: &'a Bits,
    index: usize,
}

impl<'a> Iterator for BitIter<'a> {
    type Item = bool;

    fn next(&mut self) -> Option<bool> {
        if self.index < self.bits.len() {
            let bit = self.bits.store().get(self.bits.pos_msb0(self.index));
            self.index += 1;
            Some(bit)
        } else {
            None
        }
    }
}
