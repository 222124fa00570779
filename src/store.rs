use bitvec::field::BitField;
use bitvec::prelude::{BitSlice, BitVec, Msb0};

use crate::utils::div_ceil;

// A light wrapper around a `BitVec` that the higher layers build on.
// Storage is always MSB0; the LSB0 option is translated away at the API
// boundary before positions reach this type.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct BitStore {
    bits: BitVec<u8, Msb0>,
}

impl BitStore {
    pub fn new() -> BitStore {
        BitStore { bits: BitVec::new() }
    }

    pub fn zeros(len: usize) -> BitStore {
        BitStore {
            bits: BitVec::repeat(false, len),
        }
    }

    pub fn ones(len: usize) -> BitStore {
        BitStore {
            bits: BitVec::repeat(true, len),
        }
    }

    pub fn with_capacity(len: usize) -> BitStore {
        BitStore {
            bits: BitVec::with_capacity(len),
        }
    }

    pub fn from_bools<I>(values: I) -> BitStore
    where
        I: IntoIterator<Item = bool>,
    {
        BitStore {
            bits: values.into_iter().collect(),
        }
    }

    pub fn from_bytes(data: &[u8]) -> BitStore {
        BitStore {
            bits: BitVec::from_slice(data),
        }
    }

    pub fn from_bytes_offset(data: &[u8], bit_offset: usize, bit_len: usize) -> BitStore {
        debug_assert!(bit_offset + bit_len <= data.len() * 8);
        let all = BitSlice::<u8, Msb0>::from_slice(data);
        BitStore {
            bits: all[bit_offset..bit_offset + bit_len].to_bitvec(),
        }
    }

    pub fn len(&self) -> usize {
        self.bits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bits.is_empty()
    }

    pub fn get(&self, index: usize) -> bool {
        self.bits[index]
    }

    pub fn set(&mut self, index: usize, value: bool) {
        self.bits.set(index, value);
    }

    pub fn push(&mut self, value: bool) {
        self.bits.push(value);
    }

    pub fn slice(&self, start: usize, end: usize) -> BitStore {
        BitStore {
            bits: self.bits[start..end].to_bitvec(),
        }
    }

    pub fn slice_step(&self, start: usize, end: usize, step: usize) -> BitStore {
        debug_assert!(step > 0);
        let mut out = BitVec::with_capacity((end - start) / step + 1);
        let mut k = 0;
        while start + k < end {
            out.push(self.bits[start + k]);
            k += step;
        }
        BitStore { bits: out }
    }

    pub fn append(&mut self, other: &BitStore) {
        self.bits.extend_from_bitslice(&other.bits);
    }

    pub fn prepend(&mut self, other: &BitStore) {
        let mut joined = BitVec::with_capacity(self.len() + other.len());
        joined.extend_from_bitslice(&other.bits);
        joined.extend_from_bitslice(&self.bits);
        self.bits = joined;
    }

    pub fn insert_at(&mut self, pos: usize, other: &BitStore) {
        let mut joined = BitVec::with_capacity(self.len() + other.len());
        joined.extend_from_bitslice(&self.bits[..pos]);
        joined.extend_from_bitslice(&other.bits);
        joined.extend_from_bitslice(&self.bits[pos..]);
        self.bits = joined;
    }

    pub fn overwrite_at(&mut self, pos: usize, other: &BitStore) {
        let end = pos + other.len();
        if end > self.len() {
            self.bits.resize(end, false);
        }
        self.bits[pos..end].copy_from_bitslice(&other.bits);
    }

    pub fn remove_range(&mut self, start: usize, end: usize) {
        self.bits.drain(start..end);
    }

    pub fn truncate(&mut self, len: usize) {
        self.bits.truncate(len);
    }

    pub fn clear(&mut self) {
        self.bits.clear();
    }

    pub fn and(&self, other: &BitStore) -> BitStore {
        debug_assert_eq!(self.len(), other.len());
        let mut out = self.bits.clone();
        out &= other.bits.as_bitslice();
        BitStore { bits: out }
    }

    pub fn or(&self, other: &BitStore) -> BitStore {
        debug_assert_eq!(self.len(), other.len());
        let mut out = self.bits.clone();
        out |= other.bits.as_bitslice();
        BitStore { bits: out }
    }

    pub fn xor(&self, other: &BitStore) -> BitStore {
        debug_assert_eq!(self.len(), other.len());
        let mut out = self.bits.clone();
        out ^= other.bits.as_bitslice();
        BitStore { bits: out }
    }

    pub fn invert_all(&mut self) {
        for mut bit in self.bits.iter_mut() {
            *bit = !*bit;
        }
    }

    pub fn invert_bit(&mut self, index: usize) {
        let value = self.bits[index];
        self.bits.set(index, !value);
    }

    pub fn invert_range(&mut self, start: usize, end: usize) {
        for mut bit in self.bits[start..end].iter_mut() {
            *bit = !*bit;
        }
    }

    pub fn set_range(&mut self, start: usize, end: usize, value: bool) {
        self.bits[start..end].fill(value);
    }

    pub fn reverse_range(&mut self, start: usize, end: usize) {
        self.bits[start..end].reverse();
    }

    pub fn count_ones(&self) -> usize {
        self.bits.count_ones()
    }

    pub fn first_one_from(&self, start: usize) -> Option<usize> {
        self.bits[start..].first_one().map(|i| i + start)
    }

    pub fn matches_at(&self, sub: &BitStore, pos: usize) -> bool {
        pos + sub.len() <= self.len() && self.bits[pos..pos + sub.len()] == sub.bits
    }

    // Big-endian field load; `end - start` must be in 1..=128.
    pub fn load_uint(&self, start: usize, end: usize) -> u128 {
        self.bits[start..end].load_be::<u128>()
    }

    // Stores the low `end - start` bits of `value` big-endian first.
    pub fn store_uint(&mut self, start: usize, end: usize, value: u128) {
        self.bits[start..end].store_be::<u128>(value);
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut aligned = self.bits.clone();
        aligned.force_align();
        aligned.set_uninitialized(false);
        let mut out = aligned.into_vec();
        out.truncate(div_ceil(self.len(), 8));
        out
    }
}

impl FromIterator<bool> for BitStore {
    fn from_iter<I: IntoIterator<Item = bool>>(iter: I) -> BitStore {
        BitStore::from_bools(iter)
    }
}

impl<'a> IntoIterator for &'a BitStore {
    type Item = bool;
    type IntoIter = Iter<'a>;

    fn into_iter(self) -> Iter<'a> {
        Iter { store: self, index: 0 }
    }
}

#[derive(Debug)]
pub(crate) struct Iter<'a> {
    store: &'a BitStore,
    index: usize,
}

impl<'a> Iterator for Iter<'a> {
    type Item = bool;

    fn next(&mut self) -> Option<bool> {
        if self.index < self.store.len() {
            let bit = self.store.get(self.index);
            self.index += 1;
            Some(bit)
        } else {
            None
        }
    }
}
