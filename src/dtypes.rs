use std::fmt;
use std::hash::{Hash, Hasher};

use derive_getters::Getters;

use crate::bits::Bits;
use crate::codecs;
use crate::fp8::{P3BINARY, P4BINARY};
use crate::mxfp;
use crate::options;
use crate::result::{Error, Result};
use crate::store::BitStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    Uint,
    Int,
    Float,
    Str,
    Bytes,
    Bits,
    Bool,
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum AllowedLengths {
    Any,
    Single(u32),
    InList(&'static [u32]),
    Range { min: u32, max: u32 },
    Multiples { of: u32, max: u32 },
}

impl AllowedLengths {
    pub fn contains(&self, length: u32) -> bool {
        match *self {
            AllowedLengths::Any => true,
            AllowedLengths::Single(n) => length == n,
            AllowedLengths::InList(ns) => ns.contains(&length),
            AllowedLengths::Range { min, max } => (min..=max).contains(&length),
            AllowedLengths::Multiples { of, max } => {
                length > 0 && length % of == 0 && length <= max
            }
        }
    }

    pub fn only_one(&self) -> Option<u32> {
        match *self {
            AllowedLengths::Single(n) => Some(n),
            _ => None,
        }
    }
}

impl fmt::Display for AllowedLengths {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            AllowedLengths::Any => write!(f, "any"),
            AllowedLengths::Single(n) => write!(f, "{n}"),
            AllowedLengths::InList(ns) => write!(f, "{ns:?}"),
            AllowedLengths::Range { min, max } => write!(f, "{min}..={max}"),
            AllowedLengths::Multiples { of, max } => write!(f, "({of}, {}, ...) up to {max}", of * 2),
        }
    }
}

#[derive(Debug, Getters)]
pub struct DtypeDefinition {
    name: &'static str,
    #[getter(skip)]
    allowed: AllowedLengths,
    is_signed: bool,
    variable_length: bool,
    bits_per_item: u32,
    kind: ValueKind,
    scalable: bool,
}

impl DtypeDefinition {
    pub(crate) fn allowed(&self) -> AllowedLengths {
        self.allowed
    }
}

// Kept in the same order as the DtypeName variants below.
#[rustfmt::skip]
static DEFINITIONS: &[DtypeDefinition] = &[
    DtypeDefinition { name: "uint", allowed: AllowedLengths::Range { min: 1, max: 128 }, is_signed: false, variable_length: false, bits_per_item: 1, kind: ValueKind::Uint, scalable: false },
    DtypeDefinition { name: "int", allowed: AllowedLengths::Range { min: 2, max: 128 }, is_signed: true, variable_length: false, bits_per_item: 1, kind: ValueKind::Int, scalable: false },
    DtypeDefinition { name: "uintbe", allowed: AllowedLengths::Multiples { of: 8, max: 128 }, is_signed: false, variable_length: false, bits_per_item: 1, kind: ValueKind::Uint, scalable: false },
    DtypeDefinition { name: "intbe", allowed: AllowedLengths::Multiples { of: 8, max: 128 }, is_signed: true, variable_length: false, bits_per_item: 1, kind: ValueKind::Int, scalable: false },
    DtypeDefinition { name: "uintle", allowed: AllowedLengths::Multiples { of: 8, max: 128 }, is_signed: false, variable_length: false, bits_per_item: 1, kind: ValueKind::Uint, scalable: false },
    DtypeDefinition { name: "intle", allowed: AllowedLengths::Multiples { of: 8, max: 128 }, is_signed: true, variable_length: false, bits_per_item: 1, kind: ValueKind::Int, scalable: false },
    DtypeDefinition { name: "uintne", allowed: AllowedLengths::Multiples { of: 8, max: 128 }, is_signed: false, variable_length: false, bits_per_item: 1, kind: ValueKind::Uint, scalable: false },
    DtypeDefinition { name: "intne", allowed: AllowedLengths::Multiples { of: 8, max: 128 }, is_signed: true, variable_length: false, bits_per_item: 1, kind: ValueKind::Int, scalable: false },
    DtypeDefinition { name: "floatbe", allowed: AllowedLengths::InList(&[16, 32, 64]), is_signed: true, variable_length: false, bits_per_item: 1, kind: ValueKind::Float, scalable: true },
    DtypeDefinition { name: "floatle", allowed: AllowedLengths::InList(&[16, 32, 64]), is_signed: true, variable_length: false, bits_per_item: 1, kind: ValueKind::Float, scalable: true },
    DtypeDefinition { name: "floatne", allowed: AllowedLengths::InList(&[16, 32, 64]), is_signed: true, variable_length: false, bits_per_item: 1, kind: ValueKind::Float, scalable: true },
    DtypeDefinition { name: "bfloatbe", allowed: AllowedLengths::Single(16), is_signed: true, variable_length: false, bits_per_item: 1, kind: ValueKind::Float, scalable: true },
    DtypeDefinition { name: "bfloatle", allowed: AllowedLengths::Single(16), is_signed: true, variable_length: false, bits_per_item: 1, kind: ValueKind::Float, scalable: true },
    DtypeDefinition { name: "bfloatne", allowed: AllowedLengths::Single(16), is_signed: true, variable_length: false, bits_per_item: 1, kind: ValueKind::Float, scalable: true },
    DtypeDefinition { name: "hex", allowed: AllowedLengths::Multiples { of: 4, max: u32::MAX }, is_signed: false, variable_length: false, bits_per_item: 1, kind: ValueKind::Str, scalable: false },
    DtypeDefinition { name: "oct", allowed: AllowedLengths::Multiples { of: 3, max: u32::MAX }, is_signed: false, variable_length: false, bits_per_item: 1, kind: ValueKind::Str, scalable: false },
    DtypeDefinition { name: "bin", allowed: AllowedLengths::Any, is_signed: false, variable_length: false, bits_per_item: 1, kind: ValueKind::Str, scalable: false },
    DtypeDefinition { name: "bits", allowed: AllowedLengths::Any, is_signed: false, variable_length: false, bits_per_item: 1, kind: ValueKind::Bits, scalable: false },
    DtypeDefinition { name: "bytes", allowed: AllowedLengths::Any, is_signed: false, variable_length: false, bits_per_item: 8, kind: ValueKind::Bytes, scalable: false },
    DtypeDefinition { name: "bool", allowed: AllowedLengths::Single(1), is_signed: false, variable_length: false, bits_per_item: 1, kind: ValueKind::Bool, scalable: false },
    DtypeDefinition { name: "pad", allowed: AllowedLengths::Any, is_signed: false, variable_length: false, bits_per_item: 1, kind: ValueKind::None, scalable: false },
    DtypeDefinition { name: "ue", allowed: AllowedLengths::Any, is_signed: false, variable_length: true, bits_per_item: 1, kind: ValueKind::Uint, scalable: false },
    DtypeDefinition { name: "se", allowed: AllowedLengths::Any, is_signed: true, variable_length: true, bits_per_item: 1, kind: ValueKind::Int, scalable: false },
    DtypeDefinition { name: "uie", allowed: AllowedLengths::Any, is_signed: false, variable_length: true, bits_per_item: 1, kind: ValueKind::Uint, scalable: false },
    DtypeDefinition { name: "sie", allowed: AllowedLengths::Any, is_signed: true, variable_length: true, bits_per_item: 1, kind: ValueKind::Int, scalable: false },
    DtypeDefinition { name: "p4binary", allowed: AllowedLengths::Single(8), is_signed: true, variable_length: false, bits_per_item: 1, kind: ValueKind::Float, scalable: true },
    DtypeDefinition { name: "p3binary", allowed: AllowedLengths::Single(8), is_signed: true, variable_length: false, bits_per_item: 1, kind: ValueKind::Float, scalable: true },
    DtypeDefinition { name: "e2m1mxfp", allowed: AllowedLengths::Single(4), is_signed: true, variable_length: false, bits_per_item: 1, kind: ValueKind::Float, scalable: true },
    DtypeDefinition { name: "e2m3mxfp", allowed: AllowedLengths::Single(6), is_signed: true, variable_length: false, bits_per_item: 1, kind: ValueKind::Float, scalable: true },
    DtypeDefinition { name: "e3m2mxfp", allowed: AllowedLengths::Single(6), is_signed: true, variable_length: false, bits_per_item: 1, kind: ValueKind::Float, scalable: true },
    DtypeDefinition { name: "e4m3mxfp", allowed: AllowedLengths::Single(8), is_signed: true, variable_length: false, bits_per_item: 1, kind: ValueKind::Float, scalable: true },
    DtypeDefinition { name: "e5m2mxfp", allowed: AllowedLengths::Single(8), is_signed: true, variable_length: false, bits_per_item: 1, kind: ValueKind::Float, scalable: true },
    DtypeDefinition { name: "e8m0mxfp", allowed: AllowedLengths::Single(8), is_signed: false, variable_length: false, bits_per_item: 1, kind: ValueKind::Float, scalable: false },
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DtypeName {
    Uint,
    Int,
    UintBe,
    IntBe,
    UintLe,
    IntLe,
    UintNe,
    IntNe,
    FloatBe,
    FloatLe,
    FloatNe,
    BfloatBe,
    BfloatLe,
    BfloatNe,
    Hex,
    Oct,
    Bin,
    Bits,
    Bytes,
    Bool,
    Pad,
    Ue,
    Se,
    Uie,
    Sie,
    P4Binary,
    P3Binary,
    E2M1Mxfp,
    E2M3Mxfp,
    E3M2Mxfp,
    E4M3Mxfp,
    E5M2Mxfp,
    E8M0Mxfp,
}

impl DtypeName {
    pub(crate) fn from_name(name: &str) -> Option<DtypeName> {
        let lowered = name.to_ascii_lowercase();
        let name = match lowered.as_str() {
            "uint" => DtypeName::Uint,
            "int" => DtypeName::Int,
            "uintbe" => DtypeName::UintBe,
            "intbe" => DtypeName::IntBe,
            "uintle" => DtypeName::UintLe,
            "intle" => DtypeName::IntLe,
            "uintne" => DtypeName::UintNe,
            "intne" => DtypeName::IntNe,
            "float" | "floatbe" => DtypeName::FloatBe,
            "floatle" => DtypeName::FloatLe,
            "floatne" => DtypeName::FloatNe,
            "bfloat" | "bfloatbe" => DtypeName::BfloatBe,
            "bfloatle" => DtypeName::BfloatLe,
            "bfloatne" => DtypeName::BfloatNe,
            "hex" => DtypeName::Hex,
            "oct" => DtypeName::Oct,
            "bin" => DtypeName::Bin,
            "bits" => DtypeName::Bits,
            "bytes" => DtypeName::Bytes,
            "bool" => DtypeName::Bool,
            "pad" => DtypeName::Pad,
            "ue" => DtypeName::Ue,
            "se" => DtypeName::Se,
            "uie" => DtypeName::Uie,
            "sie" => DtypeName::Sie,
            "p4binary" => DtypeName::P4Binary,
            "p3binary" => DtypeName::P3Binary,
            "e2m1mxfp" => DtypeName::E2M1Mxfp,
            "e2m3mxfp" => DtypeName::E2M3Mxfp,
            "e3m2mxfp" => DtypeName::E3M2Mxfp,
            "e4m3mxfp" => DtypeName::E4M3Mxfp,
            "e5m2mxfp" => DtypeName::E5M2Mxfp,
            "e8m0mxfp" => DtypeName::E8M0Mxfp,
            _ => return None,
        };
        Some(name)
    }

    pub(crate) fn definition(self) -> &'static DtypeDefinition {
        &DEFINITIONS[self as usize]
    }

    pub fn as_str(self) -> &'static str {
        self.definition().name
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Scale {
    Factor(f64),
    Auto,
}

#[derive(Debug, Clone, Copy)]
pub struct Dtype {
    name: DtypeName,
    length: Option<u32>,
    scale: Option<Scale>,
}

impl PartialEq for Dtype {
    fn eq(&self, other: &Dtype) -> bool {
        self.name == other.name && self.length == other.length
    }
}

impl Eq for Dtype {}

impl Hash for Dtype {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
        self.length.hash(state);
    }
}

impl fmt::Display for Dtype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let def = self.name.definition();
        let hide = def.variable_length || def.allowed().only_one().is_some();
        match self.length {
            Some(length) if !hide => write!(f, "{}{}", self.name.as_str(), length),
            _ => write!(f, "{}", self.name.as_str()),
        }
    }
}

impl std::str::FromStr for Dtype {
    type Err = Error;

    fn from_str(s: &str) -> Result<Dtype> {
        Dtype::new(s)
    }
}

impl Dtype {
    pub fn new(token: &str) -> Result<Dtype> {
        let (name, length) = split_token(token)?;
        Dtype::resolve(name, length, None)
    }

    pub fn with_length(name: &str, length: u32) -> Result<Dtype> {
        let (name, embedded) = split_token(name)?;
        if embedded.is_some() {
            return Err(Error::creation(format!(
                "length of {length} supplied for a dtype token that already embeds one"
            )));
        }
        Dtype::resolve(name, Some(length), None)
    }

    pub fn scaled(token: &str, scale: Scale) -> Result<Dtype> {
        let (name, length) = split_token(token)?;
        let dtype = Dtype::resolve(name, length, Some(scale))?;
        if !dtype.definition().scalable {
            return Err(Error::creation(format!(
                "a scale factor is not allowed for the '{}' dtype",
                dtype.name.as_str()
            )));
        }
        Ok(dtype)
    }

    pub(crate) fn resolve(
        name: DtypeName,
        length: Option<u32>,
        scale: Option<Scale>,
    ) -> Result<Dtype> {
        let def = name.definition();
        if def.variable_length {
            if length.is_some() {
                return Err(Error::creation(format!(
                    "a length should not be supplied for the variable-length dtype '{}'",
                    def.name
                )));
            }
            return Ok(Dtype { name, length: None, scale });
        }
        let length = length.or_else(|| def.allowed().only_one());
        if let Some(length) = length {
            if !def.allowed().contains(length) {
                return Err(Error::creation(format!(
                    "length of {length} is not allowed for the '{}' dtype; allowed lengths are {}",
                    def.name,
                    def.allowed()
                )));
            }
        }
        Ok(Dtype { name, length, scale })
    }

    pub fn name(&self) -> DtypeName {
        self.name
    }

    pub fn length(&self) -> Option<u32> {
        self.length
    }

    pub fn scale(&self) -> Option<Scale> {
        self.scale
    }

    pub(crate) fn with_scale_factor(mut self, scale: Option<Scale>) -> Dtype {
        self.scale = scale;
        self
    }

    pub(crate) fn definition(&self) -> &'static DtypeDefinition {
        self.name.definition()
    }

    pub fn bits_per_item(&self) -> u32 {
        self.definition().bits_per_item
    }

    pub fn bit_length(&self) -> Option<u32> {
        self.length.map(|n| n * self.bits_per_item())
    }

    pub fn is_signed(&self) -> bool {
        self.definition().is_signed
    }

    pub fn variable_length(&self) -> bool {
        self.definition().variable_length
    }

    pub fn kind(&self) -> ValueKind {
        self.definition().kind
    }

    pub fn build(&self, value: &Value) -> Result<Bits> {
        let value = self.descale(value)?;
        let store = encode_raw(self.name, self.length, &value)?;
        if let Some(bit_length) = self.bit_length() {
            if store.len() != bit_length as usize {
                return Err(Error::creation(format!(
                    "value encoded to {} bits but the '{self}' dtype requires {bit_length}",
                    store.len()
                )));
            }
        }
        Ok(Bits::from_store(store))
    }

    pub fn build_from_str(&self, text: &str) -> Result<Bits> {
        self.build(&parse_value_str(self.kind(), text)?)
    }

    pub fn parse(&self, bits: &Bits) -> Result<Value> {
        let store = bits.store();
        if let Some(bit_length) = self.bit_length() {
            if store.len() != bit_length as usize {
                return Err(Error::interpret(format!(
                    "bitstring length {} doesn't match the {bit_length} bits needed for '{self}'",
                    store.len()
                )));
            }
        }
        if self.variable_length() {
            let (value, consumed) = read_variable(self.name, store, 0)?;
            if consumed != store.len() {
                return Err(Error::interpret(format!(
                    "'{self}' code used only {consumed} of {} bits",
                    store.len()
                )));
            }
            return Ok(value);
        }
        if !self.definition().allowed().contains(store.len() as u32) {
            return Err(Error::interpret(format!(
                "'{}' dtypes must have a length of {}, but received a length of {}",
                self.name.as_str(),
                self.definition().allowed(),
                store.len()
            )));
        }
        self.rescale(decode_raw(self.name, store)?)
    }

    pub fn read(&self, bits: &Bits, pos: usize) -> Result<(Value, usize)> {
        let store = bits.store();
        if self.variable_length() {
            let (value, consumed) = read_variable(self.name, store, pos)?;
            return Ok((self.rescale(value)?, pos + consumed));
        }
        let bit_length = self.bit_length().ok_or_else(|| {
            Error::value(format!("cannot read a '{self}' dtype with no length"))
        })? as usize;
        if pos + bit_length > store.len() {
            return Err(Error::read(format!(
                "needed {bit_length} bits to read a '{self}' but only {} were available",
                store.len().saturating_sub(pos)
            )));
        }
        let value = decode_raw(self.name, &store.slice(pos, pos + bit_length))?;
        Ok((self.rescale(value)?, pos + bit_length))
    }

    pub(crate) fn max_abs_finite(&self) -> Option<f64> {
        match self.name {
            DtypeName::P4Binary => Some((0..=255u32).map(|c| P4BINARY.decode(c as u8)).filter(|v| v.is_finite()).fold(0.0, |a: f64, v| a.max(v.abs()))),
            DtypeName::P3Binary => Some((0..=255u32).map(|c| P3BINARY.decode(c as u8)).filter(|v| v.is_finite()).fold(0.0, |a: f64, v| a.max(v.abs()))),
            DtypeName::E2M1Mxfp | DtypeName::E2M3Mxfp | DtypeName::E3M2Mxfp
            | DtypeName::E4M3Mxfp | DtypeName::E5M2Mxfp => {
                Some(mxfp_format(self.name).max_finite())
            }
            DtypeName::FloatBe | DtypeName::FloatLe | DtypeName::FloatNe => match self.length {
                Some(16) => Some(65504.0),
                Some(32) => Some(f32::MAX as f64),
                Some(64) => Some(f64::MAX),
                _ => None,
            },
            DtypeName::BfloatBe | DtypeName::BfloatLe | DtypeName::BfloatNe => {
                Some(half::bf16::MAX.to_f64())
            }
            _ => None,
        }
    }

    fn descale(&self, value: &Value) -> Result<Value> {
        match self.scale {
            None => Ok(value.clone()),
            Some(Scale::Auto) => Err(Error::creation(
                "an auto scale can only be resolved when constructing an Array from values",
            )),
            Some(Scale::Factor(factor)) => {
                let f = value.to_f64().ok_or_else(|| {
                    Error::creation(format!("cannot apply a scale factor to {value:?}"))
                })?;
                Ok(Value::Float(f / factor))
            }
        }
    }

    fn rescale(&self, value: Value) -> Result<Value> {
        match self.scale {
            None => Ok(value),
            Some(Scale::Auto) => Err(Error::interpret(
                "an auto scale must be resolved before it can be used for interpretation",
            )),
            Some(Scale::Factor(factor)) => {
                let f = value.to_f64().ok_or_else(|| {
                    Error::interpret(format!("cannot apply a scale factor to {value:?}"))
                })?;
                Ok(Value::Float(f * factor))
            }
        }
    }
}

pub(crate) fn split_token(token: &str) -> Result<(DtypeName, Option<u32>)> {
    let trimmed = token.trim();
    if let Some(name) = DtypeName::from_name(trimmed) {
        return Ok((name, None));
    }
    let digits_at = trimmed
        .rfind(|c: char| !c.is_ascii_digit())
        .map(|i| i + 1)
        .unwrap_or(0);
    let (prefix, digits) = trimmed.split_at(digits_at);
    let prefix = prefix.strip_suffix(':').unwrap_or(prefix);
    if prefix.is_empty() || digits.is_empty() {
        return Err(Error::creation(format!("unknown dtype name '{token}'")));
    }
    let name = DtypeName::from_name(prefix)
        .ok_or_else(|| Error::creation(format!("unknown dtype name '{token}'")))?;
    let length: u32 = digits
        .parse()
        .map_err(|_| Error::creation(format!("cannot parse length in dtype token '{token}'")))?;
    Ok((name, Some(length)))
}

fn mxfp_format(name: DtypeName) -> &'static mxfp::MxfpFormat {
    let overflow = options::mxfp_overflow();
    match name {
        DtypeName::E2M1Mxfp => mxfp::format_for(2, 1, overflow),
        DtypeName::E2M3Mxfp => mxfp::format_for(2, 3, overflow),
        DtypeName::E3M2Mxfp => mxfp::format_for(3, 2, overflow),
        DtypeName::E4M3Mxfp => mxfp::format_for(4, 3, overflow),
        _ => mxfp::format_for(5, 2, overflow),
    }
}

fn require_length(length: Option<u32>, name: DtypeName) -> Result<u32> {
    length.ok_or_else(|| {
        Error::creation(format!(
            "a length must be specified to encode a '{}' value",
            name.as_str()
        ))
    })
}

pub(crate) fn encode_raw(name: DtypeName, length: Option<u32>, value: &Value) -> Result<BitStore> {
    match name {
        DtypeName::Uint => codecs::uint_to_store(value.expect_uint()?, require_length(length, name)?),
        DtypeName::Int => codecs::int_to_store(value.expect_int()?, require_length(length, name)?),
        DtypeName::UintBe => codecs::uintbe_to_store(value.expect_uint()?, require_length(length, name)?),
        DtypeName::IntBe => codecs::intbe_to_store(value.expect_int()?, require_length(length, name)?),
        DtypeName::UintLe => codecs::uintle_to_store(value.expect_uint()?, require_length(length, name)?),
        DtypeName::IntLe => codecs::intle_to_store(value.expect_int()?, require_length(length, name)?),
        DtypeName::UintNe => codecs::uintne_to_store(value.expect_uint()?, require_length(length, name)?),
        DtypeName::IntNe => codecs::intne_to_store(value.expect_int()?, require_length(length, name)?),
        DtypeName::FloatBe => codecs::float_to_store(value.expect_float()?, require_length(length, name)?),
        DtypeName::FloatLe => codecs::floatle_to_store(value.expect_float()?, require_length(length, name)?),
        DtypeName::FloatNe => codecs::floatne_to_store(value.expect_float()?, require_length(length, name)?),
        DtypeName::BfloatBe => codecs::bfloat_to_store(value.expect_float()?),
        DtypeName::BfloatLe => codecs::bfloatle_to_store(value.expect_float()?),
        DtypeName::BfloatNe => codecs::bfloatne_to_store(value.expect_float()?),
        DtypeName::Hex => codecs::hex_to_store(value.expect_str()?),
        DtypeName::Oct => codecs::oct_to_store(value.expect_str()?),
        DtypeName::Bin => codecs::bin_to_store(value.expect_str()?),
        DtypeName::Bits => match value {
            Value::Bits(bits) => Ok(bits.store().clone()),
            Value::Str(s) => Ok(Bits::from_string(s)?.store().clone()),
            other => Err(Error::creation(format!("cannot create bits from {other:?}"))),
        },
        DtypeName::Bytes => match value {
            Value::Bytes(data) => Ok(codecs::bytes_to_store(data)),
            other => Err(Error::creation(format!("cannot create bytes from {other:?}"))),
        },
        DtypeName::Bool => Ok(codecs::bool_to_store(value.expect_bool()?)),
        DtypeName::Pad => Ok(BitStore::zeros(require_length(length, name)? as usize)),
        DtypeName::Ue => codecs::ue_to_store(value.expect_uint()?),
        DtypeName::Se => codecs::se_to_store(value.expect_int()?),
        DtypeName::Uie => codecs::uie_to_store(value.expect_uint()?),
        DtypeName::Sie => codecs::sie_to_store(value.expect_int()?),
        DtypeName::P4Binary => codecs::uint_to_store(P4BINARY.encode(value.expect_float()?) as u128, 8),
        DtypeName::P3Binary => codecs::uint_to_store(P3BINARY.encode(value.expect_float()?) as u128, 8),
        DtypeName::E2M1Mxfp | DtypeName::E2M3Mxfp | DtypeName::E3M2Mxfp
        | DtypeName::E4M3Mxfp | DtypeName::E5M2Mxfp => {
            let format = mxfp_format(name);
            let code = format.encode(value.expect_float()?)?;
            codecs::uint_to_store(code as u128, format.width())
        }
        DtypeName::E8M0Mxfp => {
            codecs::uint_to_store(mxfp::e8m0_encode(value.expect_float()?)? as u128, 8)
        }
    }
}

pub(crate) fn decode_raw(name: DtypeName, store: &BitStore) -> Result<Value> {
    let value = match name {
        DtypeName::Uint => Value::Uint(codecs::store_to_uint(store)?),
        DtypeName::Int => Value::Int(codecs::store_to_int(store)?),
        DtypeName::UintBe => Value::Uint(codecs::store_to_uintbe(store)?),
        DtypeName::IntBe => Value::Int(codecs::store_to_intbe(store)?),
        DtypeName::UintLe => Value::Uint(codecs::store_to_uintle(store)?),
        DtypeName::IntLe => Value::Int(codecs::store_to_intle(store)?),
        DtypeName::UintNe => Value::Uint(codecs::store_to_uintne(store)?),
        DtypeName::IntNe => Value::Int(codecs::store_to_intne(store)?),
        DtypeName::FloatBe => Value::Float(codecs::store_to_float(store)?),
        DtypeName::FloatLe => Value::Float(codecs::store_to_floatle(store)?),
        DtypeName::FloatNe => Value::Float(codecs::store_to_floatne(store)?),
        DtypeName::BfloatBe => Value::Float(codecs::store_to_bfloat(store)?),
        DtypeName::BfloatLe => Value::Float(codecs::store_to_bfloatle(store)?),
        DtypeName::BfloatNe => Value::Float(codecs::store_to_bfloatne(store)?),
        DtypeName::Hex => Value::Str(codecs::store_to_hex(store)?),
        DtypeName::Oct => Value::Str(codecs::store_to_oct(store)?),
        DtypeName::Bin => Value::Str(codecs::store_to_bin(store)),
        DtypeName::Bits => Value::Bits(Bits::from_store(store.clone())),
        DtypeName::Bytes => Value::Bytes(codecs::store_to_exact_bytes(store)?),
        DtypeName::Bool => Value::Bool(codecs::store_to_bool(store)?),
        DtypeName::Pad => {
            return Err(Error::interpret("cannot interpret a pad dtype as a value"))
        }
        DtypeName::Ue | DtypeName::Se | DtypeName::Uie | DtypeName::Sie => {
            let (value, consumed) = read_variable(name, store, 0)?;
            if consumed != store.len() {
                return Err(Error::interpret(format!(
                    "'{}' code used only {consumed} of {} bits",
                    name.as_str(),
                    store.len()
                )));
            }
            return Ok(value);
        }
        DtypeName::P4Binary => {
            if store.len() != 8 {
                return Err(wrong_width(name, 8, store.len()));
            }
            Value::Float(P4BINARY.decode(store.load_uint(0, 8) as u8))
        }
        DtypeName::P3Binary => {
            if store.len() != 8 {
                return Err(wrong_width(name, 8, store.len()));
            }
            Value::Float(P3BINARY.decode(store.load_uint(0, 8) as u8))
        }
        DtypeName::E2M1Mxfp | DtypeName::E2M3Mxfp | DtypeName::E3M2Mxfp
        | DtypeName::E4M3Mxfp | DtypeName::E5M2Mxfp => {
            let format = mxfp_format(name);
            let width = format.width() as usize;
            if store.len() != width {
                return Err(wrong_width(name, width, store.len()));
            }
            Value::Float(format.decode(store.load_uint(0, width) as u32))
        }
        DtypeName::E8M0Mxfp => {
            if store.len() != 8 {
                return Err(wrong_width(name, 8, store.len()));
            }
            Value::Float(mxfp::e8m0_decode(store.load_uint(0, 8) as u32))
        }
    };
    Ok(value)
}

fn wrong_width(name: DtypeName, expected: usize, got: usize) -> Error {
    Error::interpret(format!(
        "'{}' dtypes must have a length of {expected}, but received a length of {got}",
        name.as_str()
    ))
}

fn read_variable(name: DtypeName, store: &BitStore, pos: usize) -> Result<(Value, usize)> {
    match name {
        DtypeName::Ue => codecs::read_ue(store, pos).map(|(v, n)| (Value::Uint(v), n)),
        DtypeName::Se => codecs::read_se(store, pos).map(|(v, n)| (Value::Int(v), n)),
        DtypeName::Uie => codecs::read_uie(store, pos).map(|(v, n)| (Value::Uint(v), n)),
        DtypeName::Sie => codecs::read_sie(store, pos).map(|(v, n)| (Value::Int(v), n)),
        _ => Err(Error::interpret(format!(
            "'{}' is not a variable-length dtype",
            name.as_str()
        ))),
    }
}

pub(crate) fn parse_value_str(kind: ValueKind, text: &str) -> Result<Value> {
    let text = text.trim();
    match kind {
        ValueKind::Uint => parse_uint_str(text).map(Value::Uint),
        ValueKind::Int => parse_int_str(text).map(Value::Int),
        ValueKind::Float => text
            .parse::<f64>()
            .map(Value::Float)
            .map_err(|_| Error::creation(format!("cannot parse '{text}' as a float"))),
        ValueKind::Str | ValueKind::Bits => Ok(Value::Str(text.to_owned())),
        ValueKind::Bool => match text.to_ascii_lowercase().as_str() {
            "true" | "1" => Ok(Value::Bool(true)),
            "false" | "0" => Ok(Value::Bool(false)),
            _ => Err(Error::creation(format!("cannot parse '{text}' as a bool"))),
        },
        ValueKind::Bytes => Err(Error::creation(
            "bytes values cannot be embedded in a format string",
        )),
        ValueKind::None => Err(Error::creation("a pad token cannot take a value")),
    }
}

fn parse_uint_str(text: &str) -> Result<u128> {
    let (digits, radix) = match text.get(..2) {
        Some("0x") | Some("0X") => (&text[2..], 16),
        Some("0o") | Some("0O") => (&text[2..], 8),
        Some("0b") | Some("0B") => (&text[2..], 2),
        _ => (text, 10),
    };
    u128::from_str_radix(digits, radix)
        .map_err(|_| Error::creation(format!("cannot parse '{text}' as an unsigned integer")))
}

fn parse_int_str(text: &str) -> Result<i128> {
    let (rest, negative) = match text.strip_prefix('-') {
        Some(rest) => (rest, true),
        None => (text.strip_prefix('+').unwrap_or(text), false),
    };
    let magnitude = parse_uint_str(rest)
        .map_err(|_| Error::creation(format!("cannot parse '{text}' as an integer")))?;
    let magnitude = i128::try_from(magnitude)
        .map_err(|_| Error::creation(format!("'{text}' is out of range for an integer")))?;
    Ok(if negative { -magnitude } else { magnitude })
}

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Uint(u128),
    Int(i128),
    Float(f64),
    Str(String),
    Bytes(Vec<u8>),
    Bits(Bits),
    Bool(bool),
    None,
}

impl Value {
    pub fn to_f64(&self) -> Option<f64> {
        match self {
            Value::Uint(v) => Some(*v as f64),
            Value::Int(v) => Some(*v as f64),
            Value::Float(v) => Some(*v),
            Value::Bool(v) => Some(*v as u8 as f64),
            _ => None,
        }
    }

    pub fn to_i128(&self) -> Option<i128> {
        match self {
            Value::Uint(v) => i128::try_from(*v).ok(),
            Value::Int(v) => Some(*v),
            Value::Bool(v) => Some(*v as i128),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Bytes(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_bits(&self) -> Option<&Bits> {
        match self {
            Value::Bits(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub(crate) fn expect_uint(&self) -> Result<u128> {
        match self {
            Value::Uint(v) => Ok(*v),
            Value::Int(v) if *v >= 0 => Ok(*v as u128),
            Value::Float(v) if v.fract() == 0.0 && *v >= 0.0 => Ok(*v as u128),
            other => Err(Error::creation(format!(
                "cannot use {other:?} as an unsigned integer"
            ))),
        }
    }

    pub(crate) fn expect_int(&self) -> Result<i128> {
        match self {
            Value::Int(v) => Ok(*v),
            Value::Uint(v) => i128::try_from(*v)
                .map_err(|_| Error::creation(format!("{v} is too large for a signed integer"))),
            Value::Float(v) if v.fract() == 0.0 => Ok(*v as i128),
            other => Err(Error::creation(format!("cannot use {other:?} as an integer"))),
        }
    }

    pub(crate) fn expect_float(&self) -> Result<f64> {
        self.to_f64()
            .ok_or_else(|| Error::creation(format!("cannot use {self:?} as a float")))
    }

    pub(crate) fn expect_str(&self) -> Result<&str> {
        self.as_str()
            .ok_or_else(|| Error::creation(format!("cannot use {self:?} as a string")))
    }

    pub(crate) fn expect_bool(&self) -> Result<bool> {
        match self {
            Value::Bool(b) => Ok(*b),
            Value::Uint(0) | Value::Int(0) => Ok(false),
            Value::Uint(1) | Value::Int(1) => Ok(true),
            other => Err(Error::creation(format!("cannot use {other:?} as a bool"))),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Uint(v) => write!(f, "{v}"),
            Value::Int(v) => write!(f, "{v}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::Str(v) => write!(f, "{v}"),
            Value::Bytes(v) => write!(f, "{v:02x?}"),
            Value::Bits(v) => write!(f, "{v}"),
            Value::Bool(v) => write!(f, "{v}"),
            Value::None => write!(f, "None"),
        }
    }
}

macro_rules! value_from_uint {
    ($($ty:ty),*) => {
        $(impl From<$ty> for Value {
            fn from(v: $ty) -> Value {
                Value::Uint(v as u128)
            }
        })*
    };
}

macro_rules! value_from_int {
    ($($ty:ty),*) => {
        $(impl From<$ty> for Value {
            fn from(v: $ty) -> Value {
                Value::Int(v as i128)
            }
        })*
    };
}

value_from_uint!(u8, u16, u32, u64, u128, usize);
value_from_int!(i8, i16, i32, i64, i128, isize);

impl From<f32> for Value {
    fn from(v: f32) -> Value {
        Value::Float(v as f64)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Value {
        Value::Float(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Value {
        Value::Bool(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Value {
        Value::Str(v.to_owned())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Value {
        Value::Str(v)
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Value {
        Value::Bytes(v)
    }
}

impl From<&[u8]> for Value {
    fn from(v: &[u8]) -> Value {
        Value::Bytes(v.to_vec())
    }
}

impl From<Bits> for Value {
    fn from(v: Bits) -> Value {
        Value::Bits(v)
    }
}

impl From<&Bits> for Value {
    fn from(v: &Bits) -> Value {
        Value::Bits(v.clone())
    }
}
