mod array;
mod bitarray;
mod bits;
mod codecs;
mod constants;
mod dtypes;
mod fp8;
mod mxfp;
pub mod options;
mod pack;
pub mod result;
mod store;
mod stream;
mod tokens;
mod utils;

pub use array::{Array, Scalar};
pub use bitarray::BitArray;
pub use bits::Bits;
pub use dtypes::{Dtype, DtypeDefinition, DtypeName, Scale, Value, ValueKind};
pub use options::MxfpOverflow;
pub use pack::{pack, pack_with};
pub use result::{Error, Result};
pub use stream::{BitStream, ConstBitStream};
