use std::fmt;
use std::io;

use crate::bitarray::BitArray;
use crate::bits::Bits;
use crate::dtypes::{self, Dtype, Scale, Value, ValueKind};
use crate::options::Colour;
use crate::result::{Error, Result};
use crate::store::BitStore;
use crate::utils::{div_ceil, sign_extend};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Scalar {
    Int(i128),
    Float(f64),
}

macro_rules! scalar_from_int {
    ($($ty:ty),*) => {
        $(impl From<$ty> for Scalar {
            fn from(v: $ty) -> Scalar {
                Scalar::Int(v as i128)
            }
        })*
    };
}

scalar_from_int!(u8, u16, u32, u64, usize, i8, i16, i32, i64, i128, isize);

impl From<f64> for Scalar {
    fn from(v: f64) -> Scalar {
        Scalar::Float(v)
    }
}

impl From<f32> for Scalar {
    fn from(v: f32) -> Scalar {
        Scalar::Float(v as f64)
    }
}

impl Scalar {
    fn to_f64(self) -> f64 {
        match self {
            Scalar::Int(v) => v as f64,
            Scalar::Float(v) => v,
        }
    }

    fn to_i128(self) -> Result<i128> {
        match self {
            Scalar::Int(v) => Ok(v),
            Scalar::Float(v) if v.fract() == 0.0 => Ok(v as i128),
            Scalar::Float(v) => Err(Error::value(format!(
                "cannot use the float {v} in integer array arithmetic"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ArithOp {
    Add,
    Sub,
    Mul,
    Div,
    FloorDiv,
    Rem,
    Shl,
    Shr,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CmpOp {
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
}

// A homogeneous container of one fixed-width dtype packed into a BitArray.
#[derive(Debug, Clone)]
pub struct Array {
    dtype: Dtype,
    data: BitArray,
}

impl Array {
    pub fn new(dtype: &str) -> Result<Array> {
        Array::with_dtype(Dtype::new(dtype)?)
    }

    pub fn with_dtype(dtype: Dtype) -> Result<Array> {
        if dtype.variable_length() {
            return Err(Error::creation(format!(
                "a variable-length dtype '{dtype}' cannot be used in an Array"
            )));
        }
        if dtype.bit_length().is_none() {
            return Err(Error::creation(format!(
                "the dtype '{dtype}' needs a concrete length to be used in an Array"
            )));
        }
        Ok(Array {
            dtype,
            data: BitArray::new(),
        })
    }

    pub fn from_values<I>(dtype: &str, values: I) -> Result<Array>
    where
        I: IntoIterator,
        I::Item: Into<Value>,
    {
        let values: Vec<Value> = values.into_iter().map(Into::into).collect();
        let mut dtype = Dtype::new(dtype)?;
        if dtype.scale() == Some(Scale::Auto) {
            dtype = resolve_auto_scale(dtype, &values)?;
        }
        let mut array = Array::with_dtype(dtype)?;
        for value in &values {
            array.push_value(value)?;
        }
        Ok(array)
    }

    pub fn from_scaled_values<I>(dtype: Dtype, values: I) -> Result<Array>
    where
        I: IntoIterator,
        I::Item: Into<Value>,
    {
        let values: Vec<Value> = values.into_iter().map(Into::into).collect();
        let dtype = if dtype.scale() == Some(Scale::Auto) {
            resolve_auto_scale(dtype, &values)?
        } else {
            dtype
        };
        let mut array = Array::with_dtype(dtype)?;
        for value in &values {
            array.push_value(value)?;
        }
        Ok(array)
    }

    pub fn from_bits(dtype: &str, data: Bits) -> Result<Array> {
        let mut array = Array::new(dtype)?;
        array.data = BitArray::from(data);
        Ok(array)
    }

    pub fn from_bytes(dtype: &str, data: &[u8]) -> Result<Array> {
        Array::from_bits(dtype, Bits::from_bytes(data))
    }

    pub fn dtype(&self) -> Dtype {
        self.dtype
    }

    pub fn data(&self) -> &BitArray {
        &self.data
    }

    pub fn item_size(&self) -> usize {
        self.dtype.bit_length().unwrap_or(0) as usize
    }

    pub fn len(&self) -> usize {
        let size = self.item_size();
        if size == 0 {
            0
        } else {
            self.data.len() / size
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn trailing_bits(&self) -> Bits {
        let used = self.len() * self.item_size();
        self.data.slice_msb0(used, self.data.len())
    }

    fn resolve_index(&self, index: isize, for_insert: bool) -> Result<usize> {
        let len = self.len() as isize;
        let resolved = if index < 0 { index + len } else { index };
        let limit = if for_insert { len } else { len - 1 };
        if resolved < 0 || resolved > limit {
            return Err(Error::index(format!(
                "array index {index} is out of range for a length of {len}"
            )));
        }
        Ok(resolved as usize)
    }

    fn element_bits(&self, index: usize) -> Bits {
        let size = self.item_size();
        self.data.slice_msb0(index * size, (index + 1) * size)
    }

    pub fn get(&self, index: isize) -> Result<Value> {
        let index = self.resolve_index(index, false)?;
        self.dtype.parse(&self.element_bits(index))
    }

    pub fn set(&mut self, index: isize, value: impl Into<Value>) -> Result<()> {
        let index = self.resolve_index(index, false)?;
        let bits = self.dtype.build(&value.into())?;
        let size = self.item_size();
        self.data
            .bits_mut()
            .store_mut()
            .overwrite_at(index * size, bits.store());
        Ok(())
    }

    pub fn get_slice(&self, start: usize, end: usize, step: usize) -> Result<Array> {
        if step == 0 {
            return Err(Error::value("slice step cannot be zero"));
        }
        let end = end.min(self.len());
        let start = start.min(end);
        let mut out = Array::with_dtype(self.dtype)?;
        let mut i = start;
        while i < end {
            let element = self.element_bits(i);
            out.data.bits_mut().store_mut().append(element.store());
            i += step;
        }
        Ok(out)
    }

    pub fn set_slice<I>(&mut self, start: usize, end: usize, values: I) -> Result<()>
    where
        I: IntoIterator,
        I::Item: Into<Value>,
    {
        let end = end.min(self.len());
        let start = start.min(end);
        let size = self.item_size();
        let mut replacement = BitStore::new();
        for value in values {
            let bits = self.dtype.build(&value.into())?;
            replacement.append(bits.store());
        }
        let store = self.data.bits_mut().store_mut();
        store.remove_range(start * size, end * size);
        store.insert_at(start * size, &replacement);
        Ok(())
    }

    pub fn set_slice_step<I>(
        &mut self,
        start: usize,
        end: usize,
        step: usize,
        values: I,
    ) -> Result<()>
    where
        I: IntoIterator,
        I::Item: Into<Value>,
    {
        if step == 0 {
            return Err(Error::value("slice step cannot be zero"));
        }
        if step == 1 {
            return self.set_slice(start, end, values);
        }
        let end = end.min(self.len());
        let start = start.min(end);
        let targets: Vec<usize> = (start..end).step_by(step).collect();
        let values: Vec<Value> = values.into_iter().map(Into::into).collect();
        if targets.len() != values.len() {
            return Err(Error::value(format!(
                "cannot assign {} values to the {} elements selected by an extended slice",
                values.len(),
                targets.len()
            )));
        }
        for (index, value) in targets.into_iter().zip(values) {
            self.set(index as isize, value)?;
        }
        Ok(())
    }

    pub fn delete(&mut self, index: isize) -> Result<()> {
        let index = self.resolve_index(index, false)?;
        let size = self.item_size();
        self.data
            .bits_mut()
            .store_mut()
            .remove_range(index * size, (index + 1) * size);
        Ok(())
    }

    fn push_value(&mut self, value: &Value) -> Result<()> {
        let bits = self.dtype.build(value)?;
        self.data.bits_mut().store_mut().append(bits.store());
        Ok(())
    }

    pub fn append(&mut self, value: impl Into<Value>) -> Result<()> {
        if !self.trailing_bits().is_empty() {
            return Err(Error::value(
                "cannot append to an Array with trailing bits",
            ));
        }
        self.push_value(&value.into())
    }

    pub fn extend<I>(&mut self, values: I) -> Result<()>
    where
        I: IntoIterator,
        I::Item: Into<Value>,
    {
        if !self.trailing_bits().is_empty() {
            return Err(Error::value(
                "cannot extend an Array with trailing bits",
            ));
        }
        for value in values {
            self.push_value(&value.into())?;
        }
        Ok(())
    }

    pub fn insert(&mut self, index: isize, value: impl Into<Value>) -> Result<()> {
        let index = self.resolve_index(index, true)?;
        let bits = self.dtype.build(&value.into())?;
        let size = self.item_size();
        self.data
            .bits_mut()
            .store_mut()
            .insert_at(index * size, bits.store());
        Ok(())
    }

    pub fn pop(&mut self, index: isize) -> Result<Value> {
        let value = self.get(index)?;
        self.delete(index)?;
        Ok(value)
    }

    pub fn reverse(&mut self) {
        let size = self.item_size();
        let count = self.len();
        let store = self.data.bits_mut().store_mut();
        // Reverse all bits, then restore the order within each element.
        store.reverse_range(0, count * size);
        for i in 0..count {
            store.reverse_range(i * size, (i + 1) * size);
        }
    }

    pub fn count(&self, value: impl Into<Value>) -> Result<usize> {
        let target = value.into();
        let nan_target = matches!(&target, Value::Float(f) if f.is_nan());
        let mut total = 0;
        for i in 0..self.len() {
            let element = self.dtype.parse(&self.element_bits(i))?;
            let matches = if nan_target {
                matches!(&element, Value::Float(f) if f.is_nan())
            } else {
                values_equal(&element, &target)
            };
            if matches {
                total += 1;
            }
        }
        Ok(total)
    }

    pub fn byteswap(&mut self) -> Result<()> {
        let size = self.item_size();
        if size % 8 != 0 {
            return Err(Error::value(format!(
                "the Array format is not a whole number of bytes; each item is {size} bits long"
            )));
        }
        let count = self.len();
        let store = self.data.bits_mut().store_mut();
        for i in 0..count {
            let mut bytes = store.slice(i * size, (i + 1) * size).to_bytes();
            bytes.reverse();
            store.overwrite_at(i * size, &BitStore::from_bytes(&bytes));
        }
        Ok(())
    }

    pub fn astype(&self, dtype: &str) -> Result<Array> {
        let mut out = Array::new(dtype)?;
        for i in 0..self.len() {
            let value = self.dtype.parse(&self.element_bits(i))?;
            out.push_value(&value)?;
        }
        Ok(out)
    }

    pub fn to_vec(&self) -> Result<Vec<Value>> {
        (0..self.len())
            .map(|i| self.dtype.parse(&self.element_bits(i)))
            .collect()
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        self.data.to_bytes()
    }

    pub fn to_file<W: io::Write>(&self, writer: &mut W) -> Result<()> {
        self.data.to_file(writer)
    }

    pub fn read_file<R: io::Read>(&mut self, reader: &mut R, n: Option<usize>) -> Result<()> {
        match n {
            None => {
                let mut buf = Vec::new();
                reader.read_to_end(&mut buf)?;
                self.data
                    .bits_mut()
                    .store_mut()
                    .append(&BitStore::from_bytes(&buf));
            }
            Some(n) => {
                let bits_needed = n * self.item_size();
                let mut buf = vec![0u8; div_ceil(bits_needed, 8)];
                reader.read_exact(&mut buf).map_err(|_| {
                    Error::read(format!(
                        "not enough data in the file to read {n} more array elements"
                    ))
                })?;
                self.data
                    .bits_mut()
                    .store_mut()
                    .append(&BitStore::from_bytes_offset(&buf, 0, bits_needed));
            }
        }
        Ok(())
    }

    pub fn equals(&self, other: &Array) -> bool {
        self.dtype == other.dtype && *self.data == *other.data
    }

    // Grouped dump in the same layout as `Bits::pp`: one cell per element,
    // offsets counted in elements, one or two render formats of the same
    // width as the stored dtype.
    pub fn pp<W: io::Write>(
        &self,
        fmt: Option<&str>,
        width: usize,
        sep: &str,
        show_offset: bool,
        writer: &mut W,
    ) -> Result<()> {
        let (first, second) = self.pp_dtypes(fmt)?;
        writeln!(
            writer,
            "<Array dtype='{}', length={}, itemsize={} bits>",
            self.dtype,
            self.len(),
            self.item_size()
        )?;
        if self.is_empty() {
            return Ok(());
        }
        let first_cells = self.pp_cells(&first)?;
        let second_cells = match &second {
            Some(dtype) => Some(self.pp_cells(dtype)?),
            None => None,
        };
        let first_width = first_cells.iter().map(String::len).max().unwrap_or(0);
        let second_width = second_cells
            .as_ref()
            .map(|cells| cells.iter().map(String::len).max().unwrap_or(0))
            .unwrap_or(0);
        let colour = Colour::current();
        let offset_width = format!("{}", self.len()).len().max(3);
        let cell_chars = first_width
            + second_cells
                .as_ref()
                .map_or(0, |_| second_width + sep.len() + 2);
        let available = width.saturating_sub(if show_offset { offset_width + 2 } else { 0 });
        let per_line = (available / (cell_chars + sep.len())).max(1);
        let mut index = 0;
        while index < self.len() {
            let line_end = (index + per_line).min(self.len());
            if show_offset {
                write!(
                    writer,
                    "{}{:>offset_width$}: {}",
                    colour.purple, index, colour.off
                )?;
            }
            let cells: Vec<String> = first_cells[index..line_end]
                .iter()
                .map(|cell| format!("{cell:>first_width$}"))
                .collect();
            write!(writer, "{}{}{}", colour.blue, cells.join(sep), colour.off)?;
            if let Some(second_cells) = &second_cells {
                let cells: Vec<String> = second_cells[index..line_end]
                    .iter()
                    .map(|cell| format!("{cell:>second_width$}"))
                    .collect();
                write!(writer, " : {}{}{}", colour.green, cells.join(sep), colour.off)?;
            }
            writeln!(writer)?;
            index = line_end;
        }
        Ok(())
    }

    fn pp_dtypes(&self, fmt: Option<&str>) -> Result<(Dtype, Option<Dtype>)> {
        let Some(fmt) = fmt else {
            return Ok((self.dtype, None));
        };
        let mut resolved = Vec::new();
        for item in fmt.split(',') {
            let item: String = item.chars().filter(|c| !c.is_whitespace()).collect();
            if item.is_empty() {
                continue;
            }
            let (name, length) = dtypes::split_token(&item)
                .map_err(|_| Error::value(format!("could not parse pp format '{fmt}'")))?;
            let bits_per_item = *name.definition().bits_per_item() as usize;
            let length = length.or_else(|| {
                if self.item_size() % bits_per_item == 0 {
                    Some((self.item_size() / bits_per_item) as u32)
                } else {
                    None
                }
            });
            let dtype = Dtype::resolve(name, length, None)
                .map_err(|e| Error::value(e.to_string()))?;
            if dtype.bit_length() != Some(self.item_size() as u32) {
                return Err(Error::value(format!(
                    "the '{dtype}' format does not match the {} bit items of this Array",
                    self.item_size()
                )));
            }
            resolved.push(dtype);
        }
        match resolved.len() {
            1 => Ok((resolved[0], None)),
            2 => Ok((resolved[0], Some(resolved[1]))),
            _ => Err(Error::value(format!(
                "pp takes one or two formats, but '{fmt}' has {}",
                resolved.len()
            ))),
        }
    }

    fn pp_cells(&self, dtype: &Dtype) -> Result<Vec<String>> {
        (0..self.len())
            .map(|i| dtype.parse(&self.element_bits(i)).map(|v| v.to_string()))
            .collect()
    }

    // Elementwise arithmetic. Integer results wrap modulo the item width;
    // float results go through the dtype encoder.

    fn is_float_dtype(dtype: &Dtype) -> bool {
        dtype.kind() == ValueKind::Float
    }

    fn is_numeric(dtype: &Dtype) -> bool {
        matches!(
            dtype.kind(),
            ValueKind::Uint | ValueKind::Int | ValueKind::Float
        )
    }

    fn promote(left: &Dtype, right: &Dtype) -> Result<Dtype> {
        if !Array::is_numeric(left) || !Array::is_numeric(right) {
            return Err(Error::value(format!(
                "cannot promote between the non-numeric dtypes '{left}' and '{right}'"
            )));
        }
        let lf = Array::is_float_dtype(left);
        let rf = Array::is_float_dtype(right);
        if lf != rf {
            return Ok(if lf { *left } else { *right });
        }
        if left.is_signed() != right.is_signed() {
            return Ok(if left.is_signed() { *left } else { *right });
        }
        if left.bit_length() != right.bit_length() {
            return Ok(if left.bit_length() > right.bit_length() {
                *left
            } else {
                *right
            });
        }
        Ok(*left)
    }

    fn encode_wrapped(&self, dtype: &Dtype, value: i128) -> Result<Bits> {
        let width = dtype.bit_length().unwrap_or(0);
        let wrapped = if width >= 128 {
            value as u128
        } else {
            (value as u128) & ((1u128 << width) - 1)
        };
        match dtype.kind() {
            ValueKind::Uint => dtype.build(&Value::Uint(wrapped)),
            ValueKind::Int => dtype.build(&Value::Int(sign_extend(wrapped, width))),
            _ => Err(Error::value(format!(
                "cannot wrap a value into the non-integer dtype '{dtype}'"
            ))),
        }
    }

    fn int_kernel(op: ArithOp, a: i128, b: i128) -> Result<i128> {
        if b == 0 && matches!(op, ArithOp::Div | ArithOp::FloorDiv | ArithOp::Rem) {
            return Err(Error::value("integer division or modulo by zero"));
        }
        let out = match op {
            ArithOp::Add => a.wrapping_add(b),
            ArithOp::Sub => a.wrapping_sub(b),
            ArithOp::Mul => a.wrapping_mul(b),
            ArithOp::Div => {
                if a % b != 0 {
                    return Err(Error::creation(format!(
                        "true division of {a} by {b} does not give an integer result"
                    )));
                }
                a / b
            }
            ArithOp::FloorDiv => floor_div(a, b),
            ArithOp::Rem => a - b * floor_div(a, b),
            ArithOp::Shl => {
                let shift = shift_amount(b)?;
                if shift >= 128 {
                    0
                } else {
                    a << shift
                }
            }
            ArithOp::Shr => {
                let shift = shift_amount(b)?;
                if shift >= 127 {
                    if a < 0 {
                        -1
                    } else {
                        0
                    }
                } else {
                    a >> shift
                }
            }
        };
        Ok(out)
    }

    fn float_kernel(op: ArithOp, a: f64, b: f64) -> Result<f64> {
        let out = match op {
            ArithOp::Add => a + b,
            ArithOp::Sub => a - b,
            ArithOp::Mul => a * b,
            ArithOp::Div => a / b,
            ArithOp::FloorDiv => (a / b).floor(),
            ArithOp::Rem => a - b * (a / b).floor(),
            ArithOp::Shl | ArithOp::Shr => {
                return Err(Error::value("cannot shift a float dtype Array"))
            }
        };
        Ok(out)
    }

    fn element_result(&self, dtype: &Dtype, op: ArithOp, a: &Value, b: &Value) -> Result<Bits> {
        if Array::is_float_dtype(dtype) {
            let out = Array::float_kernel(
                op,
                a.to_f64()
                    .ok_or_else(|| Error::value(format!("{a:?} is not numeric")))?,
                b.to_f64()
                    .ok_or_else(|| Error::value(format!("{b:?} is not numeric")))?,
            )?;
            dtype.build(&Value::Float(out))
        } else {
            let out = Array::int_kernel(
                op,
                a.to_i128()
                    .ok_or_else(|| Error::value(format!("{a:?} is not an integer")))?,
                b.to_i128()
                    .ok_or_else(|| Error::value(format!("{b:?} is not an integer")))?,
            )?;
            self.encode_wrapped(dtype, out)
        }
    }

    fn scalar_value(&self, dtype: &Dtype, scalar: Scalar) -> Result<Value> {
        if Array::is_float_dtype(dtype) {
            Ok(Value::Float(scalar.to_f64()))
        } else {
            Ok(Value::Int(scalar.to_i128()?))
        }
    }

    fn apply_scalar(&self, op: ArithOp, scalar: Scalar) -> Result<Array> {
        if !Array::is_numeric(&self.dtype) {
            return Err(Error::value(format!(
                "cannot do arithmetic on the non-numeric dtype '{}'",
                self.dtype
            )));
        }
        let dtype = match scalar {
            // A float scalar pushes an integer array through its encoder as floats.
            Scalar::Float(_) if !Array::is_float_dtype(&self.dtype) => {
                return Err(Error::value(format!(
                    "cannot combine a float scalar with the integer dtype '{}'",
                    self.dtype
                )))
            }
            _ => self.dtype,
        };
        let rhs = self.scalar_value(&dtype, scalar)?;
        let mut out = Array::with_dtype(dtype)?;
        for i in 0..self.len() {
            let a = self.dtype.parse(&self.element_bits(i))?;
            let bits = self.element_result(&dtype, op, &a, &rhs)?;
            out.data.bits_mut().store_mut().append(bits.store());
        }
        Ok(out)
    }

    fn apply_array(&self, op: ArithOp, other: &Array) -> Result<Array> {
        if self.len() != other.len() {
            return Err(Error::value(format!(
                "cannot operate on Arrays of different lengths ({} and {})",
                self.len(),
                other.len()
            )));
        }
        let dtype = Array::promote(&self.dtype, &other.dtype)?;
        let mut out = Array::with_dtype(dtype)?;
        for i in 0..self.len() {
            let a = self.dtype.parse(&self.element_bits(i))?;
            let b = other.dtype.parse(&other.element_bits(i))?;
            let bits = self.element_result(&dtype, op, &a, &b)?;
            out.data.bits_mut().store_mut().append(bits.store());
        }
        Ok(out)
    }

    fn apply_scalar_in_place(&mut self, op: ArithOp, scalar: Scalar) -> Result<()> {
        let result = self.apply_scalar(op, scalar)?;
        self.data = result.data;
        Ok(())
    }

    fn apply_array_in_place(&mut self, op: ArithOp, other: &Array) -> Result<()> {
        if self.len() != other.len() {
            return Err(Error::value(format!(
                "cannot operate on Arrays of different lengths ({} and {})",
                self.len(),
                other.len()
            )));
        }
        let dtype = self.dtype;
        let mut data = BitArray::new();
        for i in 0..self.len() {
            let a = self.dtype.parse(&self.element_bits(i))?;
            let b = other.dtype.parse(&other.element_bits(i))?;
            let bits = self.element_result(&dtype, op, &a, &b)?;
            data.bits_mut().store_mut().append(bits.store());
        }
        self.data = data;
        Ok(())
    }

    fn compare_with(&self, op: CmpOp, rhs: ComparandRef<'_>) -> Result<Array> {
        let mut out = Array::with_dtype(Dtype::new("bool")?)?;
        for i in 0..self.len() {
            let a = self
                .dtype
                .parse(&self.element_bits(i))?
                .to_f64()
                .ok_or_else(|| {
                    Error::value(format!(
                        "cannot compare the non-numeric dtype '{}'",
                        self.dtype
                    ))
                })?;
            let b = match rhs {
                ComparandRef::Scalar(s) => s.to_f64(),
                ComparandRef::Array(other) => {
                    if other.len() != self.len() {
                        return Err(Error::value(format!(
                            "cannot compare Arrays of different lengths ({} and {})",
                            self.len(),
                            other.len()
                        )));
                    }
                    other
                        .dtype
                        .parse(&other.element_bits(i))?
                        .to_f64()
                        .ok_or_else(|| {
                            Error::value(format!(
                                "cannot compare the non-numeric dtype '{}'",
                                other.dtype
                            ))
                        })?
                }
            };
            let verdict = match op {
                CmpOp::Lt => a < b,
                CmpOp::Le => a <= b,
                CmpOp::Gt => a > b,
                CmpOp::Ge => a >= b,
                CmpOp::Eq => a == b,
                CmpOp::Ne => a != b,
            };
            out.push_value(&Value::Bool(verdict))?;
        }
        Ok(out)
    }

    fn apply_bitwise(&self, op: BitwiseOp, mask: &Bits) -> Result<Array> {
        let size = self.item_size();
        if mask.len() != size {
            return Err(Error::value(format!(
                "the bitwise operand must be {size} bits long to match the Array elements, not {}",
                mask.len()
            )));
        }
        let mut out = Array::with_dtype(self.dtype)?;
        for i in 0..self.len() {
            let element = self.element_bits(i);
            let combined = match op {
                BitwiseOp::And => element.and(mask)?,
                BitwiseOp::Or => element.or(mask)?,
                BitwiseOp::Xor => element.xor(mask)?,
            };
            out.data.bits_mut().store_mut().append(combined.store());
        }
        Ok(out)
    }
}

#[derive(Debug, Clone, Copy)]
enum ComparandRef<'a> {
    Scalar(Scalar),
    Array(&'a Array),
}

#[derive(Debug, Clone, Copy)]
enum BitwiseOp {
    And,
    Or,
    Xor,
}

macro_rules! elementwise_op {
    ($(($array_fn:ident, $scalar_fn:ident, $array_in_place_fn:ident, $scalar_in_place_fn:ident, $op:expr)),* $(,)?) => {
        impl Array {
            $(
                pub fn $array_fn(&self, other: &Array) -> Result<Array> {
                    self.apply_array($op, other)
                }

                pub fn $scalar_fn(&self, value: impl Into<Scalar>) -> Result<Array> {
                    self.apply_scalar($op, value.into())
                }

                pub fn $array_in_place_fn(&mut self, other: &Array) -> Result<()> {
                    self.apply_array_in_place($op, other)
                }

                pub fn $scalar_in_place_fn(&mut self, value: impl Into<Scalar>) -> Result<()> {
                    self.apply_scalar_in_place($op, value.into())
                }
            )*
        }
    };
}

elementwise_op!(
    (add, add_scalar, add_in_place, add_scalar_in_place, ArithOp::Add),
    (sub, sub_scalar, sub_in_place, sub_scalar_in_place, ArithOp::Sub),
    (mul, mul_scalar, mul_in_place, mul_scalar_in_place, ArithOp::Mul),
    (div, div_scalar, div_in_place, div_scalar_in_place, ArithOp::Div),
    (floordiv, floordiv_scalar, floordiv_in_place, floordiv_scalar_in_place, ArithOp::FloorDiv),
    (rem, rem_scalar, rem_in_place, rem_scalar_in_place, ArithOp::Rem),
    (shl, shl_scalar, shl_in_place, shl_scalar_in_place, ArithOp::Shl),
    (shr, shr_scalar, shr_in_place, shr_scalar_in_place, ArithOp::Shr),
);

macro_rules! comparison_op {
    ($(($array_fn:ident, $scalar_fn:ident, $op:expr)),* $(,)?) => {
        impl Array {
            $(
                pub fn $array_fn(&self, other: &Array) -> Result<Array> {
                    self.compare_with($op, ComparandRef::Array(other))
                }

                pub fn $scalar_fn(&self, value: impl Into<Scalar>) -> Result<Array> {
                    self.compare_with($op, ComparandRef::Scalar(value.into()))
                }
            )*
        }
    };
}

comparison_op!(
    (lt, lt_scalar, CmpOp::Lt),
    (le, le_scalar, CmpOp::Le),
    (gt, gt_scalar, CmpOp::Gt),
    (ge, ge_scalar, CmpOp::Ge),
    (eq_elementwise, eq_scalar, CmpOp::Eq),
    (ne_elementwise, ne_scalar, CmpOp::Ne),
);

impl Array {
    pub fn bitwise_and(&self, mask: &Bits) -> Result<Array> {
        self.apply_bitwise(BitwiseOp::And, mask)
    }

    pub fn bitwise_or(&self, mask: &Bits) -> Result<Array> {
        self.apply_bitwise(BitwiseOp::Or, mask)
    }

    pub fn bitwise_xor(&self, mask: &Bits) -> Result<Array> {
        self.apply_bitwise(BitwiseOp::Xor, mask)
    }

    pub fn bitwise_and_in_place(&mut self, mask: &Bits) -> Result<()> {
        self.data = self.bitwise_and(mask)?.data;
        Ok(())
    }

    pub fn bitwise_or_in_place(&mut self, mask: &Bits) -> Result<()> {
        self.data = self.bitwise_or(mask)?.data;
        Ok(())
    }

    pub fn bitwise_xor_in_place(&mut self, mask: &Bits) -> Result<()> {
        self.data = self.bitwise_xor(mask)?.data;
        Ok(())
    }
}

impl PartialEq for Array {
    fn eq(&self, other: &Array) -> bool {
        self.equals(other)
    }
}

impl fmt::Display for Array {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Array('{}'", self.dtype)?;
        match self.to_vec() {
            Ok(values) => {
                let rendered: Vec<String> = values.iter().map(|v| v.to_string()).collect();
                write!(f, ", [{}])", rendered.join(", "))
            }
            Err(_) => write!(f, ", <unreadable>)"),
        }
    }
}

fn resolve_auto_scale(dtype: Dtype, values: &[Value]) -> Result<Dtype> {
    let unscaled = dtype.with_scale_factor(None);
    let limit = unscaled.max_abs_finite().ok_or_else(|| {
        Error::creation(format!(
            "the dtype '{dtype}' does not support automatic scaling"
        ))
    })?;
    let max_abs = values
        .iter()
        .filter_map(Value::to_f64)
        .filter(|v| v.is_finite())
        .fold(0.0f64, |acc, v| acc.max(v.abs()));
    let factor = if max_abs == 0.0 {
        1.0
    } else {
        // Smallest power of two that brings the largest value into range.
        2f64.powi((max_abs / limit).log2().ceil() as i32)
    };
    Ok(dtype.with_scale_factor(Some(Scale::Factor(factor))))
}

fn values_equal(a: &Value, b: &Value) -> bool {
    match (a.to_f64(), b.to_f64()) {
        (Some(x), Some(y)) => x == y,
        _ => a == b,
    }
}

fn floor_div(a: i128, b: i128) -> i128 {
    let quotient = a / b;
    if a % b != 0 && (a < 0) != (b < 0) {
        quotient - 1
    } else {
        quotient
    }
}

fn shift_amount(value: i128) -> Result<u32> {
    if value < 0 {
        return Err(Error::value("cannot shift by a negative amount"));
    }
    Ok(value.min(u32::MAX as i128) as u32)
}
