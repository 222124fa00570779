use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::io::Cursor;

use assert_matches::assert_matches;
use bitseq::{
    pack, pack_with, Array, BitArray, BitStream, Bits, ConstBitStream, Dtype, Error, Result,
    Scale, Value,
};

#[test]
fn pack_and_unpack() -> Result<()> {
    let stream = pack("uint:12, hex:16", [Value::from(100u32), Value::from("0xabcd")])?;
    assert_eq!(stream.to_bytes(), vec![0x06, 0x4a, 0xbc, 0xd0]);
    assert_eq!(stream.len(), 28);

    let values = stream.unpack("uint:12, hex:16")?;
    assert_eq!(values, vec![Value::Uint(100), Value::Str("abcd".to_owned())]);

    let kw = pack_with(
        "uint:8=a, uint:8=b, uint:8=a",
        Vec::<Value>::new(),
        &[("a", Value::from(6u8)), ("b", Value::from(44u8))],
    )?;
    assert_eq!(kw.unpack("3*uint:8")?, vec![
        Value::Uint(6),
        Value::Uint(44),
        Value::Uint(6)
    ]);

    assert_matches!(
        pack("uint:8", Vec::<Value>::new()),
        Err(Error::Creation(_))
    );
    assert_matches!(
        pack("uint:8", [Value::from(1u8), Value::from(2u8)]),
        Err(Error::Creation(_))
    );
    Ok(())
}

#[test]
fn struct_tokens_and_brackets() -> Result<()> {
    let stream = pack(">hH", [Value::from(-2i32), Value::from(0xffeeu32)])?;
    assert_eq!(stream.to_bytes(), vec![0xff, 0xfe, 0xff, 0xee]);

    let little = pack("<h", [Value::from(1i32)])?;
    assert_eq!(little.to_bytes(), vec![0x01, 0x00]);

    let grouped = pack("2*(uint:4, bin:2)", [
        Value::from(1u8),
        Value::from("01"),
        Value::from(2u8),
        Value::from("10"),
    ])?;
    assert_eq!(grouped.len(), 12);
    assert_eq!(
        grouped.unpack("2*(uint:4, bin:2)")?,
        vec![
            Value::Uint(1),
            Value::Str("01".to_owned()),
            Value::Uint(2),
            Value::Str("10".to_owned())
        ]
    );
    Ok(())
}

#[test]
fn integer_codecs() -> Result<()> {
    assert_eq!(Bits::from_uint(100, 12)?.bin(), "000001100100");
    assert_eq!(Bits::from_uint(100, 12)?.uint()?, 100);
    assert_eq!(Bits::from_int(-1, 8)?.hex()?, "ff");
    assert_eq!(Bits::from_int(-128, 8)?.int()?, -128);

    for length in [1u32, 7, 8, 12, 64, 127, 128] {
        let max = if length == 128 {
            u128::MAX
        } else {
            (1u128 << length) - 1
        };
        assert_eq!(Bits::from_uint(max, length)?.uint()?, max);
        assert_eq!(Bits::from_uint(0, length)?.uint()?, 0);
    }

    // Byte reversal relates the two fixed-endian families.
    let be = Bits::from_uintbe(0xabcd, 16)?;
    let le = Bits::from_uintle(0xabcd, 16)?;
    assert_eq!(be.hex()?, "abcd");
    assert_eq!(le.hex()?, "cdab");
    let mut swapped = BitArray::from(be.clone());
    swapped.byteswap_all(None, None)?;
    assert_eq!(swapped, le);

    assert_matches!(Bits::from_uint(256, 8), Err(Error::Creation(_)));
    assert_matches!(Bits::from_int(128, 8), Err(Error::Creation(_)));
    assert_matches!(Bits::from_uintbe(1, 12), Err(Error::Creation(_)));
    assert_matches!(Bits::from_hex("0xzz"), Err(Error::Creation(_)));
    Ok(())
}

#[test]
fn float_codecs() -> Result<()> {
    assert_eq!(Bits::from_float(1.0, 32)?.hex()?, "3f800000");
    assert_eq!(Bits::from_float(1.0, 16)?.hex()?, "3c00");
    assert_eq!(Bits::from_float(1.0, 64)?.float()?, 1.0);
    assert_eq!(Bits::from_floatle(1.0, 32)?.hex()?, "0000803f");
    assert_eq!(Bits::from_floatle(-2.5, 64)?.floatle()?, -2.5);
    assert_eq!(Bits::from_bfloat(1.5)?.hex()?, "3fc0");
    assert_eq!(Bits::from_bfloat(1.5)?.bfloat()?, 1.5);

    let nan = Bits::from_float(f64::NAN, 32)?;
    assert!(nan.float()?.is_nan());

    assert_matches!(Bits::from_float(1.0, 24), Err(Error::Creation(_)));
    assert_matches!(Bits::from_hex("010203")?.float(), Err(Error::Interpret(_)));
    Ok(())
}

#[test]
fn exponential_golomb() -> Result<()> {
    let s = Bits::from_se(-3)?;
    assert_eq!(s.bin(), "00111");
    let mut stream = ConstBitStream::new(s);
    assert_eq!(stream.read("se")?, Value::Int(-3));
    assert_eq!(stream.pos(), 5);

    for i in [0u128, 1, 2, 3, 7, 8, 100, 1000, 65535] {
        assert_eq!(Bits::from_ue(i)?.ue()?, i);
        assert_eq!(Bits::from_uie(i)?.uie()?, i);
        let expected_len = 2 * ((i + 1) as f64).log2().floor() as usize + 1;
        assert_eq!(Bits::from_ue(i)?.len(), expected_len);
    }
    for i in [-1000i128, -17, -1, 0, 1, 2, 3, 1000] {
        assert_eq!(Bits::from_se(i)?.se()?, i);
        assert_eq!(Bits::from_sie(i)?.sie()?, i);
    }

    assert_eq!(Bits::from_ue(0)?.bin(), "1");
    assert_eq!(Bits::from_ue(1)?.bin(), "010");
    assert_eq!(Bits::from_uie(0)?.bin(), "1");
    assert_eq!(Bits::from_uie(1)?.bin(), "001");

    // A code cut short mid-way fails as a read error.
    let truncated = Bits::from_bin("0001")?;
    assert_matches!(truncated.ue(), Err(Error::Read(_)));
    Ok(())
}

#[test]
fn binary8_formats() -> Result<()> {
    let p4 = Dtype::new("p4binary8")?;
    assert_eq!(p4.build(&Value::Float(1.0))?.hex()?, "40");
    assert_eq!(p4.parse(&Bits::from_hex("40")?)?, Value::Float(1.0));

    // Clamp codes for values past the largest finite.
    assert_eq!(p4.build(&Value::Float(1.0e9))?.uint()?, 127);
    assert_eq!(p4.build(&Value::Float(-1.0e9))?.uint()?, 255);

    let nan_bits = p4.build(&Value::Float(f64::NAN))?;
    assert_eq!(nan_bits.uint()?, 0x80);
    assert_matches!(p4.parse(&nan_bits)?, Value::Float(f) if f.is_nan());

    // Subnormal decode.
    assert_eq!(
        p4.parse(&Bits::from_uint(1, 8)?)?,
        Value::Float(2f64.powi(-10))
    );

    let p3 = Dtype::new("p3binary8")?;
    assert_eq!(p3.build(&Value::Float(1.0))?.hex()?, "40");
    assert_eq!(p3.parse(&Bits::from_hex("40")?)?, Value::Float(1.0));
    Ok(())
}

#[test]
fn mxfp_formats() -> Result<()> {
    let e2m1 = Dtype::new("e2m1mxfp")?;
    assert_eq!(e2m1.bit_length(), Some(4));
    assert_eq!(e2m1.parse(&Bits::from_uint(0b0001, 4)?)?, Value::Float(0.5));
    assert_eq!(e2m1.parse(&Bits::from_uint(0b0111, 4)?)?, Value::Float(6.0));
    assert_eq!(e2m1.parse(&Bits::from_uint(0b1111, 4)?)?, Value::Float(-6.0));
    // Saturating clamp to the largest finite magnitude.
    assert_eq!(e2m1.build(&Value::Float(100.0))?.uint()?, 0b0111);
    assert_eq!(e2m1.build(&Value::Float(-100.0))?.uint()?, 0b1111);
    assert_matches!(
        e2m1.build(&Value::Float(f64::NAN)),
        Err(Error::Creation(_))
    );

    let e4m3 = Dtype::new("e4m3mxfp")?;
    assert_eq!(e4m3.build(&Value::Float(1.0e9))?.uint()?, 126);
    assert_eq!(e4m3.parse(&Bits::from_uint(126, 8)?)?, Value::Float(448.0));
    assert_matches!(
        e4m3.parse(&Bits::from_uint(127, 8)?)?,
        Value::Float(f) if f.is_nan()
    );

    let e5m2 = Dtype::new("e5m2mxfp")?;
    assert_eq!(e5m2.build(&Value::Float(1.0e9))?.uint()?, 123);
    assert_eq!(e5m2.parse(&Bits::from_uint(123, 8)?)?, Value::Float(57344.0));
    assert_matches!(
        e5m2.parse(&Bits::from_uint(0b0111_1100, 8)?)?,
        Value::Float(f) if f.is_infinite() && f > 0.0
    );

    let e8m0 = Dtype::new("e8m0mxfp")?;
    assert_eq!(e8m0.build(&Value::Float(0.25))?.uint()?, 125);
    assert_eq!(e8m0.parse(&Bits::from_uint(125, 8)?)?, Value::Float(0.25));
    assert_matches!(
        e8m0.parse(&Bits::from_uint(255, 8)?)?,
        Value::Float(f) if f.is_nan()
    );
    assert_matches!(e8m0.build(&Value::Float(3.0)), Err(Error::Creation(_)));
    Ok(())
}

#[test]
fn slicing_and_concatenation() -> Result<()> {
    let s = Bits::from_hex("deadbeef")?;
    assert_eq!(s.len(), 32);
    for (i, j, k) in [(0usize, 8usize, 32usize), (3, 11, 30), (0, 0, 32)] {
        let joined = s.slice(i, j)?.concat(&s.slice(j, k)?);
        assert_eq!(joined, s.slice(i, k)?);
    }

    let a = Bits::from_bin("101")?;
    let b = Bits::from_bin("0011")?;
    assert_eq!(a.concat(&b).len(), a.len() + b.len());
    assert_eq!((&a + &b).bin(), "1010011");
    assert_eq!(a.concat(&Bits::new()), a);
    assert_eq!(Bits::new().concat(&a), a);

    assert_eq!(Bits::from_bin("00110")?.slice(1, 4)?.bin(), "011");
    assert_eq!(Bits::from_bin("00110")?.slice_step(0, 5, 2)?.bin(), "010");
    assert_eq!(a.repeat(3).bin(), "101101101");

    assert_matches!(s.slice(4, 2), Err(Error::Value(_)));
    assert_matches!(s.slice(0, 33), Err(Error::Value(_)));
    Ok(())
}

#[test]
fn logical_ops_and_shifts() -> Result<()> {
    let a = Bits::from_hex("f0")?;
    let b = Bits::from_hex("3c")?;
    assert_eq!(a.and(&b)?.hex()?, "30");
    assert_eq!(a.or(&b)?.hex()?, "fc");
    assert_eq!(a.xor(&b)?.hex()?, "cc");
    assert_eq!(a.invert()?.hex()?, "0f");

    assert_eq!(Bits::from_bin("1110")?.shl(1)?.bin(), "1100");
    assert_eq!(Bits::from_bin("1110")?.shr(2)?.bin(), "0011");
    assert_eq!(Bits::from_bin("1110")?.shl(100)?.bin(), "0000");

    assert_matches!(a.and(&Bits::from_bin("1")?), Err(Error::Value(_)));
    assert_matches!(Bits::new().invert(), Err(Error::Value(_)));
    assert_matches!(Bits::new().shl(1), Err(Error::Value(_)));
    Ok(())
}

#[test]
fn search_operations() -> Result<()> {
    let s = Bits::from_hex("c3e")?;
    assert_eq!(s.find(&Bits::from_bin("1111")?, None, None, None)?, Some(6));

    let ones = Bits::from_bin("1111")?;
    let sub = Bits::from_bin("11")?;
    let all: Vec<usize> = ones.find_all(&sub, None, None, None, None)?.collect();
    assert_eq!(all, vec![0, 1, 2]);
    let capped: Vec<usize> = ones.find_all(&sub, None, None, Some(2), None)?.collect();
    assert_eq!(capped, vec![0, 1]);

    let s = Bits::from_hex("00bb00bb")?;
    let bb = Bits::from_hex("bb")?;
    assert_eq!(s.find(&bb, None, None, Some(true))?, Some(8));
    assert_eq!(s.rfind(&bb, None, None, Some(true))?, Some(24));
    assert_eq!(s.find(&bb, Some(9), None, Some(true))?, Some(24));
    assert!(s.contains(&bb));
    assert!(s.startswith(&Bits::from_hex("00")?, None, None)?);
    assert!(s.endswith(&bb, None, None)?);

    assert_matches!(s.find(&Bits::new(), None, None, None), Err(Error::Value(_)));
    Ok(())
}

#[test]
fn bitarray_edits() -> Result<()> {
    let mut a = BitArray::from_hex("00112233")?;
    a.delete_range(Some(8), Some(16))?;
    assert_eq!(a.hex()?, "002233");

    let mut a = BitArray::from_hex("0011")?;
    a.insert(&Bits::from_hex("ff")?, 8)?;
    assert_eq!(a.hex()?, "00ff11");
    a.append(&Bits::from_hex("22")?);
    assert_eq!(a.hex()?, "00ff1122");
    a.prepend(&Bits::from_hex("33")?);
    assert_eq!(a.hex()?, "3300ff1122");

    // Overwrite extends when it runs past the end.
    let mut a = BitArray::from_hex("0000")?;
    a.overwrite(&Bits::from_hex("abcd")?, 8)?;
    assert_eq!(a.hex()?, "00abcd");

    let mut a = BitArray::from_bin("110010")?;
    a.reverse(None, None)?;
    assert_eq!(a.bin(), "010011");
    a.reverse(None, None)?;
    assert_eq!(a.bin(), "110010");

    let mut a = BitArray::from_bin("00011000")?;
    a.rol(2, None, None)?;
    assert_eq!(a.bin(), "01100000");
    a.ror(2, None, None)?;
    assert_eq!(a.bin(), "00011000");
    a.rol(8, None, None)?;
    assert_eq!(a.bin(), "00011000");

    let mut a = BitArray::zeros(8);
    a.set(true, &[0, -1, 3])?;
    assert_eq!(a.bin(), "10010001");
    a.invert(&[0])?;
    assert_eq!(a.bin(), "00010001");
    a.invert_all();
    assert_eq!(a.bin(), "11101110");
    a.set_all(false);
    assert_eq!(a.bin(), "00000000");
    assert_matches!(a.set(true, &[8]), Err(Error::Index(_)));
    assert_matches!(a.set(true, &[-9]), Err(Error::Index(_)));

    let mut a = BitArray::from_hex("00ab00ab")?;
    let replaced = a.replace(
        &Bits::from_hex("ab")?,
        &Bits::from_bin("1")?,
        None,
        None,
        None,
        None,
    )?;
    assert_eq!(replaced, 2);
    assert_eq!(a.len(), 18);
    assert!(!a.contains(&Bits::from_hex("ab")?));
    assert_matches!(
        a.replace(&Bits::new(), &Bits::from_bin("1")?, None, None, None, None),
        Err(Error::Value(_))
    );

    let mut a = BitArray::from_hex("00112233")?;
    assert_eq!(a.byteswap(&[2], None, None, true)?, 2);
    assert_eq!(a.hex()?, "11003322");
    let mut a = BitArray::from_hex("0011223344556677")?;
    assert_eq!(a.byteswap_all(None, None)?, 1);
    assert_eq!(a.hex()?, "7766554433221100");
    let mut a = BitArray::from_hex("00112233")?;
    assert_eq!(a.byteswap_fmt("h", None, None, true)?, 2);
    assert_eq!(a.hex()?, "11003322");
    assert_matches!(a.byteswap(&[0], None, None, true), Err(Error::Value(_)));

    let mut a = BitArray::from_hex("0f")?;
    a.set_slice(0, 4, &Bits::from_bin("11")?)?;
    assert_eq!(a.bin(), "111111");
    Ok(())
}

#[test]
fn stream_reading() -> Result<()> {
    let mut stream = ConstBitStream::from_string("0xdeadbeef")?;
    assert_eq!(
        stream.readlist("uint:16, uint:16")?,
        vec![Value::Uint(0xdead), Value::Uint(0xbeef)]
    );
    assert_eq!(stream.pos(), 32);
    assert_matches!(stream.read("uint:8"), Err(Error::Read(_)));
    assert_eq!(stream.pos(), 32);

    let mut stream = ConstBitStream::from_string("0xdeadbeef")?;
    assert_eq!(stream.read("uint:16")?, Value::Uint(0xdead));
    // A final token with no length takes everything that remains.
    assert_eq!(stream.read("hex")?, Value::Str("beef".to_owned()));
    assert_eq!(stream.pos(), 32);

    let mut stream = ConstBitStream::from_string("0x47000047")?;
    let first = stream.readto(&Bits::from_hex("47")?, Some(true))?;
    assert_eq!(first.hex()?, "47");
    let second = stream.readto(&Bits::from_hex("47")?, Some(true))?;
    assert_eq!(second.hex()?, "000047");
    assert_eq!(stream.pos(), 32);
    assert_matches!(
        stream.readto(&Bits::from_hex("47")?, Some(true)),
        Err(Error::Read(_))
    );

    let mut stream = ConstBitStream::from_string("0xabcd")?;
    assert_eq!(stream.peek("uint:8")?, Value::Uint(0xab));
    assert_eq!(stream.pos(), 0);
    assert_eq!(stream.read_bits(4)?.hex()?, "a");
    assert_eq!(stream.bytealign()?, 4);
    assert_eq!(stream.pos(), 8);
    assert_eq!(stream.bytealign()?, 0);
    assert_eq!(stream.byte_pos()?, 1);

    let mut stream = ConstBitStream::from_string("0b10100011")?;
    assert_eq!(
        stream.readlist("bin:2, pad:3, bin:3")?,
        vec![Value::Str("10".to_owned()), Value::Str("011".to_owned())]
    );

    // Variable-length reads advance by the consumed bits.
    let mut stream = ConstBitStream::new(Bits::from_ue(9)?.concat(&Bits::from_uint(3, 2)?));
    assert_eq!(stream.read("ue")?, Value::Uint(9));
    assert_eq!(stream.read("uint:2")?, Value::Uint(3));

    assert_matches!(
        Bits::from_hex("ff")?.unpack("uint, hex"),
        Err(Error::Value(_))
    );
    Ok(())
}

#[test]
fn bitstream_edits_reset_cursor() -> Result<()> {
    let mut stream = BitStream::from_string("0xdead")?;
    assert_eq!(stream.read("uint:8")?, Value::Uint(0xde));
    assert_eq!(stream.pos(), 8);
    stream.append(&Bits::from_hex("ff")?);
    assert_eq!(stream.pos(), 0);
    assert_eq!(stream.len(), 24);

    stream.set_pos(16)?;
    stream.insert(&Bits::from_hex("00")?, 8)?;
    assert_eq!(stream.pos(), 0);
    assert_eq!(stream.hex()?, "de00adff");
    Ok(())
}

#[test]
fn array_basics() -> Result<()> {
    let mut a = Array::from_values("uint8", [1u8, 2, 3, 4])?;
    assert_eq!(a.len(), 4);
    assert_eq!(a.get(0)?, Value::Uint(1));
    assert_eq!(a.get(-1)?, Value::Uint(4));
    a.set(1, 100u8)?;
    assert_eq!(a.get(1)?, Value::Uint(100));
    a.append(5u8)?;
    a.extend([6u8, 7])?;
    assert_eq!(a.len(), 7);
    assert_eq!(a.pop(-1)?, Value::Uint(7));
    a.insert(0, 9u8)?;
    assert_eq!(a.get(0)?, Value::Uint(9));
    a.reverse();
    assert_eq!(a.get(-1)?, Value::Uint(9));
    assert_eq!(a.count(100u8)?, 1);

    assert_matches!(a.get(100), Err(Error::Index(_)));
    assert_matches!(Array::new("ue"), Err(Error::Creation(_)));
    assert_matches!(Array::new("uint"), Err(Error::Creation(_)));

    let b = Array::from_values("uint8", [1u8, 2])?;
    let c = Array::from_bytes("uint8", &[1, 2])?;
    assert!(b.equals(&c));

    let sliced = Array::from_values("uint8", [1u8, 2, 3, 4, 5])?.get_slice(1, 4, 2)?;
    assert_eq!(sliced.to_vec()?, vec![Value::Uint(2), Value::Uint(4)]);

    let mut resized = Array::from_values("uint8", [1u8, 2, 3])?;
    resized.set_slice(1, 2, [9u8, 9])?;
    assert_eq!(
        resized.to_vec()?,
        vec![Value::Uint(1), Value::Uint(9), Value::Uint(9), Value::Uint(3)]
    );

    let trailing = Array::from_bits("uint8", Bits::from_bin("111111111")?)?;
    assert_eq!(trailing.len(), 1);
    assert_eq!(trailing.trailing_bits().len(), 1);
    Ok(())
}

#[test]
fn array_arithmetic() -> Result<()> {
    let a = Array::from_values("uint8", [1u8, 2, 3, 4])?;
    let b = a.add_scalar(10)?;
    assert_eq!(
        b.to_vec()?,
        vec![
            Value::Uint(11),
            Value::Uint(12),
            Value::Uint(13),
            Value::Uint(14)
        ]
    );
    assert_eq!(b.dtype(), Dtype::new("uint8")?);

    // Integer results wrap to the item width.
    let wrapped = Array::from_values("uint8", [250u8, 1])?.add_scalar(10)?;
    assert_eq!(wrapped.to_vec()?, vec![Value::Uint(4), Value::Uint(11)]);

    let mut inplace = Array::from_values("uint8", [250u8, 1])?;
    inplace.add_scalar_in_place(10)?;
    assert_eq!(inplace.to_vec()?, vec![Value::Uint(4), Value::Uint(11)]);

    let floats = Array::from_values("float32", [1.5f64, 2.5])?;
    let ints = Array::from_values("int8", [1i8, 2])?;
    let summed = ints.add(&floats)?;
    assert_eq!(summed.dtype(), Dtype::new("float32")?);
    assert_eq!(summed.to_vec()?, vec![Value::Float(2.5), Value::Float(4.5)]);

    let signed = Array::from_values("uint8", [1u8, 2])?.add(&Array::from_values("int8", [1i8, 1])?)?;
    assert_eq!(signed.dtype(), Dtype::new("int8")?);
    assert_eq!(signed.to_vec()?, vec![Value::Int(2), Value::Int(3)]);

    let longer =
        Array::from_values("uint8", [1u8, 2])?.add(&Array::from_values("uint16", [1u16, 1])?)?;
    assert_eq!(longer.dtype(), Dtype::new("uint16")?);

    assert_matches!(
        a.add(&Array::from_values("uint8", [1u8])?),
        Err(Error::Value(_))
    );

    let shifted = Array::from_values("uint8", [1u8, 2])?.shl_scalar(2)?;
    assert_eq!(shifted.to_vec()?, vec![Value::Uint(4), Value::Uint(8)]);
    assert_matches!(floats.shl_scalar(1), Err(Error::Value(_)));

    let halves = Array::from_values("uint8", [7u8, 8])?.floordiv_scalar(2)?;
    assert_eq!(halves.to_vec()?, vec![Value::Uint(3), Value::Uint(4)]);

    let compared = Array::from_values("uint8", [1u8, 5])?.lt_scalar(3)?;
    assert_eq!(compared.to_vec()?, vec![Value::Bool(true), Value::Bool(false)]);
    assert_eq!(compared.dtype(), Dtype::new("bool")?);

    let masked =
        Array::from_values("uint8", [0xffu8, 0x0f])?.bitwise_and(&Bits::from_hex("f0")?)?;
    assert_eq!(masked.to_vec()?, vec![Value::Uint(0xf0), Value::Uint(0x00)]);
    Ok(())
}

#[test]
fn array_conversions() -> Result<()> {
    let a = Array::from_values("uint8", [1u8, 2])?;
    let wide = a.astype("uint16")?;
    assert_eq!(wide.dtype(), Dtype::new("uint16")?);
    assert_eq!(wide.to_vec()?, vec![Value::Uint(1), Value::Uint(2)]);
    assert_eq!(wide.to_bytes(), vec![0, 1, 0, 2]);

    let mut swapped = Array::from_values("uint16", [0x0102u16, 0x0304])?;
    swapped.byteswap()?;
    assert_eq!(swapped.to_vec()?, vec![Value::Uint(0x0201), Value::Uint(0x0403)]);
    let mut odd = Array::from_values("uint12", [1u16])?;
    assert_matches!(odd.byteswap(), Err(Error::Value(_)));

    let with_nan = Array::from_values("float32", [1.0f64, f64::NAN, 2.0])?;
    assert_eq!(with_nan.count(f64::NAN)?, 1);
    assert_eq!(with_nan.count(1.0f64)?, 1);

    let mut from_io = Array::new("uint8")?;
    let mut cursor = Cursor::new(vec![1u8, 2, 3]);
    from_io.read_file(&mut cursor, Some(2))?;
    assert_eq!(from_io.to_vec()?, vec![Value::Uint(1), Value::Uint(2)]);

    let mut sink = Vec::new();
    Array::from_values("uint8", [9u8, 8])?.to_file(&mut sink)?;
    assert_eq!(sink, vec![9, 8]);
    Ok(())
}

#[test]
fn auto_scale() -> Result<()> {
    let dtype = Dtype::scaled("e2m1mxfp", Scale::Auto)?;
    let array = Array::from_scaled_values(dtype, [12.0f64, 3.0, -6.0])?;
    let scale = array.dtype().scale();
    assert_matches!(scale, Some(Scale::Factor(f)) if f == 2.0);
    assert_eq!(array.get(0)?, Value::Float(12.0));
    assert_eq!(array.get(2)?, Value::Float(-6.0));

    // Small values scale down so the largest one fills the format.
    let dtype = Dtype::scaled("e2m1mxfp", Scale::Auto)?;
    let array = Array::from_scaled_values(dtype, [1.0f64, 2.0])?;
    assert_matches!(array.dtype().scale(), Some(Scale::Factor(f)) if f == 0.5);
    assert_eq!(array.get(0)?, Value::Float(1.0));
    Ok(())
}

#[test]
fn dtype_registry() -> Result<()> {
    assert_eq!(Dtype::new("uint8")?, Dtype::with_length("uint", 8)?);
    assert_eq!(Dtype::new("uint8")?.to_string(), "uint8");
    assert_eq!(Dtype::new("float32")?.to_string(), "floatbe32");
    assert_eq!(Dtype::new("FLOAT32")?, Dtype::new("floatbe32")?);
    assert_eq!(Dtype::new("se")?.to_string(), "se");
    assert_eq!(Dtype::new("bool")?.bit_length(), Some(1));
    assert_eq!(Dtype::new("bytes2")?.bit_length(), Some(16));
    assert!(Dtype::new("se")?.variable_length());
    assert!(Dtype::new("int8")?.is_signed());
    assert!(!Dtype::new("uint8")?.is_signed());

    assert_matches!(Dtype::new("wibble"), Err(Error::Creation(_)));
    assert_matches!(Dtype::new("float:33"), Err(Error::Creation(_)));
    assert_matches!(Dtype::with_length("se", 5), Err(Error::Creation(_)));
    assert_matches!(Dtype::scaled("uint8", Scale::Factor(2.0)), Err(Error::Creation(_)));

    let mut hasher_a = DefaultHasher::new();
    Dtype::new("uint8")?.hash(&mut hasher_a);
    let mut hasher_b = DefaultHasher::new();
    Dtype::with_length("uint", 8)?.hash(&mut hasher_b);
    assert_eq!(hasher_a.finish(), hasher_b.finish());

    // Interpretation of the wrong number of bits is rejected.
    assert_matches!(
        Dtype::new("float32")?.parse(&Bits::from_hex("abcd")?),
        Err(Error::Interpret(_))
    );
    assert_matches!(Bits::from_bin("101")?.hex(), Err(Error::Interpret(_)));
    assert_matches!(Bits::from_bin("1011")?.oct(), Err(Error::Interpret(_)));
    Ok(())
}

#[test]
fn bits_representations() -> Result<()> {
    let s = Bits::from_string("uint:12=100, 0b110, 0xff")?;
    assert_eq!(s.len(), 23);
    assert_eq!(s.slice(0, 12)?.uint()?, 100);
    assert_eq!(s.slice(12, 15)?.bin(), "110");
    assert_eq!(s.slice(15, 23)?.hex()?, "ff");

    assert_eq!(Bits::from_string("se=-3")?, Bits::from_se(-3)?);
    assert_eq!(Bits::from_string("pad:4, 0xf")?.hex()?, "0f");

    assert_eq!(Bits::from_hex("abc")?.to_string(), "0xabc");
    assert_eq!(Bits::from_bin("101")?.to_string(), "0b101");
    assert_eq!(Bits::from_oct("777")?.oct()?, "777");
    assert_eq!(Bits::from_bytes(&[0xde, 0xad]).bytes()?, vec![0xde, 0xad]);
    assert_eq!(Bits::from_bools([true, false, true]).bin(), "101");
    assert_eq!(Bits::from_bytes_offset(&[0x0f, 0xf0], 4, 8)?.hex()?, "ff");

    // Equality against token strings and between the two container types.
    let bits = Bits::from_hex("0f")?;
    assert_eq!(bits, "0x0f");
    let array = BitArray::from_hex("0f")?;
    assert_eq!(array, bits);
    assert_eq!(bits, array);

    let mut hasher_a = DefaultHasher::new();
    Bits::from_hex("abcd")?.hash(&mut hasher_a);
    let mut hasher_b = DefaultHasher::new();
    Bits::from_hex("abcd")?.hash(&mut hasher_b);
    assert_eq!(hasher_a.finish(), hasher_b.finish());

    assert_eq!(Bits::from_hex("ef")?.count(true), 7);
    assert!(Bits::from_bin("111")?.all(true, None)?);
    assert!(Bits::from_bin("101")?.all(true, Some(&[0, 2, -1]))?);
    assert!(Bits::from_bin("010")?.any(true, None)?);
    assert!(!Bits::zeros(4).any(true, None)?);

    let chunks: Vec<Bits> = Bits::from_hex("deadbeef")?.cut(8, None, None, None)?.collect();
    assert_eq!(chunks.len(), 4);
    assert_eq!(chunks[0].hex()?, "de");
    assert_eq!(chunks[3].hex()?, "ef");

    let sections = Bits::from_hex("aa0bee0b")?.split(&Bits::from_hex("0b")?, None, None, None, Some(true))?;
    assert_eq!(sections.len(), 3);
    assert_eq!(sections[0].hex()?, "aa");
    assert_eq!(sections[1].hex()?, "0bee");
    assert_eq!(sections[2].hex()?, "0b");

    let joined = Bits::from_bin("0")?.join(&[
        Bits::from_bin("1")?,
        Bits::from_bin("1")?,
        Bits::from_bin("1")?,
    ]);
    assert_eq!(joined.bin(), "10101");

    let padded = Bits::from_bin("101")?.to_bytes();
    assert_eq!(padded, vec![0b1010_0000]);
    Ok(())
}

#[test]
fn pretty_printing() -> Result<()> {
    let mut sink = Vec::new();
    Bits::from_hex("0f")?.pp(Some("bin, hex"), 120, " ", true, &mut sink)?;
    let rendered = String::from_utf8(sink).expect("pp output is utf-8");
    assert!(rendered.contains("00001111"));
    assert!(rendered.contains("0f"));

    // Never fails on empty input.
    let mut sink = Vec::new();
    Bits::new().pp(None, 120, " ", true, &mut sink)?;
    assert!(sink.is_empty());

    let mut sink = Vec::new();
    Array::from_values("uint8", [1u8, 2, 3])?.pp(None, 80, " ", true, &mut sink)?;
    let rendered = String::from_utf8(sink).expect("pp output is utf-8");
    assert!(rendered.contains("<Array dtype='uint8', length=3, itemsize=8 bits>"));
    assert!(rendered.contains("  0: "));
    assert!(rendered.contains("1 2 3"));

    // Elements can be re-rendered under other same-width formats, two columns.
    let mut sink = Vec::new();
    Array::from_values("uint8", [255u8, 0, 16])?.pp(Some("hex, bin"), 80, " ", false, &mut sink)?;
    let rendered = String::from_utf8(sink).expect("pp output is utf-8");
    assert!(rendered.contains("ff 00 10"));
    assert!(rendered.contains("11111111 00000000 00010000"));

    assert_matches!(
        Array::from_values("uint8", [1u8])?.pp(Some("uint16"), 80, " ", false, &mut Vec::new()),
        Err(Error::Value(_))
    );

    let mut sink = Vec::new();
    Array::new("uint8")?.pp(None, 80, " ", true, &mut sink)?;
    assert!(String::from_utf8(sink).expect("pp output is utf-8").contains("length=0"));
    Ok(())
}

#[test]
fn file_round_trip() -> Result<()> {
    let path = std::env::temp_dir().join("bitseq_test_roundtrip.bin");
    let original = Bits::from_hex("deadbeef")?;
    let mut file = std::fs::File::create(&path)?;
    original.to_file(&mut file)?;
    drop(file);

    let loaded = Bits::from_file(&path, None, None)?;
    assert_eq!(loaded, original);
    let tail = Bits::from_file(&path, Some(16), None)?;
    assert_eq!(tail.hex()?, "beef");
    std::fs::remove_file(&path)?;
    Ok(())
}

#[test]
fn value_conversions() {
    assert_eq!(Value::from(5u8), Value::Uint(5));
    assert_eq!(Value::from(-5i64), Value::Int(-5));
    assert_eq!(Value::from(1.5f32), Value::Float(1.5));
    assert_eq!(Value::from("abc"), Value::Str("abc".to_owned()));
    assert_eq!(Value::from(vec![1u8, 2]), Value::Bytes(vec![1, 2]));
    assert_eq!(Value::from(true), Value::Bool(true));

    assert_eq!(Value::Uint(5).to_f64(), Some(5.0));
    assert_eq!(Value::Int(-5).to_i128(), Some(-5));
    assert_eq!(Value::Str("x".to_owned()).to_f64(), None);
    assert_eq!(Value::Bool(true).as_bool(), Some(true));
}
