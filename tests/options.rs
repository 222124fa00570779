// Option-dependent behaviour gets its own test binary: the options are
// process-wide, so this must not run alongside the tests that rely on
// the defaults.

use anyhow::Result;
use assert_matches::assert_matches;
use bitseq::{options, BitArray, Bits, ConstBitStream, Dtype, Error, MxfpOverflow, Value};

#[test]
fn process_options() -> Result<()> {
    options::set_lsb0(true);
    let s = Bits::from_bin("00010000")?;
    assert!(s.get(4)?);
    assert!(!s.get(0)?);
    assert_eq!(s.find(&Bits::from_bin("1")?, None, None, None)?, Some(4));
    assert_eq!(s.slice(0, 4)?.bin(), "0000");
    assert_eq!(s.slice(3, 5)?.bin(), "10");

    // Appending in LSB0 mode grows the numbered end, which is the left
    // of the stored bit pattern.
    let mut a = BitArray::from_bin("0001")?;
    a.append(&Bits::from_bin("1111")?);
    assert_eq!(a.bin(), "11110001");

    let mut a = BitArray::from_bin("00010000")?;
    a.set(true, &[0])?;
    assert_eq!(a.bin(), "00010001");

    let mut stream = ConstBitStream::from_string("0xff")?;
    assert_matches!(stream.read("uint:8"), Err(Error::Value(_)));
    options::set_lsb0(false);

    options::set_bytealigned(true);
    let s = Bits::from_hex("0abb")?;
    assert_eq!(s.find(&Bits::from_hex("bb")?, None, None, None)?, Some(8));
    options::set_bytealigned(false);

    options::set_mxfp_overflow(MxfpOverflow::Overflow);
    let e5m2 = Dtype::new("e5m2mxfp")?;
    let overflowed = e5m2.build(&Value::Float(1.0e9))?;
    assert_eq!(overflowed.uint()?, 124);
    assert_matches!(e5m2.parse(&overflowed)?, Value::Float(f) if f.is_infinite());
    let e4m3 = Dtype::new("e4m3mxfp")?;
    assert_eq!(e4m3.build(&Value::Float(1.0e9))?.uint()?, 255);
    options::set_mxfp_overflow(MxfpOverflow::Saturate);
    Ok(())
}
