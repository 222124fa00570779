use modular_bitfield::prelude::*;
use once_cell::sync::Lazy;

// 8-bit binary floats from the draft IEEE binary8 proposal. Code 0x80 is
// the reserved NaN; codes 127/255 are the positive/negative clamps.

#[bitfield(bits = 8)]
#[derive(Debug, Clone, Copy)]
pub(crate) struct P4Code {
    pub mantissa: B3,
    pub exponent: B4,
    pub sign: bool,
}

#[bitfield(bits = 8)]
#[derive(Debug, Clone, Copy)]
pub(crate) struct P3Code {
    pub mantissa: B2,
    pub exponent: B5,
    pub sign: bool,
}

const NAN_CODE: u8 = 0b1000_0000;
const POS_CLAMP: u8 = 127;
const NEG_CLAMP: u8 = 255;

#[derive(Debug)]
pub(crate) struct Binary8Format {
    pub exp_bits: u32,
    pub bias: i32,
    lut: Lazy<[f64; 256]>,
}

pub(crate) static P4BINARY: Binary8Format = Binary8Format {
    exp_bits: 4,
    bias: 8,
    lut: Lazy::new(|| build_lut(4, 8)),
};

pub(crate) static P3BINARY: Binary8Format = Binary8Format {
    exp_bits: 5,
    bias: 16,
    lut: Lazy::new(|| build_lut(5, 16)),
};

fn split_fields(exp_bits: u32, code: u8) -> (bool, u32, u32) {
    match exp_bits {
        4 => {
            let c = P4Code::from_bytes([code]);
            (c.sign(), c.exponent() as u32, c.mantissa() as u32)
        }
        _ => {
            let c = P3Code::from_bytes([code]);
            (c.sign(), c.exponent() as u32, c.mantissa() as u32)
        }
    }
}

fn join_fields(exp_bits: u32, sign: bool, exponent: u32, mantissa: u32) -> u8 {
    match exp_bits {
        4 => P4Code::new()
            .with_sign(sign)
            .with_exponent(exponent as u8)
            .with_mantissa(mantissa as u8)
            .into_bytes()[0],
        _ => P3Code::new()
            .with_sign(sign)
            .with_exponent(exponent as u8)
            .with_mantissa(mantissa as u8)
            .into_bytes()[0],
    }
}

fn build_lut(exp_bits: u32, bias: i32) -> [f64; 256] {
    let mantissa_bits = 7 - exp_bits;
    let max_exponent = (1u32 << exp_bits) - 1;
    let mut lut = [0.0f64; 256];
    for (code, slot) in lut.iter_mut().enumerate() {
        let (sign, exponent, mantissa) = split_fields(exp_bits, code as u8);
        let signum = if sign { -1.0 } else { 1.0 };
        *slot = if code as u8 == NAN_CODE {
            f64::NAN
        } else if exponent == max_exponent {
            if mantissa == 0 {
                signum * f64::INFINITY
            } else {
                f64::NAN
            }
        } else if exponent == 0 {
            let fraction = mantissa as f64 / (1u32 << mantissa_bits) as f64;
            signum * fraction * 2f64.powi(1 - bias)
        } else {
            let fraction = 1.0 + mantissa as f64 / (1u32 << mantissa_bits) as f64;
            signum * fraction * 2f64.powi(exponent as i32 - bias)
        };
    }
    lut
}

impl Binary8Format {
    pub fn decode(&self, code: u8) -> f64 {
        self.lut[code as usize]
    }

    pub fn encode(&self, value: f64) -> u8 {
        if value.is_nan() {
            return NAN_CODE;
        }
        let sign = value.is_sign_negative();
        let magnitude = value.abs();
        if magnitude == 0.0 {
            return join_fields(self.exp_bits, sign, 0, 0);
        }
        let mantissa_bits = 7 - self.exp_bits;
        let max_exponent = (1u32 << self.exp_bits) - 1;
        // Largest finite value has the penultimate exponent and a full mantissa.
        let max_finite = (2.0 - 2f64.powi(-(mantissa_bits as i32)))
            * 2f64.powi(max_exponent as i32 - 1 - self.bias);
        if magnitude > max_finite {
            return if sign { NEG_CLAMP } else { POS_CLAMP };
        }
        let mut exponent = magnitude.log2().floor() as i32;
        if exponent < 1 - self.bias {
            // Subnormal range.
            let scaled = magnitude / 2f64.powi(1 - self.bias) * (1u32 << mantissa_bits) as f64;
            let mantissa = scaled.round_ties_even() as u32;
            if mantissa >> mantissa_bits != 0 {
                // Rounded up into the smallest normal.
                return join_fields(self.exp_bits, sign, 1, 0);
            }
            return join_fields(self.exp_bits, sign, 0, mantissa & ((1 << mantissa_bits) - 1));
        }
        let fraction = magnitude / 2f64.powi(exponent) - 1.0;
        let mut mantissa = (fraction * (1u32 << mantissa_bits) as f64).round_ties_even() as u32;
        if mantissa >> mantissa_bits != 0 {
            mantissa = 0;
            exponent += 1;
        }
        if exponent + self.bias >= max_exponent as i32 {
            return if sign { NEG_CLAMP } else { POS_CLAMP };
        }
        join_fields(
            self.exp_bits,
            sign,
            (exponent + self.bias) as u32,
            mantissa,
        )
    }
}
