use once_cell::sync::Lazy;

use crate::options::MxfpOverflow;
use crate::result::{Error, Result};

// MXFP micro-scaling float formats. The e4m3/e5m2 clamp codes are fixed by
// the OCP MX spec and differ between the saturate and overflow policies.

#[derive(Debug)]
pub(crate) struct MxfpFormat {
    pub exp_bits: u32,
    pub mantissa_bits: u32,
    pub bias: i32,
    pub overflow: MxfpOverflow,
    lut: Lazy<Vec<f64>>,
}

pub(crate) static E2M1: MxfpFormat = MxfpFormat {
    exp_bits: 2,
    mantissa_bits: 1,
    bias: 1,
    overflow: MxfpOverflow::Saturate,
    lut: Lazy::new(|| build_lut(&E2M1)),
};

pub(crate) static E2M3: MxfpFormat = MxfpFormat {
    exp_bits: 2,
    mantissa_bits: 3,
    bias: 1,
    overflow: MxfpOverflow::Saturate,
    lut: Lazy::new(|| build_lut(&E2M3)),
};

pub(crate) static E3M2: MxfpFormat = MxfpFormat {
    exp_bits: 3,
    mantissa_bits: 2,
    bias: 3,
    overflow: MxfpOverflow::Saturate,
    lut: Lazy::new(|| build_lut(&E3M2)),
};

pub(crate) static E4M3_SATURATE: MxfpFormat = MxfpFormat {
    exp_bits: 4,
    mantissa_bits: 3,
    bias: 7,
    overflow: MxfpOverflow::Saturate,
    lut: Lazy::new(|| build_lut(&E4M3_SATURATE)),
};

pub(crate) static E4M3_OVERFLOW: MxfpFormat = MxfpFormat {
    exp_bits: 4,
    mantissa_bits: 3,
    bias: 7,
    overflow: MxfpOverflow::Overflow,
    lut: Lazy::new(|| build_lut(&E4M3_OVERFLOW)),
};

pub(crate) static E5M2_SATURATE: MxfpFormat = MxfpFormat {
    exp_bits: 5,
    mantissa_bits: 2,
    bias: 15,
    overflow: MxfpOverflow::Saturate,
    lut: Lazy::new(|| build_lut(&E5M2_SATURATE)),
};

pub(crate) static E5M2_OVERFLOW: MxfpFormat = MxfpFormat {
    exp_bits: 5,
    mantissa_bits: 2,
    bias: 15,
    overflow: MxfpOverflow::Overflow,
    lut: Lazy::new(|| build_lut(&E5M2_OVERFLOW)),
};

fn build_lut(fmt: &MxfpFormat) -> Vec<f64> {
    let width = 1 + fmt.exp_bits + fmt.mantissa_bits;
    let max_exponent = (1u32 << fmt.exp_bits) - 1;
    let mut lut = Vec::with_capacity(1 << width);
    for code in 0..1u32 << width {
        let sign = code >> (width - 1) != 0;
        let exponent = code >> fmt.mantissa_bits & ((1 << fmt.exp_bits) - 1);
        let mantissa = code & ((1 << fmt.mantissa_bits) - 1);
        let signum = if sign { -1.0 } else { 1.0 };
        let is_e4m3 = fmt.exp_bits == 4 && fmt.mantissa_bits == 3;
        let is_e5m2 = fmt.exp_bits == 5 && fmt.mantissa_bits == 2;
        let value = if is_e4m3 && exponent == max_exponent && mantissa == (1 << fmt.mantissa_bits) - 1
        {
            f64::NAN
        } else if is_e5m2 && exponent == max_exponent {
            if mantissa == 0 {
                signum * f64::INFINITY
            } else {
                f64::NAN
            }
        } else if exponent == 0 {
            let fraction = mantissa as f64 / (1u32 << fmt.mantissa_bits) as f64;
            signum * fraction * 2f64.powi(1 - fmt.bias)
        } else {
            let fraction = 1.0 + mantissa as f64 / (1u32 << fmt.mantissa_bits) as f64;
            signum * fraction * 2f64.powi(exponent as i32 - fmt.bias)
        };
        lut.push(value);
    }
    lut
}

impl MxfpFormat {
    pub fn width(&self) -> u32 {
        1 + self.exp_bits + self.mantissa_bits
    }

    pub fn max_finite(&self) -> f64 {
        self.lut
            .iter()
            .copied()
            .filter(|v| v.is_finite())
            .fold(0.0, f64::max)
    }

    // The codes that out-of-range magnitudes clamp to. e4m3 and e5m2 carry
    // the hard-coded values from the MX spec; the rest clamp to the largest
    // finite codes.
    fn clamp_codes(&self) -> (u32, u32) {
        match (self.exp_bits, self.mantissa_bits, self.overflow) {
            (4, 3, MxfpOverflow::Saturate) => (126, 254),
            (4, 3, MxfpOverflow::Overflow) => (255, 255),
            (5, 2, MxfpOverflow::Saturate) => (123, 251),
            (5, 2, MxfpOverflow::Overflow) => (124, 252),
            _ => {
                let positive = (1 << (self.exp_bits + self.mantissa_bits)) - 1;
                (positive, positive | 1 << (self.exp_bits + self.mantissa_bits))
            }
        }
    }

    fn clamp_for(&self, sign: bool) -> u32 {
        let (positive, negative) = self.clamp_codes();
        if sign {
            negative
        } else {
            positive
        }
    }

    pub fn decode(&self, code: u32) -> f64 {
        self.lut[code as usize]
    }

    pub fn encode(&self, value: f64) -> Result<u32> {
        let has_nan = (self.exp_bits == 4 && self.mantissa_bits == 3)
            || (self.exp_bits == 5 && self.mantissa_bits == 2);
        if value.is_nan() {
            if has_nan {
                return Ok(self.nan_code());
            }
            return Err(Error::creation(format!(
                "cannot convert float NaN to a {} bit MXFP format with no NaN representation",
                self.width()
            )));
        }
        let sign = value.is_sign_negative();
        let magnitude = value.abs();
        let sign_code = (sign as u32) << (self.width() - 1);
        if magnitude == 0.0 {
            return Ok(sign_code);
        }
        if magnitude > self.max_finite() {
            return Ok(self.clamp_for(sign));
        }
        let mut exponent = magnitude.log2().floor() as i32;
        let max_exponent_field = self.max_normal_exponent_field();
        if exponent < 1 - self.bias {
            let scaled =
                magnitude / 2f64.powi(1 - self.bias) * (1u32 << self.mantissa_bits) as f64;
            let mantissa = scaled.round_ties_even() as u32;
            if mantissa >> self.mantissa_bits != 0 {
                return Ok(sign_code | 1 << self.mantissa_bits);
            }
            return Ok(sign_code | mantissa);
        }
        let fraction = magnitude / 2f64.powi(exponent) - 1.0;
        let mut mantissa =
            (fraction * (1u32 << self.mantissa_bits) as f64).round_ties_even() as u32;
        if mantissa >> self.mantissa_bits != 0 {
            mantissa = 0;
            exponent += 1;
        }
        let exponent_field = (exponent + self.bias) as u32;
        if exponent_field > max_exponent_field {
            return Ok(self.clamp_for(sign));
        }
        Ok(sign_code | exponent_field << self.mantissa_bits | mantissa)
    }

    fn max_normal_exponent_field(&self) -> u32 {
        let all_ones = (1u32 << self.exp_bits) - 1;
        match (self.exp_bits, self.mantissa_bits) {
            // e5m2 reserves the all-ones exponent for Inf/NaN.
            (5, 2) => all_ones - 1,
            _ => all_ones,
        }
    }

    fn nan_code(&self) -> u32 {
        // Positive NaN code: all exponent and mantissa bits set.
        (1 << (self.width() - 1)) - 1
    }
}

pub(crate) fn format_for(
    exp_bits: u32,
    mantissa_bits: u32,
    overflow: MxfpOverflow,
) -> &'static MxfpFormat {
    match (exp_bits, mantissa_bits, overflow) {
        (2, 1, _) => &E2M1,
        (2, 3, _) => &E2M3,
        (3, 2, _) => &E3M2,
        (4, 3, MxfpOverflow::Saturate) => &E4M3_SATURATE,
        (4, 3, MxfpOverflow::Overflow) => &E4M3_OVERFLOW,
        (5, 2, MxfpOverflow::Saturate) => &E5M2_SATURATE,
        _ => &E5M2_OVERFLOW,
    }
}

// e8m0: an unsigned exponent-only scale format, value 2^(e - 127).

pub(crate) const E8M0_BIAS: i32 = 127;
pub(crate) const E8M0_NAN: u32 = 255;

pub(crate) fn e8m0_decode(code: u32) -> f64 {
    if code == E8M0_NAN {
        f64::NAN
    } else {
        2f64.powi(code as i32 - E8M0_BIAS)
    }
}

pub(crate) fn e8m0_encode(value: f64) -> Result<u32> {
    if value.is_nan() {
        return Ok(E8M0_NAN);
    }
    if value <= 0.0 || !value.is_finite() {
        return Err(Error::creation(format!(
            "e8m0 can only encode positive powers of two, not {value}"
        )));
    }
    let exponent = value.log2();
    if exponent.fract() != 0.0 {
        return Err(Error::creation(format!(
            "e8m0 can only encode exact powers of two, not {value}"
        )));
    }
    let field = exponent as i32 + E8M0_BIAS;
    if !(0..255).contains(&field) {
        return Err(Error::creation(format!(
            "{value} is out of range for the e8m0 format"
        )));
    }
    Ok(field as u32)
}
