use std::sync::RwLock;

use once_cell::sync::Lazy;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MxfpOverflow {
    Saturate,
    Overflow,
}

#[derive(Debug, Clone, Copy)]
pub struct Options {
    pub lsb0: bool,
    pub bytealigned: bool,
    pub mxfp_overflow: MxfpOverflow,
    pub no_color: bool,
}

static OPTIONS: Lazy<RwLock<Options>> = Lazy::new(|| {
    RwLock::new(Options {
        lsb0: false,
        bytealigned: false,
        mxfp_overflow: MxfpOverflow::Saturate,
        no_color: std::env::var_os("NO_COLOR").is_some(),
    })
});

pub fn snapshot() -> Options {
    *OPTIONS.read().expect("options lock poisoned")
}

pub fn lsb0() -> bool {
    snapshot().lsb0
}

pub fn set_lsb0(value: bool) {
    OPTIONS.write().expect("options lock poisoned").lsb0 = value;
}

pub fn bytealigned() -> bool {
    snapshot().bytealigned
}

pub fn set_bytealigned(value: bool) {
    OPTIONS.write().expect("options lock poisoned").bytealigned = value;
}

pub fn mxfp_overflow() -> MxfpOverflow {
    snapshot().mxfp_overflow
}

pub fn set_mxfp_overflow(value: MxfpOverflow) {
    OPTIONS.write().expect("options lock poisoned").mxfp_overflow = value;
}

pub fn no_color() -> bool {
    snapshot().no_color
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct Colour {
    pub blue: &'static str,
    pub purple: &'static str,
    pub green: &'static str,
    pub off: &'static str,
}

impl Colour {
    pub fn new(use_colour: bool) -> Colour {
        if use_colour {
            Colour {
                blue: "\x1b[34m",
                purple: "\x1b[35m",
                green: "\x1b[32m",
                off: "\x1b[0m",
            }
        } else {
            Colour {
                blue: "",
                purple: "",
                green: "",
                off: "",
            }
        }
    }

    pub fn current() -> Colour {
        Colour::new(!no_color())
    }
}
