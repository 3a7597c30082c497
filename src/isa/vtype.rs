//! Element width (SEW) and register-group multiplier (LMUL) types.
//!
//! Both carry their RVV `vtype` CSR encodings so the dispatcher can pack and
//! unpack the CSR bit fields. The encodings follow the V-extension layout:
//! `vlmul` in bits [2:0], `vsew` in bits [5:3].

use std::fmt;
use thiserror::Error;

/// Errors from decoding instruction words or CSR encodings.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum DecodeError {
    /// A reserved `vtype` field encoding was selected.
    #[error("reserved {field} encoding {value}")]
    ReservedEncoding {
        /// CSR field name (`vsew` or `vlmul`).
        field: &'static str,
        /// The raw encoding value.
        value: u8,
    },

    /// An instruction word the decoder does not recognize.
    #[error("unsupported instruction word 0x{word:08X}")]
    UnsupportedInstruction {
        /// The raw 32-bit instruction.
        word: u32,
    },
}

/// Selected element width in bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sew {
    E8,
    E16,
    E32,
    E64,
}

impl Sew {
    /// Element width in bits.
    #[inline]
    pub fn bits(self) -> u32 {
        match self {
            Sew::E8 => 8,
            Sew::E16 => 16,
            Sew::E32 => 32,
            Sew::E64 => 64,
        }
    }

    /// Element width in bytes.
    #[inline]
    pub fn bytes(self) -> u64 {
        self.bits() as u64 / 8
    }

    /// Mask covering one element's bits within a 64-bit word.
    #[inline]
    pub fn element_mask(self) -> u64 {
        match self {
            Sew::E64 => u64::MAX,
            _ => (1u64 << self.bits()) - 1,
        }
    }

    /// Parse a width given in bits (8/16/32/64).
    pub fn from_bits(bits: u32) -> Option<Self> {
        match bits {
            8 => Some(Sew::E8),
            16 => Some(Sew::E16),
            32 => Some(Sew::E32),
            64 => Some(Sew::E64),
            _ => None,
        }
    }

    /// The 3-bit `vsew` CSR encoding.
    pub fn encoding(self) -> u8 {
        match self {
            Sew::E8 => 0,
            Sew::E16 => 1,
            Sew::E32 => 2,
            Sew::E64 => 3,
        }
    }

    /// Decode a 3-bit `vsew` field. Encodings above 3 are reserved.
    pub fn from_encoding(enc: u8) -> Result<Self, DecodeError> {
        match enc {
            0 => Ok(Sew::E8),
            1 => Ok(Sew::E16),
            2 => Ok(Sew::E32),
            3 => Ok(Sew::E64),
            _ => Err(DecodeError::ReservedEncoding {
                field: "vsew",
                value: enc,
            }),
        }
    }
}

impl fmt::Display for Sew {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "e{}", self.bits())
    }
}

/// Register-group multiplier.
///
/// `M2`..`M8` group consecutive physical registers into one logical group;
/// the fractional settings restrict a single register to a fraction of its
/// capacity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lmul {
    F8,
    F4,
    F2,
    M1,
    M2,
    M4,
    M8,
}

impl Lmul {
    /// Numerator of the multiplier as a fraction.
    #[inline]
    pub fn numerator(self) -> u64 {
        match self {
            Lmul::F8 | Lmul::F4 | Lmul::F2 | Lmul::M1 => 1,
            Lmul::M2 => 2,
            Lmul::M4 => 4,
            Lmul::M8 => 8,
        }
    }

    /// Denominator of the multiplier as a fraction.
    #[inline]
    pub fn denominator(self) -> u64 {
        match self {
            Lmul::F8 => 8,
            Lmul::F4 => 4,
            Lmul::F2 => 2,
            _ => 1,
        }
    }

    /// True for the fractional settings (1/2, 1/4, 1/8).
    #[inline]
    pub fn is_fractional(self) -> bool {
        self.denominator() > 1
    }

    /// The integer register count of the group, when `LMUL >= 1`.
    pub fn register_count(self) -> Option<u64> {
        if self.is_fractional() {
            None
        } else {
            Some(self.numerator())
        }
    }

    /// Maximum number of addressable elements: `LMUL * VLEN / SEW`.
    pub fn vlmax(self, vlen: u64, sew: Sew) -> u64 {
        vlen * self.numerator() / (self.denominator() * sew.bits() as u64)
    }

    /// The 3-bit `vlmul` CSR encoding. Encoding 4 is reserved.
    pub fn encoding(self) -> u8 {
        match self {
            Lmul::M1 => 0,
            Lmul::M2 => 1,
            Lmul::M4 => 2,
            Lmul::M8 => 3,
            Lmul::F8 => 5,
            Lmul::F4 => 6,
            Lmul::F2 => 7,
        }
    }

    /// Decode a 3-bit `vlmul` field. Encoding 4 is reserved.
    pub fn from_encoding(enc: u8) -> Result<Self, DecodeError> {
        match enc {
            0 => Ok(Lmul::M1),
            1 => Ok(Lmul::M2),
            2 => Ok(Lmul::M4),
            3 => Ok(Lmul::M8),
            5 => Ok(Lmul::F8),
            6 => Ok(Lmul::F4),
            7 => Ok(Lmul::F2),
            _ => Err(DecodeError::ReservedEncoding {
                field: "vlmul",
                value: enc,
            }),
        }
    }
}

impl fmt::Display for Lmul {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_fractional() {
            write!(f, "mf{}", self.denominator())
        } else {
            write!(f, "m{}", self.numerator())
        }
    }
}
