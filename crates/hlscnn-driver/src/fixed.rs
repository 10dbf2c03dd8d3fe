//! Q16.16 fixed-point codec
//!
//! Every value crossing the host/accelerator boundary (weights, pixels, the
//! result register) is a 32-bit two's-complement integer holding `x * 2^16`.
//!
//! No range checking is performed: reals outside roughly ±32768 wrap
//! modulo 2^32 when encoded. Callers are trusted to stay in range.

// Wrapping to 32 bits is the documented encoding behavior
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_possible_wrap)]
#![allow(clippy::cast_sign_loss)]

use hlscnn_chip::qformat::SCALE;
use std::fmt;

/// A Q16.16 value as stored in BRAM and in `out_model`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct Fixed(i32);

impl Fixed {
    /// 0.0
    pub const ZERO: Self = Self(0);

    /// 1.0
    pub const ONE: Self = Self(1 << hlscnn_chip::qformat::FRAC_BITS);

    /// Wrap a raw signed word.
    pub const fn from_raw(raw: i32) -> Self {
        Self(raw)
    }

    /// Reinterpret a register word; the full 32-bit pattern is kept.
    pub const fn from_bits(bits: u32) -> Self {
        Self(bits as i32)
    }

    /// Raw signed word.
    pub const fn raw(self) -> i32 {
        self.0
    }

    /// Bit pattern for a 32-bit store.
    pub const fn to_bits(self) -> u32 {
        self.0 as u32
    }

    /// Encode a real, see [`encode`].
    pub fn from_f64(x: f64) -> Self {
        encode(x)
    }

    /// Encode a single-precision real.
    pub fn from_f32(x: f32) -> Self {
        encode(f64::from(x))
    }

    /// Decode to a real, see [`decode`].
    pub fn to_f64(self) -> f64 {
        decode(self)
    }
}

impl fmt::Display for Fixed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.5}", self.to_f64())
    }
}

/// `round(x * 2^16)`, ties away from zero, truncated to 32 bits.
///
/// Out-of-range inputs wrap silently; NaN encodes as zero.
pub fn encode(x: f64) -> Fixed {
    // f64 -> i64 saturates, i64 -> i32 keeps the low 32 bits
    Fixed((x * SCALE).round() as i64 as i32)
}

/// `v / 2^16` in double precision. Exact for every 32-bit input.
pub fn decode(v: Fixed) -> f64 {
    f64::from(v.0) / SCALE
}

/// Encode a slice of reals in order.
pub fn encode_slice(values: &[f64]) -> Vec<Fixed> {
    values.iter().copied().map(encode).collect()
}
