//! Length-checked staging payloads
//!
//! The core is synthesized for fixed buffer sizes. A vector that does not
//! match would either leave stale words in BRAM or spill past the window,
//! so lengths are checked once here and never again downstream.

use crate::error::{HlsCnnError, Result};
use crate::fixed::Fixed;
use hlscnn_chip::layout::{IMAGE_LEN, WEIGHTS_LEN};
use std::ops::Deref;

/// Complete network parameter set, in the order the core expects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WeightVector(Vec<Fixed>);

impl WeightVector {
    /// Required number of words.
    pub const LEN: usize = WEIGHTS_LEN;

    /// Wrap pre-encoded weights.
    ///
    /// # Errors
    ///
    /// Returns `LengthMismatch` unless exactly [`Self::LEN`] values are given.
    pub fn new(values: Vec<Fixed>) -> Result<Self> {
        if values.len() != Self::LEN {
            return Err(HlsCnnError::length_mismatch("weights", Self::LEN, values.len()));
        }
        Ok(Self(values))
    }

    /// Encode real-valued weights.
    ///
    /// # Errors
    ///
    /// Returns `LengthMismatch` unless exactly [`Self::LEN`] values are given.
    pub fn from_reals(values: &[f64]) -> Result<Self> {
        Self::new(crate::fixed::encode_slice(values))
    }
}

impl Deref for WeightVector {
    type Target = [Fixed];

    fn deref(&self) -> &[Fixed] {
        &self.0
    }
}

/// One flattened 28×28 input, row-major.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageVector(Vec<Fixed>);

impl ImageVector {
    /// Required number of words.
    pub const LEN: usize = IMAGE_LEN;

    /// Wrap pre-encoded pixels.
    ///
    /// # Errors
    ///
    /// Returns `LengthMismatch` unless exactly [`Self::LEN`] values are given.
    pub fn new(values: Vec<Fixed>) -> Result<Self> {
        if values.len() != Self::LEN {
            return Err(HlsCnnError::length_mismatch("image", Self::LEN, values.len()));
        }
        Ok(Self(values))
    }

    /// Encode 8-bit grayscale pixels scaled to [0, 1].
    ///
    /// # Errors
    ///
    /// Returns `LengthMismatch` unless exactly [`Self::LEN`] pixels are given.
    pub fn from_gray8(pixels: &[u8]) -> Result<Self> {
        Self::new(
            pixels
                .iter()
                .map(|&p| Fixed::from_f64(f64::from(p) / 255.0))
                .collect(),
        )
    }
}

impl Deref for ImageVector {
    type Target = [Fixed];

    fn deref(&self) -> &[Fixed] {
        &self.0
    }
}
