//! Q16.16 number format shared by weights, pixels and the result register.
//!
//! ```text
//!  31            16 15             0
//! ┌────────────────┬────────────────┐
//! │ signed integer │    fraction    │
//! └────────────────┴────────────────┘
//! ```

/// Fractional bits.
pub const FRAC_BITS: u32 = 16;

/// Scale factor, `2^FRAC_BITS`.
pub const SCALE: f64 = (1u64 << FRAC_BITS) as f64;

/// Smallest representable step, `2^-16`.
pub const RESOLUTION: f64 = 1.0 / SCALE;

/// Largest real that encodes without wrapping.
pub const MAX_REAL: f64 = i32::MAX as f64 / SCALE;

/// Smallest real that encodes without wrapping.
pub const MIN_REAL: f64 = i32::MIN as f64 / SCALE;
