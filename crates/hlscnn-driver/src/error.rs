//! Error types for accelerator driver operations

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for driver operations
pub type Result<T> = std::result::Result<T, HlsCnnError>;

/// Errors that can occur while driving the accelerator
#[derive(Debug, Error)]
pub enum HlsCnnError {
    /// Device node could not be opened or a window could not be mapped
    #[error("Device unavailable ({path}): {reason}")]
    DeviceUnavailable {
        /// Device node that was opened
        path: PathBuf,
        /// Reason for failure
        reason: String,
    },

    /// Done bit not observed within the configured poll budget
    #[error("Accelerator did not assert done after {polls} polls ({waited_ms}ms)")]
    AcceleratorNonResponsive {
        /// Control register reads performed
        polls: u64,
        /// Wall-clock time spent polling in milliseconds
        waited_ms: u64,
    },

    /// Operation issued in the wrong controller/engine state
    #[error("Invalid state: {state}")]
    InvalidState {
        /// Description of the violated precondition
        state: String,
    },

    /// Vector length does not match the synthesized buffer size
    #[error("{what} length mismatch: expected {expected}, got {actual}")]
    LengthMismatch {
        /// Which vector was rejected
        what: &'static str,
        /// Length the hardware expects
        expected: usize,
        /// Length supplied
        actual: usize,
    },

    /// Register access outside every mapped window
    #[error("Address {address:#x} outside mapped window {window}")]
    OutOfBounds {
        /// Absolute byte address
        address: u64,
        /// Window description
        window: String,
    },

    /// Weight or test-set file is malformed
    #[error("Dataset error: {reason}")]
    Dataset {
        /// Reason for failure
        reason: String,
    },

    /// I/O error while reading a dataset file
    #[error("I/O error: {source}")]
    Io {
        /// Underlying I/O error
        #[from]
        source: std::io::Error,
    },
}

impl HlsCnnError {
    /// Create a device unavailable error
    pub fn device_unavailable(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::DeviceUnavailable {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create an invalid state error
    pub fn invalid_state(state: impl Into<String>) -> Self {
        Self::InvalidState {
            state: state.into(),
        }
    }

    /// Create a length mismatch error
    pub const fn length_mismatch(what: &'static str, expected: usize, actual: usize) -> Self {
        Self::LengthMismatch {
            what,
            expected,
            actual,
        }
    }

    /// Create an out-of-bounds error
    pub fn out_of_bounds(address: u64, window: impl Into<String>) -> Self {
        Self::OutOfBounds {
            address,
            window: window.into(),
        }
    }

    /// Create a dataset error
    pub fn dataset(reason: impl Into<String>) -> Self {
        Self::Dataset {
            reason: reason.into(),
        }
    }

    /// Whether this error means the hardware could not be brought up at all.
    ///
    /// The CLI maps this to a dedicated exit status.
    pub const fn is_device_unavailable(&self) -> bool {
        matches!(self, Self::DeviceUnavailable { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn device_unavailable_is_classified() {
        let e = HlsCnnError::device_unavailable("/dev/mem", "permission denied");
        assert!(e.is_device_unavailable());
        assert!(e.to_string().contains("/dev/mem"));
        assert!(!HlsCnnError::invalid_state("x").is_device_unavailable());
    }

    #[test]
    fn length_mismatch_message() {
        let e = HlsCnnError::length_mismatch("image", 784, 783);
        assert_eq!(e.to_string(), "image length mismatch: expected 784, got 783");
    }
}
