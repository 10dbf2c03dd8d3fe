//! Register bus abstraction
//!
//! Everything above this trait (staging writer, controller, engine) talks to
//! the hardware exclusively through 32-bit reads and writes at absolute byte
//! addresses. Swapping the bus swaps real silicon for the software core.

use crate::error::Result;
use std::fmt::Debug;

/// Raw 32-bit access at absolute byte addresses.
///
/// Reads take `&mut self`: on hardware a control-register read may clear
/// `ap_done`, so it is not a pure observation.
pub trait RegisterBus: Debug + Send {
    /// Load one 32-bit word.
    ///
    /// # Errors
    ///
    /// Returns error if `address` is not backed by the bus.
    fn read_word(&mut self, address: u64) -> Result<u32>;

    /// Store one 32-bit word, bit pattern preserved.
    ///
    /// # Errors
    ///
    /// Returns error if `address` is not backed by the bus.
    fn write_word(&mut self, address: u64, value: u32) -> Result<()>;

    /// Bus type for logging.
    fn kind(&self) -> BusKind;
}

impl<B: RegisterBus + ?Sized> RegisterBus for Box<B> {
    fn read_word(&mut self, address: u64) -> Result<u32> {
        (**self).read_word(address)
    }

    fn write_word(&mut self, address: u64, value: u32) -> Result<()> {
        (**self).write_word(address, value)
    }

    fn kind(&self) -> BusKind {
        (**self).kind()
    }
}

/// Bus type identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusKind {
    /// Physical windows mapped from `/dev/mem` (or a UIO node)
    DevMem,

    /// Software model of the `ap_ctrl` protocol, no hardware required
    Simulated,
}

impl std::fmt::Display for BusKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DevMem => write!(f, "DevMem"),
            Self::Simulated => write!(f, "Simulated"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bus_kind_display() {
        assert_eq!(BusKind::DevMem.to_string(), "DevMem");
        assert_eq!(BusKind::Simulated.to_string(), "Simulated");
    }
}
