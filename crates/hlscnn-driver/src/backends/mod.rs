//! Register bus implementations
//!
//! - **DevMem**: physical windows mapped from `/dev/mem` (the board)
//! - **Simulated**: software model of the `ap_ctrl` protocol (CI, dry runs)

pub mod devmem;
pub mod mmap;
pub mod software;

pub use devmem::{DevMemBus, DEFAULT_DEVICE};
pub use software::{ScoreFn, SimulatedCore};
