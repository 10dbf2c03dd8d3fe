//! Host-side driver for the `cnn_top` HLS inference core on the Kria KV260.
//!
//! The core classifies 28×28 handwritten digits. The host stages network
//! weights and one image into two BRAM buffers as Q16.16 words, pulses
//! `ap_start`, spins on `ap_done`, and reads a single Q16.16 score that
//! rounds to the class label.
//!
//! # Layers
//!
//! ```text
//! EvaluationHarness   labelled test set → accuracy report
//!   InferenceEngine   one image → label
//!     StagingBuffer   sequential BRAM writes
//!     AcceleratorController   Idle → Running → Done handshake
//!       RegisterBus   DevMemBus (/dev/mem) | SimulatedCore (software)
//! ```
//!
//! # Quick start
//!
//! ```no_run
//! use hlscnn_driver::prelude::*;
//!
//! # fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
//! let config = EngineConfig::new();
//! let bus = DevMemBus::open("/dev/mem", &config.memory_map)?;
//! let mut engine = InferenceEngine::new(bus, config)?;
//!
//! engine.load_weights(&load_weights("weights.bin")?)?;
//! let image = ImageVector::from_gray8(&[0u8; 784])?;
//! println!("label {}", engine.classify(&image)?);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::doc_markdown)]

mod backend;
pub mod backends;
pub mod config;
pub mod controller;
pub mod dataset;
mod error;
pub mod evaluation;
pub mod fixed;
pub mod inference;
pub mod staging;
pub mod vectors;

pub use backend::{BusKind, RegisterBus};
pub use backends::{DevMemBus, SimulatedCore, DEFAULT_DEVICE};
pub use config::{EngineConfig, MemoryMap, PollPolicy};
pub use controller::{AcceleratorController, ControllerState};
pub use dataset::{load_test_set, load_weights, ImageFormat, LabelFormat, TestSetSource};
pub use error::{HlsCnnError, Result};
pub use evaluation::{EvaluationHarness, EvaluationReport, SampleOutcome, TestCase};
pub use fixed::{decode, encode, Fixed};
pub use inference::{label_from_output, InferenceEngine, InferenceResult};
pub use staging::{write_sequential, StagingBuffer};
pub use vectors::{ImageVector, WeightVector};

/// Commonly used types.
pub mod prelude {
    pub use crate::{
        load_test_set, load_weights, DevMemBus, EngineConfig, EvaluationHarness,
        EvaluationReport, Fixed, HlsCnnError, ImageVector, InferenceEngine, MemoryMap,
        PollPolicy, RegisterBus, Result, SimulatedCore, TestCase, WeightVector,
    };
}
