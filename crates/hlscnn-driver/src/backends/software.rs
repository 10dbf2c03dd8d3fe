// SPDX-License-Identifier: AGPL-3.0-only

//! Software model of the `cnn_top` core
//!
//! Implements [`RegisterBus`] with the same `ap_ctrl` handshake the HLS
//! block exposes, so the controller, engine and harness run unchanged
//! without a board:
//!
//! 1. **CI without hardware**: every engine and harness test runs here.
//! 2. **Dry runs**: the CLI's `--simulate` flag checks datasets and the
//!    full pipeline before touching `/dev/mem`.
//!
//! ## Handshake model
//!
//! ```text
//! write ap_ctrl |= START   Idle → Busy(n)        reads return START
//! read  ap_ctrl            n-th read after start  returns DONE | IDLE | READY,
//!                                                 out_model latched, done cleared
//! read  ap_ctrl while Idle                        returns IDLE | READY
//! ```
//!
//! The score is produced by a caller-supplied function of the staged
//! weights and image. The network itself is not modelled.

use crate::backend::{BusKind, RegisterBus};
use crate::config::MemoryMap;
use crate::error::{HlsCnnError, Result};
use crate::fixed::Fixed;
use hlscnn_chip::layout::{IMAGE_LEN, WEIGHTS_LEN};
use hlscnn_chip::regs::ap_ctrl;
use std::fmt;
use tracing::{debug, trace};

/// Scoring function: `(weights, image) -> class score`.
pub type ScoreFn = Box<dyn FnMut(&[Fixed], &[Fixed]) -> f64 + Send>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    Busy { remaining: u64 },
}

/// Simulated accelerator on a software register bus.
pub struct SimulatedCore {
    memory_map: MemoryMap,
    weights: Vec<Fixed>,
    image: Vec<Fixed>,
    score: ScoreFn,
    done_after: Option<u64>,
    phase: Phase,
    output: u32,
    runs: u64,
    control_reads: u64,
    write_log: Option<Vec<(u64, u32)>>,
}

impl fmt::Debug for SimulatedCore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SimulatedCore")
            .field("memory_map", &self.memory_map)
            .field("done_after", &self.done_after)
            .field("phase", &self.phase)
            .field("output", &format_args!("{:#x}", self.output))
            .field("runs", &self.runs)
            .finish_non_exhaustive()
    }
}

impl SimulatedCore {
    /// Create a core that scores with `score` and finishes on the first poll.
    pub fn new(memory_map: MemoryMap, score: ScoreFn) -> Self {
        Self {
            memory_map,
            weights: vec![Fixed::ZERO; WEIGHTS_LEN],
            image: vec![Fixed::ZERO; IMAGE_LEN],
            score,
            done_after: Some(1),
            phase: Phase::Idle,
            output: 0,
            runs: 0,
            control_reads: 0,
            write_log: None,
        }
    }

    /// Core that always reports `value`.
    pub fn constant(value: f64) -> Self {
        Self::new(MemoryMap::default(), Box::new(move |_, _| value))
    }

    /// Core that reports `outputs` in order, one per run, wrapping around.
    pub fn scripted(outputs: Vec<f64>) -> Self {
        let mut next = 0usize;
        Self::new(
            MemoryMap::default(),
            Box::new(move |_, _| {
                let value = outputs.get(next % outputs.len().max(1)).copied().unwrap_or(0.0);
                next += 1;
                value
            }),
        )
    }

    /// Use a non-default memory map.
    #[must_use]
    pub fn with_memory_map(mut self, memory_map: MemoryMap) -> Self {
        self.memory_map = memory_map;
        self
    }

    /// Assert done on the `polls`-th control read after start (minimum 1).
    #[must_use]
    pub fn with_done_after(mut self, polls: u64) -> Self {
        self.done_after = Some(polls.max(1));
        self
    }

    /// Never assert done, as a wedged core would.
    #[must_use]
    pub fn never_done(mut self) -> Self {
        self.done_after = None;
        self
    }

    /// Record every write as `(address, value)`.
    #[must_use]
    pub fn with_write_log(mut self) -> Self {
        self.write_log = Some(Vec::new());
        self
    }

    /// Weight buffer as last staged.
    pub fn weights(&self) -> &[Fixed] {
        &self.weights
    }

    /// Image buffer as last staged.
    pub fn image(&self) -> &[Fixed] {
        &self.image
    }

    /// Completed runs.
    pub const fn runs(&self) -> u64 {
        self.runs
    }

    /// Control register reads since construction.
    pub const fn control_reads(&self) -> u64 {
        self.control_reads
    }

    /// Recorded writes, empty unless [`with_write_log`](Self::with_write_log) was used.
    pub fn write_log(&self) -> &[(u64, u32)] {
        self.write_log.as_deref().unwrap_or_default()
    }

    /// Forget recorded writes.
    pub fn clear_write_log(&mut self) {
        if let Some(log) = self.write_log.as_mut() {
            log.clear();
        }
    }

    fn staging_index(&self, base: u64, len: usize, address: u64) -> Option<usize> {
        let stride = self.memory_map.element_stride;
        let delta = address.checked_sub(base)?;
        if delta.checked_rem(stride)? != 0 {
            return None;
        }
        let index = usize::try_from(delta / stride).ok()?;
        (index < len).then_some(index)
    }

    fn finish(&mut self) {
        let score = (self.score)(self.weights.as_slice(), self.image.as_slice());
        self.output = Fixed::from_f64(score).to_bits();
        self.runs += 1;
        self.phase = Phase::Idle;
        debug!("SimulatedCore: run {} scored {score}", self.runs);
    }

    fn read_control(&mut self) -> u32 {
        self.control_reads += 1;
        match self.phase {
            Phase::Idle => ap_ctrl::IDLE | ap_ctrl::READY,
            Phase::Busy { remaining } => match self.done_after {
                Some(_) if remaining <= 1 => {
                    self.finish();
                    ap_ctrl::DONE | ap_ctrl::IDLE | ap_ctrl::READY
                }
                Some(_) => {
                    self.phase = Phase::Busy {
                        remaining: remaining - 1,
                    };
                    ap_ctrl::START
                }
                None => ap_ctrl::START,
            },
        }
    }

    fn write_control(&mut self, value: u32) {
        if value & ap_ctrl::START == 0 {
            return;
        }
        match self.phase {
            Phase::Idle => {
                self.phase = Phase::Busy {
                    remaining: self.done_after.unwrap_or(u64::MAX),
                };
            }
            Phase::Busy { .. } => trace!("SimulatedCore: start ignored while busy"),
        }
    }
}

impl RegisterBus for SimulatedCore {
    fn read_word(&mut self, address: u64) -> Result<u32> {
        let map = self.memory_map;
        if address == map.control_register() {
            return Ok(self.read_control());
        }
        if address == map.output_register() {
            return Ok(self.output);
        }
        if let Some(i) = self.staging_index(map.image_base, IMAGE_LEN, address) {
            return Ok(self.image[i].to_bits());
        }
        if let Some(i) = self.staging_index(map.weights_base, WEIGHTS_LEN, address) {
            return Ok(self.weights[i].to_bits());
        }
        Err(HlsCnnError::out_of_bounds(address, "simulated core"))
    }

    fn write_word(&mut self, address: u64, value: u32) -> Result<()> {
        let map = self.memory_map;
        trace!("SimulatedCore: write {address:#x} = {value:#x}");

        if address == map.control_register() {
            self.write_control(value);
        } else if let Some(i) = self.staging_index(map.image_base, IMAGE_LEN, address) {
            self.image[i] = Fixed::from_bits(value);
        } else if let Some(i) = self.staging_index(map.weights_base, WEIGHTS_LEN, address) {
            self.weights[i] = Fixed::from_bits(value);
        } else if address.checked_sub(map.control_base).is_some_and(|o| o < map.control_window) {
            // Interrupt enables and other control registers: accepted, no effect
        } else {
            return Err(HlsCnnError::out_of_bounds(address, "simulated core"));
        }

        if let Some(log) = self.write_log.as_mut() {
            log.push((address, value));
        }
        Ok(())
    }

    fn kind(&self) -> BusKind {
        BusKind::Simulated
    }
}
