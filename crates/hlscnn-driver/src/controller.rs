//! `ap_ctrl` handshake state machine
//!
//! ```text
//!          start()             poll_until_done()          read_result()
//!   Idle ───────────▶ Running ───────────────────▶ Done ───────────────▶ Idle
//!    write START        spin on ap_ctrl until DONE       read out_model
//! ```
//!
//! Each transition is only legal from the state on its left; anything else
//! is rejected with `InvalidState` before the bus is touched.
//!
//! With the default [`PollPolicy::Unbounded`] a core that never asserts
//! `ap_done` blocks the caller forever. Bounded policies turn that into
//! `AcceleratorNonResponsive`.
//!
//! The done bit is assumed to clear when the next run starts (the core
//! clears it on read or when `ap_start` drops); the driver does not check.

use crate::backend::RegisterBus;
use crate::config::{MemoryMap, PollPolicy};
use crate::error::{HlsCnnError, Result};
use crate::fixed::Fixed;
use hlscnn_chip::regs::ap_ctrl;
use std::time::Instant;
use tracing::{debug, trace, warn};

/// Handshake state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerState {
    /// Ready for `start`
    Idle,
    /// Started, done not yet observed
    Running,
    /// Done observed, result not yet read
    Done,
}

impl std::fmt::Display for ControllerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "Idle"),
            Self::Running => write!(f, "Running"),
            Self::Done => write!(f, "Done"),
        }
    }
}

/// Drives start / poll / read against the control block
#[derive(Debug, Clone)]
pub struct AcceleratorController {
    control_register: u64,
    output_register: u64,
    policy: PollPolicy,
    state: ControllerState,
}

impl AcceleratorController {
    /// Controller for the control block in `memory_map`.
    pub const fn new(memory_map: &MemoryMap, policy: PollPolicy) -> Self {
        Self {
            control_register: memory_map.control_register(),
            output_register: memory_map.output_register(),
            policy,
            state: ControllerState::Idle,
        }
    }

    /// Current state.
    pub const fn state(&self) -> ControllerState {
        self.state
    }

    /// Active poll policy.
    pub const fn policy(&self) -> PollPolicy {
        self.policy
    }

    /// Launch one run by writing `ap_start`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidState` unless `Idle`; propagates bus errors.
    pub fn start<B: RegisterBus + ?Sized>(&mut self, bus: &mut B) -> Result<()> {
        self.require_state(ControllerState::Idle, "start")?;
        bus.write_word(self.control_register, ap_ctrl::START)?;
        self.state = ControllerState::Running;
        trace!("ap_start written to {:#x}", self.control_register);
        Ok(())
    }

    /// Spin on `ap_ctrl` until `ap_done` is observed. Returns the number of reads.
    ///
    /// Only the done bit ends the wait; `ap_start` reading back as set does not.
    ///
    /// # Errors
    ///
    /// Returns `InvalidState` unless `Running`, `AcceleratorNonResponsive`
    /// when a bounded policy runs out, and propagates bus errors. On error
    /// the controller stays `Running`.
    pub fn poll_until_done<B: RegisterBus + ?Sized>(&mut self, bus: &mut B) -> Result<u64> {
        self.require_state(ControllerState::Running, "poll_until_done")?;

        let started = Instant::now();
        let mut polls = 0u64;
        loop {
            let status = bus.read_word(self.control_register)?;
            polls += 1;

            if status & ap_ctrl::DONE != 0 {
                self.state = ControllerState::Done;
                trace!("ap_done after {polls} polls ({:?})", started.elapsed());
                return Ok(polls);
            }

            let exhausted = match self.policy {
                PollPolicy::Unbounded => false,
                PollPolicy::Timeout(limit) => started.elapsed() >= limit,
                PollPolicy::MaxPolls(max) => polls >= max,
            };
            if exhausted {
                let waited_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
                warn!("ap_done not asserted after {polls} polls ({waited_ms}ms), status={status:#x}");
                return Err(HlsCnnError::AcceleratorNonResponsive { polls, waited_ms });
            }

            std::hint::spin_loop();
        }
    }

    /// Read `out_model` as a raw Q16.16 word and return to `Idle`.
    ///
    /// The run is over once done was observed, so the controller returns to
    /// `Idle` even when the bus read fails.
    ///
    /// # Errors
    ///
    /// Returns `InvalidState` unless `Done`; propagates bus errors.
    pub fn read_output<B: RegisterBus + ?Sized>(&mut self, bus: &mut B) -> Result<Fixed> {
        self.require_state(ControllerState::Done, "read_result")?;
        self.state = ControllerState::Idle;
        let raw = bus.read_word(self.output_register)?;
        Ok(Fixed::from_bits(raw))
    }

    /// Read and decode `out_model`, returning to `Idle`.
    ///
    /// # Errors
    ///
    /// Same as [`read_output`](Self::read_output).
    pub fn read_result<B: RegisterBus + ?Sized>(&mut self, bus: &mut B) -> Result<f64> {
        self.read_output(bus).map(Fixed::to_f64)
    }

    /// Forget an in-flight run and return to `Idle`.
    ///
    /// The core itself is not reset; if it is still busy the next `start`
    /// may be ignored by the hardware.
    pub fn abandon(&mut self) {
        if self.state != ControllerState::Idle {
            debug!("Abandoning run in state {}", self.state);
        }
        self.state = ControllerState::Idle;
    }

    fn require_state(&self, required: ControllerState, operation: &str) -> Result<()> {
        if self.state == required {
            Ok(())
        } else {
            Err(HlsCnnError::invalid_state(format!(
                "{operation} requires {required}, controller is {}",
                self.state
            )))
        }
    }
}
