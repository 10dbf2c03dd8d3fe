//! Engine configuration
//!
//! The defaults reproduce the deployed KV260 design exactly: base addresses
//! from the address editor, byte-per-element staging stride, and an
//! unbounded done-bit spin. Everything can be overridden for a rebuilt
//! bitstream or for tests.

use crate::error::{HlsCnnError, Result};
use hlscnn_chip::{layout, map, regs};
use std::time::Duration;
use tracing::debug;

/// Byte addresses of the control block and both staging buffers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryMap {
    /// `s_axi_control` base
    pub control_base: u64,

    /// Result register offset from `control_base`
    pub output_offset: u64,

    /// Image staging buffer base
    pub image_base: u64,

    /// Weight staging buffer base
    pub weights_base: u64,

    /// Mapped span of the control window
    pub control_window: u64,

    /// Mapped span of the image window
    pub image_window: u64,

    /// Mapped span of the weight window
    pub weights_window: u64,

    /// Address increment between consecutive staging elements
    pub element_stride: u64,
}

impl Default for MemoryMap {
    fn default() -> Self {
        Self {
            control_base: map::CONTROL_BASE,
            output_offset: regs::OUT_MODEL0,
            image_base: map::IMAGE_STAGING_BASE,
            weights_base: map::WEIGHTS_STAGING_BASE,
            control_window: map::CONTROL_WINDOW,
            image_window: map::BRAM_WINDOW,
            weights_window: map::BRAM_WINDOW,
            element_stride: map::ELEMENT_STRIDE,
        }
    }
}

impl MemoryMap {
    /// Absolute address of `ap_ctrl`.
    pub const fn control_register(&self) -> u64 {
        self.control_base.saturating_add(regs::AP_CTRL)
    }

    /// Absolute address of `out_model`.
    pub const fn output_register(&self) -> u64 {
        self.control_base.saturating_add(self.output_offset)
    }

    /// Named `(base, span)` windows, in mapping order.
    pub const fn windows(&self) -> [(&'static str, u64, u64); 3] {
        [
            ("control", self.control_base, self.control_window),
            ("image", self.image_base, self.image_window),
            ("weights", self.weights_base, self.weights_window),
        ]
    }

    /// Bytes touched by `len` staged elements, last store included.
    /// Saturates at `u64::MAX`.
    pub const fn staging_span(&self, len: usize) -> u64 {
        if len == 0 {
            return 0;
        }
        (len as u64 - 1)
            .saturating_mul(self.element_stride)
            .saturating_add(4)
    }

    /// Check that the map can hold the synthesized buffers.
    ///
    /// # Errors
    ///
    /// Returns `InvalidState` if the stride is zero, a window runs past the
    /// end of the address space, the result register lies outside the control
    /// window, a staging buffer overruns its window, or two windows overlap.
    pub fn validate(&self) -> Result<()> {
        if self.element_stride == 0 {
            return Err(HlsCnnError::invalid_state("element stride must be non-zero"));
        }
        let mut ends = [0u64; 3];
        for ((name, base, span), end) in self.windows().into_iter().zip(ends.iter_mut()) {
            *end = base.checked_add(span).ok_or_else(|| {
                HlsCnnError::invalid_state(format!(
                    "{name} window {base:#x}+{span:#x} runs past the end of the address space"
                ))
            })?;
        }
        if self.output_offset.checked_add(4).map_or(true, |end| end > self.control_window) {
            return Err(HlsCnnError::invalid_state(format!(
                "output register {:#x} outside control window {:#x}",
                self.output_offset, self.control_window
            )));
        }

        let image_span = self.staging_span(layout::IMAGE_LEN);
        if image_span > self.image_window {
            return Err(HlsCnnError::invalid_state(format!(
                "image buffer needs {image_span:#x} bytes, window is {:#x}",
                self.image_window
            )));
        }
        let weights_span = self.staging_span(layout::WEIGHTS_LEN);
        if weights_span > self.weights_window {
            return Err(HlsCnnError::invalid_state(format!(
                "weight buffer needs {weights_span:#x} bytes, window is {:#x}",
                self.weights_window
            )));
        }

        let windows = self.windows();
        for (i, (name_a, base_a, span_a)) in windows.iter().enumerate() {
            for (j, (name_b, base_b, span_b)) in windows.iter().enumerate().skip(i + 1) {
                if *base_a < ends[j] && *base_b < ends[i] {
                    return Err(HlsCnnError::invalid_state(format!(
                        "{name_a} window {base_a:#x}+{span_a:#x} overlaps {name_b} window {base_b:#x}+{span_b:#x}"
                    )));
                }
            }
        }

        Ok(())
    }
}

/// How `poll_until_done` waits for `ap_done`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PollPolicy {
    /// Spin until done. Hangs forever if the core never finishes.
    #[default]
    Unbounded,

    /// Give up once this much wall-clock time has passed.
    Timeout(Duration),

    /// Give up after this many control register reads.
    MaxPolls(u64),
}

impl PollPolicy {
    /// Build from an optional millisecond timeout; `None` or zero means unbounded.
    pub const fn from_timeout_ms(timeout_ms: Option<u64>) -> Self {
        match timeout_ms {
            Some(ms) if ms > 0 => Self::Timeout(Duration::from_millis(ms)),
            _ => Self::Unbounded,
        }
    }

    /// Whether this policy can ever report a non-responsive core.
    pub const fn is_bounded(&self) -> bool {
        !matches!(self, Self::Unbounded)
    }
}

/// Engine configuration
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EngineConfig {
    /// Address layout
    pub memory_map: MemoryMap,

    /// Done-bit wait policy
    pub poll_policy: PollPolicy,
}

impl EngineConfig {
    /// Configuration for the deployed bitstream.
    pub fn new() -> Self {
        let config = Self::default();
        debug!(
            "Engine config: ctrl {:#x}, image {:#x}, weights {:#x}, stride {}",
            config.memory_map.control_base,
            config.memory_map.image_base,
            config.memory_map.weights_base,
            config.memory_map.element_stride
        );
        config
    }

    /// Replace the memory map.
    #[must_use]
    pub const fn with_memory_map(mut self, memory_map: MemoryMap) -> Self {
        self.memory_map = memory_map;
        self
    }

    /// Replace the poll policy.
    #[must_use]
    pub const fn with_poll_policy(mut self, poll_policy: PollPolicy) -> Self {
        self.poll_policy = poll_policy;
        self
    }
}
