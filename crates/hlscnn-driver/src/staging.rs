//! Sequential writes into the BRAM staging buffers
//!
//! Element `i` goes to `base + i * stride` as one raw 32-bit store, strictly
//! in ascending index order. The deployed design uses a stride of one byte
//! per element; the order and addressing must match the core's decode logic
//! exactly or data lands on the wrong BRAM words.

use crate::backend::RegisterBus;
use crate::config::MemoryMap;
use crate::error::{HlsCnnError, Result};
use crate::fixed::Fixed;
use hlscnn_chip::layout::{IMAGE_LEN, WEIGHTS_LEN};
use std::time::Instant;
use tracing::{debug, trace};

/// Store `values` at `base + i * stride`, one word each, in index order.
///
/// # Errors
///
/// Propagates the first bus error; earlier elements stay written.
pub fn write_sequential<B: RegisterBus + ?Sized>(
    bus: &mut B,
    base: u64,
    stride: u64,
    values: &[Fixed],
) -> Result<()> {
    let mut address = base;
    for value in values {
        bus.write_word(address, value.to_bits())?;
        address += stride;
    }
    Ok(())
}

/// One staging buffer bound to its base address
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StagingBuffer {
    name: &'static str,
    base: u64,
    capacity: usize,
    stride: u64,
}

impl StagingBuffer {
    /// Bind a buffer of `capacity` elements at `base`.
    pub const fn new(name: &'static str, base: u64, capacity: usize, stride: u64) -> Self {
        Self {
            name,
            base,
            capacity,
            stride,
        }
    }

    /// The weight buffer of `memory_map`.
    pub const fn weights(memory_map: &MemoryMap) -> Self {
        Self::new(
            "weights",
            memory_map.weights_base,
            WEIGHTS_LEN,
            memory_map.element_stride,
        )
    }

    /// The image buffer of `memory_map`.
    pub const fn image(memory_map: &MemoryMap) -> Self {
        Self::new(
            "image",
            memory_map.image_base,
            IMAGE_LEN,
            memory_map.element_stride,
        )
    }

    /// Buffer label.
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// Base byte address.
    pub const fn base(&self) -> u64 {
        self.base
    }

    /// Element capacity.
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Byte address of element `index`.
    pub const fn address_of(&self, index: usize) -> u64 {
        self.base + index as u64 * self.stride
    }

    /// Write `values` from element 0 upwards.
    ///
    /// # Errors
    ///
    /// Returns `LengthMismatch` if `values` exceeds the capacity (nothing is
    /// written), otherwise propagates bus errors.
    pub fn write_sequential<B: RegisterBus + ?Sized>(&self, bus: &mut B, values: &[Fixed]) -> Result<()> {
        if values.len() > self.capacity {
            return Err(HlsCnnError::length_mismatch(self.name, self.capacity, values.len()));
        }

        trace!(
            "Staging {} words into {} at {:#x}",
            values.len(),
            self.name,
            self.base
        );
        let start = Instant::now();
        write_sequential(bus, self.base, self.stride, values)?;
        debug!(
            "Staged {} {} words in {:?}",
            values.len(),
            self.name,
            start.elapsed()
        );
        Ok(())
    }
}
