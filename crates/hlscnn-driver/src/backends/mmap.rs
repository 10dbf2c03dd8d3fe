//! Memory-mapped physical window
//!
//! One `MmapWindow` covers one AXI slave (control block or a BRAM
//! controller). The window is mapped from a device node whose file offset is
//! the physical address, as `/dev/mem` and UIO nodes expose it.
//!
//! Staging writes use a byte-per-element stride, so most stores land on
//! addresses that are not 4-byte aligned. Aligned accesses use a single
//! volatile `u32` access; unaligned ones fall back to a volatile `[u8; 4]`.

use crate::error::{HlsCnnError, Result};
use hlscnn_chip::map::PAGE_SIZE;
use rustix::mm::{mmap, munmap, MapFlags, ProtFlags};
use std::fs::File;
use std::os::unix::io::AsFd;
use std::path::Path;
use std::ptr::NonNull;

/// Mapped window onto one physical address range
#[derive(Debug)]
pub struct MmapWindow {
    ptr: NonNull<u8>,
    map_len: usize,
    lead: usize,
    size: usize,
    base: u64,
    name: &'static str,
}

impl MmapWindow {
    /// Map `size` bytes of physical memory starting at `base`.
    ///
    /// `base` need not be page aligned; the mapping starts at the enclosing
    /// page and accesses are offset accordingly.
    ///
    /// # Errors
    ///
    /// Returns `DeviceUnavailable` if the window is empty or mmap fails.
    pub fn map(file: &File, path: &Path, name: &'static str, base: u64, size: u64) -> Result<Self> {
        if size == 0 {
            return Err(HlsCnnError::device_unavailable(
                path,
                format!("{name} window has zero size"),
            ));
        }

        let page_base = base - base % PAGE_SIZE;
        let lead = usize::try_from(base - page_base)
            .map_err(|e| HlsCnnError::device_unavailable(path, format!("{name} lead: {e}")))?;
        let size = usize::try_from(size)
            .map_err(|e| HlsCnnError::device_unavailable(path, format!("{name} size: {e}")))?;
        let map_len = lead + size;

        tracing::debug!("Mapping {name} window {base:#x}+{size:#x} from {}", path.display());

        // SAFETY: mmap of a device node at a physical offset.
        // - file is open read/write for the lifetime of this call
        // - map_len is non-zero (size checked above)
        // - page_base is page aligned, as mmap requires of the offset
        // - MAP_SHARED so stores reach the device, not a private copy
        // - the mapping is released exactly once in Drop
        let ptr = unsafe {
            mmap(
                std::ptr::null_mut(),
                map_len,
                ProtFlags::READ | ProtFlags::WRITE,
                MapFlags::SHARED,
                file.as_fd(),
                page_base,
            )
            .map_err(|e| {
                HlsCnnError::device_unavailable(path, format!("mmap {name} at {page_base:#x}: {e}"))
            })?
        };

        let ptr = NonNull::new(ptr.cast::<u8>()).ok_or_else(|| {
            HlsCnnError::device_unavailable(path, format!("mmap {name} returned null"))
        })?;

        tracing::info!("Mapped {name} window {base:#x} ({size:#x} bytes) at {ptr:p}");

        Ok(Self {
            ptr,
            map_len,
            lead,
            size,
            base,
            name,
        })
    }

    /// Physical base address.
    pub const fn base(&self) -> u64 {
        self.base
    }

    /// Usable span in bytes from `base`.
    pub const fn size(&self) -> usize {
        self.size
    }

    /// Window label.
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// Offset of a full 32-bit access at `address`, if it lies inside the window.
    pub fn offset_of(&self, address: u64) -> Option<usize> {
        let offset = usize::try_from(address.checked_sub(self.base)?).ok()?;
        (offset.checked_add(4)? <= self.size).then_some(offset)
    }

    /// Volatile 32-bit load at window offset.
    ///
    /// # Errors
    ///
    /// Returns error if `offset + 4` exceeds the window.
    pub fn read_u32(&self, offset: usize) -> Result<u32> {
        self.check(offset)?;

        // SAFETY: volatile load from device memory.
        // - offset + 4 <= size, checked above, so the 4 bytes are mapped
        // - aligned addresses use a u32 load; unaligned ones read a [u8; 4],
        //   which has alignment 1
        let value = unsafe {
            let p = self.ptr.as_ptr().add(self.lead + offset);
            if p.cast::<u32>().is_aligned() {
                p.cast::<u32>().read_volatile()
            } else {
                u32::from_ne_bytes(p.cast::<[u8; 4]>().read_volatile())
            }
        };

        tracing::trace!("{} read {:#x} = {value:#x}", self.name, self.base + offset as u64);
        Ok(value)
    }

    /// Volatile 32-bit store at window offset.
    ///
    /// # Errors
    ///
    /// Returns error if `offset + 4` exceeds the window.
    pub fn write_u32(&mut self, offset: usize, value: u32) -> Result<()> {
        self.check(offset)?;

        tracing::trace!("{} write {:#x} = {value:#x}", self.name, self.base + offset as u64);

        // SAFETY: volatile store to device memory.
        // - offset + 4 <= size, checked above
        // - &mut self gives exclusive access to the window
        // - alignment handled as in read_u32
        unsafe {
            let p = self.ptr.as_ptr().add(self.lead + offset);
            if p.cast::<u32>().is_aligned() {
                p.cast::<u32>().write_volatile(value);
            } else {
                p.cast::<[u8; 4]>().write_volatile(value.to_ne_bytes());
            }
        }

        Ok(())
    }

    fn check(&self, offset: usize) -> Result<()> {
        if offset.saturating_add(4) > self.size {
            return Err(HlsCnnError::out_of_bounds(
                self.base + offset as u64,
                format!("{} {:#x}+{:#x}", self.name, self.base, self.size),
            ));
        }
        Ok(())
    }
}

impl Drop for MmapWindow {
    fn drop(&mut self) {
        tracing::debug!("Unmapping {} window {:#x}", self.name, self.base);

        // SAFETY: ptr and map_len are exactly what mmap returned and was
        // given in map(); Drop runs at most once.
        unsafe {
            if let Err(e) = munmap(self.ptr.as_ptr().cast(), self.map_len) {
                tracing::error!("munmap of {} window failed: {e}", self.name);
            }
        }
    }
}

// SAFETY: the window owns its mapping exclusively; device memory is valid
// from any thread and moving the handle does not invalidate it.
unsafe impl Send for MmapWindow {}

// SAFETY: shared access only performs bounds-checked volatile loads; stores
// require &mut self.
unsafe impl Sync for MmapWindow {}
