//! `/dev/mem` register bus
//!
//! Opens the physical-memory device once, maps the control window and both
//! staging windows, and routes every absolute byte address to the window
//! that contains it.

use crate::backend::{BusKind, RegisterBus};
use crate::backends::mmap::MmapWindow;
use crate::config::MemoryMap;
use crate::error::{HlsCnnError, Result};
use rustix::fs::OFlags;
use std::fs::{File, OpenOptions};
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};

/// Default physical-memory device node.
pub const DEFAULT_DEVICE: &str = "/dev/mem";

/// Register bus over physical windows mapped from a device node
#[derive(Debug)]
pub struct DevMemBus {
    path: PathBuf,
    windows: Vec<MmapWindow>,
    _file: File,
}

impl DevMemBus {
    /// Open `path` with `O_SYNC` and map every window in `memory_map`.
    ///
    /// # Errors
    ///
    /// Returns `DeviceUnavailable` if the node cannot be opened (missing,
    /// permission denied) or any window fails to map.
    pub fn open(path: impl AsRef<Path>, memory_map: &MemoryMap) -> Result<Self> {
        let path = path.as_ref();
        tracing::debug!("Opening {}", path.display());

        // O_SYNC keeps the mapping uncached on /dev/mem
        #[allow(clippy::cast_possible_wrap)]
        let sync_flag = OFlags::SYNC.bits() as i32;

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .custom_flags(sync_flag)
            .open(path)
            .map_err(|e| HlsCnnError::device_unavailable(path, format!("open failed: {e}")))?;

        let windows = memory_map
            .windows()
            .into_iter()
            .map(|(name, base, span)| MmapWindow::map(&file, path, name, base, span))
            .collect::<Result<Vec<_>>>()?;

        tracing::info!(
            "Opened {} with {} windows (ctrl {:#x})",
            path.display(),
            windows.len(),
            memory_map.control_base
        );

        Ok(Self {
            path: path.to_path_buf(),
            windows,
            _file: file,
        })
    }

    /// Device node path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn locate(&self, address: u64) -> Result<(usize, usize)> {
        self.windows
            .iter()
            .enumerate()
            .find_map(|(i, w)| w.offset_of(address).map(|offset| (i, offset)))
            .ok_or_else(|| HlsCnnError::out_of_bounds(address, self.path.display().to_string()))
    }
}

impl RegisterBus for DevMemBus {
    fn read_word(&mut self, address: u64) -> Result<u32> {
        let (window, offset) = self.locate(address)?;
        self.windows[window].read_u32(offset)
    }

    fn write_word(&mut self, address: u64, value: u32) -> Result<()> {
        let (window, offset) = self.locate(address)?;
        self.windows[window].write_u32(offset, value)
    }

    fn kind(&self) -> BusKind {
        BusKind::DevMem
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_node_is_device_unavailable() {
        let err = DevMemBus::open("/nonexistent/hlscnn-mem", &MemoryMap::default()).unwrap_err();
        assert!(err.is_device_unavailable(), "{err}");
    }
}
