//! Physical address map of the KV260 design.
//!
//! Taken from the Vivado address editor (`xparameters.h`):
//!
//! ```text
//! Slave                              Base          Range
//! ────────────────────────────────── ───────────── ───────
//! cnn_top_0/s_axi_control            0xA000_0000   4 KB
//! inmodel_bram_ctrl/S_AXI            0xA002_0000   32 KB
//! weights_bram_ctrl/S_AXI            0xA002_8000   32 KB
//! ```
//!
//! All addresses are **byte** addresses. The host writes staging element `i`
//! at `base + i * ELEMENT_STRIDE`; see [`ELEMENT_STRIDE`].

/// `cnn_top_0` AXI-Lite control base.
pub const CONTROL_BASE: u64 = 0xA000_0000;

/// Input image BRAM controller base.
pub const IMAGE_STAGING_BASE: u64 = 0xA002_0000;

/// Weight BRAM controller base.
pub const WEIGHTS_STAGING_BASE: u64 = 0xA002_8000;

/// Mapped span of the control window.
pub const CONTROL_WINDOW: u64 = 0x1000;

/// Mapped span of each BRAM controller window.
pub const BRAM_WINDOW: u64 = 0x8000;

/// Address increment between consecutive staging elements.
///
/// The deployed bitstream decodes one element per byte-address unit, so the
/// stride is 1 and not `size_of::<u32>()`. A bitstream with word-addressed
/// BRAM needs a stride of 4.
pub const ELEMENT_STRIDE: u64 = 1;

/// Page granularity used when mapping windows.
pub const PAGE_SIZE: u64 = 0x1000;
