//! AXI-Lite control register map for the `cnn_top` HLS core.
//!
//! Offsets are relative to the `s_axi_control` base address. The layout is
//! the one Vitis HLS emits for a block-level `ap_ctrl_hs` interface with a
//! single scalar `out_model` return port:
//!
//! ```text
//! 0x00 : ap_ctrl
//!        bit 0  ap_start     (R/W, written 1 by the host to launch)
//!        bit 1  ap_done      (R, clear-on-read or when ap_start drops)
//!        bit 2  ap_idle      (R)
//!        bit 3  ap_ready     (R)
//!        bit 7  auto_restart (R/W)
//! 0x04 : global interrupt enable
//! 0x08 : ip interrupt enable
//! 0x0c : ip interrupt status
//! 0x10 : out_model[31:0]   Q16.16 class score
//! ```

// ── Block-level control ──────────────────────────────────────────────────────

/// `ap_ctrl` handshake register.
pub const AP_CTRL: u64 = 0x00;

/// Global interrupt enable. Unused by the polling driver.
pub const GIE: u64 = 0x04;

/// IP interrupt enable. Unused by the polling driver.
pub const IER: u64 = 0x08;

/// IP interrupt status. Unused by the polling driver.
pub const ISR: u64 = 0x0C;

// ── Return port ──────────────────────────────────────────────────────────────

/// `out_model` return value, raw Q16.16 bit pattern.
pub const OUT_MODEL0: u64 = 0x10;

/// Size of the control register window.
pub const CONTROL_SPAN: u64 = 0x20;

// ── ap_ctrl bit definitions ──────────────────────────────────────────────────

/// `ap_ctrl` bit definitions.
pub mod ap_ctrl {
    /// Launch the core.
    pub const START: u32 = 1 << 0;
    /// Result is ready in `OUT_MODEL0`.
    pub const DONE: u32 = 1 << 1;
    /// Core is idle.
    pub const IDLE: u32 = 1 << 2;
    /// Core can accept new inputs.
    pub const READY: u32 = 1 << 3;
    /// Restart automatically after each run.
    pub const AUTO_RESTART: u32 = 1 << 7;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_register_follows_interrupt_block() {
        assert_eq!(AP_CTRL, 0x00);
        assert_eq!(OUT_MODEL0, 0x10);
        assert!(OUT_MODEL0 > ISR);
        assert!(OUT_MODEL0 + 4 <= CONTROL_SPAN);
    }

    #[test]
    fn handshake_bits_are_distinct() {
        let bits = [
            ap_ctrl::START,
            ap_ctrl::DONE,
            ap_ctrl::IDLE,
            ap_ctrl::READY,
            ap_ctrl::AUTO_RESTART,
        ];
        for (i, a) in bits.iter().enumerate() {
            assert_eq!(a.count_ones(), 1);
            for b in &bits[i + 1..] {
                assert_eq!(a & b, 0);
            }
        }
    }
}
