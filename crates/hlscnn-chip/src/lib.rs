//! Silicon model for the `cnn_top` HLS inference core on the Kria KV260.
//!
//! This crate has **no dependencies** and **no hardware access**. It is a
//! pure model of the programmable-logic design: register offsets, the AXI
//! address map, staging buffer dimensions and the fixed-point format.
//!
//! # Crate organisation
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`regs`] | `s_axi_control` register map and `ap_ctrl` bits |
//! | [`map`] | Physical base addresses, window spans, staging element stride |
//! | [`layout`] | Weight/image buffer lengths, class count |
//! | [`qformat`] | Q16.16 constants |

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod layout;
pub mod map;
pub mod qformat;
pub mod regs;
