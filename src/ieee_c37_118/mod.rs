//! # IEEE C37.118 frame model and binary codec
//!
//! Frame structures and byte-level codecs for the IEEE C37.118 synchrophasor
//! frame family, as used by this crate's PMU endpoint. Every frame shares a
//! common 14-byte prefix (SYNC, FRAMESIZE, IDCODE, SOC, FRACSEC) and a
//! trailing CRC-CCITT checksum; the SYNC field discriminates the variant.
//!
//! ## Submodules
//!
//! - `commands`: command frames carrying collector instructions (start/stop
//!   transmission, configuration and header requests).
//! - `common`: shared types — `ParseError`, `Version`, `FrameType`,
//!   `PrefixFrame`, `StatField`.
//! - `config`: configuration frames (CFG-1, CFG-2, CFG-3) describing the
//!   device's channel layout and conversion scaling.
//! - `data_frame`: measurement data frames built against a configuration.
//! - `frame`: the `Frame` tagged union with envelope-validating decode and
//!   length/CRC-recomputing encode.
//! - `header`: header frames with free-form descriptive text.
//! - `phasors`: phasor sample encodings (integer/float, rectangular/polar)
//!   and PHUNIT scaling.
//! - `random`: sample and randomized frame generators for tests and
//!   harnesses.
//! - `units`: measurement unit codecs (PHUNIT, ANUNIT, DIGUNIT, FNOM,
//!   DATA_RATE).
//! - `utils`: CRC calculation/validation and SOC/FRACSEC timestamping.

pub mod commands;
pub mod common;
pub mod config;
pub mod data_frame;
pub mod frame;
pub mod header;
pub mod phasors;
pub mod random;
pub mod units;
pub mod utils;

#[cfg(test)]
mod tests;
