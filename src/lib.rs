//! # tinypmu — IEEE C37.118 synchrophasor stream source
//!
//! This crate implements the device side of the IEEE C37.118 synchrophasor
//! protocol: a phasor measurement unit (PMU) endpoint that encodes and decodes
//! the standard's binary frame formats, serves them over TCP to one or more
//! concurrently connected collector (PDC) clients, and reacts to the in-band
//! command frames those clients send.
//!
//! ## Submodules
//!
//! - `ieee_c37_118`: the frame data model and binary codec — configuration,
//!   data, header and command frames, phasor sample encodings, measurement
//!   units and CRC validation. Pure and I/O-free.
//! - `pmu`: the device server — connection accepting, per-client sessions with
//!   the command/streaming state machine, the bounded drop-oldest delivery
//!   queue, and the structured event stream.
//!
//! ## Usage
//!
//! Build a [`ieee_c37_118::config::ConfigurationFrame`] describing the device,
//! hand it to a [`pmu::server::Pmu`], call `run()`, and feed measurements
//! through `send_data()`. Connected collectors drive streaming with the
//! standard `start`/`stop`/`header`/`cfg1`/`cfg2`/`cfg3` commands.

pub mod ieee_c37_118;
pub mod pmu;
