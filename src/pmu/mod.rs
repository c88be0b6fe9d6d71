//! # PMU device server
//!
//! The device side of the protocol: a TCP listener accepting collector
//! connections, a per-connection session running the command/streaming state
//! machine, a bounded drop-oldest delivery queue per session, and a
//! broadcast event stream for observers.
//!
//! ## Submodules
//!
//! - `error`: the server error taxonomy.
//! - `events`: structured lifecycle events and the broadcast bus.
//! - `queue`: the bounded drop-oldest delivery queue.
//! - `server`: the `Pmu` device, its settings and configuration model.
//! - `session`: the per-connection worker.

pub mod error;
pub mod events;
pub mod queue;
pub mod server;
pub mod session;

pub use error::PmuError;
pub use events::PmuEvent;
pub use server::{Pmu, PmuSettings};
