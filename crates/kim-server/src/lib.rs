//! Sequencer-facing positioning server for inertial motor K-Cubes.
//!
//! One cycle: the sequencer asks for `transition_to_buffered` with a shot
//! file; the server reads the desired positions and max-move limits from
//! the file, reads actual positions from every controller, and commands
//! moves only where they differ, enforcing the per-controller safety limit
//! before any motion. Everything propagates on failure; the control
//! listener then invokes the abort hook per the framework contract.

pub mod config;
pub mod controller;
pub mod net;
pub mod server;

pub use config::{DriverKind, ServerConfig};
pub use controller::{Controller, DEFAULT_MAX_MOVE};
pub use net::ControlServer;
pub use server::KimServer;
