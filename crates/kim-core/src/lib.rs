//! Core types and traits shared by the Kinesis inertial-motor server.
//!
//! A controller is one physical K-Cube inertial motor driver with four
//! independently positioned channels. This crate defines the hardware
//! capability seam ([`InertialMotor`], [`MotorFactory`]), the sequencer
//! lifecycle seam ([`SequencerClient`]), the shot-file reader, and the
//! error taxonomy. Driver crates and the server depend only on these.

pub mod capabilities;
pub mod channel;
pub mod error;
pub mod sequencer;
pub mod shot;

pub use capabilities::{InertialMotor, MotorFactory};
pub use channel::{Channel, CHANNEL_COUNT};
pub use error::{KimError, KimResult};
pub use sequencer::SequencerClient;
pub use shot::ShotFile;
