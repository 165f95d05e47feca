//! Error types for the Kinesis inertial-motor server.
//!
//! `KimError` consolidates the three failure families this layer can
//! produce: configuration-shape errors (mismatched list lengths), hardware
//! and communication errors, and safety-limit violations. None of them are
//! recovered from locally; every failure propagates to the sequencer
//! framework, which responds by calling the client's abort hook.

use std::path::PathBuf;
use thiserror::Error;

use crate::channel::Channel;

/// Convenience alias for results using the application error type.
pub type KimResult<T> = std::result::Result<T, KimError>;

/// Primary error type for the inertial-motor server.
#[derive(Error, Debug)]
pub enum KimError {
    /// Startup configuration is semantically invalid (counts disagree,
    /// wrong group sizes, bad driver selector). Caught at construction.
    #[error("Configuration error: {0}")]
    Config(String),

    /// File or network I/O failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Hardware or communication error from an instrument driver.
    #[error("Instrument error: {0}")]
    Instrument(String),

    /// Shot file could not be read, parsed, or is missing an attribute.
    #[error("Shot file {path}: {message}")]
    Shot {
        /// Path of the shot file being read.
        path: PathBuf,
        /// What was wrong with it.
        message: String,
    },

    /// The desired-position list for a controller does not match the
    /// fixed channel count.
    #[error("Controller {serial}: expected {expected} desired positions, got {actual}")]
    PositionCountMismatch {
        serial: String,
        expected: usize,
        actual: usize,
    },

    /// The number of max-move entries read from the shot configuration
    /// does not equal the number of controllers.
    #[error("Expected {expected} max-move entries, one per controller, got {actual}")]
    MaxMoveCountMismatch { expected: usize, actual: usize },

    /// A requested move exceeds the controller's configured safety limit.
    /// Channels earlier in the same call may already have been moved;
    /// there is no rollback.
    #[error(
        "Controller {serial} channel {channel}: move from {current} to {desired} \
         (delta {delta}) exceeds max_move {max_move}",
        delta = (i64::from(*desired) - i64::from(*current)).abs()
    )]
    MoveTooLarge {
        serial: String,
        channel: Channel,
        current: i32,
        desired: i32,
        max_move: i32,
    },

    /// No device with the requested serial number is reachable.
    #[error("Device not found: {0}")]
    DeviceNotFound(String),
}
