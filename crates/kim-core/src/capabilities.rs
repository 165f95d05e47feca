//! Hardware capability traits.
//!
//! The server's safety and cycle logic depends only on these seams; one
//! concrete implementation exists per supported transport (the Kinesis
//! serial driver) plus a mock for tests and hardware-free operation.
//!
//! Each trait is async (`#[async_trait]`), thread-safe (`Send + Sync`), and
//! uses `anyhow::Result` so drivers can surface transport-specific context
//! while structured [`crate::KimError`] values remain downcastable.

use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;

use crate::channel::Channel;

/// Capability: a multi-channel inertial (stick-slip piezo) motor drive.
///
/// # Contract
/// - Positions are device-native step counts.
/// - `move_to` issues the move command and returns once the command is
///   accepted; it does not wait for motion to settle.
/// - All methods take `&self`; drivers use interior mutability for any
///   connection state.
#[async_trait]
pub trait InertialMotor: Send + Sync + std::fmt::Debug {
    /// Read the current position counter of one channel.
    async fn position(&self, channel: Channel) -> Result<i32>;

    /// Command an absolute move on one channel.
    ///
    /// `velocity_mode` 0 means move immediately using the drive parameters
    /// stored on the device; the server always passes 0.
    async fn move_to(&self, channel: Channel, position: i32, velocity_mode: u16) -> Result<()>;

    /// Human-readable identity string (model and serial), for startup
    /// diagnostics.
    async fn identify(&self) -> Result<String>;
}

/// Factory seam for discovering and opening inertial motor devices.
///
/// Mirrors the driver-factory pattern used for the rest of the instrument
/// fleet: the server is handed one factory at construction and never names
/// a concrete transport.
#[async_trait]
pub trait MotorFactory: Send + Sync {
    /// Short machine name of the transport ("kinesis", "mock").
    fn driver_type(&self) -> &'static str;

    /// Human-readable driver name for logs and error messages.
    fn name(&self) -> &'static str;

    /// Enumerate the serial numbers of reachable devices.
    async fn discover(&self) -> Result<Vec<String>>;

    /// Open a session with the device carrying `serial`.
    ///
    /// Fails with [`crate::KimError::DeviceNotFound`] when no such device
    /// is reachable, or with a transport error when opening fails.
    async fn connect(&self, serial: &str) -> Result<Arc<dyn InertialMotor>>;
}
