//! Mock inertial-motor driver.
//!
//! `MockMotor` simulates one four-channel controller: positions are held in
//! memory, every issued move is recorded for assertions, and single-shot
//! error injection covers the read and move paths. `MockMotorFactory` plays
//! the discovery/connect role so the server can run without hardware.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::debug;

use kim_core::{Channel, InertialMotor, KimError, MotorFactory, CHANNEL_COUNT};

/// One recorded move command: channel, target position, velocity mode.
pub type RecordedMove = (Channel, i32, u16);

#[derive(Debug, Default)]
struct MotorState {
    positions: [i32; CHANNEL_COUNT],
    moves: Vec<RecordedMove>,
    fail_next_read: Option<String>,
    fail_next_move: Option<String>,
}

/// Simulated four-channel inertial motor.
///
/// Commanded moves update the simulated hardware position immediately
/// (the device really moves); callers that cache positions only learn of
/// the change on their next read, exactly as with real hardware.
#[derive(Debug)]
pub struct MockMotor {
    serial: String,
    state: Mutex<MotorState>,
}

impl MockMotor {
    /// Create a motor with all channels at position 0.
    pub fn new(serial: &str) -> Arc<Self> {
        Self::with_positions(serial, [0; CHANNEL_COUNT])
    }

    /// Create a motor with the given per-channel starting positions.
    pub fn with_positions(serial: &str, positions: [i32; CHANNEL_COUNT]) -> Arc<Self> {
        Arc::new(Self {
            serial: serial.to_string(),
            state: Mutex::new(MotorState {
                positions,
                ..Default::default()
            }),
        })
    }

    /// Serial number this motor answers to.
    pub fn serial(&self) -> &str {
        &self.serial
    }

    /// Overwrite one channel's simulated position (external motion).
    pub async fn set_position(&self, channel: Channel, position: i32) {
        self.state.lock().await.positions[channel.offset()] = position;
    }

    /// Every move command issued so far, in order.
    pub async fn moves(&self) -> Vec<RecordedMove> {
        self.state.lock().await.moves.clone()
    }

    /// Make the next `position` call fail with an instrument error.
    pub async fn fail_next_read(&self, message: &str) {
        self.state.lock().await.fail_next_read = Some(message.to_string());
    }

    /// Make the next `move_to` call fail with an instrument error.
    pub async fn fail_next_move(&self, message: &str) {
        self.state.lock().await.fail_next_move = Some(message.to_string());
    }
}

#[async_trait]
impl InertialMotor for MockMotor {
    async fn position(&self, channel: Channel) -> Result<i32> {
        let mut state = self.state.lock().await;
        if let Some(message) = state.fail_next_read.take() {
            return Err(KimError::Instrument(message).into());
        }
        Ok(state.positions[channel.offset()])
    }

    async fn move_to(&self, channel: Channel, position: i32, velocity_mode: u16) -> Result<()> {
        let mut state = self.state.lock().await;
        if let Some(message) = state.fail_next_move.take() {
            return Err(KimError::Instrument(message).into());
        }
        debug!(serial = %self.serial, %channel, position, velocity_mode, "mock move");
        state.moves.push((channel, position, velocity_mode));
        state.positions[channel.offset()] = position;
        Ok(())
    }

    async fn identify(&self) -> Result<String> {
        Ok(format!("Mock Inertial Motor Drive {}", self.serial))
    }
}

/// Factory handing out pre-registered mock motors by serial number.
#[derive(Debug, Default)]
pub struct MockMotorFactory {
    motors: Mutex<HashMap<String, Arc<MockMotor>>>,
}

impl MockMotorFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a motor so `connect` can find it.
    pub async fn add(&self, motor: Arc<MockMotor>) {
        self.motors
            .lock()
            .await
            .insert(motor.serial().to_string(), motor);
    }
}

#[async_trait]
impl MotorFactory for MockMotorFactory {
    fn driver_type(&self) -> &'static str {
        "mock"
    }

    fn name(&self) -> &'static str {
        "Mock Inertial Motor Drive"
    }

    async fn discover(&self) -> Result<Vec<String>> {
        let mut serials: Vec<String> = self.motors.lock().await.keys().cloned().collect();
        serials.sort();
        Ok(serials)
    }

    async fn connect(&self, serial: &str) -> Result<Arc<dyn InertialMotor>> {
        let motors = self.motors.lock().await;
        let motor = motors
            .get(serial)
            .cloned()
            .ok_or_else(|| KimError::DeviceNotFound(serial.to_string()))?;
        Ok(motor)
    }
}
