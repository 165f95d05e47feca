//! Controller adapter: one physical four-channel inertial motor unit.
//!
//! Owns the device handle, the cached positions from the last read, and the
//! per-cycle safety limit, and enforces the move policy: move only where
//! desired differs from current, and refuse the whole call when any single
//! delta exceeds the limit.

use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::{debug, info};

use kim_core::{Channel, InertialMotor, KimError, MotorFactory, CHANNEL_COUNT};

/// Default maximum single-move magnitude, in device steps, until a shot
/// configures its own.
pub const DEFAULT_MAX_MOVE: i32 = 3000;

/// Adapter for one controller.
pub struct Controller {
    serial: String,
    device: Arc<dyn InertialMotor>,
    /// Positions from the last `read_positions`; move validation compares
    /// against these. Commanding a move never updates them.
    positions: [i32; CHANNEL_COUNT],
    max_move: i32,
}

impl Controller {
    /// Wrap an already-open device.
    pub fn new(serial: &str, device: Arc<dyn InertialMotor>) -> Self {
        Self {
            serial: serial.to_string(),
            device,
            positions: [0; CHANNEL_COUNT],
            max_move: DEFAULT_MAX_MOVE,
        }
    }

    /// Discover and connect the controller with the given serial number,
    /// logging what was found for operator visibility.
    pub async fn connect(factory: &dyn MotorFactory, serial: &str) -> Result<Self> {
        let discovered = factory.discover().await?;
        info!(driver = factory.driver_type(), ?discovered, "discovered controller serials");

        let device = factory
            .connect(serial)
            .await
            .with_context(|| format!("connecting to controller {serial}"))?;
        let identity = device.identify().await?;
        info!(serial, %identity, "connected");

        Ok(Self::new(serial, device))
    }

    /// Serial number of the underlying device.
    pub fn serial(&self) -> &str {
        &self.serial
    }

    /// Currently configured safety limit.
    pub fn max_move(&self) -> i32 {
        self.max_move
    }

    /// Cached positions from the last read.
    pub fn cached_positions(&self) -> [i32; CHANNEL_COUNT] {
        self.positions
    }

    /// Query all four channels in order, refresh the cache, and return the
    /// positions.
    pub async fn read_positions(&mut self) -> Result<[i32; CHANNEL_COUNT]> {
        let mut positions = [0i32; CHANNEL_COUNT];
        for channel in Channel::ALL {
            positions[channel.offset()] = self.device.position(channel).await?;
        }
        self.positions = positions;
        Ok(positions)
    }

    /// Replace the safety limit.
    ///
    /// Deliberately unvalidated: a negative limit is accepted and makes
    /// every nonzero move fail the check in `move_to_positions`.
    pub fn set_max_move(&mut self, limit: i32) {
        self.max_move = limit;
    }

    /// Command moves toward `desired`, one entry per channel in order.
    ///
    /// Channels already at their target are skipped. A delta over the
    /// limit fails the whole call immediately; channels before the failing
    /// one have already been commanded and stay where they were sent -
    /// there is no rollback. The position cache is not updated here; the
    /// next `read_positions` refreshes it.
    pub async fn move_to_positions(&self, desired: &[i32]) -> Result<()> {
        if desired.len() != CHANNEL_COUNT {
            return Err(KimError::PositionCountMismatch {
                serial: self.serial.clone(),
                expected: CHANNEL_COUNT,
                actual: desired.len(),
            }
            .into());
        }

        for (channel, (&target, &current)) in Channel::ALL
            .iter()
            .zip(desired.iter().zip(self.positions.iter()))
        {
            if target == current {
                continue;
            }
            let delta = (i64::from(target) - i64::from(current)).abs();
            if delta > i64::from(self.max_move) {
                return Err(KimError::MoveTooLarge {
                    serial: self.serial.clone(),
                    channel: *channel,
                    current,
                    desired: target,
                    max_move: self.max_move,
                }
                .into());
            }
            debug!(serial = %self.serial, %channel, current, target, "commanding move");
            self.device.move_to(*channel, target, 0).await?;
        }
        Ok(())
    }
}
