//! The sequencer-facing server: one buffered→static cycle per shot.

use std::path::Path;

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::info;

use kim_core::{KimError, KimResult, MotorFactory, SequencerClient, ShotFile};

use crate::config::ServerConfig;
use crate::controller::Controller;

/// Device server for a set of inertial motor controllers.
///
/// Controllers are connected once at startup and live for the process
/// lifetime. Cycles run strictly one at a time; the controller set sits
/// behind an async mutex and each lifecycle call holds it end to end.
pub struct KimServer {
    config: ServerConfig,
    controllers: Mutex<Vec<Controller>>,
}

impl std::fmt::Debug for KimServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KimServer")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl KimServer {
    /// Validate the configuration and connect every configured controller.
    pub async fn connect(config: ServerConfig, factory: &dyn MotorFactory) -> Result<Self> {
        config.validate()?;
        info!(
            driver = factory.name(),
            controllers = config.serials.len(),
            "starting inertial motor server"
        );

        let mut controllers = Vec::with_capacity(config.serials.len());
        for serial in &config.serials {
            controllers.push(Controller::connect(factory, serial).await?);
        }

        Ok(Self {
            config,
            controllers: Mutex::new(controllers),
        })
    }

    /// Desired positions per controller, read from the shot globals in
    /// configuration order.
    fn desired_positions(&self, shot: &ShotFile) -> KimResult<Vec<Vec<i32>>> {
        self.config
            .position_globals
            .iter()
            .map(|group| group.iter().map(|name| shot.global_position(name)).collect())
            .collect()
    }

    /// Per-controller max-move limits from the shot globals.
    fn max_moves(&self, shot: &ShotFile) -> KimResult<Vec<i32>> {
        self.config
            .max_move_globals
            .iter()
            .map(|name| shot.global_position(name))
            .collect()
    }
}

#[async_trait]
impl SequencerClient for KimServer {
    async fn on_buffered(&self, shot_path: &Path) -> Result<()> {
        let shot = ShotFile::load(shot_path)?;
        let desired = self.desired_positions(&shot)?;
        let max_moves = self.max_moves(&shot)?;
        info!(?desired, "desired positions");

        let mut controllers = self.controllers.lock().await;

        let mut actual = Vec::with_capacity(controllers.len());
        for controller in controllers.iter_mut() {
            actual.push(controller.read_positions().await?);
        }
        info!(?actual, "actual positions");
        info!(?max_moves, "maximum moves");

        if max_moves.len() != controllers.len() {
            return Err(KimError::MaxMoveCountMismatch {
                expected: controllers.len(),
                actual: max_moves.len(),
            }
            .into());
        }

        for ((controller, targets), limit) in
            controllers.iter_mut().zip(&desired).zip(&max_moves)
        {
            controller.set_max_move(*limit);
            controller.move_to_positions(targets).await?;
        }

        info!(shot = %shot_path.display(), "transition to buffered");
        Ok(())
    }

    async fn on_static(&self, shot_path: &Path) -> Result<()> {
        // No post-shot hardware work for motor positioning; cameras and
        // analysis hang off their own device servers.
        info!(shot = %shot_path.display(), "transition to static");
        Ok(())
    }

    async fn on_abort(&self) {
        // Nothing to undo: commanded moves are not retracted, and the next
        // buffered transition re-reads positions before validating. The
        // hook stays safe to call any number of times.
        info!("abort");
    }
}
