//! Sequencer lifecycle contract.

use anyhow::Result;
use async_trait::async_trait;
use std::path::Path;

/// Lifecycle hooks a device server implements for the shot sequencer.
///
/// The sequencer drives one cycle as `on_buffered` (positions commanded)
/// followed by `on_static` (post-shot processing). If either returns an
/// error the framework calls `on_abort`, after which `on_buffered` must be
/// callable again.
#[async_trait]
pub trait SequencerClient: Send + Sync {
    /// Prepare the hardware for the shot described by `shot`.
    ///
    /// Every failure propagates; this method performs no internal recovery.
    async fn on_buffered(&self, shot: &Path) -> Result<()>;

    /// Post-shot hook. This server has no post-shot hardware work; the
    /// hook exists for subsystems (cameras, analysis) layered on top.
    async fn on_static(&self, shot: &Path) -> Result<()>;

    /// Return to a state where `on_buffered` can be called again.
    ///
    /// Infallible by signature: like any cleanup hook it must proceed even
    /// after a partial failure, and repeated calls must never raise.
    async fn on_abort(&self);
}
