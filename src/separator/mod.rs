//! Pluggable voice/foreground separation capability
//!
//! The pipeline only depends on the [`SourceSeparator`] trait. A missing,
//! failing or slow capability degrades to pass-through; it never fails a
//! run.

pub mod command;

pub use command::CommandSeparator;

use crate::core::WaveformBuffer;
use crate::error::{AudioError, StageFault};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use thiserror::Error;

/// Errors a separation capability can report
#[derive(Error, Debug)]
pub enum SeparationError {
    /// The model or tool is not present
    #[error("separator unavailable: {0}")]
    Unavailable(String),

    /// The capability ran past its own deadline
    #[error("separator timed out after {0:?}")]
    Timeout(Duration),

    /// The capability cannot handle this input (length, rate)
    #[error("unsupported input: {0}")]
    UnsupportedInput(String),

    /// The caller gave up on the call
    #[error("separation cancelled")]
    Cancelled,

    /// The capability ran and failed
    #[error("separation failed: {0}")]
    Failed(String),

    /// Audio conversion around the capability failed
    #[error(transparent)]
    Audio(#[from] AudioError),
}

impl From<SeparationError> for StageFault {
    fn from(err: SeparationError) -> Self {
        match err {
            SeparationError::Unavailable(msg) => StageFault::Unavailable(msg),
            SeparationError::Timeout(limit) => StageFault::Timeout(limit),
            other => StageFault::Dsp(other.to_string()),
        }
    }
}

/// Shared stop signal between a stage and the worker running its
/// separator. Once set it stays set.
#[derive(Debug, Clone, Default)]
pub struct Cancellation(Arc<AtomicBool>);

impl Cancellation {
    /// A flag that is not set
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask every holder of this flag to stop
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// True once [`cancel`](Self::cancel) was called on any clone
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Isolates the dominant voice in a mono segment.
///
/// Implementations are shared read-only across concurrent runs and must
/// keep any scratch state local to a call. The returned samples must have
/// the same length and sample rate as `segment`.
pub trait SourceSeparator: Send + Sync {
    /// Name used in diagnostics
    fn name(&self) -> &str;

    /// Return the isolated voice for `segment`
    fn separate(&self, segment: &WaveformBuffer) -> Result<Vec<f32>, SeparationError>;

    /// Like [`separate`](Self::separate), but stops early once `cancel` is
    /// set. The default only checks the flag before starting.
    fn separate_cancellable(
        &self,
        segment: &WaveformBuffer,
        cancel: &Cancellation,
    ) -> Result<Vec<f32>, SeparationError> {
        if cancel.is_cancelled() {
            return Err(SeparationError::Cancelled);
        }
        self.separate(segment)
    }
}
