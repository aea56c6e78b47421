//! Optional source separation stage

use super::{Stage, StageKind, panic_message};
use crate::config::SeparatorConfig;
use crate::core::WaveformBuffer;
use crate::error::{StageFault, StageResult};
use crate::processor::Segment;
use crate::separator::{Cancellation, SeparationError, SourceSeparator};
use std::sync::Arc;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;

/// Runs the optional separation capability segment by segment on a
/// worker thread, bounded by the configured timeout.
///
/// On expiry the worker is told to stop. It finishes at most the segment it
/// is on, and a separator that honours the flag stops that one too.
pub struct SeparatorStage {
    separator: Option<Arc<dyn SourceSeparator>>,
    config: SeparatorConfig,
}

impl SeparatorStage {
    /// Create the stage; `None` means the capability is not installed
    pub fn new(separator: Option<Arc<dyn SourceSeparator>>, config: SeparatorConfig) -> Self {
        SeparatorStage { separator, config }
    }

    fn separate_all(
        separator: &dyn SourceSeparator,
        segments: &[WaveformBuffer],
        cancel: &Cancellation,
    ) -> Result<Vec<Vec<f32>>, SeparationError> {
        segments
            .iter()
            .enumerate()
            .map(|(index, segment)| {
                if cancel.is_cancelled() {
                    return Err(SeparationError::Cancelled);
                }
                let voice = separator.separate_cancellable(segment, cancel)?;
                if voice.len() != segment.len() {
                    return Err(SeparationError::UnsupportedInput(format!(
                        "segment {} came back with {} samples, expected {}",
                        index,
                        voice.len(),
                        segment.len()
                    )));
                }
                Ok(voice)
            })
            .collect()
    }
}

impl Stage for SeparatorStage {
    fn kind(&self) -> StageKind {
        StageKind::SourceSeparator
    }

    fn apply(&mut self, input: &WaveformBuffer) -> StageResult<WaveformBuffer> {
        let separator = match &self.separator {
            Some(separator) => Arc::clone(separator),
            None => {
                return Err(StageFault::Unavailable(
                    "no separator configured".to_string(),
                ));
            }
        };

        if input.is_empty() {
            return Ok(input.clone());
        }

        let segmenter = Segment::new(self.config.segment, input.sample_rate())?;
        let segments = segmenter.split(input)?;
        log::debug!(
            "separating {} segments with {}",
            segments.len(),
            separator.name()
        );

        let cancel = Cancellation::new();
        let worker_cancel = cancel.clone();
        let (tx, rx) = mpsc::channel();
        let worker = thread::Builder::new()
            .name("voxpolish-separator".to_string())
            .spawn(move || {
                let result = Self::separate_all(separator.as_ref(), &segments, &worker_cancel);
                let _ = tx.send(result);
            })
            .map_err(|e| StageFault::Dsp(format!("could not start separator worker: {}", e)))?;

        match rx.recv_timeout(self.config.timeout) {
            Ok(Ok(parts)) => Ok(segmenter.join(parts)?),
            Ok(Err(err)) => Err(err.into()),
            Err(RecvTimeoutError::Timeout) => {
                cancel.cancel();
                Err(StageFault::Timeout(self.config.timeout))
            }
            Err(RecvTimeoutError::Disconnected) => match worker.join() {
                Err(payload) => Err(StageFault::Panicked(panic_message(payload.as_ref()))),
                Ok(()) => Err(StageFault::Dsp(
                    "separator worker exited without a result".to_string(),
                )),
            },
        }
    }
}
