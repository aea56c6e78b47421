//! Pipeline stages and the boundary every degradable stage runs behind
//!
//! Ingest is the only stage allowed to fail a run. Every later stage
//! resolves to a [`StageOutcome`]: either its output, or its input handed
//! back together with the [`StageFault`] that stopped it.

pub mod denoise;
pub mod dynamics;
pub mod ingest;
pub mod limiter;
pub mod loudness;
pub mod separator;
pub mod trim;

pub use denoise::NoiseReducer;
pub use dynamics::DynamicsShaper;
pub use ingest::{ingest, normalize_waveform};
pub use limiter::FinalLimiter;
pub use loudness::LoudnessNormalizer;
pub use separator::SeparatorStage;
pub use trim::SilenceTrimmer;

use crate::core::WaveformBuffer;
use crate::error::{StageFault, StageResult};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::time::{Duration, Instant};

/// The degradable stages, in pipeline order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StageKind {
    /// Optional voice isolation
    SourceSeparator,
    /// Leading/trailing silence removal
    SilenceTrimmer,
    /// Stationary noise suppression
    NoiseReducer,
    /// Highpass, compressor and high shelf
    DynamicsShaper,
    /// Integrated loudness normalization
    LoudnessNormalizer,
    /// Peak ceiling
    FinalLimiter,
}

impl StageKind {
    /// All degradable stages in the order they run
    pub const ORDER: [StageKind; 6] = [
        StageKind::SourceSeparator,
        StageKind::SilenceTrimmer,
        StageKind::NoiseReducer,
        StageKind::DynamicsShaper,
        StageKind::LoudnessNormalizer,
        StageKind::FinalLimiter,
    ];

    /// Short kebab-case name used in logs
    pub fn name(&self) -> &'static str {
        match self {
            StageKind::SourceSeparator => "source-separator",
            StageKind::SilenceTrimmer => "silence-trimmer",
            StageKind::NoiseReducer => "noise-reducer",
            StageKind::DynamicsShaper => "dynamics-shaper",
            StageKind::LoudnessNormalizer => "loudness-normalizer",
            StageKind::FinalLimiter => "final-limiter",
        }
    }

    /// Whether the stage may return fewer samples than it was given
    pub fn may_shrink(&self) -> bool {
        matches!(self, StageKind::SilenceTrimmer)
    }
}

impl std::fmt::Display for StageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// One degradable transformation of a mono buffer
pub trait Stage {
    /// Which stage this is
    fn kind(&self) -> StageKind;

    /// Produce a new buffer from `input`
    fn apply(&mut self, input: &WaveformBuffer) -> StageResult<WaveformBuffer>;
}

/// Result of running one stage behind the boundary
#[derive(Debug, Clone, PartialEq)]
pub enum StageOutcome {
    /// The stage produced a valid buffer
    Applied(WaveformBuffer),
    /// The stage failed; the buffer is its unchanged input
    FallenBack(WaveformBuffer, StageFault),
}

impl StageOutcome {
    /// Buffer carried by the outcome
    pub fn buffer(&self) -> &WaveformBuffer {
        match self {
            StageOutcome::Applied(buffer) | StageOutcome::FallenBack(buffer, _) => buffer,
        }
    }

    /// Take the buffer out of the outcome
    pub fn into_buffer(self) -> WaveformBuffer {
        match self {
            StageOutcome::Applied(buffer) | StageOutcome::FallenBack(buffer, _) => buffer,
        }
    }

    /// Fault that caused a fallback, if any
    pub fn fault(&self) -> Option<&StageFault> {
        match self {
            StageOutcome::Applied(_) => None,
            StageOutcome::FallenBack(_, fault) => Some(fault),
        }
    }

    /// True when the stage's own output was kept
    pub fn is_applied(&self) -> bool {
        matches!(self, StageOutcome::Applied(_))
    }
}

/// Text of a panic payload
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// Check a stage's output against the buffer invariants of its input
pub fn check_output(
    kind: StageKind,
    input: &WaveformBuffer,
    output: &WaveformBuffer,
) -> StageResult<()> {
    if output.sample_rate() != input.sample_rate() {
        return Err(StageFault::InvariantViolation(format!(
            "sample rate changed from {} to {}",
            input.sample_rate(),
            output.sample_rate()
        )));
    }

    if !output.is_mono() {
        return Err(StageFault::InvariantViolation(format!(
            "output has {} channels",
            output.channels()
        )));
    }

    let length_ok = if kind.may_shrink() {
        output.len() <= input.len()
    } else {
        output.len() == input.len()
    };
    if !length_ok {
        return Err(StageFault::InvariantViolation(format!(
            "length changed from {} to {}",
            input.len(),
            output.len()
        )));
    }

    if !output.is_finite() {
        return Err(StageFault::InvariantViolation(
            "output contains non-finite samples".to_string(),
        ));
    }

    Ok(())
}

/// Run `stage` on `input`, converting every failure into a fallback.
///
/// Panics are caught here and the output is checked before it replaces
/// the input. Returns the outcome and the time spent.
pub fn run_stage(stage: &mut dyn Stage, input: WaveformBuffer) -> (StageOutcome, Duration) {
    let kind = stage.kind();
    let started = Instant::now();

    let result = match panic::catch_unwind(AssertUnwindSafe(|| stage.apply(&input))) {
        Ok(result) => result,
        Err(payload) => Err(StageFault::Panicked(panic_message(payload.as_ref()))),
    };

    let result = result.and_then(|output| {
        check_output(kind, &input, &output)?;
        Ok(output)
    });

    let elapsed = started.elapsed();
    let outcome = match result {
        Ok(output) => {
            log::debug!(
                "{} applied: {} -> {} samples in {:?}",
                kind,
                input.len(),
                output.len(),
                elapsed
            );
            StageOutcome::Applied(output)
        }
        Err(fault) => {
            log::warn!("{} fell back to its input: {}", kind, fault);
            StageOutcome::FallenBack(input, fault)
        }
    };

    (outcome, elapsed)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Scripted {
        kind: StageKind,
        action: fn(&WaveformBuffer) -> StageResult<WaveformBuffer>,
    }

    impl Stage for Scripted {
        fn kind(&self) -> StageKind {
            self.kind
        }

        fn apply(&mut self, input: &WaveformBuffer) -> StageResult<WaveformBuffer> {
            (self.action)(input)
        }
    }

    fn input() -> WaveformBuffer {
        WaveformBuffer::mono(vec![0.1, -0.2, 0.3, -0.4], 44100).unwrap()
    }

    fn run(kind: StageKind, action: fn(&WaveformBuffer) -> StageResult<WaveformBuffer>) -> StageOutcome {
        let mut stage = Scripted { kind, action };
        run_stage(&mut stage, input()).0
    }

    #[test]
    fn test_applied_output_is_kept() {
        let outcome = run(StageKind::DynamicsShaper, |b| {
            b.with_samples(b.samples().iter().map(|s| s * 0.5).collect())
                .map_err(Into::into)
        });
        assert!(outcome.is_applied());
        assert_eq!(outcome.buffer().samples()[3], -0.2);
    }

    #[test]
    fn test_fault_returns_input() {
        let outcome = run(StageKind::LoudnessNormalizer, |_| Err(StageFault::Silent));
        assert_eq!(outcome.fault(), Some(&StageFault::Silent));
        assert_eq!(outcome.into_buffer(), input());
    }

    #[test]
    fn test_panic_is_contained() {
        let outcome = run(StageKind::NoiseReducer, |_| panic!("index out of range"));
        match outcome {
            StageOutcome::FallenBack(buffer, StageFault::Panicked(msg)) => {
                assert_eq!(buffer, input());
                assert!(msg.contains("index out of range"));
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[test]
    fn test_length_change_rejected() {
        let outcome = run(StageKind::FinalLimiter, |b| {
            b.with_samples(b.samples()[..2].to_vec()).map_err(Into::into)
        });
        assert!(matches!(outcome.fault(), Some(StageFault::InvariantViolation(_))));

        // The trimmer may shrink but never grow
        let outcome = run(StageKind::SilenceTrimmer, |b| {
            b.with_samples(b.samples()[1..3].to_vec()).map_err(Into::into)
        });
        assert!(outcome.is_applied());
        let outcome = run(StageKind::SilenceTrimmer, |b| {
            b.with_samples(vec![0.0; 8]).map_err(Into::into)
        });
        assert!(!outcome.is_applied());
    }

    #[test]
    fn test_rate_and_nan_rejected() {
        let outcome = run(StageKind::NoiseReducer, |b| {
            WaveformBuffer::mono(b.samples().to_vec(), 48000).map_err(Into::into)
        });
        assert!(matches!(outcome.fault(), Some(StageFault::InvariantViolation(_))));

        let outcome = run(StageKind::NoiseReducer, |b| {
            b.with_samples(vec![0.0, f32::NAN, 0.0, 0.0]).map_err(Into::into)
        });
        assert!(matches!(outcome.fault(), Some(StageFault::InvariantViolation(_))));
    }

    #[test]
    fn test_order_and_names() {
        assert_eq!(StageKind::ORDER[0], StageKind::SourceSeparator);
        assert_eq!(StageKind::ORDER[5], StageKind::FinalLimiter);
        assert_eq!(StageKind::SilenceTrimmer.to_string(), "silence-trimmer");
        assert!(!StageKind::NoiseReducer.may_shrink());
    }
}
