//! The enhancement chain and its run report

use crate::config::PipelineConfig;
use crate::core::{SourceInfo, TARGET_SAMPLE_RATE, WaveformBuffer};
use crate::encoder::encode_to_vec;
use crate::error::{AudioError, EnhanceError, StageFault};
use crate::separator::SourceSeparator;
use crate::stage::{
    self, DynamicsShaper, FinalLimiter, LoudnessNormalizer, NoiseReducer, SeparatorStage,
    SilenceTrimmer, Stage, StageKind, StageOutcome,
};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Where a pipeline is in its run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    /// Built, nothing run yet
    Ready,
    /// Executing a stage; 0 is ingest, 1 through 6 the degradable stages
    Running(usize),
    /// Finished with a valid buffer
    Completed,
    /// Ingest failed; no buffer exists
    Aborted,
}

/// How a stage ended
#[derive(Debug, Clone, PartialEq)]
pub enum StageStatus {
    /// The stage's output was kept
    Applied,
    /// The stage's input was passed on
    FallenBack(StageFault),
}

/// Diagnostics for one stage of a run
#[derive(Debug, Clone, PartialEq)]
pub struct StageReport {
    /// Which stage
    pub kind: StageKind,
    /// How it ended
    pub status: StageStatus,
    /// Samples handed to the stage
    pub input_len: usize,
    /// Samples handed on
    pub output_len: usize,
    /// Wall time spent
    pub elapsed: Duration,
}

impl StageReport {
    /// True when the stage passed its input through
    pub fn fell_back(&self) -> bool {
        matches!(self.status, StageStatus::FallenBack(_))
    }
}

/// Final buffer of a run plus the per-stage log
#[derive(Debug, Clone)]
pub struct PipelineResult {
    /// Enhanced mono buffer at 44.1 kHz
    pub buffer: WaveformBuffer,
    /// What the decoder found, when the run started from bytes
    pub source: Option<SourceInfo>,
    /// One report per degradable stage, in order
    pub stages: Vec<StageReport>,
}

impl PipelineResult {
    /// Report for `kind`
    pub fn report(&self, kind: StageKind) -> Option<&StageReport> {
        self.stages.iter().find(|r| r.kind == kind)
    }

    /// Reports of stages that fell back
    pub fn fallbacks(&self) -> impl Iterator<Item = &StageReport> {
        self.stages.iter().filter(|r| r.fell_back())
    }
}

/// The enhancement chain.
///
/// Stages are built fresh from the configuration for every run, so a
/// pipeline never carries filter state from one input into the next.
pub struct Pipeline {
    config: PipelineConfig,
    separator: Option<Arc<dyn SourceSeparator>>,
    state: PipelineState,
}

impl Pipeline {
    /// Create a pipeline; the configuration is validated here
    pub fn new(config: PipelineConfig) -> Result<Self, EnhanceError> {
        config
            .validate()
            .map_err(|e| EnhanceError::InvalidConfig(e.to_string()))?;

        Ok(Pipeline {
            config,
            separator: None,
            state: PipelineState::Ready,
        })
    }

    /// Install a source separation capability
    pub fn with_separator(mut self, separator: Arc<dyn SourceSeparator>) -> Self {
        self.separator = Some(separator);
        self
    }

    /// Configuration in use
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Current state
    pub fn state(&self) -> PipelineState {
        self.state
    }

    fn build_stages(&self) -> Vec<Box<dyn Stage>> {
        let config = &self.config;
        let separator = SeparatorStage::new(self.separator.clone(), config.separator.clone());
        vec![
            Box::new(separator) as Box<dyn Stage>,
            Box::new(SilenceTrimmer::new(config.trim.clone())) as Box<dyn Stage>,
            Box::new(NoiseReducer::new(config.noise.clone())) as Box<dyn Stage>,
            Box::new(DynamicsShaper::new(config.tone.clone())) as Box<dyn Stage>,
            Box::new(LoudnessNormalizer::new(config.target_lufs)) as Box<dyn Stage>,
            Box::new(FinalLimiter::new(config.limiter.clone())) as Box<dyn Stage>,
        ]
    }

    fn abort(&mut self, err: AudioError) -> EnhanceError {
        self.state = PipelineState::Aborted;
        log::error!("ingest failed: {}", err);
        EnhanceError::FatalIngest(err)
    }

    /// Decode `bytes`, declared as `extension`, and run the whole chain
    pub fn run(&mut self, bytes: &[u8], extension: &str) -> Result<PipelineResult, EnhanceError> {
        self.state = PipelineState::Running(0);
        log::info!("enhancing {} bytes of .{}", bytes.len(), extension);

        let (buffer, source) = match stage::ingest(bytes, extension) {
            Ok(ingested) => ingested,
            Err(err) => return Err(self.abort(err)),
        };

        let mut result = self.run_stages(buffer);
        result.source = Some(source);
        Ok(result)
    }

    /// Run the whole chain on an already decoded interleaved buffer
    pub fn run_waveform(&mut self, raw: &WaveformBuffer) -> Result<PipelineResult, EnhanceError> {
        self.state = PipelineState::Running(0);

        let buffer = match stage::normalize_waveform(raw) {
            Ok(buffer) => buffer,
            Err(err) => return Err(self.abort(err)),
        };

        Ok(self.run_stages(buffer))
    }

    /// Run the degradable stages on a buffer that is already mono at 44.1 kHz
    pub fn process(&mut self, mono: WaveformBuffer) -> Result<PipelineResult, EnhanceError> {
        if !mono.is_mono() {
            return Err(self.abort(AudioError::InvalidChannels {
                expected: 1,
                got: mono.channels() as u32,
            }));
        }
        if mono.sample_rate() != TARGET_SAMPLE_RATE {
            return Err(self.abort(AudioError::InvalidSampleRate {
                rate: mono.sample_rate(),
            }));
        }

        Ok(self.run_stages(mono))
    }

    fn run_stages(&mut self, mut buffer: WaveformBuffer) -> PipelineResult {
        let started = Instant::now();
        let mut stages = self.build_stages();
        let mut reports = Vec::with_capacity(stages.len());

        for (index, current) in stages.iter_mut().enumerate() {
            self.state = PipelineState::Running(index + 1);
            let kind = current.kind();
            let input_len = buffer.len();

            let (outcome, elapsed) = stage::run_stage(current.as_mut(), buffer);
            let status = match &outcome {
                StageOutcome::Applied(_) => StageStatus::Applied,
                StageOutcome::FallenBack(_, fault) => StageStatus::FallenBack(fault.clone()),
            };
            buffer = outcome.into_buffer();

            reports.push(StageReport {
                kind,
                status,
                input_len,
                output_len: buffer.len(),
                elapsed,
            });
        }

        self.state = PipelineState::Completed;
        let fallbacks = reports.iter().filter(|r| r.fell_back()).count();
        log::info!(
            "enhanced {:.2}s of audio in {:?} ({} stage(s) fell back)",
            buffer.duration().as_secs_f64(),
            started.elapsed(),
            fallbacks
        );

        PipelineResult {
            buffer,
            source: None,
            stages: reports,
        }
    }
}

/// Enhance an encoded recording and return WAV bytes
pub fn enhance(
    bytes: &[u8],
    extension: &str,
    config: &PipelineConfig,
) -> Result<Vec<u8>, EnhanceError> {
    enhance_with_separator(bytes, extension, config, None).map(|(wav, _)| wav)
}

/// Enhance with an optional separation capability; also returns the
/// run's diagnostics
pub fn enhance_with_separator(
    bytes: &[u8],
    extension: &str,
    config: &PipelineConfig,
    separator: Option<Arc<dyn SourceSeparator>>,
) -> Result<(Vec<u8>, PipelineResult), EnhanceError> {
    let mut pipeline = Pipeline::new(config.clone())?;
    if let Some(separator) = separator {
        pipeline = pipeline.with_separator(separator);
    }

    let result = pipeline.run(bytes, extension)?;
    let wav = encode_to_vec(&result.buffer, config.output_format).map_err(|e| {
        log::error!("encoding failed: {}", e);
        EnhanceError::Encoding(e)
    })?;

    Ok((wav, result))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::separator::SeparationError;
    use std::f32::consts::PI;

    struct Passthrough;

    impl SourceSeparator for Passthrough {
        fn name(&self) -> &str {
            "passthrough"
        }

        fn separate(&self, segment: &WaveformBuffer) -> Result<Vec<f32>, SeparationError> {
            Ok(segment.samples().to_vec())
        }
    }

    fn voice_like() -> WaveformBuffer {
        let samples = (0..88200)
            .map(|i| {
                let t = i as f32 / 44100.0;
                let envelope = 0.5 + 0.5 * (2.0 * PI * 3.0 * t).sin();
                envelope * 0.3 * (2.0 * PI * 220.0 * t).sin()
                    + 0.1 * (2.0 * PI * 1800.0 * t).sin()
            })
            .collect();
        WaveformBuffer::mono(samples, 44100).unwrap()
    }

    #[test]
    fn test_invalid_config_rejected() {
        let mut config = PipelineConfig::default();
        config.noise.strength = 2.0;
        let err = Pipeline::new(config).err().unwrap();
        assert!(matches!(err, EnhanceError::InvalidConfig(_)));
    }

    #[test]
    fn test_state_transitions() {
        let mut pipeline = Pipeline::new(PipelineConfig::default()).unwrap();
        assert_eq!(pipeline.state(), PipelineState::Ready);

        pipeline.process(voice_like()).unwrap();
        assert_eq!(pipeline.state(), PipelineState::Completed);

        assert!(pipeline.run(b"not audio", "wav").is_err());
        assert_eq!(pipeline.state(), PipelineState::Aborted);
    }

    #[test]
    fn test_stage_log_without_separator() {
        let mut pipeline = Pipeline::new(PipelineConfig::default()).unwrap();
        let result = pipeline.process(voice_like()).unwrap();

        assert_eq!(result.stages.len(), 6);
        let kinds: Vec<StageKind> = result.stages.iter().map(|r| r.kind).collect();
        assert_eq!(kinds, StageKind::ORDER.to_vec());

        let separator = result.report(StageKind::SourceSeparator).unwrap();
        assert!(matches!(
            separator.status,
            StageStatus::FallenBack(StageFault::Unavailable(_))
        ));
        assert_eq!(result.fallbacks().count(), 1);
        assert!(result.buffer.peak() <= crate::core::db_to_linear(-1.0));
    }

    #[test]
    fn test_identity_separator_matches_absent() {
        let mut plain = Pipeline::new(PipelineConfig::default()).unwrap();
        let mut with = Pipeline::new(PipelineConfig::default())
            .unwrap()
            .with_separator(Arc::new(Passthrough));

        let a = plain.process(voice_like()).unwrap();
        let b = with.process(voice_like()).unwrap();
        assert!(b.report(StageKind::SourceSeparator).map(|r| !r.fell_back()).unwrap());
        assert_eq!(a.buffer, b.buffer);
    }

    #[test]
    fn test_process_rejects_wrong_layout() {
        let mut pipeline = Pipeline::new(PipelineConfig::default()).unwrap();
        let stereo = WaveformBuffer::new(vec![0.0; 200], 44100, 2).unwrap();
        assert!(matches!(
            pipeline.process(stereo),
            Err(EnhanceError::FatalIngest(AudioError::InvalidChannels { .. }))
        ));
    }

    #[test]
    fn test_run_waveform_resamples() {
        let mut pipeline = Pipeline::new(PipelineConfig::default()).unwrap();
        let raw = WaveformBuffer::new(vec![0.0; 96000], 48000, 2).unwrap();
        let result = pipeline.run_waveform(&raw).unwrap();
        assert_eq!(result.buffer.sample_rate(), 44100);
        assert!(result.source.is_none());
    }
}
