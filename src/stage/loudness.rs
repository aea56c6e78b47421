//! Loudness normalization stage

use super::{Stage, StageKind};
use crate::core::WaveformBuffer;
use crate::error::{StageFault, StageResult};
use crate::filter::normalize::{integrated_loudness, min_measurable_frames};
use crate::filter::Normalize;

/// Scales integrated loudness onto a target, then hard-clips to full scale
pub struct LoudnessNormalizer {
    target_lufs: f32,
}

impl LoudnessNormalizer {
    /// Create a normalizer for `target_lufs`
    pub fn new(target_lufs: f32) -> Self {
        LoudnessNormalizer { target_lufs }
    }
}

impl Stage for LoudnessNormalizer {
    fn kind(&self) -> StageKind {
        StageKind::LoudnessNormalizer
    }

    fn apply(&mut self, input: &WaveformBuffer) -> StageResult<WaveformBuffer> {
        if input.is_empty() {
            return Ok(input.clone());
        }

        let required = min_measurable_frames(input.sample_rate());
        if input.frames() < required {
            return Err(StageFault::TooShort {
                frames: input.frames(),
                required,
            });
        }

        let measured = integrated_loudness(input)?;
        if !measured.is_finite() {
            return Err(StageFault::Silent);
        }

        let mut normalize = Normalize::loudness(self.target_lufs)?;
        let output = normalize.apply_measured(input, measured)?;
        log::debug!(
            "loudness {:.2} LUFS -> {:.2} LUFS (gain {:.2}x)",
            measured,
            self.target_lufs,
            normalize.gain_for(measured)
        );
        Ok(output)
    }
}
