//! Silence trimming at both ends

use super::{Stage, StageKind};
use crate::config::{TrimConfig, TrimReference};
use crate::core::{WaveformBuffer, linear_to_db};
use crate::error::{StageFault, StageResult};
use std::ops::Range;

/// RMS below this is treated as digital silence whatever the reference
const SILENCE_FLOOR: f32 = 1e-10;

/// Removes leading and trailing frames whose energy stays at or below the
/// threshold. Interior silence is kept.
pub struct SilenceTrimmer {
    config: TrimConfig,
}

impl SilenceTrimmer {
    /// Create a trimmer
    pub fn new(config: TrimConfig) -> Self {
        SilenceTrimmer { config }
    }

    /// RMS of every centred, zero-padded analysis frame
    fn frame_rms(&self, samples: &[f32]) -> Vec<f32> {
        let frame = self.config.frame_length;
        let hop = self.config.hop_length;
        let half = frame / 2;

        // Prefix sums of sample energy; frames see zeros outside the signal
        let mut energy = Vec::with_capacity(samples.len() + 1);
        energy.push(0.0f64);
        let mut acc = 0.0f64;
        for &s in samples {
            acc += s as f64 * s as f64;
            energy.push(acc);
        }

        let frames = 1 + samples.len() / hop;
        (0..frames)
            .map(|i| {
                let centre = i * hop;
                let start = centre.saturating_sub(half).min(samples.len());
                let end = (centre + frame - half).min(samples.len());
                let sum = energy[end] - energy[start];
                (sum / frame as f64).max(0.0).sqrt() as f32
            })
            .collect()
    }

    /// Sample range that survives trimming, `None` when every frame is silent
    pub fn kept_span(&self, samples: &[f32]) -> StageResult<Option<Range<usize>>> {
        if self.config.frame_length == 0 || self.config.hop_length == 0 {
            return Err(StageFault::Dsp(
                "trim frame and hop length must be non-zero".to_string(),
            ));
        }
        if samples.is_empty() {
            return Ok(None);
        }

        let rms = self.frame_rms(samples);
        let loudest = rms.iter().copied().fold(0.0f32, f32::max);
        if loudest <= SILENCE_FLOOR {
            return Ok(None);
        }

        let reference_db = match self.config.reference {
            TrimReference::FullScale => 0.0,
            TrimReference::Peak => linear_to_db(loudest),
        };
        let threshold = reference_db + self.config.threshold_db;
        let loud = |level: &f32| *level > SILENCE_FLOOR && linear_to_db(*level) > threshold;

        let first = rms.iter().position(loud);
        let last = rms.iter().rposition(loud);

        Ok(match (first, last) {
            (Some(first), Some(last)) => {
                let hop = self.config.hop_length;
                let start = (first * hop).min(samples.len());
                let end = ((last + 1) * hop).min(samples.len());
                Some(start..end)
            }
            _ => None,
        })
    }
}

impl Stage for SilenceTrimmer {
    fn kind(&self) -> StageKind {
        StageKind::SilenceTrimmer
    }

    fn apply(&mut self, input: &WaveformBuffer) -> StageResult<WaveformBuffer> {
        let span = self.kept_span(input.samples())?;
        let kept = match span {
            Some(span) => input.samples()[span].to_vec(),
            None => Vec::new(),
        };

        log::debug!(
            "trimmed {} of {} samples",
            input.len() - kept.len(),
            input.len()
        );
        Ok(input.with_samples(kept)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::PI;

    fn tone(frames: usize) -> Vec<f32> {
        (0..frames)
            .map(|i| 0.5 * (2.0 * PI * 440.0 * i as f32 / 44100.0).sin())
            .collect()
    }

    fn trim(samples: Vec<f32>, config: TrimConfig) -> WaveformBuffer {
        let buffer = WaveformBuffer::mono(samples, 44100).unwrap();
        SilenceTrimmer::new(config).apply(&buffer).unwrap()
    }

    #[test]
    fn test_leading_and_trailing_removed_interior_kept() {
        // 1s silence, 1s tone, 0.5s silence, 1s tone, 1s silence
        let mut samples = vec![0.0; 44100];
        samples.extend(tone(44100));
        samples.extend(vec![0.0; 22050]);
        samples.extend(tone(44100));
        samples.extend(vec![0.0; 44100]);

        let output = trim(samples, TrimConfig::default());
        let content = 44100 * 2 + 22050;
        assert!(output.len() >= content);
        assert!(output.len() <= content + 2 * 2048);

        // The interior gap survives
        let centre = output.len() / 2;
        assert!(output.samples()[centre - 1000..centre + 1000].iter().all(|&s| s == 0.0));
    }

    #[test]
    fn test_quiet_buffer_becomes_empty() {
        let output = trim(vec![0.0001; 22050], TrimConfig::default());
        assert!(output.is_empty());
        assert_eq!(output.sample_rate(), 44100);
    }

    #[test]
    fn test_all_zero_and_empty() {
        assert!(trim(vec![0.0; 10_000], TrimConfig::default()).is_empty());
        assert!(trim(Vec::new(), TrimConfig::default()).is_empty());
    }

    #[test]
    fn test_loud_buffer_untouched() {
        let samples = tone(44100);
        let output = trim(samples.clone(), TrimConfig::default());
        assert_eq!(output.samples(), &samples[..]);
    }

    #[test]
    fn test_peak_reference_trims_quiet_recording() {
        // -40 dBFS tone with a -80 dBFS tail: silent against full scale,
        // clearly above the tail relative to its own peak
        let mut samples: Vec<f32> = tone(44100).iter().map(|s| s * 0.02).collect();
        samples.extend(vec![0.0001; 44100]);

        let full_scale = trim(samples.clone(), TrimConfig::default());
        assert!(full_scale.is_empty());

        let config = TrimConfig {
            reference: TrimReference::Peak,
            ..TrimConfig::default()
        };
        let peak = trim(samples, config);
        assert!(peak.len() >= 44100 && peak.len() < 44100 + 2048);
    }
}
