//! Feed-forward dynamic range compressor

use crate::core::{WaveformBuffer, db_to_linear, linear_to_db};
use crate::error::{AudioError, AudioResult};

/// One-pole smoothing coefficient for a time constant in milliseconds
pub fn time_coeff(ms: f32, sample_rate: u32) -> f32 {
    if ms <= 0.0 {
        return 0.0;
    }
    (-1.0 / (ms * 0.001 * sample_rate as f32)).exp()
}

/// Feed-forward peak compressor with hard knee
#[derive(Debug, Clone)]
pub struct Compressor {
    threshold: f32,
    ratio: f32,
    attack_coeff: f32,
    release_coeff: f32,
    envelope: f32,
    max_reduction_db: f32,
}

impl Compressor {
    /// Create a compressor
    ///
    /// # Arguments
    /// * `threshold_db` - Level above which gain reduction starts (dBFS)
    /// * `ratio` - Input/output slope above threshold, at least 1.0
    /// * `attack_ms` / `release_ms` - Envelope ballistics
    pub fn new(
        sample_rate: u32,
        threshold_db: f32,
        ratio: f32,
        attack_ms: f32,
        release_ms: f32,
    ) -> AudioResult<Self> {
        if sample_rate == 0 {
            return Err(AudioError::InvalidSampleRate { rate: 0 });
        }
        if !(ratio >= 1.0) {
            return Err(AudioError::ConfigError(format!(
                "Compressor ratio must be at least 1.0, got {}",
                ratio
            )));
        }

        Ok(Compressor {
            threshold: db_to_linear(threshold_db),
            ratio,
            attack_coeff: time_coeff(attack_ms, sample_rate),
            release_coeff: time_coeff(release_ms, sample_rate),
            envelope: 0.0,
            max_reduction_db: 0.0,
        })
    }

    /// Largest gain reduction applied so far, in dB (positive)
    pub fn max_reduction_db(&self) -> f32 {
        self.max_reduction_db
    }

    /// Gain for the current envelope value
    fn static_gain(&self, envelope: f32) -> f32 {
        if envelope <= self.threshold {
            return 1.0;
        }
        (envelope / self.threshold).powf(1.0 / self.ratio - 1.0)
    }

    /// Process one sample
    #[inline]
    pub fn process_sample(&mut self, input: f32) -> f32 {
        let level = input.abs();
        let coeff = if level > self.envelope {
            self.attack_coeff
        } else {
            self.release_coeff
        };
        self.envelope = coeff * self.envelope + (1.0 - coeff) * level;

        let gain = self.static_gain(self.envelope);
        if gain < 1.0 {
            self.max_reduction_db = self.max_reduction_db.max(-linear_to_db(gain));
        }
        input * gain
    }
}

impl super::Filter for Compressor {
    fn process(&mut self, buffer: &WaveformBuffer) -> AudioResult<WaveformBuffer> {
        let samples = buffer.samples().iter().map(|&s| self.process_sample(s)).collect();
        buffer.with_samples(samples)
    }
}
