//! Integrated loudness measurement and normalization

use crate::core::WaveformBuffer;
use crate::error::{AudioError, AudioResult};
use ebur128::{EbuR128, Mode};

/// Shortest buffer that yields one BS.1770 gating block
pub const MIN_MEASURABLE_MS: u32 = 400;

/// Integrated loudness of a mono buffer in LUFS (EBU R128 / ITU-R BS.1770).
///
/// Returns `-inf` for silence, like the underlying meter.
pub fn integrated_loudness(buffer: &WaveformBuffer) -> AudioResult<f64> {
    let mut meter = EbuR128::new(buffer.channels() as u32, buffer.sample_rate(), Mode::I)
        .map_err(|e| AudioError::ProcessingError(format!("loudness meter: {}", e)))?;

    meter
        .add_frames_f32(buffer.samples())
        .map_err(|e| AudioError::ProcessingError(format!("loudness meter: {}", e)))?;

    meter
        .loudness_global()
        .map_err(|e| AudioError::ProcessingError(format!("loudness meter: {}", e)))
}

/// Frames needed before integrated loudness is defined
pub fn min_measurable_frames(sample_rate: u32) -> usize {
    (sample_rate as u64 * MIN_MEASURABLE_MS as u64 / 1000) as usize
}

/// Loudness normalization filter - scales to a target integrated loudness
/// and hard-clips the result to [-1.0, 1.0]
#[derive(Clone, Debug)]
pub struct Normalize {
    /// Target integrated loudness in LUFS
    target_lufs: f32,
    /// Loudness measured on the last processed buffer
    measured_lufs: Option<f64>,
}

impl Normalize {
    /// Create a loudness normalizer
    pub fn loudness(target_lufs: f32) -> AudioResult<Self> {
        if !target_lufs.is_finite() || target_lufs > 0.0 {
            return Err(AudioError::ConfigError(format!(
                "Target loudness must be a finite value at or below 0 LUFS, got {}",
                target_lufs
            )));
        }

        Ok(Normalize {
            target_lufs,
            measured_lufs: None,
        })
    }

    /// Loudness measured on the most recent input
    pub fn measured_lufs(&self) -> Option<f64> {
        self.measured_lufs
    }

    /// Linear gain that moves `measured` LUFS onto the target
    pub fn gain_for(&self, measured: f64) -> f32 {
        10f64.powf((self.target_lufs as f64 - measured) / 20.0) as f32
    }

    /// Normalize `buffer` using a loudness the caller already measured on it
    pub fn apply_measured(
        &mut self,
        buffer: &WaveformBuffer,
        measured: f64,
    ) -> AudioResult<WaveformBuffer> {
        self.measured_lufs = Some(measured);

        if !measured.is_finite() {
            return Err(AudioError::ProcessingError(
                "integrated loudness undefined for silent input".to_string(),
            ));
        }

        let gain = self.gain_for(measured);
        buffer.with_samples(Self::apply_gain(buffer.samples(), gain))
    }

    /// Apply gain to all samples, clipping at full scale
    fn apply_gain(samples: &[f32], gain: f32) -> Vec<f32> {
        samples.iter().map(|&s| (s * gain).clamp(-1.0, 1.0)).collect()
    }
}

impl super::Filter for Normalize {
    fn process(&mut self, buffer: &WaveformBuffer) -> AudioResult<WaveformBuffer> {
        let required = min_measurable_frames(buffer.sample_rate());
        if buffer.frames() < required {
            return Err(AudioError::BufferError(format!(
                "{} frames is too short for loudness measurement (need {})",
                buffer.frames(),
                required
            )));
        }

        let measured = integrated_loudness(buffer)?;
        self.apply_measured(buffer, measured)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::Filter;
    use std::f32::consts::PI;

    fn sine(amp: f32, secs: f32) -> WaveformBuffer {
        let frames = (44100.0 * secs) as usize;
        let samples = (0..frames)
            .map(|i| amp * (2.0 * PI * 997.0 * i as f32 / 44100.0).sin())
            .collect();
        WaveformBuffer::mono(samples, 44100).unwrap()
    }

    #[test]
    fn test_reaches_target() {
        let mut normalizer = Normalize::loudness(-16.0).unwrap();
        let output = normalizer.process(&sine(0.05, 3.0)).unwrap();

        let lufs = integrated_loudness(&output).unwrap();
        assert!((lufs + 16.0).abs() < 0.1, "lufs {}", lufs);
        assert!(normalizer.measured_lufs().unwrap() < -20.0);
    }

    #[test]
    fn test_idempotent() {
        let mut normalizer = Normalize::loudness(-16.0).unwrap();
        let once = normalizer.process(&sine(0.3, 3.0)).unwrap();
        let twice = normalizer.process(&once).unwrap();

        let first = integrated_loudness(&once).unwrap();
        let second = integrated_loudness(&twice).unwrap();
        assert!((first - second).abs() < 0.5);
    }

    #[test]
    fn test_silence_rejected() {
        let mut normalizer = Normalize::loudness(-16.0).unwrap();
        let silent = WaveformBuffer::mono(vec![0.0; 44100], 44100).unwrap();
        assert!(normalizer.process(&silent).is_err());
    }

    #[test]
    fn test_short_buffer_rejected() {
        let mut normalizer = Normalize::loudness(-16.0).unwrap();
        assert!(normalizer.process(&sine(0.5, 0.2)).is_err());
    }

    #[test]
    fn test_apply_measured_matches_process() {
        let input = sine(0.1, 2.0);
        let measured = integrated_loudness(&input).unwrap();

        let mut direct = Normalize::loudness(-16.0).unwrap();
        let mut premeasured = Normalize::loudness(-16.0).unwrap();
        let a = direct.process(&input).unwrap();
        let b = premeasured.apply_measured(&input, measured).unwrap();

        assert_eq!(a, b);
        assert_eq!(premeasured.measured_lufs(), Some(measured));
    }

    #[test]
    fn test_apply_measured_uses_given_value() {
        let input = sine(0.1, 1.0);
        let mut normalizer = Normalize::loudness(-16.0).unwrap();
        // Claiming the input sits on target leaves it untouched
        let output = normalizer.apply_measured(&input, -16.0).unwrap();
        assert_eq!(output, input);
        assert!(normalizer.apply_measured(&input, f64::NEG_INFINITY).is_err());
    }

    #[test]
    fn test_output_clipped() {
        let mut normalizer = Normalize::loudness(-1.0).unwrap();
        let output = normalizer.process(&sine(0.9, 1.0)).unwrap();
        assert!(output.peak() <= 1.0);
    }
}
