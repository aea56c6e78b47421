//! Sample buffers and source metadata

use crate::error::{AudioError, AudioResult};
use std::time::Duration;

/// Sample rate every buffer carries after ingest
pub const TARGET_SAMPLE_RATE: u32 = 44_100;

/// In-memory waveform: f32 samples, interleaved when `channels > 1`
#[derive(Debug, Clone, PartialEq)]
pub struct WaveformBuffer {
    /// Audio samples (nominally -1.0 to 1.0, may overshoot before clipping)
    samples: Vec<f32>,
    /// Sample rate in Hz
    sample_rate: u32,
    /// Number of interleaved channels
    channels: u16,
}

impl WaveformBuffer {
    /// Create a new buffer from interleaved samples
    pub fn new(samples: Vec<f32>, sample_rate: u32, channels: u16) -> AudioResult<Self> {
        if sample_rate == 0 {
            return Err(AudioError::InvalidSampleRate { rate: sample_rate });
        }

        if channels == 0 {
            return Err(AudioError::InvalidChannels {
                expected: 1,
                got: 0,
            });
        }

        if samples.len() % channels as usize != 0 {
            return Err(AudioError::BufferError(
                "Sample count not divisible by channel count".to_string(),
            ));
        }

        Ok(WaveformBuffer {
            samples,
            sample_rate,
            channels,
        })
    }

    /// Create a mono buffer
    pub fn mono(samples: Vec<f32>, sample_rate: u32) -> AudioResult<Self> {
        Self::new(samples, sample_rate, 1)
    }

    /// Build a buffer with the same rate and layout around new samples.
    ///
    /// Stages use this to produce their output so the sample rate set at
    /// ingest can never drift.
    pub fn with_samples(&self, samples: Vec<f32>) -> AudioResult<Self> {
        Self::new(samples, self.sample_rate, self.channels)
    }

    /// Get reference to the samples
    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    /// Get owned samples (consumes buffer)
    pub fn into_samples(self) -> Vec<f32> {
        self.samples
    }

    /// Get sample rate in Hz
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Get channel count
    pub fn channels(&self) -> u16 {
        self.channels
    }

    /// Whether the buffer holds a single channel
    pub fn is_mono(&self) -> bool {
        self.channels == 1
    }

    /// Number of samples per channel
    pub fn frames(&self) -> usize {
        self.samples.len() / self.channels as usize
    }

    /// Total number of samples across channels
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Check if buffer is empty
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Playback duration
    pub fn duration(&self) -> Duration {
        Duration::from_secs_f64(self.frames() as f64 / self.sample_rate as f64)
    }

    /// Absolute sample peak (linear)
    pub fn peak(&self) -> f32 {
        self.samples
            .iter()
            .map(|&s| s.abs())
            .fold(0.0f32, |a, b| a.max(b))
    }

    /// Root mean square level (linear)
    pub fn rms(&self) -> f32 {
        if self.samples.is_empty() {
            return 0.0;
        }

        let sum_squared: f64 = self.samples.iter().map(|&s| (s as f64) * (s as f64)).sum();
        (sum_squared / self.samples.len() as f64).sqrt() as f32
    }

    /// True when every sample is a finite number
    pub fn is_finite(&self) -> bool {
        self.samples.iter().all(|s| s.is_finite())
    }
}

/// What the decoder found in the caller's input, before normalization
#[derive(Debug, Clone, PartialEq)]
pub struct SourceInfo {
    /// Extension used to select the decoder
    pub extension: String,
    /// Codec short name reported by the decoder (e.g. "mp3", "pcm_s16le")
    pub codec: String,
    /// Source sample rate in Hz
    pub sample_rate: u32,
    /// Source channel count
    pub channels: u16,
    /// Decoded duration
    pub duration: Duration,
}

impl SourceInfo {
    /// Create new source info
    pub fn new(extension: &str, codec: String, sample_rate: u32, channels: u16) -> AudioResult<Self> {
        if sample_rate == 0 {
            return Err(AudioError::InvalidSampleRate { rate: sample_rate });
        }

        Ok(SourceInfo {
            extension: extension.to_string(),
            codec,
            sample_rate,
            channels,
            duration: Duration::ZERO,
        })
    }

    /// Set duration
    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }

    /// Get duration in seconds
    pub fn duration_secs(&self) -> f64 {
        self.duration.as_secs_f64()
    }
}

/// Convert decibels to a linear amplitude factor
pub fn db_to_linear(db: f32) -> f32 {
    10.0f32.powf(db / 20.0)
}

/// Convert a linear amplitude to decibels, flooring at -200 dB
pub fn linear_to_db(linear: f32) -> f32 {
    20.0 * linear.max(1e-10).log10()
}
