//! Fixed-duration splitting and rejoining of mono buffers

use crate::core::WaveformBuffer;
use crate::error::{AudioError, AudioResult};
use std::time::Duration;

/// Audio segmentation - split a mono buffer into time-based chunks
#[derive(Debug, Clone)]
pub struct Segment {
    /// Segment duration
    duration: Duration,
    /// Sample rate
    sample_rate: u32,
}

impl Segment {
    /// Create a new segmenter
    pub fn new(duration: Duration, sample_rate: u32) -> AudioResult<Self> {
        if sample_rate == 0 {
            return Err(AudioError::InvalidSampleRate { rate: 0 });
        }

        if duration.is_zero() {
            return Err(AudioError::SegmentationError(
                "Segment duration must be non-zero".to_string(),
            ));
        }

        Ok(Segment {
            duration,
            sample_rate,
        })
    }

    /// Calculate the number of samples per segment
    pub fn samples_per_segment(&self) -> usize {
        ((self.duration.as_secs_f64() * self.sample_rate as f64).ceil() as usize).max(1)
    }

    /// Split a mono buffer into consecutive segments; the last may be shorter
    pub fn split(&self, buffer: &WaveformBuffer) -> AudioResult<Vec<WaveformBuffer>> {
        if buffer.sample_rate() != self.sample_rate {
            return Err(AudioError::InvalidSampleRate {
                rate: buffer.sample_rate(),
            });
        }

        if !buffer.is_mono() {
            return Err(AudioError::InvalidChannels {
                expected: 1,
                got: buffer.channels() as u32,
            });
        }

        buffer
            .samples()
            .chunks(self.samples_per_segment())
            .map(|chunk| buffer.with_samples(chunk.to_vec()))
            .collect()
    }

    /// Concatenate segments back into one buffer
    pub fn join(&self, segments: Vec<Vec<f32>>) -> AudioResult<WaveformBuffer> {
        let total = segments.iter().map(Vec::len).sum();
        let mut samples = Vec::with_capacity(total);
        for segment in segments {
            samples.extend(segment);
        }
        WaveformBuffer::mono(samples, self.sample_rate)
    }
}
