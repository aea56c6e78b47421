//! Channel downmix

use crate::core::WaveformBuffer;
use crate::error::AudioResult;

/// Channel remixer - folds any interleaved layout down to mono
#[derive(Debug, Clone, Copy, Default)]
pub struct Remix;

impl Remix {
    /// Create a new downmixer
    pub fn new() -> Self {
        Remix
    }

    /// Average each interleaved frame of `channels` samples into one sample
    fn average_channels(input: &[f32], channels: usize) -> Vec<f32> {
        let scale = 1.0 / channels as f32;
        input
            .chunks_exact(channels)
            .map(|frame| frame.iter().sum::<f32>() * scale)
            .collect()
    }
}

impl super::Filter for Remix {
    fn process(&mut self, buffer: &WaveformBuffer) -> AudioResult<WaveformBuffer> {
        if buffer.is_mono() {
            return Ok(buffer.clone());
        }

        let mono = Self::average_channels(buffer.samples(), buffer.channels() as usize);
        WaveformBuffer::mono(mono, buffer.sample_rate())
    }
}
