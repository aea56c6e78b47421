//! DSP building blocks used by the pipeline stages

pub mod compressor;
pub mod eq;
pub mod limiter;
pub mod normalize;
pub mod remix;
pub mod resample;
pub mod stft;

pub use compressor::Compressor;
pub use eq::ToneFilter;
pub use limiter::Limiter;
pub use normalize::{Normalize, integrated_loudness};
pub use remix::Remix;
pub use resample::Resample;
pub use stft::Stft;

use crate::core::WaveformBuffer;
use crate::error::AudioResult;

/// Trait for whole-buffer audio filters
pub trait Filter {
    /// Process a buffer through this filter
    fn process(&mut self, buffer: &WaveformBuffer) -> AudioResult<WaveformBuffer>;
}
