//! Audio encoder implementations

pub mod wav;

pub use wav::{OutputFormat, WavEncoder, encode_to_vec};

use crate::core::WaveformBuffer;
use crate::error::AudioResult;

/// Trait for audio encoders
pub trait Encoder {
    /// Encode a buffer to output
    fn encode(&mut self, buffer: &WaveformBuffer) -> AudioResult<()>;

    /// Finalize encoding (flush any remaining data)
    fn finalize(&mut self) -> AudioResult<()> {
        Ok(())
    }
}
