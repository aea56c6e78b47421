//! Audio decoder implementations

pub mod symphonia;

pub use symphonia::SymphoniaDecoder;

use crate::core::{SourceInfo, WaveformBuffer};
use crate::error::{AudioError, AudioResult};

/// Extensions the decoder accepts (lower case, no dot)
pub const SUPPORTED_EXTENSIONS: &[&str] = &[
    "wav", "wave", "mp3", "flac", "ogg", "oga", "m4a", "mp4", "aac", "mkv", "mka", "webm",
];

/// Trait for audio decoders
pub trait Decoder: Send {
    /// Get next block of interleaved samples from the stream
    fn decode_frame(&mut self) -> AudioResult<Option<WaveformBuffer>>;

    /// Check if decoder is finished
    fn is_finished(&self) -> bool;

    /// Describe the source once `decoded` holds the full stream
    fn describe(&self, decoded: &WaveformBuffer) -> AudioResult<SourceInfo>;
}

/// Lower-case an extension, strip a leading dot, and check it is supported
pub fn normalize_extension(extension: &str) -> AudioResult<String> {
    let ext = extension.trim().trim_start_matches('.').to_ascii_lowercase();
    if SUPPORTED_EXTENSIONS.contains(&ext.as_str()) {
        Ok(ext)
    } else {
        Err(AudioError::UnsupportedFormat(format!(
            "no decoder for extension '{}'",
            extension
        )))
    }
}

/// Create a decoder for `bytes` declared as `extension`
pub fn from_bytes(bytes: &[u8], extension: &str) -> AudioResult<Box<dyn Decoder>> {
    let ext = normalize_extension(extension)?;
    SymphoniaDecoder::from_bytes(bytes.to_vec(), &ext).map(|d| Box::new(d) as Box<dyn Decoder>)
}

/// Decode the whole stream into one interleaved buffer
pub fn decode_all(bytes: &[u8], extension: &str) -> AudioResult<(WaveformBuffer, SourceInfo)> {
    let mut decoder = from_bytes(bytes, extension)?;

    let mut samples = Vec::new();
    let mut layout: Option<(u32, u16)> = None;

    while let Some(frame) = decoder.decode_frame()? {
        match layout {
            None => layout = Some((frame.sample_rate(), frame.channels())),
            Some((rate, channels)) => {
                if frame.sample_rate() != rate {
                    return Err(AudioError::InvalidSampleRate {
                        rate: frame.sample_rate(),
                    });
                }
                if frame.channels() != channels {
                    return Err(AudioError::InvalidChannels {
                        expected: channels as u32,
                        got: frame.channels() as u32,
                    });
                }
            }
        }
        samples.extend_from_slice(frame.samples());
    }

    let (rate, channels) = layout.ok_or_else(|| {
        AudioError::DecodeError("stream contained no decodable audio".to_string())
    })?;

    let decoded = WaveformBuffer::new(samples, rate, channels)?;
    let info = decoder.describe(&decoded)?;
    Ok((decoded, info))
}
