//! WAV encoding with hound

use crate::core::WaveformBuffer;
use crate::error::{AudioError, AudioResult};
use hound::{WavSpec, WavWriter};
use std::io::{Cursor, Seek, Write};

/// Sample representation of the encoded WAV
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// 32-bit IEEE float
    Float32,
    /// 16-bit signed integer PCM
    Int16,
}

impl OutputFormat {
    fn spec(&self, sample_rate: u32) -> WavSpec {
        match self {
            OutputFormat::Float32 => WavSpec {
                channels: 1,
                sample_rate,
                bits_per_sample: 32,
                sample_format: hound::SampleFormat::Float,
            },
            OutputFormat::Int16 => WavSpec {
                channels: 1,
                sample_rate,
                bits_per_sample: 16,
                sample_format: hound::SampleFormat::Int,
            },
        }
    }
}

/// Mono WAV encoder over any seekable writer
pub struct WavEncoder<W: Write + Seek> {
    writer: Option<WavWriter<W>>,
    sample_rate: u32,
    format: OutputFormat,
}

impl<W: Write + Seek> WavEncoder<W> {
    /// Create a new WAV encoder writing into `writer`
    pub fn new(writer: W, sample_rate: u32, format: OutputFormat) -> AudioResult<Self> {
        if sample_rate == 0 {
            return Err(AudioError::InvalidSampleRate { rate: 0 });
        }

        let writer = WavWriter::new(writer, format.spec(sample_rate))
            .map_err(|e| AudioError::EncodeError(e.to_string()))?;

        Ok(WavEncoder {
            writer: Some(writer),
            sample_rate,
            format,
        })
    }

    /// Get the sample rate
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Get the sample format
    pub fn format(&self) -> OutputFormat {
        self.format
    }

    /// Get the number of samples written
    pub fn samples_written(&self) -> u32 {
        self.writer.as_ref().map(|w| w.len()).unwrap_or(0)
    }
}

impl<W: Write + Seek> super::Encoder for WavEncoder<W> {
    fn encode(&mut self, buffer: &WaveformBuffer) -> AudioResult<()> {
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

        if !buffer.is_finite() {
            return Err(AudioError::EncodeError(
                "buffer contains non-finite samples".to_string(),
            ));
        }

        let writer = self
            .writer
            .as_mut()
            .ok_or_else(|| AudioError::ProcessingError("Encoder already finalized".to_string()))?;

        match self.format {
            OutputFormat::Float32 => {
                for &sample in buffer.samples() {
                    writer.write_sample(sample)?;
                }
            }
            OutputFormat::Int16 => {
                for &sample in buffer.samples() {
                    let quantized = (sample.clamp(-1.0, 1.0) * i16::MAX as f32).round() as i16;
                    writer.write_sample(quantized)?;
                }
            }
        }

        Ok(())
    }

    fn finalize(&mut self) -> AudioResult<()> {
        if let Some(writer) = self.writer.take() {
            writer.finalize()?;
        }
        Ok(())
    }
}

/// Serialize a mono buffer into WAV bytes
pub fn encode_to_vec(buffer: &WaveformBuffer, format: OutputFormat) -> AudioResult<Vec<u8>> {
    use super::Encoder;

    let mut cursor = Cursor::new(Vec::new());
    {
        let mut encoder = WavEncoder::new(&mut cursor, buffer.sample_rate(), format)?;
        encoder.encode(buffer)?;
        encoder.finalize()?;
    }
    Ok(cursor.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoder::Encoder;
    use hound::WavReader;

    #[test]
    fn test_wav_encoder_write() {
        let mut cursor = Cursor::new(Vec::new());
        let mut encoder = WavEncoder::new(&mut cursor, 44100, OutputFormat::Float32).unwrap();

        let buffer = WaveformBuffer::mono(vec![0.0, 0.1, -0.1, 0.5], 44100).unwrap();
        assert!(encoder.encode(&buffer).is_ok());
        assert_eq!(encoder.samples_written(), 4);
        assert!(encoder.finalize().is_ok());
    }

    #[test]
    fn test_wav_encoder_invalid_sample_rate() {
        let mut cursor = Cursor::new(Vec::new());
        let mut encoder = WavEncoder::new(&mut cursor, 44100, OutputFormat::Float32).unwrap();

        let buffer = WaveformBuffer::mono(vec![0.0, 0.1], 48000).unwrap();
        assert!(encoder.encode(&buffer).is_err());
    }

    #[test]
    fn test_wav_encoder_invalid_channels() {
        let mut cursor = Cursor::new(Vec::new());
        let mut encoder = WavEncoder::new(&mut cursor, 44100, OutputFormat::Float32).unwrap();

        let buffer = WaveformBuffer::new(vec![0.0, 0.1, 0.2, 0.3], 44100, 2).unwrap();
        assert!(encoder.encode(&buffer).is_err());
    }

    #[test]
    fn test_non_finite_rejected() {
        let buffer = WaveformBuffer::mono(vec![0.0, f32::NAN], 44100).unwrap();
        assert!(encode_to_vec(&buffer, OutputFormat::Float32).is_err());
    }

    #[test]
    fn test_int16_output_readable() {
        let buffer = WaveformBuffer::mono(vec![0.0, 0.5, -1.0, 2.0], 44100).unwrap();
        let bytes = encode_to_vec(&buffer, OutputFormat::Int16).unwrap();

        let reader = WavReader::new(Cursor::new(bytes)).unwrap();
        let spec = reader.spec();
        assert_eq!(spec.channels, 1);
        assert_eq!(spec.sample_rate, 44100);
        assert_eq!(spec.bits_per_sample, 16);

        let samples: Vec<i16> = reader.into_samples::<i16>().map(|s| s.unwrap()).collect();
        assert_eq!(samples, vec![0, 16384, -32767, 32767]);
    }

    #[test]
    fn test_empty_buffer_encodes() {
        let buffer = WaveformBuffer::mono(Vec::new(), 44100).unwrap();
        let bytes = encode_to_vec(&buffer, OutputFormat::Float32).unwrap();
        let reader = WavReader::new(Cursor::new(bytes)).unwrap();
        assert_eq!(reader.len(), 0);
    }
}
