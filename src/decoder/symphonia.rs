//! Decoding through symphonia

use crate::core::{SourceInfo, WaveformBuffer};
use crate::error::{AudioError, AudioResult};
use std::io::Cursor;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{CODEC_TYPE_NULL, DecoderOptions};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

/// Symphonia-based decoder over an in-memory byte buffer
pub struct SymphoniaDecoder {
    /// Container reader
    reader: Box<dyn symphonia::core::formats::FormatReader>,
    /// Codec decoder for the selected track
    decoder: Box<dyn symphonia::core::codecs::Decoder>,
    /// Track we decode
    track_id: u32,
    /// Sample rate from the codec parameters, if declared
    sample_rate: Option<u32>,
    /// Channel count from the codec parameters, if declared
    channels: Option<u16>,
    /// Extension used as probe hint
    extension: String,
    /// Codec short name
    codec: String,
    /// Packets that failed to decode and were skipped
    skipped_packets: u64,
    /// Whether decoding is finished
    finished: bool,
}

impl SymphoniaDecoder {
    /// Probe `bytes` using `extension` as a format hint
    pub fn from_bytes(bytes: Vec<u8>, extension: &str) -> AudioResult<Self> {
        let mss = MediaSourceStream::new(Box::new(Cursor::new(bytes)), Default::default());

        let mut hint = Hint::new();
        hint.with_extension(extension);

        let format_opts = FormatOptions::default();
        let metadata_opts = MetadataOptions::default();

        let probed = symphonia::default::get_probe()
            .format(&hint, mss, &format_opts, &metadata_opts)
            .map_err(|e| AudioError::DecodeError(format!("unrecognized or corrupt container: {}", e)))?;

        let reader = probed.format;

        // Find the first audio track
        let track = reader
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or_else(|| AudioError::InvalidMetadata("No audio track found".to_string()))?
            .clone();

        let codec_params = &track.codec_params;
        let channels = codec_params.channels.map(|c| c.count() as u16);

        let codec = symphonia::default::get_codecs()
            .get_codec(codec_params.codec)
            .map(|d| d.short_name.to_string())
            .unwrap_or_else(|| "unknown".to_string());

        let decoder = symphonia::default::get_codecs()
            .make(codec_params, &DecoderOptions::default())
            .map_err(|e| AudioError::UnsupportedFormat(e.to_string()))?;

        Ok(SymphoniaDecoder {
            reader,
            decoder,
            track_id: track.id,
            sample_rate: codec_params.sample_rate,
            channels,
            extension: extension.to_string(),
            codec,
            skipped_packets: 0,
            finished: false,
        })
    }

    /// Declared sample rate, if the container states one
    pub fn sample_rate(&self) -> Option<u32> {
        self.sample_rate
    }

    /// Declared channel count, if the container states one
    pub fn channels(&self) -> Option<u16> {
        self.channels
    }

    /// Codec short name
    pub fn codec(&self) -> &str {
        &self.codec
    }

    fn finish(&mut self) -> AudioResult<Option<WaveformBuffer>> {
        self.finished = true;
        if self.skipped_packets > 0 {
            log::warn!(
                "{}: skipped {} corrupt packet(s)",
                self.extension,
                self.skipped_packets
            );
        }
        Ok(None)
    }
}

impl super::Decoder for SymphoniaDecoder {
    fn decode_frame(&mut self) -> AudioResult<Option<WaveformBuffer>> {
        if self.finished {
            return Ok(None);
        }

        loop {
            let packet = match self.reader.next_packet() {
                Ok(packet) => packet,
                Err(SymphoniaError::IoError(ref e))
                    if e.kind() == std::io::ErrorKind::UnexpectedEof =>
                {
                    return self.finish();
                }
                Err(SymphoniaError::ResetRequired) => return self.finish(),
                Err(e) => return Err(AudioError::DecodeError(e.to_string())),
            };

            if packet.track_id() != self.track_id {
                continue;
            }

            let decoded = match self.decoder.decode(&packet) {
                Ok(decoded) => decoded,
                Err(SymphoniaError::DecodeError(e)) => {
                    log::debug!("skipping corrupt packet: {}", e);
                    self.skipped_packets += 1;
                    continue;
                }
                Err(e) => return Err(AudioError::DecodeError(e.to_string())),
            };

            let spec = *decoded.spec();
            if decoded.frames() == 0 {
                continue;
            }

            let mut sample_buf = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
            sample_buf.copy_interleaved_ref(decoded);

            let channels = spec.channels.count() as u16;
            self.sample_rate.get_or_insert(spec.rate);
            self.channels.get_or_insert(channels);

            let frame = WaveformBuffer::new(sample_buf.samples().to_vec(), spec.rate, channels)?;
            return Ok(Some(frame));
        }
    }

    fn is_finished(&self) -> bool {
        self.finished
    }

    fn describe(&self, decoded: &WaveformBuffer) -> AudioResult<SourceInfo> {
        let sample_rate = self
            .sample_rate
            .ok_or_else(|| AudioError::InvalidMetadata("Unknown sample rate".to_string()))?;
        let channels = self
            .channels
            .ok_or_else(|| AudioError::InvalidMetadata("Unknown channel count".to_string()))?;

        Ok(SourceInfo::new(&self.extension, self.codec.clone(), sample_rate, channels)?
            .with_duration(decoded.duration()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoder::Decoder;
    use hound::{SampleFormat, WavSpec, WavWriter};

    fn wav_bytes(channels: u16, sample_rate: u32, frames: usize) -> Vec<u8> {
        let spec = WavSpec {
            channels,
            sample_rate,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };
        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = WavWriter::new(&mut cursor, spec).unwrap();
            for i in 0..frames {
                for _ in 0..channels {
                    writer.write_sample(((i % 100) as i16 - 50) * 100).unwrap();
                }
            }
            writer.finalize().unwrap();
        }
        cursor.into_inner()
    }

    #[test]
    fn test_garbage_bytes() {
        let result = SymphoniaDecoder::from_bytes(vec![0x13; 64], "wav");
        assert!(result.is_err());
    }

    #[test]
    fn test_decode_wav_frames() {
        let bytes = wav_bytes(2, 48000, 4800);
        let mut decoder = SymphoniaDecoder::from_bytes(bytes, "wav").unwrap();
        assert_eq!(decoder.sample_rate(), Some(48000));
        assert_eq!(decoder.channels(), Some(2));

        let mut total = 0;
        while let Some(frame) = decoder.decode_frame().unwrap() {
            assert_eq!(frame.channels(), 2);
            total += frame.frames();
        }
        assert_eq!(total, 4800);
        assert!(decoder.is_finished());
        assert_eq!(decoder.skipped_packets, 0);
        assert!(decoder.decode_frame().unwrap().is_none());
    }
}
