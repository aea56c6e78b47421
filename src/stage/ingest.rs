//! Ingest normalizer: decode, fold to mono, resample to 44.1 kHz
//!
//! Failures here are fatal for the run since no usable buffer exists yet.

use crate::core::{SourceInfo, TARGET_SAMPLE_RATE, WaveformBuffer};
use crate::decoder;
use crate::error::{AudioError, AudioResult};
use crate::filter::{Filter, Remix, Resample};

/// Decode `bytes` declared as `extension` and normalize the result
pub fn ingest(bytes: &[u8], extension: &str) -> AudioResult<(WaveformBuffer, SourceInfo)> {
    let (raw, info) = decoder::decode_all(bytes, extension)?;
    log::debug!(
        "decoded {} ({}): {} Hz, {} channels, {:.2}s",
        info.extension,
        info.codec,
        info.sample_rate,
        info.channels,
        info.duration_secs()
    );

    let normalized = normalize_waveform(&raw)?;
    Ok((normalized, info))
}

/// Fold an interleaved buffer to mono and resample it to 44.1 kHz
pub fn normalize_waveform(raw: &WaveformBuffer) -> AudioResult<WaveformBuffer> {
    if !raw.is_finite() {
        return Err(AudioError::DecodeError(
            "decoded audio contains non-finite samples".to_string(),
        ));
    }

    let mono = Remix::new().process(raw)?;
    let normalized = Resample::new(TARGET_SAMPLE_RATE)?.process(&mono)?;

    if !normalized.is_finite() {
        return Err(AudioError::ResamplingError(
            "resampler produced non-finite samples".to_string(),
        ));
    }

    Ok(normalized)
}
