//! Sample rate conversion with rubato

use crate::core::WaveformBuffer;
use crate::error::{AudioError, AudioResult};
use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};

/// Input frames handed to rubato per call
const CHUNK_SIZE: usize = 1024;

/// Offline sample-rate converter for mono buffers.
///
/// The resampler's group delay is removed, so output sample `n` lines up
/// with input time `n / output_rate`.
pub struct Resample {
    output_rate: u32,
}

impl Resample {
    /// Create a resampler targeting `output_rate`
    pub fn new(output_rate: u32) -> AudioResult<Self> {
        if output_rate == 0 {
            return Err(AudioError::InvalidSampleRate { rate: 0 });
        }

        Ok(Resample { output_rate })
    }

    fn params() -> SincInterpolationParameters {
        SincInterpolationParameters {
            sinc_len: 256,
            f_cutoff: 0.95,
            interpolation: SincInterpolationType::Cubic,
            oversampling_factor: 256,
            window: WindowFunction::BlackmanHarris2,
        }
    }

    /// Expected output length for `frames` input frames
    pub fn output_len(frames: usize, input_rate: u32, output_rate: u32) -> usize {
        (frames as f64 * output_rate as f64 / input_rate as f64).round() as usize
    }

    fn sinc_resample(input: &[f32], input_rate: u32, output_rate: u32) -> AudioResult<Vec<f32>> {
        let ratio = output_rate as f64 / input_rate as f64;
        let mut resampler = SincFixedIn::<f32>::new(ratio, 2.0, Self::params(), CHUNK_SIZE, 1)
            .map_err(|e| AudioError::ResamplingError(e.to_string()))?;

        let expected = Self::output_len(input.len(), input_rate, output_rate);
        let delay = resampler.output_delay();
        let wanted = expected + delay;
        let mut output: Vec<f32> = Vec::with_capacity(wanted + CHUNK_SIZE);

        let mut chunks = input.chunks_exact(CHUNK_SIZE);
        for chunk in &mut chunks {
            let frames = resampler
                .process(&[chunk][..], None)
                .map_err(|e| AudioError::ResamplingError(e.to_string()))?;
            output.extend_from_slice(&frames[0]);
        }

        let remainder = chunks.remainder();
        if !remainder.is_empty() {
            let frames = resampler
                .process_partial(Some(&[remainder][..]), None)
                .map_err(|e| AudioError::ResamplingError(e.to_string()))?;
            output.extend_from_slice(&frames[0]);
        }

        // Drain the filter tail until the delayed signal is complete
        while output.len() < wanted {
            let frames = resampler
                .process_partial(None::<&[&[f32]]>, None)
                .map_err(|e| AudioError::ResamplingError(e.to_string()))?;
            if frames[0].is_empty() {
                break;
            }
            output.extend_from_slice(&frames[0]);
        }

        output.resize(output.len().max(wanted), 0.0);
        Ok(output[delay..wanted].to_vec())
    }
}

impl super::Filter for Resample {
    fn process(&mut self, buffer: &WaveformBuffer) -> AudioResult<WaveformBuffer> {
        if !buffer.is_mono() {
            return Err(AudioError::InvalidChannels {
                expected: 1,
                got: buffer.channels() as u32,
            });
        }

        if buffer.sample_rate() == self.output_rate || buffer.is_empty() {
            return WaveformBuffer::mono(buffer.samples().to_vec(), self.output_rate);
        }

        let resampled = Self::sinc_resample(buffer.samples(), buffer.sample_rate(), self.output_rate)?;
        WaveformBuffer::mono(resampled, self.output_rate)
    }
}
