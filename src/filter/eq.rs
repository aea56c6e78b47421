//! Biquad tone filters (RBJ cookbook via the `biquad` crate)

use crate::core::WaveformBuffer;
use crate::error::{AudioError, AudioResult};
use biquad::{Biquad, Coefficients, DirectForm1, Q_BUTTERWORTH_F32, ToHertz, Type};

/// Single biquad section applied over a whole buffer
pub struct ToneFilter {
    filter: DirectForm1<f32>,
}

impl ToneFilter {
    fn build(kind: Type<f32>, sample_rate: u32, cutoff_hz: f32) -> AudioResult<Self> {
        let nyquist = sample_rate as f32 / 2.0;
        if !(cutoff_hz > 0.0 && cutoff_hz < nyquist) {
            return Err(AudioError::ConfigError(format!(
                "Cutoff {} Hz outside (0, {}) Hz",
                cutoff_hz, nyquist
            )));
        }

        let coeffs = Coefficients::<f32>::from_params(
            kind,
            (sample_rate as f32).hz(),
            cutoff_hz.hz(),
            Q_BUTTERWORTH_F32,
        )
        .map_err(|e| AudioError::ProcessingError(format!("biquad coefficients: {:?}", e)))?;

        Ok(ToneFilter {
            filter: DirectForm1::<f32>::new(coeffs),
        })
    }

    /// Second-order Butterworth highpass
    pub fn highpass(sample_rate: u32, cutoff_hz: f32) -> AudioResult<Self> {
        Self::build(Type::HighPass, sample_rate, cutoff_hz)
    }

    /// High shelf boosting (or cutting) `gain_db` above `cutoff_hz`
    pub fn high_shelf(sample_rate: u32, cutoff_hz: f32, gain_db: f32) -> AudioResult<Self> {
        Self::build(Type::HighShelf(gain_db), sample_rate, cutoff_hz)
    }

    /// Filter samples in place
    pub fn run_in_place(&mut self, samples: &mut [f32]) {
        for sample in samples.iter_mut() {
            *sample = self.filter.run(*sample);
        }
    }
}

impl super::Filter for ToneFilter {
    fn process(&mut self, buffer: &WaveformBuffer) -> AudioResult<WaveformBuffer> {
        let mut samples = buffer.samples().to_vec();
        self.run_in_place(&mut samples);
        buffer.with_samples(samples)
    }
}
