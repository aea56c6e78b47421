//! Stationary noise reduction by spectral gating
//!
//! The noise profile is estimated from the buffer itself: for every
//! frequency bin the mean and standard deviation of its dB magnitude over
//! all frames. Bins above `mean + threshold_std * std` count as signal.
//! The binary signal mask is smoothed over time and frequency with a
//! triangular kernel and turned into a gain of `1 - strength * (1 - mask)`.

use super::{Stage, StageKind};
use crate::config::NoiseConfig;
use crate::core::WaveformBuffer;
use crate::error::{StageFault, StageResult};
use crate::filter::Stft;
use realfft::num_complex::Complex;

/// Magnitude floor before taking the log
const MAGNITUDE_FLOOR: f32 = 1e-10;

fn magnitude_db(bin: &Complex<f32>) -> f32 {
    20.0 * bin.norm().max(MAGNITUDE_FLOOR).log10()
}

/// Triangular weights for offsets `-radius..=radius`
fn triangle(radius: usize) -> Vec<f32> {
    let span = radius as f32 + 1.0;
    (0..=2 * radius)
        .map(|i| 1.0 - (i as f32 - radius as f32).abs() / span)
        .collect()
}

/// Spectral-gating noise reducer
pub struct NoiseReducer {
    config: NoiseConfig,
}

impl NoiseReducer {
    /// Create a noise reducer
    pub fn new(config: NoiseConfig) -> Self {
        NoiseReducer { config }
    }

    /// Per-bin dB level above which a bin counts as signal
    fn noise_threshold(&self, stft: &mut Stft, samples: &[f32]) -> StageResult<Vec<f32>> {
        let bins = stft.bins();
        let mut sum = vec![0.0f64; bins];
        let mut sum_sq = vec![0.0f64; bins];

        let frames = stft.analyze(samples, |_, spectrum| {
            for (bin, value) in spectrum.iter().enumerate() {
                let db = magnitude_db(value) as f64;
                sum[bin] += db;
                sum_sq[bin] += db * db;
            }
        })?;

        let n = frames.max(1) as f64;
        let k = self.config.threshold_std as f64;
        Ok(sum
            .iter()
            .zip(&sum_sq)
            .map(|(&s, &sq)| {
                let mean = s / n;
                let std = (sq / n - mean * mean).max(0.0).sqrt();
                (mean + k * std) as f32
            })
            .collect())
    }

    /// Binary signal mask, one byte per bin, frames laid out back to back
    fn signal_mask(
        stft: &mut Stft,
        samples: &[f32],
        threshold: &[f32],
    ) -> StageResult<Vec<u8>> {
        let bins = stft.bins();
        let mut mask = Vec::with_capacity(stft.frame_count(samples.len()) * bins);

        stft.analyze(samples, |_, spectrum| {
            mask.extend(
                spectrum
                    .iter()
                    .zip(threshold)
                    .map(|(value, &limit)| u8::from(magnitude_db(value) > limit)),
            );
        })?;

        Ok(mask)
    }

    /// Smoothing radii in frames and bins
    fn smoothing_radii(&self, sample_rate: u32) -> (usize, usize) {
        let hop_ms = self.config.hop_length as f32 * 1000.0 / sample_rate as f32;
        let bin_hz = sample_rate as f32 / self.config.fft_size as f32;
        let time = (self.config.time_smooth_ms / hop_ms).round() as usize;
        let freq = (self.config.freq_smooth_hz / bin_hz).round() as usize;
        (time, freq)
    }
}

impl Stage for NoiseReducer {
    fn kind(&self) -> StageKind {
        StageKind::NoiseReducer
    }

    fn apply(&mut self, input: &WaveformBuffer) -> StageResult<WaveformBuffer> {
        if input.is_empty() {
            return Ok(input.clone());
        }

        let strength = self.config.strength;
        if !(0.0..=1.0).contains(&strength) {
            return Err(StageFault::Dsp(format!(
                "noise strength {} outside 0.0..=1.0",
                strength
            )));
        }

        let samples = input.samples();
        let mut stft = Stft::new(self.config.fft_size, self.config.hop_length)?;
        let bins = stft.bins();
        let frames = stft.frame_count(samples.len());

        let threshold = self.noise_threshold(&mut stft, samples)?;
        let mask = Self::signal_mask(&mut stft, samples, &threshold)?;

        let (time_radius, freq_radius) = self.smoothing_radii(input.sample_rate());
        let time_kernel = triangle(time_radius);
        let freq_kernel = triangle(freq_radius);
        log::debug!(
            "noise gate: {} frames x {} bins, smoothing +/-{} frames +/-{} bins",
            frames,
            bins,
            time_radius,
            freq_radius
        );

        let mut column = vec![0.0f32; bins];
        let mut gated = stft.transform(samples, |frame, spectrum| {
            // Time smoothing of this frame's column
            let first = frame.saturating_sub(time_radius);
            let last = (frame + time_radius).min(frames - 1);
            column.iter_mut().for_each(|c| *c = 0.0);
            let mut weight = 0.0f32;
            for t in first..=last {
                let w = time_kernel[t + time_radius - frame];
                weight += w;
                let row = &mask[t * bins..(t + 1) * bins];
                for (c, &m) in column.iter_mut().zip(row) {
                    *c += w * m as f32;
                }
            }
            let time_norm = 1.0 / weight;

            // Frequency smoothing and gain
            for (bin, value) in spectrum.iter_mut().enumerate() {
                let lo = bin.saturating_sub(freq_radius);
                let hi = (bin + freq_radius).min(bins - 1);
                let mut acc = 0.0f32;
                let mut norm = 0.0f32;
                for b in lo..=hi {
                    let w = freq_kernel[b + freq_radius - bin];
                    acc += w * column[b];
                    norm += w;
                }
                let smoothed = acc / norm * time_norm;
                *value *= 1.0 - strength * (1.0 - smoothed);
            }
        })?;

        let boost = self.config.post_gate_boost;
        if boost != 1.0 {
            gated.iter_mut().for_each(|s| *s *= boost);
        }

        Ok(input.with_samples(gated)?)
    }
}
