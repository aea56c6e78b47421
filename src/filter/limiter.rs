//! Look-ahead peak limiter

use crate::core::{WaveformBuffer, db_to_linear};
use crate::error::{AudioError, AudioResult};
use super::compressor::time_coeff;
use std::collections::VecDeque;

/// Offline look-ahead peak limiter.
///
/// Gain is derived from the whole buffer before it is applied:
/// 1. required gain per sample, `min(1, ceiling / |x|)`
/// 2. minimum of that over a window of `±lookahead` samples
/// 3. moving average over the same radius, which keeps every sample's
///    gain at or below its requirement while ramping smoothly into peaks
/// 4. one-pole release back towards unity
///
/// No output sample exceeds the ceiling.
#[derive(Debug, Clone)]
pub struct Limiter {
    ceiling: f32,
    lookahead: usize,
    release_coeff: f32,
    max_reduction: f32,
}

impl Limiter {
    /// Create a limiter
    pub fn new(
        sample_rate: u32,
        ceiling_db: f32,
        lookahead_ms: f32,
        release_ms: f32,
    ) -> AudioResult<Self> {
        if sample_rate == 0 {
            return Err(AudioError::InvalidSampleRate { rate: 0 });
        }
        if !ceiling_db.is_finite() || ceiling_db > 0.0 {
            return Err(AudioError::ConfigError(format!(
                "Limiter ceiling must be at or below 0 dBFS, got {}",
                ceiling_db
            )));
        }

        let lookahead = (lookahead_ms.max(0.0) * 0.001 * sample_rate as f32).round() as usize;

        Ok(Limiter {
            ceiling: db_to_linear(ceiling_db),
            lookahead,
            release_coeff: time_coeff(release_ms, sample_rate),
            max_reduction: 1.0,
        })
    }

    /// Linear ceiling
    pub fn ceiling(&self) -> f32 {
        self.ceiling
    }

    /// Smallest gain applied on the last buffer (1.0 means untouched)
    pub fn max_reduction(&self) -> f32 {
        self.max_reduction
    }

    fn required_gain(&self, samples: &[f32]) -> Vec<f32> {
        samples
            .iter()
            .map(|&s| {
                let level = s.abs();
                if level > self.ceiling {
                    self.ceiling / level
                } else {
                    1.0
                }
            })
            .collect()
    }

    /// Minimum over `[i - radius, i + radius]` using a monotonic deque
    fn window_min(values: &[f32], radius: usize) -> Vec<f32> {
        let n = values.len();
        let mut out = Vec::with_capacity(n);
        let mut deque: VecDeque<usize> = VecDeque::new();
        let mut next = 0;

        for i in 0..n {
            let hi = (i + radius).min(n - 1);
            while next <= hi {
                while let Some(&back) = deque.back() {
                    if values[back] >= values[next] {
                        deque.pop_back();
                    } else {
                        break;
                    }
                }
                deque.push_back(next);
                next += 1;
            }

            let lo = i.saturating_sub(radius);
            while let Some(&front) = deque.front() {
                if front < lo {
                    deque.pop_front();
                } else {
                    break;
                }
            }

            out.push(deque.front().map(|&idx| values[idx]).unwrap_or(1.0));
        }

        out
    }

    /// Mean over `[i - radius, i + radius]`; samples outside the buffer count as 1.0
    fn window_mean(values: &[f32], radius: usize) -> Vec<f32> {
        let n = values.len();
        let width = (2 * radius + 1) as f64;
        let value_at = |idx: isize| -> f64 {
            if idx < 0 || idx as usize >= n {
                1.0
            } else {
                values[idx as usize] as f64
            }
        };

        let r = radius as isize;
        let mut sum: f64 = (-r..=r).map(value_at).sum();
        let mut out = Vec::with_capacity(n);

        for i in 0..n as isize {
            out.push((sum / width) as f32);
            sum += value_at(i + r + 1) - value_at(i - r);
        }

        out
    }

    /// Compute the per-sample gain curve for `samples`
    pub fn gain_curve(&self, samples: &[f32]) -> Vec<f32> {
        if samples.is_empty() {
            return Vec::new();
        }

        let required = self.required_gain(samples);
        let floor = Self::window_min(&required, self.lookahead);
        let smoothed = Self::window_mean(&floor, self.lookahead);

        let mut gain = 1.0f32;
        smoothed
            .iter()
            .zip(&required)
            .map(|(&target, &req)| {
                gain = if target < gain {
                    target
                } else {
                    self.release_coeff * gain + (1.0 - self.release_coeff) * target
                };
                // Rounding in the running mean must never let a peak through
                gain = gain.min(req);
                gain
            })
            .collect()
    }
}

impl super::Filter for Limiter {
    fn process(&mut self, buffer: &WaveformBuffer) -> AudioResult<WaveformBuffer> {
        let gains = self.gain_curve(buffer.samples());
        self.max_reduction = gains.iter().copied().fold(1.0f32, f32::min);

        let ceiling = self.ceiling;
        let samples = buffer
            .samples()
            .iter()
            .zip(&gains)
            .map(|(&s, &g)| (s * g).clamp(-ceiling, ceiling))
            .collect();

        buffer.with_samples(samples)
    }
}
