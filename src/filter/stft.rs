//! Short-time Fourier transform with weighted overlap-add resynthesis

use crate::error::{AudioError, AudioResult};
use realfft::num_complex::Complex;
use realfft::{ComplexToReal, RealFftPlanner, RealToComplex};
use std::sync::Arc;

/// Centred STFT over a mono signal, periodic Hann window
pub struct Stft {
    fft_size: usize,
    hop_size: usize,
    window: Vec<f32>,
    forward: Arc<dyn RealToComplex<f32>>,
    inverse: Arc<dyn ComplexToReal<f32>>,
    time_scratch: Vec<f32>,
    spectrum: Vec<Complex<f32>>,
}

impl Stft {
    /// Create a transform; `hop_size` must not exceed half of `fft_size`
    pub fn new(fft_size: usize, hop_size: usize) -> AudioResult<Self> {
        if fft_size < 2 || hop_size == 0 || hop_size > fft_size / 2 {
            return Err(AudioError::ConfigError(format!(
                "Invalid STFT layout: fft {} hop {}",
                fft_size, hop_size
            )));
        }

        let mut planner = RealFftPlanner::<f32>::new();
        let forward = planner.plan_fft_forward(fft_size);
        let inverse = planner.plan_fft_inverse(fft_size);

        let window: Vec<f32> = (0..fft_size)
            .map(|i| 0.5 * (1.0 - (2.0 * std::f32::consts::PI * i as f32 / fft_size as f32).cos()))
            .collect();

        let time_scratch = forward.make_input_vec();
        let spectrum = forward.make_output_vec();

        Ok(Stft {
            fft_size,
            hop_size,
            window,
            forward,
            inverse,
            time_scratch,
            spectrum,
        })
    }

    /// Number of frequency bins per frame
    pub fn bins(&self) -> usize {
        self.fft_size / 2 + 1
    }

    /// Number of frames produced for a signal of `len` samples
    pub fn frame_count(&self, len: usize) -> usize {
        if len == 0 { 0 } else { 1 + len / self.hop_size }
    }

    /// Signal zero-padded by half a frame on each side
    fn pad(&self, samples: &[f32]) -> Vec<f32> {
        let pad = self.fft_size / 2;
        let mut padded = vec![0.0f32; samples.len() + 2 * pad];
        padded[pad..pad + samples.len()].copy_from_slice(samples);
        padded
    }

    fn forward_frame(&mut self, padded: &[f32], start: usize) -> AudioResult<()> {
        for (i, slot) in self.time_scratch.iter_mut().enumerate() {
            *slot = padded[start + i] * self.window[i];
        }
        self.forward
            .process(&mut self.time_scratch, &mut self.spectrum)
            .map_err(|e| AudioError::ProcessingError(format!("forward fft: {}", e)))
    }

    /// Visit the spectrum of every frame in order
    pub fn analyze<F>(&mut self, samples: &[f32], mut visit: F) -> AudioResult<usize>
    where
        F: FnMut(usize, &[Complex<f32>]),
    {
        let frames = self.frame_count(samples.len());
        let padded = self.pad(samples);

        for index in 0..frames {
            self.forward_frame(&padded, index * self.hop_size)?;
            visit(index, &self.spectrum);
        }

        Ok(frames)
    }

    /// Modify every frame's spectrum and resynthesize a signal of the same length
    pub fn transform<F>(&mut self, samples: &[f32], mut modify: F) -> AudioResult<Vec<f32>>
    where
        F: FnMut(usize, &mut [Complex<f32>]),
    {
        if samples.is_empty() {
            return Ok(Vec::new());
        }

        let frames = self.frame_count(samples.len());
        let padded = self.pad(samples);
        let pad = self.fft_size / 2;

        let mut output = vec![0.0f32; padded.len()];
        let mut window_sum = vec![0.0f32; padded.len()];
        let norm = 1.0 / self.fft_size as f32;
        let last = self.spectrum.len() - 1;

        for index in 0..frames {
            let start = index * self.hop_size;
            self.forward_frame(&padded, start)?;
            modify(index, &mut self.spectrum);

            // The inverse real FFT requires purely real DC and Nyquist bins
            self.spectrum[0].im = 0.0;
            self.spectrum[last].im = 0.0;

            self.inverse
                .process(&mut self.spectrum, &mut self.time_scratch)
                .map_err(|e| AudioError::ProcessingError(format!("inverse fft: {}", e)))?;

            for i in 0..self.fft_size {
                let w = self.window[i];
                output[start + i] += self.time_scratch[i] * norm * w;
                window_sum[start + i] += w * w;
            }
        }

        Ok((pad..pad + samples.len())
            .map(|i| {
                if window_sum[i] > 1e-6 {
                    output[i] / window_sum[i]
                } else {
                    0.0
                }
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::PI;

    #[test]
    fn test_invalid_layout() {
        assert!(Stft::new(2048, 0).is_err());
        assert!(Stft::new(2048, 2048).is_err());
    }

    #[test]
    fn test_frame_count() {
        let stft = Stft::new(1024, 256).unwrap();
        assert_eq!(stft.frame_count(0), 0);
        assert_eq!(stft.frame_count(1000), 4);
        assert_eq!(stft.bins(), 513);
    }

    #[test]
    fn test_identity_reconstruction() {
        let mut stft = Stft::new(1024, 256).unwrap();
        let input: Vec<f32> = (0..5000)
            .map(|i| 0.5 * (2.0 * PI * 330.0 * i as f32 / 44100.0).sin() + 0.1 * ((i % 7) as f32 - 3.0) / 3.0)
            .collect();

        let output = stft.transform(&input, |_, _| {}).unwrap();
        assert_eq!(output.len(), input.len());
        for (a, b) in input.iter().zip(&output) {
            assert!((a - b).abs() < 1e-4);
        }
    }

    #[test]
    fn test_analyze_sees_tone_bin() {
        let mut stft = Stft::new(1024, 256).unwrap();
        // Exactly on bin 32
        let freq = 32.0 * 44100.0 / 1024.0;
        let input: Vec<f32> = (0..8192)
            .map(|i| (2.0 * PI * freq * i as f32 / 44100.0).sin())
            .collect();

        let mut peak_bins = Vec::new();
        stft.analyze(&input, |index, spectrum| {
            if index > 2 && index < 20 {
                let (bin, _) = spectrum
                    .iter()
                    .enumerate()
                    .fold((0, 0.0f32), |acc, (i, c)| if c.norm() > acc.1 { (i, c.norm()) } else { acc });
                peak_bins.push(bin);
            }
        })
        .unwrap();

        assert!(peak_bins.iter().all(|&b| b == 32));
    }

    #[test]
    fn test_short_signal() {
        let mut stft = Stft::new(2048, 512).unwrap();
        let input = vec![0.25f32; 100];
        let output = stft.transform(&input, |_, _| {}).unwrap();
        assert_eq!(output.len(), 100);
        assert!(output.iter().all(|s| (s - 0.25).abs() < 1e-4));
    }
}
