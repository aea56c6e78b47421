//! Per-run pipeline tunables

use crate::error::{AudioError, AudioResult};
use crate::encoder::OutputFormat;
use std::time::Duration;

/// Reference level the silence trimmer measures frame energy against
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrimReference {
    /// 0 dB is a full-scale RMS of 1.0
    FullScale,
    /// 0 dB is the loudest frame in the buffer
    Peak,
}

/// Silence trimmer settings
#[derive(Debug, Clone, PartialEq)]
pub struct TrimConfig {
    /// Frames at or below this level (dB) count as silence
    pub threshold_db: f32,
    /// What 0 dB refers to
    pub reference: TrimReference,
    /// Analysis frame length in samples
    pub frame_length: usize,
    /// Hop between frames in samples
    pub hop_length: usize,
}

impl Default for TrimConfig {
    fn default() -> Self {
        TrimConfig {
            threshold_db: -25.0,
            reference: TrimReference::FullScale,
            frame_length: 2048,
            hop_length: 512,
        }
    }
}

/// Noise reducer settings
#[derive(Debug, Clone, PartialEq)]
pub struct NoiseConfig {
    /// Suppression strength, 0.0 (off) to 1.0 (full gating)
    pub strength: f32,
    /// Noise-floor threshold in standard deviations above the per-bin mean
    pub threshold_std: f32,
    /// FFT size of the analysis frames
    pub fft_size: usize,
    /// Hop between analysis frames
    pub hop_length: usize,
    /// Mask smoothing span across frequency (Hz, each side)
    pub freq_smooth_hz: f32,
    /// Mask smoothing span across time (ms, each side)
    pub time_smooth_ms: f32,
    /// Linear gain applied after gating
    pub post_gate_boost: f32,
}

impl Default for NoiseConfig {
    fn default() -> Self {
        NoiseConfig {
            strength: 0.65,
            threshold_std: 1.5,
            fft_size: 2048,
            hop_length: 512,
            freq_smooth_hz: 500.0,
            time_smooth_ms: 50.0,
            post_gate_boost: 1.0,
        }
    }
}

/// Compressor settings
#[derive(Debug, Clone, PartialEq)]
pub struct CompressorConfig {
    /// Threshold in dBFS
    pub threshold_db: f32,
    /// Compression ratio (4.0 means 4:1)
    pub ratio: f32,
    /// Attack time in milliseconds
    pub attack_ms: f32,
    /// Release time in milliseconds
    pub release_ms: f32,
}

impl Default for CompressorConfig {
    fn default() -> Self {
        CompressorConfig {
            threshold_db: -18.0,
            ratio: 4.0,
            attack_ms: 5.0,
            release_ms: 120.0,
        }
    }
}

/// Highpass, compressor and high-shelf settings
#[derive(Debug, Clone, PartialEq)]
pub struct ToneConfig {
    /// Highpass cutoff in Hz
    pub highpass_hz: f32,
    /// Compressor parameters
    pub compressor: CompressorConfig,
    /// High-shelf gain in dB
    pub shelf_gain_db: f32,
    /// High-shelf corner frequency in Hz
    pub shelf_cutoff_hz: f32,
}

impl Default for ToneConfig {
    fn default() -> Self {
        ToneConfig {
            highpass_hz: 80.0,
            compressor: CompressorConfig::default(),
            shelf_gain_db: 3.0,
            shelf_cutoff_hz: 10_000.0,
        }
    }
}

/// Final limiter settings
#[derive(Debug, Clone, PartialEq)]
pub struct LimiterConfig {
    /// Absolute peak ceiling in dBFS
    pub ceiling_db: f32,
    /// Look-ahead radius in milliseconds
    pub lookahead_ms: f32,
    /// Release time in milliseconds
    pub release_ms: f32,
}

impl Default for LimiterConfig {
    fn default() -> Self {
        LimiterConfig {
            ceiling_db: -1.0,
            lookahead_ms: 5.0,
            release_ms: 100.0,
        }
    }
}

/// Source separator settings
#[derive(Debug, Clone, PartialEq)]
pub struct SeparatorConfig {
    /// Upper bound for the whole separation stage
    pub timeout: Duration,
    /// Length of the chunks handed to the separator
    pub segment: Duration,
}

impl Default for SeparatorConfig {
    fn default() -> Self {
        SeparatorConfig {
            timeout: Duration::from_secs(120),
            segment: Duration::from_secs(30),
        }
    }
}

/// Immutable per-run configuration. Every field is independently
/// overridable; `Default` carries the broadcast-voice preset.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    /// Source separator
    pub separator: SeparatorConfig,
    /// Silence trimmer
    pub trim: TrimConfig,
    /// Noise reducer
    pub noise: NoiseConfig,
    /// Dynamics & tone shaper
    pub tone: ToneConfig,
    /// Target integrated loudness in LUFS
    pub target_lufs: f32,
    /// Final limiter
    pub limiter: LimiterConfig,
    /// Sample format of the encoded WAV
    pub output_format: OutputFormat,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        PipelineConfig {
            separator: SeparatorConfig::default(),
            trim: TrimConfig::default(),
            noise: NoiseConfig::default(),
            tone: ToneConfig::default(),
            target_lufs: -16.0,
            limiter: LimiterConfig::default(),
            output_format: OutputFormat::Float32,
        }
    }
}

fn config_error(msg: String) -> AudioError {
    AudioError::ConfigError(msg)
}

fn require_finite(name: &str, value: f32) -> AudioResult<()> {
    if !value.is_finite() {
        return Err(config_error(format!("{} must be finite, got {}", name, value)));
    }
    Ok(())
}

impl PipelineConfig {
    /// Check every tunable for a usable value
    pub fn validate(&self) -> AudioResult<()> {
        if self.separator.timeout.is_zero() {
            return Err(config_error("Separator timeout must be non-zero".to_string()));
        }
        if self.separator.segment.is_zero() {
            return Err(config_error("Separator segment length must be non-zero".to_string()));
        }

        let trim = &self.trim;
        require_finite("Trim threshold", trim.threshold_db)?;
        if trim.threshold_db > 0.0 {
            return Err(config_error(format!(
                "Trim threshold must be at or below 0 dB, got {}",
                trim.threshold_db
            )));
        }
        if trim.frame_length == 0 || trim.hop_length == 0 {
            return Err(config_error("Trim frame and hop length must be non-zero".to_string()));
        }

        let noise = &self.noise;
        require_finite("Noise strength", noise.strength)?;
        if !(0.0..=1.0).contains(&noise.strength) {
            return Err(config_error(format!(
                "Noise strength must be between 0.0 and 1.0, got {}",
                noise.strength
            )));
        }
        require_finite("Noise threshold", noise.threshold_std)?;
        if noise.fft_size < 16 || !noise.fft_size.is_power_of_two() {
            return Err(config_error(format!(
                "Noise FFT size must be a power of two of at least 16, got {}",
                noise.fft_size
            )));
        }
        if noise.hop_length == 0 || noise.hop_length > noise.fft_size / 2 {
            return Err(config_error(format!(
                "Noise hop length must be between 1 and half the FFT size, got {}",
                noise.hop_length
            )));
        }
        require_finite("Frequency smoothing", noise.freq_smooth_hz)?;
        require_finite("Time smoothing", noise.time_smooth_ms)?;
        if noise.freq_smooth_hz < 0.0 || noise.time_smooth_ms < 0.0 {
            return Err(config_error("Mask smoothing spans must not be negative".to_string()));
        }
        require_finite("Post-gate boost", noise.post_gate_boost)?;
        if noise.post_gate_boost <= 0.0 {
            return Err(config_error(format!(
                "Post-gate boost must be positive, got {}",
                noise.post_gate_boost
            )));
        }

        let tone = &self.tone;
        require_finite("Highpass cutoff", tone.highpass_hz)?;
        require_finite("Shelf cutoff", tone.shelf_cutoff_hz)?;
        require_finite("Shelf gain", tone.shelf_gain_db)?;
        if tone.highpass_hz <= 0.0 || tone.shelf_cutoff_hz <= 0.0 {
            return Err(config_error("Filter cutoffs must be positive".to_string()));
        }
        let comp = &tone.compressor;
        require_finite("Compressor threshold", comp.threshold_db)?;
        if comp.threshold_db > 0.0 {
            return Err(config_error(format!(
                "Compressor threshold must be at or below 0 dB, got {}",
                comp.threshold_db
            )));
        }
        if !(comp.ratio >= 1.0) {
            return Err(config_error(format!(
                "Compressor ratio must be at least 1.0, got {}",
                comp.ratio
            )));
        }
        if !(comp.attack_ms > 0.0) || !(comp.release_ms > 0.0) {
            return Err(config_error("Compressor attack and release must be positive".to_string()));
        }

        require_finite("Target loudness", self.target_lufs)?;
        if !(-70.0..=0.0).contains(&self.target_lufs) {
            return Err(config_error(format!(
                "Target loudness must be between -70 and 0 LUFS, got {}",
                self.target_lufs
            )));
        }

        let limiter = &self.limiter;
        require_finite("Limiter ceiling", limiter.ceiling_db)?;
        if limiter.ceiling_db > 0.0 {
            return Err(config_error(format!(
                "Limiter ceiling must be at or below 0 dBFS, got {}",
                limiter.ceiling_db
            )));
        }
        if !(limiter.lookahead_ms >= 0.0) || !(limiter.release_ms > 0.0) {
            return Err(config_error(
                "Limiter look-ahead must be non-negative and release positive".to_string(),
            ));
        }

        Ok(())
    }
}
