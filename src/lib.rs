#![warn(missing_docs)]

//! # voxpolish: voice recording enhancement
//!
//! Turns an arbitrary recording into a mono 44.1 kHz WAV ready for speech
//! delivery. The chain runs in a fixed order:
//!
//! 1. **Ingest** - decode (symphonia), downmix, resample (rubato)
//! 2. **Source separation** - optional, pluggable, time-bounded
//! 3. **Silence trimming** - leading and trailing only
//! 4. **Noise reduction** - stationary spectral gating
//! 5. **Dynamics & tone** - 80 Hz highpass, 4:1 compressor, +3 dB air shelf
//! 6. **Loudness** - EBU R128 integrated loudness to -16 LUFS
//! 7. **Limiting** - look-ahead peak ceiling at -1 dBFS
//!
//! Only ingest and encoding can fail a run. Every other stage falls back
//! to its input and records why in the [`PipelineResult`].
//!
//! ## Quick Start
//!
//! ```no_run
//! use voxpolish::{PipelineConfig, enhance};
//!
//! let bytes = std::fs::read("interview.mp3")?;
//! let wav = enhance(&bytes, "mp3", &PipelineConfig::default())?;
//! std::fs::write("interview.enhanced.wav", wav)?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

/// Core audio types
pub mod core;
/// Error types
pub mod error;
/// Per-run configuration
pub mod config;
/// Audio decoder implementations
pub mod decoder;
/// Audio encoder implementations
pub mod encoder;
/// DSP building blocks
pub mod filter;
/// Pipeline stages
pub mod stage;
/// Source separation capability
pub mod separator;
/// Orchestration
pub mod processor;

pub use config::PipelineConfig;
pub use core::{SourceInfo, TARGET_SAMPLE_RATE, WaveformBuffer};
pub use encoder::OutputFormat;
pub use error::{AudioError, AudioResult, EnhanceError, Phase, StageFault};
pub use processor::{
    Pipeline, PipelineResult, PipelineState, StageReport, StageStatus, enhance,
    enhance_with_separator,
};
pub use separator::{Cancellation, CommandSeparator, SeparationError, SourceSeparator};
pub use stage::{StageKind, StageOutcome};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
