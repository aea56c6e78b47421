//! Core audio types and structures

/// Waveform buffer and source description types
pub mod audio;

pub use audio::{SourceInfo, TARGET_SAMPLE_RATE, WaveformBuffer, db_to_linear, linear_to_db};
