use std::io;
use std::time::Duration;
use thiserror::Error;

/// Result type for audio operations
pub type AudioResult<T> = Result<T, AudioError>;

/// Result type for a single pipeline stage
pub type StageResult<T> = Result<T, StageFault>;

/// Low-level error types for decoding, encoding and DSP building blocks
#[derive(Error, Debug)]
pub enum AudioError {
    /// IO error (file operations, disk access)
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Unsupported audio format
    #[error("Unsupported audio format: {0}")]
    UnsupportedFormat(String),

    /// Invalid audio metadata
    #[error("Invalid audio metadata: {0}")]
    InvalidMetadata(String),

    /// Decoding failed
    #[error("Decode error: {0}")]
    DecodeError(String),

    /// Encoding failed
    #[error("Encode error: {0}")]
    EncodeError(String),

    /// Resampling operation failed
    #[error("Resampling error: {0}")]
    ResamplingError(String),

    /// Invalid channel configuration
    #[error("Invalid channel configuration: expected {expected}, got {got}")]
    InvalidChannels {
        /// Expected number of channels
        expected: u32,
        /// Got number of channels
        got: u32,
    },

    /// Invalid sample rate
    #[error("Invalid sample rate: {rate}")]
    InvalidSampleRate {
        /// The invalid sample rate
        rate: u32,
    },

    /// Buffer-related error
    #[error("Buffer error: {0}")]
    BufferError(String),

    /// Segmentation operation failed
    #[error("Segmentation error: {0}")]
    SegmentationError(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Audio processing error
    #[error("Processing error: {0}")]
    ProcessingError(String),
}

impl From<symphonia::core::errors::Error> for AudioError {
    fn from(err: symphonia::core::errors::Error) -> Self {
        AudioError::DecodeError(err.to_string())
    }
}

impl From<hound::Error> for AudioError {
    fn from(err: hound::Error) -> Self {
        match err {
            hound::Error::IoError(e) => AudioError::Io(e),
            e => AudioError::EncodeError(e.to_string()),
        }
    }
}

/// Why a degradable stage handed its input through unchanged
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StageFault {
    /// An optional capability is not installed
    #[error("capability unavailable: {0}")]
    Unavailable(String),

    /// An external invocation exceeded its time budget
    #[error("timed out after {0:?}")]
    Timeout(Duration),

    /// Too little audio for the measurement the stage needs
    #[error("buffer too short: {frames} frames, need at least {required}")]
    TooShort {
        /// Frames available
        frames: usize,
        /// Frames required
        required: usize,
    },

    /// Input carries no measurable signal
    #[error("input is silent")]
    Silent,

    /// The DSP chain could not be built or run
    #[error("dsp failure: {0}")]
    Dsp(String),

    /// The stage produced output that breaks a buffer invariant
    #[error("invariant violated: {0}")]
    InvariantViolation(String),

    /// The stage panicked; caught at the stage boundary
    #[error("stage panicked: {0}")]
    Panicked(String),
}

impl From<AudioError> for StageFault {
    fn from(err: AudioError) -> Self {
        StageFault::Dsp(err.to_string())
    }
}

/// Phase of a run that produced an [`EnhanceError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Configuration validation, before any audio is touched
    Config,
    /// Decode and normalization of the caller's input
    Ingest,
    /// Serialization of the final buffer
    Encode,
}

impl Phase {
    /// Short lower-case name
    pub fn name(&self) -> &'static str {
        match self {
            Phase::Config => "config",
            Phase::Ingest => "ingest",
            Phase::Encode => "encode",
        }
    }
}

/// Errors that escape an enhancement run
#[derive(Error, Debug)]
pub enum EnhanceError {
    /// Input could not be decoded or normalized; no output exists
    #[error("ingest failed: {0}")]
    FatalIngest(#[source] AudioError),

    /// The final buffer could not be serialized
    #[error("encoding failed: {0}")]
    Encoding(#[source] AudioError),

    /// The caller supplied an invalid configuration
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl EnhanceError {
    /// Which phase of the run failed
    pub fn phase(&self) -> Phase {
        match self {
            EnhanceError::FatalIngest(_) => Phase::Ingest,
            EnhanceError::Encoding(_) => Phase::Encode,
            EnhanceError::InvalidConfig(_) => Phase::Config,
        }
    }
}
