//! Error types for the autoencoder
//!
//! Evaluation-stream exhaustion is not represented here: evaluation calls
//! return `Ok(None)` when the stream runs dry.

use std::path::PathBuf;

use burn::config::ConfigError;
use burn::record::RecorderError;
use thiserror::Error;

/// Errors raised while building, feeding, or persisting the autoencoder.
#[derive(Debug, Error)]
pub enum AutoencoderError {
    /// A configuration value is out of range.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// A batch does not match the configured volume layout.
    #[error(
        "batch shape {actual:?} does not match expected \
         [batch={batch}, time={time}, _, _, channels={channels}]"
    )]
    ShapeMismatch {
        actual: [usize; 5],
        batch: usize,
        time: usize,
        channels: usize,
    },

    /// Frames are smaller than the spatial encoder's receptive field.
    #[error("frames of {height}x{width} are too small for the spatial encoder")]
    FrameTooSmall { height: usize, width: usize },

    /// The training stream produced no batch.
    #[error("training stream produced no batch; it must be unbounded")]
    TrainingStreamExhausted,

    /// Filesystem failure while writing or reading a checkpoint.
    #[error("checkpoint I/O failed at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Burn recorder failure while writing or reading a checkpoint.
    #[error("checkpoint record failed at {path}: {source}")]
    Record {
        path: PathBuf,
        #[source]
        source: RecorderError,
    },

    /// The stored configuration could not be parsed.
    #[error("checkpoint configuration unreadable: {0}")]
    Config(#[from] ConfigError),

    /// The checkpoint was produced by a different architecture.
    #[error("incompatible checkpoint: {0}")]
    IncompatibleCheckpoint(String),
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, AutoencoderError>;
