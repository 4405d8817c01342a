//! # STAE - Spatio-Temporal Autoencoder (Rust)
//!
//! Convolutional LSTM autoencoder for video anomaly detection, built on the
//! Burn framework. The network learns to reconstruct short clips of normal
//! footage; the per-frame reconstruction error of an unseen clip serves as
//! its anomaly score.
//!
//! ## Features
//!
//! - **Spatial encoder**: two strided convolutions with batch norm and tanh, per frame
//! - **Temporal stack**: three ConvLSTM cells unrolled over the clip
//! - **Spatial decoder**: transposed convolutions sized from a recorded shape ledger
//! - **Explicit phase**: batch-norm statistics chosen per call, never global state
//! - **Two streams**: re-iterable training data, exhaustible evaluation data
//! - **Checkpoints**: parameters, running statistics, Adam moments and config
//!
//! ## Quick Start
//!
//! ```rust
//! use stae::prelude::*;
//!
//! // channels, frames per clip, clips per batch, learning rate, lambda
//! let config = AutoencoderConfig::new(1, 10, 4, 1e-4, 1e-5);
//! assert!(config.validate().is_ok());
//!
//! // 227x227 frames are encoded to 26x26 feature maps
//! assert_eq!(config.architecture.encoded_size(227, 227), Some([26, 26]));
//! ```
//!
//! ## Training
//!
//! ```ignore
//! use burn::backend::{Autodiff, NdArray};
//! use stae::prelude::*;
//!
//! type Backend = Autodiff<NdArray<f32>>;
//!
//! let data = VolumeDataset::new(train_volumes, test_volumes, 4)?;
//! let mut autoencoder = SpatioTemporalAutoencoder::<Backend, _>::new(config, data, &device)?;
//!
//! let loss = autoencoder.train_step()?;
//! while let Some(errors) = autoencoder.per_pixel_and_per_frame_errors()? {
//!     // errors.per_frame: [batch, time]
//! }
//! ```

pub mod autoencoder;
pub mod cells;
pub mod config;
pub mod data;
pub mod error;
pub mod layers;
pub mod model;
pub mod rnn;

pub use autoencoder::SpatioTemporalAutoencoder;
pub use error::{AutoencoderError, Result};

pub mod prelude {
    pub use crate::autoencoder::SpatioTemporalAutoencoder;
    pub use crate::cells::{ConvLSTMCell, ConvLSTMState, RecurrentCell};
    pub use crate::config::{ArchitectureConfig, AutoencoderConfig};
    pub use crate::data::{Stream, VideoSource, VolumeDataset};
    pub use crate::error::{AutoencoderError, Result};
    pub use crate::layers::Phase;
    pub use crate::model::{AutoencoderNet, ReconstructionErrors, ShapeLedger};
    pub use crate::rnn::ConvLSTM;
}
