//! # Network
//!
//! | Component | Role |
//! |-----------|------|
//! | [`SpatialEncoder`] | per-frame strided convolutions, records a [`ShapeLedger`] |
//! | [`ConvLSTM`](crate::rnn::ConvLSTM) | recurrence over the time axis |
//! | [`SpatialDecoder`] | per-frame transposed convolutions sized from the ledger |
//! | [`AutoencoderNet`] | the three composed, `[B, T, H, W, C]` in and out |
//! | [`ReconstructionErrors`], [`Objective`] | error maps and loss terms |

pub mod decoder;
pub mod encoder;
pub mod loss;
pub mod network;

pub use decoder::SpatialDecoder;
pub use encoder::{ShapeLedger, SpatialEncoder};
pub use loss::{Objective, ReconstructionErrors};
pub use network::AutoencoderNet;
