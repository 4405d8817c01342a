//! # Recurrent Layers for Sequence Processing
//!
//! Layers that unroll the cells in [`crate::cells`] over the time axis of
//! a feature volume and manage their state.
//!
//! ## Available Layers
//!
//! | Layer | Description |
//! |-------|-------------|
//! | [`ConvLSTM`] | Stack of ConvLSTM cells, zero initial state |
//!
//! ## Tensor Shapes
//!
//! | Tensor | Shape |
//! |--------|-------|
//! | Input | `[batch, time, channels, height, width]` |
//! | Output | `[batch, time, last_hidden, height, width]` |
//! | State | one `[batch, hidden, height, width]` pair per cell |
//!
//! The spatial size is whatever the encoder produced; nothing here depends
//! on a fixed frame resolution.
//!
//! ## Example
//!
//! ```ignore
//! use stae::rnn::ConvLSTM;
//!
//! let stack = ConvLSTM::<Backend>::new(64, &[64, 32, 64], 3, &device);
//!
//! // [batch=4, time=10, channels=64, 26, 26]
//! let (output, final_state) = stack.forward(features, None);
//! // output: [4, 10, 64, 26, 26]
//! ```

pub mod conv_lstm;

pub use conv_lstm::{unroll, ConvLSTM};
