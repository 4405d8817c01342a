//! # Recurrent Cell Implementations
//!
//! Single-timestep recurrent cells over spatial feature maps. The stack in
//! [`crate::rnn`] unrolls them over the time axis of a video volume.
//!
//! ## Cell Types
//!
//! | Cell | Description |
//! |------|-------------|
//! | [`ConvLSTMCell`] | LSTM with convolutional gates, spatial size preserved |
//!
//! ## Tensor Shapes
//!
//! | Tensor | Shape | Description |
//! |--------|-------|-------------|
//! | `input` | `[batch, input_channels, height, width]` | One frame's features |
//! | `hidden` | `[batch, hidden_channels, height, width]` | Previous output |
//! | `cell` | `[batch, hidden_channels, height, width]` | Previous memory |
//!
//! ## Gate Equations
//!
//! ```text
//! i, f, o, g = split(conv([x, h]) + b)
//! c' = σ(f + forget_bias) × c + σ(i) × tanh(g)
//! h' = σ(o) × tanh(c')
//! ```
//!
//! ## Example
//!
//! ```ignore
//! use stae::cells::{ConvLSTMCell, RecurrentCell};
//!
//! let cell = ConvLSTMCell::<Backend>::new(64, 32, 3, &device);
//! let state = cell.zero_state(batch, [26, 26], &device);
//! let (output, state) = cell.step(frame_features, state);
//! // output: [batch, 32, 26, 26]
//! ```

use burn::tensor::backend::Backend;
use burn::tensor::Tensor;

pub mod conv_lstm_cell;

pub use conv_lstm_cell::{ConvLSTMCell, ConvLSTMState};

/// A cell that advances a spatial recurrent state by one timestep.
pub trait RecurrentCell<B: Backend> {
    /// Carried between timesteps.
    type State: Clone;

    /// Channels of the per-step output.
    fn output_channels(&self) -> usize;

    /// Initial state for a batch of `[height, width]` maps.
    fn zero_state(&self, batch: usize, spatial: [usize; 2], device: &B::Device) -> Self::State;

    /// Consume one `[batch, channels, height, width]` input.
    fn step(&self, input: Tensor<B, 4>, state: Self::State) -> (Tensor<B, 4>, Self::State);
}
