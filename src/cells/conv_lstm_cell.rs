use burn::module::{Module, Param};
use burn::tensor::activation;
use burn::tensor::backend::Backend;
use burn::tensor::Tensor;

use super::RecurrentCell;
use crate::layers::im2col::convolve;
use crate::layers::init::{constant_bias, glorot_uniform, l2_loss};

/// Hidden and cell state of a [`ConvLSTMCell`], each `[batch, hidden, height, width]`.
#[derive(Debug, Clone)]
pub struct ConvLSTMState<B: Backend> {
    pub hidden: Tensor<B, 4>,
    pub cell: Tensor<B, 4>,
}

impl<B: Backend> ConvLSTMState<B> {
    /// All-zero state for a batch of `[height, width]` feature maps.
    pub fn zeros(batch: usize, channels: usize, spatial: [usize; 2], device: &B::Device) -> Self {
        let shape = [batch, channels, spatial[0], spatial[1]];
        Self {
            hidden: Tensor::zeros(shape, device),
            cell: Tensor::zeros(shape, device),
        }
    }
}

/// Convolutional LSTM cell
///
/// The LSTM equations with every matrix product replaced by a same-padded
/// convolution over the concatenation of input and previous hidden state:
/// - z = conv([x, h]) + b, split into i, f, o, g along channels
/// - i = sigmoid(i), f = sigmoid(f + forget_bias), o = sigmoid(o), g = tanh(g)
/// - c' = f * c + i * g
/// - h' = o * tanh(c')
///
/// Spatial size is preserved, so the state shape follows whatever feature
/// map the cell is fed.
#[derive(Module, Debug)]
pub struct ConvLSTMCell<B: Backend> {
    /// `[4 * hidden, input + hidden, kernel, kernel]`
    weight: Param<Tensor<B, 4>>,
    bias: Param<Tensor<B, 1>>,
    #[module(skip)]
    input_channels: usize,
    #[module(skip)]
    hidden_channels: usize,
    #[module(skip)]
    kernel_size: usize,
    #[module(skip)]
    forget_bias: f64,
}

impl<B: Backend> ConvLSTMCell<B> {
    /// Create a new ConvLSTM cell
    ///
    /// # Arguments
    /// * `input_channels` - Channels of the incoming feature map
    /// * `hidden_channels` - Channels of the hidden and cell state
    /// * `kernel_size` - Odd side of the square gate kernel
    /// * `device` - Device to create the module on
    pub fn new(
        input_channels: usize,
        hidden_channels: usize,
        kernel_size: usize,
        device: &B::Device,
    ) -> Self {
        let in_total = input_channels + hidden_channels;
        let area = kernel_size * kernel_size;
        let weight = glorot_uniform(
            [4 * hidden_channels, in_total, kernel_size, kernel_size],
            in_total * area,
            4 * hidden_channels * area,
            device,
        );

        Self {
            weight,
            bias: constant_bias(4 * hidden_channels, 0.01, device),
            input_channels,
            hidden_channels,
            kernel_size,
            forget_bias: 1.0,
        }
    }

    /// Set the initial value of the gate bias (default: 0.01)
    pub fn with_bias_init(mut self, value: f64) -> Self {
        let device = self.bias.val().device();
        self.bias = constant_bias(4 * self.hidden_channels, value, &device);
        self
    }

    /// Set the constant added to the forget gate (default: 1.0)
    pub fn with_forget_bias(mut self, forget_bias: f64) -> Self {
        self.forget_bias = forget_bias;
        self
    }

    pub fn input_channels(&self) -> usize {
        self.input_channels
    }

    pub fn hidden_channels(&self) -> usize {
        self.hidden_channels
    }

    pub fn kernel_size(&self) -> usize {
        self.kernel_size
    }

    /// Perform one timestep
    ///
    /// # Arguments
    /// * `input` - `[batch, input_channels, height, width]`
    /// * `state` - previous hidden and cell state
    ///
    /// # Returns
    /// The new state; its hidden map is the cell's output.
    pub fn forward(&self, input: Tensor<B, 4>, state: ConvLSTMState<B>) -> ConvLSTMState<B> {
        let ConvLSTMState { hidden, cell } = state;
        let pad = self.kernel_size / 2;

        let combined = Tensor::cat(vec![input, hidden], 1);
        let z = convolve(combined, self.weight.val(), self.bias.val(), 1, pad);

        // Split into 4 gates
        let chunks = z.chunk(4, 1);
        let input_gate = activation::sigmoid(chunks[0].clone());
        let forget_gate = activation::sigmoid(chunks[1].clone() + self.forget_bias);
        let output_gate = activation::sigmoid(chunks[2].clone());
        let candidate = chunks[3].clone().tanh();

        let new_cell = forget_gate * cell + input_gate * candidate;
        let new_hidden = output_gate * new_cell.clone().tanh();

        ConvLSTMState {
            hidden: new_hidden,
            cell: new_cell,
        }
    }

    /// Half the squared norm of the gate filter.
    pub fn l2_loss(&self) -> Tensor<B, 1> {
        l2_loss(self.weight.val())
    }
}

impl<B: Backend> RecurrentCell<B> for ConvLSTMCell<B> {
    type State = ConvLSTMState<B>;

    fn output_channels(&self) -> usize {
        self.hidden_channels
    }

    fn zero_state(&self, batch: usize, spatial: [usize; 2], device: &B::Device) -> Self::State {
        ConvLSTMState::zeros(batch, self.hidden_channels, spatial, device)
    }

    fn step(&self, input: Tensor<B, 4>, state: Self::State) -> (Tensor<B, 4>, Self::State) {
        let state = self.forward(input, state);
        (state.hidden.clone(), state)
    }
}
