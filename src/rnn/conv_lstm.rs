//! Stacked ConvLSTM layer
//!
//! Unrolls a stack of [`ConvLSTMCell`]s over the time axis of a feature
//! volume. Every sequence starts from an all-zero state.

use crate::cells::{ConvLSTMCell, ConvLSTMState, RecurrentCell};
use burn::module::Module;
use burn::tensor::backend::Backend;
use burn::tensor::Tensor;

/// Run `cell` over every timestep of `[batch, time, channels, height, width]`.
///
/// Returns the per-step outputs stacked on the time axis and the final state.
pub fn unroll<B: Backend, C: RecurrentCell<B>>(
    cell: &C,
    input: Tensor<B, 5>,
    state: Option<C::State>,
) -> (Tensor<B, 5>, C::State) {
    let [batch_size, seq_len, _, height, width] = input.dims();
    let device = input.device();

    let mut current_state =
        state.unwrap_or_else(|| cell.zero_state(batch_size, [height, width], &device));
    let mut outputs: Vec<Tensor<B, 4>> = Vec::with_capacity(seq_len);

    for t in 0..seq_len {
        // input[batch, t, channels, h, w] -> [batch, channels, h, w]
        let step_input = input.clone().narrow(1, t, 1).squeeze(1);

        let (output, new_state) = cell.step(step_input, current_state);
        current_state = new_state;
        outputs.push(output);
    }

    (Tensor::stack(outputs, 1), current_state)
}

/// Stack of ConvLSTM cells, shallowest first.
///
/// At each timestep the frame's features pass through every cell in order;
/// the deepest cell's hidden map is the stack's output for that step.
#[derive(Module, Debug)]
pub struct ConvLSTM<B: Backend> {
    cells: Vec<ConvLSTMCell<B>>,
    #[module(skip)]
    input_channels: usize,
}

impl<B: Backend> ConvLSTM<B> {
    /// Create a new ConvLSTM stack
    ///
    /// # Arguments
    /// * `input_channels` - Channels of the incoming feature maps
    /// * `hidden_channels` - Hidden width of each cell, shallowest first
    /// * `kernel_size` - Odd side of every cell's gate kernel
    /// * `device` - Device to create the module on
    ///
    /// # Panics
    /// If `hidden_channels` is empty.
    pub fn new(
        input_channels: usize,
        hidden_channels: &[usize],
        kernel_size: usize,
        device: &B::Device,
    ) -> Self {
        assert!(!hidden_channels.is_empty(), "ConvLSTM needs at least one cell");

        let mut cells = Vec::with_capacity(hidden_channels.len());
        let mut in_channels = input_channels;
        for &hidden in hidden_channels {
            cells.push(ConvLSTMCell::new(in_channels, hidden, kernel_size, device));
            in_channels = hidden;
        }

        Self {
            cells,
            input_channels,
        }
    }

    /// Set the initial gate bias of every cell
    pub fn with_bias_init(mut self, value: f64) -> Self {
        self.cells = self
            .cells
            .into_iter()
            .map(|cell| cell.with_bias_init(value))
            .collect();
        self
    }

    /// Set the forget-gate bias of every cell
    pub fn with_forget_bias(mut self, forget_bias: f64) -> Self {
        self.cells = self
            .cells
            .into_iter()
            .map(|cell| cell.with_forget_bias(forget_bias))
            .collect();
        self
    }

    pub fn input_channels(&self) -> usize {
        self.input_channels
    }

    pub fn num_layers(&self) -> usize {
        self.cells.len()
    }

    pub fn cells(&self) -> &[ConvLSTMCell<B>] {
        &self.cells
    }

    /// Forward pass through the stack
    ///
    /// # Arguments
    /// * `input` - `[batch, time, input_channels, height, width]`
    /// * `state` - per-cell state, zeros when `None`
    ///
    /// # Returns
    /// * Output of the deepest cell, `[batch, time, hidden, height, width]`
    /// * Final state of every cell
    pub fn forward(
        &self,
        input: Tensor<B, 5>,
        state: Option<Vec<ConvLSTMState<B>>>,
    ) -> (Tensor<B, 5>, Vec<ConvLSTMState<B>>) {
        unroll(self, input, state)
    }

    /// Sum of the cells' weight penalties.
    pub fn l2_loss(&self) -> Tensor<B, 1> {
        self.cells
            .iter()
            .map(ConvLSTMCell::l2_loss)
            .reduce(|acc, loss| acc + loss)
            .unwrap_or_else(|| Tensor::zeros([1], &self.devices()[0]))
    }
}

impl<B: Backend> RecurrentCell<B> for ConvLSTM<B> {
    type State = Vec<ConvLSTMState<B>>;

    fn output_channels(&self) -> usize {
        self.cells
            .last()
            .map(ConvLSTMCell::hidden_channels)
            .unwrap_or(self.input_channels)
    }

    fn zero_state(&self, batch: usize, spatial: [usize; 2], device: &B::Device) -> Self::State {
        self.cells
            .iter()
            .map(|cell| cell.zero_state(batch, spatial, device))
            .collect()
    }

    fn step(&self, input: Tensor<B, 4>, state: Self::State) -> (Tensor<B, 4>, Self::State) {
        let mut x = input;
        let mut next = Vec::with_capacity(self.cells.len());

        for (cell, cell_state) in self.cells.iter().zip(state) {
            let (output, new_state) = cell.step(x, cell_state);
            next.push(new_state);
            x = output;
        }

        (x, next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;
    use burn::tensor::backend::Backend as BurnBackend;
    use burn::tensor::Distribution;

    type TestBackend = NdArray<f32>;
    type TestDevice = <TestBackend as BurnBackend>::Device;

    fn get_test_device() -> TestDevice {
        Default::default()
    }

    #[test]
    fn test_conv_lstm_stack_creation() {
        let device = get_test_device();
        let stack = ConvLSTM::<TestBackend>::new(64, &[64, 32, 64], 3, &device);

        assert_eq!(stack.num_layers(), 3);
        assert_eq!(stack.input_channels(), 64);
        assert_eq!(stack.output_channels(), 64);
        assert_eq!(stack.cells()[1].input_channels(), 64);
        assert_eq!(stack.cells()[2].input_channels(), 32);
    }

    #[test]
    fn test_conv_lstm_stack_forward() {
        let device = get_test_device();
        let stack = ConvLSTM::<TestBackend>::new(6, &[4, 3, 5], 3, &device);

        let input = Tensor::<TestBackend, 5>::random(
            [2, 7, 6, 5, 5],
            Distribution::Uniform(-1.0, 1.0),
            &device,
        );
        let (output, state) = stack.forward(input, None);

        assert_eq!(output.dims(), [2, 7, 5, 5, 5]);
        assert_eq!(state.len(), 3);
        assert_eq!(state[0].hidden.dims(), [2, 4, 5, 5]);
        assert_eq!(state[1].cell.dims(), [2, 3, 5, 5]);
        assert_eq!(state[2].hidden.dims(), [2, 5, 5, 5]);
    }

    #[test]
    fn test_conv_lstm_last_output_is_final_hidden() {
        let device = get_test_device();
        let stack = ConvLSTM::<TestBackend>::new(2, &[3, 4], 3, &device);

        let input =
            Tensor::<TestBackend, 5>::random([1, 4, 2, 6, 6], Distribution::Default, &device);
        let (output, state) = stack.forward(input, None);

        let last: Tensor<TestBackend, 4> = output.narrow(1, 3, 1).squeeze(1);
        let diff = (last - state[1].hidden.clone()).abs().max().into_scalar();
        assert!(diff < 1e-6);
    }

    #[test]
    fn test_conv_lstm_state_is_causal() {
        let device = get_test_device();
        let stack = ConvLSTM::<TestBackend>::new(2, &[3], 3, &device);

        let prefix =
            Tensor::<TestBackend, 5>::random([1, 3, 2, 4, 4], Distribution::Default, &device);
        let tail_a = Tensor::<TestBackend, 5>::zeros([1, 2, 2, 4, 4], &device);
        let tail_b = Tensor::<TestBackend, 5>::ones([1, 2, 2, 4, 4], &device);

        let (out_a, _) = stack.forward(Tensor::cat(vec![prefix.clone(), tail_a], 1), None);
        let (out_b, _) = stack.forward(Tensor::cat(vec![prefix, tail_b], 1), None);

        // Later frames never influence earlier outputs
        let head_a = out_a.clone().narrow(1, 0, 3);
        let head_b = out_b.clone().narrow(1, 0, 3);
        assert!((head_a - head_b).abs().max().into_scalar() < 1e-6);

        let last_a = out_a.narrow(1, 4, 1);
        let last_b = out_b.narrow(1, 4, 1);
        assert!((last_a - last_b).abs().max().into_scalar() > 0.0);
    }

    #[test]
    fn test_conv_lstm_single_timestep() {
        let device = get_test_device();
        let stack = ConvLSTM::<TestBackend>::new(1, &[2], 3, &device);

        let input = Tensor::<TestBackend, 5>::ones([3, 1, 1, 2, 2], &device);
        let (output, _) = stack.forward(input, None);

        assert_eq!(output.dims(), [3, 1, 2, 2, 2]);
    }

    #[test]
    fn test_conv_lstm_l2_loss_sums_cells() {
        let device = get_test_device();
        let stack = ConvLSTM::<TestBackend>::new(2, &[3, 4], 3, &device);

        let expected: f32 = stack
            .cells()
            .iter()
            .map(|cell| cell.l2_loss().into_scalar())
            .sum();
        let total = stack.l2_loss().into_scalar();
        assert!((total - expected).abs() < 1e-4 * expected.max(1.0));
    }
}
