//! Strided convolution stages used by the spatial encoder and decoder
//!
//! Both stages use `VALID` padding. A forward convolution therefore shrinks
//! each spatial side to `(size - kernel) / stride + 1`, which loses up to
//! `stride - 1` pixels; the transposed stage restores them through output
//! padding chosen from the exact shape it must reproduce.

use burn::module::{Module, Param};
use burn::tensor::backend::Backend;
use burn::tensor::Tensor;

use super::im2col::{convolve, convolve_transposed};
use super::init::{constant_bias, glorot_uniform, l2_loss};
use super::norm::{FeatureNorm, Phase};

/// Convolution, batch normalization and tanh.
#[derive(Module, Debug)]
pub struct ConvStage<B: Backend> {
    /// `[filters, in_channels, kernel, kernel]`
    weight: Param<Tensor<B, 4>>,
    bias: Param<Tensor<B, 1>>,
    norm: FeatureNorm<B>,
    stride: usize,
}

/// Hyperparameters shared by the convolution stages.
#[derive(Debug, Clone, Copy)]
pub struct StageSpec {
    pub in_channels: usize,
    pub out_channels: usize,
    pub kernel: usize,
    pub stride: usize,
    pub bias_init: f64,
    pub norm_decay: f64,
    pub norm_epsilon: f64,
}

impl<B: Backend> ConvStage<B> {
    pub fn new(spec: StageSpec, device: &B::Device) -> Self {
        let area = spec.kernel * spec.kernel;
        let weight = glorot_uniform(
            [spec.out_channels, spec.in_channels, spec.kernel, spec.kernel],
            spec.in_channels * area,
            spec.out_channels * area,
            device,
        );

        Self {
            weight,
            bias: constant_bias(spec.out_channels, spec.bias_init, device),
            norm: FeatureNorm::new(spec.out_channels, spec.norm_decay, spec.norm_epsilon, device),
            stride: spec.stride,
        }
    }

    pub fn out_channels(&self) -> usize {
        self.weight.val().dims()[0]
    }

    pub fn kernel(&self) -> usize {
        self.weight.val().dims()[2]
    }

    pub fn stride(&self) -> usize {
        self.stride
    }

    /// Output spatial side for an input side, `None` when the kernel does not fit.
    pub fn output_size(&self, input: usize) -> Option<usize> {
        input
            .checked_sub(self.kernel())
            .map(|rest| rest / self.stride + 1)
    }

    /// `[N, C_in, H, W]` to `[N, filters, H', W']`
    ///
    /// # Panics
    ///
    /// When a spatial side is smaller than the kernel.
    pub fn forward(&self, input: Tensor<B, 4>, phase: Phase) -> Tensor<B, 4> {
        let [_, _, height, width] = input.dims();
        assert!(
            self.output_size(height).is_some() && self.output_size(width).is_some(),
            "{height}x{width} input is smaller than the {k}x{k} kernel",
            k = self.kernel()
        );

        let x = convolve(input, self.weight.val(), self.bias.val(), self.stride, 0);
        self.norm.forward(x, phase).tanh()
    }

    /// Half the squared norm of the filter and of the normalization scale and shift.
    pub fn l2_loss(&self) -> Tensor<B, 1> {
        l2_loss(self.weight.val()) + self.norm.l2_loss()
    }

    pub fn sync_statistics(&self) {
        self.norm.sync_statistics();
    }
}

/// Transposed convolution that reproduces an exact spatial shape.
///
/// Hidden stages normalize and apply tanh; the output stage emits raw values.
#[derive(Module, Debug)]
pub struct DeconvStage<B: Backend> {
    /// `[in_channels, filters, kernel, kernel]`
    weight: Param<Tensor<B, 4>>,
    bias: Param<Tensor<B, 1>>,
    norm: Option<FeatureNorm<B>>,
    stride: usize,
}

impl<B: Backend> DeconvStage<B> {
    /// Hidden stage with batch normalization and tanh.
    pub fn hidden(spec: StageSpec, device: &B::Device) -> Self {
        let mut stage = Self::output(spec, device);
        stage.norm = Some(FeatureNorm::new(
            spec.out_channels,
            spec.norm_decay,
            spec.norm_epsilon,
            device,
        ));
        stage
    }

    /// Final stage producing raw reconstruction values.
    pub fn output(spec: StageSpec, device: &B::Device) -> Self {
        let area = spec.kernel * spec.kernel;
        let weight = glorot_uniform(
            [spec.in_channels, spec.out_channels, spec.kernel, spec.kernel],
            spec.out_channels * area,
            spec.in_channels * area,
            device,
        );

        Self {
            weight,
            bias: constant_bias(spec.out_channels, spec.bias_init, device),
            norm: None,
            stride: spec.stride,
        }
    }

    pub fn out_channels(&self) -> usize {
        self.weight.val().dims()[1]
    }

    pub fn is_output(&self) -> bool {
        self.norm.is_none()
    }

    /// Assert that an input side maps onto `target`, which must lie within
    /// `stride - 1` of the natural size `(input - 1) * stride + kernel`.
    ///
    /// # Panics
    ///
    /// When `target` is not reachable from `input` with this kernel and
    /// stride, which means the caller paired the stage with the wrong shape.
    fn check_target(&self, input: usize, target: usize) {
        let kernel = self.weight.val().dims()[2];
        let base = (input - 1) * self.stride + kernel;
        assert!(
            target >= base && target - base < self.stride.max(1),
            "transposed convolution cannot map {input} to {target} (kernel {kernel}, stride {})",
            self.stride
        );
    }

    /// `[N, C_in, h, w]` to `[N, filters, target[0], target[1]]`
    ///
    /// Rows and columns past the natural size carry only the bias.
    pub fn forward(&self, input: Tensor<B, 4>, target: [usize; 2], phase: Phase) -> Tensor<B, 4> {
        let [_, _, height, width] = input.dims();
        self.check_target(height, target[0]);
        self.check_target(width, target[1]);

        let x = convolve_transposed(
            input,
            self.weight.val(),
            self.bias.val(),
            self.stride,
            target,
        );

        match &self.norm {
            Some(norm) => norm.forward(x, phase).tanh(),
            None => x,
        }
    }

    pub fn l2_loss(&self) -> Tensor<B, 1> {
        let filter = l2_loss(self.weight.val());
        match &self.norm {
            Some(norm) => filter + norm.l2_loss(),
            None => filter,
        }
    }

    pub fn sync_statistics(&self) {
        if let Some(norm) = &self.norm {
            norm.sync_statistics();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;
    use burn::tensor::Distribution;

    type TestBackend = NdArray<f32>;

    fn spec(in_channels: usize, out_channels: usize, kernel: usize, stride: usize) -> StageSpec {
        StageSpec {
            in_channels,
            out_channels,
            kernel,
            stride,
            bias_init: 0.01,
            norm_decay: 0.99,
            norm_epsilon: 1e-3,
        }
    }

    #[test]
    fn test_conv_stage_valid_arithmetic() {
        let device = Default::default();
        let stage = ConvStage::<TestBackend>::new(spec(1, 8, 11, 4), &device);

        let input =
            Tensor::<TestBackend, 4>::random([2, 1, 120, 120], Distribution::Default, &device);
        let output = stage.forward(input, Phase::Training);

        assert_eq!(output.dims(), [2, 8, 28, 28]);
        assert_eq!(stage.output_size(120), Some(28));
        assert_eq!(stage.output_size(10), None);
    }

    #[test]
    fn test_conv_stage_output_is_bounded_by_tanh() {
        let device = Default::default();
        let stage = ConvStage::<TestBackend>::new(spec(3, 4, 5, 2), &device);

        let input = Tensor::<TestBackend, 4>::random(
            [2, 3, 17, 17],
            Distribution::Uniform(-10.0, 10.0),
            &device,
        );
        let output = stage.forward(input, Phase::Inference);

        assert_eq!(output.dims(), [2, 4, 7, 7]);
        assert!(output.abs().max().into_scalar() <= 1.0);
    }

    #[test]
    fn test_deconv_stage_hits_exact_target() {
        let device = Default::default();
        let stage = DeconvStage::<TestBackend>::hidden(spec(4, 6, 5, 2), &device);

        let input =
            Tensor::<TestBackend, 4>::random([3, 4, 12, 12], Distribution::Default, &device);

        // (12 - 1) * 2 + 5 = 27, and 28 needs one row of output padding.
        let exact = stage.forward(input.clone(), [27, 27], Phase::Training);
        assert_eq!(exact.dims(), [3, 6, 27, 27]);
        let padded = stage.forward(input, [28, 27], Phase::Training);
        assert_eq!(padded.dims(), [3, 6, 28, 27]);
    }

    #[test]
    fn test_output_stage_is_raw() {
        let device = Default::default();
        let stage = DeconvStage::<TestBackend>::output(spec(4, 1, 11, 4), &device);
        assert!(stage.is_output());
        assert_eq!(stage.out_channels(), 1);

        let input = Tensor::<TestBackend, 4>::ones([1, 4, 28, 28], &device) * 50.0;
        let output = stage.forward(input, [120, 120], Phase::Inference);

        assert_eq!(output.dims(), [1, 1, 120, 120]);
        // Without tanh the large input leaks through unbounded.
        assert!(output.abs().max().into_scalar() > 1.0);
    }

    #[test]
    #[should_panic]
    fn test_deconv_stage_rejects_unreachable_target() {
        let device = Default::default();
        let stage = DeconvStage::<TestBackend>::hidden(spec(4, 6, 5, 2), &device);
        let input = Tensor::<TestBackend, 4>::zeros([1, 4, 12, 12], &device);
        let _ = stage.forward(input, [40, 40], Phase::Inference);
    }
}
