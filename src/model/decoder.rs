//! Spatial decoder
//!
//! Mirrors the encoder with two transposed convolutions. The first is
//! normalized and squashed like the encoder stages; the second returns raw
//! values in the input's channel count.

use burn::module::Module;
use burn::tensor::backend::Backend;
use burn::tensor::Tensor;

use super::encoder::ShapeLedger;
use crate::config::ArchitectureConfig;
use crate::layers::{DeconvStage, Phase, StageSpec};

#[derive(Module, Debug)]
pub struct SpatialDecoder<B: Backend> {
    deconv1: DeconvStage<B>,
    deconv2: DeconvStage<B>,
}

impl<B: Backend> SpatialDecoder<B> {
    /// # Arguments
    /// * `in_channels` - Channels produced by the recurrent stack
    /// * `channels` - Channels of the reconstructed frames
    pub fn new(
        in_channels: usize,
        channels: usize,
        arch: &ArchitectureConfig,
        device: &B::Device,
    ) -> Self {
        // Each stage undoes the encoder stage at the same depth.
        let deconv1 = DeconvStage::hidden(
            StageSpec {
                in_channels,
                out_channels: arch.deconv1_filters,
                kernel: arch.conv2_kernel,
                stride: arch.conv2_stride,
                bias_init: arch.bias_init,
                norm_decay: arch.norm_decay,
                norm_epsilon: arch.norm_epsilon,
            },
            device,
        );
        let deconv2 = DeconvStage::output(
            StageSpec {
                in_channels: arch.deconv1_filters,
                out_channels: channels,
                kernel: arch.conv1_kernel,
                stride: arch.conv1_stride,
                bias_init: arch.bias_init,
                norm_decay: arch.norm_decay,
                norm_epsilon: arch.norm_epsilon,
            },
            device,
        );

        Self { deconv1, deconv2 }
    }

    pub fn out_channels(&self) -> usize {
        self.deconv2.out_channels()
    }

    /// `[frames, in_channels, h', w']` to `[frames, channels, height, width]`
    /// with the sizes taken from `ledger`.
    pub fn forward(
        &self,
        features: Tensor<B, 4>,
        ledger: &ShapeLedger,
        phase: Phase,
    ) -> Tensor<B, 4> {
        let [first, last] = ledger.decode_targets();

        let x = self.deconv1.forward(features, first, phase);
        self.deconv2.forward(x, last, phase)
    }

    pub fn l2_loss(&self) -> Tensor<B, 1> {
        self.deconv1.l2_loss() + self.deconv2.l2_loss()
    }

    pub fn sync_statistics(&self) {
        self.deconv1.sync_statistics();
        self.deconv2.sync_statistics();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::encoder::SpatialEncoder;
    use burn::backend::NdArray;
    use burn::tensor::Distribution;

    type TestBackend = NdArray<f32>;

    #[test]
    fn test_decoder_inverts_encoder_shape() {
        let device = Default::default();
        let arch = ArchitectureConfig::new()
            .with_conv1_filters(4)
            .with_conv2_filters(3)
            .with_deconv1_filters(5);
        let encoder = SpatialEncoder::<TestBackend>::new(3, &arch, &device);
        let decoder = SpatialDecoder::<TestBackend>::new(3, 3, &arch, &device);

        // Sizes whose strides do not divide evenly
        for (height, width) in [(35, 35), (120, 120), (47, 61)] {
            let shape = [2, 3, height, width];
            let frames = Tensor::<TestBackend, 4>::random(shape, Distribution::Default, &device);
            let (features, ledger) = encoder.forward(frames, Phase::Training);
            let output = decoder.forward(features, &ledger, Phase::Training);

            assert_eq!(output.dims(), [2, 3, height, width]);
        }
    }

    #[test]
    fn test_decoder_output_is_unbounded() {
        let device = Default::default();
        let arch = ArchitectureConfig::new()
            .with_deconv1_filters(4)
            .with_bias_init(3.0);
        let decoder = SpatialDecoder::<TestBackend>::new(2, 1, &arch, &device);

        let ledger = ShapeLedger {
            frame: [35, 35],
            first_stage: [7, 7],
            encoded: [2, 2],
        };
        let features = Tensor::<TestBackend, 4>::zeros([1, 2, 2, 2], &device);
        let output = decoder.forward(features, &ledger, Phase::Inference);

        // The final stage has no tanh, so the bias passes straight through.
        assert_eq!(decoder.out_channels(), 1);
        assert!(output.max().into_scalar() > 1.0);
    }
}
