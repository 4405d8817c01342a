//! Spatial encoder
//!
//! Two strided convolution stages applied to every frame independently.

use burn::module::Module;
use burn::tensor::backend::Backend;
use burn::tensor::Tensor;

use crate::config::ArchitectureConfig;
use crate::layers::{ConvStage, Phase, StageSpec};

/// Spatial sizes seen on the encoding path of one forward pass.
///
/// The decoder consumes them in reverse to size its transposed convolutions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShapeLedger {
    /// `[height, width]` of the input frames
    pub frame: [usize; 2],
    /// `[height, width]` after the first convolution
    pub first_stage: [usize; 2],
    /// `[height, width]` after the second convolution
    pub encoded: [usize; 2],
}

impl ShapeLedger {
    /// Targets for the decoder stages, deepest first.
    pub fn decode_targets(&self) -> [[usize; 2]; 2] {
        [self.first_stage, self.frame]
    }
}

#[derive(Module, Debug)]
pub struct SpatialEncoder<B: Backend> {
    conv1: ConvStage<B>,
    conv2: ConvStage<B>,
}

impl<B: Backend> SpatialEncoder<B> {
    pub fn new(channels: usize, arch: &ArchitectureConfig, device: &B::Device) -> Self {
        let stage = |in_channels, out_channels, kernel, stride| StageSpec {
            in_channels,
            out_channels,
            kernel,
            stride,
            bias_init: arch.bias_init,
            norm_decay: arch.norm_decay,
            norm_epsilon: arch.norm_epsilon,
        };

        Self {
            conv1: ConvStage::new(
                stage(channels, arch.conv1_filters, arch.conv1_kernel, arch.conv1_stride),
                device,
            ),
            conv2: ConvStage::new(
                stage(
                    arch.conv1_filters,
                    arch.conv2_filters,
                    arch.conv2_kernel,
                    arch.conv2_stride,
                ),
                device,
            ),
        }
    }

    pub fn out_channels(&self) -> usize {
        self.conv2.out_channels()
    }

    /// Encode a batch of frames
    ///
    /// # Arguments
    /// * `frames` - `[frames, channels, height, width]`, batch and time flattened
    ///
    /// # Returns
    /// * `[frames, conv2_filters, h', w']`
    /// * The ledger of spatial sizes for the decoder
    pub fn forward(&self, frames: Tensor<B, 4>, phase: Phase) -> (Tensor<B, 4>, ShapeLedger) {
        let [_, _, height, width] = frames.dims();

        let x = self.conv1.forward(frames, phase);
        let [_, _, h1, w1] = x.dims();

        let x = self.conv2.forward(x, phase);
        let [_, _, h2, w2] = x.dims();

        let ledger = ShapeLedger {
            frame: [height, width],
            first_stage: [h1, w1],
            encoded: [h2, w2],
        };
        (x, ledger)
    }

    pub fn l2_loss(&self) -> Tensor<B, 1> {
        self.conv1.l2_loss() + self.conv2.l2_loss()
    }

    pub fn sync_statistics(&self) {
        self.conv1.sync_statistics();
        self.conv2.sync_statistics();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;
    use burn::tensor::Distribution;

    type TestBackend = NdArray<f32>;

    #[test]
    fn test_encoder_records_ledger() {
        let device = Default::default();
        let arch = ArchitectureConfig::new()
            .with_conv1_filters(4)
            .with_conv2_filters(3);
        let encoder = SpatialEncoder::<TestBackend>::new(2, &arch, &device);

        let frames =
            Tensor::<TestBackend, 4>::random([3, 2, 120, 100], Distribution::Default, &device);
        let (features, ledger) = encoder.forward(frames, Phase::Training);

        // 120 -> 28 -> 12, 100 -> 23 -> 10
        assert_eq!(features.dims(), [3, 3, 12, 10]);
        assert_eq!(ledger.frame, [120, 100]);
        assert_eq!(ledger.first_stage, [28, 23]);
        assert_eq!(ledger.encoded, [12, 10]);
        assert_eq!(ledger.decode_targets(), [[28, 23], [120, 100]]);
        assert_eq!(Some(ledger.encoded), arch.encoded_size(120, 100));
    }

    #[test]
    fn test_encoder_output_channels() {
        let device = Default::default();
        let arch = ArchitectureConfig::new()
            .with_conv1_filters(5)
            .with_conv2_filters(7);
        let encoder = SpatialEncoder::<TestBackend>::new(1, &arch, &device);

        assert_eq!(encoder.out_channels(), 7);
    }
}
