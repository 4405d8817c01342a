use burn::module::Module;
use burn::tensor::backend::Backend;
use burn::tensor::Tensor;

use super::decoder::SpatialDecoder;
use super::encoder::SpatialEncoder;
use crate::config::ArchitectureConfig;
use crate::layers::Phase;
use crate::rnn::ConvLSTM;

/// The full spatio-temporal autoencoder network
///
/// Frames are encoded independently, the recurrent stack runs over the time
/// axis of the encoded volume, and every step's output is decoded back to a
/// frame of the input's size.
///
/// # Tensor Shapes
/// * Input: `[batch, time, height, width, channels]`
/// * Output: same as input
#[derive(Module, Debug)]
pub struct AutoencoderNet<B: Backend> {
    encoder: SpatialEncoder<B>,
    temporal: ConvLSTM<B>,
    decoder: SpatialDecoder<B>,
}

impl<B: Backend> AutoencoderNet<B> {
    /// Build the network for frames with `channels` channels.
    pub fn new(channels: usize, arch: &ArchitectureConfig, device: &B::Device) -> Self {
        let encoder = SpatialEncoder::new(channels, arch, device);
        let temporal = ConvLSTM::new(
            encoder.out_channels(),
            &arch.recurrent_filters,
            arch.recurrent_kernel,
            device,
        )
        .with_bias_init(arch.bias_init)
        .with_forget_bias(arch.forget_bias);
        let decoder = SpatialDecoder::new(
            arch.recurrent_output_channels(),
            channels,
            arch,
            device,
        );

        Self {
            encoder,
            temporal,
            decoder,
        }
    }

    pub fn channels(&self) -> usize {
        self.decoder.out_channels()
    }

    /// Reconstruct a batch of volumes
    ///
    /// # Panics
    /// If the channel axis does not match the network or the frames are
    /// smaller than the encoder's receptive field.
    pub fn forward(&self, volumes: Tensor<B, 5>, phase: Phase) -> Tensor<B, 5> {
        let [batch, time, height, width, channels] = volumes.dims();

        // [B, T, H, W, C] -> [B*T, C, H, W]
        let frames = volumes
            .permute([0, 1, 4, 2, 3])
            .reshape([batch * time, channels, height, width]);

        let (features, ledger) = self.encoder.forward(frames, phase);
        let [_, encoded_channels, h, w] = features.dims();

        let sequence = features.reshape([batch, time, encoded_channels, h, w]);
        let (sequence, _) = self.temporal.forward(sequence, None);
        let [_, _, recurrent_channels, _, _] = sequence.dims();

        let features = sequence.reshape([batch * time, recurrent_channels, h, w]);
        let frames = self.decoder.forward(features, &ledger, phase);

        // [B*T, C, H, W] -> [B, T, H, W, C]
        frames
            .reshape([batch, time, channels, height, width])
            .permute([0, 1, 3, 4, 2])
    }

    /// Sum of half squared norms of every parameter except the biases.
    ///
    /// Convolution filters and the batch-norm scale and shift are included.
    pub fn regularization_loss(&self) -> Tensor<B, 1> {
        self.encoder.l2_loss() + self.temporal.l2_loss() + self.decoder.l2_loss()
    }

    /// Fold pending batch-norm running-statistic updates into their values.
    pub fn sync_statistics(&self) {
        self.encoder.sync_statistics();
        self.decoder.sync_statistics();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;
    use burn::module::Param;
    use burn::tensor::Distribution;

    type TestBackend = NdArray<f32>;

    fn small_arch() -> ArchitectureConfig {
        ArchitectureConfig::new()
            .with_conv1_filters(4)
            .with_conv2_filters(4)
            .with_recurrent_filters(vec![4, 2, 4])
            .with_deconv1_filters(4)
    }

    #[test]
    fn test_forward_preserves_shape() {
        let device = Default::default();
        let net = AutoencoderNet::<TestBackend>::new(2, &small_arch(), &device);

        let volumes =
            Tensor::<TestBackend, 5>::random([2, 3, 35, 39, 2], Distribution::Default, &device);
        let output = net.forward(volumes, Phase::Training);

        assert_eq!(output.dims(), [2, 3, 35, 39, 2]);
        assert_eq!(net.channels(), 2);
    }

    #[test]
    fn test_inference_is_repeatable() {
        let device = Default::default();
        let net = AutoencoderNet::<TestBackend>::new(1, &small_arch(), &device);

        let volumes =
            Tensor::<TestBackend, 5>::random([1, 2, 35, 35, 1], Distribution::Default, &device);
        let a = net.forward(volumes.clone(), Phase::Inference);
        let b = net.forward(volumes, Phase::Inference);

        assert!((a - b).abs().max().into_scalar() < 1e-6);
    }

    #[test]
    fn test_regularization_loss_is_positive() {
        let device = Default::default();
        let net = AutoencoderNet::<TestBackend>::new(1, &small_arch(), &device);

        assert!(net.regularization_loss().into_scalar() > 0.0);
        assert_eq!(net.regularization_loss().dims(), [1]);
    }

    #[test]
    fn test_regularization_covers_normalization_scale() {
        let device = Default::default();
        let net = AutoencoderNet::<TestBackend>::new(1, &small_arch(), &device);
        let base = net.regularization_loss().into_scalar();

        let mut record = net.clone().into_record();
        record.encoder.conv1.norm.gamma = Param::from_tensor(Tensor::full([4], 3.0, &device));
        let scaled = net.load_record(record);

        // gamma goes from 1 to 3 on four channels: 0.5 * 4 * (9 - 1)
        let delta = scaled.regularization_loss().into_scalar() - base;
        assert!((delta - 16.0).abs() < 1e-3, "delta {delta}");
    }

    #[test]
    #[should_panic]
    fn test_frames_too_small_panic() {
        let device = Default::default();
        let net = AutoencoderNet::<TestBackend>::new(1, &small_arch(), &device);

        let volumes = Tensor::<TestBackend, 5>::zeros([1, 2, 8, 8, 1], &device);
        let _ = net.forward(volumes, Phase::Inference);
    }
}
