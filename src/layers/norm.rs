//! Batch normalization with an explicit phase
//!
//! Burn's `BatchNorm` infers its mode from whether the backend tracks
//! gradients. The autoencoder instead threads a [`Phase`] through every call
//! that normalizes, so the statistics used are visible at the call site.

use burn::module::{Module, Param, RunningState};
use burn::tensor::backend::Backend;
use burn::tensor::Tensor;
use serde::{Deserialize, Serialize};

use super::init::l2_loss;

/// Which statistics batch normalization uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase {
    /// Normalize with the current batch and update the running averages
    Training,
    /// Normalize with the accumulated running averages
    Inference,
}

impl Phase {
    pub fn is_training(self) -> bool {
        matches!(self, Phase::Training)
    }
}

/// Per-channel batch normalization over `[N, C, H, W]` feature maps.
#[derive(Module, Debug)]
pub struct FeatureNorm<B: Backend> {
    gamma: Param<Tensor<B, 1>>,
    beta: Param<Tensor<B, 1>>,
    running_mean: RunningState<Tensor<B, 1>>,
    running_var: RunningState<Tensor<B, 1>>,
    /// Weight of the current batch in the running averages (1 - decay)
    momentum: f64,
    epsilon: f64,
}

impl<B: Backend> FeatureNorm<B> {
    /// Create a normalization layer for `channels` feature maps.
    ///
    /// `decay` is the weight kept by the running averages at each update.
    pub fn new(channels: usize, decay: f64, epsilon: f64, device: &B::Device) -> Self {
        Self {
            gamma: Param::from_tensor(Tensor::ones([channels], device)),
            beta: Param::from_tensor(Tensor::zeros([channels], device)),
            running_mean: RunningState::new(Tensor::zeros([channels], device)),
            running_var: RunningState::new(Tensor::ones([channels], device)),
            momentum: 1.0 - decay,
            epsilon,
        }
    }

    /// Number of normalized channels
    pub fn channels(&self) -> usize {
        self.gamma.val().dims()[0]
    }

    /// Current running mean and variance.
    pub fn running_statistics(&self) -> (Tensor<B, 1>, Tensor<B, 1>) {
        (self.running_mean.value_sync(), self.running_var.value_sync())
    }

    /// Half the squared norm of the scale and shift.
    pub fn l2_loss(&self) -> Tensor<B, 1> {
        l2_loss(self.gamma.val()) + l2_loss(self.beta.val())
    }

    /// Fold pending running-average updates into the stored statistics.
    pub fn sync_statistics(&self) {
        let _ = self.running_mean.value_sync();
        let _ = self.running_var.value_sync();
    }

    pub fn forward(&self, input: Tensor<B, 4>, phase: Phase) -> Tensor<B, 4> {
        let [batch, channels, height, width] = input.dims();
        let device = input.device();

        let (mean, var) = match phase {
            Phase::Training => {
                let flat = batch * height * width;
                let mean = input
                    .clone()
                    .swap_dims(0, 1)
                    .reshape([channels, flat])
                    .mean_dim(1)
                    .reshape([1, channels, 1, 1]);
                let var = input
                    .clone()
                    .sub(mean.clone())
                    .powi_scalar(2)
                    .swap_dims(0, 1)
                    .reshape([channels, flat])
                    .mean_dim(1)
                    .reshape([1, channels, 1, 1]);

                let running_mean = self
                    .running_mean
                    .value_sync()
                    .to_device(&device)
                    .mul_scalar(1.0 - self.momentum)
                    .add(mean.clone().detach().reshape([channels]).mul_scalar(self.momentum));
                let running_var = self
                    .running_var
                    .value_sync()
                    .to_device(&device)
                    .mul_scalar(1.0 - self.momentum)
                    .add(var.clone().detach().reshape([channels]).mul_scalar(self.momentum));

                self.running_mean.update(running_mean.detach());
                self.running_var.update(running_var.detach());

                (mean, var)
            }
            Phase::Inference => (
                self.running_mean
                    .value()
                    .to_device(&device)
                    .reshape([1, channels, 1, 1]),
                self.running_var
                    .value()
                    .to_device(&device)
                    .reshape([1, channels, 1, 1]),
            ),
        };

        let std = var.add_scalar(self.epsilon).sqrt();
        input
            .sub(mean)
            .div(std)
            .mul(self.gamma.val().reshape([1, channels, 1, 1]))
            .add(self.beta.val().reshape([1, channels, 1, 1]))
    }
}
