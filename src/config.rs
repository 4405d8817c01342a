//! Configuration for the autoencoder and its fixed architecture
//!
//! [`AutoencoderConfig`] carries the runtime hyperparameters the orchestrator
//! needs at construction. [`ArchitectureConfig`] carries the layer widths,
//! kernels and strides; its defaults reproduce the reference network, and
//! callers only override them for smaller experiments.

use burn::config::Config;

use crate::error::AutoencoderError;

/// Layer widths, kernels and strides of the network.
#[derive(Config, Debug, PartialEq)]
pub struct ArchitectureConfig {
    /// Filters of the first encoder convolution
    #[config(default = 128)]
    pub conv1_filters: usize,
    /// Kernel of the first encoder convolution
    #[config(default = 11)]
    pub conv1_kernel: usize,
    /// Stride of the first encoder convolution
    #[config(default = 4)]
    pub conv1_stride: usize,
    /// Filters of the second encoder convolution
    #[config(default = 64)]
    pub conv2_filters: usize,
    /// Kernel of the second encoder convolution
    #[config(default = 5)]
    pub conv2_kernel: usize,
    /// Stride of the second encoder convolution
    #[config(default = 2)]
    pub conv2_stride: usize,
    /// Hidden channels of each recurrent cell, shallowest first
    #[config(default = "vec![64, 32, 64]")]
    pub recurrent_filters: Vec<usize>,
    /// Kernel of the recurrent cells' gate convolution (odd)
    #[config(default = 3)]
    pub recurrent_kernel: usize,
    /// Filters of the first decoder transposed convolution
    #[config(default = 128)]
    pub deconv1_filters: usize,
    /// Decay of the batch-norm running averages
    #[config(default = 0.99)]
    pub norm_decay: f64,
    /// Batch-norm variance epsilon
    #[config(default = 1e-3)]
    pub norm_epsilon: f64,
    /// Initial value of every convolution bias
    #[config(default = 0.01)]
    pub bias_init: f64,
    /// Constant added to the forget gate pre-activation
    #[config(default = 1.0)]
    pub forget_bias: f64,
}

impl ArchitectureConfig {
    /// Channels produced by the deepest recurrent cell.
    pub fn recurrent_output_channels(&self) -> usize {
        self.recurrent_filters.last().copied().unwrap_or(self.conv2_filters)
    }

    /// Spatial size after the two encoder convolutions, or `None` when a
    /// frame is too small for either kernel.
    pub fn encoded_size(&self, height: usize, width: usize) -> Option<[usize; 2]> {
        let stage = |size: usize, kernel: usize, stride: usize| {
            size.checked_sub(kernel).map(|rest| rest / stride + 1)
        };

        let h1 = stage(height, self.conv1_kernel, self.conv1_stride)?;
        let w1 = stage(width, self.conv1_kernel, self.conv1_stride)?;
        let h2 = stage(h1, self.conv2_kernel, self.conv2_stride)?;
        let w2 = stage(w1, self.conv2_kernel, self.conv2_stride)?;

        Some([h2, w2])
    }

    fn validate(&self) -> crate::error::Result<()> {
        let sizes = [
            ("conv1_filters", self.conv1_filters),
            ("conv1_kernel", self.conv1_kernel),
            ("conv1_stride", self.conv1_stride),
            ("conv2_filters", self.conv2_filters),
            ("conv2_kernel", self.conv2_kernel),
            ("conv2_stride", self.conv2_stride),
            ("deconv1_filters", self.deconv1_filters),
        ];
        for (name, value) in sizes {
            if value == 0 {
                return Err(AutoencoderError::InvalidConfig(format!(
                    "{name} must be positive"
                )));
            }
        }

        if self.recurrent_filters.is_empty() || self.recurrent_filters.contains(&0) {
            return Err(AutoencoderError::InvalidConfig(
                "recurrent_filters must list at least one positive width".to_string(),
            ));
        }
        if self.recurrent_kernel % 2 == 0 {
            return Err(AutoencoderError::InvalidConfig(format!(
                "recurrent_kernel must be odd to preserve spatial size, got {}",
                self.recurrent_kernel
            )));
        }
        if !(0.0..1.0).contains(&self.norm_decay) {
            return Err(AutoencoderError::InvalidConfig(format!(
                "norm_decay must lie in [0, 1), got {}",
                self.norm_decay
            )));
        }
        if self.norm_epsilon <= 0.0 {
            return Err(AutoencoderError::InvalidConfig(
                "norm_epsilon must be positive".to_string(),
            ));
        }

        Ok(())
    }
}

/// Hyperparameters of the autoencoder.
#[derive(Config, Debug, PartialEq)]
pub struct AutoencoderConfig {
    /// Channels per frame
    pub channels: usize,
    /// Frames per video volume
    pub temporal_length: usize,
    /// Volumes per batch
    pub batch_size: usize,
    /// Adam learning rate (alpha)
    pub learning_rate: f64,
    /// Weight of the L2 regularization term (lambda)
    pub regularization: f64,
    /// Adam numerical-stability epsilon
    #[config(default = 1e-6)]
    pub epsilon: f32,
    /// Layer layout
    #[config(default = "ArchitectureConfig::new()")]
    pub architecture: ArchitectureConfig,
    /// Seed applied to the backend before parameters are created
    pub seed: Option<u64>,
}

impl AutoencoderConfig {
    /// Reject values the network cannot be built from.
    pub fn validate(&self) -> crate::error::Result<()> {
        if self.channels == 0 || self.temporal_length == 0 || self.batch_size == 0 {
            return Err(AutoencoderError::InvalidConfig(format!(
                "channels ({}), temporal_length ({}) and batch_size ({}) must be positive",
                self.channels, self.temporal_length, self.batch_size
            )));
        }
        if !(self.learning_rate > 0.0) {
            return Err(AutoencoderError::InvalidConfig(format!(
                "learning_rate must be positive, got {}",
                self.learning_rate
            )));
        }
        if !(self.regularization >= 0.0) {
            return Err(AutoencoderError::InvalidConfig(format!(
                "regularization must be non-negative, got {}",
                self.regularization
            )));
        }
        if !(self.epsilon > 0.0) {
            return Err(AutoencoderError::InvalidConfig(
                "epsilon must be positive".to_string(),
            ));
        }

        self.architecture.validate()
    }
}
