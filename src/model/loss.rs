//! Reconstruction error and training objective
//!
//! | Quantity | Shape | Definition |
//! |----------|-------|------------|
//! | per-pixel | `[batch, time, height, width, channels]` | `(x - y)²` |
//! | per-frame | `[batch, time]` | sum of per-pixel over height, width, channels |
//! | reconstruction | `[1]` | `0.5 × mean(per-frame)` |
//! | total | `[1]` | `reconstruction + λ × regularization` |

use burn::tensor::backend::Backend;
use burn::tensor::Tensor;

/// Squared-error maps of one batch.
#[derive(Debug, Clone)]
pub struct ReconstructionErrors<B: Backend> {
    /// `[batch, time, height, width, channels]`
    pub per_pixel: Tensor<B, 5>,
    /// `[batch, time]`
    pub per_frame: Tensor<B, 2>,
}

impl<B: Backend> ReconstructionErrors<B> {
    /// Compare a batch with its reconstruction, both `[batch, time, height, width, channels]`.
    pub fn new(input: Tensor<B, 5>, reconstruction: Tensor<B, 5>) -> Self {
        let per_pixel = (input - reconstruction).powi_scalar(2);
        let per_frame = per_pixel
            .clone()
            .flatten::<3>(2, 4)
            .sum_dim(2)
            .squeeze(2);

        Self {
            per_pixel,
            per_frame,
        }
    }

    /// Half the mean per-frame error.
    pub fn loss(&self) -> Tensor<B, 1> {
        self.per_frame.clone().mean().mul_scalar(0.5)
    }
}

/// Loss terms of one training step.
///
/// All three terms are reported with every training step; only `total` is
/// differentiated.
#[derive(Debug, Clone)]
pub struct Objective<B: Backend> {
    pub reconstruction: Tensor<B, 1>,
    pub regularization: Tensor<B, 1>,
    pub total: Tensor<B, 1>,
}

impl<B: Backend> Objective<B> {
    /// Combine the two terms with weight `lambda` on the regularizer.
    pub fn new(reconstruction: Tensor<B, 1>, regularization: Tensor<B, 1>, lambda: f64) -> Self {
        let total = reconstruction.clone() + regularization.clone().mul_scalar(lambda);
        Self {
            reconstruction,
            regularization,
            total,
        }
    }
}
