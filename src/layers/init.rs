//! Parameter creation helpers
//!
//! Parameters are materialized eagerly so that seeding the backend right
//! before construction makes the initial weights reproducible.

use burn::module::Param;
use burn::tensor::backend::Backend;
use burn::tensor::{Distribution, Tensor};

/// Convolution filter drawn from a Glorot (Xavier) uniform distribution.
///
/// `fan_in` and `fan_out` follow the convolutional convention of multiplying
/// the channel counts by the kernel area.
pub fn glorot_uniform<B: Backend>(
    shape: [usize; 4],
    fan_in: usize,
    fan_out: usize,
    device: &B::Device,
) -> Param<Tensor<B, 4>> {
    let limit = (6.0 / (fan_in + fan_out) as f64).sqrt();
    let tensor = Tensor::random(shape, Distribution::Uniform(-limit, limit), device);
    Param::from_tensor(tensor)
}

/// Bias vector filled with a constant.
pub fn constant_bias<B: Backend>(
    size: usize,
    value: f64,
    device: &B::Device,
) -> Param<Tensor<B, 1>> {
    Param::from_tensor(Tensor::full([size], value, device))
}

/// Half the sum of squares of a weight tensor.
pub fn l2_loss<B: Backend, const D: usize>(weight: Tensor<B, D>) -> Tensor<B, 1> {
    weight.powi_scalar(2).sum().mul_scalar(0.5)
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TestBackend = NdArray<f32>;

    #[test]
    fn test_glorot_uniform_bounds() {
        let device = Default::default();
        let param = glorot_uniform::<TestBackend>([8, 3, 5, 5], 3 * 25, 8 * 25, &device);
        let limit = (6.0f32 / (75.0 + 200.0)).sqrt();

        let weight = param.val();
        assert_eq!(weight.dims(), [8, 3, 5, 5]);
        let max = weight.clone().abs().max().into_scalar();
        assert!(max <= limit, "{max} exceeds {limit}");
        assert!(weight.abs().sum().into_scalar() > 0.0);
    }

    #[test]
    fn test_constant_bias() {
        let device = Default::default();
        let bias = constant_bias::<TestBackend>(4, 0.01, &device).val();

        assert_eq!(bias.dims(), [4]);
        let values = bias.into_data().to_vec::<f32>().unwrap();
        assert!(values.iter().all(|v| (v - 0.01).abs() < 1e-7));
    }

    #[test]
    fn test_l2_loss() {
        let device = Default::default();
        let weight = Tensor::<TestBackend, 2>::from_floats([[1.0, 2.0], [-2.0, 0.0]], &device);

        let loss = l2_loss(weight).into_scalar();
        assert!((loss - 4.5).abs() < 1e-6);
    }
}
