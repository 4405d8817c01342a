//! # Building Blocks
//!
//! Layers shared by the spatial encoder and decoder:
//!
//! | Layer | Role |
//! |-------|------|
//! | [`ConvStage`] | strided `VALID` convolution, batch norm, tanh |
//! | [`DeconvStage`] | strided transposed convolution sized to an exact target |
//! | [`FeatureNorm`] | batch normalization driven by an explicit [`Phase`] |
//!
//! Both stages and the recurrent cell convolve through [`im2col`], which
//! lowers every convolution to slices and one batched `matmul`.
//!
//! Parameters are created by the helpers in [`init`]: convolution filters use
//! Glorot-uniform initialization and biases start at a small constant. Every
//! parameter except the biases contributes to the L2 penalty: filters and the
//! batch-norm scale and shift. Each layer exposes its share through `l2_loss`.

pub mod conv;
pub mod im2col;
pub mod init;
pub mod norm;

pub use conv::{ConvStage, DeconvStage, StageSpec};
pub use norm::{FeatureNorm, Phase};
