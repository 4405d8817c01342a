//! # Video Sources
//!
//! The autoencoder pulls batches from a [`VideoSource`] with two independent
//! cursors selected by [`Stream`].
//!
//! | Stream | End of data |
//! |--------|-------------|
//! | [`Stream::Training`] | wraps around, never runs dry once it holds a full batch |
//! | [`Stream::Evaluation`] | returns `None` until [`VideoSource::reset`] |
//!
//! Batches are `[batch, time, height, width, channels]` tensors.
//!
//! ## Example
//!
//! ```ignore
//! use ndarray::Array5;
//! use stae::data::{Stream, VideoSource, VolumeDataset};
//!
//! let train = Array5::<f32>::zeros((64, 10, 227, 227, 1));
//! let eval = Array5::<f32>::zeros((16, 10, 227, 227, 1));
//! let mut data = VolumeDataset::new(train, eval, 4)?.with_shuffle(42);
//!
//! let batch = data.next_batch::<Backend>(Stream::Training, &device);
//! ```

use burn::tensor::backend::Backend;
use burn::tensor::Tensor;
use ndarray::{s, Array4, Array5, Axis};
use rand::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{AutoencoderError, Result};

/// Which cursor feeds a call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Stream {
    Training,
    Evaluation,
}

/// Supplier of fixed-shape video batches.
pub trait VideoSource {
    /// Channels per frame
    fn channels(&self) -> usize;

    /// Frames per volume
    fn temporal_length(&self) -> usize;

    /// Volumes per batch
    fn batch_size(&self) -> usize;

    /// Next batch of `stream`, or `None` when the stream has run dry.
    fn next_batch<B: Backend>(&mut self, stream: Stream, device: &B::Device)
        -> Option<Tensor<B, 5>>;

    /// Rewind `stream` to its first batch.
    fn reset(&mut self, stream: Stream);

    /// Batches in one pass over `stream`, when known.
    fn num_batches(&self, stream: Stream) -> Option<usize>;
}

/// In-memory training and evaluation volumes.
///
/// Both sets are `[volumes, time, height, width, channels]` and must agree on
/// every axis but the first. A trailing partial batch is never emitted.
#[derive(Debug, Clone)]
pub struct VolumeDataset {
    training: Array5<f32>,
    evaluation: Array5<f32>,
    batch_size: usize,
    order: Vec<usize>,
    train_cursor: usize,
    eval_cursor: usize,
    rng: Option<StdRng>,
}

impl VolumeDataset {
    /// Create a dataset
    ///
    /// # Arguments
    /// * `training` - Volumes for the training stream
    /// * `evaluation` - Volumes for the evaluation stream, may be empty
    /// * `batch_size` - Volumes per emitted batch
    pub fn new(training: Array5<f32>, evaluation: Array5<f32>, batch_size: usize) -> Result<Self> {
        if batch_size == 0 {
            return Err(AutoencoderError::InvalidConfig(
                "batch_size must be positive".to_string(),
            ));
        }

        let volume = &training.shape()[1..];
        if volume != &evaluation.shape()[1..] {
            return Err(AutoencoderError::InvalidConfig(format!(
                "training volumes {:?} and evaluation volumes {:?} differ in shape",
                volume,
                &evaluation.shape()[1..]
            )));
        }
        if volume.contains(&0) {
            return Err(AutoencoderError::InvalidConfig(format!(
                "volume shape {volume:?} has an empty axis"
            )));
        }

        let order = (0..training.len_of(Axis(0))).collect();

        Ok(Self {
            training,
            evaluation,
            batch_size,
            order,
            train_cursor: 0,
            eval_cursor: 0,
            rng: None,
        })
    }

    /// Cut a frame sequence `[frames, height, width, channels]` into
    /// volumes of `temporal_length` frames starting every `stride` frames.
    pub fn volumes_from_frames(
        frames: &Array4<f32>,
        temporal_length: usize,
        stride: usize,
    ) -> Result<Array5<f32>> {
        if temporal_length == 0 || stride == 0 {
            return Err(AutoencoderError::InvalidConfig(format!(
                "temporal_length ({temporal_length}) and stride ({stride}) must be positive"
            )));
        }

        let (count, height, width, channels) = frames.dim();
        let windows: Vec<_> = (0..count.saturating_sub(temporal_length - 1))
            .step_by(stride)
            .map(|start| frames.slice(s![start..start + temporal_length, .., .., ..]))
            .collect();

        if windows.is_empty() {
            return Ok(Array5::zeros((0, temporal_length, height, width, channels)));
        }

        ndarray::stack(Axis(0), &windows)
            .map_err(|err| AutoencoderError::InvalidConfig(format!("cannot stack volumes: {err}")))
    }

    /// Reshuffle the training volumes on every pass with a seeded RNG.
    pub fn with_shuffle(mut self, seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        self.order.shuffle(&mut rng);
        self.rng = Some(rng);
        self
    }

    /// `[height, width]` of every frame
    pub fn frame_size(&self) -> [usize; 2] {
        let shape = self.training.shape();
        [shape[2], shape[3]]
    }

    /// Volumes held by `stream`
    pub fn len(&self, stream: Stream) -> usize {
        self.volumes(stream).len_of(Axis(0))
    }

    pub fn is_empty(&self, stream: Stream) -> bool {
        self.len(stream) == 0
    }

    fn volumes(&self, stream: Stream) -> &Array5<f32> {
        match stream {
            Stream::Training => &self.training,
            Stream::Evaluation => &self.evaluation,
        }
    }

    fn to_tensor<B: Backend>(
        volumes: &Array5<f32>,
        indices: &[usize],
        device: &B::Device,
    ) -> Tensor<B, 5> {
        let shape = volumes.shape();

        let data: Vec<f32> = indices
            .iter()
            .flat_map(|&i| volumes.index_axis(Axis(0), i).into_iter().copied())
            .collect();

        Tensor::<B, 1>::from_floats(data.as_slice(), device).reshape([
            indices.len(),
            shape[1],
            shape[2],
            shape[3],
            shape[4],
        ])
    }

    fn next_training<B: Backend>(&mut self, device: &B::Device) -> Option<Tensor<B, 5>> {
        if self.order.len() < self.batch_size {
            return None;
        }

        if self.train_cursor + self.batch_size > self.order.len() {
            self.train_cursor = 0;
            if let Some(rng) = self.rng.as_mut() {
                self.order.shuffle(rng);
            }
            debug!("training stream wrapped around");
        }

        let indices = &self.order[self.train_cursor..self.train_cursor + self.batch_size];
        let batch = Self::to_tensor(&self.training, indices, device);
        self.train_cursor += self.batch_size;
        Some(batch)
    }

    fn next_evaluation<B: Backend>(&mut self, device: &B::Device) -> Option<Tensor<B, 5>> {
        if self.eval_cursor + self.batch_size > self.len(Stream::Evaluation) {
            return None;
        }

        let indices: Vec<usize> = (self.eval_cursor..self.eval_cursor + self.batch_size).collect();
        let batch = Self::to_tensor(&self.evaluation, &indices, device);
        self.eval_cursor += self.batch_size;
        Some(batch)
    }
}

impl VideoSource for VolumeDataset {
    fn channels(&self) -> usize {
        self.training.shape()[4]
    }

    fn temporal_length(&self) -> usize {
        self.training.shape()[1]
    }

    fn batch_size(&self) -> usize {
        self.batch_size
    }

    fn next_batch<B: Backend>(
        &mut self,
        stream: Stream,
        device: &B::Device,
    ) -> Option<Tensor<B, 5>> {
        match stream {
            Stream::Training => self.next_training(device),
            Stream::Evaluation => self.next_evaluation(device),
        }
    }

    fn reset(&mut self, stream: Stream) {
        match stream {
            Stream::Training => self.train_cursor = 0,
            Stream::Evaluation => self.eval_cursor = 0,
        }
    }

    fn num_batches(&self, stream: Stream) -> Option<usize> {
        Some(self.len(stream) / self.batch_size)
    }
}
