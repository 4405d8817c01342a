//! Training, evaluation and persistence around [`AutoencoderNet`]
//!
//! [`SpatioTemporalAutoencoder`] owns the network, its Adam optimizer and the
//! video source. Training pulls from [`Stream::Training`]; every evaluation
//! call pulls the next batch of [`Stream::Evaluation`] and returns `Ok(None)`
//! once the stream has run dry, rewinding it so the following call starts a
//! fresh pass.
//!
//! Evaluation runs on the inner backend of the model (`AutodiffModule::valid`)
//! with [`Phase::Inference`], so it neither records gradients nor touches
//! the batch-norm running statistics.

use std::path::{Path, PathBuf};

use burn::config::Config;
use burn::module::{AutodiffModule, Module};
use burn::optim::adaptor::OptimizerAdaptor;
use burn::optim::{Adam, AdamConfig, GradientsParams, Optimizer};
use burn::record::{BinFileRecorder, FullPrecisionSettings, Recorder};
use burn::tensor::backend::{AutodiffBackend, Backend};
use burn::tensor::{ElementConversion, Tensor};
use tracing::{debug, info};

use crate::config::AutoencoderConfig;
use crate::data::{Stream, VideoSource};
use crate::error::{AutoencoderError, Result};
use crate::layers::Phase;
use crate::model::{AutoencoderNet, Objective, ReconstructionErrors};

/// File holding parameters and running statistics, inside a checkpoint directory
pub const MODEL_FILE: &str = "model.ckpt.bin";
/// File holding the optimizer moments
pub const OPTIMIZER_FILE: &str = "model.ckpt.optim.bin";
/// File holding the configuration the checkpoint was written with
pub const CONFIG_FILE: &str = "config.json";

type Inner<B> = <B as AutodiffBackend>::InnerBackend;
type ModelRecord<B> = <AutoencoderNet<B> as Module<B>>::Record;
type OptimizerRecord<B> =
    <OptimizerAdaptor<Adam, AutoencoderNet<B>, B> as Optimizer<AutoencoderNet<B>, B>>::Record;

/// Spatio-temporal autoencoder with its optimizer and data streams
///
/// Every operation is a blocking call that takes `&mut self`; the model and
/// both stream cursors are owned here.
///
/// # Example
///
/// ```ignore
/// use stae::prelude::*;
///
/// let config = AutoencoderConfig::new(1, 10, 4, 1e-4, 1e-5);
/// let mut autoencoder = SpatioTemporalAutoencoder::<Backend, _>::new(config, data, &device)?;
///
/// for _ in 0..1000 {
///     let loss = autoencoder.train_step()?;
/// }
///
/// while let Some(errors) = autoencoder.per_pixel_and_per_frame_errors()? {
///     // errors.per_frame: [batch, time] anomaly scores
/// }
/// autoencoder.save("checkpoints/run1")?;
/// ```
pub struct SpatioTemporalAutoencoder<B: AutodiffBackend, S: VideoSource> {
    config: AutoencoderConfig,
    source: S,
    model: AutoencoderNet<B>,
    optimizer: OptimizerAdaptor<Adam, AutoencoderNet<B>, B>,
    device: B::Device,
    steps: usize,
}

impl<B: AutodiffBackend, S: VideoSource> SpatioTemporalAutoencoder<B, S> {
    /// Build the network and optimizer for `source`.
    ///
    /// The configured channel count, temporal length and batch size must
    /// match what the source produces.
    pub fn new(config: AutoencoderConfig, source: S, device: &B::Device) -> Result<Self> {
        config.validate()?;

        let expected = (config.channels, config.temporal_length, config.batch_size);
        let actual = (
            source.channels(),
            source.temporal_length(),
            source.batch_size(),
        );
        if expected != actual {
            return Err(AutoencoderError::InvalidConfig(format!(
                "configured (channels, temporal_length, batch_size) {expected:?} \
                 but the source produces {actual:?}"
            )));
        }

        if let Some(seed) = config.seed {
            B::seed(seed);
        }

        let model = AutoencoderNet::new(config.channels, &config.architecture, device);
        let optimizer = Self::optimizer(&config);

        info!(
            parameters = model.num_params(),
            channels = config.channels,
            temporal_length = config.temporal_length,
            batch_size = config.batch_size,
            "autoencoder initialized"
        );

        Ok(Self {
            config,
            source,
            model,
            optimizer,
            device: device.clone(),
            steps: 0,
        })
    }

    fn optimizer(config: &AutoencoderConfig) -> OptimizerAdaptor<Adam, AutoencoderNet<B>, B> {
        AdamConfig::new().with_epsilon(config.epsilon).init()
    }

    pub fn config(&self) -> &AutoencoderConfig {
        &self.config
    }

    pub fn model(&self) -> &AutoencoderNet<B> {
        &self.model
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn source_mut(&mut self) -> &mut S {
        &mut self.source
    }

    /// Optimizer steps taken since construction.
    pub fn steps(&self) -> usize {
        self.steps
    }

    /// Run one optimization step on the next training batch.
    ///
    /// Returns the total loss of that batch before the update.
    pub fn train_step(&mut self) -> Result<f32> {
        let batch = self
            .source
            .next_batch::<B>(Stream::Training, &self.device)
            .ok_or(AutoencoderError::TrainingStreamExhausted)?;
        self.check_batch(batch.dims())?;

        let model = self.model.clone();
        let output = model.forward(batch.clone(), Phase::Training);
        let objective = Self::objective(
            &model,
            ReconstructionErrors::new(batch, output),
            self.config.regularization,
        );
        let loss = objective.total.clone().into_scalar().elem::<f32>();
        let reconstruction = objective.reconstruction.into_scalar().elem::<f32>();
        let regularization = objective.regularization.into_scalar().elem::<f32>();

        // Running statistics must be final before the parameters move.
        model.sync_statistics();

        let grads = GradientsParams::from_grads(objective.total.backward(), &model);
        self.model = self
            .optimizer
            .step(self.config.learning_rate, model, grads);
        self.steps += 1;

        debug!(
            step = self.steps,
            loss,
            reconstruction,
            regularization,
            "training step"
        );
        Ok(loss)
    }

    /// Total loss on the next evaluation batch, without updating anything.
    pub fn eval_loss(&mut self) -> Result<Option<f32>> {
        let Some(batch) = self.next_evaluation_batch()? else {
            return Ok(None);
        };

        let model = self.model.valid();
        let reconstruction = model.forward(batch.clone(), Phase::Inference);
        let objective = Self::objective(
            &model,
            ReconstructionErrors::new(batch, reconstruction),
            self.config.regularization,
        );

        Ok(Some(objective.total.into_scalar().elem::<f32>()))
    }

    /// Next evaluation batch and its reconstruction.
    pub fn reconstruct(&mut self) -> Result<Option<(Tensor<Inner<B>, 5>, Tensor<Inner<B>, 5>)>> {
        let Some(batch) = self.next_evaluation_batch()? else {
            return Ok(None);
        };

        let reconstruction = self.model.valid().forward(batch.clone(), Phase::Inference);
        Ok(Some((batch, reconstruction)))
    }

    /// Reconstruction of the next evaluation batch.
    pub fn batch_reconstruct(&mut self) -> Result<Option<Tensor<Inner<B>, 5>>> {
        Ok(self.reconstruct()?.map(|(_, reconstruction)| reconstruction))
    }

    /// Squared-error maps of the next evaluation batch.
    pub fn per_pixel_and_per_frame_errors(
        &mut self,
    ) -> Result<Option<ReconstructionErrors<Inner<B>>>> {
        Ok(self
            .reconstruct()?
            .map(|(batch, reconstruction)| ReconstructionErrors::new(batch, reconstruction)))
    }

    /// Mean evaluation loss over one full pass, `None` when the evaluation
    /// stream holds no complete batch.
    pub fn evaluate_epoch(&mut self) -> Result<Option<f32>> {
        self.source.reset(Stream::Evaluation);

        let mut total = 0.0;
        let mut batches = 0usize;
        while let Some(loss) = self.eval_loss()? {
            total += loss;
            batches += 1;
        }

        let mean = (batches > 0).then(|| total / batches as f32);
        info!(batches, loss = ?mean, "evaluation pass finished");
        Ok(mean)
    }

    /// Write parameters, running statistics, optimizer state and
    /// configuration into the directory `path`.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let dir = path.as_ref();
        std::fs::create_dir_all(dir).map_err(|source| AutoencoderError::Io {
            path: dir.to_path_buf(),
            source,
        })?;

        self.model.sync_statistics();
        let recorder = BinFileRecorder::<FullPrecisionSettings>::new();

        let model_path = dir.join(MODEL_FILE);
        Recorder::<B>::record(&recorder, self.model.clone().into_record(), model_path.clone())
            .map_err(|source| AutoencoderError::Record {
                path: model_path,
                source,
            })?;

        let optimizer_path = dir.join(OPTIMIZER_FILE);
        Recorder::<B>::record(&recorder, self.optimizer.to_record(), optimizer_path.clone())
            .map_err(|source| AutoencoderError::Record {
                path: optimizer_path,
                source,
            })?;

        let config_path = dir.join(CONFIG_FILE);
        self.config
            .save(&config_path)
            .map_err(|source| AutoencoderError::Io {
                path: config_path,
                source,
            })?;

        info!(path = %dir.display(), steps = self.steps, "checkpoint saved");
        Ok(())
    }

    /// Load a checkpoint written by [`save`](Self::save).
    ///
    /// Every file is read and checked before the model or optimizer change,
    /// so a failed restore leaves the instance as it was.
    pub fn restore<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        let dir = path.as_ref();
        if !dir.is_dir() {
            return Err(AutoencoderError::Io {
                path: dir.to_path_buf(),
                source: std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    "checkpoint directory does not exist",
                ),
            });
        }

        let stored = AutoencoderConfig::load(dir.join(CONFIG_FILE))?;
        if stored.channels != self.config.channels {
            return Err(AutoencoderError::IncompatibleCheckpoint(format!(
                "checkpoint has {} channels, this model has {}",
                stored.channels, self.config.channels
            )));
        }
        if stored.architecture != self.config.architecture {
            return Err(AutoencoderError::IncompatibleCheckpoint(format!(
                "checkpoint architecture {} differs from {}",
                stored.architecture, self.config.architecture
            )));
        }

        let recorder = BinFileRecorder::<FullPrecisionSettings>::new();
        let model_record: ModelRecord<B> =
            read_record(&recorder, dir.join(MODEL_FILE), &self.device)?;
        let optimizer_record: OptimizerRecord<B> =
            read_record(&recorder, dir.join(OPTIMIZER_FILE), &self.device)?;

        self.model = self.model.clone().load_record(model_record);
        self.optimizer = Self::optimizer(&self.config).load_record(optimizer_record);

        info!(path = %dir.display(), "checkpoint restored");
        Ok(())
    }

    fn objective<M: Backend>(
        model: &AutoencoderNet<M>,
        errors: ReconstructionErrors<M>,
        lambda: f64,
    ) -> Objective<M> {
        Objective::new(errors.loss(), model.regularization_loss(), lambda)
    }

    fn next_evaluation_batch(&mut self) -> Result<Option<Tensor<Inner<B>, 5>>> {
        match self
            .source
            .next_batch::<Inner<B>>(Stream::Evaluation, &self.device)
        {
            Some(batch) => {
                self.check_batch(batch.dims())?;
                Ok(Some(batch))
            }
            None => {
                self.source.reset(Stream::Evaluation);
                debug!("evaluation stream exhausted, rewound");
                Ok(None)
            }
        }
    }

    fn check_batch(&self, dims: [usize; 5]) -> Result<()> {
        let [batch, time, height, width, channels] = dims;

        if batch != self.config.batch_size
            || time != self.config.temporal_length
            || channels != self.config.channels
        {
            return Err(AutoencoderError::ShapeMismatch {
                actual: dims,
                batch: self.config.batch_size,
                time: self.config.temporal_length,
                channels: self.config.channels,
            });
        }
        if self.config.architecture.encoded_size(height, width).is_none() {
            return Err(AutoencoderError::FrameTooSmall { height, width });
        }

        Ok(())
    }
}

fn read_record<B: Backend, R: burn::record::Record<B>>(
    recorder: &BinFileRecorder<FullPrecisionSettings>,
    path: PathBuf,
    device: &B::Device,
) -> Result<R> {
    Recorder::<B>::load(recorder, path.clone(), device)
        .map_err(|source| AutoencoderError::Record { path, source })
}
