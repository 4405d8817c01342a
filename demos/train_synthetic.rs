//! Training Demo - Anomalies in Synthetic Video
//!
//! Trains the autoencoder on clips of a square drifting right, then scores
//! clips in which a second object appears halfway through. Frames with the
//! intruder should reconstruct worse than the normal ones.
//!
//! Run with `RUST_LOG=stae=debug` to see every training step.

use burn::backend::{Autodiff, NdArray};
use ndarray::{s, Array4};
use stae::prelude::*;
use tracing_subscriber::EnvFilter;

type Backend = Autodiff<NdArray<f32>>;

const SIZE: usize = 39;
const FRAMES: usize = 60;
const TIME: usize = 6;

/// A 7x7 square drifting one pixel per frame, optionally with a second
/// square appearing from frame `intruder_from`.
fn render(offset: usize, intruder_from: Option<usize>) -> Array4<f32> {
    let mut frames = Array4::<f32>::zeros((FRAMES, SIZE, SIZE, 1));

    for t in 0..FRAMES {
        let x = (offset + t) % (SIZE - 7);
        let y = (offset * 3) % (SIZE - 7);
        frames.slice_mut(s![t, y..y + 7, x..x + 7, 0]).fill(1.0);

        if intruder_from.is_some_and(|from| t >= from) {
            frames.slice_mut(s![t, 28..34, 4..10, 0]).fill(0.8);
        }
    }
    frames
}

fn main() -> stae::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "stae=info".into()))
        .init();

    println!("=== Spatio-Temporal Autoencoder Demo ===\n");

    let device = Default::default();

    let normal = render(0, None);
    let train = VolumeDataset::volumes_from_frames(&normal, TIME, 2)?;
    let test = VolumeDataset::volumes_from_frames(&render(5, Some(FRAMES / 2)), TIME, TIME)?;
    println!("  Training volumes: {}", train.len_of(ndarray::Axis(0)));
    println!("  Test volumes:     {}", test.len_of(ndarray::Axis(0)));

    let data = VolumeDataset::new(train, test, 2)?.with_shuffle(7);

    let config = AutoencoderConfig::new(1, TIME, 2, 1e-3, 1e-5)
        .with_seed(Some(42))
        .with_architecture(
            ArchitectureConfig::new()
                .with_conv1_filters(16)
                .with_conv2_filters(16)
                .with_recurrent_filters(vec![16, 8, 16])
                .with_deconv1_filters(16),
        );

    let mut autoencoder = SpatioTemporalAutoencoder::<Backend, _>::new(config, data, &device)?;

    println!("\nTraining...");
    for step in 1..=200 {
        let loss = autoencoder.train_step()?;
        if step % 50 == 0 {
            println!("  step {step:>4}  loss {loss:.4}");
        }
    }

    println!("\nPer-frame reconstruction error (intruder from frame {}):", FRAMES / 2);
    let mut frame = 0;
    while let Some(errors) = autoencoder.per_pixel_and_per_frame_errors()? {
        let per_frame = errors
            .per_frame
            .into_data()
            .to_vec::<f32>()
            .unwrap_or_default();
        for error in per_frame {
            let marker = if frame >= FRAMES / 2 { "*" } else { " " };
            println!("  {marker} frame {frame:>3}  {error:>10.3}");
            frame += 1;
        }
    }

    let dir = std::env::temp_dir().join("stae-demo");
    autoencoder.save(&dir)?;
    println!("\nCheckpoint written to {}", dir.display());

    println!("\n=== Demo completed! ===");
    Ok(())
}
