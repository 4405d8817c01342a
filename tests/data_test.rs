#[cfg(test)]
mod tests {
    use burn::backend::NdArray;
    use ndarray::Array4;
    use stae::data::{Stream, VideoSource, VolumeDataset};

    type Backend = NdArray<f32>;

    /// Count the batches one evaluation pass yields.
    fn drain<S: VideoSource>(source: &mut S) -> usize {
        let device = Default::default();
        let mut batches = 0;
        while source
            .next_batch::<Backend>(Stream::Evaluation, &device)
            .is_some()
        {
            batches += 1;
        }
        batches
    }

    #[test]
    fn test_frame_windows_feed_the_source() {
        let frames = Array4::from_shape_fn((20, 8, 8, 1), |(i, _, _, _)| i as f32);
        // Windows start at 0, 2, ..., 10
        let volumes = VolumeDataset::volumes_from_frames(&frames, 10, 2).unwrap();
        assert_eq!(volumes.dim(), (6, 10, 8, 8, 1));

        let mut data = VolumeDataset::new(volumes.clone(), volumes, 4).unwrap();
        assert_eq!(data.temporal_length(), 10);
        assert_eq!(data.channels(), 1);
        assert_eq!(data.num_batches(Stream::Evaluation), Some(1));

        assert_eq!(drain(&mut data), 1);
        assert_eq!(drain(&mut data), 0);

        data.reset(Stream::Evaluation);
        assert_eq!(drain(&mut data), 1);
    }

    #[test]
    fn test_batches_keep_frame_order() {
        let device = Default::default();
        let frames = Array4::from_shape_fn((6, 2, 2, 1), |(i, _, _, _)| i as f32);
        let volumes = VolumeDataset::volumes_from_frames(&frames, 3, 3).unwrap();
        let mut data = VolumeDataset::new(volumes.clone(), volumes, 2).unwrap();

        let batch = data
            .next_batch::<Backend>(Stream::Training, &device)
            .unwrap();
        assert_eq!(batch.dims(), [2, 3, 2, 2, 1]);

        let values = batch.into_data().to_vec::<f32>().unwrap();
        let firsts: Vec<f32> = values.chunks(4).map(|frame| frame[0]).collect();
        assert_eq!(firsts, vec![0.0, 1.0, 2.0, 3.0, 4.0, 5.0]);
    }
}
