use burn::config::Config;
use burn::data::dataloader::DataLoader;
use burn::module::{AutodiffModule, Module};
use burn::optim::{AdamConfig, Optimizer};
use burn::tensor::backend::{AutodiffBackend, Backend};
use burn::tensor::ElementConversion;
use burn::train::{TrainStep, ValidStep};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

use crate::data::batchitem::TrajectoryBatch;
use crate::data::trajectory::{dataloader, SequenceLengths, TrajectoryItem};
use crate::models::seq2seq::{TrajectoryPredictor, TrajectoryPredictorConfig};

#[derive(Config)]
pub struct TrainingConfig {
    pub model: TrajectoryPredictorConfig,

    #[config(default = "AdamConfig::new().with_epsilon(1e-8)")]
    pub optimizer: AdamConfig,

    #[config(default = 40)]
    pub num_epochs: usize,

    #[config(default = 1.0e-3)]
    pub learning_rate: f64,

    #[config(default = 10)]
    pub observed_len: usize,

    #[config(default = 10)]
    pub future_len: usize,

    #[config(default = 42)]
    pub seed: u64,
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("observed_len must be at least 1")]
    EmptyObserved,
    #[error("future_len must be at least 1")]
    EmptyFuture,
}

impl TrainingConfig {
    pub fn lengths(&self) -> SequenceLengths {
        SequenceLengths::new(self.observed_len, self.future_len)
    }

    /// Rejects settings that would only fail once training has started.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.observed_len == 0 {
            return Err(ConfigError::EmptyObserved);
        }
        if self.future_len == 0 {
            return Err(ConfigError::EmptyFuture);
        }
        Ok(())
    }
}

/// Running sum of batch losses and the number of sequences they cover.
#[derive(Debug, Default, Clone, Copy)]
struct LossTracker {
    total: f64,
    count: usize,
}

impl LossTracker {
    fn update(&mut self, loss: f64, actual_batch_size: usize) {
        self.total += loss;
        self.count += actual_batch_size;
    }

    fn mean(&self) -> f64 {
        assert!(self.count > 0, "no sequences were processed");
        self.total / self.count as f64
    }
}

/// Trains with teacher forced decoding and one Adam step per batch.
/// Returns the trained model and the mean loss of every epoch.
pub fn train<B: AutodiffBackend>(
    mut model: TrajectoryPredictor<B>,
    dataloader: Arc<dyn DataLoader<TrajectoryBatch<B>>>,
    config: &TrainingConfig,
) -> (TrajectoryPredictor<B>, Vec<f64>) {
    let mut optim = config.optimizer.init::<B, TrajectoryPredictor<B>>();
    let mut epoch_losses = Vec::with_capacity(config.num_epochs);

    for epoch in 1..=config.num_epochs {
        let mut tracker = LossTracker::default();

        for (iteration, batch) in dataloader.iter().enumerate() {
            let actual_batch_size = model.actual_batch_size(batch.len());
            let output = TrainStep::step(&model, batch);
            let loss = output.item.loss.clone().into_scalar().elem::<f64>();

            debug!("epoch {} iteration {}: loss {}", epoch, iteration, loss);
            tracker.update(loss, actual_batch_size);

            model = optim.step(config.learning_rate, model, output.grads);
        }

        let mean_loss = tracker.mean();
        info!("epoch {}. mean loss: {}", epoch, mean_loss);
        epoch_losses.push(mean_loss);
    }

    (model, epoch_losses)
}

/// Autoregressive evaluation without parameter updates. Pass a model on a
/// non autodiff backend, e.g. from [`AutodiffModule::valid`].
pub fn evaluate<B: Backend>(
    model: &TrajectoryPredictor<B>,
    dataloader: Arc<dyn DataLoader<TrajectoryBatch<B>>>,
) -> f64 {
    let mut tracker = LossTracker::default();

    for batch in dataloader.iter() {
        let actual_batch_size = model.actual_batch_size(batch.len());
        let output = ValidStep::step(model, batch);
        tracker.update(output.loss.into_scalar().elem::<f64>(), actual_batch_size);
    }

    let mean_loss = tracker.mean();
    info!("mean loss: {}", mean_loss);
    mean_loss
}

/// Trains on `train_items` then evaluates the result on `test_items`.
pub fn run<B: AutodiffBackend>(
    config: &TrainingConfig,
    train_items: Vec<TrajectoryItem>,
    test_items: Vec<TrajectoryItem>,
    device: B::Device,
) -> (TrajectoryPredictor<B>, Vec<f64>, f64) {
    B::seed(config.seed);

    let model = config.model.init::<B>().to_device(&device);
    let batch_size = model.batch_size();

    let train_loader = dataloader::<B>(train_items, batch_size, device.clone());
    let (model, epoch_losses) = train(model, train_loader, config);

    let test_loader = dataloader::<B::InnerBackend>(test_items, batch_size, device);
    let test_loss = evaluate(&model.valid(), test_loader);

    (model, epoch_losses, test_loss)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::trajectory::Point;
    use burn::backend::{Autodiff, NdArray};

    type TestBackend = NdArray<f32>;
    type TestAutodiffBackend = Autodiff<TestBackend>;

    fn items(count: usize) -> Vec<TrajectoryItem> {
        (0..count)
            .map(|n| {
                let points: Vec<Point> = (0..20)
                    .map(|t| {
                        let t = t as f32 * 0.1;
                        [(t + n as f32).sin() * 0.5, t * 0.2 - 0.5]
                    })
                    .collect();
                TrajectoryItem::split(&points, 10)
            })
            .collect()
    }

    #[test]
    fn mean_loss_is_invariant_to_batch_partitioning() {
        TestBackend::seed(3);
        let model = TrajectoryPredictorConfig::new(2, 2).init::<TestBackend>();

        let by_four = evaluate(&model, dataloader(items(14), 4, Default::default()));
        let by_two = evaluate(&model, dataloader(items(14), 2, Default::default()));

        assert!((by_four - by_two).abs() < 1e-4, "{} vs {}", by_four, by_two);
    }

    #[test]
    fn evaluation_does_not_change_parameters() {
        TestBackend::seed(5);
        let model = TrajectoryPredictorConfig::new(2, 2).init::<TestBackend>();

        let first = evaluate(&model, dataloader(items(6), 4, Default::default()));
        let second = evaluate(&model, dataloader(items(6), 4, Default::default()));

        assert_eq!(first, second);
    }

    #[test]
    fn training_reports_one_loss_per_epoch() {
        TestAutodiffBackend::seed(11);
        let config = TrainingConfig::new(TrajectoryPredictorConfig::new(2, 2)).with_num_epochs(3);
        let model = config.model.init::<TestAutodiffBackend>();

        let (_, losses) = train(model, dataloader(items(6), 4, Default::default()), &config);

        assert_eq!(losses.len(), 3);
        assert!(losses.iter().all(|loss| loss.is_finite() && *loss >= 0.0));
    }

    #[test]
    fn training_updates_parameters() {
        TestAutodiffBackend::seed(13);
        let config = TrainingConfig::new(TrajectoryPredictorConfig::new(2, 2))
            .with_num_epochs(1)
            .with_learning_rate(1.0e-2);
        let model = config.model.init::<TestAutodiffBackend>();

        let before = evaluate(&model.valid(), dataloader(items(4), 4, Default::default()));
        let (model, _) = train(model, dataloader(items(4), 4, Default::default()), &config);
        let after = evaluate(&model.valid(), dataloader(items(4), 4, Default::default()));

        assert_ne!(before, after);
    }

    #[test]
    fn default_config_is_valid() {
        let config = TrainingConfig::new(TrajectoryPredictorConfig::new(2, 2));

        assert_eq!(config.validate(), Ok(()));
    }

    #[test]
    fn zero_lengths_are_rejected() {
        let config = TrainingConfig::new(TrajectoryPredictorConfig::new(2, 2));

        assert_eq!(
            config.clone().with_observed_len(0).validate(),
            Err(ConfigError::EmptyObserved)
        );
        assert_eq!(
            config.with_future_len(0).validate(),
            Err(ConfigError::EmptyFuture)
        );
    }

    #[test]
    fn zero_lengths_are_rejected_from_json() {
        let valid = TrainingConfig::new(TrajectoryPredictorConfig::new(2, 2));
        let mut json = serde_json::to_value(&valid).unwrap();
        json["future_len"] = serde_json::json!(0);

        let config: TrainingConfig = serde_json::from_value(json).unwrap();

        assert_eq!(config.validate(), Err(ConfigError::EmptyFuture));
    }

    #[test]
    #[should_panic(expected = "no sequences")]
    fn mean_of_nothing_is_an_error() {
        LossTracker::default().mean();
    }
}
