use burn::config::Config;
use burn::module::Module;
use burn::nn::{Lstm, LstmConfig};
use burn::tensor::backend::AutodiffBackend;
use burn::tensor::{backend::Backend, Tensor};
use burn::train::{RegressionOutput, TrainOutput, TrainStep, ValidStep};

use super::decode::DecodeStrategy;
use super::state::RecurrentState;
use crate::data::batchitem::TrajectoryBatch;
use crate::utils::trajectory_loss;

/// Single-layer LSTM that encodes an observed trajectory step by step and
/// unrolls the same layer to decode its continuation.
#[derive(Module, Debug)]
pub struct TrajectoryPredictor<B: Backend> {
    input_dim: usize,
    output_dim: usize,
    batch_size: usize,
    lstm: Lstm<B>,
}

impl<B: Backend> TrajectoryPredictor<B> {
    pub fn input_dim(&self) -> usize {
        self.input_dim
    }

    pub fn output_dim(&self) -> usize {
        self.output_dim
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn actual_batch_size(&self, batch_len: usize) -> usize {
        batch_len.min(self.batch_size)
    }

    /// Fresh zeroed state, `[1, actual_batch_size, output_dim]`, on `device`.
    pub fn init_state(&self, actual_batch_size: usize, device: &B::Device) -> RecurrentState<B> {
        RecurrentState::zeros(actual_batch_size, self.output_dim, device)
    }

    /// One recurrent step over a `[N, 1, D_in]` input.
    fn recurrent_step(
        &self,
        input: Tensor<B, 3>,
        state: RecurrentState<B>,
    ) -> (Tensor<B, 3>, RecurrentState<B>) {
        let (cell, hidden) = self.lstm.forward(input, Some(state.into_lstm()));
        let output = hidden.clone();

        (output, RecurrentState::from_lstm(cell, hidden))
    }

    /// Feeds every observed point through the layer. Returns the last output,
    /// `[N, 1, D_out]`, which is the first predicted future point.
    pub fn encode(
        &self,
        observed: Tensor<B, 3>,
        state: RecurrentState<B>,
    ) -> (Tensor<B, 3>, RecurrentState<B>) {
        let [batch, observed_len, input_dim] = observed.dims();
        assert_eq!(
            input_dim, self.input_dim,
            "observed points have {} features, model expects {}",
            input_dim, self.input_dim
        );
        assert_eq!(
            state.dims(),
            [1, batch, self.output_dim],
            "recurrent state does not match a batch of {}",
            batch
        );
        assert!(observed_len > 0, "observed sequence is empty");

        let input = observed.clone().slice([0..batch, 0..1, 0..input_dim]);
        let (mut output, mut state) = self.recurrent_step(input, state);
        for i in 1..observed_len {
            let input = observed.clone().slice([0..batch, i..i + 1, 0..input_dim]);
            let (out, next) = self.recurrent_step(input, state);
            state = next;
            output = out;
        }

        (output, state)
    }

    /// Unrolls `future_len` predictions starting from `first`, the encoder's
    /// last output. `future` provides the length and, when teacher forced,
    /// the inputs; autoregressive decoding never reads its values.
    pub fn decode(
        &self,
        first: Tensor<B, 3>,
        state: RecurrentState<B>,
        future: &Tensor<B, 3>,
        strategy: DecodeStrategy,
    ) -> Tensor<B, 3> {
        // predictions are fed back as inputs in either mode
        assert_eq!(
            self.input_dim, self.output_dim,
            "decoding feeds {}-d points into a {}-d input",
            self.output_dim, self.input_dim
        );
        let [batch, future_len, future_dim] = future.dims();
        assert_eq!(
            future_dim, self.output_dim,
            "future points have {} features, model predicts {}",
            future_dim, self.output_dim
        );
        assert!(future_len > 0, "future sequence is empty");

        let mut state = state;
        let mut previous = first.clone();
        let mut predictions = Vec::with_capacity(future_len);
        predictions.push(first);

        for i in 0..future_len - 1 {
            let input = match strategy {
                DecodeStrategy::TeacherForced => {
                    future.clone().slice([0..batch, i..i + 1, 0..future_dim])
                }
                DecodeStrategy::Autoregressive => previous,
            };

            let (pred, next) = self.recurrent_step(input, state);
            state = next;
            predictions.push(pred.clone());
            previous = pred;
        }

        Tensor::cat(predictions, 1)
    }

    /// Encode then decode one batch from a freshly zeroed state.
    pub fn forward(&self, batch: &TrajectoryBatch<B>, strategy: DecodeStrategy) -> Tensor<B, 3> {
        let batch_len = batch.len();
        let actual_batch_size = self.actual_batch_size(batch_len);
        assert_eq!(
            actual_batch_size, batch_len,
            "batch of {} exceeds the configured batch size {}",
            batch_len, self.batch_size
        );

        let state = self.init_state(actual_batch_size, &batch.observed.device());
        let (first, state) = self.encode(batch.observed.clone(), state);

        self.decode(first, state, &batch.future, strategy)
    }

    pub fn forward_regression(
        &self,
        batch: TrajectoryBatch<B>,
        strategy: DecodeStrategy,
    ) -> RegressionOutput<B> {
        let preds = self.forward(&batch, strategy);
        let loss = trajectory_loss(batch.future.clone(), preds.clone());

        let [n, future_len, dim] = preds.dims();
        let output = preds.reshape([n, future_len * dim]);
        let targets = batch.future.reshape([n, future_len * dim]);

        RegressionOutput::new(loss, output, targets)
    }
}

impl<B: AutodiffBackend> TrainStep<TrajectoryBatch<B>, RegressionOutput<B>>
    for TrajectoryPredictor<B>
{
    fn step(&self, batch: TrajectoryBatch<B>) -> TrainOutput<RegressionOutput<B>> {
        let item = self.forward_regression(batch, DecodeStrategy::TeacherForced);
        TrainOutput::new(self, item.loss.backward(), item)
    }
}

impl<B: Backend> ValidStep<TrajectoryBatch<B>, RegressionOutput<B>> for TrajectoryPredictor<B> {
    fn step(&self, batch: TrajectoryBatch<B>) -> RegressionOutput<B> {
        self.forward_regression(batch, DecodeStrategy::Autoregressive)
    }
}

#[derive(Config, Debug)]
pub struct TrajectoryPredictorConfig {
    input_dim: usize,
    output_dim: usize,

    #[config(default = 4)]
    batch_size: usize,
}

impl TrajectoryPredictorConfig {
    pub fn init<B: Backend>(&self) -> TrajectoryPredictor<B> {
        TrajectoryPredictor {
            input_dim: self.input_dim,
            output_dim: self.output_dim,
            batch_size: self.batch_size,
            lstm: LstmConfig::new(self.input_dim, self.output_dim, true).init(),
        }
    }
}
