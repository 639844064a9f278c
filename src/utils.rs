use burn::tensor::{backend::Backend, Tensor};

/// Offset added to the difference before taking the norm, keeping the
/// gradient finite when a prediction matches its target exactly.
pub const PAIRWISE_EPS: f32 = 1e-6;

/// Row-wise euclidean distance `||x1 - x2 + eps||` between `[N, D]` tensors.
pub fn pairwise_distance<B: Backend>(x1: Tensor<B, 2>, x2: Tensor<B, 2>) -> Tensor<B, 1> {
    let diff = x1 - x2 + PAIRWISE_EPS;
    (diff.clone() * diff).sum_dim(1).sqrt().squeeze(1)
}

/// Distances between every predicted point and its ground truth, summed
/// over batch and timesteps.
pub fn trajectory_loss<B: Backend>(
    ground_truth: Tensor<B, 3>,
    predictions: Tensor<B, 3>,
) -> Tensor<B, 1> {
    let [batch, seq, dim] = ground_truth.dims();
    assert_eq!(
        predictions.dims(),
        [batch, seq, dim],
        "predictions must match the ground truth shape"
    );

    let ground_truth = ground_truth.reshape([batch * seq, dim]);
    let predictions = predictions.reshape([batch * seq, dim]);

    pairwise_distance(ground_truth, predictions).sum()
}
