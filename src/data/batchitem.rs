use burn::tensor::{backend::Backend, Tensor};

#[derive(Clone, Debug)]
pub struct TrajectoryBatch<B: Backend> {
    pub observed: Tensor<B, 3>, // [N, L1, D_in]
    pub future: Tensor<B, 3>,   // [N, L2, D_out]
}

impl<B: Backend> TrajectoryBatch<B> {
    pub fn new(observed: Tensor<B, 3>, future: Tensor<B, 3>) -> Self {
        assert_eq!(
            observed.dims()[0],
            future.dims()[0],
            "observed and future sequences must be paired by index"
        );

        Self { observed, future }
    }

    /// Number of paired sequences in the batch.
    pub fn len(&self) -> usize {
        self.observed.dims()[0]
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
