use burn::tensor::{backend::Backend, Tensor};

/// Hidden and cell state of a single-layer LSTM, each `[1, N, D_out]`.
///
/// A state belongs to exactly one forward pass over one batch. It is passed
/// by value through every step and dropped when the batch is done.
#[derive(Clone, Debug)]
pub struct RecurrentState<B: Backend> {
    pub hidden: Tensor<B, 3>,
    pub cell: Tensor<B, 3>,
}

impl<B: Backend> RecurrentState<B> {
    pub fn zeros(batch_size: usize, d_hidden: usize, device: &B::Device) -> Self {
        Self {
            hidden: Tensor::zeros_device([1, batch_size, d_hidden], device),
            cell: Tensor::zeros_device([1, batch_size, d_hidden], device),
        }
    }

    pub fn dims(&self) -> [usize; 3] {
        self.hidden.dims()
    }

    /// Layer dimension dropped, in the `(cell, hidden)` order `Lstm` expects.
    pub(crate) fn into_lstm(self) -> (Tensor<B, 2>, Tensor<B, 2>) {
        (self.cell.squeeze(0), self.hidden.squeeze(0))
    }

    /// Rebuilds the state from the `[N, 1, D]` outputs of a one-step `Lstm` call.
    pub(crate) fn from_lstm(cell: Tensor<B, 3>, hidden: Tensor<B, 3>) -> Self {
        let [batch, _, d_hidden] = hidden.dims();
        Self {
            hidden: hidden.reshape([1, batch, d_hidden]),
            cell: cell.reshape([1, batch, d_hidden]),
        }
    }
}
