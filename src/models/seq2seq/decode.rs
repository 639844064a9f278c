use serde::{Deserialize, Serialize};

/// What the decoder feeds into the recurrent layer after the first
/// predicted point.
///
/// Training uses [`DecodeStrategy::TeacherForced`] while evaluation uses
/// [`DecodeStrategy::Autoregressive`], so a trained model never practices
/// conditioning on its own output. That mismatch is kept on purpose.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeStrategy {
    /// Ground truth future point `i` is the input for step `i + 1`.
    TeacherForced,
    /// The previous prediction is the next input.
    Autoregressive,
}
