mod decode;
mod model;
mod state;

pub use decode::DecodeStrategy;
pub use model::{TrajectoryPredictor, TrajectoryPredictorConfig};
pub use state::RecurrentState;
