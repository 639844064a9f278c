use anyhow::{anyhow, Context};
use burn::backend::ndarray::NdArrayDevice;
use burn::backend::{Autodiff, NdArray};
use burn::config::Config;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use trajectory_predictor::data::trajectory::load_from_dir;
use trajectory_predictor::learner::{run, TrainingConfig};
use trajectory_predictor::models::seq2seq::TrajectoryPredictorConfig;

type Backend = Autodiff<NdArray<f32>>;

const DEFAULT_DATA_DIR: &str = "train_data/stanford";

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = match std::env::var("TRAJECTORY_CONFIG") {
        Ok(path) => TrainingConfig::load(&path)
            .map_err(|err| anyhow!("failed to load config {}: {}", path, err))?,
        Err(_) => TrainingConfig::new(TrajectoryPredictorConfig::new(2, 2)),
    };
    config.validate().context("invalid training config")?;

    let data_dir = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_DATA_DIR.to_string());
    let items = load_from_dir(&data_dir, config.lengths())
        .with_context(|| format!("failed to load trajectories from {}", data_dir))?;
    info!("{} trajectories", items.len());

    warn!("evaluating on the training data, no held out split is configured");
    let test_items = items.clone();

    run::<Backend>(&config, items, test_items, NdArrayDevice::Cpu);

    Ok(())
}
