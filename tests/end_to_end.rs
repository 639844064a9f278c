use burn::backend::ndarray::NdArrayDevice;
use burn::backend::{Autodiff, NdArray};
use std::fs;

use trajectory_predictor::data::trajectory::{load_from_dir, Point, TrajectoryItem};
use trajectory_predictor::learner::{run, TrainingConfig};
use trajectory_predictor::models::seq2seq::TrajectoryPredictorConfig;

type Backend = Autodiff<NdArray<f32>>;

fn zero_trajectories(count: usize) -> Vec<TrajectoryItem> {
    let points: Vec<Point> = vec![[0.0, 0.0]; 20];
    (0..count)
        .map(|_| TrajectoryItem::split(&points, 10))
        .collect()
}

#[test]
fn zero_trajectories_loss_trends_down() {
    let config = TrainingConfig::new(TrajectoryPredictorConfig::new(2, 2))
        .with_num_epochs(50)
        .with_learning_rate(1.0e-2);
    let items = zero_trajectories(4);

    let (_, losses, test_loss) = run::<Backend>(&config, items.clone(), items, NdArrayDevice::Cpu);

    let first = losses[0];
    let last = losses[losses.len() - 1];
    assert_eq!(losses.len(), 50);
    assert!(last < first || first < 1e-3, "loss went from {} to {}", first, last);
    assert!(test_loss.is_finite());
}

#[test]
fn single_epoch_on_zero_trajectories() {
    let config = TrainingConfig::new(TrajectoryPredictorConfig::new(2, 2)).with_num_epochs(1);
    let items = zero_trajectories(4);

    let (model, losses, test_loss) =
        run::<Backend>(&config, items.clone(), items, NdArrayDevice::Cpu);

    assert_eq!(model.batch_size(), 4);
    assert_eq!(losses.len(), 1);
    assert!(losses[0].is_finite());
    assert!(test_loss >= 0.0);
}

#[test]
fn trains_from_files_on_disk() {
    let dir = tempfile::tempdir().unwrap();
    let mut text = String::new();
    for n in 0..6 {
        for t in 0..20 {
            text.push_str(&format!("{} {}\n", 0.05 * t as f32, 0.01 * (n * t) as f32));
        }
        text.push('\n');
    }
    fs::write(dir.path().join("walk.txt"), text).unwrap();

    let config = TrainingConfig::new(TrajectoryPredictorConfig::new(2, 2)).with_num_epochs(2);
    let items = load_from_dir(dir.path(), config.lengths()).unwrap();
    assert_eq!(items.len(), 6);

    let (_, losses, test_loss) = run::<Backend>(&config, items.clone(), items, NdArrayDevice::Cpu);

    assert_eq!(losses.len(), 2);
    assert!(test_loss.is_finite());
}
