use burn::data::dataloader::batcher::Batcher;
use burn::data::dataloader::{DataLoader, DataLoaderBuilder};
use burn::data::dataset::InMemDataset;
use burn::tensor::backend::Backend;
use burn::tensor::{Data, Shape, Tensor};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

use crate::data::batchitem::TrajectoryBatch;
use crate::data::error::DataError;

/// A planar `(x, y)` position at one timestep.
pub type Point = [f32; 2];

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct SequenceLengths {
    pub observed: usize,
    pub future: usize,
}

impl SequenceLengths {
    pub fn new(observed: usize, future: usize) -> Self {
        Self { observed, future }
    }

    pub fn total(&self) -> usize {
        self.observed + self.future
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct TrajectoryItem {
    pub observed: Vec<Point>,
    pub future: Vec<Point>,
}

impl TrajectoryItem {
    /// Splits a full trajectory into its observed prefix and future suffix.
    ///
    /// # Panics
    ///
    /// Panics if `points` holds fewer than `observed_len` points.
    pub fn split(points: &[Point], observed_len: usize) -> Self {
        let (observed, future) = points.split_at(observed_len);
        Self {
            observed: observed.to_vec(),
            future: future.to_vec(),
        }
    }
}

/// Parses trajectory text: one `x y` (or `x,y`) point per line, blank lines
/// between trajectories, `#` starts a comment line.
pub fn parse_trajectories(
    text: &str,
    path: &Path,
    lengths: SequenceLengths,
) -> Result<Vec<TrajectoryItem>, DataError> {
    let mut items = Vec::new();
    let mut points: Vec<Point> = Vec::new();
    let mut last_line = 0;

    let mut flush = |points: &mut Vec<Point>, line: usize| -> Result<(), DataError> {
        if points.is_empty() {
            return Ok(());
        }
        if points.len() != lengths.total() {
            return Err(DataError::Length {
                path: path.to_path_buf(),
                line,
                found: points.len(),
                expected: lengths.total(),
            });
        }
        items.push(TrajectoryItem::split(points, lengths.observed));
        points.clear();
        Ok(())
    };

    for (idx, line) in text.lines().enumerate() {
        let line_no = idx + 1;
        let line = line.trim();

        if line.starts_with('#') {
            continue;
        }
        if line.is_empty() {
            flush(&mut points, last_line)?;
            continue;
        }

        let tokens: Vec<&str> = line
            .split(|c: char| c.is_whitespace() || c == ',')
            .filter(|t| !t.is_empty())
            .collect();

        if tokens.len() != 2 {
            return Err(DataError::ColumnCount {
                path: path.to_path_buf(),
                line: line_no,
                found: tokens.len(),
            });
        }

        let mut point: Point = [0.0; 2];
        for (value, token) in point.iter_mut().zip(tokens) {
            *value = token
                .parse::<f32>()
                .ok()
                .filter(|v| v.is_finite())
                .ok_or_else(|| DataError::Parse {
                    path: path.to_path_buf(),
                    line: line_no,
                    token: token.to_string(),
                })?;
        }

        points.push(point);
        last_line = line_no;
    }
    flush(&mut points, last_line)?;

    if items.is_empty() {
        return Err(DataError::Empty {
            path: path.to_path_buf(),
        });
    }

    Ok(items)
}

pub fn load_from_file(
    path: impl AsRef<Path>,
    lengths: SequenceLengths,
) -> Result<Vec<TrajectoryItem>, DataError> {
    let path = path.as_ref();
    let text = fs::read_to_string(path).map_err(|source| DataError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    parse_trajectories(&text, path, lengths)
}

/// Loads every `*.txt` file directly under `dir`, in file name order.
pub fn load_from_dir(
    dir: impl AsRef<Path>,
    lengths: SequenceLengths,
) -> Result<Vec<TrajectoryItem>, DataError> {
    let dir = dir.as_ref();
    let io_err = |source| DataError::Io {
        path: dir.to_path_buf(),
        source,
    };

    let mut files: Vec<PathBuf> = fs::read_dir(dir)
        .map_err(io_err)?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<Result<_, _>>()
        .map_err(io_err)?;
    files.retain(|p| p.is_file() && p.extension().map_or(false, |ext| ext == "txt"));
    files.sort();

    let mut items = Vec::new();
    for file in files {
        let mut loaded = load_from_file(&file, lengths)?;
        debug!("loaded {} trajectories from {}", loaded.len(), file.display());
        items.append(&mut loaded);
    }

    if items.is_empty() {
        return Err(DataError::Empty {
            path: dir.to_path_buf(),
        });
    }

    Ok(items)
}

pub struct TrajectoryBatcher<B: Backend> {
    device: B::Device,
}

impl<B: Backend> TrajectoryBatcher<B> {
    pub fn new(device: B::Device) -> Self {
        Self { device }
    }
}

fn points_tensor<B: Backend>(points: &[Point]) -> Tensor<B, 3> {
    let data = Data::new(
        points.iter().flatten().copied().collect(),
        Shape::new([1, points.len(), 2]),
    );
    Tensor::from_data(data.convert())
}

impl<B: Backend> Batcher<TrajectoryItem, TrajectoryBatch<B>> for TrajectoryBatcher<B> {
    fn batch(&self, items: Vec<TrajectoryItem>) -> TrajectoryBatch<B> {
        let (observed, future): (Vec<Tensor<B, 3>>, Vec<Tensor<B, 3>>) = items
            .iter()
            .map(|item| (points_tensor(&item.observed), points_tensor(&item.future)))
            .unzip();

        let observed = Tensor::cat(observed, 0).to_device(&self.device);
        let future = Tensor::cat(future, 0).to_device(&self.device);

        TrajectoryBatch::new(observed, future)
    }
}

/// Batches `items` in insertion order. No shuffling is applied, so every
/// epoch sees the same sequence of batches; the last one may be short.
pub fn dataloader<B: Backend>(
    items: Vec<TrajectoryItem>,
    batch_size: usize,
    device: B::Device,
) -> Arc<dyn DataLoader<TrajectoryBatch<B>>> {
    DataLoaderBuilder::new(TrajectoryBatcher::<B>::new(device))
        .batch_size(batch_size)
        .build(InMemDataset::new(items))
}
