use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DataError {
    #[error("failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{}:{line}: invalid number {token:?}", .path.display())]
    Parse {
        path: PathBuf,
        line: usize,
        token: String,
    },
    #[error("{}:{line}: expected 2 columns, found {found}", .path.display())]
    ColumnCount {
        path: PathBuf,
        line: usize,
        found: usize,
    },
    #[error(
        "{}:{line}: trajectory has {found} points, expected {expected}",
        .path.display()
    )]
    Length {
        path: PathBuf,
        line: usize,
        found: usize,
        expected: usize,
    },
    #[error("{}: no trajectories found", .path.display())]
    Empty { path: PathBuf },
}
