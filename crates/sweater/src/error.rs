//! Sweater errors

/// Result alias used across the crate
pub type Result<T> = std::result::Result<T, SweaterError>;

/// Sweater error
#[derive(Debug, thiserror::Error)]
pub enum SweaterError {
    #[error("work panicked: {0}")]
    WorkPanicked(String),

    #[error("work was dropped before it produced a result")]
    BrokenPromise,

    #[error("result was already taken")]
    ResultTaken,

    #[error("failed to spawn worker thread: {0}")]
    ThreadSpawn(#[from] std::io::Error),

    #[error("invalid number of workers: {0} (must be at least 1)")]
    InvalidWorkerCount(usize),

    #[error("invalid configuration value for {key}: {value:?}")]
    Config { key: &'static str, value: String },
}
