//! Recipe errors

use std::path::PathBuf;

/// Result alias used across the crate
pub type Result<T> = std::result::Result<T, RecipeError>;

/// Recipe error
#[derive(Debug, thiserror::Error)]
pub enum RecipeError {
    #[error("unknown operating system: {0}")]
    UnknownOs(String),

    #[error("invalid version: {0:?}")]
    InvalidVersion(String),

    #[error("invalid version range: {0:?}")]
    InvalidRange(String),

    #[error("invalid reference: {0:?} (expected Name/[range]@user/channel)")]
    InvalidReference(String),

    #[error("invalid file pattern: {0}")]
    Pattern(#[from] glob::PatternError),

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot resolve scm {field} from {path}: {reason}")]
    Scm {
        field: &'static str,
        path: PathBuf,
        reason: String,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl RecipeError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
