use std::io;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum BiddingError {
    #[error("{0}")]
    Message(String),
    #[error("configuration error: {0}")]
    Config(String),
    #[error("tournament source unavailable: {path}: {reason}")]
    Source { path: PathBuf, reason: String },
    #[error("invalid tournament path {0}: expected <prefix>.html inside a directory")]
    InvalidPrefix(PathBuf),
    #[error("invalid timestamp '{date}' / '{time}'")]
    Timestamp { date: String, time: String },
    #[error("push to {target} failed: {reason}")]
    Push { target: String, reason: String },
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl BiddingError {
    pub fn message<T: Into<String>>(message: T) -> Self {
        BiddingError::Message(message.into())
    }

    pub fn source_unavailable<P: Into<PathBuf>, T: ToString>(path: P, reason: T) -> Self {
        BiddingError::Source {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    /// Whether the error means the run never reached the output directory.
    pub fn is_fatal_source(&self) -> bool {
        matches!(
            self,
            BiddingError::Source { .. }
                | BiddingError::Csv(_)
                | BiddingError::Timestamp { .. }
                | BiddingError::InvalidPrefix(_)
        )
    }
}
