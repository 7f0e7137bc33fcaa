use std::path::PathBuf;

use thiserror::Error;

use crate::backend::BackendError;

#[derive(Debug, Error)]
pub enum MediaError {
    #[error("download failed: {0}")]
    Download(#[from] BackendError),
    #[error("frame extraction failed: {0}")]
    Extraction(String),
    #[error("failed to decode frame {path}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("frame hashing task failed: {0}")]
    Task(String),
}

impl From<tokio::task::JoinError> for MediaError {
    fn from(err: tokio::task::JoinError) -> Self {
        MediaError::Task(err.to_string())
    }
}

pub type MediaResult<T> = Result<T, MediaError>;
