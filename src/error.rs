use std::path::PathBuf;

use thiserror::Error;

/// Failure to bring the service up. Fatal: no requests are served after it.
#[derive(Debug, Error)]
pub enum InitError {
    #[error("failed to create storage root {}: {source}", path.display())]
    CreateRoot {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors raised by an [`ImageStore`](crate::store::ImageStore).
#[derive(Debug, Error)]
pub enum StorageError {
    /// No file exists for the id.
    #[error("image not found: {0}")]
    NotFound(String),

    /// The backing medium could not be read or written.
    #[error("storage i/o failed on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Id or extension that cannot be used as part of a file name.
    #[error("invalid storage key: {0}")]
    InvalidKey(String),

    /// A background write task died before reporting back.
    #[error("storage task failed: {0}")]
    Task(String),
}

impl StorageError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

/// The codec could not turn the stored bytes into the requested format.
#[derive(Debug, Error)]
pub enum ConversionError {
    #[error("decode image failed: {0}")]
    Decode(String),

    #[error("encode {format} failed: {message}")]
    Encode { format: String, message: String },

    #[error("conversion task failed: {0}")]
    Task(String),
}

/// Outcome of a failed [`ImageService::retrieve`](crate::service::ImageService::retrieve).
#[derive(Debug, Error)]
pub enum RetrieveError {
    #[error("image not found: {0}")]
    NotFound(String),

    #[error("unsupported image format: {0}")]
    BadFormat(String),

    #[error(transparent)]
    Conversion(#[from] ConversionError),

    #[error(transparent)]
    Storage(StorageError),
}

impl From<StorageError> for RetrieveError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound(id) => Self::NotFound(id),
            other => Self::Storage(other),
        }
    }
}
