#[cfg(feature = "storage")]
use crate::storage::StorageError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

pub type IndexResult<T> = Result<T, IndexError>;

#[derive(Error, Debug)]
pub enum IndexError {
    #[error("Malformed chart archive: {0}")]
    MalformedArchive(String),
    #[error("Chart {0} is already present in the index")]
    AlreadyPresent(String),
    #[error("Index file does not exist in the repository")]
    IndexMissing,
    #[error("Failed to find the resource")]
    NotFound,
    #[error("Encountered uncategorized error")]
    ServiceError(#[from] anyhow::Error),
}

#[cfg(feature = "storage")]
impl From<StorageError> for IndexError {
    fn from(e: StorageError) -> Self {
        match e {
            StorageError::NotFound => Self::NotFound,
            StorageError::ServiceError(e) => Self::ServiceError(e),
        }
    }
}

impl From<std::io::Error> for IndexError {
    fn from(e: std::io::Error) -> Self {
        IndexError::ServiceError(e.into())
    }
}

impl From<serde_yaml::Error> for IndexError {
    fn from(e: serde_yaml::Error) -> Self {
        IndexError::ServiceError(e.into())
    }
}

impl IntoResponse for IndexError {
    fn into_response(self) -> Response {
        let code = match &self {
            IndexError::MalformedArchive(reason) => {
                tracing::warn!("Rejected malformed chart archive: {reason}");

                StatusCode::BAD_REQUEST
            }
            IndexError::AlreadyPresent(chart) => {
                tracing::error!("Encountered conflict in index operation: {chart}");

                StatusCode::CONFLICT
            }
            IndexError::IndexMissing => StatusCode::NOT_FOUND,
            IndexError::NotFound => StatusCode::NOT_FOUND,
            IndexError::ServiceError(error) => {
                tracing::error!(?error, "Encountered service error in index operation");

                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        (code, self.to_string()).into_response()
    }
}
