use thiserror::Error;

pub type Result<T> = std::result::Result<T, ApiError>;

/// Error taxonomy for the remote data access layer.
///
/// Variants carry owned payloads and derive `Clone` so a single settled fetch
/// outcome can fan out to every subscriber of the owning cache entry.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ApiError {
    /// DNS failure, timeout, connection reset or any other transport-level fault.
    #[error("transport failure: {0}")]
    Transport(String),
    /// The backend answered with a status outside 200-299.
    #[error("HTTP status {0}")]
    HttpStatus(u16),
    /// The response body could not be decoded as JSON.
    #[error("failed to decode response body: {0}")]
    Decode(String),
    /// A preference value did not satisfy the schema registered for its key.
    #[error("schema mismatch for preference key '{0}'")]
    SchemaMismatch(String),
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if let Some(status) = err.status() {
            ApiError::HttpStatus(status.as_u16())
        } else if err.is_decode() {
            ApiError::Decode(err.to_string())
        } else {
            ApiError::Transport(err.to_string())
        }
    }
}
