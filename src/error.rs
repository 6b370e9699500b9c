// error.rs

use thiserror::Error;

/// Outcome classification for every call the client makes.
///
/// Callers match on the variant, never on message text. `Unauthorized` is
/// special-cased everywhere: whoever receives it clears the session and sends
/// the user back to the login screen.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Unauthorized - please login again")]
    Unauthorized,

    #[error("HTTP error! status {0}")]
    Http(u16),

    #[error("Network request failed: {0}")]
    Network(String),

    #[error("Failed to decode response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("{0}")]
    Validation(String),

    #[error("Auth provider error: {0}")]
    AuthProvider(String),
}

impl ApiError {
    /// Wrap a transport-level failure where no response was obtained.
    pub fn network(err: reqwest::Error) -> Self {
        ApiError::Network(err.to_string())
    }

    /// Connectivity problems get a "check your connection" style message
    /// instead of an auth message.
    pub fn is_connectivity(&self) -> bool {
        matches!(self, ApiError::Network(_))
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unauthorized_is_not_connectivity() {
        assert!(!ApiError::Unauthorized.is_connectivity());
        assert!(ApiError::Network("connection refused".into()).is_connectivity());
    }

    #[test]
    fn http_error_carries_status() {
        let err = ApiError::Http(503);
        assert!(matches!(err, ApiError::Http(503)));
        assert_eq!(err.to_string(), "HTTP error! status 503");
    }
}
