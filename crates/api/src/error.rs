//! Error type shared by the upstream HTTP clients.

use thiserror::Error;

/// Failure modes for upstream market-data requests.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Network-level failure (connect, timeout, TLS). Retriable.
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Non-success HTTP status. Retriable only for 5xx.
    #[error("upstream returned HTTP {0}")]
    Status(reqwest::StatusCode),

    /// Response body did not match the expected shape. Not retriable.
    #[error("malformed response: {0}")]
    Decode(String),
}

impl ApiError {
    /// Whether a request that failed this way is worth retrying.
    pub fn is_retriable(&self) -> bool {
        match self {
            ApiError::Transport(_) => true,
            ApiError::Status(status) => status.is_server_error(),
            ApiError::Decode(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;

    #[test]
    fn test_retriable_classification() {
        assert!(ApiError::Status(StatusCode::INTERNAL_SERVER_ERROR).is_retriable());
        assert!(ApiError::Status(StatusCode::BAD_GATEWAY).is_retriable());
        assert!(!ApiError::Status(StatusCode::NOT_FOUND).is_retriable());
        assert!(!ApiError::Status(StatusCode::TOO_MANY_REQUESTS).is_retriable());
        assert!(!ApiError::Decode("bad json".to_string()).is_retriable());
    }
}
