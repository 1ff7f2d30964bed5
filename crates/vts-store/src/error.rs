//! Error types for record store operations

use thiserror::Error;

pub type Result<T> = std::result::Result<T, StoreError>;

#[derive(Error, Debug)]
pub enum StoreError {
    /// 401
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// 403
    #[error("Permission denied: {0}")]
    Forbidden(String),

    /// 404
    #[error("Not found: {0}")]
    NotFound(String),

    /// 400 / 409 / 422
    #[error("Invalid request ({status}): {message}")]
    Invalid { status: u16, message: String },

    /// 429
    #[error("Rate limit exceeded")]
    RateLimited,

    /// 5xx
    #[error("Server error ({status}): {message}")]
    Server { status: u16, message: String },

    /// Any other non-success status
    #[error("Unexpected HTTP {status}: {message}")]
    Status { status: u16, message: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("{0}")]
    Other(String),
}

impl StoreError {
    /// Build an error from a non-success HTTP status and its message
    pub fn from_status(status: u16, message: String) -> Self {
        match status {
            401 => StoreError::Authentication(message),
            403 => StoreError::Forbidden(message),
            404 => StoreError::NotFound(message),
            400 | 409 | 422 => StoreError::Invalid { status, message },
            429 => StoreError::RateLimited,
            500..=599 => StoreError::Server { status, message },
            _ => StoreError::Status { status, message },
        }
    }

    /// HTTP status behind this error, if one was received
    pub fn status(&self) -> Option<u16> {
        match self {
            StoreError::Authentication(_) => Some(401),
            StoreError::Forbidden(_) => Some(403),
            StoreError::NotFound(_) => Some(404),
            StoreError::Invalid { status, .. }
            | StoreError::Server { status, .. }
            | StoreError::Status { status, .. } => Some(*status),
            StoreError::RateLimited => Some(429),
            StoreError::Http(e) => e.status().map(|s| s.as_u16()),
            StoreError::Json(_) | StoreError::Config(_) | StoreError::Other(_) => None,
        }
    }

    pub fn is_permission_denied(&self) -> bool {
        matches!(self, StoreError::Forbidden(_))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound(_))
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, StoreError::RateLimited | StoreError::Server { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_status_round_trips_status() {
        for status in [400, 401, 403, 404, 409, 422, 429, 500, 503, 418] {
            let err = StoreError::from_status(status, "boom".into());
            assert_eq!(err.status(), Some(status), "status {}", status);
        }
    }

    #[test]
    fn test_classification() {
        assert!(StoreError::from_status(403, String::new()).is_permission_denied());
        assert!(StoreError::from_status(404, String::new()).is_not_found());
        assert!(StoreError::from_status(503, String::new()).is_retryable());
        assert!(StoreError::from_status(429, String::new()).is_retryable());
        assert!(!StoreError::from_status(400, String::new()).is_retryable());
        assert_eq!(StoreError::Other("x".into()).status(), None);
    }
}
