use thiserror::Error;

/// Failures reported by a [`MarketGateway`](crate::traits::MarketGateway).
#[derive(Error, Debug)]
pub enum GatewayError {
    /// Network failure, timeout, rate limit or 5xx. Worth retrying.
    #[error("Transient gateway error: {0}")]
    Transient(String),

    /// Missing or rejected session credentials. Never retried automatically.
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// The gateway understood the request and refused it.
    #[error("Request rejected ({status}): {message}")]
    Rejected { status: u16, message: String },

    /// The response did not have the expected shape.
    #[error("Unexpected gateway response: {0}")]
    Decode(String),
}

impl GatewayError {
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }

    #[must_use]
    pub const fn is_auth(&self) -> bool {
        matches!(self, Self::Auth(_))
    }

    /// Classifies an HTTP status code returned with `message`.
    #[must_use]
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        match status {
            401 | 403 => Self::Auth(message),
            408 | 429 | 500..=599 => Self::Transient(format!("HTTP {status}: {message}")),
            _ => Self::Rejected { status, message },
        }
    }
}

/// Failures talking to the advisory service.
///
/// Unparseable responses are not errors; they fail closed during parsing.
#[derive(Error, Debug)]
pub enum AdvisoryError {
    #[error("Advisory request failed: {0}")]
    Http(String),

    #[error("Advisory request timed out")]
    Timeout,

    #[error("Advisory service returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Advisory service returned no text")]
    EmptyBody,
}

/// Failures persisting settings.
#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
