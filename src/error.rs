//! Error taxonomy for admin actions.

use thiserror::Error;

pub const AUTH_MISSING_MESSAGE: &str = "Authentication token not found";

#[derive(Error, Debug, Clone, PartialEq)]
pub enum AdminError {
    /// No session token; nothing was sent.
    #[error("{}", AUTH_MISSING_MESSAGE)]
    AuthenticationMissing,

    /// Caught locally before any request was issued.
    #[error("{0}")]
    Validation(String),

    /// Non-2xx response, or `success: false` in a 2xx body.
    #[error("{message}")]
    Backend { status: Option<u16>, message: String },

    #[error("network error: {0}")]
    Network(String),

    #[error("failed to decode response: {0}")]
    Decode(String),

    /// Another request for the same target has not completed yet.
    #[error("a request for {0} is already in flight")]
    InFlight(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("storage error: {0}")]
    Storage(String),
}

impl AdminError {
    pub fn backend(status: Option<u16>, message: impl Into<String>) -> Self {
        AdminError::Backend {
            status,
            message: message.into(),
        }
    }

    /// Message shown to the operator. Backend and validation messages pass
    /// through verbatim; transport failures collapse to `fallback`.
    pub fn user_message(&self, fallback: &str) -> String {
        match self {
            AdminError::AuthenticationMissing
            | AdminError::Validation(_)
            | AdminError::Backend { .. }
            | AdminError::InFlight(_) => self.to_string(),
            AdminError::Network(_)
            | AdminError::Decode(_)
            | AdminError::Config(_)
            | AdminError::Storage(_) => fallback.to_string(),
        }
    }

    /// Whether the failure happened before anything reached the backend.
    pub fn is_local(&self) -> bool {
        matches!(
            self,
            AdminError::AuthenticationMissing
                | AdminError::Validation(_)
                | AdminError::InFlight(_)
        )
    }
}

impl From<reqwest::Error> for AdminError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            AdminError::Decode(e.to_string())
        } else {
            AdminError::Network(e.to_string())
        }
    }
}

impl From<serde_json::Error> for AdminError {
    fn from(e: serde_json::Error) -> Self {
        AdminError::Decode(e.to_string())
    }
}

impl From<sqlx::Error> for AdminError {
    fn from(e: sqlx::Error) -> Self {
        AdminError::Storage(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, AdminError>;
