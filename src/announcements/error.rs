//! Error types for announcement operations

use std::time::Duration;
use thiserror::Error;

use crate::announcements::types::Scope;

/// Result type for announcement operations
pub type AnnouncementResult<T> = Result<T, AnnouncementError>;

/// Everything that can go wrong between the client and the announcement service
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AnnouncementError {
    #[error("Invalid {field}: {message}")]
    Validation { field: String, message: String },

    #[error("Announcement not found: {id}")]
    NotFound { id: String },

    #[error("Network error: {message}")]
    Network { message: String },

    #[error("Request timed out after {timeout:?}")]
    Timeout { timeout: Duration },

    #[error("Invalid response from server: {details}")]
    InvalidResponse { details: String },

    #[error("Another change is still in progress for {scope}")]
    Busy { scope: Scope },

    #[error("Request was cancelled")]
    Cancelled,

    /// The server accepted the change; only the follow-up reload failed
    #[error("Change to {scope} went through, but reloading it failed: {cause}")]
    ReloadFailed {
        scope: Scope,
        cause: Box<AnnouncementError>,
    },

    #[error("Configuration error: {message}")]
    Configuration { message: String },
}

/// Coarse failure classes surfaced to the user
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    NotFound,
    Network,
    Busy,
    Cancelled,
}

impl AnnouncementError {
    /// Create a validation error for a field
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        AnnouncementError::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create a not found error
    pub fn not_found(id: impl Into<String>) -> Self {
        AnnouncementError::NotFound { id: id.into() }
    }

    /// Create a network error
    pub fn network(message: impl Into<String>) -> Self {
        AnnouncementError::Network {
            message: message.into(),
        }
    }

    /// Create a timeout error
    pub fn timeout(timeout: Duration) -> Self {
        AnnouncementError::Timeout { timeout }
    }

    /// Create an invalid response error
    pub fn invalid_response(details: impl Into<String>) -> Self {
        AnnouncementError::InvalidResponse {
            details: details.into(),
        }
    }

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        AnnouncementError::Configuration {
            message: message.into(),
        }
    }

    /// Wrap a reload failure that followed a confirmed change
    pub fn reload_failed(scope: Scope, cause: AnnouncementError) -> Self {
        AnnouncementError::ReloadFailed {
            scope,
            cause: Box::new(cause),
        }
    }

    /// Map this error onto the user-facing taxonomy.
    ///
    /// Timeouts, malformed responses and configuration problems all look like
    /// "could not reach the server" to the person holding the phone.
    pub fn kind(&self) -> ErrorKind {
        match self {
            AnnouncementError::Validation { .. } => ErrorKind::Validation,
            AnnouncementError::NotFound { .. } => ErrorKind::NotFound,
            AnnouncementError::Busy { .. } => ErrorKind::Busy,
            AnnouncementError::Cancelled => ErrorKind::Cancelled,
            AnnouncementError::Network { .. }
            | AnnouncementError::Timeout { .. }
            | AnnouncementError::InvalidResponse { .. }
            | AnnouncementError::Configuration { .. }
            | AnnouncementError::ReloadFailed { .. } => ErrorKind::Network,
        }
    }

    /// Whether the request never reached the server
    pub fn is_local(&self) -> bool {
        matches!(
            self,
            AnnouncementError::Validation { .. }
                | AnnouncementError::Busy { .. }
                | AnnouncementError::Configuration { .. }
        )
    }

    /// Whether the server applied the change despite this error.
    ///
    /// Retrying such a create would publish a duplicate.
    pub fn change_confirmed(&self) -> bool {
        matches!(self, AnnouncementError::ReloadFailed { .. })
    }
}

impl From<reqwest::Error> for AnnouncementError {
    fn from(err: reqwest::Error) -> Self {
        // Callers that know the configured timeout map `is_timeout` themselves.
        if err.is_timeout() {
            AnnouncementError::network(format!("request timed out: {}", err))
        } else if err.is_decode() {
            AnnouncementError::invalid_response(err.to_string())
        } else {
            AnnouncementError::network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for AnnouncementError {
    fn from(err: serde_json::Error) -> Self {
        AnnouncementError::invalid_response(format!("JSON parsing error: {}", err))
    }
}
