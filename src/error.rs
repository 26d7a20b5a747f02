//! Error taxonomy of the data-access layer.
//!
//! Every variant is `Clone` because a single refresh outcome is shared by all of its awaiters.

use serde_json::Value;
use thiserror::Error;

pub type Result<T, E = DataAccessError> = std::result::Result<T, E>;

#[derive(Debug, Clone, Error)]
pub enum DataAccessError {
    #[error("Not an absolute data binding path: {0}")]
    InvalidPath(String),

    #[error("security token refresh failed: {0}")]
    TokenRefreshFailed(RefreshFailure),

    #[error(transparent)]
    Backend(BackendError),

    #[error("Not implemented method {method} called with arguments {arguments}")]
    NotImplemented { method: String, arguments: String },

    #[error("listing {0} is not registered")]
    ListingNotFound(usize),

    #[error("row {index} not found in listing '{path}'")]
    RowNotFound { path: String, index: usize },

    #[error("property '{property}' not found in row {index} of listing '{path}'")]
    PropertyNotFound {
        path: String,
        index: usize,
        property: String,
    },

    #[error("accessed value '{property}' is not primitive")]
    ObjectAccess { property: String },

    #[error("response payload is not JSON: {0}")]
    InvalidPayload(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("invalid service configuration: {0}")]
    InvalidConfig(String),
}

/// Why a token refresh did not produce a token.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RefreshFailure {
    #[error("refresh was cancelled")]
    Cancelled,
    #[error("{status} {status_text}: {body}")]
    Status {
        status: u16,
        status_text: String,
        body: String,
    },
    #[error("{0}")]
    Transport(String),
    #[error("response carries no X-CSRF-Token header")]
    MissingToken,
}

/// A non-2xx backend response that was not recovered locally.
#[derive(Debug, Clone, Error)]
#[error("{message} - {status} {status_text}: {body}")]
pub struct BackendError {
    pub message: String,
    pub status: u16,
    pub status_text: String,
    pub body: String,
    /// The `error` object of an OData error body, when one could be parsed.
    pub error: Option<Value>,
}

impl DataAccessError {
    pub fn not_implemented(method: &str, arguments: &Value) -> Self {
        let arguments = serde_json::to_string(arguments)
            .unwrap_or_else(|e| format!("JSON.stringify error for arguments {}", e));
        DataAccessError::NotImplemented {
            method: format!("ODataModel.{}", method),
            arguments,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(
            self,
            DataAccessError::TokenRefreshFailed(RefreshFailure::Cancelled)
        )
    }

    pub fn backend(&self) -> Option<&BackendError> {
        match self {
            DataAccessError::Backend(e) => Some(e),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for DataAccessError {
    fn from(err: reqwest::Error) -> Self {
        DataAccessError::Transport(err.to_string())
    }
}
