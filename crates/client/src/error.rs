//! Client error taxonomy.
//!
//! Every remote failure is reported to the action that caused it. Errors are
//! `Clone` so one de-duplicated fetch can hand the same outcome to every
//! reader waiting on it.

use machinery_store_core::{EmailError, ProductId};
use thiserror::Error;

/// Message fragments the remote service uses when it rejects a caller for
/// lacking a role.
const AUTHORIZATION_MARKERS: &[&str] = &["unauthorized", "only admin", "permission"];

/// Errors returned by the store client.
#[derive(Debug, Clone, Error)]
pub enum ClientError {
    /// No remote session is active.
    #[error("Not connected")]
    NotConnected,

    /// The remote service rejected the caller's role.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Input rejected before any remote call.
    #[error("Invalid input: {0}")]
    Validation(#[from] ValidationError),

    /// The remote service returned an error message.
    #[error("Remote error: {0}")]
    Remote(String),

    /// The request never produced a response.
    #[error("Transport error: {0}")]
    Transport(String),

    /// The response could not be decoded.
    #[error("Decode error: {0}")]
    Decode(String),

    /// The requested entity does not exist.
    #[error("Not found: {0}")]
    NotFound(String),
}

impl ClientError {
    /// Classify a free-text rejection from the remote service.
    #[must_use]
    pub fn from_remote_message(message: impl Into<String>) -> Self {
        let message = message.into();
        let lower = message.to_lowercase();
        if AUTHORIZATION_MARKERS.iter().any(|m| lower.contains(m)) {
            Self::Unauthorized(message)
        } else if lower.contains("not found") || lower.contains("does not exist") {
            Self::NotFound(message)
        } else {
            Self::Remote(message)
        }
    }

    /// Whether retrying the same action could succeed without user changes.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport(_))
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::Decode(err.to_string())
        } else {
            Self::Transport(err.to_string())
        }
    }
}

impl From<serde_json::Error> for ClientError {
    fn from(err: serde_json::Error) -> Self {
        Self::Decode(err.to_string())
    }
}

/// Input problems caught client-side.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("name is required")]
    EmptyName,

    #[error("message is required")]
    EmptyMessage,

    #[error("invalid email: {0}")]
    Email(#[from] EmailError),

    #[error("product name is required")]
    EmptyProductName,

    #[error("category is required")]
    EmptyCategory,

    #[error("quantity for product {0} must be greater than zero")]
    ZeroQuantity(ProductId),

    #[error("admin token is required")]
    EmptyToken,
}
