//! Error types

use thiserror::Error;

/// Errors surfaced to admin-facing callers
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Party not found: {0}")]
    PartyNotFound(String),

    #[error("Only the host can start the party")]
    NotHost,

    #[error("Invalid party: {0}")]
    InvalidParty(String),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

/// Errors from the configuration store
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed settings: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Party not found: {0}")]
    PartyNotFound(String),
}

/// Errors from the session transport
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Media server is not running or not reachable")]
    NotReachable,

    #[error("Invalid API key")]
    Unauthorized,

    #[error("Session not found: {0}")]
    SessionNotFound(String),

    #[error("Command rejected: {0}")]
    Rejected(String),
}

/// Errors from the catalog
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Catalog unavailable: {0}")]
    Unavailable(String),
}
