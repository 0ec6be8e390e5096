use serde::Serialize;
use std::fmt;
use thiserror::Error;

use crate::projects::ProjectMetrics;

/// Stable, wire-visible classification of a failed fetch cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// The registry had nothing to query.
    EmptyBatch,
    /// The provider could not be reached or answered with garbage.
    TransportError,
    /// The provider answered but reported errors for one or more blocks.
    QueryError,
}

impl ErrorKind {
    /// The snake_case name sent to clients.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::EmptyBatch => "empty_batch",
            ErrorKind::TransportError => "transport_error",
            ErrorKind::QueryError => "query_error",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure of a single fetch cycle. Never fatal to the channel or the process.
#[derive(Debug, Error)]
pub enum FetchError {
    /// `build` was called with no projects.
    #[error("cannot build a batch query for zero projects")]
    EmptyBatch,

    /// Timeout, refused connection, non-2xx status or undecodable body.
    #[error("transport error: {0}")]
    Transport(String),

    /// The provider reported errors; `partial` holds the blocks that resolved.
    #[error("provider reported {} error(s): {}", .details.len(), .details.join("; "))]
    Query {
        /// Messages from the response's top-level `errors` list.
        details: Vec<String>,
        /// Metrics for the aliased blocks that did resolve, in registry order.
        partial: Vec<ProjectMetrics>,
    },
}

impl FetchError {
    /// Classification used in the client-facing error notification.
    pub fn kind(&self) -> ErrorKind {
        match self {
            FetchError::EmptyBatch => ErrorKind::EmptyBatch,
            FetchError::Transport(_) => ErrorKind::TransportError,
            FetchError::Query { .. } => ErrorKind::QueryError,
        }
    }
}

/// Problems turning configuration input into projects.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    /// Expected `owner/name` with both parts non-empty.
    #[error("invalid project '{0}', expected 'owner/name'")]
    InvalidProject(String),
}

/// Startup-time configuration failures.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The bearer token variable is unset or blank.
    #[error("environment variable {0} is not set; a provider token is required")]
    MissingCredentials(String),

    /// A configured value could not be used.
    #[error("invalid configuration value for {key}: {reason}")]
    InvalidValue {
        /// The offending key.
        key: String,
        /// Why it was rejected.
        reason: String,
    },

    /// A project entry could not be parsed.
    #[error(transparent)]
    Registry(#[from] RegistryError),
}
