//! # lib_repopulse
//!
//! Shared building blocks for the repopulse dashboard: a fixed registry of
//! tracked repositories, a batched GraphQL query builder, the remote fetcher
//! that resolves star/fork counts in one request, and the WebSocket
//! broadcaster that pushes fresh metrics to every viewer that asks for them.
//!
//! ## Modules:
//! - **`projects`**: `Project`, `ProjectMetrics` and the immutable `ProjectRegistry`.
//! - **`graphql`**: deterministic, positionally aliased batch query construction.
//! - **`retrieve`**: a generic `reqwest` client with optional retry middleware.
//! - **`github`**: the `RemoteFetcher` that executes a batch and maps it back.
//! - **`channel`**: the axum router, the HTML page and the per-socket loop.

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, unused_qualifications)]

/// Error types shared by every module.
pub mod error;
/// Tracked projects and their metrics.
pub mod projects;
/// Batched GraphQL query construction.
pub mod graphql;

/// Generic HTTP API client with retry middleware.
#[cfg(feature = "retrieve")]
pub mod retrieve;

/// Remote metrics provider client.
#[cfg(feature = "github")]
pub mod github;

/// WebSocket broadcaster and HTTP routes.
#[cfg(feature = "channel")]
pub mod channel;

pub use error::{ConfigError, ErrorKind, FetchError, RegistryError};
pub use graphql::batch_query::{build, AliasEntry, BatchQuery};
pub use projects::{Project, ProjectMetrics, ProjectRegistry};

#[cfg(feature = "github")]
pub use github::fetcher::{Credentials, FetchResult, FetcherOptions, RemoteFetcher};

#[cfg(feature = "channel")]
pub use channel::routes::{router, AppState, ChannelOptions};
