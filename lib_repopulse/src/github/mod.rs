//! # GitHub GraphQL Provider
//!
//! Executes a [`BatchQuery`](crate::graphql::batch_query::BatchQuery) against
//! the GitHub GraphQL endpoint and maps every aliased block back onto the
//! project it was built from.
//!
//! ## Contained Modules:
//!
//! - **`fetcher`**: `Credentials`, `RemoteFetcher` and the response mapping.

/// Remote fetcher and response mapping.
pub mod fetcher;
