//! # GraphQL Batching
//!
//! Turns the whole registry into one query so a fetch cycle costs a single
//! round trip, no matter how many projects are tracked.

/// Positional batch query builder.
pub mod batch_query;
