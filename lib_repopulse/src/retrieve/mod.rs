//! # Data Retrieval Module
//!
//! Generic HTTP plumbing shared by provider clients. It owns URL joining,
//! bearer authentication, JSON bodies, timeouts and the optional retry
//! middleware so the `github` fetcher only deals with query semantics.

/// Generic HTTP API client with retry middleware for resilient network requests.
pub mod ky_http;
