//! # Remote Fetcher
//!
//! One fetch cycle is one POST: no retry happens here unless explicitly
//! configured, so a failed cycle is reported to the caller straight away.
//! A response is only a success when every requested block resolved; a
//! shorter list is never returned.

use reqwest::Method;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::fmt;
use std::time::Duration;

use crate::error::{ConfigError, FetchError};
use crate::graphql::batch_query::{self, BatchQuery};
use crate::projects::{ProjectMetrics, ProjectRegistry};
use crate::retrieve::ky_http::{ApiClient, ApiClientOptions};

/// Public GitHub GraphQL endpoint.
pub const GITHUB_GRAPHQL_URL: &str = "https://api.github.com/graphql";

/// Outcome of one fetch cycle: every project's metrics in registry order, or why not.
pub type FetchResult = Result<Vec<ProjectMetrics>, FetchError>;

/// Bearer token for the metrics provider.
#[derive(Clone)]
pub struct Credentials(String);

impl Credentials {
    /// Wraps an explicit token.
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Reads the token from `var`, failing if it is unset or blank.
    pub fn from_env(var: &str) -> Result<Self, ConfigError> {
        match std::env::var(var) {
            Ok(token) if !token.trim().is_empty() => Ok(Self(token.trim().to_string())),
            _ => Err(ConfigError::MissingCredentials(var.to_string())),
        }
    }

    /// The raw token.
    pub fn token(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credentials(<redacted>)")
    }
}

/// Where and how the fetcher talks to the provider.
#[derive(Debug, Clone)]
pub struct FetcherOptions {
    /// GraphQL endpoint URL.
    pub endpoint: String,
    /// Per-request timeout; keeps an unresponsive provider from stalling a channel.
    pub timeout: Duration,
    /// Transport-level retries inside one request, off by default.
    ///
    /// Only transient transport failures (connect errors, 5xx, 429) are
    /// retried, within the same fetch call. Deciding whether to fetch again
    /// after a failed cycle stays with the channel: a failed cycle is
    /// reported once and the next trigger starts a fresh one.
    pub max_retries: u32,
}

impl Default for FetcherOptions {
    fn default() -> Self {
        Self {
            endpoint: GITHUB_GRAPHQL_URL.to_string(),
            timeout: Duration::from_secs(5),
            max_retries: 0,
        }
    }
}

#[derive(Debug, Deserialize)]
struct GraphQlResponse {
    #[serde(default)]
    data: Option<Map<String, Value>>,
    #[serde(default)]
    errors: Vec<GraphQlError>,
}

#[derive(Debug, Deserialize)]
struct GraphQlError {
    message: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RepositoryBlock {
    name: String,
    star_count: u64,
    fork_count: u64,
}

impl From<RepositoryBlock> for ProjectMetrics {
    fn from(block: RepositoryBlock) -> Self {
        ProjectMetrics {
            name: block.name,
            stars: block.star_count,
            forks: block.fork_count,
        }
    }
}

/// Executes batch queries against the metrics provider.
///
/// Holds no per-cycle state, so one instance is shared by every channel.
#[derive(Debug, Clone)]
pub struct RemoteFetcher {
    client: ApiClient,
}

impl RemoteFetcher {
    /// Creates a fetcher for `options.endpoint` authenticated with `credentials`.
    pub fn new(credentials: Credentials, options: FetcherOptions) -> Result<Self, ConfigError> {
        let client = ApiClient::new(
            &options.endpoint,
            Some(credentials.token().to_string()),
            ApiClientOptions {
                timeout: options.timeout,
                max_retries: options.max_retries,
            },
        )
        .map_err(|e| ConfigError::InvalidValue {
            key: "githubGraphqlUrl".to_string(),
            reason: e.to_string(),
        })?;
        Ok(Self { client })
    }

    /// Builds the batch for `registry` and fetches it.
    ///
    /// An empty registry fails with [`FetchError::EmptyBatch`] before any
    /// network traffic.
    pub async fn fetch_projects(&self, registry: &ProjectRegistry) -> FetchResult {
        let query = batch_query::build(registry.projects())?;
        self.fetch(&query).await
    }

    /// Sends `query` as a single request and maps the answer.
    pub async fn fetch(&self, query: &BatchQuery) -> FetchResult {
        log::debug!(
            "Fetching metrics for {} project(s) from {}",
            query.len(),
            self.client.base_url()
        );

        let response = self
            .client
            .request::<GraphQlResponse, Value>(Method::POST, "", None, Some(query.request_body()))
            .await
            .map_err(|e| {
                log::warn!("Metrics request failed: {:#}", e);
                FetchError::Transport(e.to_string())
            })?;

        if !response.success {
            log::warn!(
                "Metrics provider answered HTTP {}: {}",
                response.status,
                response.error_body.as_deref().unwrap_or("")
            );
            return Err(FetchError::Transport(format!("HTTP status {}", response.status)));
        }

        let body = response
            .data
            .ok_or_else(|| FetchError::Transport("empty response body".to_string()))?;

        map_response(query, body)
    }
}

/// Maps a decoded response back onto the query's alias table.
fn map_response(query: &BatchQuery, response: GraphQlResponse) -> FetchResult {
    let data = response.data.unwrap_or_default();
    let mut partial = Vec::with_capacity(query.len());
    let mut missing = Vec::new();
    let mut malformed = None;

    for entry in &query.aliases {
        match data.get(&entry.alias).filter(|v| !v.is_null()) {
            Some(block) => match RepositoryBlock::deserialize(block) {
                Ok(block) => partial.push(ProjectMetrics::from(block)),
                Err(e) => {
                    malformed.get_or_insert_with(|| format!("block {} is malformed: {}", entry.alias, e));
                }
            },
            None => missing.push(format!("no data for {} ({})", entry.alias, entry.project)),
        }
    }

    if !response.errors.is_empty() {
        let details: Vec<String> = response.errors.into_iter().map(|e| e.message).collect();
        log::warn!(
            "Metrics provider reported {} error(s); {} of {} block(s) resolved",
            details.len(),
            partial.len(),
            query.len()
        );
        return Err(FetchError::Query { details, partial });
    }

    if let Some(reason) = malformed {
        log::warn!("Malformed metrics response: {}", reason);
        return Err(FetchError::Transport(reason));
    }

    if !missing.is_empty() {
        log::warn!("Metrics response is missing {} block(s)", missing.len());
        return Err(FetchError::Query {
            details: missing,
            partial,
        });
    }

    Ok(partial)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::projects::Project;
    use serde_json::json;

    fn three_projects() -> BatchQuery {
        batch_query::build(&[
            Project::new("octo", "hello"),
            Project::new("octo", "world"),
            Project::new("rust-lang", "rust"),
        ])
        .unwrap()
    }

    fn decode(value: Value) -> GraphQlResponse {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_full_success_keeps_index_order() {
        let query = three_projects();
        // Keys deliberately out of order; mapping follows the alias table.
        let response = decode(json!({
            "data": {
                "item2": {"name": "rust", "starCount": 100, "forkCount": 12},
                "item0": {"name": "hello", "starCount": 5, "forkCount": 1},
                "item1": {"name": "world", "starCount": 9, "forkCount": 2}
            }
        }));

        let metrics = map_response(&query, response).unwrap();
        assert_eq!(
            metrics,
            vec![
                ProjectMetrics { name: "hello".into(), stars: 5, forks: 1 },
                ProjectMetrics { name: "world".into(), stars: 9, forks: 2 },
                ProjectMetrics { name: "rust".into(), stars: 100, forks: 12 },
            ]
        );
    }

    #[test]
    fn test_error_list_is_a_query_failure_with_partial() {
        let query = three_projects();
        let response = decode(json!({
            "data": {
                "item0": {"name": "hello", "starCount": 5, "forkCount": 1},
                "item1": null,
                "item2": {"name": "rust", "starCount": 100, "forkCount": 12}
            },
            "errors": [
                {"type": "NOT_FOUND", "path": ["item1"],
                 "message": "Could not resolve to a Repository with the name 'octo/world'."}
            ]
        }));

        match map_response(&query, response) {
            Err(FetchError::Query { details, partial }) => {
                assert_eq!(details.len(), 1);
                assert!(details[0].contains("octo/world"));
                let names: Vec<_> = partial.iter().map(|m| m.name.as_str()).collect();
                assert_eq!(names, ["hello", "rust"]);
            }
            other => panic!("expected query error, got {other:?}"),
        }
    }

    #[test]
    fn test_errors_without_data_is_query_failure() {
        let query = three_projects();
        let response = decode(json!({
            "data": null,
            "errors": [{"message": "Something went wrong"}]
        }));
        let err = map_response(&query, response).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::QueryError);
    }

    #[test]
    fn test_missing_block_never_shortens_the_list() {
        let query = three_projects();
        let response = decode(json!({
            "data": {
                "item0": {"name": "hello", "starCount": 5, "forkCount": 1},
                "item1": {"name": "world", "starCount": 9, "forkCount": 2}
            }
        }));
        match map_response(&query, response) {
            Err(FetchError::Query { details, partial }) => {
                assert_eq!(partial.len(), 2);
                assert!(details[0].contains("item2"));
                assert!(details[0].contains("rust-lang/rust"));
            }
            other => panic!("expected query error, got {other:?}"),
        }
    }

    #[test]
    fn test_malformed_block_is_transport_failure() {
        let query = batch_query::build(&[Project::new("octo", "hello")]).unwrap();
        let response = decode(json!({
            "data": {"item0": {"name": "hello", "starCount": -3, "forkCount": 1}}
        }));
        let err = map_response(&query, response).unwrap_err();
        assert!(matches!(err, FetchError::Transport(_)));
    }

    #[test]
    fn test_credentials_debug_is_redacted() {
        let c = Credentials::new("ghp_secret");
        assert_eq!(format!("{c:?}"), "Credentials(<redacted>)");
        assert_eq!(c.token(), "ghp_secret");
    }

    #[test]
    fn test_credentials_from_unset_env_fails() {
        let err = Credentials::from_env("REPOPULSE_TEST_TOKEN_THAT_IS_NEVER_SET").unwrap_err();
        assert!(matches!(err, ConfigError::MissingCredentials(var) if var == "REPOPULSE_TEST_TOKEN_THAT_IS_NEVER_SET"));
    }

    #[tokio::test]
    async fn test_empty_registry_fails_without_network() {
        // Port 9 (discard) on localhost: any request would fail as transport,
        // so EmptyBatch proves nothing was sent.
        let fetcher = RemoteFetcher::new(
            Credentials::new("t"),
            FetcherOptions {
                endpoint: "http://127.0.0.1:9/graphql".into(),
                ..FetcherOptions::default()
            },
        )
        .unwrap();
        let err = fetcher.fetch_projects(&ProjectRegistry::new(vec![])).await.unwrap_err();
        assert!(matches!(err, FetchError::EmptyBatch));
    }
}
