//! # HTTP Retrieval Utilities
//!
//! An asynchronous API client wrapper around `reqwest`, with a request
//! timeout, opt-in exponential backoff retries and standardized JSON
//! response handling.

use reqwest::{header::{HeaderMap, AUTHORIZATION, CONTENT_TYPE}, Method, Url};
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::{policies::ExponentialBackoff, RetryTransientMiddleware};
use serde::{de::DeserializeOwned, Serialize};
use std::time::Duration;

/// A standardized container for API responses.
///
/// Wraps the deserialized data along with metadata about the HTTP
/// transaction, such as status codes and headers.
#[derive(Debug)]
pub struct ApiResponse<T> {
    /// The successfully deserialized response body, if any.
    pub data: Option<T>,
    /// The raw error body returned by the server if the request failed.
    pub error_body: Option<String>,
    /// The numeric HTTP status code.
    pub status: u16,
    /// Indicates if the status code was in the 2xx range.
    pub success: bool,
    /// The headers returned by the server.
    pub headers: HeaderMap,
}

/// Transport tuning for an [`ApiClient`].
#[derive(Debug, Clone)]
pub struct ApiClientOptions {
    /// Upper bound on a whole request, connect through body.
    pub timeout: Duration,
    /// Transient-failure retries. Zero sends each request exactly once.
    pub max_retries: u32,
}

impl Default for ApiClientOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(5),
            max_retries: 0,
        }
    }
}

/// A flexible asynchronous HTTP client.
///
/// Built on top of `reqwest_middleware`, it handles base URLs,
/// authentication tokens, timeouts and optional retries.
#[derive(Clone)]
pub struct ApiClient {
    /// The underlying middleware-enabled client.
    inner: ClientWithMiddleware,
    /// The base URL to which all relative paths are joined.
    base_url: Url,
    /// An optional Bearer token used for authorization.
    auth_token: Option<String>,
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.base_url.as_str())
            .field("auth_token", &self.auth_token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl ApiClient {
    /// Creates a new `ApiClient`.
    ///
    /// # Arguments
    /// * `base_url` - The absolute base URL for the API (e.g., "https://api.github.com/").
    /// * `auth_token` - An optional string for the Authorization header.
    /// * `options` - Timeout and retry settings.
    ///
    /// # Errors
    /// Fails if `base_url` is not an absolute URL or the TLS backend cannot
    /// be initialised.
    pub fn new(
        base_url: &str,
        auth_token: Option<String>,
        options: ApiClientOptions,
    ) -> anyhow::Result<Self> {
        let url = Url::parse(base_url)
            .map_err(|e| anyhow::anyhow!("Invalid base URL '{}' (must be absolute): {}", base_url, e))?;

        let http = reqwest::Client::builder()
            .user_agent(concat!("repopulse/", env!("CARGO_PKG_VERSION")))
            .timeout(options.timeout)
            .build()?;

        let mut builder = ClientBuilder::new(http);
        if options.max_retries > 0 {
            let retry_policy = ExponentialBackoff::builder().build_with_max_retries(options.max_retries);
            builder = builder.with(RetryTransientMiddleware::new_with_policy(retry_policy));
        }

        Ok(Self {
            inner: builder.build(),
            base_url: url,
            auth_token,
        })
    }

    /// The base URL requests are resolved against.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Performs a generic HTTP request and handles the response.
    ///
    /// # Arguments
    /// * `method` - The HTTP verb (GET, POST, etc.).
    /// * `path` - The relative path to append to the base URL. Empty targets the base URL itself.
    /// * `headers` - Optional additional headers for this specific request.
    /// * `body` - Optional serializable object to send as the JSON body.
    ///
    /// # Errors
    /// Returns an `anyhow::Error` if URL joining, network execution or
    /// decoding a 2xx body fails. A non-2xx status is not an error; it comes
    /// back with `success: false`.
    pub async fn request<T, B>(
        &self,
        method: Method,
        path: &str,
        headers: Option<HeaderMap>,
        body: Option<B>,
    ) -> anyhow::Result<ApiResponse<T>>
    where
        T: DeserializeOwned,
        B: Serialize,
    {
        // 1. Construct the full absolute URL
        let full_url = if path.is_empty() {
            self.base_url.clone()
        } else {
            self.base_url.join(path)?
        };
        let mut req = self.inner.request(method, full_url);

        // 2. Add custom headers if provided
        if let Some(h) = headers {
            req = req.headers(h);
        }

        // 3. Inject Bearer authentication if a token is present
        if let Some(token) = &self.auth_token {
            req = req.header(AUTHORIZATION, format!("Bearer {}", token));
        }

        // 4. Serialize and attach the JSON body if present
        if let Some(b) = body {
            let json_body = serde_json::to_string(&b)?;
            req = req.header(CONTENT_TYPE, "application/json").body(json_body);
        }

        // 5. Execute the request and capture response metadata
        let response: reqwest::Response = req.send().await?;
        let status = response.status();
        let resp_headers = response.headers().clone();

        // 6. Handle the result based on success status
        if status.is_success() {
            let data = response.json::<T>().await?;
            Ok(ApiResponse {
                data: Some(data),
                error_body: None,
                status: status.as_u16(),
                success: true,
                headers: resp_headers,
            })
        } else {
            let error_text = response.text().await.ok();
            Ok(ApiResponse {
                data: None,
                error_body: error_text,
                status: status.as_u16(),
                success: false,
                headers: resp_headers,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relative_base_url_is_an_error() {
        let err = ApiClient::new("api.github.com/graphql", None, ApiClientOptions::default());
        assert!(err.is_err());
    }

    #[test]
    fn test_debug_redacts_token() {
        let client = ApiClient::new(
            "https://api.github.com/graphql",
            Some("ghp_secret".into()),
            ApiClientOptions::default(),
        )
        .unwrap();
        let shown = format!("{:?}", client);
        assert!(shown.contains("<redacted>"));
        assert!(!shown.contains("ghp_secret"));
    }
}
