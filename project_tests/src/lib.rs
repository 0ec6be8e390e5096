//! # Test Harness
//!
//! Shared fixtures for the integration tests: an in-process GraphQL
//! provider whose answers are scripted per request, a helper that starts
//! the real repopulse router on an ephemeral port, and a few WebSocket
//! client conveniences.

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};

use lib_repopulse::{
    router, AppState, ChannelOptions, Credentials, FetcherOptions, Project, ProjectRegistry,
    RemoteFetcher,
};

/// Token the test server sends; the provider records what it receives.
pub const TEST_TOKEN: &str = "test-token";

/// How the mock provider answers one request.
#[derive(Debug, Clone)]
pub enum MockReply {
    /// 200 with this JSON body.
    Json(Value),
    /// 200 with this JSON body after a delay.
    Delayed(Duration, Value),
    /// A bare status code with an empty body.
    Status(u16),
    /// 200 with a body that is not JSON.
    Garbage,
    /// Never answers within any sane timeout.
    Hang,
}

/// What the provider saw.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    /// `Authorization` header, if any.
    pub authorization: Option<String>,
    /// Decoded JSON body.
    pub body: Value,
}

#[derive(Debug)]
struct ProviderInner {
    script: Mutex<VecDeque<MockReply>>,
    fallback: MockReply,
    requests: Mutex<Vec<RecordedRequest>>,
}

/// Handle to a running mock provider.
#[derive(Debug, Clone)]
pub struct MockProvider {
    inner: Arc<ProviderInner>,
    /// Endpoint URL to point the fetcher at.
    pub url: String,
}

impl MockProvider {
    /// Starts a provider that plays `script` in order, then `fallback` forever.
    pub async fn start(script: Vec<MockReply>, fallback: MockReply) -> Self {
        let inner = Arc::new(ProviderInner {
            script: Mutex::new(script.into()),
            fallback,
            requests: Mutex::new(Vec::new()),
        });

        let app = Router::new()
            .route("/graphql", post(graphql_handler))
            .with_state(inner.clone());
        let addr = serve(app).await;

        Self {
            inner,
            url: format!("http://{}/graphql", addr),
        }
    }

    /// Starts a provider that always gives the same answer.
    pub async fn always(reply: MockReply) -> Self {
        Self::start(Vec::new(), reply).await
    }

    /// Requests received so far.
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.inner.requests.lock().unwrap().clone()
    }

    /// Number of requests received so far.
    pub fn request_count(&self) -> usize {
        self.inner.requests.lock().unwrap().len()
    }

    /// Waits until at least `n` requests have arrived; panics after five seconds.
    pub async fn wait_for_requests(&self, n: usize) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while self.request_count() < n {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("provider never saw the expected requests");
    }
}

async fn graphql_handler(
    State(inner): State<Arc<ProviderInner>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    inner.requests.lock().unwrap().push(RecordedRequest {
        authorization: headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string),
        body,
    });

    let reply = inner
        .script
        .lock()
        .unwrap()
        .pop_front()
        .unwrap_or_else(|| inner.fallback.clone());

    match reply {
        MockReply::Json(value) => Json(value).into_response(),
        MockReply::Delayed(delay, value) => {
            tokio::time::sleep(delay).await;
            Json(value).into_response()
        }
        MockReply::Status(code) => StatusCode::from_u16(code)
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
            .into_response(),
        MockReply::Garbage => (StatusCode::OK, "<html>definitely not json</html>").into_response(),
        MockReply::Hang => {
            tokio::time::sleep(Duration::from_secs(30)).await;
            StatusCode::GATEWAY_TIMEOUT.into_response()
        }
    }
}

async fn serve(app: Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

/// The two-project registry used by most scenarios.
pub fn octo_registry() -> ProjectRegistry {
    ProjectRegistry::new(vec![
        Project::new("octo", "hello"),
        Project::new("octo", "world"),
    ])
}

/// Provider payload answering [`octo_registry`].
pub fn octo_success() -> Value {
    json!({
        "data": {
            "item0": {"name": "hello", "starCount": 5, "forkCount": 1},
            "item1": {"name": "world", "starCount": 9, "forkCount": 2}
        }
    })
}

/// Fetcher aimed at `provider` with a short timeout.
pub fn fetcher_for(provider: &MockProvider, timeout: Duration) -> RemoteFetcher {
    RemoteFetcher::new(
        Credentials::new(TEST_TOKEN),
        FetcherOptions {
            endpoint: provider.url.clone(),
            timeout,
            max_retries: 0,
        },
    )
    .unwrap()
}

/// Starts the repopulse router and returns its address.
pub async fn start_server(registry: ProjectRegistry, fetcher: RemoteFetcher) -> SocketAddr {
    start_server_with(registry, fetcher, ChannelOptions::default()).await
}

/// [`start_server`] with explicit channel options.
pub async fn start_server_with(
    registry: ProjectRegistry,
    fetcher: RemoteFetcher,
    options: ChannelOptions,
) -> SocketAddr {
    let state = AppState::new(registry, fetcher, options);
    serve(router(state)).await
}

/// Client side of a `/ws` connection.
pub type WsClient = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Opens `/ws` on `addr`.
pub async fn connect(addr: SocketAddr) -> WsClient {
    let (ws, _) = connect_async(format!("ws://{}/ws", addr)).await.unwrap();
    ws
}

/// Sends one trigger.
pub async fn trigger(ws: &mut WsClient) {
    ws.send(Message::Text("update".into())).await.unwrap();
}

/// Next text frame as JSON; panics if none arrives within five seconds.
pub async fn next_json(ws: &mut WsClient) -> Value {
    loop {
        let frame = tokio::time::timeout(Duration::from_secs(5), ws.next())
            .await
            .expect("timed out waiting for a message")
            .expect("channel closed")
            .expect("channel error");
        if let Message::Text(text) = frame {
            return serde_json::from_str(text.as_str()).unwrap();
        }
    }
}

/// True if nothing arrives within `wait`.
pub async fn stays_quiet(ws: &mut WsClient, wait: Duration) -> bool {
    tokio::time::timeout(wait, ws.next()).await.is_err()
}
