//! # Viewer Channels
//!
//! Everything a browser talks to: the HTML page, a health probe and the
//! `/ws` endpoint. Each WebSocket gets its own task; a text frame is a
//! trigger, answered with one JSON message per tracked project or a single
//! error notice.
//!
//! ## Contained Modules:
//!
//! - **`routes`**: `AppState`, `ChannelOptions` and the axum `router`.
//! - **`broadcaster`**: the per-connection Idle/Fetching loop.
//! - **`messages`**: outbound frame encoding.
//! - **`page`**: the server-rendered index page.

/// Per-connection trigger/fetch/emit loop.
pub mod broadcaster;
/// Outbound frame encoding.
pub mod messages;
/// Index page rendering.
pub mod page;
/// Router and shared handler state.
pub mod routes;
