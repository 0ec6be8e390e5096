//! # Broadcaster
//!
//! Drives one WebSocket through `Connected -> (Idle <-> Fetching) -> Closed`.
//!
//! The socket is split: a reader task turns inbound frames into triggers on
//! a bounded per-connection queue and cancels `closed` when the peer goes
//! away; the loop below takes one trigger at a time, fetches, and writes
//! the result. A channel never has two fetches in flight. Triggers that
//! arrive mid-fetch wait in the queue; once it is full, extras are dropped.

use axum::extract::ws::{Message, WebSocket};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio_util::sync::CancellationToken;

use crate::channel::messages::frames_for;
use crate::channel::routes::AppState;
use crate::github::fetcher::FetchResult;

static NEXT_CLIENT_ID: AtomicUsize = AtomicUsize::new(1);

/// Runs the trigger/fetch/emit loop for one accepted socket until it closes.
pub async fn handle_socket(socket: WebSocket, state: AppState) {
    let client_id = NEXT_CLIENT_ID.fetch_add(1, Ordering::Relaxed);
    log::info!("Client {} connected", client_id);

    let (mut sink, stream) = socket.split();
    let (trigger_tx, mut trigger_rx) = mpsc::channel::<()>(state.options.trigger_queue.max(1));
    let closed = CancellationToken::new();
    let reader = tokio::spawn(read_triggers(client_id, stream, trigger_tx, closed.clone()));

    loop {
        // Idle
        tokio::select! {
            biased;
            _ = closed.cancelled() => break,
            trigger = trigger_rx.recv() => {
                if trigger.is_none() {
                    break;
                }
            }
        }

        // Fetching. Losing the race to `closed` drops the request future.
        let outcome = tokio::select! {
            biased;
            _ = closed.cancelled() => {
                log::info!("Client {} went away mid-fetch; request abandoned", client_id);
                break;
            }
            outcome = state.fetcher.fetch_projects(&state.registry) => outcome,
        };

        if let Err(e) = send_outcome(&mut sink, client_id, &outcome).await {
            log::info!("Client {} send failed: {}", client_id, e);
            break;
        }
    }

    closed.cancel();
    reader.abort();
    let _ = sink.close().await;
    log::info!("Client {} disconnected", client_id);
}

/// Forwards every text or binary frame as a trigger. Payloads are ignored.
async fn read_triggers(
    client_id: usize,
    mut stream: SplitStream<WebSocket>,
    triggers: mpsc::Sender<()>,
    closed: CancellationToken,
) {
    loop {
        let frame = tokio::select! {
            _ = closed.cancelled() => break,
            frame = stream.next() => frame,
        };

        match frame {
            Some(Ok(Message::Text(_))) | Some(Ok(Message::Binary(_))) => {
                match triggers.try_send(()) {
                    Ok(()) => log::debug!("Client {} trigger queued", client_id),
                    Err(TrySendError::Full(())) => {
                        log::warn!("Client {} trigger queue full; trigger dropped", client_id);
                    }
                    Err(TrySendError::Closed(())) => break,
                }
            }
            Some(Ok(Message::Close(_))) | None => {
                log::debug!("Client {} closed the channel", client_id);
                break;
            }
            // Ping/pong replies are handled by axum.
            Some(Ok(_)) => {}
            Some(Err(e)) => {
                log::warn!("Client {} channel error: {}", client_id, e);
                break;
            }
        }
    }
    closed.cancel();
}

async fn send_outcome(
    sink: &mut SplitSink<WebSocket, Message>,
    client_id: usize,
    outcome: &FetchResult,
) -> Result<(), axum::Error> {
    match outcome {
        Ok(metrics) => log::info!("Client {}: pushing metrics for {} project(s)", client_id, metrics.len()),
        Err(e) => log::warn!("Client {}: fetch failed ({}): {}", client_id, e.kind(), e),
    }

    for frame in frames_for(outcome) {
        sink.send(Message::Text(frame.into())).await?;
    }
    Ok(())
}
