/**
 * WebSocket Client
 *
 * Drives one pad socket. A writer task drains the client's outbound queue
 * and pings on an interval; the reader feeds text frames to the engine and
 * gives up when nothing arrives within the pong timeout.
 */
use axum::extract::ws::{Message, WebSocket};
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{interval, timeout, MissedTickBehavior};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::backend::collab::CollabEngine;
use crate::backend::realtime::hub::Outbound;

async fn write_pump(mut sink: SplitSink<WebSocket, Message>, mut rx: mpsc::Receiver<Outbound>, ping_every: Duration) {
    let mut ping = interval(ping_every);
    ping.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ping.tick().await;

    loop {
        tokio::select! {
            outbound = rx.recv() => match outbound {
                Some(Outbound::Text(text)) => {
                    if sink.send(Message::Text(text.into())).await.is_err() {
                        break;
                    }
                }
                Some(Outbound::Close) | None => {
                    let _ = sink.send(Message::Close(None)).await;
                    break;
                }
            },
            _ = ping.tick() => {
                if sink.send(Message::Ping(axum::body::Bytes::new())).await.is_err() {
                    break;
                }
            }
        }
    }
}

/// Runs a pad socket until either side closes it.
pub async fn serve_socket(socket: WebSocket, engine: CollabEngine, ip: String) {
    let session_id = Uuid::new_v4().to_string();
    let ping_every = Duration::from_secs(engine.config().ping_interval_secs.max(1));
    let read_deadline = Duration::from_secs(engine.config().pong_timeout_secs.max(1));

    let (sink, mut stream) = socket.split();
    let rx = engine.connect(&session_id, &ip).await;
    let mut writer = tokio::spawn(write_pump(sink, rx, ping_every));

    loop {
        let frame = match timeout(read_deadline, stream.next()).await {
            Ok(Some(Ok(frame))) => frame,
            Ok(Some(Err(err))) => {
                debug!(session_id = %session_id, "[Hub] Socket error: {}", err);
                break;
            }
            Ok(None) => break,
            Err(_) => {
                info!(session_id = %session_id, "[Hub] Read deadline missed, closing");
                break;
            }
        };
        match frame {
            Message::Text(text) => {
                if !engine.handle_frame(&session_id, text.as_str()).await {
                    break;
                }
            }
            Message::Close(_) => break,
            Message::Binary(_) => {
                warn!(session_id = %session_id, "[Hub] Ignoring binary frame");
            }
            Message::Ping(_) | Message::Pong(_) => {}
        }
    }

    engine.disconnect(&session_id).await;
    // The writer drains the Close queued by the hub, or ends once the
    // sender is dropped.
    if timeout(Duration::from_secs(1), &mut writer).await.is_err() {
        debug!(session_id = %session_id, "[Hub] Writer did not finish in time");
        writer.abort();
    }
}
