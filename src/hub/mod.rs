//! Live observer channel.
//!
//! Each observer gets the full snapshot on connect and again after every
//! published change. Snapshots come from a `watch` receiver, so an observer
//! that falls behind skips straight to the latest state.

pub mod protocol;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use mission_deck_core::models::Decision;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::api::AppState;
use protocol::{ObserverCommand, ObserverMessage};

pub async fn ws_handler(ws: WebSocketUpgrade, State(app): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| observe(socket, app))
}

async fn observe(socket: WebSocket, app: AppState) {
    let observer = Uuid::new_v4();
    tracing::debug!(%observer, "observer connected");

    let (mut sink, mut stream) = socket.split();
    let mut snapshots = app.state.subscribe();
    // Replies from command tasks meant for this observer only.
    let (reply_tx, mut reply_rx) = mpsc::unbounded_channel::<String>();

    let initial = snapshots.borrow_and_update().clone();
    if let Some(text) = (ObserverMessage::Snapshot { state: &*initial }).encode() {
        if send(&mut sink, text).await.is_err() {
            return;
        }
    }

    loop {
        tokio::select! {
            changed = snapshots.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = snapshots.borrow_and_update().clone();
                let Some(text) = (ObserverMessage::Snapshot { state: &*snapshot }).encode() else {
                    continue;
                };
                if send(&mut sink, text).await.is_err() {
                    break;
                }
            }
            Some(text) = reply_rx.recv() => {
                if send(&mut sink, text).await.is_err() {
                    break;
                }
            }
            frame = stream.next() => match frame {
                Some(Ok(Message::Text(text))) => {
                    handle_command(&app, text.as_str(), &reply_tx, observer);
                }
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(err)) => {
                    tracing::debug!(%observer, "observer read failed: {}", err);
                    break;
                }
            },
        }
    }
    tracing::debug!(%observer, "observer disconnected");
}

async fn send(sink: &mut SplitSink<WebSocket, Message>, text: String) -> Result<(), axum::Error> {
    sink.send(Message::Text(text.into())).await
}

fn handle_command(
    app: &AppState,
    text: &str,
    reply_tx: &mpsc::UnboundedSender<String>,
    observer: Uuid,
) {
    let reply_error = |message: String| {
        if let Some(text) = ObserverMessage::error(message).encode() {
            let _ = reply_tx.send(text);
        }
    };

    let command = match serde_json::from_str::<ObserverCommand>(text) {
        Ok(command) => command,
        Err(err) => {
            tracing::debug!(%observer, "malformed observer command: {}", err);
            reply_error(format!("malformed command: {err}"));
            return;
        }
    };

    match command {
        ObserverCommand::SubmitMission { agent_id, command } => {
            if command.trim().is_empty() {
                reply_error("mission command is empty".to_string());
                return;
            }
            tracing::info!(%observer, agent = ?agent_id, "mission from observer");
            app.state.submit_mission(agent_id, command);
        }
        ObserverCommand::ResolveApproval { id, allow } => {
            let app = app.clone();
            let reply_tx = reply_tx.clone();
            tokio::spawn(async move {
                let decision = Decision::from_allow(allow);
                if let Err(err) = app.resolve_approval(&id, decision).await {
                    tracing::warn!(%observer, id = %id, "approval resolution failed: {}", err);
                    if let Some(text) = ObserverMessage::error(err.to_string()).encode() {
                        let _ = reply_tx.send(text);
                    }
                }
            });
        }
    }
}
