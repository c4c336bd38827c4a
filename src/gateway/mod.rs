//! Client for the agent gateway's WebSocket control channel.
//!
//! One background task owns the connection and reconnects after a fixed
//! delay whenever it drops. [`GatewayClient::call`] correlates requests and
//! replies by id; unsolicited approval events are forwarded to the state
//! actor.

pub mod pending;
pub mod protocol;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use mission_deck_core::models::Decision;
use serde_json::{json, Value};
use thiserror::Error;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::{self, header, HeaderValue};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use crate::config::GatewayConfig;
use crate::state::StateHandle;
use pending::PendingCalls;
use protocol::{GatewayEvent, Inbound, RequestFrame};

type GatewaySocket = WebSocketStream<MaybeTlsStream<TcpStream>>;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("gateway is not connected")]
    NotConnected,

    #[error("gateway connection closed before the reply arrived")]
    Disconnected,

    #[error("{method} timed out after {after:?}")]
    Timeout { method: String, after: Duration },

    #[error("{method} failed: {message}")]
    Remote { method: String, message: String },

    #[error("failed to encode request: {0}")]
    Encode(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
enum ConnectError {
    #[error(transparent)]
    Handshake(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("no handshake within {0:?}")]
    TimedOut(Duration),
}

#[derive(Clone)]
pub struct GatewayClient {
    inner: Arc<Inner>,
}

struct Inner {
    config: GatewayConfig,
    pending: PendingCalls,
    outbound: Mutex<Option<mpsc::UnboundedSender<Message>>>,
    connected: AtomicBool,
    shutdown: watch::Sender<bool>,
}

impl GatewayClient {
    pub fn new(config: GatewayConfig) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            inner: Arc::new(Inner {
                config,
                pending: PendingCalls::new(),
                outbound: Mutex::new(None),
                connected: AtomicBool::new(false),
                shutdown,
            }),
        }
    }

    /// Start the connection loop. It runs until [`GatewayClient::shutdown`].
    pub fn spawn(&self, state: StateHandle) -> JoinHandle<()> {
        let inner = self.inner.clone();
        tokio::spawn(async move { inner.run(state).await })
    }

    pub fn shutdown(&self) {
        self.inner.shutdown.send_replace(true);
    }

    pub fn is_connected(&self) -> bool {
        self.inner.connected.load(Ordering::SeqCst)
    }

    /// Send a request and wait for its reply, the call timeout, or the
    /// connection dropping.
    pub async fn call(&self, method: &str, params: Value) -> Result<Value, GatewayError> {
        let tx = self
            .inner
            .outbound()
            .clone()
            .ok_or(GatewayError::NotConnected)?;

        // Dropping the ticket on any early return, or with this future,
        // removes the call from the table.
        let ticket = self
            .inner
            .pending
            .register(method, self.inner.config.call_timeout);
        let id = ticket.id;
        let frame = serde_json::to_string(&RequestFrame {
            id,
            method,
            params: &params,
        })?;

        tracing::debug!(id, method, "gateway call");
        if tx.send(Message::text(frame)).is_err() {
            return Err(GatewayError::Disconnected);
        }
        ticket.wait().await
    }

    /// Ask the gateway to apply an operator's decision to an approval.
    pub async fn resolve_approval(&self, id: &str, decision: Decision) -> Result<Value, GatewayError> {
        self.call(
            protocol::METHOD_RESOLVE_APPROVAL,
            json!({ "id": id, "decision": decision.as_str() }),
        )
        .await
    }
}

impl Inner {
    fn outbound(&self) -> std::sync::MutexGuard<'_, Option<mpsc::UnboundedSender<Message>>> {
        self.outbound.lock().unwrap_or_else(|e| e.into_inner())
    }

    async fn run(&self, state: StateHandle) {
        let mut shutdown = self.shutdown.subscribe();
        loop {
            if *shutdown.borrow() {
                break;
            }
            match self.connect().await {
                Ok(socket) => {
                    tracing::info!(url = %self.config.url, "gateway connected");
                    self.session(socket, &state, &mut shutdown).await;
                    tracing::info!("gateway disconnected");
                }
                Err(err) => {
                    tracing::warn!(url = %self.config.url, "gateway connect failed: {}", err);
                }
            }
            if *shutdown.borrow() {
                break;
            }
            tokio::select! {
                _ = tokio::time::sleep(self.config.reconnect_delay) => {}
                _ = shutdown.changed() => break,
            }
        }
        tracing::debug!("gateway loop stopped");
    }

    async fn connect(&self) -> Result<GatewaySocket, ConnectError> {
        let mut request = self.config.url.as_str().into_client_request()?;
        if let Some(token) = &self.config.token {
            let value = HeaderValue::from_str(&format!("Bearer {token}"))
                .map_err(|e| ConnectError::Handshake(http::Error::from(e).into()))?;
            request.headers_mut().insert(header::AUTHORIZATION, value);
        }
        let deadline = self.config.connect_timeout;
        let (socket, _) = tokio::time::timeout(deadline, tokio_tungstenite::connect_async(request))
            .await
            .map_err(|_| ConnectError::TimedOut(deadline))??;
        Ok(socket)
    }

    async fn session(
        &self,
        socket: GatewaySocket,
        state: &StateHandle,
        shutdown: &mut watch::Receiver<bool>,
    ) {
        let (mut sink, mut stream) = socket.split();
        let (tx, mut rx) = mpsc::unbounded_channel::<Message>();
        *self.outbound() = Some(tx);
        self.connected.store(true, Ordering::SeqCst);
        state.set_gateway_connected(true);

        loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    let _ = sink.send(Message::Close(None)).await;
                    break;
                }
                Some(message) = rx.recv() => {
                    if let Err(err) = sink.send(message).await {
                        tracing::warn!("gateway send failed: {}", err);
                        break;
                    }
                }
                frame = stream.next() => match frame {
                    Some(Ok(Message::Text(text))) => self.dispatch(text.as_str(), state),
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(err)) => {
                        tracing::warn!("gateway read failed: {}", err);
                        break;
                    }
                },
            }
        }

        // Close the queue first so a call racing this teardown either lands
        // in the table before it is failed or sees its send rejected.
        drop(rx);
        *self.outbound() = None;
        self.connected.store(false, Ordering::SeqCst);
        let failed = self.pending.fail_all(|_| GatewayError::Disconnected);
        if failed > 0 {
            tracing::warn!(failed, "pending gateway calls failed on disconnect");
        }
        state.set_gateway_connected(false);
    }

    fn dispatch(&self, text: &str, state: &StateHandle) {
        match protocol::parse_inbound(text) {
            Some(Inbound::Reply { id, outcome }) => {
                if !self.pending.settle(id, outcome) {
                    tracing::debug!(id, "dropping reply for unknown or expired call");
                }
            }
            Some(Inbound::Event { name, data }) => match protocol::interpret_event(&name, &data) {
                Some(GatewayEvent::ApprovalRequested(request)) => {
                    state.request_approval(request);
                }
                Some(GatewayEvent::ApprovalResolved(event)) => {
                    state.apply(event);
                }
                None => tracing::trace!(event = %name, "ignoring gateway event"),
            },
            None => tracing::trace!("ignoring unrecognized gateway frame"),
        }
    }
}
