//! Outstanding request/response calls on the control channel.
//!
//! Every call is settled exactly once: by its reply, by its deadline, or by
//! the connection going away. Settlement happens under the table lock, so a
//! reply racing a timeout can only ever win or lose, never both. A ticket
//! that is dropped before it settles takes its table entry with it.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use serde_json::Value;
use tokio::sync::oneshot;

use super::GatewayError;

type Reply = Result<Value, GatewayError>;

struct PendingCall {
    method: String,
    slot: oneshot::Sender<Reply>,
}

/// A registered call waiting for its reply.
pub struct CallTicket<'a> {
    pub id: u64,
    method: String,
    timeout: Duration,
    rx: oneshot::Receiver<Reply>,
    calls: &'a PendingCalls,
}

#[derive(Default)]
pub struct PendingCalls {
    next_id: AtomicU64,
    calls: Mutex<HashMap<u64, PendingCall>>,
}

impl PendingCalls {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate an id and reserve a slot for its reply.
    pub fn register(&self, method: &str, timeout: Duration) -> CallTicket<'_> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let (slot, rx) = oneshot::channel();
        self.lock().insert(
            id,
            PendingCall {
                method: method.to_string(),
                slot,
            },
        );
        CallTicket {
            id,
            method: method.to_string(),
            timeout,
            rx,
            calls: self,
        }
    }

    /// Deliver a reply. Returns false when the id is unknown, which covers
    /// replies that arrive after their call already timed out.
    pub fn settle(&self, id: u64, outcome: Result<Value, String>) -> bool {
        let mut calls = self.lock();
        match calls.remove(&id) {
            Some(call) => {
                let reply = outcome.map_err(|message| GatewayError::Remote {
                    method: call.method,
                    message,
                });
                let _ = call.slot.send(reply);
                true
            }
            None => false,
        }
    }

    /// Remove a call without answering it.
    pub fn cancel(&self, id: u64) -> bool {
        self.lock().remove(&id).is_some()
    }

    /// Fail every outstanding call with the error `make` builds for it.
    pub fn fail_all(&self, make: impl Fn(&str) -> GatewayError) -> usize {
        let drained: Vec<_> = self.lock().drain().collect();
        let count = drained.len();
        for (_, call) in drained {
            let _ = call.slot.send(Err(make(&call.method)));
        }
        count
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<u64, PendingCall>> {
        // A panic while holding the lock cannot leave the map half-updated.
        self.calls.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl CallTicket<'_> {
    /// Wait for the reply or the deadline, whichever comes first.
    pub async fn wait(mut self) -> Reply {
        match tokio::time::timeout(self.timeout, &mut self.rx).await {
            Ok(Ok(reply)) => reply,
            Ok(Err(_)) => Err(GatewayError::Disconnected),
            Err(_) => self.expire(),
        }
    }

    /// Settle the call as timed out, unless its reply was delivered after
    /// the deadline fired but before the entry could be removed.
    fn expire(&mut self) -> Reply {
        if self.calls.cancel(self.id) {
            tracing::warn!(id = self.id, method = %self.method, "gateway call timed out");
            return Err(GatewayError::Timeout {
                method: self.method.clone(),
                after: self.timeout,
            });
        }
        match self.rx.try_recv() {
            Ok(reply) => reply,
            Err(_) => Err(GatewayError::Disconnected),
        }
    }
}

impl Drop for CallTicket<'_> {
    fn drop(&mut self) {
        self.calls.cancel(self.id);
    }
}
