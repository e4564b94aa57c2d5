//! Request correlation
//!
//! Every outbound request is registered under its id before it is written.
//! The single receiver task hands each inbound response to [`Correlator::resolve`],
//! which completes exactly the caller that owns that id. Responses for ids
//! that are not pending (late answers to timed-out calls, duplicates) are
//! dropped.

use super::error::McpError;
use super::protocol::{HANDSHAKE_REQUEST_ID, McpResponse, RequestId};
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::oneshot;
use tracing::{debug, warn};

/// Outcome delivered to a waiting caller
pub type CallOutcome = Result<Value, McpError>;

/// One in-flight request
#[derive(Debug)]
pub struct PendingCall {
    /// Tool or method name, used in errors and logs
    pub name: String,
    /// Arguments as sent
    pub arguments: Value,
    /// When the call was registered
    pub created_at: Instant,
    responder: oneshot::Sender<CallOutcome>,
}

/// Tracks in-flight requests keyed by id
#[derive(Debug)]
pub struct Correlator {
    next_id: AtomicI64,
    pending: Mutex<HashMap<RequestId, PendingCall>>,
}

impl Default for Correlator {
    fn default() -> Self {
        Self::new()
    }
}

impl Correlator {
    /// Create an empty correlator. Call ids start right after the handshake id.
    pub fn new() -> Self {
        Self::starting_at(HANDSHAKE_REQUEST_ID + 1)
    }

    /// Create a correlator whose first call id is `first_id`
    pub fn starting_at(first_id: i64) -> Self {
        Self {
            next_id: AtomicI64::new(first_id.max(HANDSHAKE_REQUEST_ID + 1)),
            pending: Mutex::new(HashMap::new()),
        }
    }

    /// Allocate a fresh call id. Ids are never reused.
    pub fn next_id(&self) -> RequestId {
        RequestId::Number(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    /// Register a pending call and get the slot its caller waits on.
    ///
    /// The entry is removed when the slot is dropped without having been
    /// resolved, so an abandoned caller never leaks its entry.
    pub fn register(
        &self,
        id: RequestId,
        name: impl Into<String>,
        arguments: Value,
    ) -> PendingSlot<'_> {
        let (responder, receiver) = oneshot::channel();
        let name = name.into();
        let call = PendingCall {
            name: name.clone(),
            arguments,
            created_at: Instant::now(),
            responder,
        };

        if let Some(previous) = self.pending.lock().insert(id.clone(), call) {
            warn!(%id, name = %previous.name, "replacing pending call with duplicate id");
        }

        PendingSlot {
            correlator: self,
            id,
            name,
            receiver,
        }
    }

    /// Complete the caller waiting on `response.id`.
    ///
    /// Returns `false` when no call with that id is pending; the response
    /// is dropped.
    pub fn resolve(&self, response: McpResponse) -> bool {
        let Some(call) = self.pending.lock().remove(&response.id) else {
            debug!(id = %response.id, "dropping response with no pending call");
            return false;
        };

        let id = response.id.clone();
        let outcome = response.into_result().map_err(|e| McpError::RemoteTool {
            code: e.code,
            message: e.message,
            data: e.data,
        });

        debug!(
            %id,
            name = %call.name,
            elapsed_ms = call.created_at.elapsed().as_millis() as u64,
            ok = outcome.is_ok(),
            "response matched"
        );

        if call.responder.send(outcome).is_err() {
            debug!(%id, "caller stopped waiting before the response arrived");
        }
        true
    }

    /// Remove a pending call without completing it
    pub fn forget(&self, id: &RequestId) -> Option<PendingCall> {
        self.pending.lock().remove(id)
    }

    /// Fail every pending call with `error` and clear the set.
    /// Returns how many calls were failed.
    pub fn fail_all(&self, error: McpError) -> usize {
        let drained: Vec<(RequestId, PendingCall)> = self.pending.lock().drain().collect();
        let count = drained.len();

        for (id, call) in drained {
            debug!(%id, name = %call.name, %error, "failing pending call");
            let _ = call.responder.send(Err(error.clone()));
        }
        count
    }

    /// Number of calls waiting for a response
    pub fn pending_count(&self) -> usize {
        self.pending.lock().len()
    }

    /// Whether a call with this id is pending
    pub fn is_pending(&self, id: &RequestId) -> bool {
        self.pending.lock().contains_key(id)
    }
}

/// The waiting side of a registered call
#[derive(Debug)]
pub struct PendingSlot<'a> {
    correlator: &'a Correlator,
    id: RequestId,
    name: String,
    receiver: oneshot::Receiver<CallOutcome>,
}

impl PendingSlot<'_> {
    /// Id the call was registered under
    pub fn id(&self) -> &RequestId {
        &self.id
    }

    /// Wait for the matching response, at most `bound`.
    ///
    /// On expiry the pending entry is removed and the call fails with
    /// [`McpError::CallTimeout`]; a response arriving later is unmatched.
    pub async fn wait(mut self, bound: Duration) -> CallOutcome {
        match tokio::time::timeout(bound, &mut self.receiver).await {
            Ok(Ok(outcome)) => outcome,
            // Responder dropped without an answer: the bridge went away.
            Ok(Err(_)) => Err(McpError::ProcessTerminated { code: None }),
            Err(_) => {
                self.correlator.forget(&self.id);
                debug!(id = %self.id, name = %self.name, ?bound, "call timed out");
                Err(McpError::call_timeout(self.name.clone(), bound))
            }
        }
    }
}

impl Drop for PendingSlot<'_> {
    fn drop(&mut self) {
        // Ids are never reused, so removing an already-resolved id is a no-op.
        self.correlator.forget(&self.id);
    }
}
