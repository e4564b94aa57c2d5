//! Provider readiness state machine
//!
//! ```text
//! Starting ──► HandshakeSent ──► Ready
//!     │              │
//!     └──────────────┴──► Failed
//!
//! any state ──► Terminated   (process exit or shutdown)
//! ```
//!
//! Transitions that are not on this diagram are ignored, which makes every
//! state change happen at most once.

use super::error::McpError;
use crate::config::ReadinessPolicy;
use std::fmt;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::debug;

/// Deadline used when the configured wait does not fit in an `Instant`
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

/// Where the provider is in its startup sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReadinessState {
    /// Process spawned, handshake not sent yet
    Starting,
    /// Initialize request written, waiting for the response
    HandshakeSent,
    /// Handshake complete, tool calls are accepted
    Ready,
    /// Handshake rejected or timed out
    Failed,
    /// Process exited or was shut down
    Terminated,
}

impl ReadinessState {
    /// Whether the machine may move from `self` to `next`
    pub fn can_transition_to(self, next: ReadinessState) -> bool {
        use ReadinessState::*;
        matches!(
            (self, next),
            (Starting, HandshakeSent)
                | (Starting, Failed)
                | (HandshakeSent, Ready)
                | (HandshakeSent, Failed)
                | (Starting | HandshakeSent | Ready | Failed, Terminated)
        )
    }

    /// `Failed` and `Terminated` never lead to `Ready`
    pub fn is_final(self) -> bool {
        matches!(self, Self::Failed | Self::Terminated)
    }
}

impl fmt::Display for ReadinessState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Starting => "starting",
            Self::HandshakeSent => "handshake-sent",
            Self::Ready => "ready",
            Self::Failed => "failed",
            Self::Terminated => "terminated",
        };
        f.write_str(name)
    }
}

/// Readiness of one bridge instance, observable through a watch channel
#[derive(Debug)]
pub struct Readiness {
    state: watch::Sender<ReadinessState>,
}

impl Default for Readiness {
    fn default() -> Self {
        Self::new()
    }
}

impl Readiness {
    /// Start in [`ReadinessState::Starting`]
    pub fn new() -> Self {
        let (state, _) = watch::channel(ReadinessState::Starting);
        Self { state }
    }

    /// Current state
    pub fn state(&self) -> ReadinessState {
        *self.state.borrow()
    }

    /// Receiver notified on every transition
    pub fn subscribe(&self) -> watch::Receiver<ReadinessState> {
        self.state.subscribe()
    }

    /// `Starting -> HandshakeSent`
    pub fn handshake_sent(&self) -> bool {
        self.transition(ReadinessState::HandshakeSent)
    }

    /// `HandshakeSent -> Ready`
    pub fn mark_ready(&self) -> bool {
        self.transition(ReadinessState::Ready)
    }

    /// `Starting | HandshakeSent -> Failed`
    pub fn mark_failed(&self) -> bool {
        self.transition(ReadinessState::Failed)
    }

    /// Any state `-> Terminated`
    pub fn mark_terminated(&self) -> bool {
        self.transition(ReadinessState::Terminated)
    }

    fn transition(&self, next: ReadinessState) -> bool {
        let mut previous = None;
        self.state.send_if_modified(|state| {
            if state.can_transition_to(next) {
                previous = Some(*state);
                *state = next;
                true
            } else {
                false
            }
        });

        match previous {
            Some(from) => {
                debug!(%from, to = %next, "provider readiness changed");
                true
            }
            None => false,
        }
    }

    /// Wait until the provider is ready, for at most `policy.total_wait()`,
    /// re-checking every `policy.poll_interval`.
    ///
    /// A state change wakes the waiter early. Fails immediately once the
    /// state is `Failed` or `Terminated`.
    pub async fn wait_ready(&self, policy: &ReadinessPolicy) -> Result<(), McpError> {
        let mut updates = self.subscribe();
        let started = Instant::now();
        let deadline = started
            .checked_add(policy.total_wait())
            .unwrap_or_else(|| started + FAR_FUTURE);

        loop {
            let state = *updates.borrow_and_update();
            match state {
                ReadinessState::Ready => return Ok(()),
                state if state.is_final() => return Err(McpError::not_ready(state)),
                _ => {}
            }

            let now = Instant::now();
            if now >= deadline {
                return Err(McpError::not_ready(state));
            }
            let wait = policy.poll_interval.min(deadline - now);
            let _ = tokio::time::timeout(wait, updates.changed()).await;
        }
    }
}
