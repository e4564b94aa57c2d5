//! Provider bridge façade
//!
//! [`McpBridge`] is the only type the host application touches. It owns one
//! provider process, a background receiver task that demultiplexes every
//! inbound frame, and a handshake task that drives readiness.
//!
//! # Features
//! - Any number of concurrent tool calls over one stdin/stdout pair
//! - Per-call timeouts that never affect other calls
//! - Calls issued before the handshake finishes wait for readiness
//! - Provider exit fails every outstanding call

mod handshake;
mod receiver;

use super::codec::FrameCodec;
use super::correlator::Correlator;
use super::error::McpError;
use super::notification::{LoggingNotificationHandler, NotificationHandler};
use super::protocol::{McpMessage, McpRequest, methods};
use super::readiness::{Readiness, ReadinessState};
use super::supervisor::{ProcessControl, ProcessEvent, ProcessSupervisor};
use super::types::{InitializeResult, McpTool, unwrap_tool_result};
use crate::config::BridgeConfig;
use crate::error::UnifiedError;
use parking_lot::{Mutex, RwLock};
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::sync::{Notify, mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

/// Write half of the provider connection
pub type ProviderWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// Read half of the provider connection
pub type ProviderReader = Box<dyn AsyncRead + Send + Unpin>;

/// State shared between the façade and its background tasks
pub(crate) struct BridgeInner {
    config: BridgeConfig,
    readiness: Readiness,
    correlator: Correlator,
    writer: tokio::sync::Mutex<Option<ProviderWriter>>,
    control: ProcessControl,
    pid: Option<u32>,
    server: RwLock<Option<InitializeResult>>,
    notifications: RwLock<Arc<dyn NotificationHandler>>,
    banner: Notify,
    cancel: CancellationToken,
}

impl BridgeInner {
    /// Write one whole frame. The writer lock is held until the frame is
    /// flushed, so concurrent frames never interleave.
    async fn send(&self, message: &McpMessage) -> Result<(), McpError> {
        let frame = FrameCodec::encode(message)?;
        let mut writer = self.writer.lock().await;
        let Some(writer) = writer.as_mut() else {
            return Err(McpError::ProcessTerminated {
                code: self.control.exit_code(),
            });
        };

        writer.write_all(&frame).await?;
        writer.flush().await?;
        debug!(id = ?message.id(), bytes = frame.len(), "frame written");
        Ok(())
    }

    /// Record provider exit: readiness goes to `Terminated` and every
    /// pending call fails. Safe to call more than once.
    fn terminated(&self, code: Option<i32>) {
        if self.readiness.mark_terminated() {
            info!(?code, "provider terminated");
        }

        let failed = self
            .correlator
            .fail_all(McpError::ProcessTerminated { code });
        if failed > 0 {
            warn!(failed, ?code, "failed pending calls after provider exit");
        }
    }
}

/// Bridge to one stdio tool provider
pub struct McpBridge {
    inner: Arc<BridgeInner>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl McpBridge {
    /// Spawn the configured provider and start the handshake.
    ///
    /// Returns as soon as the process is running; use
    /// [`wait_until_ready`](Self::wait_until_ready) or just call a tool,
    /// which waits for readiness itself. Must be called inside a tokio
    /// runtime.
    #[instrument(skip(config), fields(command = %config.provider.command))]
    pub fn start(config: BridgeConfig) -> Result<Self, McpError> {
        config
            .validate()
            .map_err(|e| McpError::config(e.message()))?;

        let supervisor = ProcessSupervisor::new(config.logging.echo_provider_stderr);
        let handle = supervisor.start(&config.provider)?;
        let pid = handle.pid();
        let (stdin, stdout, events, control) = handle.into_parts().ok_or_else(|| {
            McpError::spawn(&config.provider.command, "provider streams unavailable")
        })?;

        Ok(Self::assemble(
            Box::new(stdin),
            Box::new(stdout),
            Some(events),
            control,
            pid,
            config,
        ))
    }

    /// Build a bridge over streams that are already connected to a provider.
    ///
    /// No process is owned: shutdown closes the writer and stops the
    /// background tasks, and end-of-stream on `reader` counts as provider
    /// exit.
    pub fn from_parts<W, R>(writer: W, reader: R, config: BridgeConfig) -> Result<Self, McpError>
    where
        W: AsyncWrite + Send + Unpin + 'static,
        R: AsyncRead + Send + Unpin + 'static,
    {
        config
            .validate_bounds()
            .map_err(|e| McpError::config(e.message()))?;

        Ok(Self::assemble(
            Box::new(writer),
            Box::new(reader),
            None,
            ProcessControl::detached(),
            None,
            config,
        ))
    }

    fn assemble(
        writer: ProviderWriter,
        reader: ProviderReader,
        events: Option<mpsc::UnboundedReceiver<ProcessEvent>>,
        control: ProcessControl,
        pid: Option<u32>,
        config: BridgeConfig,
    ) -> Self {
        let inner = Arc::new(BridgeInner {
            config,
            readiness: Readiness::new(),
            correlator: Correlator::new(),
            writer: tokio::sync::Mutex::new(Some(writer)),
            control,
            pid,
            server: RwLock::new(None),
            notifications: RwLock::new(Arc::new(LoggingNotificationHandler)),
            banner: Notify::new(),
            cancel: CancellationToken::new(),
        });

        let receiver = tokio::spawn(receiver::run(Arc::clone(&inner), reader, events));
        let handshake = tokio::spawn(handshake::run(Arc::clone(&inner)));

        Self {
            inner,
            tasks: Mutex::new(vec![receiver, handshake]),
        }
    }

    /// Invoke a remote tool with the configured request timeout
    #[instrument(skip(self, arguments), fields(tool_name = %name))]
    pub async fn call_tool(&self, name: &str, arguments: Value) -> Result<Value, McpError> {
        self.call_tool_with_timeout(name, arguments, self.inner.config.request_timeout)
            .await
    }

    /// Invoke a remote tool, failing with [`McpError::CallTimeout`] if no
    /// response arrives within `timeout`
    pub async fn call_tool_with_timeout(
        &self,
        name: &str,
        arguments: Value,
        timeout: Duration,
    ) -> Result<Value, McpError> {
        let arguments = if arguments.is_null() {
            json!({})
        } else {
            arguments
        };
        let params = json!({
            "name": name,
            "arguments": arguments
        });

        let result = self.request(methods::TOOLS_CALL, name, params, timeout).await?;
        unwrap_tool_result(result)
    }

    /// List the tools the provider exposes
    pub async fn list_tools(&self) -> Result<Vec<McpTool>, McpError> {
        let result = self
            .request(
                methods::TOOLS_LIST,
                methods::TOOLS_LIST,
                json!({}),
                self.inner.config.request_timeout,
            )
            .await?;

        let tools = match result.get("tools") {
            Some(tools) => serde_json::from_value(tools.clone())?,
            None => Vec::new(),
        };
        Ok(tools)
    }

    /// Wait for readiness, register the call, write it, wait for its response
    async fn request(
        &self,
        method: &str,
        name: &str,
        params: Value,
        timeout: Duration,
    ) -> Result<Value, McpError> {
        self.inner
            .readiness
            .wait_ready(&self.inner.config.readiness)
            .await?;
        self.send_request(method, name, params, timeout).await
    }

    /// Register, write and wait for one request once readiness has been seen
    async fn send_request(
        &self,
        method: &str,
        name: &str,
        params: Value,
        timeout: Duration,
    ) -> Result<Value, McpError> {
        let inner = &self.inner;
        let id = inner.correlator.next_id();
        let request = McpRequest::new(id.clone(), method).with_params(params.clone());
        // Register before writing so a fast response always finds its caller.
        let slot = inner.correlator.register(id, name, params);

        // Termination may have drained the pending set between the readiness
        // check and the registration above; nothing would fail this call then.
        if inner.readiness.state().is_final() {
            return Err(McpError::ProcessTerminated {
                code: inner.control.exit_code(),
            });
        }

        inner.send(&request.into()).await?;
        slot.wait(timeout).await
    }

    /// Wait until the handshake has completed, within the polling bounds
    pub async fn wait_until_ready(&self) -> Result<(), McpError> {
        self.inner
            .readiness
            .wait_ready(&self.inner.config.readiness)
            .await
    }

    /// Current readiness state
    pub fn state(&self) -> ReadinessState {
        self.inner.readiness.state()
    }

    /// Receiver that observes every readiness transition
    pub fn subscribe_state(&self) -> watch::Receiver<ReadinessState> {
        self.inner.readiness.subscribe()
    }

    /// Handshake result, once the provider is ready
    pub fn server_info(&self) -> Option<InitializeResult> {
        self.inner.server.read().clone()
    }

    /// Number of calls waiting for a response
    pub fn pending_calls(&self) -> usize {
        self.inner.correlator.pending_count()
    }

    /// OS process id of the provider, if the bridge spawned it
    pub fn pid(&self) -> Option<u32> {
        self.inner.pid
    }

    /// Whether the provider process is still running
    pub fn is_alive(&self) -> bool {
        self.inner.control.is_alive()
    }

    /// Bridge configuration
    pub fn config(&self) -> &BridgeConfig {
        &self.inner.config
    }

    /// Replace the handler for provider notifications
    pub fn set_notification_handler(&self, handler: Arc<dyn NotificationHandler>) {
        *self.inner.notifications.write() = handler;
    }

    /// Stop the provider and fail every pending call. Idempotent.
    pub async fn shutdown(&self) {
        let inner = &self.inner;
        info!(
            pending = inner.correlator.pending_count(),
            "shutting down provider bridge"
        );

        // Closing stdin asks a stdio provider to exit. If a writer is stuck on
        // a full pipe the kill after the grace period unblocks it instead.
        if let Ok(mut writer) = inner.writer.try_lock() {
            writer.take();
        }
        inner.control.terminate(inner.config.shutdown_grace).await;

        inner.cancel.cancel();
        inner.terminated(inner.control.exit_code());

        let tasks: Vec<JoinHandle<()>> = self.tasks.lock().drain(..).collect();
        for task in tasks {
            if let Err(e) = task.await {
                debug!(error = %e, "bridge task ended abnormally");
            }
        }
    }
}

impl Drop for McpBridge {
    fn drop(&mut self) {
        self.inner.cancel.cancel();
        self.inner.control.kill_now();
        for task in self.tasks.lock().drain(..) {
            task.abort();
        }
    }
}

impl std::fmt::Debug for McpBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("McpBridge")
            .field("command", &self.inner.config.provider.command)
            .field("pid", &self.inner.pid)
            .field("state", &self.state())
            .field("pending_calls", &self.pending_calls())
            .finish()
    }
}
