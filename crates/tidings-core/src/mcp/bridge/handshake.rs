//! Initialization handshake
//!
//! Sends `initialize` under the reserved handshake id, waits for its
//! response, then acknowledges with `notifications/initialized` and marks
//! the bridge ready. Any failure leaves readiness in `Failed`.

use super::BridgeInner;
use crate::mcp::error::McpError;
use crate::mcp::protocol::{McpNotification, McpRequest, RequestId, methods};
use crate::mcp::types::{InitializeParams, InitializeResult};
use std::sync::Arc;
use tracing::{debug, info, warn};

pub(super) async fn run(inner: Arc<BridgeInner>) {
    tokio::select! {
        _ = inner.cancel.cancelled() => debug!("handshake abandoned"),
        outcome = perform(&inner) => match outcome {
            Ok(()) => {}
            Err(e) => {
                if inner.readiness.mark_failed() {
                    warn!(error = %e, "provider handshake failed");
                } else {
                    debug!(error = %e, state = %inner.readiness.state(), "handshake ended");
                }
            }
        },
    }
}

async fn perform(inner: &BridgeInner) -> Result<(), McpError> {
    let config = &inner.config;

    if config.provider.banner_pattern.is_some()
        && tokio::time::timeout(config.banner_wait, inner.banner.notified())
            .await
            .is_err()
    {
        debug!(wait = ?config.banner_wait, "no provider banner, sending handshake anyway");
    }

    let params = serde_json::to_value(InitializeParams::new(&config.client))?;
    let id = RequestId::handshake();
    let request = McpRequest::new(id.clone(), methods::INITIALIZE).with_params(params.clone());
    let slot = inner.correlator.register(id, methods::INITIALIZE, params);

    let state = inner.readiness.state();
    if state.is_final() {
        return Err(McpError::not_ready(state));
    }

    inner.send(&request.into()).await?;
    inner.readiness.handshake_sent();
    debug!(timeout = ?config.handshake_timeout, "initialize sent");

    let value = match slot.wait(config.handshake_timeout).await {
        Ok(value) => value,
        Err(McpError::CallTimeout { timeout, .. }) => {
            return Err(McpError::HandshakeTimeout { timeout });
        }
        Err(McpError::RemoteTool { message, .. }) => {
            return Err(McpError::HandshakeRejected { message });
        }
        Err(e) => return Err(e),
    };

    let result: InitializeResult = serde_json::from_value(value).unwrap_or_else(|e| {
        debug!(error = %e, "unrecognized initialize result, continuing");
        InitializeResult::default()
    });

    inner
        .send(&McpNotification::new(methods::INITIALIZED).into())
        .await?;

    info!(
        server = %result.server_info.name,
        version = %result.server_info.version,
        protocol = ?result.protocol_version,
        "provider ready"
    );
    *inner.server.write() = Some(result);
    inner.readiness.mark_ready();
    Ok(())
}
