//! Background receiver task
//!
//! The only reader of provider stdout. Decodes frames and routes each one:
//! responses to the correlator, notifications to the handler, and
//! provider-initiated requests to a minimal responder.

use super::{BridgeInner, ProviderReader};
use crate::mcp::codec::FrameCodec;
use crate::mcp::protocol::{McpMessage, McpRequest, McpResponse, McpRpcError, methods};
use crate::mcp::supervisor::ProcessEvent;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio::sync::mpsc;
use tracing::{debug, error, warn};

const READ_CHUNK_SIZE: usize = 8 * 1024;

/// How long to wait for the exit status once stdout has closed
const EXIT_STATUS_WAIT: Duration = Duration::from_millis(250);

/// How long to keep reading stdout once the process has exited
const OUTPUT_DRAIN_WAIT: Duration = Duration::from_secs(1);

type Events = Option<mpsc::UnboundedReceiver<ProcessEvent>>;

pub(super) async fn run(inner: Arc<BridgeInner>, mut reader: ProviderReader, mut events: Events) {
    let mut codec = FrameCodec::new();
    let mut chunk = vec![0u8; READ_CHUNK_SIZE];

    let code = loop {
        tokio::select! {
            _ = inner.cancel.cancelled() => {
                debug!("receiver stopped");
                return;
            }
            read = reader.read(&mut chunk) => match read {
                Ok(0) => {
                    debug!("provider closed stdout");
                    if !codec.is_empty() {
                        debug!(bytes = codec.remainder().len(), "discarding unterminated frame");
                    }
                    break wait_for_exit(&mut events).await;
                }
                Ok(n) => {
                    for frame in codec.decode_chunk(&chunk[..n]) {
                        dispatch(&inner, frame);
                    }
                }
                Err(e) => {
                    error!(error = %e, "failed to read provider stdout");
                    break wait_for_exit(&mut events).await;
                }
            },
            event = next_event(&mut events) => match event {
                Some(ProcessEvent::Banner) => {
                    debug!("provider banner seen");
                    inner.banner.notify_one();
                }
                Some(ProcessEvent::Exited { code }) => {
                    // The exit can be observed before the last frames are read.
                    drain_after_exit(&inner, &mut reader, &mut codec, &mut chunk).await;
                    break code;
                }
                None => events = None,
            },
        }
    };

    inner.terminated(code);
}

/// Next supervisor event; pending forever when there is no process
async fn next_event(events: &mut Events) -> Option<ProcessEvent> {
    match events {
        Some(events) => events.recv().await,
        None => std::future::pending().await,
    }
}

async fn wait_for_exit(events: &mut Events) -> Option<i32> {
    let events = events.as_mut()?;

    let wait = async {
        while let Some(event) = events.recv().await {
            if let ProcessEvent::Exited { code } = event {
                return code;
            }
        }
        None
    };

    match tokio::time::timeout(EXIT_STATUS_WAIT, wait).await {
        Ok(code) => code,
        Err(_) => {
            debug!("stdout closed but process still running");
            None
        }
    }
}

/// Route whatever the exited process left in the pipe, up to EOF
async fn drain_after_exit(
    inner: &Arc<BridgeInner>,
    reader: &mut ProviderReader,
    codec: &mut FrameCodec,
    chunk: &mut [u8],
) {
    let drain = async {
        loop {
            match reader.read(chunk).await {
                Ok(0) => break,
                Ok(n) => {
                    for frame in codec.decode_chunk(&chunk[..n]) {
                        dispatch(inner, frame);
                    }
                }
                Err(e) => {
                    debug!(error = %e, "failed to drain provider stdout");
                    break;
                }
            }
        }
    };

    if tokio::time::timeout(OUTPUT_DRAIN_WAIT, drain).await.is_err() {
        // A grandchild can hold the pipe open after the provider is gone.
        debug!("stdout still open after provider exit");
    }
    if !codec.is_empty() {
        debug!(bytes = codec.remainder().len(), "discarding unterminated frame");
    }
}

fn dispatch(inner: &Arc<BridgeInner>, frame: McpMessage) {
    match frame {
        McpMessage::Response(response) => {
            inner.correlator.resolve(response);
        }
        McpMessage::Notification(notification) => {
            let handler = Arc::clone(&*inner.notifications.read());
            handler.handle(&notification.method, notification.params);
        }
        McpMessage::Request(request) => answer_provider_request(inner, request),
    }
}

/// Providers may ping the client; anything else is not supported
fn answer_provider_request(inner: &Arc<BridgeInner>, request: McpRequest) {
    let response = if request.method == methods::PING {
        McpResponse::success(request.id, json!({}))
    } else {
        warn!(method = %request.method, "unsupported request from provider");
        McpResponse::error(request.id, McpRpcError::method_not_found())
    };

    // Replying waits on the writer lock, which must not stall frame routing.
    let inner = Arc::clone(inner);
    tokio::spawn(async move {
        if let Err(e) = inner.send(&response.into()).await {
            debug!(error = %e, "failed to answer provider request");
        }
    });
}
