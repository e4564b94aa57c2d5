//! Integration tests for the provider bridge
//!
//! The provider side is played by the test over in-memory duplex pipes, so
//! every frame the bridge writes can be inspected and every response can be
//! delivered in whatever order and chunking the test needs.

use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;
use tidings_core::config::{BridgeConfig, ReadinessPolicy};
use tidings_core::mcp::{McpBridge, McpError, ReadinessState};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, DuplexStream, Lines};
use tokio::sync::mpsc;

const PIPE_CAPACITY: usize = 64 * 1024;

/// The provider end of the pipes
struct FakeProvider {
    lines: Lines<BufReader<DuplexStream>>,
    out: DuplexStream,
}

impl FakeProvider {
    /// Next frame the bridge wrote
    async fn next_frame(&mut self) -> Value {
        let line = self
            .lines
            .next_line()
            .await
            .unwrap()
            .expect("bridge closed its output");
        serde_json::from_str(&line).unwrap()
    }

    async fn send_raw(&mut self, bytes: &str) {
        self.out.write_all(bytes.as_bytes()).await.unwrap();
        self.out.flush().await.unwrap();
    }

    async fn send(&mut self, frame: Value) {
        self.send_raw(&format!("{}\n", frame)).await;
    }

    async fn respond(&mut self, id: &Value, result: Value) {
        self.send(json!({"jsonrpc": "2.0", "id": id, "result": result}))
            .await;
    }

    /// Answer `initialize` and consume the `initialized` acknowledgement.
    /// Returns the initialize request.
    async fn complete_handshake(&mut self) -> Value {
        let init = self.next_frame().await;
        assert_eq!(init["method"], "initialize");
        assert_eq!(init["id"], 0);

        self.respond(
            &json!(0),
            json!({
                "protocolVersion": "2024-11-05",
                "capabilities": {"tools": {}},
                "serverInfo": {"name": "insights-provider", "version": "0.4.1"}
            }),
        )
        .await;

        let ack = self.next_frame().await;
        assert_eq!(ack["method"], "notifications/initialized");
        assert!(ack.get("id").is_none());
        init
    }
}

fn connect(config: BridgeConfig) -> (McpBridge, FakeProvider) {
    let (bridge_out, provider_in) = tokio::io::duplex(PIPE_CAPACITY);
    let (provider_out, bridge_in) = tokio::io::duplex(PIPE_CAPACITY);

    let bridge = McpBridge::from_parts(bridge_out, bridge_in, config).unwrap();
    let provider = FakeProvider {
        lines: BufReader::new(provider_in).lines(),
        out: provider_out,
    };
    (bridge, provider)
}

async fn ready_bridge() -> (McpBridge, FakeProvider) {
    let (bridge, mut provider) = connect(BridgeConfig::default());
    provider.complete_handshake().await;
    bridge.wait_until_ready().await.unwrap();
    (bridge, provider)
}

fn fast_polling(interval_millis: u64, attempts: u32) -> ReadinessPolicy {
    ReadinessPolicy {
        poll_interval: Duration::from_millis(interval_millis),
        max_attempts: attempts,
    }
}

#[tokio::test]
async fn test_handshake_reaches_ready() {
    let (bridge, mut provider) = connect(BridgeConfig::default());
    assert!(bridge.server_info().is_none());

    let init = provider.complete_handshake().await;
    assert_eq!(init["jsonrpc"], "2.0");
    assert_eq!(init["params"]["protocolVersion"], "2024-11-05");
    assert_eq!(init["params"]["clientInfo"]["name"], "tidings");
    assert!(init["params"]["capabilities"].is_object());

    bridge.wait_until_ready().await.unwrap();
    assert_eq!(bridge.state(), ReadinessState::Ready);

    let info = bridge.server_info().unwrap();
    assert_eq!(info.server_info.name, "insights-provider");
    assert_eq!(info.protocol_version.as_deref(), Some("2024-11-05"));
}

#[tokio::test]
async fn test_split_handshake_response_enters_ready_once() {
    let (bridge, mut provider) = connect(BridgeConfig::default());
    let mut states = bridge.subscribe_state();

    let init = provider.next_frame().await;
    assert_eq!(init["id"], 0);

    provider.send_raw("{\"id\":0,\"r").await;
    tokio::task::yield_now().await;
    assert_ne!(bridge.state(), ReadinessState::Ready);
    provider.send_raw("esult\":{}}\n").await;

    let ack = provider.next_frame().await;
    assert_eq!(ack["method"], "notifications/initialized");
    bridge.wait_until_ready().await.unwrap();

    states.wait_for(|s| *s == ReadinessState::Ready).await.unwrap();
    let _ = states.borrow_and_update();

    // A duplicate answer for the handshake id is unmatched and changes nothing
    provider.send(json!({"id": 0, "result": {}})).await;
    let echoed = bridge.call_tool("echo_tool", json!({"text": "hi"}));
    let provider_side = async {
        let call = provider.next_frame().await;
        provider.respond(&call["id"], json!({"text": "hi"})).await;
    };
    let (result, ()) = tokio::join!(echoed, provider_side);
    assert_eq!(result.unwrap(), json!({"text": "hi"}));

    assert!(!states.has_changed().unwrap());
    assert_eq!(bridge.state(), ReadinessState::Ready);
}

#[tokio::test]
async fn test_call_tool_wire_format() {
    let (bridge, mut provider) = ready_bridge().await;

    let call = bridge.call_tool("get_recent_emails", json!({"hours": 24}));
    let provider_side = async {
        let frame = provider.next_frame().await;
        provider.respond(&frame["id"], json!({"emails": []})).await;
        frame
    };
    let (result, frame) = tokio::join!(call, provider_side);

    assert_eq!(result.unwrap(), json!({"emails": []}));
    assert_eq!(frame["jsonrpc"], "2.0");
    assert_eq!(frame["id"], 1);
    assert_eq!(frame["method"], "tools/call");
    assert_eq!(frame["params"]["name"], "get_recent_emails");
    assert_eq!(frame["params"]["arguments"], json!({"hours": 24}));
}

#[tokio::test]
async fn test_null_arguments_are_sent_as_empty_object() {
    let (bridge, mut provider) = ready_bridge().await;

    let call = bridge.call_tool("get_upcoming_events", Value::Null);
    let provider_side = async {
        let frame = provider.next_frame().await;
        provider.respond(&frame["id"], json!([])).await;
        frame
    };
    let (result, frame) = tokio::join!(call, provider_side);

    result.unwrap();
    assert_eq!(frame["params"]["arguments"], json!({}));
}

#[tokio::test]
async fn test_out_of_order_responses_reach_their_callers() {
    let (bridge, mut provider) = ready_bridge().await;

    let emails = bridge.call_tool("get_recent_emails", json!({}));
    let events = bridge.call_tool("get_upcoming_events", json!({"days": 7}));
    let provider_side = async {
        let first = provider.next_frame().await;
        let second = provider.next_frame().await;
        // answer in reverse order of arrival
        for frame in [&second, &first] {
            let name = frame["params"]["name"].as_str().unwrap().to_string();
            provider.respond(&frame["id"], json!({"from": name})).await;
        }
    };

    let (emails, events, ()) = tokio::join!(emails, events, provider_side);
    assert_eq!(emails.unwrap(), json!({"from": "get_recent_emails"}));
    assert_eq!(events.unwrap(), json!({"from": "get_upcoming_events"}));
    assert_eq!(bridge.pending_calls(), 0);
}

#[tokio::test]
async fn test_many_concurrent_calls_resolve_exactly_once() {
    const CALLS: usize = 25;
    let (bridge, mut provider) = ready_bridge().await;
    let bridge = Arc::new(bridge);

    let mut handles = Vec::new();
    for n in 0..CALLS {
        let bridge = Arc::clone(&bridge);
        handles.push(tokio::spawn(async move {
            bridge.call_tool("echo_tool", json!({"n": n})).await
        }));
    }

    let mut frames = Vec::new();
    for _ in 0..CALLS {
        frames.push(provider.next_frame().await);
    }
    let mut ids: Vec<i64> = frames.iter().map(|f| f["id"].as_i64().unwrap()).collect();
    ids.sort_unstable();
    ids.dedup();
    assert_eq!(ids.len(), CALLS, "every call needs its own id");
    assert!(ids.iter().all(|id| *id > 0));

    // Interleave: odd positions first, then even positions backwards
    let order: Vec<usize> = (0..CALLS)
        .filter(|i| i % 2 == 1)
        .chain((0..CALLS).filter(|i| i % 2 == 0).rev())
        .collect();
    for i in order {
        let frame = &frames[i];
        provider
            .respond(&frame["id"], frame["params"]["arguments"].clone())
            .await;
    }

    for (n, handle) in handles.into_iter().enumerate() {
        assert_eq!(handle.await.unwrap().unwrap(), json!({"n": n}));
    }
    assert_eq!(bridge.pending_calls(), 0);
}

#[tokio::test]
async fn test_call_before_ready_waits_for_handshake() {
    let (bridge, mut provider) = connect(BridgeConfig::default());
    let bridge = Arc::new(bridge);

    let caller = {
        let bridge = Arc::clone(&bridge);
        tokio::spawn(async move {
            bridge
                .call_tool("search_web_insights", json!({"query": "rust"}))
                .await
        })
    };

    // nothing but the handshake is written until the bridge is ready
    provider.complete_handshake().await;

    let call = provider.next_frame().await;
    assert_eq!(call["method"], "tools/call");
    provider.respond(&call["id"], json!({"insights": 3})).await;

    assert_eq!(caller.await.unwrap().unwrap(), json!({"insights": 3}));
}

#[tokio::test(start_paused = true)]
async fn test_call_fails_when_never_ready() {
    let config = BridgeConfig::default().with_readiness(fast_polling(100, 5));
    let (bridge, mut provider) = connect(config);

    // read the handshake but never answer it
    let init = provider.next_frame().await;
    assert_eq!(init["method"], "initialize");

    let started = tokio::time::Instant::now();
    let err = bridge.call_tool("echo_tool", json!({})).await.unwrap_err();

    assert!(matches!(err, McpError::NotReady { state } if !state.is_final()));
    assert_eq!(started.elapsed(), Duration::from_millis(500));
    assert_eq!(bridge.pending_calls(), 1, "only the handshake is pending");
}

#[tokio::test(start_paused = true)]
async fn test_handshake_timeout_fails_readiness() {
    let config = BridgeConfig::default().with_handshake_timeout(Duration::from_secs(10));
    let (bridge, mut provider) = connect(config);
    let _init = provider.next_frame().await;

    let mut states = bridge.subscribe_state();
    states
        .wait_for(|s| *s == ReadinessState::Failed)
        .await
        .unwrap();

    let started = tokio::time::Instant::now();
    let err = bridge.call_tool("echo_tool", json!({})).await.unwrap_err();
    assert!(matches!(
        err,
        McpError::NotReady {
            state: ReadinessState::Failed
        }
    ));
    assert_eq!(started.elapsed(), Duration::ZERO, "failed state fails fast");
}

#[tokio::test]
async fn test_handshake_rejected_fails_readiness() {
    let (bridge, mut provider) = connect(BridgeConfig::default());
    let init = provider.next_frame().await;
    provider
        .send(json!({
            "jsonrpc": "2.0",
            "id": init["id"],
            "error": {"code": -32600, "message": "unsupported protocol version"}
        }))
        .await;

    let mut states = bridge.subscribe_state();
    states
        .wait_for(|s| *s == ReadinessState::Failed)
        .await
        .unwrap();

    let err = bridge.wait_until_ready().await.unwrap_err();
    assert!(matches!(
        err,
        McpError::NotReady {
            state: ReadinessState::Failed
        }
    ));
    assert!(bridge.server_info().is_none());
}

#[tokio::test(start_paused = true)]
async fn test_call_timeout_does_not_affect_other_calls() {
    let (bridge, mut provider) = ready_bridge().await;
    let bridge = Arc::new(bridge);

    let slow = {
        let bridge = Arc::clone(&bridge);
        tokio::spawn(async move {
            let started = tokio::time::Instant::now();
            let outcome = bridge
                .call_tool_with_timeout("search_web_insights", json!({}), Duration::from_secs(2))
                .await;
            (outcome, started.elapsed())
        })
    };
    let slow_frame = provider.next_frame().await;

    let patient = {
        let bridge = Arc::clone(&bridge);
        tokio::spawn(async move {
            bridge
                .call_tool_with_timeout("get_recent_emails", json!({}), Duration::from_secs(30))
                .await
        })
    };
    let patient_frame = provider.next_frame().await;

    let (outcome, elapsed) = slow.await.unwrap();
    match outcome {
        Err(McpError::CallTimeout { name, timeout }) => {
            assert_eq!(name, "search_web_insights");
            assert_eq!(timeout, Duration::from_secs(2));
        }
        other => panic!("expected call timeout, got {:?}", other),
    }
    assert_eq!(elapsed, Duration::from_secs(2));
    assert_eq!(bridge.pending_calls(), 1);

    // the late answer is dropped, the other call still completes
    provider.respond(&slow_frame["id"], json!("late")).await;
    provider.respond(&patient_frame["id"], json!({"emails": [1]})).await;

    assert_eq!(patient.await.unwrap().unwrap(), json!({"emails": [1]}));
    assert_eq!(bridge.pending_calls(), 0);
}

#[tokio::test]
async fn test_provider_exit_fails_all_pending_calls() {
    const PENDING: usize = 3;
    let (bridge, mut provider) = ready_bridge().await;
    let bridge = Arc::new(bridge);

    let mut handles = Vec::new();
    for n in 0..PENDING {
        let bridge = Arc::clone(&bridge);
        handles.push(tokio::spawn(async move {
            bridge.call_tool("summarize_emails_ai", json!({"batch": n})).await
        }));
    }
    for _ in 0..PENDING {
        provider.next_frame().await;
    }
    assert_eq!(bridge.pending_calls(), PENDING);

    drop(provider);

    for handle in handles {
        let err = handle.await.unwrap().unwrap_err();
        assert!(matches!(err, McpError::ProcessTerminated { .. }));
    }
    assert_eq!(bridge.pending_calls(), 0);
    assert_eq!(bridge.state(), ReadinessState::Terminated);

    let err = bridge.call_tool("echo_tool", json!({})).await.unwrap_err();
    assert!(matches!(
        err,
        McpError::NotReady {
            state: ReadinessState::Terminated
        }
    ));
}

#[tokio::test]
async fn test_remote_errors_surface_and_bridge_stays_usable() {
    let (bridge, mut provider) = ready_bridge().await;

    let call = bridge.call_tool("unknown_tool", json!({}));
    let provider_side = async {
        let frame = provider.next_frame().await;
        provider
            .send(json!({
                "jsonrpc": "2.0",
                "id": frame["id"],
                "error": {"code": -32601, "message": "Tool not found: unknown_tool"}
            }))
            .await;
    };
    let (result, ()) = tokio::join!(call, provider_side);
    match result {
        Err(McpError::RemoteTool { code, message, .. }) => {
            assert_eq!(code, -32601);
            assert_eq!(message, "Tool not found: unknown_tool");
        }
        other => panic!("expected remote tool error, got {:?}", other),
    }

    let call = bridge.call_tool("summarize_emails_ai", json!({"emails": []}));
    let provider_side = async {
        let frame = provider.next_frame().await;
        provider
            .respond(
                &frame["id"],
                json!({
                    "content": [{"type": "text", "text": "No emails provided"}],
                    "isError": true
                }),
            )
            .await;
    };
    let (result, ()) = tokio::join!(call, provider_side);
    assert!(
        matches!(result, Err(McpError::RemoteTool { ref message, .. }) if message == "No emails provided")
    );

    let call = bridge.call_tool("get_upcoming_events", json!({}));
    let provider_side = async {
        let frame = provider.next_frame().await;
        provider
            .respond(
                &frame["id"],
                json!({
                    "content": [{"type": "text", "text": "{\"events\":[]}"}],
                    "structuredContent": {"events": []}
                }),
            )
            .await;
    };
    let (result, ()) = tokio::join!(call, provider_side);
    assert_eq!(result.unwrap(), json!({"events": []}));
    assert_eq!(bridge.state(), ReadinessState::Ready);
}

#[tokio::test]
async fn test_noise_on_stdout_is_ignored() {
    let (bridge, mut provider) = ready_bridge().await;

    let call = bridge.call_tool("echo_tool", json!({"text": "ok"}));
    let provider_side = async {
        let frame = provider.next_frame().await;
        provider.send_raw("Loading model weights...\n\r\n{not json}\n").await;
        provider.respond(&frame["id"], json!({"text": "ok"})).await;
    };
    let (result, ()) = tokio::join!(call, provider_side);

    assert_eq!(result.unwrap(), json!({"text": "ok"}));
}

#[tokio::test]
async fn test_list_tools() {
    let (bridge, mut provider) = ready_bridge().await;

    let list = bridge.list_tools();
    let provider_side = async {
        let frame = provider.next_frame().await;
        assert_eq!(frame["method"], "tools/list");
        provider
            .respond(
                &frame["id"],
                json!({"tools": [
                    {
                        "name": "get_recent_emails",
                        "description": "Emails from the last N hours",
                        "inputSchema": {"type": "object", "properties": {"hours": {"type": "integer"}}}
                    },
                    {"name": "echo_tool"}
                ]}),
            )
            .await;
    };
    let (tools, ()) = tokio::join!(list, provider_side);
    let tools = tools.unwrap();

    assert_eq!(tools.len(), 2);
    assert_eq!(tools[0].name, "get_recent_emails");
    assert_eq!(tools[0].input_schema["type"], "object");
    assert_eq!(tools[1].description, None);
}

#[tokio::test]
async fn test_notifications_reach_handler_and_pings_are_answered() {
    let (bridge, mut provider) = ready_bridge().await;

    let (tx, mut rx) = mpsc::unbounded_channel();
    bridge.set_notification_handler(Arc::new(move |method: &str, params: Option<Value>| {
        let _ = tx.send((method.to_string(), params));
    }));

    provider
        .send(json!({
            "jsonrpc": "2.0",
            "method": "notifications/message",
            "params": {"level": "info", "data": "indexing mailbox"}
        }))
        .await;
    let (method, params) = rx.recv().await.unwrap();
    assert_eq!(method, "notifications/message");
    assert_eq!(params.unwrap()["data"], "indexing mailbox");

    provider
        .send(json!({"jsonrpc": "2.0", "id": "srv-1", "method": "ping"}))
        .await;
    let pong = provider.next_frame().await;
    assert_eq!(pong["id"], "srv-1");
    assert_eq!(pong["result"], json!({}));

    provider
        .send(json!({"jsonrpc": "2.0", "id": 7, "method": "sampling/createMessage"}))
        .await;
    let refusal = provider.next_frame().await;
    assert_eq!(refusal["id"], 7);
    assert_eq!(refusal["error"]["code"], -32601);
}

#[tokio::test]
async fn test_shutdown_fails_pending_and_is_idempotent() {
    let (bridge, mut provider) = ready_bridge().await;
    let bridge = Arc::new(bridge);

    let caller = {
        let bridge = Arc::clone(&bridge);
        tokio::spawn(async move { bridge.call_tool("search_web_insights", json!({})).await })
    };
    provider.next_frame().await;

    bridge.shutdown().await;
    bridge.shutdown().await;

    let err = caller.await.unwrap().unwrap_err();
    assert!(matches!(err, McpError::ProcessTerminated { .. }));
    assert_eq!(bridge.state(), ReadinessState::Terminated);
    assert_eq!(bridge.pending_calls(), 0);
    assert!(!bridge.is_alive());

    // the bridge closed its end of the pipe
    assert!(provider.lines.next_line().await.unwrap().is_none());
}

#[tokio::test]
async fn test_invalid_bounds_are_rejected() {
    let (bridge_out, _provider_in) = tokio::io::duplex(PIPE_CAPACITY);
    let (_provider_out, bridge_in) = tokio::io::duplex(PIPE_CAPACITY);
    let config = BridgeConfig::default().with_request_timeout(Duration::ZERO);

    let err = McpBridge::from_parts(bridge_out, bridge_in, config).unwrap_err();
    assert!(matches!(err, McpError::Config { .. }));
}
