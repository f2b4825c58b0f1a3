// ── Integration tests ──────────────────────────────────────────────────────
// End-to-end coverage of the connection lifecycle against a real in-process
// WebSocket server. One binary, per the crate's test layout.

use futures::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_tungstenite::{accept_async, tungstenite::Message as WsMessage};
use zbot_client::{
    ChatClient, ChatEvent, ClientConfig, ClientError, ConnectionState, Endpoint, MessageSender,
    WsScheme,
};

const EVENT_TIMEOUT: Duration = Duration::from_secs(2);

fn config_for_port(port: u16) -> ClientConfig {
    ClientConfig {
        endpoint: Some(Endpoint {
            scheme: WsScheme::Ws,
            host: "127.0.0.1".into(),
            port: Some(port),
            path: "/ws".into(),
        }),
        retry_delay: Duration::from_millis(100),
        demo_delay: Duration::from_millis(50),
        ..ClientConfig::default()
    }
}

async fn recv_event(events: &mut mpsc::UnboundedReceiver<ChatEvent>) -> ChatEvent {
    timeout(EVENT_TIMEOUT, events.recv())
        .await
        .expect("timed out waiting for event")
        .expect("event channel closed")
}

async fn assert_no_event(events: &mut mpsc::UnboundedReceiver<ChatEvent>, window: Duration) {
    if let Ok(event) = timeout(window, events.recv()).await {
        panic!("unexpected event: {:?}", event);
    }
}

fn user_message(content: &str) -> ChatEvent {
    ChatEvent::Message {
        content: content.into(),
        sender: MessageSender::User,
    }
}

fn bot_message(content: &str) -> ChatEvent {
    ChatEvent::Message {
        content: content.into(),
        sender: MessageSender::Bot,
    }
}

/// Bind a listener and return it with its port.
async fn bind() -> (TcpListener, u16) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    (listener, port)
}

// ── Live round-trip ────────────────────────────────────────────────────────

#[tokio::test]
async fn live_send_produces_one_frame_and_one_reply() {
    let (listener, port) = bind().await;
    let (frame_tx, mut frame_rx) = mpsc::unbounded_channel::<String>();

    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = accept_async(stream).await.unwrap();
        while let Some(Ok(msg)) = ws.next().await {
            if let WsMessage::Text(text) = msg {
                frame_tx.send(text).unwrap();
                ws.send(WsMessage::Text(r#"{"response":"42"}"#.into()))
                    .await
                    .unwrap();
            }
        }
    });

    let (event_tx, mut events) = mpsc::unbounded_channel();
    let client = ChatClient::spawn(config_for_port(port), event_tx);

    assert_eq!(
        recv_event(&mut events).await,
        ChatEvent::Status(ConnectionState::Connecting)
    );
    assert_eq!(
        recv_event(&mut events).await,
        ChatEvent::Status(ConnectionState::Connected)
    );

    client.send("hello").unwrap();
    assert_eq!(recv_event(&mut events).await, user_message("hello"));
    assert_eq!(recv_event(&mut events).await, ChatEvent::Pending(true));

    // Exactly one outbound frame with the documented shape
    let raw = timeout(EVENT_TIMEOUT, frame_rx.recv()).await.unwrap().unwrap();
    let frame: serde_json::Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(frame["message"], "hello");
    let ts = frame["timestamp"].as_str().unwrap();
    assert!(chrono::DateTime::parse_from_rfc3339(ts).is_ok());

    // The reply clears the pending indicator and appends one bot message
    assert_eq!(recv_event(&mut events).await, ChatEvent::Pending(false));
    assert_eq!(recv_event(&mut events).await, bot_message("42"));

    let history = client.history();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].sender, MessageSender::User);
    assert_eq!(history[0].content, "hello");
    assert_eq!(history[1].sender, MessageSender::Bot);
    assert_eq!(history[1].content, "42");

    client.shutdown();
    client.join().await;
}

// ── Inbound failure shapes ─────────────────────────────────────────────────

#[tokio::test]
async fn malformed_frame_yields_local_notice_and_connection_survives() {
    let (listener, port) = bind().await;

    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = accept_async(stream).await.unwrap();
        // First send gets a non-JSON chunk, second a well-formed reply
        let mut n = 0;
        while let Some(Ok(msg)) = ws.next().await {
            if let WsMessage::Text(_) = msg {
                n += 1;
                let reply = if n == 1 {
                    "plain text chunk"
                } else {
                    r#"{"response":"ok"}"#
                };
                ws.send(WsMessage::Text(reply.into())).await.unwrap();
            }
        }
    });

    let (event_tx, mut events) = mpsc::unbounded_channel();
    let client = ChatClient::spawn(config_for_port(port), event_tx);

    assert_eq!(
        recv_event(&mut events).await,
        ChatEvent::Status(ConnectionState::Connecting)
    );
    assert_eq!(
        recv_event(&mut events).await,
        ChatEvent::Status(ConnectionState::Connected)
    );

    client.send("first").unwrap();
    assert_eq!(recv_event(&mut events).await, user_message("first"));
    assert_eq!(recv_event(&mut events).await, ChatEvent::Pending(true));
    assert_eq!(recv_event(&mut events).await, ChatEvent::Pending(false));
    assert_eq!(
        recv_event(&mut events).await,
        bot_message("Error parsing server response")
    );

    // No state transition happened: the next send still goes over the wire
    client.send("second").unwrap();
    assert_eq!(recv_event(&mut events).await, user_message("second"));
    assert_eq!(recv_event(&mut events).await, ChatEvent::Pending(true));
    assert_eq!(recv_event(&mut events).await, ChatEvent::Pending(false));
    assert_eq!(recv_event(&mut events).await, bot_message("ok"));

    client.shutdown();
    client.join().await;
}

#[tokio::test]
async fn server_failure_and_unknown_shapes_surface_as_notices() {
    let (listener, port) = bind().await;

    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = accept_async(stream).await.unwrap();
        let mut n = 0;
        while let Some(Ok(msg)) = ws.next().await {
            if let WsMessage::Text(_) = msg {
                n += 1;
                let reply = if n == 1 {
                    r#"{"error":"Quota limit reached"}"#
                } else {
                    r#"{"status":"ok"}"#
                };
                ws.send(WsMessage::Text(reply.into())).await.unwrap();
            }
        }
    });

    let (event_tx, mut events) = mpsc::unbounded_channel();
    let client = ChatClient::spawn(config_for_port(port), event_tx);

    assert_eq!(
        recv_event(&mut events).await,
        ChatEvent::Status(ConnectionState::Connecting)
    );
    assert_eq!(
        recv_event(&mut events).await,
        ChatEvent::Status(ConnectionState::Connected)
    );

    client.send("one").unwrap();
    assert_eq!(recv_event(&mut events).await, user_message("one"));
    assert_eq!(recv_event(&mut events).await, ChatEvent::Pending(true));
    assert_eq!(recv_event(&mut events).await, ChatEvent::Pending(false));
    assert_eq!(
        recv_event(&mut events).await,
        bot_message("Error: Quota limit reached")
    );

    client.send("two").unwrap();
    assert_eq!(recv_event(&mut events).await, user_message("two"));
    assert_eq!(recv_event(&mut events).await, ChatEvent::Pending(true));
    assert_eq!(recv_event(&mut events).await, ChatEvent::Pending(false));
    assert_eq!(
        recv_event(&mut events).await,
        bot_message("Received unknown response format")
    );

    client.shutdown();
    client.join().await;
}

// ── Demo-mode fallback ─────────────────────────────────────────────────────

#[tokio::test]
async fn demo_mode_replies_when_no_backend_is_reachable() {
    // Bind then drop to get a port with nothing listening
    let (listener, port) = bind().await;
    drop(listener);

    let mut config = config_for_port(port);
    // Keep the first failure's retry pending so no reconnect noise
    // interleaves with the demo exchange
    config.retry_delay = Duration::from_secs(10);

    let (event_tx, mut events) = mpsc::unbounded_channel();
    let client = ChatClient::spawn(config, event_tx);

    assert_eq!(
        recv_event(&mut events).await,
        ChatEvent::Status(ConnectionState::Connecting)
    );
    assert_eq!(
        recv_event(&mut events).await,
        ChatEvent::Status(ConnectionState::Error)
    );
    assert_eq!(
        recv_event(&mut events).await,
        bot_message("Failed to connect to server. Using demo mode.")
    );

    client.send("hello").unwrap();
    assert_eq!(recv_event(&mut events).await, user_message("hello"));
    assert_eq!(recv_event(&mut events).await, ChatEvent::Pending(true));
    assert_eq!(recv_event(&mut events).await, ChatEvent::Pending(false));

    let reply = recv_event(&mut events).await;
    let ChatEvent::Message { content, sender } = reply else {
        panic!("expected demo reply, got {:?}", reply);
    };
    assert_eq!(sender, MessageSender::Bot);
    // One of the canned templates; the echo variant embeds the input
    assert!(
        content.contains("demo response")
            || content.contains("demo mode")
            || content.contains("backend server running")
            || content.contains("offline mode"),
        "not a demo template: {}",
        content
    );

    client.shutdown();
    client.join().await;
}

#[tokio::test]
async fn blank_input_is_ignored() {
    let (listener, port) = bind().await;
    drop(listener);

    let mut config = config_for_port(port);
    config.retry_delay = Duration::from_secs(10);

    let (event_tx, mut events) = mpsc::unbounded_channel();
    let client = ChatClient::spawn(config, event_tx);

    // Drain the failed-connect preamble
    for _ in 0..3 {
        let _ = recv_event(&mut events).await;
    }

    client.send("   ").unwrap();
    assert_no_event(&mut events, Duration::from_millis(200)).await;

    client.send("  real message  ").unwrap();
    assert_eq!(recv_event(&mut events).await, user_message("real message"));

    client.shutdown();
    client.join().await;
}

// ── Retry cycle ────────────────────────────────────────────────────────────

#[tokio::test]
async fn reconnects_after_clean_server_close() {
    let (listener, port) = bind().await;

    tokio::spawn(async move {
        // First connection: closed immediately by the server
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = accept_async(stream).await.unwrap();
        ws.close(None).await.unwrap();
        while ws.next().await.is_some() {}

        // Second connection: stays up
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = accept_async(stream).await.unwrap();
        while ws.next().await.is_some() {}
    });

    let (event_tx, mut events) = mpsc::unbounded_channel();
    let client = ChatClient::spawn(config_for_port(port), event_tx);

    assert_eq!(
        recv_event(&mut events).await,
        ChatEvent::Status(ConnectionState::Connecting)
    );
    assert_eq!(
        recv_event(&mut events).await,
        ChatEvent::Status(ConnectionState::Connected)
    );
    assert_eq!(
        recv_event(&mut events).await,
        ChatEvent::Status(ConnectionState::Disconnected)
    );
    // One retry, fixed delay, then a fresh attempt succeeds. The other half
    // of the retry contract — a timer firing while already connected must
    // not spawn a duplicate connection — is unexpressible here by design:
    // the manager task is parked on the timer and nothing else mutates the
    // state, which the debug_assert in the wait loop pins down.
    assert_eq!(
        recv_event(&mut events).await,
        ChatEvent::Status(ConnectionState::Connecting)
    );
    assert_eq!(
        recv_event(&mut events).await,
        ChatEvent::Status(ConnectionState::Connected)
    );

    client.shutdown();
    client.join().await;
}

#[tokio::test]
async fn pending_indicator_clears_when_transport_is_lost() {
    let (listener, port) = bind().await;

    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = accept_async(stream).await.unwrap();
        // Read the send, then close without replying
        while let Some(Ok(msg)) = ws.next().await {
            if let WsMessage::Text(_) = msg {
                ws.close(None).await.unwrap();
            }
        }
    });

    let (event_tx, mut events) = mpsc::unbounded_channel();
    let client = ChatClient::spawn(config_for_port(port), event_tx);

    assert_eq!(
        recv_event(&mut events).await,
        ChatEvent::Status(ConnectionState::Connecting)
    );
    assert_eq!(
        recv_event(&mut events).await,
        ChatEvent::Status(ConnectionState::Connected)
    );

    client.send("no reply coming").unwrap();
    assert_eq!(recv_event(&mut events).await, user_message("no reply coming"));
    assert_eq!(recv_event(&mut events).await, ChatEvent::Pending(true));

    // The dropped reply resolves only when the transport itself goes away
    assert_eq!(recv_event(&mut events).await, ChatEvent::Pending(false));
    assert_eq!(
        recv_event(&mut events).await,
        ChatEvent::Status(ConnectionState::Disconnected)
    );

    client.shutdown();
    client.join().await;
}

// ── Handle lifecycle ───────────────────────────────────────────────────────

#[tokio::test]
async fn send_after_shutdown_is_an_error() {
    let (listener, port) = bind().await;
    drop(listener);

    let mut config = config_for_port(port);
    config.retry_delay = Duration::from_secs(10);

    let (event_tx, _events) = mpsc::unbounded_channel();
    let client = ChatClient::spawn(config, event_tx);

    client.shutdown();

    // The command channel closes once the engine task exits; the only
    // error the command surface can return is the engine being gone
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(matches!(
        client.send("too late"),
        Err(ClientError::EngineStopped(_))
    ));
}
