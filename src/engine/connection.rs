// ── ZBot Engine: Connection Manager ────────────────────────────────────────
// Owns the single logical connection to the ZBot backend and drives the
// connect → send → receive → disconnect → retry cycle.
//
// One spawned task owns all connection state; the embedding talks to it
// through `ChatClient` (commands in, `ChatEvent`s out). Only one transport
// handle is ever live — a new connection attempt is issued only after the
// prior transport reached a terminal state.
//
// Whenever no live transport exists (connect in flight, retry wait, or a
// failed connect), sends are routed to the demo responder so the user
// always gets a reply.

use crate::atoms::error::{ClientError, ClientResult};
use crate::atoms::types::{
    ChatEvent, ClientConfig, ConnectionState, MessageSender, TranscriptEntry,
};
use crate::engine::protocol::{self, FrameError, InboundMessage, OutboundFrame};
use crate::engine::{demo, endpoint};
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use log::{debug, info, warn};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::Message as WsMessage};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

// ── Client handle ──────────────────────────────────────────────────────────

enum Command {
    Send(String),
    Shutdown,
}

/// Handle to a running chat client engine.
///
/// Created with [`ChatClient::spawn`]; the embedding owns the lifecycle and
/// receives [`ChatEvent`]s on the channel it supplied. Dropping the handle
/// does not stop the engine — call [`ChatClient::shutdown`].
pub struct ChatClient {
    cmd_tx: mpsc::UnboundedSender<Command>,
    history: Arc<Mutex<Vec<TranscriptEntry>>>,
    task: tokio::task::JoinHandle<()>,
}

impl ChatClient {
    /// Start the engine. Immediately begins connecting to the resolved
    /// endpoint; status, messages, and pending-indicator changes are
    /// delivered on `events`.
    pub fn spawn(config: ClientConfig, events: mpsc::UnboundedSender<ChatEvent>) -> ChatClient {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (demo_tx, demo_rx) = mpsc::unbounded_channel();
        let history = Arc::new(Mutex::new(Vec::new()));

        let manager = Manager {
            config,
            events,
            cmd_rx,
            demo_tx,
            demo_rx,
            history: history.clone(),
            state: ConnectionState::Disconnected,
            pending: false,
        };
        let task = tokio::spawn(manager.run());

        ChatClient {
            cmd_tx,
            history,
            task,
        }
    }

    /// Submit one user message.
    ///
    /// While connected, the text is forwarded to the backend and a reply is
    /// awaited; otherwise the demo responder answers after its fixed delay.
    /// The wire protocol carries no correlation id: a second send while one
    /// is still pending is neither rejected nor queued, and a stray reply is
    /// attributed to whichever send is currently pending.
    pub fn send(&self, text: impl Into<String>) -> ClientResult<()> {
        self.cmd_tx
            .send(Command::Send(text.into()))
            .map_err(|_| ClientError::EngineStopped("send after shutdown".into()))
    }

    /// Stop the engine. Idempotent; pending demo replies are dropped.
    pub fn shutdown(&self) {
        let _ = self.cmd_tx.send(Command::Shutdown);
    }

    /// Snapshot of every message appended so far (user and bot), oldest
    /// first. In-memory only — nothing survives the engine.
    pub fn history(&self) -> Vec<TranscriptEntry> {
        self.history.lock().clone()
    }

    /// Wait for the engine task to finish (after [`ChatClient::shutdown`]).
    pub async fn join(self) {
        let _ = self.task.await;
    }
}

// ── Manager task ───────────────────────────────────────────────────────────

enum SessionEnd {
    /// Transport closed (server went away or sent Close).
    Closed,
    /// Transport errored mid-session.
    Failed(tokio_tungstenite::tungstenite::Error),
    Shutdown,
}

enum ConnectOutcome {
    Opened(Box<WsStream>),
    Failed(tokio_tungstenite::tungstenite::Error),
    Shutdown,
}

struct Manager {
    config: ClientConfig,
    events: mpsc::UnboundedSender<ChatEvent>,
    cmd_rx: mpsc::UnboundedReceiver<Command>,
    /// Delayed demo replies flow back to the manager through this channel
    /// so pending-indicator state stays owned by one task.
    demo_tx: mpsc::UnboundedSender<String>,
    demo_rx: mpsc::UnboundedReceiver<String>,
    history: Arc<Mutex<Vec<TranscriptEntry>>>,
    state: ConnectionState,
    pending: bool,
}

impl Manager {
    async fn run(mut self) {
        info!("[chat] Client engine started");
        loop {
            // Resolved fresh on every attempt — never cached.
            let target = self
                .config
                .endpoint
                .clone()
                .unwrap_or_else(|| endpoint::resolve(&self.config.location));

            self.set_state(ConnectionState::Connecting);
            info!("[chat] Connecting to {}", target);

            match self.connect(&target.to_string()).await {
                ConnectOutcome::Opened(ws) => {
                    self.set_state(ConnectionState::Connected);
                    info!("[chat] Connected to ZBot server");

                    match self.run_session(*ws).await {
                        SessionEnd::Shutdown => break,
                        SessionEnd::Closed => {
                            self.clear_pending_on_transport_loss();
                            self.set_state(ConnectionState::Disconnected);
                            info!("[chat] Disconnected from ZBot server");
                        }
                        SessionEnd::Failed(e) => {
                            self.clear_pending_on_transport_loss();
                            self.set_state(ConnectionState::Error);
                            warn!("[chat] Transport error: {}", e);
                            self.append("Connection error. Please check if the server is running.", MessageSender::Bot);
                        }
                    }
                }
                ConnectOutcome::Failed(e) => {
                    // Construction/handshake failure is treated like any
                    // other failed connection: error state, notice, retry.
                    self.set_state(ConnectionState::Error);
                    warn!("[chat] Failed to connect: {}", e);
                    self.append("Failed to connect to server. Using demo mode.", MessageSender::Bot);
                }
                ConnectOutcome::Shutdown => break,
            }

            if !self.wait_retry().await {
                break;
            }
        }
        info!("[chat] Client engine stopped");
    }

    /// Open the transport, servicing sends in demo mode while the handshake
    /// is in flight (no live connection exists yet).
    async fn connect(&mut self, url: &str) -> ConnectOutcome {
        let attempt = connect_async(url);
        tokio::pin!(attempt);
        loop {
            tokio::select! {
                result = &mut attempt => {
                    return match result {
                        Ok((ws, _)) => ConnectOutcome::Opened(Box::new(ws)),
                        Err(e) => ConnectOutcome::Failed(e),
                    };
                }
                cmd = self.cmd_rx.recv() => match cmd {
                    Some(Command::Send(text)) => self.offline_send(&text),
                    Some(Command::Shutdown) | None => return ConnectOutcome::Shutdown,
                },
                reply = self.demo_rx.recv() => self.deliver_demo_reply(reply),
            }
        }
    }

    /// Live session: pump inbound frames and outbound sends until the
    /// transport reaches a terminal state.
    async fn run_session(&mut self, ws: WsStream) -> SessionEnd {
        let (mut ws_tx, mut ws_rx) = ws.split();
        loop {
            tokio::select! {
                frame = ws_rx.next() => match frame {
                    Some(Ok(WsMessage::Text(text))) => self.handle_frame(&text),
                    Some(Ok(WsMessage::Close(_))) | None => return SessionEnd::Closed,
                    Some(Ok(_)) => {} // ping/pong/binary — not part of the protocol
                    Some(Err(e)) => return SessionEnd::Failed(e),
                },
                cmd = self.cmd_rx.recv() => match cmd {
                    Some(Command::Send(text)) => self.live_send(&mut ws_tx, &text).await,
                    Some(Command::Shutdown) | None => return SessionEnd::Shutdown,
                },
                // A demo reply scheduled before this connection opened still
                // gets delivered once its delay elapses.
                reply = self.demo_rx.recv() => self.deliver_demo_reply(reply),
            }
        }
    }

    /// Fixed-interval retry wait. Unconditional and indefinite — there is
    /// no attempt cap and no backoff growth. Sends arriving here go to the
    /// demo responder. Returns false on shutdown.
    async fn wait_retry(&mut self) -> bool {
        debug!("[chat] Retrying in {:?}", self.config.retry_delay);
        let timer = tokio::time::sleep(self.config.retry_delay);
        tokio::pin!(timer);
        loop {
            tokio::select! {
                () = &mut timer => {
                    // Only this task mutates the state, and it is parked here
                    // until the timer fires — the state cannot have reached
                    // Connected in the meantime, so a duplicate connection
                    // attempt cannot race this one.
                    debug_assert_ne!(self.state, ConnectionState::Connected);
                    return true;
                }
                cmd = self.cmd_rx.recv() => match cmd {
                    Some(Command::Send(text)) => self.offline_send(&text),
                    Some(Command::Shutdown) | None => return false,
                },
                reply = self.demo_rx.recv() => self.deliver_demo_reply(reply),
            }
        }
    }

    // ── Send paths ─────────────────────────────────────────────────────────

    /// Forward one user message over the live transport.
    async fn live_send(&mut self, ws_tx: &mut SplitSink<WsStream, WsMessage>, text: &str) {
        let Some(text) = non_blank(text) else { return };
        self.append(text, MessageSender::User);

        let frame = OutboundFrame::now(text);
        let json = match serde_json::to_string(&frame) {
            Ok(json) => json,
            Err(e) => {
                warn!("[chat] Failed to serialize outbound frame: {}", e);
                self.append("Error sending message. Please try again.", MessageSender::Bot);
                return;
            }
        };

        if let Err(e) = ws_tx.send(WsMessage::Text(json)).await {
            // Surface the failure; the state transition is left to the
            // transport's own close/error on the read side.
            warn!("[chat] Error sending message: {}", e);
            self.append("Error sending message. Please try again.", MessageSender::Bot);
        } else {
            self.set_pending(true);
        }
    }

    /// Route one user message to the demo responder: the reply text is
    /// chosen when the simulated delay elapses, then flows back through
    /// `demo_rx`. Concurrent offline sends proceed independently and may
    /// resolve out of order.
    fn offline_send(&mut self, text: &str) {
        let Some(text) = non_blank(text) else { return };
        self.append(text, MessageSender::User);
        self.set_pending(true);

        let reply_tx = self.demo_tx.clone();
        let delay = self.config.demo_delay;
        let user_text = text.to_string();
        debug!("[chat] Demo mode: reply scheduled in {:?}", delay);
        let _task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = reply_tx.send(demo::respond(&user_text));
        });
    }

    fn deliver_demo_reply(&mut self, reply: Option<String>) {
        // The manager holds its own demo_tx, so the channel never closes.
        if let Some(reply) = reply {
            self.set_pending(false);
            self.append(&reply, MessageSender::Bot);
        }
    }

    // ── Inbound frames ─────────────────────────────────────────────────────

    fn handle_frame(&mut self, raw: &str) {
        // The first frame after a send resolves it, well-formed or not.
        self.set_pending(false);
        match protocol::parse_inbound(raw) {
            Ok(InboundMessage::Reply(text)) => self.append(&text, MessageSender::Bot),
            Ok(InboundMessage::Failure(reason)) => {
                self.append(&format!("Error: {}", reason), MessageSender::Bot);
            }
            Err(FrameError::UnknownShape) => {
                self.append("Received unknown response format", MessageSender::Bot);
            }
            Err(FrameError::Malformed(e)) => {
                // Local and non-fatal: the connection state is untouched.
                warn!("[chat] Error parsing message: {}", e);
                self.append("Error parsing server response", MessageSender::Bot);
            }
        }
    }

    // ── Event surface ──────────────────────────────────────────────────────

    fn set_state(&mut self, state: ConnectionState) {
        self.state = state;
        let _ = self.events.send(ChatEvent::Status(state));
    }

    fn set_pending(&mut self, on: bool) {
        if self.pending != on {
            self.pending = on;
            let _ = self.events.send(ChatEvent::Pending(on));
        }
    }

    /// A dropped reply leaves the indicator set until the transport itself
    /// reaches a terminal state — which is now.
    fn clear_pending_on_transport_loss(&mut self) {
        self.set_pending(false);
    }

    fn append(&mut self, content: &str, sender: MessageSender) {
        self.history.lock().push(TranscriptEntry {
            content: content.to_string(),
            sender,
            timestamp: chrono::Utc::now(),
        });
        let _ = self.events.send(ChatEvent::Message {
            content: content.to_string(),
            sender,
        });
    }
}

/// Trimmed text, or `None` for blank input (ignored, matching the UI).
fn non_blank(text: &str) -> Option<&str> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed)
    }
}
