// ── ZBot Atoms: Pure Data Types ────────────────────────────────────────────
// All plain struct/enum definitions with no logic.
// Atoms layer rule: no I/O, no side effects, no imports from engine/.

use serde::{Deserialize, Serialize};
use std::time::Duration;

// ── Connection state ───────────────────────────────────────────────────────

/// Lifecycle state of the single logical backend connection.
/// Owned exclusively by the connection manager; exactly one value at a time.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Error,
}

impl ConnectionState {
    /// Human-readable status text for the presentation layer.
    pub fn label(self) -> &'static str {
        match self {
            ConnectionState::Disconnected => "Disconnected",
            ConnectionState::Connecting => "Connecting...",
            ConnectionState::Connected => "Connected",
            ConnectionState::Error => "Connection Error",
        }
    }
}

// ── Transcript ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MessageSender {
    User,
    Bot,
}

/// One appended chat message, as recorded in the in-memory transcript.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptEntry {
    pub content: String,
    pub sender: MessageSender,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

// ── Presentation event surface ─────────────────────────────────────────────

/// Events emitted to the (out-of-scope) presentation layer.
///
/// `Status` reports connection-state transitions, `Message` appends a chat
/// line, and `Pending` shows/hides the "thinking" affordance between a send
/// and its first resulting reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatEvent {
    Status(ConnectionState),
    Message {
        content: String,
        sender: MessageSender,
    },
    Pending(bool),
}

// ── Client configuration ───────────────────────────────────────────────────

/// Scheme the embedding page was loaded over.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PageScheme {
    Http,
    Https,
    /// Loaded from the local filesystem.
    File,
}

/// Ambient network location of the embedding page. The endpoint resolver
/// derives the backend target from this — nothing else.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PageLocation {
    pub scheme: PageScheme,
    pub hostname: String,
    /// `None` when the page was served on its scheme's default port.
    pub port: Option<u16>,
}

impl Default for PageLocation {
    fn default() -> Self {
        PageLocation {
            scheme: PageScheme::Http,
            hostname: "localhost".into(),
            port: None,
        }
    }
}

// ── Endpoint descriptor ────────────────────────────────────────────────────

/// WebSocket URL scheme of a resolved endpoint.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum WsScheme {
    Ws,
    Wss,
}

/// A resolved backend target. Computed fresh on every connection attempt;
/// never cached across page-location changes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Endpoint {
    pub scheme: WsScheme,
    pub host: String,
    /// `None` targets the scheme's default port (reverse-proxy topologies).
    pub port: Option<u16>,
    pub path: String,
}

impl std::fmt::Display for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let scheme = match self.scheme {
            WsScheme::Ws => "ws",
            WsScheme::Wss => "wss",
        };
        match self.port {
            Some(port) => write!(f, "{}://{}:{}{}", scheme, self.host, port, self.path),
            None => write!(f, "{}://{}{}", scheme, self.host, self.path),
        }
    }
}

/// Configuration for one chat client instance.
///
/// The delay fields default to the production values (3 s retry, 1.5 s
/// simulated demo latency); tests shrink them to keep runs fast.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Ambient location fed to the endpoint resolver on every connection
    /// attempt.
    #[serde(default)]
    pub location: PageLocation,
    /// Explicit backend endpoint; bypasses the resolver when set.
    #[serde(default)]
    pub endpoint: Option<Endpoint>,
    /// Fixed delay between a terminal transport event and the next
    /// connection attempt. No backoff, no attempt cap.
    #[serde(default = "default_retry_delay", with = "duration_millis")]
    pub retry_delay: Duration,
    /// Simulated latency before a demo-mode reply is delivered.
    #[serde(default = "default_demo_delay", with = "duration_millis")]
    pub demo_delay: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig {
            location: PageLocation::default(),
            endpoint: None,
            retry_delay: default_retry_delay(),
            demo_delay: default_demo_delay(),
        }
    }
}

fn default_retry_delay() -> Duration {
    Duration::from_secs(3)
}

fn default_demo_delay() -> Duration {
    Duration::from_millis(1500)
}

mod duration_millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(d)?))
    }
}
