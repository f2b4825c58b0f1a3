// ── ZBot Engine: Wire Protocol ─────────────────────────────────────────────
// Frames exchanged with the backend over the /ws transport.
//
// Outbound: {"message": <text>, "timestamp": <ISO-8601>}
// Inbound:  {"response": <text>}  — successful reply
//           {"error": <reason>}   — server-reported failure
// Any other inbound shape is reported as an unknown-format notice; the
// protocol carries no correlation id, so replies attach to whichever
// request is currently pending.

use serde::{Deserialize, Serialize};

// ── Outbound ───────────────────────────────────────────────────────────────

/// One user message as written to the transport. Created at send time,
/// immutable, not persisted beyond the request lifecycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutboundFrame {
    pub message: String,
    pub timestamp: String,
}

impl OutboundFrame {
    /// Build a frame for `text`, stamped with the current UTC time.
    pub fn now(text: &str) -> Self {
        OutboundFrame {
            message: text.to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

// ── Inbound ────────────────────────────────────────────────────────────────

/// A parsed inbound frame. Consumed once by the pending-request logic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundMessage {
    /// Successful reply text.
    Reply(String),
    /// Server-reported failure reason.
    Failure(String),
}

/// Local (non-fatal) inbound parse failures.
#[derive(Debug)]
pub enum FrameError {
    /// Payload was not valid JSON.
    Malformed(serde_json::Error),
    /// Valid JSON, but neither a `response` nor an `error` object.
    UnknownShape,
}

#[derive(Debug, Deserialize)]
struct RawInbound {
    response: Option<String>,
    error: Option<String>,
}

/// Parse one raw text frame from the backend.
pub fn parse_inbound(raw: &str) -> Result<InboundMessage, FrameError> {
    let frame: RawInbound = serde_json::from_str(raw).map_err(FrameError::Malformed)?;
    if let Some(response) = frame.response {
        Ok(InboundMessage::Reply(response))
    } else if let Some(error) = frame.error {
        Ok(InboundMessage::Failure(error))
    } else {
        Err(FrameError::UnknownShape)
    }
}

// ── Tests ──────────────────────────────────────────────────────────────────
