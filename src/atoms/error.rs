// ── ZBot Atoms: Error Types ────────────────────────────────────────────────
// Errors the engine surfaces to the embedding, built with `thiserror`.
//
// Transport, handshake, and frame failures never escape the manager task —
// they become user-visible notices and retry cycles (connection.rs), not
// returned errors. The command surface therefore has exactly one failure
// mode: the engine is gone.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    /// The manager task has stopped and no longer accepts commands.
    #[error("Engine stopped: {0}")]
    EngineStopped(String),
}

/// All engine operations should return this type.
pub type ClientResult<T> = Result<T, ClientError>;
