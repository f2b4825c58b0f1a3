// ── ZBot Engine Layer ──────────────────────────────────────────────────────
// Behavior lives here; pure data and errors live in atoms/.

pub mod connection;
pub mod demo;
pub mod endpoint;
pub mod protocol;
