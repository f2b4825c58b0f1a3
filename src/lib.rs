//! ZBot chat client engine.
//!
//! A headless client for the ZBot conversational backend: it resolves the
//! backend endpoint from the ambient page location, keeps one persistent
//! WebSocket open with a fixed-interval reconnect cycle, correlates each
//! send with the next reply via a pending indicator, and falls back to a
//! local demo responder whenever no live connection exists.
//!
//! The presentation layer is out of scope — an embedding supplies a
//! [`ChatEvent`] channel at construction and renders whatever arrives.
//!
//! ```no_run
//! use zbot_client::{ChatClient, ClientConfig};
//!
//! # async fn demo() {
//! let (event_tx, mut event_rx) = tokio::sync::mpsc::unbounded_channel();
//! let client = ChatClient::spawn(ClientConfig::default(), event_tx);
//! client.send("hello").unwrap();
//! while let Some(event) = event_rx.recv().await {
//!     println!("{:?}", event);
//! }
//! # }
//! ```

pub mod atoms;
pub mod engine;

pub use atoms::error::{ClientError, ClientResult};
pub use atoms::types::{
    ChatEvent, ClientConfig, ConnectionState, Endpoint, MessageSender, PageLocation, PageScheme,
    TranscriptEntry, WsScheme,
};
pub use engine::connection::ChatClient;
pub use engine::endpoint::resolve;
