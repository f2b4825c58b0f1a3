// ── zbot-chat: Terminal Embedding ──────────────────────────────────────────
// Minimal reference consumer of the chat client engine: reads lines from
// stdin, prints the event stream. The transcript rendering, input
// affordances, and styling of the real front-end live elsewhere — this
// binary only exercises the engine's command and event surfaces.
//
// Usage:
//   zbot-chat                    — resolve the endpoint for localhost
//   RUST_LOG=debug zbot-chat     — with engine logging

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use zbot_client::{ChatClient, ChatEvent, ClientConfig, MessageSender};

#[tokio::main]
async fn main() {
    env_logger::init();

    let (event_tx, mut event_rx) = mpsc::unbounded_channel();
    let client = ChatClient::spawn(ClientConfig::default(), event_tx);

    let printer = tokio::spawn(async move {
        while let Some(event) = event_rx.recv().await {
            match event {
                ChatEvent::Status(state) => println!("── {}", state.label()),
                ChatEvent::Message { content, sender } => {
                    let icon = match sender {
                        MessageSender::User => "you",
                        MessageSender::Bot => "bot",
                    };
                    println!("[{}] {}", icon, content);
                }
                ChatEvent::Pending(true) => println!("── Thinking..."),
                ChatEvent::Pending(false) => {}
            }
        }
    });

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        if line.trim() == "/quit" {
            break;
        }
        if client.send(line).is_err() {
            break;
        }
    }

    client.shutdown();
    client.join().await;
    printer.abort();
}
