//! Chat Broker - Interactive demo
//!
//! Registers the users named on the command line, prints what each of
//! them receives, and turns stdin lines into messages:
//! `@bob hello` is a direct message to bob, anything else is broadcast.
//! Ctrl-C or end of input shuts the broker down.

use std::env;
use std::io::BufRead;
use std::thread;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use chat_broker::{endpoint, Broker, BrokerConfig, Message};

/// Users registered when none are given on the command line
const DEFAULT_USERS: [&str; 2] = ["alice", "bob"];

/// Per-user endpoint capacity
const ENDPOINT_CAPACITY: usize = 32;

/// Sender name used for stdin messages
const CONSOLE_USER: &str = "console";

/// Lines buffered between the stdin thread and the runtime
const LINE_BUFFER_SIZE: usize = 16;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging with environment filter
    // Use RUST_LOG env var to control log level
    // e.g., RUST_LOG=debug or RUST_LOG=chat_broker=trace
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("chat_broker=info")),
        )
        .init();

    let config = BrokerConfig::from_env()?;

    let mut users: Vec<String> = env::args().skip(1).collect();
    if users.is_empty() {
        users = DEFAULT_USERS.iter().map(|u| u.to_string()).collect();
    }

    let cancel = CancellationToken::new();
    let broker = Broker::with_config(cancel.clone(), config);

    let dispatcher = tokio::spawn({
        let broker = broker.clone();
        async move { broker.run().await }
    });

    // One consumer task per user, printing whatever arrives
    for user in &users {
        let (tx, mut inbox) = endpoint(ENDPOINT_CAPACITY);
        broker.register_user(user.as_str(), tx).await;

        let user = user.clone();
        tokio::spawn(async move {
            while let Some(msg) = inbox.recv().await {
                info!(to = %user, from = %msg.sender, "{}", msg.content);
            }
        });
    }

    // Ctrl-C shuts everything down
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Failed to listen for Ctrl-C: {}", e);
            }
            cancel.cancel();
        }
    });

    let mut lines = spawn_stdin_reader();
    forward_lines(&broker, &cancel, &mut lines).await;

    cancel.cancel();
    dispatcher.await?;

    let stats = broker.stats();
    info!(
        accepted = stats.accepted,
        delivered = stats.delivered,
        dropped = stats.dropped,
        "Broker finished"
    );

    Ok(())
}

/// Read stdin on a plain thread so a pending read never holds up runtime
/// shutdown. The channel closes at end of input.
fn spawn_stdin_reader() -> mpsc::Receiver<String> {
    let (tx, rx) = mpsc::channel(LINE_BUFFER_SIZE);

    thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            match line {
                Ok(line) => {
                    if tx.blocking_send(line).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    error!("Failed to read stdin: {}", e);
                    break;
                }
            }
        }
    });

    rx
}

/// Turn input lines into messages until cancellation or end of input
async fn forward_lines(
    broker: &Broker,
    cancel: &CancellationToken,
    lines: &mut mpsc::Receiver<String>,
) {
    loop {
        let line = tokio::select! {
            biased;

            _ = cancel.cancelled() => break,
            line = lines.recv() => line,
        };
        let Some(line) = line else { break };
        let Some(msg) = parse_line(&line) else {
            continue;
        };

        if let Err(e) = broker.send(msg).await {
            warn!("Message not sent: {}", e);
            break;
        }
    }
}

/// `@bob hello` is a direct message to bob, anything else is broadcast
fn parse_line(line: &str) -> Option<Message> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }

    let msg = match line.strip_prefix('@').and_then(|rest| rest.split_once(' ')) {
        Some((recipient, content)) => Message::direct(CONSOLE_USER, recipient, content),
        None => Message::broadcast(CONSOLE_USER, line),
    };
    Some(msg)
}
