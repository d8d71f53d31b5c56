//! In-memory Chat Message Broker
//!
//! Accepts messages from many producers and routes them to per-user
//! delivery channels, either to one addressed user or broadcast to all.
//!
//! # Features
//! - Bounded inbound queue with backpressure on `send`
//! - Single dispatch loop with FIFO ordering
//! - Non-blocking delivery: a full endpoint misses the message instead of
//!   stalling everyone else
//! - Registry guarded by a reader/writer lock
//! - Shutdown through one external `CancellationToken`
//!
//! # Architecture
//! - `Broker` owns the inbound `mpsc` queue, the `Registry` and the
//!   shutdown signals; clones share them
//! - `Broker::run` is the dispatch loop, spawned as a background task
//! - Endpoints are `mpsc::Sender<Message>` values created and owned by
//!   callers; the broker only writes to them
//!
//! # Example
//! ```ignore
//! use chat_broker::{endpoint, Broker, Message};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() {
//!     let cancel = CancellationToken::new();
//!     let broker = Broker::new(cancel.clone());
//!     tokio::spawn({
//!         let broker = broker.clone();
//!         async move { broker.run().await }
//!     });
//!
//!     let (tx, mut inbox) = endpoint(32);
//!     broker.register_user("alice", tx).await;
//!     broker.send(Message::broadcast("bob", "hi")).await.unwrap();
//!     println!("{:?}", inbox.recv().await);
//!
//!     cancel.cancel();
//! }
//! ```

pub mod broker;
pub mod config;
pub mod error;
pub mod message;
pub mod registry;
pub mod stats;
pub mod types;

// Re-export main types for convenience
pub use broker::Broker;
pub use config::{BrokerConfig, DEFAULT_INBOUND_CAPACITY};
pub use error::{ConfigError, SendError, TrySendError};
pub use message::Message;
pub use registry::{Delivery, DispatchReport, Registry};
pub use stats::BrokerStats;
pub use types::{endpoint, Endpoint, Inbox, UserId};
