//! Broker implementation
//!
//! Producers queue messages with [`Broker::send`]; a single dispatch loop
//! ([`Broker::run`]) drains the bounded inbound queue in FIFO order and
//! routes each message through the [`Registry`]. The whole lifetime is
//! governed by one external [`CancellationToken`].

use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::BrokerConfig;
use crate::error::{SendError, TrySendError};
use crate::message::Message;
use crate::registry::Registry;
use crate::stats::{BrokerStats, Counters};
use crate::types::{Endpoint, UserId};

/// In-memory chat message broker
///
/// Cheap to clone: every clone shares the same queue, registry and
/// shutdown state.
#[derive(Debug, Clone)]
pub struct Broker {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    /// Producer side of the inbound queue
    inbound: mpsc::Sender<Message>,
    /// Consumer side, taken by the first `run` call
    dispatcher: Mutex<Option<mpsc::Receiver<Message>>>,
    /// User → endpoint map
    registry: Registry,
    /// External lifetime signal
    cancel: CancellationToken,
    /// Fired once the dispatch loop has exited
    stopped: CancellationToken,
    counters: Counters,
    capacity: usize,
}

impl Broker {
    /// Create a broker with the default configuration
    pub fn new(cancel: CancellationToken) -> Self {
        Self::with_config(cancel, BrokerConfig::default())
    }

    /// Create a broker with a custom configuration
    ///
    /// Nothing is dispatched until [`run`](Self::run) is called.
    pub fn with_config(cancel: CancellationToken, config: BrokerConfig) -> Self {
        let capacity = config.inbound_capacity();
        let (inbound, receiver) = mpsc::channel(capacity);

        Self {
            inner: Arc::new(Inner {
                inbound,
                dispatcher: Mutex::new(Some(receiver)),
                registry: Registry::new(),
                cancel,
                stopped: CancellationToken::new(),
                counters: Counters::default(),
                capacity,
            }),
        }
    }

    /// Run the dispatch loop until the cancellation token fires
    ///
    /// Messages still queued at that point are discarded. Only the first
    /// call dispatches; a concurrent second call just waits for shutdown.
    pub async fn run(&self) {
        let receiver = self.inner.dispatcher.lock().await.take();
        let Some(mut receiver) = receiver else {
            warn!("Broker dispatch loop already running; waiting for shutdown");
            self.inner.stopped.cancelled().await;
            return;
        };

        info!(capacity = self.inner.capacity, "Broker started");

        loop {
            tokio::select! {
                biased;

                _ = self.inner.cancel.cancelled() => break,
                received = receiver.recv() => {
                    // The broker holds a sender, so the queue never closes
                    // while this loop runs.
                    let Some(msg) = received else { break };
                    self.dispatch(msg).await;
                }
            }
        }

        self.inner.stopped.cancel();
        receiver.close();

        let mut discarded = 0u64;
        while receiver.try_recv().is_ok() {
            discarded += 1;
        }
        self.inner.counters.record_discarded(discarded);

        info!(discarded, "Broker stopped");
    }

    /// Route a single message and record the outcome
    async fn dispatch(&self, msg: Message) {
        let report = self.inner.registry.route(&msg).await;
        self.inner.counters.record_dispatch(&report);

        debug!(
            sender = %msg.sender,
            broadcast = msg.broadcast,
            delivered = report.delivered,
            dropped = report.dropped(),
            "Message dispatched"
        );
    }

    /// Queue a message for dispatch
    ///
    /// Waits while the inbound queue is full. Fails with
    /// `SendError::Cancelled` if the broker is cancelled before or while
    /// waiting; the message is then dropped. Success means the message was
    /// accepted, not that anyone received it.
    pub async fn send(&self, msg: Message) -> Result<(), SendError> {
        if self.is_cancelled() || self.is_stopped() {
            return Err(SendError::Cancelled);
        }

        tokio::select! {
            biased;

            _ = self.inner.cancel.cancelled() => Err(SendError::Cancelled),
            _ = self.inner.stopped.cancelled() => Err(SendError::Cancelled),
            permit = self.inner.inbound.reserve() => {
                let permit = permit.map_err(|_| SendError::Cancelled)?;
                self.inner.counters.record_accepted();
                permit.send(msg);
                Ok(())
            }
        }
    }

    /// Queue a message without waiting for space
    pub fn try_send(&self, msg: Message) -> Result<(), TrySendError> {
        if self.is_cancelled() || self.is_stopped() {
            return Err(TrySendError::Cancelled(msg));
        }

        match self.inner.inbound.try_reserve() {
            Ok(permit) => {
                self.inner.counters.record_accepted();
                permit.send(msg);
                Ok(())
            }
            Err(mpsc::error::TrySendError::Full(())) => Err(TrySendError::Full(msg)),
            Err(mpsc::error::TrySendError::Closed(())) => Err(TrySendError::Cancelled(msg)),
        }
    }

    /// Register (or replace) the endpoint for a user
    ///
    /// The broker takes ownership of `endpoint` and drops it when the user
    /// is replaced or unregistered. If that was the last sender the inbox
    /// disconnects; callers whose inbox must outlive the registration keep
    /// their own clone.
    pub async fn register_user(&self, id: impl Into<UserId>, endpoint: Endpoint) {
        self.inner.registry.register(id.into(), endpoint).await;
    }

    /// Remove a user's endpoint; unknown users are ignored
    pub async fn unregister_user(&self, id: impl Into<UserId>) {
        self.inner.registry.unregister(&id.into()).await;
    }

    pub async fn is_registered(&self, id: impl Into<UserId>) -> bool {
        self.inner.registry.contains(&id.into()).await
    }

    /// Registered user ids, sorted
    pub async fn registered_users(&self) -> Vec<UserId> {
        let mut users = self.inner.registry.user_ids().await;
        users.sort();
        users
    }

    pub async fn user_count(&self) -> usize {
        self.inner.registry.len().await
    }

    /// Snapshot of the broker counters
    pub fn stats(&self) -> BrokerStats {
        self.inner.counters.snapshot()
    }

    /// Inbound queue capacity
    pub fn capacity(&self) -> usize {
        self.inner.capacity
    }

    /// Whether the external cancellation token has fired
    pub fn is_cancelled(&self) -> bool {
        self.inner.cancel.is_cancelled()
    }

    /// Whether the dispatch loop has exited
    pub fn is_stopped(&self) -> bool {
        self.inner.stopped.is_cancelled()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::types::endpoint;

    #[tokio::test]
    async fn test_broker_creation() {
        let broker = Broker::new(CancellationToken::new());

        assert_eq!(broker.capacity(), 100);
        assert_eq!(broker.user_count().await, 0);
        assert!(!broker.is_cancelled());
        assert!(!broker.is_stopped());
        assert_eq!(broker.stats(), BrokerStats::default());
    }

    #[tokio::test]
    async fn test_send_before_run_is_queued() {
        let broker = Broker::new(CancellationToken::new());

        broker.send(Message::broadcast("x", "queued")).await.unwrap();
        assert_eq!(broker.stats().accepted, 1);
        assert_eq!(broker.stats().dispatched, 0);
    }

    #[tokio::test]
    async fn test_try_send_full_queue_returns_message() {
        let config = BrokerConfig::new(1).unwrap();
        let broker = Broker::with_config(CancellationToken::new(), config);

        broker.try_send(Message::broadcast("x", "first")).unwrap();
        let err = broker
            .try_send(Message::broadcast("x", "second"))
            .unwrap_err();

        assert!(matches!(err, TrySendError::Full(_)));
        assert_eq!(err.into_message().content, "second");
    }

    #[tokio::test]
    async fn test_try_send_after_cancel() {
        let cancel = CancellationToken::new();
        let broker = Broker::new(cancel.clone());
        cancel.cancel();

        let err = broker.try_send(Message::broadcast("x", "late")).unwrap_err();
        assert!(matches!(err, TrySendError::Cancelled(_)));
    }

    #[tokio::test]
    async fn test_second_run_waits_for_shutdown() {
        let cancel = CancellationToken::new();
        let broker = Broker::new(cancel.clone());

        let first = tokio::spawn({
            let broker = broker.clone();
            async move { broker.run().await }
        });
        let second = tokio::spawn({
            let broker = broker.clone();
            async move { broker.run().await }
        });

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!first.is_finished());
        assert!(!second.is_finished());

        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(1), first)
            .await
            .unwrap()
            .unwrap();
        tokio::time::timeout(Duration::from_secs(1), second)
            .await
            .unwrap()
            .unwrap();
        assert!(broker.is_stopped());
    }

    #[tokio::test]
    async fn test_stats_after_dispatch() {
        let cancel = CancellationToken::new();
        let broker = Broker::new(cancel.clone());
        let (tx, mut rx) = endpoint(4);
        broker.register_user("alice", tx).await;

        let handle = tokio::spawn({
            let broker = broker.clone();
            async move { broker.run().await }
        });

        broker.send(Message::direct("x", "alice", "hi")).await.unwrap();
        broker.send(Message::direct("x", "nobody", "lost")).await.unwrap();
        broker.send(Message::direct("x", "alice", "sync")).await.unwrap();

        for expected in ["hi", "sync"] {
            let msg = tokio::time::timeout(Duration::from_secs(1), rx.recv())
                .await
                .unwrap()
                .unwrap();
            assert_eq!(msg.content, expected);
        }

        cancel.cancel();
        handle.await.unwrap();

        let stats = broker.stats();
        assert_eq!(stats.accepted, 3);
        assert_eq!(stats.dispatched, 3);
        assert_eq!(stats.delivered, 2);
        assert_eq!(stats.dropped, 1);
        assert_eq!(stats.discarded, 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_stats_never_show_more_dispatched_than_accepted() {
        let cancel = CancellationToken::new();
        let broker = Broker::with_config(cancel.clone(), BrokerConfig::new(4).unwrap());
        let handle = tokio::spawn({
            let broker = broker.clone();
            async move { broker.run().await }
        });

        let sampler = tokio::spawn({
            let broker = broker.clone();
            async move {
                loop {
                    let stats = broker.stats();
                    assert!(stats.dispatched <= stats.accepted, "{stats:?}");
                    if stats.dispatched == 400 {
                        break;
                    }
                    tokio::task::yield_now().await;
                }
            }
        });

        for i in 0..400 {
            let msg = Message::broadcast("x", format!("m{i}"));
            if i % 2 == 0 {
                broker.send(msg).await.unwrap();
            } else {
                let mut msg = msg;
                while let Err(TrySendError::Full(back)) = broker.try_send(msg) {
                    msg = back;
                    tokio::task::yield_now().await;
                }
            }
        }

        tokio::time::timeout(Duration::from_secs(5), sampler)
            .await
            .unwrap()
            .unwrap();
        cancel.cancel();
        handle.await.unwrap();
        assert_eq!(broker.stats().accepted, 400);
    }
}
