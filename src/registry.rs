//! User registry and message routing
//!
//! Maps each user to their delivery endpoint. Routing takes the read lock,
//! so any number of lookups can proceed together; registration and
//! unregistration take the write lock only for the map update.

use std::collections::HashMap;

use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::RwLock;
use tracing::{debug, info, trace};

use crate::message::Message;
use crate::types::{Endpoint, UserId};

/// Outcome of a single delivery attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// The message was written to the endpoint
    Delivered,
    /// The endpoint had no free capacity; the message was skipped
    Full,
    /// The receiving half was dropped; the message was skipped
    Closed,
}

/// Write a message to an endpoint without waiting
pub fn try_deliver(endpoint: &Endpoint, msg: &Message) -> Delivery {
    match endpoint.try_send(msg.clone()) {
        Ok(()) => Delivery::Delivered,
        Err(TrySendError::Full(_)) => Delivery::Full,
        Err(TrySendError::Closed(_)) => Delivery::Closed,
    }
}

/// Summary of routing one message
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchReport {
    /// Endpoints that accepted the message
    pub delivered: usize,
    /// Endpoints skipped because they were full
    pub full: usize,
    /// Endpoints skipped because their inbox was dropped
    pub closed: usize,
    /// Direct message addressed to a user that is not registered
    pub unknown_recipient: bool,
}

impl DispatchReport {
    fn record(&mut self, delivery: Delivery) {
        match delivery {
            Delivery::Delivered => self.delivered += 1,
            Delivery::Full => self.full += 1,
            Delivery::Closed => self.closed += 1,
        }
    }

    /// Number of recipients (or the unknown recipient) that missed the message
    pub fn dropped(&self) -> usize {
        self.full + self.closed + usize::from(self.unknown_recipient)
    }
}

/// Registry of user endpoints
///
/// At most one endpoint per user; registering again replaces the old one.
#[derive(Debug, Default)]
pub struct Registry {
    users: RwLock<HashMap<UserId, Endpoint>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the endpoint for `id`
    ///
    /// Returns true if an earlier endpoint was replaced.
    pub async fn register(&self, id: UserId, endpoint: Endpoint) -> bool {
        let mut users = self.users.write().await;
        let replaced = users.insert(id.clone(), endpoint).is_some();

        if replaced {
            debug!(user = %id, "Endpoint replaced");
        } else {
            info!(user = %id, users = users.len(), "User registered");
        }

        replaced
    }

    /// Remove the endpoint for `id`
    ///
    /// Returns true if the user was registered. Removing an unknown user
    /// is a no-op.
    pub async fn unregister(&self, id: &UserId) -> bool {
        let mut users = self.users.write().await;
        let removed = users.remove(id).is_some();

        if removed {
            info!(user = %id, users = users.len(), "User unregistered");
        }

        removed
    }

    pub async fn contains(&self, id: &UserId) -> bool {
        self.users.read().await.contains_key(id)
    }

    pub async fn len(&self) -> usize {
        self.users.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.users.read().await.is_empty()
    }

    /// Snapshot of registered user ids, in no particular order
    pub async fn user_ids(&self) -> Vec<UserId> {
        self.users.read().await.keys().cloned().collect()
    }

    /// Route a message to its recipients
    ///
    /// Broadcasts go to every endpoint, direct messages to the addressed
    /// one. Each write is non-blocking: a full or closed endpoint is
    /// skipped so one slow consumer never holds up the others. The read
    /// lock is released when this returns.
    pub async fn route(&self, msg: &Message) -> DispatchReport {
        let users = self.users.read().await;
        let mut report = DispatchReport::default();

        if msg.broadcast {
            for (id, endpoint) in users.iter() {
                let delivery = try_deliver(endpoint, msg);
                if delivery != Delivery::Delivered {
                    trace!(user = %id, ?delivery, "Broadcast skipped recipient");
                }
                report.record(delivery);
            }
        } else if let Some(endpoint) = users.get(&msg.recipient) {
            let delivery = try_deliver(endpoint, msg);
            if delivery != Delivery::Delivered {
                trace!(user = %msg.recipient, ?delivery, "Direct message skipped");
            }
            report.record(delivery);
        } else {
            trace!(user = %msg.recipient, "Direct message to unknown recipient dropped");
            report.unknown_recipient = true;
        }

        report
    }
}
