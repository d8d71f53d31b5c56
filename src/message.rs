//! Chat message definition
//!
//! The single value type flowing through the broker. Serde derives let
//! HTTP or WebSocket collaborators pass it through as JSON unchanged.

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::types::UserId;

/// A chat message, immutable once handed to the broker
///
/// `recipient` is only consulted when `broadcast` is false.
/// `timestamp` is Unix epoch seconds chosen by the producer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Who sent it (informational only)
    pub sender: UserId,
    /// Addressed user for direct messages
    #[serde(default)]
    pub recipient: UserId,
    /// Opaque payload
    pub content: String,
    /// Deliver to every registered user
    #[serde(default)]
    pub broadcast: bool,
    /// Unix epoch seconds
    pub timestamp: i64,
}

impl Message {
    /// Create a message addressed to one user, stamped with the current time
    pub fn direct(
        sender: impl Into<UserId>,
        recipient: impl Into<UserId>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            sender: sender.into(),
            recipient: recipient.into(),
            content: content.into(),
            broadcast: false,
            timestamp: Utc::now().timestamp(),
        }
    }

    /// Create a message for every registered user, stamped with the current time
    pub fn broadcast(sender: impl Into<UserId>, content: impl Into<String>) -> Self {
        Self {
            sender: sender.into(),
            recipient: UserId::default(),
            content: content.into(),
            broadcast: true,
            timestamp: Utc::now().timestamp(),
        }
    }

    /// Override the producer timestamp
    pub fn with_timestamp(mut self, timestamp: i64) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn is_broadcast(&self) -> bool {
        self.broadcast
    }
}
