//! Basic type definitions for the broker
//!
//! - `UserId`: string-based user identifier used as the registry key
//! - `Endpoint` / `Inbox`: the two halves of a per-user delivery channel

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::message::Message;

/// Sending half of a user's delivery channel
///
/// Created and owned by the registering caller. The broker only keeps a
/// clone and writes to it without waiting.
pub type Endpoint = mpsc::Sender<Message>;

/// Receiving half of a user's delivery channel
pub type Inbox = mpsc::Receiver<Message>;

/// Create a bounded delivery channel for one user
///
/// # Panics
///
/// Panics if `capacity` is zero, like [`mpsc::channel`].
pub fn endpoint(capacity: usize) -> (Endpoint, Inbox) {
    mpsc::channel(capacity)
}

/// User identifier (newtype pattern)
///
/// Not validated by the broker: any string, including the empty one,
/// is a valid key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub String);

impl UserId {
    /// Create a user id from anything string-like
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<&str> for UserId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for UserId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
