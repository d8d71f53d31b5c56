//! Error types for the broker
//!
//! Only submission and configuration can fail. Delivery problems
//! (unknown recipient, full or closed endpoint) are not errors and
//! never reach the sender.

use thiserror::Error;

use crate::message::Message;

/// Error returned by [`Broker::send`](crate::Broker::send)
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SendError {
    /// The broker's cancellation token fired before the message was queued
    #[error("broker cancelled")]
    Cancelled,
}

/// Error returned by [`Broker::try_send`](crate::Broker::try_send)
///
/// Both variants hand the rejected message back to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TrySendError {
    /// The inbound queue has no free slot right now
    #[error("inbound queue is full")]
    Full(Message),

    /// The broker has been cancelled
    #[error("broker cancelled")]
    Cancelled(Message),
}

impl TrySendError {
    /// Take back the message that was not queued
    pub fn into_message(self) -> Message {
        match self {
            TrySendError::Full(msg) | TrySendError::Cancelled(msg) => msg,
        }
    }
}

/// Configuration errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// A bounded queue needs room for at least one message
    #[error("inbound capacity must be greater than zero")]
    ZeroCapacity,

    /// The capacity value could not be parsed
    #[error("invalid inbound capacity: {value:?}")]
    InvalidCapacity { value: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(SendError::Cancelled.to_string(), "broker cancelled");
        assert_eq!(
            ConfigError::InvalidCapacity {
                value: "lots".to_string()
            }
            .to_string(),
            "invalid inbound capacity: \"lots\""
        );
    }

    #[test]
    fn test_try_send_error_returns_message() {
        let msg = Message::broadcast("alice", "hi");
        let err = TrySendError::Full(msg.clone());
        assert_eq!(err.to_string(), "inbound queue is full");
        assert_eq!(err.into_message(), msg);
    }
}
