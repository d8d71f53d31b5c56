//! Broker configuration
//!
//! The only tunable is the inbound queue capacity. It can be set in code
//! or read from the `CHAT_BROKER_INBOUND_CAPACITY` environment variable.

use std::env;

use crate::error::ConfigError;

/// Default number of messages the inbound queue holds
pub const DEFAULT_INBOUND_CAPACITY: usize = 100;

/// Environment variable overriding the inbound capacity
pub const INBOUND_CAPACITY_ENV: &str = "CHAT_BROKER_INBOUND_CAPACITY";

/// Broker configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BrokerConfig {
    inbound_capacity: usize,
}

impl BrokerConfig {
    /// Create a configuration with the given inbound capacity
    ///
    /// Returns `ConfigError::ZeroCapacity` for zero.
    pub fn new(inbound_capacity: usize) -> Result<Self, ConfigError> {
        if inbound_capacity == 0 {
            return Err(ConfigError::ZeroCapacity);
        }
        Ok(Self { inbound_capacity })
    }

    /// Read the configuration from the environment
    ///
    /// A missing variable yields the default configuration.
    pub fn from_env() -> Result<Self, ConfigError> {
        match env::var(INBOUND_CAPACITY_ENV) {
            Ok(value) => Self::parse(&value),
            Err(_) => Ok(Self::default()),
        }
    }

    /// Parse an inbound capacity value
    pub fn parse(value: &str) -> Result<Self, ConfigError> {
        let capacity = value
            .trim()
            .parse::<usize>()
            .map_err(|_| ConfigError::InvalidCapacity {
                value: value.to_string(),
            })?;
        Self::new(capacity)
    }

    pub fn inbound_capacity(&self) -> usize {
        self.inbound_capacity
    }
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            inbound_capacity: DEFAULT_INBOUND_CAPACITY,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_capacity() {
        assert_eq!(BrokerConfig::default().inbound_capacity(), 100);
    }

    #[test]
    fn test_zero_capacity_rejected() {
        assert_eq!(BrokerConfig::new(0), Err(ConfigError::ZeroCapacity));
        assert_eq!(BrokerConfig::parse("0"), Err(ConfigError::ZeroCapacity));
    }

    #[test]
    fn test_parse_capacity() {
        assert_eq!(BrokerConfig::parse(" 16 ").unwrap().inbound_capacity(), 16);
        assert!(matches!(
            BrokerConfig::parse("-3"),
            Err(ConfigError::InvalidCapacity { .. })
        ));
    }
}
