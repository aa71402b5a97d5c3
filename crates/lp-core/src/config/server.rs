//! Coordinator daemon configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::ConfigError;

/// Configuration for the poll coordinator daemon
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address for the HTTP/WebSocket listener
    pub bind_address: String,

    /// Address for the line-delimited TCP listener (disabled when unset)
    pub tcp_bind_address: Option<String>,

    /// Origins allowed by CORS; empty means any origin
    pub allowed_origins: Vec<String>,

    /// Interval between WebSocket pings
    #[serde(with = "duration_secs")]
    pub heartbeat_interval: Duration,

    /// Per-connection outbound queue length before events are dropped
    pub outbound_queue_capacity: usize,

    /// Coordinator inbox length
    pub inbox_capacity: usize,

    /// Session rules
    pub poll: PollPolicy,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:4000".to_string(),
            tcp_bind_address: None,
            allowed_origins: Vec::new(),
            heartbeat_interval: Duration::from_secs(30),
            outbound_queue_capacity: 256,
            inbox_capacity: 1024,
            poll: PollPolicy::default(),
        }
    }
}

impl ServerConfig {
    /// Check values that serde cannot
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.outbound_queue_capacity == 0 {
            return Err(ConfigError::Invalid(
                "outbound_queue_capacity must be at least 1".to_string(),
            ));
        }
        if self.inbox_capacity == 0 {
            return Err(ConfigError::Invalid(
                "inbox_capacity must be at least 1".to_string(),
            ));
        }
        if self.heartbeat_interval.is_zero() {
            return Err(ConfigError::Invalid(
                "heartbeat_interval must be non-zero".to_string(),
            ));
        }
        if matches!(self.poll.max_options, Some(max) if max < 2) {
            return Err(ConfigError::Invalid(
                "poll.max_options must be at least 2".to_string(),
            ));
        }
        Ok(())
    }
}

/// Rules applied by the coordinator to session commands and votes
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PollPolicy {
    /// Reject votes whose `pollId` does not match the current poll.
    /// When false, mismatches are only logged.
    pub strict_poll_id: bool,

    /// Count votes for options the current poll does not offer.
    /// When false, such votes are dropped and the voter may vote again.
    pub accept_unknown_options: bool,

    /// Close the open poll when the recognized presenter disconnects
    pub close_on_presenter_disconnect: bool,

    /// Upper bound on options per poll; unlimited when unset
    pub max_options: Option<usize>,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            strict_poll_id: false,
            accept_unknown_options: false,
            close_on_presenter_disconnect: false,
            max_options: None,
        }
    }
}

// Durations are written as whole seconds
mod duration_secs {
    use serde::{self, Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.bind_address, "0.0.0.0:4000");
        assert!(config.tcp_bind_address.is_none());
        assert!(!config.poll.strict_poll_id);
        assert!(!config.poll.close_on_presenter_disconnect);
        assert!(!config.poll.accept_unknown_options);
        assert!(config.poll.max_options.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: ServerConfig = toml::from_str(
            r#"
            allowed_origins = ["https://poll.example.edu"]
            heartbeat_interval = 10

            [poll]
            close_on_presenter_disconnect = true
            "#,
        )
        .unwrap();

        assert_eq!(config.allowed_origins, vec!["https://poll.example.edu"]);
        assert_eq!(config.heartbeat_interval, Duration::from_secs(10));
        assert!(config.poll.close_on_presenter_disconnect);
        assert_eq!(config.poll.max_options, None);
        assert_eq!(config.outbound_queue_capacity, 256);
    }

    #[test]
    fn test_validate_rejects_zero_capacity() {
        let mut config = ServerConfig::default();
        config.outbound_queue_capacity = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_validate_rejects_tiny_option_limit() {
        let mut config = ServerConfig::default();
        config.poll.max_options = Some(1);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_option_limit_is_opt_in() {
        let config: ServerConfig = toml::from_str(
            r#"
            [poll]
            max_options = 6
            "#,
        )
        .unwrap();

        assert_eq!(config.poll.max_options, Some(6));
        assert!(config.validate().is_ok());
    }
}
