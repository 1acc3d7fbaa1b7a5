//! Registry configuration.

use menulink_menu::MAX_REMOTES;
use menulink_session::{ConnectionConfig, LocalInfo};
use serde::{Deserialize, Serialize};

/// Settings shared by every connection in a
/// [`ConnectionRegistry`](crate::ConnectionRegistry).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// How many connections may be registered. Default: 3. Capped at
    /// [`MAX_REMOTES`], the width of an item's send-needed bitset.
    pub capacity: usize,

    /// How this host introduces itself in its join message.
    pub local: LocalInfo,

    pub connection: ConnectionConfig,

    /// Whether remotes may store a new key with a pairing request.
    /// Default: `false`.
    pub pairing_enabled: bool,
}

impl RegistryConfig {
    pub const DEFAULT_CAPACITY: usize = 3;

    /// Returns a copy with `capacity` clamped to `1..=MAX_REMOTES`.
    pub fn validated(mut self) -> Self {
        let clamped = self.capacity.clamp(1, MAX_REMOTES);
        if clamped != self.capacity {
            tracing::warn!(requested = self.capacity, capacity = clamped, "registry capacity clamped");
            self.capacity = clamped;
        }
        self
    }
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            capacity: Self::DEFAULT_CAPACITY,
            local: LocalInfo::default(),
            connection: ConnectionConfig::default(),
            pairing_enabled: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = RegistryConfig::default();
        assert_eq!(config.capacity, 3);
        assert!(!config.pairing_enabled);
        assert_eq!(config.connection.heartbeat_interval_ticks(), 500);
    }

    #[test]
    fn test_capacity_is_clamped() {
        let big = RegistryConfig {
            capacity: 100,
            ..Default::default()
        };
        assert_eq!(big.validated().capacity, MAX_REMOTES);
        let zero = RegistryConfig {
            capacity: 0,
            ..Default::default()
        };
        assert_eq!(zero.validated().capacity, 1);
    }

    #[test]
    fn test_serde_round_trip() {
        let config = RegistryConfig {
            local: LocalInfo::new("amp", "0000-1111"),
            pairing_enabled: true,
            ..Default::default()
        };
        let json = serde_json::to_string(&config).unwrap();
        let back: RegistryConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, config);
    }
}
