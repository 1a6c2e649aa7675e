//! Relay configuration.
//!
//! [`RelayConfig`] carries every tunable with its documented default. The
//! binary fills it from command-line flags and environment variables; library
//! users build it directly with the builder methods.

use std::net::SocketAddr;
use std::time::Duration;

use thiserror::Error;

/// Default listening port.
pub const DEFAULT_PORT: u16 = 8080;

/// Default interval between eviction passes, in seconds.
pub const DEFAULT_EVICTING_PERIOD_SECONDS: u64 = 10;

/// Default maximum silence before eviction, in milliseconds.
pub const DEFAULT_SOCKET_TTL_MS: u64 = 120_000;

/// Default largest inbound WebSocket message accepted (1 MiB).
pub const DEFAULT_MAX_FRAME_SIZE: usize = 1024 * 1024;

/// Errors produced when validating a [`RelayConfig`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("eviction period must be greater than zero")]
    ZeroPeriod,

    #[error("maximum frame size must be greater than zero")]
    ZeroFrameSize,
}

/// Relay configuration options.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use rtrelay::config::RelayConfig;
///
/// let config = RelayConfig::default()
///     .socket_ttl(Duration::from_secs(30))
///     .max_connections(1_000);
///
/// assert_eq!(config.bind_addr.port(), 8080);
/// assert_eq!(config.evicting_period, Duration::from_secs(10));
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayConfig {
    /// Address the WebSocket listener binds to.
    pub bind_addr: SocketAddr,

    /// Interval between eviction passes.
    pub evicting_period: Duration,

    /// Maximum silence since the last heartbeat before a connection is evicted.
    pub socket_ttl: Duration,

    /// Maximum concurrent transport connections (0 = unlimited).
    pub max_connections: usize,

    /// Largest inbound WebSocket message accepted, in bytes.
    pub max_frame_size: usize,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], DEFAULT_PORT)),
            evicting_period: Duration::from_secs(DEFAULT_EVICTING_PERIOD_SECONDS),
            socket_ttl: Duration::from_millis(DEFAULT_SOCKET_TTL_MS),
            max_connections: 0,
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
        }
    }
}

impl RelayConfig {
    /// Set the bind address
    pub fn bind(mut self, addr: SocketAddr) -> Self {
        self.bind_addr = addr;
        self
    }

    /// Set the interval between eviction passes
    pub fn evicting_period(mut self, period: Duration) -> Self {
        self.evicting_period = period;
        self
    }

    /// Set the heartbeat TTL
    pub fn socket_ttl(mut self, ttl: Duration) -> Self {
        self.socket_ttl = ttl;
        self
    }

    /// Set maximum connections
    pub fn max_connections(mut self, max: usize) -> Self {
        self.max_connections = max;
        self
    }

    /// Set the maximum inbound frame size
    pub fn max_frame_size(mut self, bytes: usize) -> Self {
        self.max_frame_size = bytes;
        self
    }

    /// Checks the settings that would otherwise fail at runtime.
    ///
    /// # Errors
    ///
    /// - [`ConfigError::ZeroPeriod`] — a periodic timer needs a non-zero interval.
    /// - [`ConfigError::ZeroFrameSize`] — no message could ever be accepted.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.evicting_period.is_zero() {
            return Err(ConfigError::ZeroPeriod);
        }
        if self.max_frame_size == 0 {
            return Err(ConfigError::ZeroFrameSize);
        }
        Ok(())
    }
}
