//! Connection configuration (§4.9).

use crate::errors::*;
use std::time::Duration;

/// Connection parameters for [`crate::client::connect`].
///
/// Built with [`ClientConfigBuilder`]; validated once, at `connect()`
/// time, rather than field-by-field as the builder is filled in.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// The matchmaking server's hostname or address
    pub host: String,
    /// The matchmaking server's port
    pub port: u16,
    /// This client's display name
    pub name: String,
    /// The Hello handshake's game-version scalar (§4.1)
    pub game_version: u32,
    /// Bounds opening the UDP socket
    pub connect_timeout: Duration,
    /// Bounds each datagram read
    pub recv_timeout: Duration,
    /// Interval between keep-alive pings
    pub keep_alive_timeout: Duration,
    /// Whether this session joins as a spectator
    pub spectator: bool,
}

/// The default matchmaking port.
pub const DEFAULT_PORT: u16 = 22023;

impl ClientConfig {
    /// Starts a builder for `host`/`name`/`game_version`, the three
    /// fields with no sane default.
    pub fn builder(host: impl Into<String>, name: impl Into<String>, game_version: u32) -> ClientConfigBuilder {
        ClientConfigBuilder {
            host: host.into(),
            port: DEFAULT_PORT,
            name: name.into(),
            game_version,
            connect_timeout: Duration::from_secs(5),
            recv_timeout: Duration::from_secs(8),
            keep_alive_timeout: Duration::from_millis(1000),
            spectator: false,
        }
    }

    /// Validates field values that can be checked without touching the
    /// network: name length and a plausible game-version scalar.
    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() || self.name.len() > 10 {
            return Err(ErrorKind::ProtocolDecode("client name must be 1-10 bytes").into());
        }
        if self.game_version == 0 {
            return Err(ErrorKind::ProtocolDecode("implausible game_version scalar").into());
        }
        Ok(())
    }
}

/// Builder for [`ClientConfig`].
#[derive(Debug, Clone)]
pub struct ClientConfigBuilder {
    host: String,
    port: u16,
    name: String,
    game_version: u32,
    connect_timeout: Duration,
    recv_timeout: Duration,
    keep_alive_timeout: Duration,
    spectator: bool,
}

impl ClientConfigBuilder {
    /// Overrides the default matchmaking port (22023).
    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Overrides the default 5s connect timeout.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Overrides the default 8s receive timeout.
    pub fn recv_timeout(mut self, timeout: Duration) -> Self {
        self.recv_timeout = timeout;
        self
    }

    /// Overrides the default 1000ms keep-alive interval.
    pub fn keep_alive_timeout(mut self, timeout: Duration) -> Self {
        self.keep_alive_timeout = timeout;
        self
    }

    /// Marks this session as a spectator (§4.5).
    pub fn spectator(mut self, spectator: bool) -> Self {
        self.spectator = spectator;
        self
    }

    /// Builds the immutable config.
    pub fn build(self) -> ClientConfig {
        ClientConfig {
            host: self.host,
            port: self.port,
            name: self.name,
            game_version: self.game_version,
            connect_timeout: self.connect_timeout,
            recv_timeout: self.recv_timeout,
            keep_alive_timeout: self.keep_alive_timeout,
            spectator: self.spectator,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = ClientConfig::builder("example.com", "Boot", 123).build();
        assert_eq!(cfg.port, DEFAULT_PORT);
        assert_eq!(cfg.recv_timeout, Duration::from_secs(8));
        assert_eq!(cfg.keep_alive_timeout, Duration::from_millis(1000));
        assert!(!cfg.spectator);
    }

    #[test]
    fn test_validate_rejects_empty_name() {
        let cfg = ClientConfig::builder("example.com", "", 123).build();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_overlong_name() {
        let cfg = ClientConfig::builder("example.com", "ThisNameIsWayTooLong", 123).build();
        assert!(cfg.validate().is_err());
    }
}
