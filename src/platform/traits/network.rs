//! Wi-Fi access point interface
//!
//! The firmware advertises its own soft access point and serves a single
//! status page over it. The trait covers exactly that surface; station
//! mode and richer HTTP routing live outside this crate.

use crate::platform::error::Result;

/// Authentication mode derived from the configured password.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMode {
    Open,
    Wpa2,
}

/// Soft access point configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApConfig {
    pub ssid: heapless::String<32>,
    /// Empty password means an open network.
    pub password: heapless::String<64>,
    pub port: u16,
    pub max_connections: u8,
}

impl ApConfig {
    pub fn auth_mode(&self) -> AuthMode {
        if self.password.is_empty() {
            AuthMode::Open
        } else {
            AuthMode::Wpa2
        }
    }
}

impl Default for ApConfig {
    fn default() -> ApConfig {
        let mut ssid = heapless::String::new();
        // Capacity is 32; the literal fits.
        let _ = ssid.push_str("mp3-deck");
        ApConfig {
            ssid,
            password: heapless::String::new(),
            port: 8080,
            max_connections: 1,
        }
    }
}

/// Soft access point with a one-page HTTP server.
pub trait AccessPointInterface {
    /// Bring the access point up with `config`. Idempotent while up.
    fn start(&mut self, config: &ApConfig) -> Result<()>;

    /// Tear the access point down. Idempotent while down.
    fn stop(&mut self) -> Result<()>;

    /// True while the access point is advertising.
    fn is_up(&self) -> bool;

    /// Serve `html` as the index page on the configured port.
    fn serve_index(&mut self, html: &'static str) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ApConfig::default();
        assert_eq!(config.ssid.as_str(), "mp3-deck");
        assert_eq!(config.port, 8080);
        assert_eq!(config.max_connections, 1);
        assert_eq!(config.auth_mode(), AuthMode::Open);
    }

    #[test]
    fn test_password_selects_wpa2() {
        let mut config = ApConfig::default();
        config.password.push_str("hunter22").unwrap();
        assert_eq!(config.auth_mode(), AuthMode::Wpa2);
    }
}
