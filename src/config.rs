//! # Configuration
//!
//! Default addresses, ports, and per-operation timeouts.

use std::time::Duration;

/// Command-channel TCP port.
pub const COMMAND_PORT: u16 = 1234;
/// Status-channel TCP port.
pub const STATUS_PORT: u16 = 1235;

/// Interval between background status polls.
pub const POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Candidate addresses and per-operation timeouts for a [`crate::Loader`].
#[derive(Debug, Clone)]
pub struct LoaderConfig {
    pub addresses: Vec<String>,
    pub command_port: u16,
    pub status_port: u16,
    pub get_version_timeout: Duration,
    pub home_timeout: Duration,
    pub load_timeout: Duration,
    pub load_cassette_timeout: Duration,
    pub evac_timeout: Duration,
    pub clear_last_error_timeout: Duration,
    pub stop_timeout: Duration,
    /// Timeout for every `GET_STATUS` call: both the background poller's
    /// and the synchronous refresh `home`/`load_cassette` trigger on
    /// completion.
    pub status_timeout: Duration,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        LoaderConfig {
            addresses: vec!["autoloader".to_string(), "192.168.0.9".to_string()],
            command_port: COMMAND_PORT,
            status_port: STATUS_PORT,
            get_version_timeout: Duration::from_secs(5),
            home_timeout: Duration::from_secs(60),
            load_timeout: Duration::from_secs(180),
            load_cassette_timeout: Duration::from_secs(180),
            evac_timeout: Duration::from_secs(15),
            clear_last_error_timeout: Duration::from_secs(5),
            stop_timeout: Duration::from_secs(5),
            status_timeout: Duration::from_secs(5),
        }
    }
}
