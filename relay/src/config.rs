//! Runtime configuration
//!
//! Values are set at startup and do not change while the server runs. The
//! binary builds a [`RelayConfig`] from its command-line arguments; tests
//! start from [`RelayConfig::default`] and override what they need.

use std::time::Duration;
use thiserror::Error;

/// Largest resend cache for which wrapping number comparisons stay unambiguous
pub const MAX_RESEND_CACHE_CAPACITY: usize = 32_768;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("resend cache capacity must be > 0")]
    ResendCacheCapacity,

    #[error("resend cache capacity must be <= {max}, got {got}")]
    ResendCacheTooLarge { got: usize, max: usize },

    #[error("messages per datagram must be in 1..=9, got {0}")]
    MessagesPerDatagram(usize),

    #[error("keep-alive timeout must be positive")]
    KeepAliveTimeout,

    #[error("game data cache capacity must be in 1..=256, got {0}")]
    GameDataCacheCapacity(usize),

    #[error("max users must be > 0")]
    MaxUsers,

    #[error("max username length must be <= 31, got {0}")]
    MaxUsernameLength(usize),

    #[error("looking-for-game delay must be positive")]
    LookingForGameDelay,
}

#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Host the connect port and the private session ports bind to
    pub host: String,
    /// Public port answering the connect handshake
    pub connect_port: u16,
    /// Number of sent messages each session keeps for replay
    pub resend_cache_capacity: usize,
    /// Recent messages repeated in every outbound datagram, the new one included
    pub messages_per_datagram: usize,
    /// Entries in each of a session's game-data caches
    pub game_data_cache_capacity: usize,
    pub max_users: usize,
    pub max_username_length: usize,
    /// Users silent for longer than this are logged out
    pub keep_alive_timeout: Duration,
    /// Usernames whose game lifecycle is hidden from other players
    pub stealth_users: Vec<String>,
    pub looking_for_game_enabled: bool,
    /// Debounce interval before a looking-for-game report is posted
    pub looking_for_game_delay: Duration,
    /// Handles ending in one of these suffixes are never reported
    pub looking_for_game_blocked_suffixes: Vec<String>,
    pub server_name: String,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            connect_port: 27888,
            resend_cache_capacity: 64,
            messages_per_datagram: 5,
            game_data_cache_capacity: 256,
            max_users: 100,
            max_username_length: 31,
            keep_alive_timeout: Duration::from_secs(190),
            stealth_users: Vec::new(),
            looking_for_game_enabled: false,
            looking_for_game_delay: Duration::from_secs(15),
            looking_for_game_blocked_suffixes: Vec::new(),
            server_name: "v086 relay".to_string(),
        }
    }
}

impl RelayConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.resend_cache_capacity == 0 {
            return Err(ConfigError::ResendCacheCapacity);
        }
        if self.resend_cache_capacity > MAX_RESEND_CACHE_CAPACITY {
            return Err(ConfigError::ResendCacheTooLarge {
                got: self.resend_cache_capacity,
                max: MAX_RESEND_CACHE_CAPACITY,
            });
        }
        if !(1..=protocol::MAX_BUNDLE_SIZE).contains(&self.messages_per_datagram) {
            return Err(ConfigError::MessagesPerDatagram(self.messages_per_datagram));
        }
        // Cache keys travel as a single byte
        if !(1..=256).contains(&self.game_data_cache_capacity) {
            return Err(ConfigError::GameDataCacheCapacity(
                self.game_data_cache_capacity,
            ));
        }
        if self.max_users == 0 {
            return Err(ConfigError::MaxUsers);
        }
        if self.max_username_length > 31 {
            return Err(ConfigError::MaxUsernameLength(self.max_username_length));
        }
        if self.keep_alive_timeout.is_zero() {
            return Err(ConfigError::KeepAliveTimeout);
        }
        if self.looking_for_game_delay.is_zero() {
            return Err(ConfigError::LookingForGameDelay);
        }
        Ok(())
    }

    pub fn is_stealth(&self, username: &str) -> bool {
        self.stealth_users.iter().any(|name| name == username)
    }
}
