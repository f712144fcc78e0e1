use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Server and round-engine settings
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    /// Where state snapshots are read at startup and written periodically
    pub state_file: Option<PathBuf>,
    pub snapshot_interval: Duration,
    /// Search attempts for a random house recommendation
    pub house_max_attempts: u32,
    /// Minimum artist popularity for random house recommendations
    pub popularity_threshold: u32,
    /// Upper bound for any single music provider call
    pub provider_timeout: Duration,
    pub words_file: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 6574)),
            state_file: None,
            snapshot_interval: Duration::from_secs(30),
            house_max_attempts: 50,
            popularity_threshold: 15,
            provider_timeout: Duration::from_secs(10),
            words_file: None,
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let bind_addr = match std::env::var("BIND_ADDR") {
            Ok(addr) => addr.trim().parse().unwrap_or_else(|e| {
                tracing::warn!("Invalid BIND_ADDR '{}': {}, using default", addr, e);
                defaults.bind_addr
            }),
            Err(_) => defaults.bind_addr,
        };

        Self {
            bind_addr,
            state_file: path_env("STATE_FILE"),
            snapshot_interval: std::env::var("SNAPSHOT_INTERVAL_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs)
                .unwrap_or(defaults.snapshot_interval),
            house_max_attempts: std::env::var("HOUSE_MAX_ATTEMPTS")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|n| *n > 0)
                .unwrap_or(defaults.house_max_attempts),
            popularity_threshold: std::env::var("POPULARITY_THRESHOLD")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.popularity_threshold),
            provider_timeout: std::env::var("PROVIDER_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.provider_timeout),
            words_file: path_env("WORDS_FILE"),
        }
    }
}

fn path_env(key: &str) -> Option<PathBuf> {
    std::env::var(key)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .map(PathBuf::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.house_max_attempts, 50);
        assert_eq!(config.popularity_threshold, 15);
        assert_eq!(config.bind_addr.port(), 6574);
        assert!(config.state_file.is_none());
    }

    #[test]
    #[serial]
    fn test_from_env_overrides() {
        std::env::set_var("BIND_ADDR", "127.0.0.1:9000");
        std::env::set_var("HOUSE_MAX_ATTEMPTS", "5");
        std::env::set_var("STATE_FILE", " /tmp/rounds.json ");

        let config = AppConfig::from_env();
        assert_eq!(config.bind_addr.port(), 9000);
        assert_eq!(config.house_max_attempts, 5);
        assert_eq!(config.state_file, Some(PathBuf::from("/tmp/rounds.json")));

        std::env::remove_var("BIND_ADDR");
        std::env::remove_var("HOUSE_MAX_ATTEMPTS");
        std::env::remove_var("STATE_FILE");
    }

    #[test]
    #[serial]
    fn test_from_env_ignores_garbage() {
        std::env::set_var("BIND_ADDR", "not an address");
        std::env::set_var("HOUSE_MAX_ATTEMPTS", "0");

        let config = AppConfig::from_env();
        assert_eq!(config.bind_addr, AppConfig::default().bind_addr);
        assert_eq!(config.house_max_attempts, 50);

        std::env::remove_var("BIND_ADDR");
        std::env::remove_var("HOUSE_MAX_ATTEMPTS");
    }
}
