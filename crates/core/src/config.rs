//! Queue connection configuration loaded from environment variables.

use crate::error::QueueError;

/// Default store port (stock PostgreSQL).
pub const DEFAULT_PORT: u16 = 5432;

/// Default connection timeout in seconds.
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 5;

/// Default lane name for submissions and workers.
pub const DEFAULT_LANE: &str = "default";

/// Connection parameters for the shared job store.
///
/// All fields have defaults suitable for a single-machine farm; override
/// via environment variables for a networked deployment.
#[derive(Debug, Clone)]
pub struct QueueConfig {
    /// Lane (named sub-queue) to submit to or pull from.
    pub lane: String,
    /// Store host (default: `127.0.0.1`).
    pub host: String,
    /// Store port (default: `5432`).
    pub port: u16,
    /// Database name (default: `renderq`).
    pub database: String,
    /// Database user (default: `renderq`).
    pub user: String,
    /// Database password (default: empty).
    pub password: String,
    /// Connection timeout in seconds (default: `5`).
    pub connect_timeout_secs: u64,
    /// Full connection URL override. When set, the host/port/database/user
    /// fields are ignored for URL assembly (but `host`/`port` still appear
    /// in connection error messages).
    pub database_url: Option<String>,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            lane: DEFAULT_LANE.to_string(),
            host: "127.0.0.1".to_string(),
            port: DEFAULT_PORT,
            database: "renderq".to_string(),
            user: "renderq".to_string(),
            password: String::new(),
            connect_timeout_secs: DEFAULT_CONNECT_TIMEOUT_SECS,
            database_url: None,
        }
    }
}

impl QueueConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                        | Default       |
    /// |--------------------------------|---------------|
    /// | `RENDERQ_LANE`                 | `default`     |
    /// | `RENDERQ_HOST`                 | `127.0.0.1`   |
    /// | `RENDERQ_PORT`                 | `5432`        |
    /// | `RENDERQ_DB`                   | `renderq`     |
    /// | `RENDERQ_USER`                 | `renderq`     |
    /// | `RENDERQ_PASSWORD`             | (empty)       |
    /// | `RENDERQ_CONNECT_TIMEOUT_SECS` | `5`           |
    /// | `RENDERQ_DATABASE_URL`         | (unset)       |
    pub fn from_env() -> Result<Self, QueueError> {
        let defaults = Self::default();
        let config = Self {
            lane: env_or("RENDERQ_LANE", &defaults.lane),
            host: env_or("RENDERQ_HOST", &defaults.host),
            port: env_parsed("RENDERQ_PORT", defaults.port)?,
            database: env_or("RENDERQ_DB", &defaults.database),
            user: env_or("RENDERQ_USER", &defaults.user),
            password: env_or("RENDERQ_PASSWORD", &defaults.password),
            connect_timeout_secs: env_parsed(
                "RENDERQ_CONNECT_TIMEOUT_SECS",
                defaults.connect_timeout_secs,
            )?,
            database_url: std::env::var("RENDERQ_DATABASE_URL").ok(),
        };
        config.validate()?;
        Ok(config)
    }

    /// Check lane and host before any network call is made.
    pub fn validate(&self) -> Result<(), QueueError> {
        if self.lane.trim().is_empty() {
            return Err(QueueError::Configuration(
                "Lane not specified. You must specify the name of a renderq lane.".to_string(),
            ));
        }
        if self.host.trim().is_empty() {
            return Err(QueueError::Configuration(
                "Server host not specified. You must specify the IP address or hostname of the renderq store.".to_string(),
            ));
        }
        if self.connect_timeout_secs == 0 {
            return Err(QueueError::Configuration(
                "Connection timeout must be a positive number of seconds.".to_string(),
            ));
        }
        Ok(())
    }

    /// Assemble the store connection URL.
    pub fn url(&self) -> String {
        match &self.database_url {
            Some(url) => url.clone(),
            None => format!(
                "postgres://{}:{}@{}:{}/{}",
                self.user, self.password, self.host, self.port, self.database
            ),
        }
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parsed<T: std::str::FromStr>(key: &str, default: T) -> Result<T, QueueError> {
    match std::env::var(key) {
        Ok(raw) => raw
            .parse()
            .map_err(|_| QueueError::Configuration(format!("{key} must be a valid number"))),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn default_config_validates() {
        let config = QueueConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.lane, "default");
    }

    #[test]
    fn empty_lane_is_a_configuration_error() {
        let config = QueueConfig {
            lane: "  ".to_string(),
            ..QueueConfig::default()
        };
        assert_matches!(config.validate(), Err(QueueError::Configuration(_)));
    }

    #[test]
    fn empty_host_is_a_configuration_error() {
        let config = QueueConfig {
            host: String::new(),
            ..QueueConfig::default()
        };
        assert_matches!(config.validate(), Err(QueueError::Configuration(_)));
    }

    #[test]
    fn url_assembles_from_parts() {
        let config = QueueConfig {
            host: "farm01".to_string(),
            port: 5433,
            ..QueueConfig::default()
        };
        assert_eq!(config.url(), "postgres://renderq:@farm01:5433/renderq");
    }

    #[test]
    fn explicit_url_wins_over_parts() {
        let config = QueueConfig {
            database_url: Some("postgres://u:p@h:1/db".to_string()),
            ..QueueConfig::default()
        };
        assert_eq!(config.url(), "postgres://u:p@h:1/db");
    }
}
