use std::env;

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub scheduler: SchedulerConfig,
    pub fanout: FanoutConfig,
    pub retention: RetentionConfig,
    pub gateways: GatewayConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SchedulerConfig {
    /// Whether the scheduler loop is spawned at all.
    pub enabled: bool,
    /// Seconds between two ticks (measured from the end of the previous tick).
    pub tick_interval_seconds: u64,
    /// Maximum number of due entries selected per tick.
    pub batch_size: u32,
    /// Maximum number of entries dispatched in parallel within one tick.
    /// Always in `1..=batch_size`.
    pub worker_concurrency: u32,
    /// A claim older than this is considered abandoned and the entry becomes selectable again.
    pub claim_timeout_seconds: u64,
    /// Upper bound for a single channel send.
    pub channel_send_timeout_seconds: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FanoutConfig {
    /// Lead time used when a user has no advance-notice preference.
    pub default_advance_notice_hours: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RetentionConfig {
    pub enabled: bool,
    /// Terminal entries older than this many days are purged.
    pub days_old: i64,
    pub interval_seconds: u64,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct GatewayConfig {
    /// HTTP endpoint accepting push payloads. Push is unavailable when unset.
    pub push_url: Option<String>,
    pub email_url: Option<String>,
    pub sms_url: Option<String>,
    /// Calendar gateway for music releases. No calendar entries when unset.
    pub calendar_url: Option<String>,
}

fn parse_bool(value: &str, default: bool) -> bool {
    match value.to_lowercase().as_str() {
        "1" | "true" | "yes" => true,
        "0" | "false" | "no" => false,
        _ => default,
    }
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> Result<T, ConfigError> {
    match env::var(key) {
        Ok(v) => v
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue(key.to_string())),
        Err(_) => Ok(default),
    }
}

fn env_flag(key: &str, default: bool) -> bool {
    env::var(key)
        .map(|v| parse_bool(&v, default))
        .unwrap_or(default)
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let defaults = Config::default();

        let config = Config {
            server: ServerConfig {
                host: env::var("HOST").unwrap_or(defaults.server.host),
                port: env_or("PORT", defaults.server.port)?,
            },
            database: DatabaseConfig {
                url: env::var("DATABASE_URL").unwrap_or(defaults.database.url),
                max_connections: env_or(
                    "DATABASE_MAX_CONNECTIONS",
                    defaults.database.max_connections,
                )?,
            },
            scheduler: SchedulerConfig {
                enabled: env_flag("SCHEDULER_ENABLED", defaults.scheduler.enabled),
                tick_interval_seconds: env_or(
                    "SCHEDULER_TICK_INTERVAL_SECONDS",
                    defaults.scheduler.tick_interval_seconds,
                )?,
                batch_size: env_or("SCHEDULER_BATCH_SIZE", defaults.scheduler.batch_size)?,
                worker_concurrency: env_or(
                    "SCHEDULER_WORKER_CONCURRENCY",
                    defaults.scheduler.worker_concurrency,
                )?,
                claim_timeout_seconds: env_or(
                    "SCHEDULER_CLAIM_TIMEOUT_SECONDS",
                    defaults.scheduler.claim_timeout_seconds,
                )?,
                channel_send_timeout_seconds: env_or(
                    "CHANNEL_SEND_TIMEOUT_SECONDS",
                    defaults.scheduler.channel_send_timeout_seconds,
                )?,
            },
            fanout: FanoutConfig {
                default_advance_notice_hours: env_or(
                    "DEFAULT_ADVANCE_NOTICE_HOURS",
                    defaults.fanout.default_advance_notice_hours,
                )?,
            },
            retention: RetentionConfig {
                enabled: env_flag("RETENTION_ENABLED", defaults.retention.enabled),
                days_old: env_or("RETENTION_DAYS", defaults.retention.days_old)?,
                interval_seconds: env_or(
                    "RETENTION_INTERVAL_SECONDS",
                    defaults.retention.interval_seconds,
                )?,
            },
            gateways: GatewayConfig {
                push_url: env_opt("PUSH_GATEWAY_URL"),
                email_url: env_opt("EMAIL_GATEWAY_URL"),
                sms_url: env_opt("SMS_GATEWAY_URL"),
                calendar_url: env_opt("CALENDAR_GATEWAY_URL"),
            },
        };

        config.validated()
    }

    /// Reject knob combinations the workers cannot run with and clamp the
    /// worker pool into `1..=batch_size`.
    pub fn validated(mut self) -> Result<Self, ConfigError> {
        if self.scheduler.batch_size == 0 {
            return Err(ConfigError::InvalidValue("SCHEDULER_BATCH_SIZE".to_string()));
        }
        if self.scheduler.tick_interval_seconds == 0 {
            return Err(ConfigError::InvalidValue(
                "SCHEDULER_TICK_INTERVAL_SECONDS".to_string(),
            ));
        }
        if self.fanout.default_advance_notice_hours < 0 {
            return Err(ConfigError::InvalidValue(
                "DEFAULT_ADVANCE_NOTICE_HOURS".to_string(),
            ));
        }
        if self.retention.days_old < 0 {
            return Err(ConfigError::InvalidValue("RETENTION_DAYS".to_string()));
        }
        if self.retention.interval_seconds == 0 {
            return Err(ConfigError::InvalidValue(
                "RETENTION_INTERVAL_SECONDS".to_string(),
            ));
        }

        self.scheduler.worker_concurrency = self
            .scheduler
            .worker_concurrency
            .clamp(1, self.scheduler.batch_size);

        Ok(self)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for environment variable: {0}")]
    InvalidValue(String),
}

impl Default for Config {
    fn default() -> Self {
        Config {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 8080,
            },
            database: DatabaseConfig {
                url: "sqlite://data/app.db".to_string(),
                max_connections: 5,
            },
            scheduler: SchedulerConfig::default(),
            fanout: FanoutConfig {
                default_advance_notice_hours: 24,
            },
            retention: RetentionConfig {
                enabled: true,
                days_old: 30,
                interval_seconds: 24 * 60 * 60,
            },
            gateways: GatewayConfig::default(),
        }
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        SchedulerConfig {
            enabled: true,
            tick_interval_seconds: 60,
            batch_size: 100,
            worker_concurrency: 10,
            claim_timeout_seconds: 300,
            channel_send_timeout_seconds: 30,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_bool_accepts_common_spellings() {
        assert!(parse_bool("YES", false));
        assert!(parse_bool("1", false));
        assert!(!parse_bool("false", true));
        assert!(parse_bool("maybe", true));
    }

    #[test]
    fn worker_concurrency_is_clamped_to_batch_size() {
        let mut config = Config::default();
        config.scheduler.batch_size = 4;
        config.scheduler.worker_concurrency = 50;
        let config = config.validated().unwrap();
        assert_eq!(config.scheduler.worker_concurrency, 4);

        let mut config = Config::default();
        config.scheduler.worker_concurrency = 0;
        let config = config.validated().unwrap();
        assert_eq!(config.scheduler.worker_concurrency, 1);
    }

    #[test]
    fn zero_batch_size_is_rejected() {
        let mut config = Config::default();
        config.scheduler.batch_size = 0;
        assert!(matches!(
            config.validated(),
            Err(ConfigError::InvalidValue(key)) if key == "SCHEDULER_BATCH_SIZE"
        ));
    }
}
