//! Environment configuration, loaded once at startup.
//!
//! Staleness is policy, not mechanism: the threshold lives here and nowhere
//! else, so changing it never requires a code change.

use chrono::Duration;
use thiserror::Error;

/// Which VM backend the provider port should use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProviderKind {
    #[default]
    Multipass,
}

/// Invalid environment configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {value}\n\nValid values: {valid}")]
    InvalidValue {
        key: String,
        value: String,
        valid: String,
    },
}

/// Environment-derived configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
    /// Selected VM backend (`PROVIDER`).
    pub provider: ProviderKind,
    /// Ship count when neither plan nor `--ships` says (`DEFAULT_SHIPS`).
    pub default_ships: u32,
    /// Deriver staleness threshold (`STALE_THRESHOLD_MINUTES`).
    pub stale_threshold: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            provider: ProviderKind::Multipass,
            default_ships: 3,
            stale_threshold: Duration::minutes(30),
        }
    }
}

impl Config {
    /// Read configuration from the process environment.
    ///
    /// Unset variables fall back to defaults; set-but-invalid values are an
    /// input error, not a silent default.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Ok(value) = std::env::var("PROVIDER") {
            config.provider = match value.as_str() {
                "multipass" => ProviderKind::Multipass,
                _ => {
                    return Err(ConfigError::InvalidValue {
                        key: "PROVIDER".into(),
                        value,
                        valid: "multipass".into(),
                    });
                }
            };
        }

        if let Ok(value) = std::env::var("DEFAULT_SHIPS") {
            config.default_ships = parse_positive("DEFAULT_SHIPS", &value)?;
        }

        if let Ok(value) = std::env::var("STALE_THRESHOLD_MINUTES") {
            let minutes = parse_positive("STALE_THRESHOLD_MINUTES", &value)?;
            config.stale_threshold = Duration::minutes(i64::from(minutes));
        }

        Ok(config)
    }
}

fn parse_positive(key: &str, value: &str) -> Result<u32, ConfigError> {
    match value.parse::<u32>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(ConfigError::InvalidValue {
            key: key.into(),
            value: value.into(),
            valid: "a positive integer".into(),
        }),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, unsafe_code)]
mod tests {
    use serial_test::serial;

    use super::*;

    fn clear_env() {
        for key in ["PROVIDER", "DEFAULT_SHIPS", "STALE_THRESHOLD_MINUTES"] {
            // SAFETY: env-mutating tests are serialized with #[serial].
            unsafe { std::env::remove_var(key) };
        }
    }

    fn set(key: &str, value: &str) {
        // SAFETY: env-mutating tests are serialized with #[serial].
        unsafe { std::env::set_var(key, value) };
    }

    #[test]
    #[serial]
    fn defaults_when_env_unset() {
        clear_env();
        let config = Config::from_env().expect("config");
        assert_eq!(config, Config::default());
        assert_eq!(config.default_ships, 3);
        assert_eq!(config.stale_threshold, Duration::minutes(30));
    }

    #[test]
    #[serial]
    fn reads_overrides() {
        clear_env();
        set("PROVIDER", "multipass");
        set("DEFAULT_SHIPS", "7");
        set("STALE_THRESHOLD_MINUTES", "45");
        let config = Config::from_env().expect("config");
        assert_eq!(config.provider, ProviderKind::Multipass);
        assert_eq!(config.default_ships, 7);
        assert_eq!(config.stale_threshold, Duration::minutes(45));
        clear_env();
    }

    #[test]
    #[serial]
    fn rejects_unknown_provider() {
        clear_env();
        set("PROVIDER", "teleport");
        let err = Config::from_env().expect_err("unknown provider");
        assert!(err.to_string().contains("PROVIDER"));
        clear_env();
    }

    #[test]
    #[serial]
    fn rejects_zero_ships() {
        clear_env();
        set("DEFAULT_SHIPS", "0");
        let err = Config::from_env().expect_err("zero ships");
        assert!(err.to_string().contains("DEFAULT_SHIPS"));
        clear_env();
    }

    #[test]
    #[serial]
    fn rejects_non_numeric_threshold() {
        clear_env();
        set("STALE_THRESHOLD_MINUTES", "soon");
        let err = Config::from_env().expect_err("non-numeric");
        assert!(err.to_string().contains("STALE_THRESHOLD_MINUTES"));
        clear_env();
    }
}
