//! Process configuration read from environment variables.
//!
//! `main` loads `.env` with `dotenvy` before calling [`AppConfig::from_env`].

use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use secrecy::SecretString;

use crate::api::RateLimitConfig;
use crate::app::{LockoutMode, LoginGuardConfig};
use crate::domain::ConfigError;
use crate::infra::{JwtConfig, LogFormat};

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";

/// Upper bound for durations given in seconds (one year).
pub const MAX_DURATION_SECS: u64 = 365 * 24 * 60 * 60;

/// Everything `main` needs to wire the server.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: SecretString,
    pub bind_addr: SocketAddr,
    pub jwt: JwtConfig,
    pub login_guard: LoginGuardConfig,
    pub rate_limit: RateLimitConfig,
    pub enable_rate_limiting: bool,
    pub log_format: LogFormat,
}

impl AppConfig {
    /// Reads the configuration from the process environment.
    ///
    /// # Errors
    /// `MissingEnvVar` for `DATABASE_URL` or `JWT_SECRET`, `InvalidValue`
    /// when a variable is present but cannot be parsed.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`AppConfig::from_env`] with an injectable variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| ConfigError::MissingEnvVar(key.to_string()))
        };

        let database_url = SecretString::from(required("DATABASE_URL")?);
        let jwt_secret = required("JWT_SECRET")?;

        let bind_addr = parse_or(&lookup, "BIND_ADDR", || {
            SocketAddr::from(([0, 0, 0, 0], 3000))
        })?;

        let mut jwt = JwtConfig::new(jwt_secret);
        jwt.ttl = Duration::from_secs(bounded(
            "JWT_TTL_SECS",
            parse_or(&lookup, "JWT_TTL_SECS", || JwtConfig::DEFAULT_TTL.as_secs())?,
            MAX_DURATION_SECS,
        )?);

        let defaults = LoginGuardConfig::default();
        let login_guard = LoginGuardConfig {
            max_failed_attempts: parse_or(&lookup, "MAX_FAILED_LOGIN_ATTEMPTS", || {
                defaults.max_failed_attempts
            })?,
            lockout_time: Duration::from_secs(bounded(
                "LOCKOUT_TIME_SECS",
                parse_or(&lookup, "LOCKOUT_TIME_SECS", || defaults.lockout_time.as_secs())?,
                MAX_DURATION_SECS,
            )?),
            mode: parse_or(&lookup, "LOCKOUT_MODE", LockoutMode::default)?,
        };

        let rate_defaults = RateLimitConfig::default();
        let rate_limit = RateLimitConfig {
            general_rps: parse_or(&lookup, "RATE_LIMIT_RPS", || rate_defaults.general_rps)?,
            general_burst: parse_or(&lookup, "RATE_LIMIT_BURST", || {
                rate_defaults.general_burst
            })?,
            ..rate_defaults
        };

        Ok(Self {
            database_url,
            bind_addr,
            jwt,
            login_guard,
            rate_limit,
            enable_rate_limiting: parse_or(&lookup, "ENABLE_RATE_LIMITING", || false)?,
            log_format: parse_or(&lookup, "LOG_FORMAT", LogFormat::default)?,
        })
    }
}

fn bounded(key: &str, value: u64, max: u64) -> Result<u64, ConfigError> {
    if value > max {
        return Err(ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("must be at most {max}"),
        });
    }
    Ok(value)
}

fn parse_or<F, T, D>(lookup: &F, key: &str, default: D) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
    D: FnOnce() -> T,
{
    match lookup(key).filter(|v| !v.trim().is_empty()) {
        None => Ok(default()),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e: T::Err| ConfigError::InvalidValue {
                key: key.to_string(),
                message: e.to_string(),
            }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    const REQUIRED: [(&str, &str); 2] = [
        ("DATABASE_URL", "postgres://localhost/eshop"),
        ("JWT_SECRET", "dev-secret"),
    ];

    #[test]
    fn test_defaults() {
        let config = AppConfig::from_lookup(lookup(&REQUIRED)).unwrap();

        assert_eq!(config.bind_addr.to_string(), DEFAULT_BIND_ADDR);
        assert_eq!(config.jwt.ttl, Duration::from_secs(86_400));
        assert_eq!(config.login_guard.max_failed_attempts, 5);
        assert_eq!(config.login_guard.lockout_time, Duration::from_secs(1800));
        assert_eq!(config.login_guard.mode, LockoutMode::Hold);
        assert!(!config.enable_rate_limiting);
        assert_eq!(config.log_format, LogFormat::Pretty);
        assert_eq!(
            config.database_url.expose_secret(),
            "postgres://localhost/eshop"
        );
    }

    #[test]
    fn test_overrides() {
        let mut vars = REQUIRED.to_vec();
        vars.extend([
            ("BIND_ADDR", "127.0.0.1:8080"),
            ("MAX_FAILED_LOGIN_ATTEMPTS", "3"),
            ("LOCKOUT_TIME_SECS", "60"),
            ("LOCKOUT_MODE", "reject"),
            ("RATE_LIMIT_RPS", "50"),
            ("ENABLE_RATE_LIMITING", "true"),
            ("LOG_FORMAT", "json"),
        ]);

        let config = AppConfig::from_lookup(lookup(&vars)).unwrap();

        assert_eq!(config.bind_addr.port(), 8080);
        assert_eq!(config.login_guard.max_failed_attempts, 3);
        assert_eq!(config.login_guard.lockout_time, Duration::from_secs(60));
        assert_eq!(config.login_guard.mode, LockoutMode::Reject);
        assert_eq!(config.rate_limit.general_rps, 50);
        assert!(config.enable_rate_limiting);
        assert_eq!(config.log_format, LogFormat::Json);
    }

    #[test]
    fn test_missing_required_variable() {
        let err = AppConfig::from_lookup(lookup(&[("JWT_SECRET", "x")])).unwrap_err();
        assert!(matches!(err, ConfigError::MissingEnvVar(key) if key == "DATABASE_URL"));
    }

    #[test]
    fn test_invalid_value_names_the_key() {
        let mut vars = REQUIRED.to_vec();
        vars.push(("MAX_FAILED_LOGIN_ATTEMPTS", "many"));

        let err = AppConfig::from_lookup(lookup(&vars)).unwrap_err();
        assert!(
            matches!(err, ConfigError::InvalidValue { key, .. } if key == "MAX_FAILED_LOGIN_ATTEMPTS")
        );
    }

    #[test]
    fn test_oversized_durations_are_rejected() {
        for key in ["LOCKOUT_TIME_SECS", "JWT_TTL_SECS"] {
            let mut vars = REQUIRED.to_vec();
            vars.push((key, "18446744073709551615"));

            let err = AppConfig::from_lookup(lookup(&vars)).unwrap_err();
            assert!(matches!(err, ConfigError::InvalidValue { key: k, .. } if k == key));
        }
    }
}
