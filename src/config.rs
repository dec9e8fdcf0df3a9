// src/config.rs
use log::{error, warn};
use std::env;
use std::fmt;
use std::str::FromStr;

// Errors raised while reading configuration at startup
#[derive(Debug)]
pub enum ConfigError {
    Missing(&'static str),
    Invalid(&'static str, String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ConfigError::Missing(key) => write!(f, "missing required environment variable {}", key),
            ConfigError::Invalid(key, value) => write!(f, "invalid value for {}: {}", key, value),
        }
    }
}

impl std::error::Error for ConfigError {}

#[derive(Clone, Debug)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
}

#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: String,
    pub port: u16,
    pub database_url: String,
    pub redis_uri: Option<String>,
    pub jwt_secret: String,
    pub jwt_refresh_secret: String,
    pub frontend_url: String,
    pub mail_from: String,
    pub smtp: Option<SmtpConfig>,
    pub github_client_id: String,
    pub github_client_secret: String,
    pub local_service_key: Option<String>,
    pub cookie_secure: bool,
    pub rate_limit_window_secs: u64,
    pub rate_limit_max_requests: u64,
    pub db_health_interval_secs: u64,
}

impl Config {
    /// Reads the process environment (after `.env` has been loaded by `main`).
    ///
    /// Missing signing secrets are fatal: the service refuses to start rather than
    /// failing on the first login.
    pub fn from_env() -> Result<Self, ConfigError> {
        let jwt_secret = required("JWT_SECRET_KEY")?;
        let jwt_refresh_secret = required("JWT_REFRESH_KEY")?;

        let smtp = match env::var("SMTP_HOST").ok().filter(|v| !v.is_empty()) {
            Some(host) => Some(SmtpConfig {
                host,
                port: parse_or("SMTP_PORT", 587)?,
                username: required("SMTP_USERNAME")?,
                password: required("SMTP_PASSWORD")?,
            }),
            None => {
                warn!("⚠️ SMTP_HOST not set, outgoing mail will only be logged");
                None
            }
        };

        let local_service_key = env::var("LOCAL_SERVICE_KEY").ok().filter(|v| !v.is_empty());
        if local_service_key.is_none() {
            warn!("⚠️ LOCAL_SERVICE_KEY not set, internal routes are disabled");
        }

        Ok(Self {
            bind_address: env::var("BIND_ADDRESS").unwrap_or_else(|_| "127.0.0.1".to_string()),
            port: parse_or("PORT", 3000)?,
            database_url: env::var("DATABASE_URL")
                .unwrap_or_else(|_| "sqlite://./storage/statroom.db".to_string()),
            redis_uri: env::var("REDIS_URI").ok().filter(|v| !v.is_empty()),
            jwt_secret,
            jwt_refresh_secret,
            frontend_url: env::var("FRONTEND_URL")
                .unwrap_or_else(|_| "http://localhost:5173".to_string()),
            mail_from: env::var("MAIL_FROM")
                .unwrap_or_else(|_| "Statroom <no-reply@statroom.local>".to_string()),
            smtp,
            github_client_id: env::var("GITHUB_CLIENT_ID").unwrap_or_default(),
            github_client_secret: env::var("GITHUB_CLIENT_SECRET").unwrap_or_default(),
            local_service_key,
            cookie_secure: parse_or("COOKIE_SECURE", false)?,
            rate_limit_window_secs: parse_or("RATE_LIMIT_WINDOW_SECS", 60)?,
            rate_limit_max_requests: parse_or("RATE_LIMIT_MAX_REQUESTS", 30)?,
            db_health_interval_secs: parse_or("DB_HEALTH_INTERVAL_SECS", 30)?,
        })
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.bind_address, self.port)
    }

    // Configuration used by tests: in-memory stores, no SMTP
    pub fn for_tests() -> Self {
        Self {
            bind_address: "127.0.0.1".to_string(),
            port: 0,
            database_url: "sqlite::memory:".to_string(),
            redis_uri: None,
            jwt_secret: "test_access_secret".to_string(),
            jwt_refresh_secret: "test_refresh_secret".to_string(),
            frontend_url: "http://localhost:5173".to_string(),
            mail_from: "Statroom <no-reply@statroom.local>".to_string(),
            smtp: None,
            github_client_id: String::new(),
            github_client_secret: String::new(),
            local_service_key: Some("local_key".to_string()),
            cookie_secure: false,
            rate_limit_window_secs: 60,
            rate_limit_max_requests: 1000,
            db_health_interval_secs: 30,
        }
    }
}

fn required(key: &'static str) -> Result<String, ConfigError> {
    match env::var(key) {
        Ok(value) if !value.is_empty() => Ok(value),
        _ => {
            error!("❌ Missing required environment variable: {}", key);
            Err(ConfigError::Missing(key))
        }
    }
}

fn parse_or<T: FromStr>(key: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(key) {
        Ok(raw) if !raw.is_empty() => raw
            .parse::<T>()
            .map_err(|_| ConfigError::Invalid(key, raw)),
        _ => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_or_falls_back_to_default() {
        env::remove_var("STATROOM_TEST_UNSET_PORT");
        let port: u16 = parse_or("STATROOM_TEST_UNSET_PORT", 3000).unwrap();
        assert_eq!(port, 3000);
    }

    #[test]
    fn parse_or_rejects_garbage() {
        env::set_var("STATROOM_TEST_BAD_PORT", "not-a-port");
        let result: Result<u16, _> = parse_or("STATROOM_TEST_BAD_PORT", 3000);
        assert!(matches!(result, Err(ConfigError::Invalid("STATROOM_TEST_BAD_PORT", _))));
    }

    #[test]
    fn required_rejects_empty_values() {
        env::set_var("STATROOM_TEST_EMPTY_SECRET", "");
        assert!(matches!(
            required("STATROOM_TEST_EMPTY_SECRET"),
            Err(ConfigError::Missing("STATROOM_TEST_EMPTY_SECRET"))
        ));
    }
}
