//! Application configuration

use std::env;
use std::str::FromStr;
use time::{macros::format_description, UtcOffset};

use crate::auth::password::HashingParams;

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    // Server
    pub bind_address: String,
    pub public_url: String,

    // Database (absent: in-memory stores)
    pub database_url: Option<String>,
    pub database_max_connections: u32,

    // Sessions
    pub session_max_inactivity: time::Duration,
    pub session_sweep_interval: std::time::Duration,
    pub session_retention: time::Duration,
    pub cookie_secure: bool,
    pub login_min_response: std::time::Duration,
    pub display_offset: UtcOffset,

    // Password reset
    pub reset_token_ttl: time::Duration,
    pub hashing: HashingParams,

    // Email
    pub resend_api_key: String,
    pub email_from: String,
    pub app_name: String,

    // Seeded principal for fresh deployments
    pub bootstrap_admin: Option<BootstrapAdmin>,
}

/// Administrator created at startup if no principal with that username exists
#[derive(Clone)]
pub struct BootstrapAdmin {
    pub username: String,
    pub email: String,
    /// Argon2 PHC string, see the `hash-password` binary
    pub password_hash: String,
}

impl std::fmt::Debug for BootstrapAdmin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BootstrapAdmin")
            .field("username", &self.username)
            .field("email", &self.email)
            .finish_non_exhaustive()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:3000".to_string(),
            public_url: "http://localhost:3000".to_string(),
            database_url: None,
            database_max_connections: 20,
            session_max_inactivity: time::Duration::hours(24),
            session_sweep_interval: std::time::Duration::from_secs(300),
            session_retention: time::Duration::hours(24),
            cookie_secure: true,
            login_min_response: std::time::Duration::from_millis(500),
            display_offset: UtcOffset::UTC,
            reset_token_ttl: time::Duration::minutes(30),
            hashing: HashingParams::default(),
            resend_api_key: String::new(),
            email_from: "Warden <noreply@localhost>".to_string(),
            app_name: "Warden".to_string(),
            bootstrap_admin: None,
        }
    }
}

fn parse_var<T: FromStr>(key: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid(key, raw)),
        _ => Ok(default),
    }
}

/// Upper bound for every configured duration. Larger values overflow
/// timestamp arithmetic on the request path.
pub const MAX_DURATION_SECS: i64 = 365 * 24 * 60 * 60;

/// Longest accepted minimum login response
pub const MAX_LOGIN_MIN_RESPONSE_MS: u64 = 60_000;

fn positive_secs(key: &'static str, default: i64) -> Result<i64, ConfigError> {
    let secs: i64 = parse_var(key, default)?;
    if secs <= 0 || secs > MAX_DURATION_SECS {
        return Err(ConfigError::Invalid(key, secs.to_string()));
    }
    Ok(secs)
}

fn login_min_response_ms() -> Result<u64, ConfigError> {
    let ms: u64 = parse_var("LOGIN_MIN_RESPONSE_MS", 500)?;
    if ms > MAX_LOGIN_MIN_RESPONSE_MS {
        return Err(ConfigError::Invalid("LOGIN_MIN_RESPONSE_MS", ms.to_string()));
    }
    Ok(ms)
}

fn bootstrap_admin() -> Result<Option<BootstrapAdmin>, ConfigError> {
    let read = |key: &str| env::var(key).ok().filter(|v| !v.trim().is_empty());
    match (
        read("BOOTSTRAP_ADMIN_USERNAME"),
        read("BOOTSTRAP_ADMIN_EMAIL"),
        read("BOOTSTRAP_ADMIN_PASSWORD_HASH"),
    ) {
        (None, None, None) => Ok(None),
        (Some(username), Some(email), Some(password_hash)) => {
            if !password_hash.starts_with("$argon2") {
                return Err(ConfigError::Invalid(
                    "BOOTSTRAP_ADMIN_PASSWORD_HASH",
                    "<not an Argon2 hash>".to_string(),
                ));
            }
            Ok(Some(BootstrapAdmin {
                username,
                email,
                password_hash,
            }))
        }
        _ => Err(ConfigError::Incomplete("BOOTSTRAP_ADMIN_*")),
    }
}

fn parse_offset(raw: &str) -> Result<UtcOffset, ConfigError> {
    UtcOffset::parse(
        raw.trim(),
        format_description!("[offset_hour sign:mandatory]:[offset_minute]"),
    )
    .map_err(|_| ConfigError::Invalid("DISPLAY_UTC_OFFSET", raw.to_string()))
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let session_max_inactivity =
            time::Duration::seconds(positive_secs("SESSION_MAX_INACTIVITY_SECS", 86_400)?);

        let hashing = HashingParams {
            memory_kib: parse_var("PASSWORD_HASH_MEMORY_KIB", defaults.hashing.memory_kib)?,
            iterations: parse_var("PASSWORD_HASH_ITERATIONS", defaults.hashing.iterations)?,
            parallelism: parse_var("PASSWORD_HASH_PARALLELISM", defaults.hashing.parallelism)?,
        };
        hashing
            .hasher()
            .map_err(|e| ConfigError::InvalidHashing(e.to_string()))?;

        let display_offset = match env::var("DISPLAY_UTC_OFFSET") {
            Ok(raw) if !raw.trim().is_empty() => parse_offset(&raw)?,
            _ => defaults.display_offset,
        };

        Ok(Self {
            // Server
            bind_address: env::var("BIND_ADDRESS").unwrap_or(defaults.bind_address),
            public_url: env::var("PUBLIC_URL").unwrap_or(defaults.public_url),

            // Database
            database_url: env::var("DATABASE_URL").ok().filter(|v| !v.trim().is_empty()),
            database_max_connections: parse_var(
                "DATABASE_MAX_CONNECTIONS",
                defaults.database_max_connections,
            )?,

            // Sessions
            session_max_inactivity,
            session_sweep_interval: std::time::Duration::from_secs(
                positive_secs("SESSION_SWEEP_INTERVAL_SECS", 300)? as u64,
            ),
            session_retention: time::Duration::seconds(positive_secs(
                "SESSION_RETENTION_SECS",
                session_max_inactivity.whole_seconds(),
            )?),
            cookie_secure: parse_var("COOKIE_SECURE", defaults.cookie_secure)?,
            login_min_response: std::time::Duration::from_millis(login_min_response_ms()?),
            display_offset,

            // Password reset
            reset_token_ttl: time::Duration::seconds(positive_secs("RESET_TOKEN_TTL_SECS", 1_800)?),
            hashing,

            // Email
            resend_api_key: env::var("RESEND_API_KEY").unwrap_or_default(),
            email_from: env::var("EMAIL_FROM").unwrap_or(defaults.email_from),
            app_name: env::var("APP_NAME").unwrap_or(defaults.app_name),

            bootstrap_admin: bootstrap_admin()?,
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {0}: {1:?}")]
    Invalid(&'static str, String),
    #[error("Invalid password hashing parameters: {0}")]
    InvalidHashing(String),
    #[error("Incomplete settings: {0} must be set together")]
    Incomplete(&'static str),
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    const KEYS: &[&str] = &[
        "BIND_ADDRESS",
        "DATABASE_URL",
        "SESSION_MAX_INACTIVITY_SECS",
        "SESSION_SWEEP_INTERVAL_SECS",
        "SESSION_RETENTION_SECS",
        "RESET_TOKEN_TTL_SECS",
        "PASSWORD_HASH_MEMORY_KIB",
        "PASSWORD_HASH_ITERATIONS",
        "PASSWORD_HASH_PARALLELISM",
        "COOKIE_SECURE",
        "LOGIN_MIN_RESPONSE_MS",
        "DISPLAY_UTC_OFFSET",
        "BOOTSTRAP_ADMIN_USERNAME",
        "BOOTSTRAP_ADMIN_EMAIL",
        "BOOTSTRAP_ADMIN_PASSWORD_HASH",
    ];

    fn cleanup_config() {
        for key in KEYS {
            env::remove_var(key);
        }
    }

    #[test]
    #[serial]
    fn test_defaults() {
        cleanup_config();
        let config = Config::from_env().unwrap();
        assert!(config.database_url.is_none());
        assert_eq!(config.session_max_inactivity, time::Duration::hours(24));
        assert_eq!(config.session_retention, time::Duration::hours(24));
        assert_eq!(config.reset_token_ttl, time::Duration::minutes(30));
        assert_eq!(config.hashing, HashingParams::default());
        assert!(config.cookie_secure);
        assert_eq!(config.display_offset, UtcOffset::UTC);
    }

    #[test]
    #[serial]
    fn test_overrides() {
        cleanup_config();
        env::set_var("SESSION_MAX_INACTIVITY_SECS", "600");
        env::set_var("RESET_TOKEN_TTL_SECS", "120");
        env::set_var("PASSWORD_HASH_MEMORY_KIB", "8192");
        env::set_var("COOKIE_SECURE", "false");
        env::set_var("DISPLAY_UTC_OFFSET", "-05:30");
        env::set_var("DATABASE_URL", "postgres://localhost/warden");

        let config = Config::from_env().unwrap();
        assert_eq!(config.session_max_inactivity, time::Duration::minutes(10));
        // Retention follows the inactivity window unless set
        assert_eq!(config.session_retention, time::Duration::minutes(10));
        assert_eq!(config.reset_token_ttl, time::Duration::minutes(2));
        assert_eq!(config.hashing.memory_kib, 8192);
        assert!(!config.cookie_secure);
        assert_eq!(config.display_offset, UtcOffset::from_hms(-5, -30, 0).unwrap());
        assert_eq!(config.database_url.as_deref(), Some("postgres://localhost/warden"));

        cleanup_config();
    }

    #[test]
    #[serial]
    fn test_rejects_invalid_values() {
        cleanup_config();

        env::set_var("SESSION_MAX_INACTIVITY_SECS", "0");
        assert!(matches!(
            Config::from_env(),
            Err(ConfigError::Invalid("SESSION_MAX_INACTIVITY_SECS", _))
        ));
        env::remove_var("SESSION_MAX_INACTIVITY_SECS");

        env::set_var("RESET_TOKEN_TTL_SECS", "soon");
        assert!(matches!(
            Config::from_env(),
            Err(ConfigError::Invalid("RESET_TOKEN_TTL_SECS", _))
        ));
        env::remove_var("RESET_TOKEN_TTL_SECS");

        env::set_var("PASSWORD_HASH_ITERATIONS", "0");
        assert!(matches!(Config::from_env(), Err(ConfigError::InvalidHashing(_))));
        env::remove_var("PASSWORD_HASH_ITERATIONS");

        env::set_var("SESSION_MAX_INACTIVITY_SECS", "9000000000000");
        assert!(matches!(
            Config::from_env(),
            Err(ConfigError::Invalid("SESSION_MAX_INACTIVITY_SECS", _))
        ));
        env::set_var(
            "SESSION_MAX_INACTIVITY_SECS",
            (MAX_DURATION_SECS + 1).to_string(),
        );
        assert!(Config::from_env().is_err());
        env::set_var("SESSION_MAX_INACTIVITY_SECS", MAX_DURATION_SECS.to_string());
        assert!(Config::from_env().is_ok());
        env::remove_var("SESSION_MAX_INACTIVITY_SECS");

        env::set_var("RESET_TOKEN_TTL_SECS", "9000000000000");
        assert!(matches!(
            Config::from_env(),
            Err(ConfigError::Invalid("RESET_TOKEN_TTL_SECS", _))
        ));
        env::remove_var("RESET_TOKEN_TTL_SECS");

        env::set_var("SESSION_SWEEP_INTERVAL_SECS", "9000000000000");
        assert!(matches!(
            Config::from_env(),
            Err(ConfigError::Invalid("SESSION_SWEEP_INTERVAL_SECS", _))
        ));
        env::remove_var("SESSION_SWEEP_INTERVAL_SECS");

        env::set_var("LOGIN_MIN_RESPONSE_MS", "18446744073709551615");
        assert!(matches!(
            Config::from_env(),
            Err(ConfigError::Invalid("LOGIN_MIN_RESPONSE_MS", _))
        ));
        env::remove_var("LOGIN_MIN_RESPONSE_MS");

        env::set_var("DISPLAY_UTC_OFFSET", "CET");
        assert!(matches!(
            Config::from_env(),
            Err(ConfigError::Invalid("DISPLAY_UTC_OFFSET", _))
        ));

        cleanup_config();
    }

    #[test]
    #[serial]
    fn test_bootstrap_admin_requires_all_parts() {
        cleanup_config();
        assert!(Config::from_env().unwrap().bootstrap_admin.is_none());

        env::set_var("BOOTSTRAP_ADMIN_USERNAME", "root");
        assert!(matches!(Config::from_env(), Err(ConfigError::Incomplete(_))));

        env::set_var("BOOTSTRAP_ADMIN_EMAIL", "root@example.com");
        env::set_var("BOOTSTRAP_ADMIN_PASSWORD_HASH", "$argon2id$v=19$m=64,t=1,p=1$c2FsdA$aGFzaA");
        let admin = Config::from_env().unwrap().bootstrap_admin.unwrap();
        assert_eq!(admin.username, "root");
        assert!(!format!("{admin:?}").contains("argon2"));

        cleanup_config();
    }
}
