use anyhow::{Context, Result, bail};
use std::env;
use std::str::FromStr;
use tower_cookies::cookie::SameSite;

/// Which backend holds session records.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionBackend {
    Postgres,
    Memory,
}

impl FromStr for SessionBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "postgres" => Ok(SessionBackend::Postgres),
            "memory" => Ok(SessionBackend::Memory),
            other => bail!("unknown session store {:?} (expected postgres or memory)", other),
        }
    }
}

/// Session and anti-forgery cookie settings.
#[derive(Clone, Debug)]
pub struct SessionConfig {
    /// The session cookie name.
    pub session_name: String,
    /// SameSite attribute for both cookies.
    pub same_site: SameSite,
    /// How long a session lives.
    pub session_duration: chrono::Duration,
    /// How often expired sessions are swept.
    pub cleanup_interval: std::time::Duration,
    /// Deadline for a single store call.
    pub store_timeout: std::time::Duration,
    /// The anti-forgery cookie name.
    pub csrf_name: String,
    /// How long an anti-forgery cookie lives.
    pub csrf_duration: chrono::Duration,
    /// Adds `Secure` to cookies.
    pub secure_cookies: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            session_name: "sid".to_string(),
            same_site: SameSite::Strict,
            session_duration: chrono::Duration::minutes(30),
            cleanup_interval: std::time::Duration::from_secs(10 * 60),
            store_timeout: std::time::Duration::from_secs(5),
            csrf_name: "xsrf".to_string(),
            csrf_duration: chrono::Duration::minutes(30),
            secure_cookies: false,
        }
    }
}

/// The application's configuration.
#[derive(Clone, Debug)]
pub struct Config {
    /// The address to bind.
    pub host: String,
    /// The port to bind.
    pub port: u16,
    /// How long graceful shutdown may take.
    pub shutdown_timeout: std::time::Duration,
    /// The URL of the PostgreSQL database.
    pub database_url: String,
    /// The maximum number of pooled connections.
    pub db_pool_max_size: usize,
    /// Where sessions are stored.
    pub session_backend: SessionBackend,
    /// Cookie and lifetime settings.
    pub session: SessionConfig,
    /// Origins allowed to make credentialed cross-origin requests.
    pub cors_allowed_origins: Vec<String>,
}

fn var_or<T>(name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(raw) => raw
            .parse()
            .map_err(|e| anyhow::anyhow!("Invalid {}: {}", name, e)),
        Err(_) => Ok(default),
    }
}

/// Lifetimes must also fit when added to the current time.
fn minutes(name: &str, value: i64) -> Result<chrono::Duration> {
    chrono::Duration::try_minutes(value)
        .filter(|d| chrono::Utc::now().checked_add_signed(*d).is_some())
        .with_context(|| format!("{} is out of range", name))
}

fn parse_same_site(raw: &str) -> Result<SameSite> {
    match raw.to_ascii_lowercase().as_str() {
        "strict" => Ok(SameSite::Strict),
        "lax" => Ok(SameSite::Lax),
        "none" => Ok(SameSite::None),
        other => bail!("Invalid SESSION_SAME_SITE {:?}", other),
    }
}

fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|origin| !origin.is_empty())
        .map(str::to_string)
        .collect()
}

impl Config {
    /// Creates a new `Config` from environment variables.
    ///
    /// # Returns
    ///
    /// A `Result` containing the `Config`.
    pub fn from_env() -> Result<Self> {
        let is_development = env::var("APP_ENV")
            .unwrap_or_else(|_| "development".to_string())
            == "development";

        let defaults = SessionConfig::default();
        let session = SessionConfig {
            session_name: env::var("SESSION_NAME").unwrap_or(defaults.session_name),
            same_site: match env::var("SESSION_SAME_SITE") {
                Ok(raw) => parse_same_site(&raw)?,
                Err(_) => defaults.same_site,
            },
            session_duration: minutes(
                "SESSION_DURATION_MINUTES",
                var_or("SESSION_DURATION_MINUTES", 30)?,
            )?,
            cleanup_interval: std::time::Duration::from_secs(
                var_or("SESSION_CLEANUP_INTERVAL_MINUTES", 10u64)?
                    .checked_mul(60)
                    .context("SESSION_CLEANUP_INTERVAL_MINUTES is out of range")?,
            ),
            store_timeout: std::time::Duration::from_secs(var_or("SESSION_STORE_TIMEOUT_SECS", 5u64)?),
            csrf_name: env::var("CSRF_NAME").unwrap_or(defaults.csrf_name),
            csrf_duration: minutes("CSRF_DURATION_MINUTES", var_or("CSRF_DURATION_MINUTES", 30)?)?,
            secure_cookies: !is_development,
        };

        if session.session_duration <= chrono::Duration::zero() {
            bail!("SESSION_DURATION_MINUTES must be positive");
        }
        if session.cleanup_interval.is_zero() {
            bail!("SESSION_CLEANUP_INTERVAL_MINUTES must be positive");
        }

        Ok(Self {
            host: env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: var_or("SERVER_PORT", 8888)?,
            shutdown_timeout: std::time::Duration::from_secs(var_or(
                "SERVER_SHUTDOWN_TIMEOUT_SECS",
                10u64,
            )?),
            database_url: env::var("DATABASE_URL").context("DATABASE_URL must be set")?,
            db_pool_max_size: var_or("DB_POOL_MAX_SIZE", 50)?,
            session_backend: var_or("SESSION_STORE", SessionBackend::Postgres)?,
            session,
            cors_allowed_origins: parse_origins(
                &env::var("CORS_ALLOWED_ORIGINS")
                    .unwrap_or_else(|_| "http://localhost:3000".to_string()),
            ),
        })
    }
}
