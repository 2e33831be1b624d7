use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

pub const MIN_SECRET_LEN: usize = 32;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),
    #[error("invalid value for {name}: {reason}")]
    Invalid { name: &'static str, reason: String },
}

#[derive(Clone, Debug)]
pub struct S3Config {
    pub bucket: String,
    pub endpoint: Option<String>,
    pub region: String,
    pub access_key: Option<String>,
    pub secret_key: Option<String>,
}

#[derive(Clone, Debug)]
pub struct AdminSeed {
    pub username: String,
    pub password: String,
}

/// Process configuration, read once at start-up.
#[derive(Clone, Debug)]
pub struct Config {
    pub port: u16,
    pub database_url: Option<String>,
    pub jwt_secret: String,
    pub cookie_key: String,
    pub token_ttl: chrono::Duration,
    pub bcrypt_cost: u32,
    pub files_dir: PathBuf,
    pub static_dir: Option<PathBuf>,
    pub admin: Option<AdminSeed>,
    pub s3: S3Config,
    pub keepalive_interval: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(|k| std::env::var(k).ok())
    }

    /// Builds the config from an arbitrary variable lookup; empty values count as unset.
    pub fn from_vars<F>(get: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |k: &str| get(k).filter(|v| !v.trim().is_empty());

        let jwt_secret = var("JWT_SECRET").ok_or(ConfigError::Missing("JWT_SECRET"))?;
        if jwt_secret.len() < MIN_SECRET_LEN {
            return Err(ConfigError::Invalid {
                name: "JWT_SECRET",
                reason: format!("must be at least {MIN_SECRET_LEN} characters long"),
            });
        }

        let bcrypt_cost: u32 = parse(var("BCRYPT_COST"), "BCRYPT_COST", bcrypt::DEFAULT_COST)?;
        if !(4..=31).contains(&bcrypt_cost) {
            return Err(ConfigError::Invalid { name: "BCRYPT_COST", reason: "must be within 4..=31".into() });
        }

        let ttl_secs: i64 = parse(var("TOKEN_TTL_SECS"), "TOKEN_TTL_SECS", 3600)?;
        if ttl_secs <= 0 {
            return Err(ConfigError::Invalid { name: "TOKEN_TTL_SECS", reason: "must be positive".into() });
        }

        let admin = match (var("ADMIN_USERNAME"), var("ADMIN_PASSWORD")) {
            (Some(username), Some(password)) => Some(AdminSeed { username, password }),
            _ => None,
        };

        Ok(Self {
            port: parse(var("PORT"), "PORT", 3000)?,
            database_url: var("DATABASE_URL"),
            jwt_secret,
            cookie_key: var("COOKIE_KEY").unwrap_or_else(|| "token".into()),
            token_ttl: chrono::Duration::seconds(ttl_secs),
            bcrypt_cost,
            files_dir: var("FILES_DIR").map(PathBuf::from).unwrap_or_else(|| PathBuf::from("uploads")),
            static_dir: var("STATIC_DIR").map(PathBuf::from),
            admin,
            s3: S3Config {
                bucket: var("S3_BUCKET").unwrap_or_else(|| "tortuga-files".into()),
                endpoint: var("S3_ENDPOINT"),
                region: var("S3_REGION").unwrap_or_else(|| "us-east-1".into()),
                access_key: var("S3_ACCESS_KEY"),
                secret_key: var("S3_SECRET_KEY"),
            },
            keepalive_interval: Duration::from_secs(parse(var("KEEPALIVE_INTERVAL_SECS"), "KEEPALIVE_INTERVAL_SECS", 600)?),
        })
    }

    pub fn keepalive_url(&self) -> String {
        format!("http://127.0.0.1:{}/keepalive", self.port)
    }
}

fn parse<T>(raw: Option<String>, name: &'static str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match raw {
        None => Ok(default),
        Some(v) => v
            .trim()
            .parse()
            .map_err(|e: T::Err| ConfigError::Invalid { name, reason: e.to_string() }),
    }
}
