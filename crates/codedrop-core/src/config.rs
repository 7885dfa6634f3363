//! Configuration module
//!
//! Configuration is read from the environment (optionally seeded from a `.env`
//! file) and validated once at startup. The exchange limits (`ttl`, maximum upload
//! size, code length and alphabet) live in [`ExchangeConfig`] so the service
//! enforces whatever the deployment configured rather than hard-coded values.

use std::env;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use crate::code_format::CodeFormat;
use crate::constants::{
    DEFAULT_CODE_ALPHABET, DEFAULT_CODE_LENGTH, DEFAULT_CODE_MAX_ATTEMPTS,
    DEFAULT_MAX_UPLOAD_SIZE_MB, DEFAULT_REAPER_INTERVAL_SECS, DEFAULT_TTL_HOURS, MAX_TTL_HOURS,
};
use crate::storage_types::StorageBackend;

const SERVER_PORT: u16 = 8080;
const MAX_CONCURRENT_REQUESTS: usize = 512;
const LOCAL_STORAGE_PATH: &str = "uploads";
const BYTES_PER_MB: u64 = 1024 * 1024;

/// Log output format for the tracing subscriber
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

impl FromStr for LogFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pretty" | "text" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            _ => Err(anyhow::anyhow!("Invalid log format: {}", s)),
        }
    }
}

/// Server-level settings
#[derive(Clone, Debug)]
pub struct BaseConfig {
    pub server_port: u16,
    pub cors_origins: Vec<String>,
    pub environment: String,
    pub log_format: LogFormat,
    pub max_concurrent_requests: usize,
}

/// Limits and code rules enforced by the exchange service
#[derive(Clone, Debug)]
pub struct ExchangeConfig {
    /// How long an upload stays retrievable.
    pub ttl: Duration,
    /// Largest accepted payload in bytes.
    pub max_size_bytes: u64,
    pub code_length: usize,
    pub code_alphabet: String,
    /// Codes tried per upload before giving up with `CodeSpaceExhausted`.
    pub code_max_attempts: u32,
}

impl ExchangeConfig {
    pub fn code_format(&self) -> Result<CodeFormat, anyhow::Error> {
        CodeFormat::new(self.code_length, &self.code_alphabet)
    }

    pub fn ttl_chrono(&self) -> chrono::Duration {
        chrono::Duration::from_std(self.ttl).unwrap_or(chrono::Duration::MAX)
    }

    pub fn max_size_mb(&self) -> u64 {
        self.max_size_bytes / BYTES_PER_MB
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.ttl.is_zero() {
            return Err(anyhow::anyhow!("FILE_TTL_HOURS must be greater than zero"));
        }
        if self.ttl > Duration::from_secs(MAX_TTL_HOURS * 3600) {
            return Err(anyhow::anyhow!(
                "FILE_TTL_HOURS must be at most {} (got {})",
                MAX_TTL_HOURS,
                self.ttl.as_secs() / 3600
            ));
        }
        if self.max_size_bytes == 0 {
            return Err(anyhow::anyhow!(
                "MAX_UPLOAD_SIZE_MB must be greater than zero"
            ));
        }
        if self.code_max_attempts == 0 {
            return Err(anyhow::anyhow!(
                "CODE_MAX_ATTEMPTS must be greater than zero"
            ));
        }
        self.code_format()?;
        Ok(())
    }
}

impl Default for ExchangeConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(DEFAULT_TTL_HOURS * 3600),
            max_size_bytes: DEFAULT_MAX_UPLOAD_SIZE_MB * BYTES_PER_MB,
            code_length: DEFAULT_CODE_LENGTH,
            code_alphabet: DEFAULT_CODE_ALPHABET.to_string(),
            code_max_attempts: DEFAULT_CODE_MAX_ATTEMPTS,
        }
    }
}

/// Full service configuration
#[derive(Clone, Debug)]
pub struct ExchangeServiceConfig {
    pub base: BaseConfig,
    pub exchange: ExchangeConfig,
    pub storage_backend: StorageBackend,
    pub local_storage_path: PathBuf,
    pub reaper_interval: Duration,
}

/// Application configuration.
#[derive(Clone, Debug)]
pub struct Config(pub Box<ExchangeServiceConfig>);

impl Config {
    pub fn new(config: ExchangeServiceConfig) -> Self {
        Config(Box::new(config))
    }

    fn inner(&self) -> &ExchangeServiceConfig {
        &self.0
    }

    /// Check if the application is running in production mode
    pub fn is_production(&self) -> bool {
        is_production_env(&self.inner().base.environment)
    }

    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup (the environment in production).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, anyhow::Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        let environment = lookup("ENVIRONMENT")
            .or_else(|| lookup("APP_ENV"))
            .unwrap_or_else(|| "development".to_string());

        let cors_origins_str = lookup("CORS_ORIGINS").unwrap_or_else(|| "*".to_string());
        if is_production_env(&environment) && cors_origins_str.trim() == "*" {
            return Err(anyhow::anyhow!(
                "CORS_ORIGINS cannot be '*' in production. Please specify explicit origins."
            ));
        }
        let cors_origins: Vec<String> = cors_origins_str
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let base = BaseConfig {
            server_port: parse_or(&lookup, "PORT", SERVER_PORT)?,
            cors_origins,
            environment,
            log_format: parse_or(&lookup, "LOG_FORMAT", LogFormat::Pretty)?,
            max_concurrent_requests: parse_or(
                &lookup,
                "MAX_CONCURRENT_REQUESTS",
                MAX_CONCURRENT_REQUESTS,
            )?,
        };

        let ttl_hours: u64 = parse_or(&lookup, "FILE_TTL_HOURS", DEFAULT_TTL_HOURS)?;
        let max_upload_size_mb: u64 =
            parse_or(&lookup, "MAX_UPLOAD_SIZE_MB", DEFAULT_MAX_UPLOAD_SIZE_MB)?;

        let exchange = ExchangeConfig {
            ttl: Duration::from_secs(ttl_hours.saturating_mul(3600)),
            max_size_bytes: max_upload_size_mb.saturating_mul(BYTES_PER_MB),
            code_length: parse_or(&lookup, "CODE_LENGTH", DEFAULT_CODE_LENGTH)?,
            code_alphabet: lookup("CODE_ALPHABET")
                .map(|s| s.trim().to_string())
                .unwrap_or_else(|| DEFAULT_CODE_ALPHABET.to_string()),
            code_max_attempts: parse_or(&lookup, "CODE_MAX_ATTEMPTS", DEFAULT_CODE_MAX_ATTEMPTS)?,
        };

        let config = ExchangeServiceConfig {
            base,
            exchange,
            storage_backend: parse_or(&lookup, "STORAGE_BACKEND", StorageBackend::Local)?,
            local_storage_path: lookup("LOCAL_STORAGE_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(LOCAL_STORAGE_PATH)),
            reaper_interval: Duration::from_secs(parse_or(
                &lookup,
                "REAPER_INTERVAL_SECS",
                DEFAULT_REAPER_INTERVAL_SECS,
            )?),
        };

        Ok(Config::new(config))
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        let inner = self.inner();
        inner.exchange.validate()?;

        if inner.reaper_interval.is_zero() {
            return Err(anyhow::anyhow!(
                "REAPER_INTERVAL_SECS must be greater than zero"
            ));
        }
        // The reaper must run at least once per TTL window.
        if inner.reaper_interval >= inner.exchange.ttl {
            return Err(anyhow::anyhow!(
                "REAPER_INTERVAL_SECS ({}s) must be shorter than the file TTL ({}s)",
                inner.reaper_interval.as_secs(),
                inner.exchange.ttl.as_secs()
            ));
        }
        if inner.base.max_concurrent_requests == 0 {
            return Err(anyhow::anyhow!(
                "MAX_CONCURRENT_REQUESTS must be greater than zero"
            ));
        }
        if inner.storage_backend == StorageBackend::Local
            && inner.local_storage_path.as_os_str().is_empty()
        {
            return Err(anyhow::anyhow!(
                "LOCAL_STORAGE_PATH must be set when using local storage backend"
            ));
        }

        Ok(())
    }

    // Convenience getters for common fields
    pub fn server_port(&self) -> u16 {
        self.inner().base.server_port
    }

    pub fn cors_origins(&self) -> &[String] {
        &self.inner().base.cors_origins
    }

    pub fn environment(&self) -> &str {
        &self.inner().base.environment
    }

    pub fn log_format(&self) -> LogFormat {
        self.inner().base.log_format
    }

    pub fn max_concurrent_requests(&self) -> usize {
        self.inner().base.max_concurrent_requests
    }

    pub fn exchange(&self) -> &ExchangeConfig {
        &self.inner().exchange
    }

    pub fn ttl(&self) -> Duration {
        self.inner().exchange.ttl
    }

    pub fn max_upload_size_bytes(&self) -> u64 {
        self.inner().exchange.max_size_bytes
    }

    pub fn storage_backend(&self) -> StorageBackend {
        self.inner().storage_backend
    }

    pub fn local_storage_path(&self) -> &Path {
        &self.inner().local_storage_path
    }

    pub fn reaper_interval(&self) -> Duration {
        self.inner().reaper_interval
    }
}

fn is_production_env(environment: &str) -> bool {
    let env = environment.to_lowercase();
    env == "production" || env == "prod"
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T, anyhow::Error>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map_err(|e| anyhow::anyhow!("{} has an invalid value {:?}: {}", key, raw, e)),
        _ => Ok(default),
    }
}
