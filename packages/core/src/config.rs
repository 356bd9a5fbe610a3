//! Startup configuration.
//!
//! Each setting is taken from its CLI flag, then its environment variable
//! (which may come from a `.env` file), then its default. Empty values count
//! as absent. Everything is validated here, before the monitor starts.

use std::env;
use std::fmt;
use std::fs::{self, OpenOptions};
use std::io;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use reqwest::Url;
use thiserror::Error;

use crate::cli::Cli;
use crate::monitor::policy::DEFAULT_MAX_RETRIES;
use crate::monitor::{FailurePolicy, FileSink, Minimum, MonitorSettings};
use crate::services::stripe::{DEFAULT_API_URL, DEFAULT_EVENT_LIMIT};
use crate::services::{TransportAddress, TransportError};

pub const DEFAULT_POLL_MINUTES: u64 = 30;
pub const DEFAULT_CLIENT_ID: &str = "stripe-watch";
pub const MAX_EVENT_LIMIT: u32 = 100;

const SKIP_DOTENV: &str = "STRIPE_WATCH_SKIP_DOTENV";

const MIN: &str = "STRIPE_WATCH_MIN";
const LOG_FILE: &str = "STRIPE_WATCH_LOG_FILE";
const MINUTES: &str = "STRIPE_WATCH_MINUTES";
const KEY_FILE: &str = "STRIPE_WATCH_KEY_FILE";
const BROKER: &str = "STRIPE_WATCH_BROKER";
const API_URL: &str = "STRIPE_API_URL";
const EVENT_LIMIT: &str = "STRIPE_WATCH_EVENT_LIMIT";
const CLIENT_ID: &str = "STRIPE_WATCH_CLIENT_ID";
const ON_FAILURE: &str = "STRIPE_WATCH_ON_FAILURE";
const MAX_RETRIES: &str = "STRIPE_WATCH_MAX_RETRIES";
const METRICS_ADDR: &str = "STRIPE_WATCH_METRICS_ADDR";

#[derive(Clone)]
pub struct Config {
    pub minimum: Option<Minimum>,
    pub log_file: Option<PathBuf>,
    pub poll_interval: Duration,
    pub api_key: String,
    pub broker: TransportAddress,
    pub stripe_api_url: String,
    pub event_limit: u32,
    pub client_id: String,
    pub failure_policy: FailurePolicy,
    pub metrics_addr: Option<SocketAddr>,
}

/// Errors emitted when a setting is missing or fails validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required setting `{key}`")]
    MissingVar { key: &'static str },
    #[error("invalid value for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
    #[error("cannot read key file {}: {source}", path.display())]
    KeyFile {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("key file {} is empty", path.display())]
    EmptyKeyFile { path: PathBuf },
    #[error("log file {} is not writable: {source}", path.display())]
    LogFile {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("invalid broker address: {source}")]
    Broker {
        #[source]
        source: TransportError,
    },
    #[error("failed to load .env file: {source}")]
    Dotenv {
        #[from]
        source: dotenvy::Error,
    },
}

impl ConfigError {
    fn invalid(key: &'static str, reason: impl fmt::Display) -> Self {
        ConfigError::Invalid {
            key,
            reason: reason.to_string(),
        }
    }
}

impl Config {
    /// Hydrate `.env`, then resolve against the process environment.
    pub fn resolve(cli: &Cli) -> Result<Self, ConfigError> {
        hydrate_env_file()?;
        Self::from_sources(cli, |key| env::var(key).ok())
    }

    /// Resolve against `cli` and an arbitrary variable lookup.
    pub fn from_sources<F>(cli: &Cli, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let vars = Vars { lookup };

        let minimum = match vars.pick(cli.min, MIN)? {
            Some(value) => Some(
                Minimum::new(value)
                    .ok_or_else(|| ConfigError::invalid(MIN, "must be a number >= 0"))?,
            ),
            None => None,
        };

        let log_file = vars.pick_path(cli.log_file.as_deref(), LOG_FILE);
        if let Some(path) = &log_file {
            check_writable(path)?;
        }

        let minutes = vars.pick(cli.minutes, MINUTES)?.unwrap_or(DEFAULT_POLL_MINUTES);
        if minutes == 0 {
            return Err(ConfigError::invalid(MINUTES, "must be at least 1"));
        }
        let poll_interval = minutes
            .checked_mul(60)
            .map(Duration::from_secs)
            .ok_or_else(|| ConfigError::invalid(MINUTES, "is too large"))?;

        let key_file = vars
            .pick_path(cli.stripe_key_file.as_deref(), KEY_FILE)
            .ok_or(ConfigError::MissingVar { key: KEY_FILE })?;
        let api_key = read_key_file(&key_file)?;

        let broker = vars
            .pick_str(cli.broker.as_deref(), BROKER)
            .ok_or(ConfigError::MissingVar { key: BROKER })?;
        let broker =
            TransportAddress::parse(&broker).map_err(|source| ConfigError::Broker { source })?;

        let stripe_api_url = vars
            .pick_str(cli.stripe_api_url.as_deref(), API_URL)
            .unwrap_or_else(|| DEFAULT_API_URL.to_string());
        match Url::parse(&stripe_api_url) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => {}
            Ok(url) => {
                return Err(ConfigError::invalid(
                    API_URL,
                    format!("unsupported scheme `{}`", url.scheme()),
                ))
            }
            Err(err) => return Err(ConfigError::invalid(API_URL, err)),
        }

        let event_limit = vars
            .pick(cli.event_limit, EVENT_LIMIT)?
            .unwrap_or(DEFAULT_EVENT_LIMIT);
        if !(1..=MAX_EVENT_LIMIT).contains(&event_limit) {
            return Err(ConfigError::invalid(
                EVENT_LIMIT,
                format!("must be between 1 and {}", MAX_EVENT_LIMIT),
            ));
        }

        let client_id = vars
            .pick_str(cli.client_id.as_deref(), CLIENT_ID)
            .unwrap_or_else(|| DEFAULT_CLIENT_ID.to_string());

        let failure_policy = vars.pick(cli.on_failure, ON_FAILURE)?.unwrap_or_default();
        let failure_policy = match failure_policy {
            FailurePolicy::Retry { base_delay, .. } => FailurePolicy::Retry {
                max_retries: vars
                    .pick(cli.max_retries, MAX_RETRIES)?
                    .unwrap_or(DEFAULT_MAX_RETRIES),
                base_delay,
            },
            other => other,
        };

        let metrics_addr = vars.pick(cli.metrics_addr, METRICS_ADDR)?;

        Ok(Self {
            minimum,
            log_file,
            poll_interval,
            api_key,
            broker,
            stripe_api_url,
            event_limit,
            client_id,
            failure_policy,
            metrics_addr,
        })
    }

    pub fn monitor_settings(&self) -> MonitorSettings {
        MonitorSettings {
            minimum: self.minimum,
            poll_interval: self.poll_interval,
            failure_policy: self.failure_policy,
        }
    }

    pub fn sink(&self) -> Option<FileSink> {
        self.log_file.as_ref().map(FileSink::new)
    }
}

// Never print the API key.
impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("minimum", &self.minimum.map(|m| m.value()))
            .field("log_file", &self.log_file)
            .field("poll_interval", &self.poll_interval)
            .field("broker", &self.broker)
            .field("stripe_api_url", &self.stripe_api_url)
            .field("event_limit", &self.event_limit)
            .field("client_id", &self.client_id)
            .field("failure_policy", &self.failure_policy)
            .field("metrics_addr", &self.metrics_addr)
            .finish_non_exhaustive()
    }
}

/// Flag-then-variable lookup with blank values treated as absent.
struct Vars<F> {
    lookup: F,
}

impl<F> Vars<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn var(&self, key: &'static str) -> Option<String> {
        (self.lookup)(key).and_then(|value| non_blank(&value))
    }

    fn pick<T>(&self, flag: Option<T>, key: &'static str) -> Result<Option<T>, ConfigError>
    where
        T: FromStr,
        T::Err: fmt::Display,
    {
        if flag.is_some() {
            return Ok(flag);
        }
        self.var(key)
            .map(|raw| raw.parse().map_err(|err| ConfigError::invalid(key, err)))
            .transpose()
    }

    fn pick_str(&self, flag: Option<&str>, key: &'static str) -> Option<String> {
        flag.and_then(non_blank).or_else(|| self.var(key))
    }

    fn pick_path(&self, flag: Option<&Path>, key: &'static str) -> Option<PathBuf> {
        flag.filter(|path| !path.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .or_else(|| self.var(key).map(PathBuf::from))
    }
}

fn non_blank(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn read_key_file(path: &Path) -> Result<String, ConfigError> {
    let raw = fs::read_to_string(path).map_err(|source| ConfigError::KeyFile {
        path: path.to_path_buf(),
        source,
    })?;
    non_blank(&raw).ok_or_else(|| ConfigError::EmptyKeyFile {
        path: path.to_path_buf(),
    })
}

fn check_writable(path: &Path) -> Result<(), ConfigError> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map(drop)
        .map_err(|source| ConfigError::LogFile {
            path: path.to_path_buf(),
            source,
        })
}

/// Load `.env` if present. Existing process variables are left untouched.
pub fn hydrate_env_file() -> Result<(), ConfigError> {
    if env::var_os(SKIP_DOTENV).is_some() {
        return Ok(());
    }
    match dotenvy::dotenv() {
        Ok(_) => {}
        Err(dotenvy::Error::Io(err)) if err.kind() == io::ErrorKind::NotFound => {}
        Err(err) => return Err(ConfigError::Dotenv { source: err }),
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;
    use std::sync::Mutex;

    use tempfile::{NamedTempFile, TempDir};

    static ENV_GUARD: Mutex<()> = Mutex::new(());

    fn key_file(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{}", contents).unwrap();
        file
    }

    fn base_cli(key: &NamedTempFile) -> Cli {
        Cli {
            stripe_key_file: Some(key.path().to_path_buf()),
            broker: Some("mqtt://localhost".to_string()),
            ..Cli::default()
        }
    }

    fn resolve(cli: &Cli, vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_sources(cli, |key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_apply_when_only_required_settings_are_given() {
        let key = key_file("sk_test_123\n");
        let config = resolve(&base_cli(&key), &[]).unwrap();

        assert_eq!(config.api_key, "sk_test_123");
        assert!(config.minimum.is_none());
        assert!(config.log_file.is_none());
        assert_eq!(config.poll_interval, Duration::from_secs(30 * 60));
        assert_eq!(config.broker.port(), 1883);
        assert_eq!(config.stripe_api_url, DEFAULT_API_URL);
        assert_eq!(config.event_limit, 10);
        assert_eq!(config.client_id, "stripe-watch");
        assert_eq!(config.failure_policy, FailurePolicy::Crash);
        assert!(config.metrics_addr.is_none());
    }

    #[test]
    fn flags_take_precedence_over_variables() {
        let key = key_file("sk");
        let cli = Cli {
            min: Some(500.0),
            minutes: Some(5),
            ..base_cli(&key)
        };

        let config = resolve(&cli, &[(MIN, "10"), (MINUTES, "60")]).unwrap();

        assert_eq!(config.minimum.map(|m| m.value()), Some(500.0));
        assert_eq!(config.poll_interval, Duration::from_secs(5 * 60));
    }

    #[test]
    fn variables_fill_in_missing_flags() {
        let key = key_file("sk");
        let cli = Cli {
            broker: None,
            ..base_cli(&key)
        };

        let config = resolve(
            &cli,
            &[
                (MIN, "2500.5"),
                (BROKER, "mqtts://user:pw@broker.example.com"),
                (ON_FAILURE, "retry"),
                (MAX_RETRIES, "9"),
                (METRICS_ADDR, "0.0.0.0:9100"),
            ],
        )
        .unwrap();

        assert_eq!(config.minimum.map(|m| m.value()), Some(2500.5));
        assert!(config.broker.is_tls());
        assert_eq!(config.broker.port(), 8883);
        assert!(matches!(
            config.failure_policy,
            FailurePolicy::Retry { max_retries: 9, .. }
        ));
        assert_eq!(config.metrics_addr, Some("0.0.0.0:9100".parse().unwrap()));
    }

    #[test]
    fn blank_values_count_as_absent() {
        let key = key_file("sk");
        let config = resolve(&base_cli(&key), &[(MIN, "   "), (MINUTES, "")]).unwrap();

        assert!(config.minimum.is_none());
        assert_eq!(config.poll_interval, Duration::from_secs(30 * 60));
    }

    #[test]
    fn negative_or_non_numeric_minimum_is_rejected() {
        let key = key_file("sk");

        let err = resolve(&base_cli(&key), &[(MIN, "-1")]).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: MIN, .. }));

        let err = resolve(&base_cli(&key), &[(MIN, "lots")]).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: MIN, .. }));
    }

    #[test]
    fn zero_minute_interval_is_rejected() {
        let key = key_file("sk");
        let err = resolve(&base_cli(&key), &[(MINUTES, "0")]).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: MINUTES, .. }));
    }

    #[test]
    fn event_limit_must_be_within_page_bounds() {
        let key = key_file("sk");
        assert!(resolve(&base_cli(&key), &[(EVENT_LIMIT, "0")]).is_err());
        assert!(resolve(&base_cli(&key), &[(EVENT_LIMIT, "101")]).is_err());
        assert_eq!(
            resolve(&base_cli(&key), &[(EVENT_LIMIT, "100")])
                .unwrap()
                .event_limit,
            100
        );
    }

    #[test]
    fn missing_key_file_setting_is_reported() {
        let cli = Cli {
            broker: Some("mqtt://localhost".to_string()),
            ..Cli::default()
        };
        let err = resolve(&cli, &[]).unwrap_err();
        assert!(matches!(err, ConfigError::MissingVar { key: KEY_FILE }));
    }

    #[test]
    fn empty_key_file_is_rejected() {
        let key = key_file("  \n");
        let err = resolve(&base_cli(&key), &[]).unwrap_err();
        assert!(matches!(err, ConfigError::EmptyKeyFile { .. }));
    }

    #[test]
    fn unreadable_key_file_is_rejected() {
        let dir = TempDir::new().unwrap();
        let cli = Cli {
            stripe_key_file: Some(dir.path().join("missing")),
            broker: Some("mqtt://localhost".to_string()),
            ..Cli::default()
        };
        assert!(matches!(
            resolve(&cli, &[]).unwrap_err(),
            ConfigError::KeyFile { .. }
        ));
    }

    #[test]
    fn missing_or_malformed_broker_is_rejected() {
        let key = key_file("sk");

        let cli = Cli {
            broker: None,
            ..base_cli(&key)
        };
        assert!(matches!(
            resolve(&cli, &[]).unwrap_err(),
            ConfigError::MissingVar { key: BROKER }
        ));

        let cli = Cli {
            broker: Some("amqp://localhost".to_string()),
            ..base_cli(&key)
        };
        assert!(matches!(
            resolve(&cli, &[]).unwrap_err(),
            ConfigError::Broker { .. }
        ));
    }

    #[test]
    fn log_file_is_created_at_startup() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("alerts.log");
        let key = key_file("sk");
        let cli = Cli {
            log_file: Some(path.clone()),
            ..base_cli(&key)
        };

        let config = resolve(&cli, &[]).unwrap();

        assert!(path.exists());
        assert_eq!(config.sink().unwrap().path(), path.as_path());
    }

    #[test]
    fn unwritable_log_file_is_rejected() {
        let dir = TempDir::new().unwrap();
        let key = key_file("sk");
        let cli = Cli {
            log_file: Some(dir.path().join("no-such-dir").join("alerts.log")),
            ..base_cli(&key)
        };

        assert!(matches!(
            resolve(&cli, &[]).unwrap_err(),
            ConfigError::LogFile { .. }
        ));
    }

    #[test]
    fn non_http_api_url_is_rejected() {
        let key = key_file("sk");
        let err = resolve(&base_cli(&key), &[(API_URL, "ftp://stripe")]).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: API_URL, .. }));
    }

    #[test]
    fn debug_output_hides_api_key() {
        let key = key_file("sk_live_secret");
        let config = resolve(&base_cli(&key), &[]).unwrap();
        assert!(!format!("{:?}", config).contains("sk_live_secret"));
    }

    #[test]
    fn resolve_reads_process_environment() {
        let _guard = ENV_GUARD.lock().unwrap();
        let key = key_file("sk");
        env::set_var(SKIP_DOTENV, "1");
        env::set_var(MINUTES, "7");

        let config = Config::resolve(&base_cli(&key));

        env::remove_var(MINUTES);
        assert_eq!(config.unwrap().poll_interval, Duration::from_secs(7 * 60));
    }
}
