//! Configuration layer: typed settings with layered precedence (file → env → CLI).

use std::{
    num::NonZeroUsize,
    path::PathBuf,
    str::FromStr,
    time::Duration,
};

use clap::{Args, Parser, Subcommand, builder::BoolishValueParser};
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;
use url::Url;

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "pitchside";
const DEFAULT_CHECKOUT_BASE: &str = "http://localhost:3000/";
const DEFAULT_MAX_ENTRIES: u64 = 512;
const DEFAULT_RETRY_ATTEMPTS: u32 = 3;
const DEFAULT_RETRY_BASE_DELAY_MS: u64 = 1_000;
const DEFAULT_RETRY_MAX_DELAY_MS: u64 = 30_000;
const DEFAULT_GC_AFTER_SECS: u64 = 300;
const DEFAULT_JANITOR_INTERVAL_SECS: u64 = 60;
const DEFAULT_NOTIFICATION_POLL_SECS: u64 = 30;
const MAX_RETRY_ATTEMPTS: u32 = 10;

/// Command-line arguments for the Pitchside binary.
#[derive(Debug, Parser)]
#[command(name = "pitchside", version, about = "Pitchside client cache toolkit")]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(long = "config-file", env = "PITCHSIDE_CONFIG_FILE", value_name = "PATH")]
    pub config_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Print the mutation → invalidated reads table.
    Table(TableArgs),
    /// Run a booking session against the in-memory backend.
    Demo(DemoArgs),
}

#[derive(Debug, Args, Default, Clone)]
pub struct TableArgs {
    #[command(flatten)]
    pub logging: LoggingOverrides,
}

#[derive(Debug, Args, Default, Clone)]
pub struct DemoArgs {
    #[command(flatten)]
    pub logging: LoggingOverrides,

    #[command(flatten)]
    pub cache: CacheOverrides,

    /// Override the origin payment redirects return to.
    #[arg(long = "checkout-base-url", value_name = "URL")]
    pub checkout_base_url: Option<String>,
}

#[derive(Debug, Args, Default, Clone)]
pub struct LoggingOverrides {
    /// Override the base log level (trace|debug|info|warn|error).
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Toggle JSON logging.
    #[arg(
        long = "log-json",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub log_json: Option<bool>,
}

#[derive(Debug, Args, Default, Clone)]
pub struct CacheOverrides {
    /// Override the maximum number of cached keys.
    #[arg(long = "cache-max-entries", value_name = "COUNT")]
    pub max_entries: Option<u64>,

    /// Override the number of retries after a transport failure.
    #[arg(long = "cache-retry-attempts", value_name = "COUNT")]
    pub retry_attempts: Option<u32>,

    /// Override the notification poll interval.
    #[arg(long = "cache-notification-poll-seconds", value_name = "SECONDS")]
    pub notification_poll_seconds: Option<u64>,
}

/// Fully-resolved settings after precedence resolution and validation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub logging: LoggingSettings,
    pub cache: CacheSettings,
    pub backend: BackendSettings,
}

#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub level: LevelFilter,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy)]
pub enum LogFormat {
    Json,
    Compact,
}

#[derive(Debug, Clone)]
pub struct CacheSettings {
    pub max_entries: NonZeroUsize,
    pub retry_attempts: u32,
    pub retry_base_delay: Duration,
    pub retry_max_delay: Duration,
    pub gc_after: Duration,
    pub janitor_interval: Duration,
    pub notification_poll_interval: Duration,
}

#[derive(Debug, Clone)]
pub struct BackendSettings {
    /// Origin payment redirects return to.
    pub checkout_base: Url,
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to build configuration: {0}")]
    Build(#[from] config::ConfigError),
    #[error("invalid configuration for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl LoadError {
    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

/// Parse process arguments and load settings for them.
pub fn load_with_cli() -> Result<(CliArgs, Settings), LoadError> {
    let cli = CliArgs::parse();
    let settings = load(&cli)?;
    Ok((cli, settings))
}

/// Load settings using the configured precedence (file → environment → CLI).
pub fn load(cli: &CliArgs) -> Result<Settings, LoadError> {
    let mut builder = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = cli.config_file.as_ref() {
        builder = builder.add_source(File::from(path.as_path()).required(true));
    }

    builder = builder.add_source(Environment::with_prefix("PITCHSIDE").separator("__"));

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;

    match cli.command.as_ref() {
        Some(Command::Table(args)) => raw.apply_logging_overrides(&args.logging),
        Some(Command::Demo(args)) => raw.apply_demo_overrides(args),
        None => raw.apply_demo_overrides(&DemoArgs::default()),
    }

    Settings::from_raw(raw)
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    logging: RawLoggingSettings,
    cache: RawCacheSettings,
    backend: RawBackendSettings,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawCacheSettings {
    max_entries: Option<u64>,
    retry_attempts: Option<u32>,
    retry_base_delay_ms: Option<u64>,
    retry_max_delay_ms: Option<u64>,
    gc_after_seconds: Option<u64>,
    janitor_interval_seconds: Option<u64>,
    notification_poll_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawBackendSettings {
    checkout_base_url: Option<String>,
}

impl RawSettings {
    fn apply_logging_overrides(&mut self, overrides: &LoggingOverrides) {
        if let Some(level) = overrides.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
        if let Some(json) = overrides.log_json {
            self.logging.json = Some(json);
        }
    }

    fn apply_demo_overrides(&mut self, args: &DemoArgs) {
        self.apply_logging_overrides(&args.logging);
        if let Some(max) = args.cache.max_entries {
            self.cache.max_entries = Some(max);
        }
        if let Some(attempts) = args.cache.retry_attempts {
            self.cache.retry_attempts = Some(attempts);
        }
        if let Some(seconds) = args.cache.notification_poll_seconds {
            self.cache.notification_poll_seconds = Some(seconds);
        }
        if let Some(url) = args.checkout_base_url.as_ref() {
            self.backend.checkout_base_url = Some(url.clone());
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            logging,
            cache,
            backend,
        } = raw;

        Ok(Self {
            logging: build_logging_settings(logging)?,
            cache: build_cache_settings(cache)?,
            backend: build_backend_settings(backend)?,
        })
    }
}

fn build_logging_settings(logging: RawLoggingSettings) -> Result<LoggingSettings, LoadError> {
    let level = match logging.level {
        Some(level) => LevelFilter::from_str(level.as_str()).map_err(|err| {
            LoadError::invalid("logging.level", format!("failed to parse: {err}"))
        })?,
        None => LevelFilter::INFO,
    };

    let format = if logging.json.unwrap_or(false) {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };

    Ok(LoggingSettings { level, format })
}

fn build_cache_settings(cache: RawCacheSettings) -> Result<CacheSettings, LoadError> {
    let max_entries = non_zero_usize(
        cache.max_entries.unwrap_or(DEFAULT_MAX_ENTRIES),
        "cache.max_entries",
    )?;

    let retry_attempts = cache.retry_attempts.unwrap_or(DEFAULT_RETRY_ATTEMPTS);
    if retry_attempts > MAX_RETRY_ATTEMPTS {
        return Err(LoadError::invalid(
            "cache.retry_attempts",
            format!("must be at most {MAX_RETRY_ATTEMPTS}"),
        ));
    }

    let retry_base_delay = Duration::from_millis(
        cache
            .retry_base_delay_ms
            .unwrap_or(DEFAULT_RETRY_BASE_DELAY_MS),
    );
    let retry_max_delay = Duration::from_millis(
        cache
            .retry_max_delay_ms
            .unwrap_or(DEFAULT_RETRY_MAX_DELAY_MS),
    );
    if retry_max_delay < retry_base_delay {
        return Err(LoadError::invalid(
            "cache.retry_max_delay_ms",
            "must not be smaller than cache.retry_base_delay_ms",
        ));
    }

    Ok(CacheSettings {
        max_entries,
        retry_attempts,
        retry_base_delay,
        retry_max_delay,
        gc_after: positive_secs(
            cache.gc_after_seconds.unwrap_or(DEFAULT_GC_AFTER_SECS),
            "cache.gc_after_seconds",
        )?,
        janitor_interval: positive_secs(
            cache
                .janitor_interval_seconds
                .unwrap_or(DEFAULT_JANITOR_INTERVAL_SECS),
            "cache.janitor_interval_seconds",
        )?,
        notification_poll_interval: positive_secs(
            cache
                .notification_poll_seconds
                .unwrap_or(DEFAULT_NOTIFICATION_POLL_SECS),
            "cache.notification_poll_seconds",
        )?,
    })
}

fn build_backend_settings(backend: RawBackendSettings) -> Result<BackendSettings, LoadError> {
    let raw = backend
        .checkout_base_url
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .unwrap_or_else(|| DEFAULT_CHECKOUT_BASE.to_string());

    let checkout_base = Url::parse(&raw).map_err(|err| {
        LoadError::invalid("backend.checkout_base_url", format!("failed to parse: {err}"))
    })?;
    if !matches!(checkout_base.scheme(), "http" | "https") {
        return Err(LoadError::invalid(
            "backend.checkout_base_url",
            "scheme must be http or https",
        ));
    }

    Ok(BackendSettings { checkout_base })
}

fn non_zero_usize(value: u64, key: &'static str) -> Result<NonZeroUsize, LoadError> {
    let value = usize::try_from(value)
        .map_err(|_| LoadError::invalid(key, "value exceeds supported range for usize"))?;
    NonZeroUsize::new(value).ok_or_else(|| LoadError::invalid(key, "must be greater than zero"))
}

fn positive_secs(seconds: u64, key: &'static str) -> Result<Duration, LoadError> {
    if seconds == 0 {
        return Err(LoadError::invalid(key, "must be greater than zero"));
    }
    Ok(Duration::from_secs(seconds))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let settings = Settings::from_raw(RawSettings::default()).expect("valid settings");

        assert_eq!(settings.logging.level, LevelFilter::INFO);
        assert!(matches!(settings.logging.format, LogFormat::Compact));
        assert_eq!(settings.cache.max_entries.get(), 512);
        assert_eq!(settings.cache.retry_attempts, 3);
        assert_eq!(settings.cache.notification_poll_interval, Duration::from_secs(30));
        assert_eq!(settings.backend.checkout_base.as_str(), DEFAULT_CHECKOUT_BASE);
    }

    #[test]
    fn cli_overrides_take_highest_precedence() {
        let mut raw = RawSettings::default();
        raw.cache.max_entries = Some(64);
        raw.logging.level = Some("info".to_string());

        let args = DemoArgs {
            logging: LoggingOverrides {
                log_level: Some("debug".to_string()),
                log_json: Some(true),
            },
            cache: CacheOverrides {
                max_entries: Some(32),
                ..Default::default()
            },
            checkout_base_url: Some("https://club.example/app".to_string()),
        };

        raw.apply_demo_overrides(&args);
        let settings = Settings::from_raw(raw).expect("valid settings");

        assert_eq!(settings.cache.max_entries.get(), 32);
        assert_eq!(settings.logging.level, LevelFilter::DEBUG);
        assert!(matches!(settings.logging.format, LogFormat::Json));
        assert_eq!(
            settings.backend.checkout_base.as_str(),
            "https://club.example/app"
        );
    }

    #[test]
    fn zero_sizes_are_rejected() {
        let mut raw = RawSettings::default();
        raw.cache.max_entries = Some(0);

        let err = Settings::from_raw(raw).unwrap_err();
        assert!(matches!(
            err,
            LoadError::Invalid {
                key: "cache.max_entries",
                ..
            }
        ));

        let mut raw = RawSettings::default();
        raw.cache.janitor_interval_seconds = Some(0);
        assert!(Settings::from_raw(raw).is_err());
    }

    #[test]
    fn retry_bounds_are_checked() {
        let mut raw = RawSettings::default();
        raw.cache.retry_base_delay_ms = Some(5_000);
        raw.cache.retry_max_delay_ms = Some(1_000);
        assert!(Settings::from_raw(raw).is_err());

        let mut raw = RawSettings::default();
        raw.cache.retry_attempts = Some(MAX_RETRY_ATTEMPTS + 1);
        assert!(Settings::from_raw(raw).is_err());
    }

    #[test]
    fn checkout_base_must_be_http() {
        let mut raw = RawSettings::default();
        raw.backend.checkout_base_url = Some("ftp://club.example".to_string());
        assert!(Settings::from_raw(raw).is_err());

        let mut raw = RawSettings::default();
        raw.backend.checkout_base_url = Some("not a url".to_string());
        assert!(Settings::from_raw(raw).is_err());
    }

    #[test]
    fn invalid_log_level_is_reported() {
        let mut raw = RawSettings::default();
        raw.logging.level = Some("loud".to_string());

        let err = Settings::from_raw(raw).unwrap_err();
        assert!(err.to_string().contains("logging.level"));
    }

    #[test]
    fn table_applies_logging_only() {
        let mut raw = RawSettings::default();
        raw.apply_logging_overrides(&LoggingOverrides {
            log_level: Some("warn".to_string()),
            log_json: None,
        });

        let settings = Settings::from_raw(raw).expect("valid settings");
        assert_eq!(settings.logging.level, LevelFilter::WARN);
    }

    #[test]
    fn parse_demo_arguments() {
        let args = CliArgs::parse_from([
            "pitchside",
            "demo",
            "--cache-max-entries",
            "16",
            "--checkout-base-url",
            "https://club.example/",
            "--log-json",
            "true",
        ]);

        match args.command.expect("demo command") {
            Command::Demo(demo) => {
                assert_eq!(demo.cache.max_entries, Some(16));
                assert_eq!(
                    demo.checkout_base_url.as_deref(),
                    Some("https://club.example/")
                );
                assert_eq!(demo.logging.log_json, Some(true));
            }
            _ => panic!("wrong command parsed"),
        }
    }

    #[test]
    fn parse_table_arguments() {
        let args = CliArgs::parse_from(["pitchside", "table", "--log-level", "debug"]);

        match args.command.expect("table command") {
            Command::Table(table) => {
                assert_eq!(table.logging.log_level.as_deref(), Some("debug"));
            }
            _ => panic!("wrong command parsed"),
        }
    }
}
