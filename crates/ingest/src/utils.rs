use anyhow::{anyhow, Context, Error};
use clap::{Parser, ValueEnum};
use serde::Deserialize;
use slog::{o, Drain, Level, Logger};
use std::{env, fs, path::Path, sync::Arc, time::Duration};
use time::{macros::format_description, Date, UtcOffset};
use weatherbit_ingest_core::{
    find_config_file, load_config, ConfigSource, DEFAULT_FORECAST_HOURS,
    DEFAULT_REFERENCE_OFFSET, DEFAULT_REQUEST_DELAY_MS, MAX_FORECAST_HOURS,
};

use crate::{
    parse_utc_offset, ClientSettings, LocalStorage, PartitionStorage, DEFAULT_BASE_URL,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Pipeline {
    #[default]
    Forecast,
    History,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageMode {
    #[default]
    Local,
    #[value(alias = "aws")]
    #[serde(alias = "aws")]
    S3,
}

#[derive(Parser, Clone, Debug, Deserialize, Default)]
#[command(
    author,
    version,
    about = "Weatherbit ingest - appends hourly forecasts and history to partitioned CSV files"
)]
pub struct Cli {
    /// Path to config file (TOML format)
    /// Searched in order: this flag, $WEATHERBIT_INGEST_CONFIG, ./ingest.toml,
    /// $XDG_CONFIG_HOME/weatherbit-ingest/ingest.toml, /etc/weatherbit-ingest/ingest.toml
    #[arg(short, long)]
    #[serde(skip)]
    pub config: Option<String>,

    /// Log level: trace, debug, info, warn, error
    #[arg(short, long, env = "WEATHERBIT_INGEST_LEVEL")]
    pub level: Option<String>,

    /// Which job to run
    #[arg(short, long, value_enum, env = "WEATHERBIT_INGEST_PIPELINE")]
    pub pipeline: Option<Pipeline>,

    /// JSON event listing the locations to ingest
    #[arg(short, long, env = "WEATHERBIT_INGEST_EVENT")]
    pub event: Option<String>,

    /// History target date (YYYY-MM-DD), overrides the event's date
    #[arg(short, long, env = "WEATHERBIT_INGEST_DATE")]
    pub date: Option<String>,

    /// Weatherbit API key
    #[arg(long, env = "WEATHERBIT_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// File holding the API key, used when no key is given directly
    #[arg(long, env = "WEATHERBIT_API_KEY_FILE")]
    pub api_key_file: Option<String>,

    /// Weatherbit API base URL
    #[arg(short, long, env = "WEATHERBIT_BASE_URL")]
    pub base_url: Option<String>,

    /// Storage backend: local or s3
    #[arg(short, long, value_enum, env = "EXECUTION_MODE")]
    pub storage: Option<StorageMode>,

    /// Root directory for local storage
    #[arg(short, long, env = "LOCAL_OUTPUT_DIR")]
    pub output_dir: Option<String>,

    /// Bucket for s3 storage
    #[arg(long, env = "S3_BUCKET")]
    pub bucket: Option<String>,

    /// Key prefix in front of every partition path
    #[arg(long, env = "S3_PREFIX")]
    pub prefix: Option<String>,

    /// Custom S3 endpoint (e.g. a local object store)
    #[arg(long, env = "S3_ENDPOINT")]
    pub s3_endpoint: Option<String>,

    /// Hours of hourly forecast to request (max 240)
    #[arg(long, env = "WEATHERBIT_FORECAST_HOURS")]
    pub forecast_hours: Option<u16>,

    /// Milliseconds to wait between locations
    #[arg(long, env = "WEATHERBIT_REQUEST_DELAY_MS")]
    pub request_delay_ms: Option<u64>,

    /// HTTP request timeout in seconds
    #[arg(long, env = "WEATHERBIT_TIMEOUT_SECS")]
    pub timeout_secs: Option<u64>,

    /// Retries for transient HTTP failures
    #[arg(long, env = "WEATHERBIT_MAX_RETRIES")]
    pub max_retries: Option<u32>,

    /// Proxy for outgoing requests
    #[arg(long, env = "HTTPS_PROXY")]
    pub proxy_url: Option<String>,

    /// Verify TLS certificates
    #[arg(long, env = "WEATHERBIT_VERIFY_SSL")]
    pub verify_ssl: Option<bool>,

    /// Offset every timestamp is normalized to, e.g. +09:00
    #[arg(long, env = "WEATHERBIT_REFERENCE_OFFSET")]
    pub reference_offset: Option<String>,
}

impl Cli {
    pub fn pipeline(&self) -> Pipeline {
        self.pipeline.unwrap_or_default()
    }

    pub fn event(&self) -> String {
        self.event
            .clone()
            .unwrap_or_else(|| "event.json".to_string())
    }

    pub fn date(&self) -> Result<Option<Date>, Error> {
        self.date
            .as_deref()
            .filter(|raw| !raw.is_empty())
            .map(|raw| {
                Date::parse(raw, format_description!("[year]-[month]-[day]"))
                    .with_context(|| format!("invalid date '{}', expected YYYY-MM-DD", raw))
            })
            .transpose()
    }

    pub fn api_key_file(&self) -> String {
        self.api_key_file
            .clone()
            .unwrap_or_else(|| "key.txt".to_string())
    }

    pub fn base_url(&self) -> String {
        self.base_url
            .clone()
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
    }

    pub fn storage(&self) -> StorageMode {
        self.storage.unwrap_or_default()
    }

    pub fn output_dir(&self) -> String {
        self.output_dir
            .clone()
            .unwrap_or_else(|| "./output".to_string())
    }

    pub fn prefix(&self) -> String {
        self.prefix
            .clone()
            .unwrap_or_else(|| "weather-data".to_string())
    }

    pub fn forecast_hours(&self) -> u16 {
        self.forecast_hours
            .unwrap_or(DEFAULT_FORECAST_HOURS)
            .clamp(1, MAX_FORECAST_HOURS)
    }

    pub fn request_delay(&self) -> Duration {
        Duration::from_millis(self.request_delay_ms.unwrap_or(DEFAULT_REQUEST_DELAY_MS))
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.unwrap_or(30))
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries.unwrap_or(3)
    }

    pub fn verify_ssl(&self) -> bool {
        self.verify_ssl.unwrap_or(true)
    }

    pub fn reference_offset(&self) -> Result<UtcOffset, Error> {
        let raw = self
            .reference_offset
            .as_deref()
            .unwrap_or(DEFAULT_REFERENCE_OFFSET);
        Ok(parse_utc_offset(raw)?)
    }

    pub fn user_agent(&self) -> String {
        format!("weatherbit-ingest/{}", env!("CARGO_PKG_VERSION"))
    }

    pub fn client_settings(&self) -> Result<ClientSettings, Error> {
        Ok(ClientSettings {
            base_url: self.base_url(),
            api_key: resolve_api_key(self)?,
            user_agent: self.user_agent(),
            timeout: self.timeout(),
            max_retries: self.max_retries(),
            proxy_url: self.proxy_url.clone().filter(|url| !url.is_empty()),
            verify_ssl: self.verify_ssl(),
        })
    }

    /// Overlay `self` on top of values from a config file.
    pub fn merge(self, file_config: Cli) -> Cli {
        Cli {
            config: self.config,
            level: self.level.or(file_config.level),
            pipeline: self.pipeline.or(file_config.pipeline),
            event: self.event.or(file_config.event),
            date: self.date.or(file_config.date),
            api_key: self.api_key.or(file_config.api_key),
            api_key_file: self.api_key_file.or(file_config.api_key_file),
            base_url: self.base_url.or(file_config.base_url),
            storage: self.storage.or(file_config.storage),
            output_dir: self.output_dir.or(file_config.output_dir),
            bucket: self.bucket.or(file_config.bucket),
            prefix: self.prefix.or(file_config.prefix),
            s3_endpoint: self.s3_endpoint.or(file_config.s3_endpoint),
            forecast_hours: self.forecast_hours.or(file_config.forecast_hours),
            request_delay_ms: self.request_delay_ms.or(file_config.request_delay_ms),
            timeout_secs: self.timeout_secs.or(file_config.timeout_secs),
            max_retries: self.max_retries.or(file_config.max_retries),
            proxy_url: self.proxy_url.or(file_config.proxy_url),
            verify_ssl: self.verify_ssl.or(file_config.verify_ssl),
            reference_offset: self.reference_offset.or(file_config.reference_offset),
        }
    }
}

/// Load configuration from CLI args, config file, and environment
pub fn get_config_info() -> Result<Cli, Error> {
    let cli_args = Cli::parse();

    let source = if let Some(ref path) = cli_args.config {
        ConfigSource::Explicit(path.into())
    } else {
        find_config_file("WEATHERBIT_INGEST_CONFIG", "ingest.toml")
    };

    // an explicitly named file must load, a discovered one may be skipped
    let file_config: Cli = match (&source, load_config(&source)) {
        (_, Ok(config)) => config,
        (ConfigSource::Explicit(_), Err(err)) => return Err(err.into()),
        (_, Err(_)) => Cli::default(),
    };

    Ok(cli_args.merge(file_config))
}

fn level_from(value: &str) -> Level {
    match value.to_lowercase().as_str() {
        "trace" => Level::Trace,
        "debug" => Level::Debug,
        "info" => Level::Info,
        "warn" => Level::Warning,
        "error" => Level::Error,
        _ => Level::Info,
    }
}

pub fn setup_logger(cli: &Cli) -> Logger {
    let log_level = match cli.level.as_ref() {
        Some(level) => level_from(level),
        None => level_from(&env::var("RUST_LOG").unwrap_or_default()),
    };

    let decorator = slog_term::TermDecorator::new().stderr().build();
    let drain = slog_term::CompactFormat::new(decorator).build().fuse();
    let drain = slog_async::Async::new(drain).build().fuse();
    let drain = drain.filter_level(log_level).fuse();
    slog::Logger::root(drain, o!("version" => env!("CARGO_PKG_VERSION")))
}

/// First 32-character alphanumeric token in `content`, ignoring blank and
/// `#` comment lines.
pub fn api_key_from_text(content: &str) -> Option<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .flat_map(|line| line.split(|c: char| !c.is_ascii_alphanumeric()))
        .find(|token| token.len() == 32)
        .map(str::to_string)
}

/// API key from the option/env value, else from the key file.
pub fn resolve_api_key(cli: &Cli) -> Result<String, Error> {
    if let Some(key) = cli.api_key.as_deref().map(str::trim).filter(|k| !k.is_empty()) {
        return Ok(key.to_string());
    }

    let path = cli.api_key_file();
    let content = fs::read_to_string(Path::new(&path))
        .with_context(|| format!("no API key given and key file {} is unreadable", path))?;
    api_key_from_text(&content).ok_or_else(|| anyhow!("no API key found in {}", path))
}

/// Storage backend selected by `--storage`.
pub async fn build_storage(cli: &Cli, logger: &Logger) -> Result<Arc<dyn PartitionStorage>, Error> {
    match cli.storage() {
        StorageMode::Local => Ok(Arc::new(LocalStorage::new(
            cli.output_dir(),
            logger.clone(),
        ))),
        StorageMode::S3 => build_s3_storage(cli, logger).await,
    }
}

#[cfg(feature = "s3")]
async fn build_s3_storage(cli: &Cli, logger: &Logger) -> Result<Arc<dyn PartitionStorage>, Error> {
    let bucket = cli
        .bucket
        .clone()
        .filter(|bucket| !bucket.is_empty())
        .ok_or_else(|| anyhow!("S3_BUCKET must be set for s3 storage"))?;
    let storage =
        crate::S3Storage::new(bucket, cli.s3_endpoint.clone(), logger.clone()).await?;
    Ok(Arc::new(storage))
}

#[cfg(not(feature = "s3"))]
async fn build_s3_storage(
    _cli: &Cli,
    _logger: &Logger,
) -> Result<Arc<dyn PartitionStorage>, Error> {
    Err(anyhow!(
        "s3 storage requested but this binary was built without the `s3` feature"
    ))
}
