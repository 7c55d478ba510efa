use async_trait::async_trait;
use reqwest::{Client, Proxy, StatusCode};
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::{policies::ExponentialBackoff, RetryTransientMiddleware};
use slog::{debug, error, Logger};
use std::time::Duration;
use thiserror::Error;
use time::{macros::format_description, Date};

use crate::ApiResponse;

pub const DEFAULT_BASE_URL: &str = "https://api.weatherbit.io/v2.0";

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("http client setup failed: {0}")]
    Setup(String),
    #[error("error sending request to {url}: {message}")]
    Request { url: String, message: String },
    #[error("{url} responded with {status}: {body}")]
    Status {
        url: String,
        status: StatusCode,
        body: String,
    },
    #[error("error parsing body of {url}: {message}")]
    Body { url: String, message: String },
}

/// Upstream source of hourly weather records.
#[async_trait]
pub trait WeatherSource: Send + Sync {
    async fn hourly_forecast(
        &self,
        lat: f64,
        lon: f64,
        hours: u16,
    ) -> Result<ApiResponse, ClientError>;

    /// Observations between `start` and `end` (both `YYYY-MM-DD`).
    async fn hourly_history(
        &self,
        lat: f64,
        lon: f64,
        start: Date,
        end: Date,
    ) -> Result<ApiResponse, ClientError>;
}

#[derive(Debug, Clone)]
pub struct ClientSettings {
    pub base_url: String,
    pub api_key: String,
    pub user_agent: String,
    pub timeout: Duration,
    pub max_retries: u32,
    pub proxy_url: Option<String>,
    pub verify_ssl: bool,
}

pub struct WeatherbitClient {
    client: ClientWithMiddleware,
    base_url: String,
    api_key: String,
    logger: Logger,
}

impl WeatherbitClient {
    pub fn new(settings: ClientSettings, logger: Logger) -> Result<Self, ClientError> {
        let mut builder = Client::builder()
            .user_agent(&settings.user_agent)
            .timeout(settings.timeout);

        if let Some(proxy_url) = settings.proxy_url.as_deref() {
            let proxy = Proxy::all(proxy_url).map_err(|e| ClientError::Setup(e.to_string()))?;
            builder = builder.proxy(proxy);
        }
        if !settings.verify_ssl {
            builder = builder.danger_accept_invalid_certs(true);
        }

        let retry_policy =
            ExponentialBackoff::builder().build_with_max_retries(settings.max_retries);
        let client = ClientBuilder::new(
            builder
                .build()
                .map_err(|e| ClientError::Setup(e.to_string()))?,
        )
        .with(RetryTransientMiddleware::new_with_policy(retry_policy))
        .build();

        Ok(Self {
            client,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            api_key: settings.api_key,
            logger,
        })
    }

    async fn get(&self, endpoint: &str, query: Vec<(&str, String)>) -> Result<ApiResponse, ClientError> {
        let url = format!("{}/{}", self.base_url, endpoint);
        debug!(self.logger, "requesting: {} {:?}", url, query);

        let mut params = query;
        params.push(("key", self.api_key.clone()));

        let response = self
            .client
            .get(&url)
            .query(&params)
            .send()
            .await
            .map_err(|e| ClientError::Request {
                url: url.clone(),
                message: e.to_string(),
            })?;

        let status = response.status();
        if status == StatusCode::NO_CONTENT {
            debug!(self.logger, "{} returned no content", url);
            return Ok(ApiResponse::default());
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!(self.logger, "error response from {}: {} {}", url, status, body);
            return Err(ClientError::Status { url, status, body });
        }

        response
            .json::<ApiResponse>()
            .await
            .map_err(|e| ClientError::Body {
                url,
                message: e.to_string(),
            })
    }
}

fn query_date(date: Date) -> String {
    date.format(format_description!("[year]-[month]-[day]"))
        .unwrap_or_else(|_| date.to_string())
}

#[async_trait]
impl WeatherSource for WeatherbitClient {
    async fn hourly_forecast(
        &self,
        lat: f64,
        lon: f64,
        hours: u16,
    ) -> Result<ApiResponse, ClientError> {
        self.get(
            "forecast/hourly",
            vec![
                ("lat", lat.to_string()),
                ("lon", lon.to_string()),
                ("hours", hours.to_string()),
            ],
        )
        .await
    }

    async fn hourly_history(
        &self,
        lat: f64,
        lon: f64,
        start: Date,
        end: Date,
    ) -> Result<ApiResponse, ClientError> {
        self.get(
            "history/hourly",
            vec![
                ("lat", lat.to_string()),
                ("lon", lon.to_string()),
                ("start_date", query_date(start)),
                ("end_date", query_date(end)),
            ],
        )
        .await
    }
}
