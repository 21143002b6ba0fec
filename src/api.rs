//! REST client for the news backend.
//!
//! One `ApiClient` is built from the single configured origin and passed
//! to every component that talks to the network. The `NewsBackend` trait
//! is the seam the synchronizer works against, so tests can substitute an
//! in-memory backend.

use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

use crate::config::{Config, ConfigError};
use crate::filter::{FilterState, Lang};
use crate::model::{
    normalize_news_item, normalize_news_list, FilterOptions, NewsItem, NewsList, RetryMetrics,
    SourceHealth,
};

/// Path of the push endpoint on the backend origin.
pub const PUSH_PATH: &str = "/ws/news";

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("backend returned {status}: {body}")]
    Status { status: StatusCode, body: String },
    #[error("invalid endpoint URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

/// The fan-out surface the synchronizer depends on.
#[async_trait]
pub trait NewsBackend: Send + Sync {
    async fn list_news(
        &self,
        filter: &FilterState,
        limit: u32,
        offset: u32,
    ) -> Result<NewsList, ApiError>;

    async fn source_health(&self) -> Result<Vec<SourceHealth>, ApiError>;

    async fn retry_metrics(&self) -> Result<RetryMetrics, ApiError>;

    async fn filter_options(&self) -> Result<FilterOptions, ApiError>;
}

#[derive(Clone)]
pub struct ApiClient {
    http: Client,
    origin: Url,
}

impl fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiClient")
            .field("origin", &self.origin)
            .finish_non_exhaustive()
    }
}

impl ApiClient {
    pub fn new(origin: Url, timeout: Duration) -> Self {
        let http = Client::builder()
            .user_agent("global-pulse/0.1")
            .timeout(timeout)
            .no_proxy()
            .build()
            .expect("reqwest client");
        Self { http, origin }
    }

    pub fn from_config(cfg: &Config) -> Result<Self, ConfigError> {
        Ok(Self::new(
            cfg.origin_url()?,
            Duration::from_secs(cfg.backend.request_timeout_seconds),
        ))
    }

    pub fn origin(&self) -> &Url {
        &self.origin
    }

    fn endpoint(&self, path: &str) -> Result<Url, ApiError> {
        Ok(self.origin.join(path)?)
    }

    /// `/api/news` with the exact parameter contract: `lang`, `china_only`,
    /// `limit` and `offset` always, free-text criteria only when their
    /// trimmed value is non-empty.
    fn news_url(&self, filter: &FilterState, limit: u32, offset: u32) -> Result<Url, ApiError> {
        let mut url = self.endpoint("/api/news")?;
        {
            let mut qp = url.query_pairs_mut();
            qp.append_pair("lang", filter.lang.as_str());
            qp.append_pair("china_only", if filter.china_only { "true" } else { "false" });
            qp.append_pair("limit", &limit.to_string());
            qp.append_pair("offset", &offset.to_string());
            let keyword = filter.keyword.trim();
            if !keyword.is_empty() {
                qp.append_pair("q", keyword);
            }
            let country = filter.country.trim();
            if !country.is_empty() {
                qp.append_pair("country", country);
            }
            let topic = filter.topic.trim();
            if !topic.is_empty() {
                qp.append_pair("topic", topic);
            }
        }
        Ok(url)
    }

    fn detail_url(&self, id: i64, lang: Lang) -> Result<Url, ApiError> {
        let mut url = self.endpoint(&format!("/api/news/{id}"))?;
        url.query_pairs_mut().append_pair("lang", lang.as_str());
        Ok(url)
    }

    async fn get<T: DeserializeOwned>(&self, url: Url) -> Result<T, ApiError> {
        let res = self.http.get(url).send().await?;
        let status = res.status();
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            return Err(ApiError::Status { status, body });
        }
        Ok(res.json::<T>().await?)
    }

    pub async fn list_news(
        &self,
        filter: &FilterState,
        limit: u32,
        offset: u32,
    ) -> Result<NewsList, ApiError> {
        let url = self.news_url(filter, limit, offset)?;
        let raw: Value = self.get(url).await?;
        Ok(normalize_news_list(&raw))
    }

    pub async fn news_detail(&self, id: i64, lang: Lang) -> Result<NewsItem, ApiError> {
        let url = self.detail_url(id, lang)?;
        let raw: Value = self.get(url).await?;
        Ok(normalize_news_item(&raw))
    }

    pub async fn source_health(&self) -> Result<Vec<SourceHealth>, ApiError> {
        #[derive(Deserialize)]
        struct Envelope {
            #[serde(default)]
            items: Vec<SourceHealth>,
        }
        let url = self.endpoint("/api/sources/health")?;
        let envelope: Envelope = self.get(url).await?;
        Ok(envelope.items)
    }

    pub async fn filter_options(&self) -> Result<FilterOptions, ApiError> {
        let url = self.endpoint("/api/filters")?;
        self.get(url).await
    }

    pub async fn retry_metrics(&self) -> Result<RetryMetrics, ApiError> {
        let url = self.endpoint("/api/retry/metrics")?;
        self.get(url).await
    }
}

#[async_trait]
impl NewsBackend for ApiClient {
    async fn list_news(
        &self,
        filter: &FilterState,
        limit: u32,
        offset: u32,
    ) -> Result<NewsList, ApiError> {
        ApiClient::list_news(self, filter, limit, offset).await
    }

    async fn source_health(&self) -> Result<Vec<SourceHealth>, ApiError> {
        ApiClient::source_health(self).await
    }

    async fn retry_metrics(&self) -> Result<RetryMetrics, ApiError> {
        ApiClient::retry_metrics(self).await
    }

    async fn filter_options(&self) -> Result<FilterOptions, ApiError> {
        ApiClient::filter_options(self).await
    }
}

/// Resolve the push endpoint. An explicit override wins, and an empty
/// override disables the channel; otherwise the REST origin is mapped
/// onto its websocket counterpart (`http`->`ws`, `https`->`wss`).
pub fn resolve_push_url(origin: &Url, override_url: Option<&str>) -> Option<Url> {
    match override_url {
        Some(explicit) => {
            let explicit = explicit.trim();
            if explicit.is_empty() {
                None
            } else {
                Url::parse(explicit).ok()
            }
        }
        None => {
            let mut push = origin.clone();
            let scheme = if origin.scheme() == "https" { "wss" } else { "ws" };
            push.set_scheme(scheme).ok()?;
            push.set_path(PUSH_PATH);
            push.set_query(None);
            Some(push)
        }
    }
}
