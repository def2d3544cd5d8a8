//! HTTP implementation of the remote capabilities
//!
//! This module handles every request the crawler sends, including:
//! - Building HTTP clients carrying the configured credentials
//! - Building the endpoint URLs
//! - Classifying response codes into [`RemoteError`] kinds
//! - Decoding response bodies

use crate::config::ApiConfig;
use crate::remote::{parse_timeline, AccountApi, FeedApi, GraphApi, NeighborPage, RemoteError};
use crate::state::{AccountRecord, FeedPage};
use crate::{ConfigError, CrawlError};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION, COOKIE};
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use url::Url;

const CSRF_HEADER: &str = "x-csrf-token";

/// Builds an HTTP client that attaches the configured credentials
///
/// # Arguments
///
/// * `config` - The API section of the configuration
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(CrawlError)` - A credential is not a valid header value, or the
///   client could not be built
pub fn build_http_client(config: &ApiConfig) -> Result<Client, CrawlError> {
    let mut headers = HeaderMap::new();
    headers.insert(
        AUTHORIZATION,
        header_value("authorization", &format!("Bearer {}", config.bearer_token))?,
    );
    if let Some(csrf) = &config.csrf_token {
        headers.insert(
            HeaderName::from_static(CSRF_HEADER),
            header_value(CSRF_HEADER, csrf)?,
        );
    }
    if let Some(cookie) = &config.cookie {
        headers.insert(COOKIE, header_value("cookie", cookie)?);
    }

    let client = Client::builder()
        .user_agent(config.user_agent.clone())
        .default_headers(headers)
        .timeout(Duration::from_secs(config.request_timeout_seconds))
        .connect_timeout(Duration::from_secs(10))
        .gzip(true)
        .brotli(true)
        .build()?;
    Ok(client)
}

/// Builds a client without credentials for fetching public media files
pub fn build_download_client(config: &ApiConfig) -> Result<Client, CrawlError> {
    let client = Client::builder()
        .user_agent(config.user_agent.clone())
        .timeout(Duration::from_secs(config.request_timeout_seconds))
        .connect_timeout(Duration::from_secs(10))
        .build()?;
    Ok(client)
}

fn header_value(name: &str, value: &str) -> Result<HeaderValue, ConfigError> {
    let mut value =
        HeaderValue::from_str(value).map_err(|_| ConfigError::InvalidHeader(name.to_string()))?;
    value.set_sensitive(true);
    Ok(value)
}

/// Maps a non-success status code to a failure kind
///
/// | Status | Kind |
/// |--------|------|
/// | 429 | Throttled |
/// | 401, 403 | Unauthorized |
/// | 404 | NotFound |
/// | anything else | Unknown |
pub fn classify_status(status: StatusCode, endpoint: &str, body: &str) -> RemoteError {
    let detail = format!("{} returned {}: {}", endpoint, status.as_u16(), truncate(body));
    match status {
        StatusCode::TOO_MANY_REQUESTS => RemoteError::Throttled {
            endpoint: endpoint.to_string(),
        },
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => RemoteError::Unauthorized(detail),
        StatusCode::NOT_FOUND => RemoteError::NotFound(detail),
        _ => RemoteError::Unknown(detail),
    }
}

fn truncate(body: &str) -> &str {
    match body.char_indices().nth(200) {
        Some((idx, _)) => &body[..idx],
        None => body,
    }
}

#[derive(Debug, Deserialize)]
struct IdsResponse {
    ids: Vec<u64>,
    #[serde(default)]
    next_cursor: i64,
}

#[derive(Debug, Deserialize)]
struct UserResponse {
    id: u64,
}

/// Remote client speaking the REST and timeline endpoints over HTTP
#[derive(Debug, Clone)]
pub struct HttpApi {
    client: Client,
    base_url: Url,
    timeline_url: Option<Url>,
}

impl HttpApi {
    /// Creates a client from the API configuration
    pub fn new(config: &ApiConfig) -> Result<Self, CrawlError> {
        let client = build_http_client(config)?;
        Self::with_client(client, config)
    }

    /// Creates an API over an already-built client
    pub fn with_client(client: Client, config: &ApiConfig) -> Result<Self, CrawlError> {
        // Url::join replaces the last segment unless the base ends in '/'
        let mut base = config.base_url.clone();
        if !base.ends_with('/') {
            base.push('/');
        }
        let base_url = parse_url(&base)?;
        let timeline_url = config.timeline_url.as_deref().map(parse_url).transpose()?;

        Ok(Self {
            client,
            base_url,
            timeline_url,
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url, RemoteError> {
        self.base_url
            .join(path)
            .map_err(|e| RemoteError::Unknown(format!("cannot build URL for {}: {}", path, e)))
    }

    async fn get_json<T: DeserializeOwned>(&self, endpoint: &str, url: Url) -> Result<T, RemoteError> {
        tracing::debug!("GET {}", url);
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| RemoteError::Unknown(format!("{} request failed: {}", endpoint, e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(status, endpoint, &body));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| RemoteError::Unknown(format!("{} returned a bad body: {}", endpoint, e)))
    }
}

fn parse_url(raw: &str) -> Result<Url, ConfigError> {
    Url::parse(raw).map_err(|e| ConfigError::InvalidUrl(format!("{}: {}", raw, e)))
}

#[async_trait]
impl AccountApi for HttpApi {
    async fn lookup(&self, handle: &str) -> Result<u64, RemoteError> {
        let mut url = self.endpoint("users/show.json")?;
        url.query_pairs_mut().append_pair("screen_name", handle);

        let user: UserResponse = self.get_json("users/show", url).await?;
        Ok(user.id)
    }
}

#[async_trait]
impl GraphApi for HttpApi {
    async fn get_neighbors(
        &self,
        handle: &str,
        cursor: Option<i64>,
        count: u32,
    ) -> Result<NeighborPage, RemoteError> {
        let mut url = self.endpoint("friends/ids.json")?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("screen_name", handle);
            query.append_pair("count", &count.to_string());
            query.append_pair("cursor", &cursor.unwrap_or(-1).to_string());
        }

        let response: IdsResponse = self.get_json("friends/ids", url).await?;
        Ok(NeighborPage {
            ids: response.ids,
            next_cursor: (response.next_cursor != 0).then_some(response.next_cursor),
        })
    }

    async fn get_records(&self, ids: &[u64]) -> Result<Vec<AccountRecord>, RemoteError> {
        let joined = ids
            .iter()
            .map(|id| id.to_string())
            .collect::<Vec<_>>()
            .join(",");
        let mut url = self.endpoint("users/lookup.json")?;
        url.query_pairs_mut().append_pair("user_id", &joined);

        self.get_json("users/lookup", url).await
    }
}

#[async_trait]
impl FeedApi for HttpApi {
    async fn get_page(
        &self,
        user_id: u64,
        cursor: Option<&str>,
        count: u32,
    ) -> Result<FeedPage, RemoteError> {
        let mut url = self
            .timeline_url
            .clone()
            .ok_or_else(|| RemoteError::Unknown("no timeline-url configured".to_string()))?;

        let mut variables = json!({
            "userId": user_id.to_string(),
            "count": count,
            "includePromotedContent": false,
        });
        if let Some(cursor) = cursor {
            variables["cursor"] = Value::String(cursor.to_string());
        }
        url.query_pairs_mut()
            .append_pair("variables", &variables.to_string());

        let body: Value = self.get_json("timeline", url).await?;
        parse_timeline(&body)
    }

    async fn get_legacy_page(
        &self,
        user_id: u64,
        max_id: Option<u64>,
        count: u32,
    ) -> Result<Vec<Value>, RemoteError> {
        let mut url = self.endpoint("statuses/user_timeline.json")?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("user_id", &user_id.to_string());
            query.append_pair("count", &count.to_string());
            query.append_pair("include_rts", "true");
            if let Some(max_id) = max_id {
                query.append_pair("max_id", &max_id.to_string());
            }
        }

        self.get_json("statuses/user_timeline", url).await
    }
}
