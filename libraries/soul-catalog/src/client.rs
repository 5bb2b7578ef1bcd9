//! HTTP catalog client.

use crate::error::{transport_error, CatalogClientError, Result};
use crate::types::{parse_level, ApiStatus, CatalogConfig, SongDetailResponse, SongUrlResponse};
use async_trait::async_trait;
use reqwest::header::{COOKIE, RETRY_AFTER};
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use soul_queue::{AudioQuality, CatalogClient, CatalogError, StreamLocator, TrackId, TrackMetadata};
use std::collections::HashMap;
use tracing::{debug, warn};

/// Catalog client speaking the song detail / song URL HTTP API.
///
/// # Example
///
/// ```ignore
/// use soul_catalog::{CatalogConfig, HttpCatalogClient};
///
/// let client = HttpCatalogClient::new(CatalogConfig::new("https://music.example.com"))?;
/// let songs = client.fetch_metadata_batch(&[TrackId(1), TrackId(2)]).await?;
/// ```
#[derive(Debug, Clone)]
pub struct HttpCatalogClient {
    http: Client,
    base_url: String,
    cookie: Option<String>,
    abuse_codes: Vec<i64>,
}

impl HttpCatalogClient {
    /// Create a new client with the given configuration.
    pub fn new(config: CatalogConfig) -> Result<Self> {
        if config.base_url.is_empty() {
            return Err(CatalogClientError::InvalidUrl("URL cannot be empty".into()));
        }

        let base_url = config.base_url.trim_end_matches('/').to_string();
        let parsed = url::Url::parse(&base_url)
            .map_err(|e| CatalogClientError::InvalidUrl(e.to_string()))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(CatalogClientError::InvalidUrl(
                "URL must start with http:// or https://".into(),
            ));
        }

        let http = Client::builder()
            .timeout(config.timeout())
            .connect_timeout(config.connect_timeout())
            .user_agent(format!("SoulPlayer/{} (Queue)", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http,
            base_url,
            cookie: config.cookie,
            abuse_codes: config.abuse_codes,
        })
    }

    /// Get the normalized base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// GET `path` and decode the body, classifying every failure
    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> std::result::Result<T, CatalogError> {
        let url = format!("{}{}", self.base_url, path);

        let mut request = self.http.get(&url).query(query);
        if let Some(cookie) = &self.cookie {
            request = request.header(COOKIE, cookie);
        }

        let response = request.send().await.map_err(|e| transport_error(&e))?;
        let status = response.status();

        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);
            warn!(url = %url, retry_after = ?retry_after, "Catalog rate limited");
            return Err(CatalogError::Abuse {
                message: match retry_after {
                    Some(secs) => format!("rate limited, retry after {} seconds", secs),
                    None => "rate limited".to_string(),
                },
            });
        }

        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(CatalogError::Status {
                status: status.as_u16(),
                message: error_text,
            });
        }

        let body = response.text().await.map_err(|e| transport_error(&e))?;
        let head: ApiStatus = serde_json::from_str(&body)
            .map_err(|e| CatalogError::Parse(format!("Failed to parse response: {}", e)))?;

        if self.abuse_codes.contains(&head.code) {
            warn!(url = %url, code = head.code, "Catalog flagged request");
            return Err(CatalogError::Abuse {
                message: head.text().unwrap_or_else(|| format!("code {}", head.code)),
            });
        }
        if head.code != 200 {
            return Err(CatalogError::Status {
                status: u16::try_from(head.code).unwrap_or(400),
                message: head.text().unwrap_or_default(),
            });
        }

        serde_json::from_str(&body)
            .map_err(|e| CatalogError::Parse(format!("Failed to parse response: {}", e)))
    }
}

#[async_trait]
impl CatalogClient for HttpCatalogClient {
    async fn fetch_metadata_batch(
        &self,
        ids: &[TrackId],
    ) -> std::result::Result<HashMap<TrackId, TrackMetadata>, CatalogError> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        let joined = ids
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(",");
        let detail: SongDetailResponse = self
            .get_json("/api/song/detail", &[("ids", joined)])
            .await?;

        let songs: HashMap<TrackId, TrackMetadata> = detail
            .songs
            .into_iter()
            .filter(|song| ids.contains(&TrackId(song.id)))
            .map(|song| (TrackId(song.id), TrackMetadata::from(song)))
            .collect();

        debug!(requested = ids.len(), found = songs.len(), "Fetched song details");
        Ok(songs)
    }

    async fn resolve_stream_locator(
        &self,
        id: TrackId,
        quality: AudioQuality,
    ) -> std::result::Result<Option<StreamLocator>, CatalogError> {
        let response: SongUrlResponse = self
            .get_json(
                "/api/song/url",
                &[("id", id.to_string()), ("level", quality.as_str().to_string())],
            )
            .await?;

        let locator = response
            .data
            .into_iter()
            .find(|item| item.id == id.0)
            .and_then(|item| {
                let url = item.url.filter(|url| !url.is_empty())?;
                let served = item
                    .level
                    .as_deref()
                    .and_then(parse_level)
                    .unwrap_or(quality);
                Some(StreamLocator {
                    url,
                    quality: served,
                })
            });

        if locator.is_none() {
            debug!(track_id = %id, "No stream available");
        }
        Ok(locator)
    }
}
