use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::Url;

use crate::error::FetchError;

pub const DEFAULT_ENDPOINT: &str = "https://api.unsplash.com/search/photos/";

/// The only network seam: search pages, thumbnails and full-size images
/// all go through `get`.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn get(&self, url: &Url) -> Result<Bytes, FetchError>;
}

pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("image-saver/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to create HTTP client")?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn get(&self, url: &Url) -> Result<Bytes, FetchError> {
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|source| FetchError::Transport { url: url.to_string(), source })?;
        if !response.status().is_success() {
            return Err(FetchError::Status { url: url.to_string(), status: response.status().as_u16() });
        }
        response
            .bytes()
            .await
            .map_err(|source| FetchError::Transport { url: url.to_string(), source })
    }
}

/// `GET <endpoint>?client_id=<key>&per_page=<n>&page=<page>&query=<term>`
pub fn search_url(endpoint: &str, api_key: &str, per_page: u32, page: u32, term: &str) -> Result<Url, FetchError> {
    let per_page = per_page.to_string();
    let page = page.to_string();
    Url::parse_with_params(
        endpoint,
        &[
            ("client_id", api_key),
            ("per_page", per_page.as_str()),
            ("page", page.as_str()),
            ("query", term),
        ],
    )
    .map_err(|e| FetchError::InvalidUrl { url: endpoint.to_string(), reason: e.to_string() })
}

pub fn parse_url(raw: &str) -> Result<Url, FetchError> {
    Url::parse(raw).map_err(|e| FetchError::InvalidUrl { url: raw.to_string(), reason: e.to_string() })
}
