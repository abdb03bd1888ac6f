use std::time::Duration;

use reqwest::header::{self, HeaderMap, HeaderValue};
use reqwest::StatusCode;
use serde_json::Value;
use thiserror::Error;
use tracing::warn;

use crate::config::Config;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(20);

#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("upstream request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("upstream returned HTTP {0}")]
    BadStatus(StatusCode),
    #[error("upstream returned an empty response")]
    Empty,
}

/// Thin client over the two public MyScheme endpoints. The API fronts a
/// CDN that rejects anonymous traffic, so every request carries the
/// browser-equivalent headers plus the frontend API key.
pub struct UpstreamClient {
    http: reqwest::Client,
    scheme_api: String,
    search_api: String,
}

impl UpstreamClient {
    pub fn new(config: &Config) -> Self {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::ACCEPT,
            HeaderValue::from_static("application/json, text/plain, */*"),
        );
        headers.insert(
            header::ORIGIN,
            HeaderValue::from_static("https://www.myscheme.gov.in"),
        );
        headers.insert(header::USER_AGENT, HeaderValue::from_static("Mozilla/5.0"));
        headers.insert(
            "x-api-key",
            HeaderValue::from_str(&config.api_key).expect("API key is not a valid header value"),
        );
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .default_headers(headers)
            .build()
            .expect("failed to build HTTP client");
        Self {
            http,
            scheme_api: config.scheme_api.clone(),
            search_api: config.search_api.clone(),
        }
    }

    /// Full detail envelope for one scheme slug.
    pub async fn scheme_detail(&self, slug: &str) -> Result<Value, UpstreamError> {
        let request = self
            .http
            .get(&self.scheme_api)
            .query(&[("slug", slug), ("lang", "en")]);
        self.get_json(request).await
    }

    /// Required-documents payload for a scheme id.
    pub async fn scheme_documents(&self, scheme_id: &str) -> Result<Value, UpstreamError> {
        let url = format!("{}/{}/documents", self.scheme_api, scheme_id);
        self.get_json(self.http.get(url).query(&[("lang", "en")])).await
    }

    /// FAQ payload for a scheme id.
    pub async fn scheme_faqs(&self, scheme_id: &str) -> Result<Value, UpstreamError> {
        let url = format!("{}/{}/faqs", self.scheme_api, scheme_id);
        self.get_json(self.http.get(url).query(&[("lang", "en")])).await
    }

    /// One page of the search index. `q=[]` means "no filters".
    pub async fn search_page(&self, from: usize, size: usize) -> Result<Value, UpstreamError> {
        let request = self
            .http
            .get(&self.search_api)
            .query(&[("lang", "en"), ("q", "[]"), ("keyword", ""), ("sort", "")])
            .query(&[("from", from.to_string()), ("size", size.to_string())]);
        self.get_json(request).await
    }

    async fn get_json(&self, request: reqwest::RequestBuilder) -> Result<Value, UpstreamError> {
        let request = request.build()?;
        let url = request.url().clone();
        let response = match self.http.execute(request).await {
            Ok(response) => response,
            Err(err) => {
                warn!("Request failed: {} -> {}", err, url);
                return Err(UpstreamError::Transport(err));
            }
        };
        let status = response.status();
        if !status.is_success() {
            warn!("HTTP {} -> {}", status, url);
            return Err(UpstreamError::BadStatus(status));
        }
        response.json::<Value>().await.map_err(|err| {
            warn!("Invalid JSON body: {} -> {}", err, url);
            UpstreamError::Transport(err)
        })
    }
}
