//! Blocking reqwest transport for the CMDB API.

use chrono::{DateTime, Utc};
use fleetsync_engine::{EngineResult, HttpClient, HttpMethod, HttpRequest, HttpResponse, SyncError};
use reqwest::blocking::Client;
use reqwest::header::{ACCEPT, RETRY_AFTER};
use reqwest::Method;
use std::time::Duration;
use tracing::debug;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// HTTP client sending bearer-authenticated JSON requests.
pub struct ReqwestClient {
    client: Client,
    token: Option<String>,
}

impl ReqwestClient {
    /// Builds a client. Requests carry `token` as a bearer credential.
    pub fn new(token: Option<String>) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .connect_timeout(CONNECT_TIMEOUT)
            .user_agent(concat!("fleetsync/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client, token })
    }
}

impl HttpClient for ReqwestClient {
    fn send(&self, request: &HttpRequest) -> EngineResult<HttpResponse> {
        let method = match request.method {
            HttpMethod::Get => Method::GET,
            HttpMethod::Post => Method::POST,
            HttpMethod::Put => Method::PUT,
            HttpMethod::Patch => Method::PATCH,
            HttpMethod::Delete => Method::DELETE,
        };

        let mut builder = self
            .client
            .request(method, &request.url)
            .header(ACCEPT, "application/json");
        if let Some(token) = &self.token {
            builder = builder.bearer_auth(token);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder
            .send()
            .map_err(|e| SyncError::Network(format!("{} {}: {e}", request.method, request.url)))?;
        let status = response.status().as_u16();
        let retry_after = response
            .headers()
            .get(RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| parse_retry_after(v, Utc::now()));
        let body = response
            .bytes()
            .map_err(|e| SyncError::Network(format!("reading response body: {e}")))?
            .to_vec();

        debug!(method = %request.method, url = %request.url, status, "http exchange");
        Ok(HttpResponse {
            status,
            retry_after,
            body,
        })
    }
}

/// Parses a `Retry-After` value: delta seconds or an HTTP date.
fn parse_retry_after(value: &str, now: DateTime<Utc>) -> Option<Duration> {
    let value = value.trim();
    if let Ok(seconds) = value.parse::<u64>() {
        return Some(Duration::from_secs(seconds));
    }
    let at = DateTime::parse_from_rfc2822(value).ok()?.with_timezone(&Utc);
    // A date in the past means "now".
    Some((at - now).to_std().unwrap_or(Duration::ZERO))
}
