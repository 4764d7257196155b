//! HTTP destination adapter.
//!
//! The actual HTTP client is abstracted via [`HttpClient`] so the adapter
//! can run over reqwest in the CLI and over a recording fake in tests.

use crate::adapter::DestinationAdapter;
use crate::config::HttpDestinationConfig;
use crate::error::{EngineResult, SyncError};
use fleetsync_model::{AttrValue, Attributes, DestinationRecord, Endpoint};
use serde::Deserialize;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// HTTP method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    /// GET
    Get,
    /// POST
    Post,
    /// PUT
    Put,
    /// PATCH
    Patch,
    /// DELETE
    Delete,
}

impl HttpMethod {
    /// Returns true for verbs that change remote state.
    pub fn is_mutating(self) -> bool {
        !matches!(self, HttpMethod::Get)
    }

    /// Upper-case verb.
    pub fn as_str(self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Delete => "DELETE",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An outbound request.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    /// Method.
    pub method: HttpMethod,
    /// Absolute URL.
    pub url: String,
    /// JSON body.
    pub body: Option<Value>,
}

impl HttpRequest {
    /// Creates a request without a body.
    pub fn new(method: HttpMethod, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            body: None,
        }
    }

    /// Attaches a JSON body.
    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }
}

/// A received response.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpResponse {
    /// Status code.
    pub status: u16,
    /// Parsed `Retry-After` header, in seconds.
    pub retry_after: Option<Duration>,
    /// Raw body.
    pub body: Vec<u8>,
}

impl HttpResponse {
    /// Creates a response with a JSON body.
    pub fn json(status: u16, body: &Value) -> Self {
        Self {
            status,
            retry_after: None,
            body: body.to_string().into_bytes(),
        }
    }

    /// Creates a response with an empty body.
    pub fn empty(status: u16) -> Self {
        Self {
            status,
            retry_after: None,
            body: Vec::new(),
        }
    }

    /// Sets the `Retry-After` value.
    pub fn with_retry_after(mut self, wait: Duration) -> Self {
        self.retry_after = Some(wait);
        self
    }

    /// Returns true for 2xx statuses.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).trim().to_string()
    }
}

/// HTTP client abstraction.
///
/// Implementations return `Err(SyncError::Network)` when no response was
/// received at all; every received response, whatever its status, is `Ok`.
pub trait HttpClient: Send + Sync {
    /// Sends a request.
    fn send(&self, request: &HttpRequest) -> EngineResult<HttpResponse>;
}

impl<C: HttpClient + ?Sized> HttpClient for &C {
    fn send(&self, request: &HttpRequest) -> EngineResult<HttpResponse> {
        (**self).send(request)
    }
}

impl<C: HttpClient + ?Sized> HttpClient for Arc<C> {
    fn send(&self, request: &HttpRequest) -> EngineResult<HttpResponse> {
        (**self).send(request)
    }
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    errors: Vec<ErrorDetail>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Deserialize)]
struct ErrorDetail {
    #[serde(default)]
    code: String,
    #[serde(default)]
    field: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Deserialize)]
struct Page {
    #[serde(default)]
    assets: Vec<DestinationRecord>,
    #[serde(default)]
    has_more: bool,
}

/// Collection holding every asset regardless of type.
pub const GENERIC_COLLECTION: &str = "assets";

/// Payload key for writes to [`GENERIC_COLLECTION`].
const GENERIC_KEY: &str = "asset";

/// API collection and payload key for a record, falling back to the generic
/// asset route when its typed collection is unknown.
fn route(endpoint: Option<Endpoint>) -> (&'static str, &'static str) {
    match endpoint {
        Some(endpoint) => (endpoint.api_name(), endpoint.singular()),
        None => (GENERIC_COLLECTION, GENERIC_KEY),
    }
}

/// Maps a response status onto the engine's error kinds.
///
/// `collection`/`id` name the addressed record for 404s.
pub fn classify_status(
    response: &HttpResponse,
    collection: Option<&str>,
    id: Option<&str>,
) -> EngineResult<()> {
    match response.status {
        200..=299 => Ok(()),
        401 | 403 => Err(SyncError::Authentication(format!(
            "HTTP {}: {}",
            response.status,
            response.text()
        ))),
        404 => match collection {
            Some(collection) => Err(SyncError::not_found(collection, id.unwrap_or_default())),
            None => Err(SyncError::Protocol(format!("HTTP 404: {}", response.text()))),
        },
        429 => Err(SyncError::throttled(response.retry_after)),
        400..=499 => Err(validation_error(response)),
        status => Err(SyncError::Network(format!("HTTP {status}: {}", response.text()))),
    }
}

fn validation_error(response: &HttpResponse) -> SyncError {
    let Ok(body) = serde_json::from_slice::<ErrorBody>(&response.body) else {
        return SyncError::validation(format!("HTTP {}: {}", response.status, response.text()));
    };

    let rejected_fields = body
        .errors
        .iter()
        .filter(|e| e.code.eq_ignore_ascii_case("EXTRA_KEY"))
        .filter_map(|e| e.field.clone())
        .collect();
    let message = body
        .message
        .or_else(|| body.errors.iter().find_map(|e| e.message.clone()))
        .unwrap_or_else(|| format!("HTTP {}", response.status));

    SyncError::Validation {
        message,
        rejected_fields,
    }
}

/// Destination adapter speaking the CMDB's JSON API.
pub struct HttpDestination<C: HttpClient> {
    config: HttpDestinationConfig,
    client: C,
}

impl<C: HttpClient> HttpDestination<C> {
    /// Creates an adapter.
    pub fn new(config: HttpDestinationConfig, client: C) -> Self {
        Self { config, client }
    }

    /// Returns the base URL.
    pub fn base_url(&self) -> &str {
        &self.config.base_url
    }

    /// The underlying client.
    pub fn client(&self) -> &C {
        &self.client
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.config.base_url, path)
    }

    /// Sends one request. A 429 answer is re-sent in place, up to
    /// `max_throttle_retries` times; the pacing comes from the limiter in
    /// front of the client.
    fn send(&self, request: &HttpRequest) -> EngineResult<HttpResponse> {
        let mut throttled = 0;
        loop {
            let response = self.client.send(request)?;
            if response.status != 429 || throttled >= self.config.max_throttle_retries {
                return Ok(response);
            }
            throttled += 1;
            warn!(
                method = %request.method,
                url = %request.url,
                attempt = throttled,
                "request throttled, re-sending"
            );
        }
    }

    /// Sends a write, stripping fields the destination rejects as unknown
    /// and re-sending, up to `max_field_retries` times.
    fn send_write(
        &self,
        method: HttpMethod,
        url: String,
        (collection, key): (&str, &str),
        id: Option<&str>,
        attrs: &Attributes,
    ) -> EngineResult<HttpResponse> {
        let mut payload = attrs.clone();
        let mut retries = 0;

        loop {
            let request = HttpRequest::new(method, url.as_str()).with_body(wrap(key, &payload)?);
            let response = self.send(&request)?;

            let err = match classify_status(&response, Some(collection), id) {
                Ok(()) => return Ok(response),
                Err(e) => e,
            };
            if let SyncError::Validation {
                message,
                rejected_fields,
            } = &err
            {
                if retries < self.config.max_field_retries
                    && strip_fields(&mut payload, rejected_fields)
                {
                    retries += 1;
                    warn!(
                        collection,
                        fields = ?rejected_fields,
                        attempt = retries,
                        "destination rejected fields, retrying without them: {}",
                        message
                    );
                    continue;
                }
            }
            return Err(err);
        }
    }
}

/// Wraps attributes in the collection's singular key.
fn wrap(key: &str, payload: &Attributes) -> EngineResult<Value> {
    let attrs = serde_json::to_value(payload)
        .map_err(|e| SyncError::Protocol(format!("cannot encode payload: {e}")))?;
    let mut body = serde_json::Map::new();
    body.insert(key.to_string(), attrs);
    Ok(Value::Object(body))
}

/// Removes rejected keys (top-level or `parent.child`). Returns true if
/// anything was removed.
fn strip_fields(payload: &mut Attributes, fields: &[String]) -> bool {
    let mut removed = false;
    for field in fields {
        match field.split_once('.') {
            None => removed |= payload.remove(field).is_some(),
            Some((parent, child)) => {
                if let Some(AttrValue::Map(nested)) = payload.get_mut(parent) {
                    removed |= nested.remove(child).is_some();
                    if nested.is_empty() {
                        payload.remove(parent);
                    }
                }
            }
        }
    }
    removed
}

fn parse_id(body: &[u8], endpoint: Endpoint) -> EngineResult<String> {
    let value: Value = serde_json::from_slice(body)
        .map_err(|e| SyncError::Protocol(format!("create reply is not JSON: {e}")))?;
    let id = value
        .get(endpoint.singular())
        .unwrap_or(&value)
        .get("id")
        .ok_or_else(|| SyncError::Protocol("create reply carries no id".into()))?;
    match id {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(SyncError::Protocol(format!("unexpected id in create reply: {other}"))),
    }
}

impl<C: HttpClient> DestinationAdapter for HttpDestination<C> {
    fn create(&self, endpoint: Endpoint, attrs: &Attributes) -> EngineResult<String> {
        let url = self.url(endpoint.api_name());
        let response =
            self.send_write(HttpMethod::Post, url, route(Some(endpoint)), None, attrs)?;
        parse_id(&response.body, endpoint)
    }

    fn update(
        &self,
        endpoint: Option<Endpoint>,
        id: &str,
        attrs: &Attributes,
    ) -> EngineResult<()> {
        let target = route(endpoint);
        let url = self.url(&format!("{}/{}", target.0, id));
        self.send_write(HttpMethod::Put, url, target, Some(id), attrs)?;
        Ok(())
    }

    fn delete(&self, endpoint: Endpoint, id: &str) -> EngineResult<()> {
        let url = self.url(&format!("{}/{}", endpoint.api_name(), id));
        let response = self.send(&HttpRequest::new(HttpMethod::Delete, url))?;
        classify_status(&response, Some(endpoint.api_name()), Some(id))
    }

    fn list(&self) -> EngineResult<Vec<DestinationRecord>> {
        let mut records = Vec::new();
        let mut page = 1u32;

        loop {
            let url = self.url(&format!(
                "{GENERIC_COLLECTION}?page={page}&per_page={}",
                self.config.page_size
            ));
            let response = self.send(&HttpRequest::new(HttpMethod::Get, url))?;
            classify_status(&response, None, None)?;

            let body: Page = serde_json::from_slice(&response.body)
                .map_err(|e| SyncError::Protocol(format!("bad asset page {page}: {e}")))?;
            debug!(page, count = body.assets.len(), "fetched destination page");
            records.extend(body.assets);

            if !body.has_more {
                return Ok(records);
            }
            page += 1;
        }
    }
}
