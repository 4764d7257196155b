//! A recording HTTP transport.
//!
//! [`RecordingClient`] stands in for the network below the HTTP destination
//! adapter. It answers like a well-behaved CMDB and keeps every request it
//! receives, so tests can assert on exactly what reached the wire.

use fleetsync_engine::{EngineResult, HttpClient, HttpMethod, HttpRequest, HttpResponse};
use fleetsync_model::DestinationRecord;
use parking_lot::Mutex;
use serde_json::{json, Map, Value};
use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// HTTP client fake that records requests and returns canned replies.
///
/// - `GET` pages through the configured snapshot using the `page` and
///   `per_page` query parameters
/// - `POST` returns a fresh numeric id under the endpoint's singular key
/// - `PUT`, `PATCH` and `DELETE` return `204`
///
/// Queued responses take precedence over these defaults.
#[derive(Debug, Default)]
pub struct RecordingClient {
    snapshot: Vec<DestinationRecord>,
    requests: Mutex<Vec<HttpRequest>>,
    sent_at: Mutex<Vec<Instant>>,
    queued: Mutex<VecDeque<HttpResponse>>,
    next_id: Mutex<u64>,
}

impl RecordingClient {
    /// Creates a client serving an empty snapshot.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a client serving `snapshot` on `GET`.
    pub fn with_snapshot(snapshot: Vec<DestinationRecord>) -> Self {
        Self {
            snapshot,
            ..Self::default()
        }
    }

    /// Queues a response returned by the next request, whatever its verb.
    pub fn push_response(&self, response: HttpResponse) {
        self.queued.lock().push_back(response);
    }

    /// Every request received, in order.
    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().clone()
    }

    /// Time between the arrival of consecutive requests.
    pub fn request_gaps(&self) -> Vec<Duration> {
        let sent_at = self.sent_at.lock();
        sent_at.windows(2).map(|w| w[1] - w[0]).collect()
    }

    /// Requests with a mutating verb.
    pub fn mutating_requests(&self) -> Vec<HttpRequest> {
        self.requests
            .lock()
            .iter()
            .filter(|r| r.method.is_mutating())
            .cloned()
            .collect()
    }

    /// Requests with the given verb.
    pub fn requests_with(&self, method: HttpMethod) -> Vec<HttpRequest> {
        self.requests
            .lock()
            .iter()
            .filter(|r| r.method == method)
            .cloned()
            .collect()
    }

    fn default_response(&self, request: &HttpRequest) -> HttpResponse {
        match request.method {
            HttpMethod::Get => {
                let page = query_param(&request.url, "page").unwrap_or(1).max(1);
                let per_page = query_param(&request.url, "per_page")
                    .unwrap_or(self.snapshot.len().max(1))
                    .max(1);
                let start = (page - 1).saturating_mul(per_page).min(self.snapshot.len());
                let end = start.saturating_add(per_page).min(self.snapshot.len());
                let page = &self.snapshot[start..end];
                let has_more = end < self.snapshot.len();
                HttpResponse::json(200, &json!({ "assets": page, "has_more": has_more }))
            }
            HttpMethod::Post => {
                let mut next = self.next_id.lock();
                *next += 1;
                let id = 5000 + *next;
                let key = request
                    .body
                    .as_ref()
                    .and_then(Value::as_object)
                    .and_then(|body| body.keys().next().cloned())
                    .unwrap_or_else(|| "asset".to_string());
                let mut reply = Map::new();
                reply.insert(key, json!({ "id": id }));
                HttpResponse::json(201, &Value::Object(reply))
            }
            HttpMethod::Put | HttpMethod::Patch | HttpMethod::Delete => HttpResponse::empty(204),
        }
    }
}

fn query_param(url: &str, name: &str) -> Option<usize> {
    let (_, query) = url.split_once('?')?;
    query
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .find(|(key, _)| *key == name)
        .and_then(|(_, value)| value.parse().ok())
}

impl HttpClient for RecordingClient {
    fn send(&self, request: &HttpRequest) -> EngineResult<HttpResponse> {
        self.sent_at.lock().push(Instant::now());
        self.requests.lock().push(request.clone());
        if let Some(response) = self.queued.lock().pop_front() {
            return Ok(response);
        }
        Ok(self.default_response(request))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fleetsync_engine::{DestinationAdapter, HttpDestination, HttpDestinationConfig};
    use fleetsync_model::{Attributes, Endpoint};

    #[test]
    fn serves_snapshot_and_ids() {
        let client = RecordingClient::with_snapshot(vec![DestinationRecord::new("7", "ws-7")]);
        let dest = HttpDestination::new(HttpDestinationConfig::new("https://cmdb.test/api"), &client);

        let listed = dest.list().unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, "7");

        let mut attrs = Attributes::new();
        attrs.insert("name".into(), "ws-8".into());
        let id = dest.create(Endpoint::Workstations, &attrs).unwrap();
        assert_eq!(id, "5001");

        assert_eq!(client.mutating_requests().len(), 1);
        assert_eq!(client.requests_with(HttpMethod::Get).len(), 1);
    }

    #[test]
    fn serves_snapshot_in_pages() {
        let snapshot = (1..=5)
            .map(|i| DestinationRecord::new(i.to_string(), format!("ws-{i}")))
            .collect();
        let client = RecordingClient::with_snapshot(snapshot);
        let dest = HttpDestination::new(
            HttpDestinationConfig::new("https://cmdb.test/api").with_page_size(2),
            &client,
        );

        let listed = dest.list().unwrap();
        assert_eq!(listed.len(), 5);
        assert_eq!(listed[4].id, "5");
        assert_eq!(client.requests_with(HttpMethod::Get).len(), 3);
        assert_eq!(client.request_gaps().len(), 2);
    }
}
