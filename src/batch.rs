//! Batch dispatch: one call fanned out into sequential, isolated sub-requests.
//!
//! Each entry `{url, method?, params?, request_id?}` becomes an in-process request against a
//! `Dispatch` target (normally the entity router). A failing entry yields
//! `{status: "error", message}` in its own slot and never affects its siblings.

use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::http::{header, HeaderMap, Method, Request, Response};
use axum::Router;
use serde_json::{json, Map, Value};
use std::convert::Infallible;
use thiserror::Error;
use tower::ServiceExt;
use tracing::Instrument;

/// Upper bound on one sub-response body.
pub const DEFAULT_RESPONSE_LIMIT: usize = 8 * 1024 * 1024;

#[derive(Debug, Error)]
#[error("{0}")]
pub struct DispatchError(pub String);

/// Something that can answer an HTTP request in-process.
#[async_trait]
pub trait Dispatch: Send + Sync {
    async fn dispatch(&self, request: Request<Body>) -> Result<Response<Body>, DispatchError>;
}

#[async_trait]
impl Dispatch for Router {
    async fn dispatch(&self, request: Request<Body>) -> Result<Response<Body>, DispatchError> {
        let response: Result<_, Infallible> = self.clone().oneshot(request).await;
        response.map_err(|e| DispatchError(e.to_string()))
    }
}

/// Correlation id: a string or number in the payload, used as the output key.
#[derive(Clone, Debug, PartialEq)]
pub enum RequestId {
    Text(String),
    Number(serde_json::Number),
}

impl RequestId {
    fn from_value(v: &Value) -> Option<Self> {
        match v {
            Value::String(s) => Some(RequestId::Text(s.clone())),
            Value::Number(n) => Some(RequestId::Number(n.clone())),
            _ => None,
        }
    }

    fn key(&self) -> String {
        match self {
            RequestId::Text(s) => s.clone(),
            RequestId::Number(n) => n.to_string(),
        }
    }
}

/// One sub-request, as read from the batch payload.
#[derive(Clone, Debug, PartialEq)]
pub struct BatchEntry {
    pub url: String,
    pub method: String,
    pub params: Value,
    pub request_id: Option<RequestId>,
}

impl BatchEntry {
    /// `None` for entries without a string `url`; those are skipped without an output slot.
    pub fn from_value(v: &Value) -> Option<Self> {
        let obj = v.as_object()?;
        let url = obj.get("url")?.as_str()?.to_string();
        let method = obj
            .get("method")
            .and_then(Value::as_str)
            .unwrap_or("GET")
            .to_string();
        Some(BatchEntry {
            url,
            method,
            params: obj.get("params").cloned().unwrap_or(Value::Null),
            request_id: obj.get("request_id").and_then(RequestId::from_value),
        })
    }
}

/// Output slots: a list when no entry has a request id, otherwise an object keyed by request id
/// where unkeyed entries take the next free integer key.
#[derive(Default)]
struct Output {
    entries: Vec<(Option<String>, Value)>,
}

impl Output {
    fn push(&mut self, id: Option<&RequestId>, value: Value) {
        let key = id.map(RequestId::key);
        match key.as_ref().and_then(|k| self.entries.iter().position(|(e, _)| e.as_ref() == Some(k))) {
            Some(i) => self.entries[i].1 = value,
            None => self.entries.push((key, value)),
        }
    }

    fn into_value(self) -> Value {
        if self.entries.iter().all(|(k, _)| k.is_none()) {
            return Value::Array(self.entries.into_iter().map(|(_, v)| v).collect());
        }
        let mut map = Map::new();
        let mut next: u64 = 0;
        for (key, value) in self.entries {
            let key = match key {
                Some(k) => {
                    if let Some(after) = k.parse::<u64>().ok().and_then(|n| n.checked_add(1)) {
                        next = next.max(after);
                    }
                    k
                }
                None => {
                    while map.contains_key(&next.to_string()) {
                        next = next.wrapping_add(1);
                    }
                    let k = next.to_string();
                    next = next.wrapping_add(1);
                    k
                }
            };
            map.insert(key, value);
        }
        Value::Object(map)
    }
}

pub struct BatchDispatcher<D> {
    target: D,
    strip_prefix: Option<String>,
    response_limit: usize,
}

impl<D: Dispatch> BatchDispatcher<D> {
    pub fn new(target: D) -> Self {
        BatchDispatcher {
            target,
            strip_prefix: None,
            response_limit: DEFAULT_RESPONSE_LIMIT,
        }
    }

    /// Sub-request urls starting with `prefix` (e.g. `/api/v1`) are dispatched without it.
    pub fn with_strip_prefix(mut self, prefix: impl Into<String>) -> Self {
        let prefix = prefix.into();
        let prefix = prefix.trim_end_matches('/');
        self.strip_prefix = (!prefix.is_empty()).then(|| prefix.to_string());
        self
    }

    /// Run every entry in order and return `{responses: ...}`.
    pub async fn run<'a>(&self, headers: &HeaderMap, entries: impl IntoIterator<Item = &'a Value>) -> Value {
        let mut output = Output::default();
        for raw in entries {
            let Some(entry) = BatchEntry::from_value(raw) else {
                tracing::debug!("batch entry without url skipped");
                continue;
            };
            let span = tracing::info_span!("batch_entry", method = %entry.method, url = %entry.url);
            let value = async {
                match self.execute(headers, &entry).await {
                    Ok(v) => v,
                    Err(e) => {
                        tracing::warn!(error = %e, "batch entry failed");
                        json!({"status": "error", "message": e.to_string()})
                    }
                }
            }
            .instrument(span)
            .await;
            output.push(entry.request_id.as_ref(), value);
        }
        json!({ "responses": output.into_value() })
    }

    async fn execute(&self, headers: &HeaderMap, entry: &BatchEntry) -> Result<Value, DispatchError> {
        let request = self.build_request(headers, entry)?;
        let response = self.target.dispatch(request).await?;
        tracing::debug!(status = %response.status(), "batch entry answered");
        let bytes = to_bytes(response.into_body(), self.response_limit)
            .await
            .map_err(|e| DispatchError(e.to_string()))?;
        if bytes.is_empty() {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_slice(&bytes).unwrap_or(Value::Null))
    }

    fn build_request(&self, headers: &HeaderMap, entry: &BatchEntry) -> Result<Request<Body>, DispatchError> {
        let method = Method::from_bytes(entry.method.trim().to_uppercase().as_bytes())
            .map_err(|e| DispatchError(format!("invalid method {}: {}", entry.method, e)))?;
        let mut path = self.local_path(&entry.url);
        let carries_query = matches!(method, Method::GET | Method::HEAD | Method::OPTIONS);

        let body = if carries_query {
            let query = encode_query(&entry.params)?;
            if !query.is_empty() {
                path.push(if path.contains('?') { '&' } else { '?' });
                path.push_str(&query);
            }
            Body::empty()
        } else {
            let params = match &entry.params {
                Value::Null => Value::Object(Map::new()),
                other => other.clone(),
            };
            let bytes = serde_json::to_vec(&params).map_err(|e| DispatchError(e.to_string()))?;
            Body::from(bytes)
        };

        let mut builder = Request::builder().method(method).uri(path);
        for (name, value) in headers {
            if name == header::CONTENT_LENGTH || name == header::CONTENT_TYPE || name == header::TRANSFER_ENCODING {
                continue;
            }
            builder = builder.header(name, value);
        }
        if !carries_query {
            builder = builder.header(header::CONTENT_TYPE, "application/json");
        }
        builder.body(body).map_err(|e| DispatchError(e.to_string()))
    }

    fn local_path(&self, url: &str) -> String {
        let url = url.trim();
        let stripped = self
            .strip_prefix
            .as_deref()
            .and_then(|p| url.strip_prefix(p))
            .filter(|rest| rest.is_empty() || rest.starts_with('/') || rest.starts_with('?'))
            .unwrap_or(url);
        if stripped.starts_with('/') {
            stripped.to_string()
        } else {
            format!("/{}", stripped)
        }
    }
}

/// Bracket-encoded query string: `{"filters": {"status": "eq:active"}}` -> `filters%5Bstatus%5D=eq%3Aactive`.
pub fn encode_query(params: &Value) -> Result<String, DispatchError> {
    let mut pairs = Vec::new();
    match params {
        Value::Object(map) => {
            for (k, v) in map {
                flatten(k.clone(), v, &mut pairs);
            }
        }
        Value::Null => {}
        other => return Err(DispatchError(format!("params must be an object, got {}", other))),
    }
    serde_urlencoded::to_string(&pairs).map_err(|e| DispatchError(e.to_string()))
}

fn flatten(key: String, v: &Value, out: &mut Vec<(String, String)>) {
    match v {
        Value::Null => {}
        Value::Bool(b) => out.push((key, if *b { "1" } else { "0" }.to_string())),
        Value::Number(n) => out.push((key, n.to_string())),
        Value::String(s) => out.push((key, s.clone())),
        Value::Array(items) => {
            for (i, item) in items.iter().enumerate() {
                flatten(format!("{}[{}]", key, i), item, out);
            }
        }
        Value::Object(map) => {
            for (k, item) in map {
                flatten(format!("{}[{}]", key, k), item, out);
            }
        }
    }
}
