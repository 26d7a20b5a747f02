//! Plumbing shared by every backend call: sending, status classification,
//! payload and error-body parsing.

use http::{HeaderMap, Method, StatusCode};
use reqwest::Client;
use serde_json::Value;
use tracing::debug;

use crate::error::{BackendError, DataAccessError, Result};
use crate::helpers::time::get_instant;
use crate::observability::metrics::get_metrics;
use crate::utils::constants::{CSRF_TOKEN_HEADER, CSRF_TOKEN_REQUIRED};

static TRANSPORT_MSG: &str = "transport";
static HTTP_FAILURE_MSG: &str = "HTTP request failed";

/// A fully received backend response.
#[derive(Debug, Clone)]
pub struct BackendResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: String,
}

impl BackendResponse {
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// 403 with `X-CSRF-Token: required`: the token expired and may be refreshed.
    pub fn is_token_required(&self) -> bool {
        self.status == StatusCode::FORBIDDEN
            && header_value(&self.headers, CSRF_TOKEN_HEADER)
                .is_some_and(|v| v.eq_ignore_ascii_case(CSRF_TOKEN_REQUIRED))
    }

    pub fn token(&self) -> Option<String> {
        header_value(&self.headers, CSRF_TOKEN_HEADER)
    }

    pub fn payload(&self) -> Result<Value> {
        parse_payload(&self.body)
    }

    /// Error carrying the raw body.
    pub fn backend_error(&self) -> BackendError {
        BackendError {
            message: HTTP_FAILURE_MSG.to_owned(),
            status: self.status.as_u16(),
            status_text: status_text(self.status),
            body: self.body.to_owned(),
            error: None,
        }
    }

    /// Error carrying the parsed `{"error": {...}}` object of an OData error body.
    pub fn structured_backend_error(&self) -> BackendError {
        let mut err = self.backend_error();
        let parsed = serde_json::from_str::<Value>(&self.body)
            .ok()
            .and_then(|v| v.get("error").cloned());
        if let Some(parsed) = parsed {
            if let Some(message) = parsed.get("message").and_then(Value::as_str) {
                err.message = message.to_owned();
            }
            err.error = Some(parsed);
        }
        err
    }
}

pub fn header_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.to_owned())
}

pub fn status_text(status: StatusCode) -> String {
    status.canonical_reason().unwrap_or_default().to_owned()
}

/// An empty body is `null`; anything else must be JSON.
pub fn parse_payload(body: &str) -> Result<Value> {
    if body.trim().is_empty() {
        return Ok(Value::Null);
    }
    serde_json::from_str(body).map_err(|e| DataAccessError::InvalidPayload(e.to_string()))
}

/// Sends one request and reads the whole response. Only transport failures are errors here;
/// status classification is left to the caller.
pub async fn send_request(
    client: &Client,
    service: &str,
    method: Method,
    url: &str,
    headers: HeaderMap,
    body: Option<&Value>,
) -> Result<BackendResponse> {
    let metrics = get_metrics().await;
    let start = get_instant();
    metrics
        .requests
        .with_label_values(&[service, method.as_str()])
        .inc();

    let mut request = client.request(method.clone(), url).headers(headers);
    if let Some(body) = body {
        request = request.json(body);
    }
    debug!("{} {}", method, url);

    let received = match request.send().await {
        Ok(response) => {
            let status = response.status();
            let headers = response.headers().clone();
            response.text().await.map(|body| BackendResponse {
                status,
                headers,
                body,
            })
        }
        Err(e) => Err(e),
    };
    metrics
        .request_duration
        .with_label_values(&[method.as_str()])
        .observe(start.elapsed().as_secs_f64());

    let response = received.map_err(|e| {
        metrics
            .request_failures
            .with_label_values(&[service, method.as_str(), TRANSPORT_MSG])
            .inc();
        DataAccessError::from(e)
    })?;

    if !response.is_success() {
        metrics
            .request_failures
            .with_label_values(&[service, method.as_str(), response.status.as_str()])
            .inc();
    }
    Ok(response)
}
