use axum::body::Body;
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use serde_json::Value;
use std::time::Duration;

use crate::error::{BrokerError, BrokerResult};
use crate::model::{deep_merged, ResponseBody, ResponseSpec};

/// A response decided on by the broker but not yet sent.
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedResponse {
    pub status: u16,
    /// Injected latency, served before the response leaves
    pub delay: Duration,
    pub body: ResponseBody,
}

impl PlannedResponse {
    pub fn from_spec(spec: &ResponseSpec) -> Self {
        Self {
            status: spec.status,
            delay: spec.delay(),
            body: spec.body.clone(),
        }
    }

    pub fn immediate(status: u16, body: ResponseBody) -> Self {
        Self {
            status,
            delay: Duration::ZERO,
            body,
        }
    }

    /// Fixed plain-text answer that bypasses configured behaviors.
    pub fn message(status: u16, message: impl Into<String>) -> Self {
        Self::immediate(status, ResponseBody::Raw(message.into()))
    }

    /// Stored record overlaid with the configured body.
    ///
    /// A structured body is deep-merged over `stored` (configured keys win), a
    /// raw body replaces it verbatim, and an empty spec yields an empty body.
    pub fn merged_view(stored: &Value, spec: &ResponseSpec) -> Self {
        let mut planned = Self::from_spec(spec);
        if let ResponseBody::Structured(overlay) = &spec.body {
            planned.body = ResponseBody::Structured(deep_merged(stored, overlay));
        }
        planned
    }
}

/// Encoded response ready for the transport.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedResponse {
    pub status: StatusCode,
    pub content_type: Option<&'static str>,
    pub body: Vec<u8>,
}

impl RenderedResponse {
    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

impl IntoResponse for RenderedResponse {
    fn into_response(self) -> Response {
        let mut response = Response::new(Body::from(self.body));
        *response.status_mut() = self.status;
        if let Some(content_type) = self.content_type {
            response
                .headers_mut()
                .insert(header::CONTENT_TYPE, HeaderValue::from_static(content_type));
        }
        response
    }
}

pub struct ResponsePlanner;

impl ResponsePlanner {
    /// Wait out the injected delay, then encode.
    ///
    /// The delay suspends only the calling request; no broker lock is held.
    pub async fn render(planned: PlannedResponse) -> BrokerResult<RenderedResponse> {
        if !planned.delay.is_zero() {
            log::debug!("Delaying response by {:?}", planned.delay);
            tokio::time::sleep(planned.delay).await;
        }
        let rendered = Self::encode(planned)?;
        log::debug!("Responding {} {}", rendered.status, rendered.body_text());
        Ok(rendered)
    }

    pub fn encode(planned: PlannedResponse) -> BrokerResult<RenderedResponse> {
        let status = StatusCode::from_u16(planned.status).map_err(|_| {
            BrokerError::Config(format!("{} is not a valid HTTP status", planned.status))
        })?;

        let (content_type, body) = match planned.body {
            ResponseBody::Structured(value) => (
                Some("application/json"),
                serde_json::to_vec(&value).map_err(|e| BrokerError::Internal(e.to_string()))?,
            ),
            ResponseBody::Raw(raw) => (Some("text/plain; charset=utf-8"), raw.into_bytes()),
            ResponseBody::Empty => (None, Vec::new()),
        };

        Ok(RenderedResponse {
            status,
            content_type,
            body,
        })
    }
}
