use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Json, Response},
};
use serde::Serialize;
use std::any::Any;
use std::backtrace::Backtrace;

use crate::api::handlers::AppState;
use crate::error::BrokerError;

/// Failure details attached to a 500 response until the request path is known.
///
/// The backtrace is captured when the failure is turned into a response, so
/// it shows the handler and middleware frames that rendered the 500 rather
/// than the point where the `BrokerError` was built.
#[derive(Debug, Clone)]
pub struct FailureReport {
    pub message: String,
    pub backtrace: Vec<String>,
}

impl FailureReport {
    fn capture(message: String) -> Self {
        let backtrace = Backtrace::force_capture()
            .to_string()
            .lines()
            .map(|line| line.trim().to_string())
            .filter(|line| !line.is_empty())
            .collect();
        Self { message, backtrace }
    }

    fn into_failure_response(self) -> Response {
        let mut response = (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(serde_json::json!({"error": true, "type": "500", "message": self.message})),
        )
            .into_response();
        response.extensions_mut().insert(self);
        response
    }
}

/// Body of every 500 answered by the broker
#[derive(Debug, Serialize)]
pub struct DiagnosticResponse {
    pub error: bool,
    #[serde(rename = "type")]
    pub error_type: String,
    pub message: String,
    pub path: String,
    pub timestamp: String,
    pub backtrace: Vec<String>,
    pub broker_instance: String,
}

impl IntoResponse for BrokerError {
    fn into_response(self) -> Response {
        FailureReport::capture(self.to_string()).into_failure_response()
    }
}

/// Turn a panicking handler into the same 500 a returned error produces.
pub fn panic_response(panic: Box<dyn Any + Send + 'static>) -> Response {
    let message = if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else {
        "handler panicked".to_string()
    };
    FailureReport::capture(message).into_failure_response()
}

/// Log every request and complete 500 diagnostics with the request path.
pub async fn log_and_diagnose(State(broker): State<AppState>, request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();

    let response = next.run(request).await;
    log::info!("{} {} -> {}", method, uri, response.status().as_u16());

    let Some(report) = response.extensions().get::<FailureReport>().cloned() else {
        return response;
    };

    log::error!("{} {} failed: {}", method, uri.path(), report.message);
    let diagnostic = DiagnosticResponse {
        error: true,
        error_type: "500".to_string(),
        message: report.message,
        path: uri.path().to_string(),
        timestamp: chrono::Utc::now().to_rfc3339(),
        backtrace: report.backtrace,
        broker_instance: broker.instance_id().to_string(),
    };
    (StatusCode::INTERNAL_SERVER_ERROR, Json(diagnostic)).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_broker_error_response_carries_report() {
        let response = BrokerError::Config("Could not find behavior for bind".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let report = response.extensions().get::<FailureReport>().unwrap();
        assert_eq!(report.message, "Could not find behavior for bind");
        assert!(!report.backtrace.is_empty());
    }

    #[test]
    fn test_panic_message_extracted() {
        let response = panic_response(Box::new("boom"));
        let report = response.extensions().get::<FailureReport>().unwrap();
        assert_eq!(report.message, "boom");

        let response = panic_response(Box::new(String::from("owned boom")));
        let report = response.extensions().get::<FailureReport>().unwrap();
        assert_eq!(report.message, "owned boom");
    }
}
