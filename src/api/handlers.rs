use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;

use crate::api::accepts_incomplete::AcceptsIncomplete;
use crate::error::{BrokerError, BrokerResult};
use crate::logic::{Broker, PlannedResponse, RenderedResponse, ResponsePlanner};
use crate::model::BehaviorPatch;

pub type AppState = Arc<Broker>;

type HandlerResult = Result<RenderedResponse, BrokerError>;

/// Simple health check endpoint
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: String,
}

pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}

/// Parse a JSON request body; an empty body counts as `{}`.
fn parse_payload(body: &Bytes) -> BrokerResult<Value> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(Value::Object(Default::default()));
    }
    Ok(serde_json::from_slice(body)?)
}

async fn respond(planned: BrokerResult<PlannedResponse>) -> HandlerResult {
    ResponsePlanner::render(planned?).await
}

fn pretty_json<T: Serialize>(value: &T) -> Result<Response, BrokerError> {
    let body =
        serde_json::to_string_pretty(value).map_err(|e| BrokerError::Internal(e.to_string()))?;
    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, "application/json")],
        body,
    )
        .into_response())
}

// Service broker API

pub async fn get_catalog(State(broker): State<AppState>) -> HandlerResult {
    respond(broker.catalog()).await
}

pub async fn provision_instance(
    State(broker): State<AppState>,
    Path(instance_id): Path<String>,
    AcceptsIncomplete(accepts_incomplete): AcceptsIncomplete,
    body: Bytes,
) -> HandlerResult {
    let payload = parse_payload(&body)?;
    respond(broker.provision(&instance_id, payload, accepts_incomplete)).await
}

pub async fn get_instance(
    State(broker): State<AppState>,
    Path(instance_id): Path<String>,
) -> HandlerResult {
    respond(broker.fetch_instance(&instance_id)).await
}

pub async fn update_instance(
    State(broker): State<AppState>,
    Path(instance_id): Path<String>,
    AcceptsIncomplete(accepts_incomplete): AcceptsIncomplete,
    body: Bytes,
) -> HandlerResult {
    let payload = parse_payload(&body)?;
    respond(broker.update_instance(&instance_id, payload, accepts_incomplete)).await
}

pub async fn deprovision_instance(
    State(broker): State<AppState>,
    Path(instance_id): Path<String>,
    AcceptsIncomplete(accepts_incomplete): AcceptsIncomplete,
) -> HandlerResult {
    respond(broker.deprovision(&instance_id, accepts_incomplete)).await
}

pub async fn get_instance_last_operation(
    State(broker): State<AppState>,
    Path(instance_id): Path<String>,
) -> HandlerResult {
    respond(broker.instance_last_operation(&instance_id)).await
}

pub async fn create_binding(
    State(broker): State<AppState>,
    Path((instance_id, binding_id)): Path<(String, String)>,
    AcceptsIncomplete(accepts_incomplete): AcceptsIncomplete,
    body: Bytes,
) -> HandlerResult {
    let payload = parse_payload(&body)?;
    respond(broker.bind(&instance_id, &binding_id, payload, accepts_incomplete)).await
}

pub async fn get_binding(
    State(broker): State<AppState>,
    Path((instance_id, binding_id)): Path<(String, String)>,
) -> HandlerResult {
    respond(broker.fetch_binding(&instance_id, &binding_id)).await
}

pub async fn delete_binding(
    State(broker): State<AppState>,
    Path((instance_id, binding_id)): Path<(String, String)>,
    AcceptsIncomplete(accepts_incomplete): AcceptsIncomplete,
) -> HandlerResult {
    respond(broker.unbind(&instance_id, &binding_id, accepts_incomplete)).await
}

pub async fn get_binding_last_operation(
    State(broker): State<AppState>,
    Path((instance_id, binding_id)): Path<(String, String)>,
) -> HandlerResult {
    respond(broker.binding_last_operation(&instance_id, &binding_id)).await
}

// Behavior configuration

pub async fn get_config(State(broker): State<AppState>) -> Result<Response, BrokerError> {
    pretty_json(&broker.config_snapshot())
}

pub async fn get_full_config(State(broker): State<AppState>) -> Result<Response, BrokerError> {
    pretty_json(&broker.full_snapshot()?)
}

pub async fn update_config(
    State(broker): State<AppState>,
    body: Bytes,
) -> Result<Response, BrokerError> {
    let patch: BehaviorPatch = serde_json::from_slice(&body)?;
    pretty_json(&broker.merge_config(patch))
}

pub async fn reset_config(State(broker): State<AppState>) -> Result<Response, BrokerError> {
    pretty_json(&broker.reset()?)
}
