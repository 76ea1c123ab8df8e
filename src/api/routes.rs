use axum::{
    middleware,
    routing::{get, post, put},
    Router,
};
use tower_http::catch_panic::CatchPanicLayer;

use crate::api::diagnostics::{log_and_diagnose, panic_response};
use crate::api::handlers::{self, AppState};

pub fn create_router() -> Router<AppState> {
    Router::new()
        // Health check
        .route("/health", get(handlers::health_check))
        // Open Service Broker API
        .route("/v2/catalog", get(handlers::get_catalog))
        .route(
            "/v2/service_instances/:instance_id",
            put(handlers::provision_instance)
                .get(handlers::get_instance)
                .patch(handlers::update_instance)
                .delete(handlers::deprovision_instance),
        )
        .route(
            "/v2/service_instances/:instance_id/last_operation",
            get(handlers::get_instance_last_operation),
        )
        .route(
            "/v2/service_instances/:instance_id/service_bindings/:binding_id",
            put(handlers::create_binding)
                .get(handlers::get_binding)
                .delete(handlers::delete_binding),
        )
        .route(
            "/v2/service_instances/:instance_id/service_bindings/:binding_id/last_operation",
            get(handlers::get_binding_last_operation),
        )
        // Behavior configuration
        .route("/config", get(handlers::get_config).post(handlers::update_config))
        .route("/config/all", get(handlers::get_full_config))
        .route("/config/reset", post(handlers::reset_config))
}

/// Router with request logging and 500 diagnostics, bound to `broker`.
pub fn build_app(broker: AppState) -> Router {
    create_router()
        .layer(CatchPanicLayer::custom(panic_response))
        .layer(middleware::from_fn_with_state(broker.clone(), log_and_diagnose))
        .with_state(broker)
}
