use crate::infra::AppState;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::Extension;
use axum::Json;
use coverage_pricing::workflows::quotation::{
    dental_tiers, quotation_router, CatalogSource, QuotationService, QuotationStore,
};
use serde_json::json;
use std::sync::Arc;

pub(crate) fn with_quotation_routes<S, Q>(service: Arc<QuotationService<S, Q>>) -> axum::Router
where
    S: CatalogSource + 'static,
    Q: QuotationStore + 'static,
{
    quotation_router(service)
        .route("/health", axum::routing::get(healthcheck))
        .route("/ready", axum::routing::get(readiness_endpoint))
        .route("/metrics", axum::routing::get(metrics_endpoint))
        .route(
            "/api/v1/catalogs/dental",
            axum::routing::get(dental_catalog_endpoint),
        )
}

pub(crate) async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub(crate) async fn readiness_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    let ready = state.readiness.load(std::sync::atomic::Ordering::Relaxed);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let payload = if ready {
        json!({ "status": "ready" })
    } else {
        json!({ "status": "initializing" })
    };

    (status, Json(payload))
}

pub(crate) async fn metrics_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}

pub(crate) async fn dental_catalog_endpoint() -> Json<serde_json::Value> {
    Json(json!({ "tiers": dental_tiers() }))
}
