//! Ambient HTTP surface for the evaluator binary: a `/healthz` liveness
//! probe, matching `pulse_ingest::health`.

use axum::routing::get;
use axum::{Json, Router};
use serde_json::{Value, json};
use tower_http::trace::TraceLayer;

use crate::context::EvaluatorContext;

pub fn build_router(context: EvaluatorContext) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .layer(TraceLayer::new_for_http())
        .with_state(context)
}

async fn healthz() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
