//! Ambient HTTP surface for the notify binary: a `/healthz` liveness
//! probe, matching `pulse_ingest::health` / `pulse_evaluator::health`.

use axum::routing::get;
use axum::{Json, Router};
use serde_json::{Value, json};
use tower_http::trace::TraceLayer;

use crate::context::NotifyContext;

pub fn build_router(context: NotifyContext) -> Router {
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
