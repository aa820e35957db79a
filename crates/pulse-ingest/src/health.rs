//! Ambient HTTP surface for the ingest binary: a `/healthz` liveness
//! probe plus the broker's CONNECT-auth delegation endpoint.
//!
//! The MQTT broker is external (`spec.md` §1's non-goals) and is
//! configured to call back into ingest over HTTP to authenticate a
//! device CONNECT (`spec.md` §4.2: "the broker delegates authentication
//! to ingest via a username/password probe").

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tower_http::trace::TraceLayer;

use crate::auth::{self, AuthOutcome};
use crate::context::IngestContext;

pub fn build_router(context: IngestContext) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/internal/mqtt-auth", post(mqtt_auth))
        .layer(TraceLayer::new_for_http())
        .with_state(context)
}

async fn healthz() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

#[derive(Debug, Deserialize)]
struct MqttAuthRequest {
    /// `"{tenant_id}:{device_id}"` per `spec.md` §6.
    username: String,
    password: String,
}

#[derive(Debug, Serialize)]
struct MqttAuthResponse {
    allow: bool,
}

async fn mqtt_auth(
    State(context): State<IngestContext>,
    Json(request): Json<MqttAuthRequest>,
) -> (StatusCode, Json<MqttAuthResponse>) {
    let Some((tenant_id, device_id)) = request.username.split_once(':') else {
        return (StatusCode::OK, Json(MqttAuthResponse { allow: false }));
    };

    let outcome = auth::authenticate(
        &context.gateway,
        &context.auth_cache,
        &context.config,
        tenant_id,
        device_id,
        &request.password,
    )
    .await;

    let allow = matches!(outcome, Ok(AuthOutcome::Allowed));
    (StatusCode::OK, Json(MqttAuthResponse { allow }))
}
