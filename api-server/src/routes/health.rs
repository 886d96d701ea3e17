//! Health check endpoint

use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;

use crate::state::AppState;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct HealthResponse {
    status: String,
    version: String,
    create_gate_in_flight: usize,
    create_gate_capacity: usize,
    create_gate_rejected_total: u64,
    edit_gate_locked: bool,
}

async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        create_gate_in_flight: state.create_gate().in_flight(),
        create_gate_capacity: state.create_gate().capacity(),
        create_gate_rejected_total: state.create_gate().rejected_total(),
        edit_gate_locked: state.edit_gate().is_locked(),
    })
}

pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
