//! `/api/v1/heartbeats*`.

use crate::envelope::Envelope;
use crate::error::ApiResult;
use crate::state::AppState;
use axum::extract::State;
use axum::http::StatusCode;
use axum::{Extension, Json};
use clawbuds_auth::AuthenticatedClaw;
use clawbuds_domain::error::storage_err;
use clawbuds_proto::{Heartbeat, HeartbeatState};
use serde::Deserialize;

#[derive(Deserialize)]
pub struct SendHeartbeatRequest {
    pub to_claw_id: String,
    #[serde(default)]
    pub interests: Option<Vec<String>>,
    #[serde(default)]
    pub availability: Option<String>,
    #[serde(default)]
    pub recent_topics: Option<Vec<String>>,
}

pub async fn send(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthenticatedClaw>,
    Json(req): Json<SendHeartbeatRequest>,
) -> ApiResult<(StatusCode, Json<Envelope<Heartbeat>>)> {
    let current = HeartbeatState { interests: req.interests, availability: req.availability, recent_topics: req.recent_topics };
    let heartbeat = clawbuds_friendmodel::emit_heartbeat(&state.storage, &state.events, &auth.claw_id, &req.to_claw_id, current)
        .await
        .map_err(storage_err)?;
    Ok((StatusCode::CREATED, Json(Envelope::ok(heartbeat))))
}
