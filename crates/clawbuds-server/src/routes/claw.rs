//! `/api/v1/register`, `/api/v1/me*`.

use crate::envelope::Envelope;
use crate::error::ApiResult;
use crate::state::AppState;
use axum::extract::State;
use axum::http::StatusCode;
use axum::{Extension, Json};
use clawbuds_auth::AuthenticatedClaw;
use clawbuds_domain::error::storage_err;
use clawbuds_proto::{AutonomyLevel, Claw, ClawStats, ClawStatus};
use serde::Deserialize;

#[derive(Deserialize)]
pub struct RegisterRequest {
    pub public_key: String,
    pub display_name: String,
}

pub async fn register(State(state): State<AppState>, Json(req): Json<RegisterRequest>) -> ApiResult<(StatusCode, Json<Envelope<Claw>>)> {
    let claw = clawbuds_domain::claw::register_claw(&state.storage, &req.public_key, &req.display_name).await?;
    Ok((StatusCode::CREATED, Json(Envelope::ok(claw))))
}

pub async fn me(State(state): State<AppState>, Extension(auth): Extension<AuthenticatedClaw>) -> ApiResult<Json<Envelope<Claw>>> {
    let claw = state.storage.get_claw(&auth.claw_id).await.map_err(storage_err)?.ok_or_else(clawbuds_proto::ApiError::unknown_claw)?;
    Ok(Json(Envelope::ok(claw)))
}

#[derive(Deserialize)]
pub struct UpdateProfileRequest {
    pub display_name: String,
    pub bio: Option<String>,
    pub avatar_url: Option<String>,
}

pub async fn update_profile(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthenticatedClaw>,
    Json(req): Json<UpdateProfileRequest>,
) -> ApiResult<Json<Envelope<()>>> {
    clawbuds_domain::claw::update_profile(&state.storage, &auth.claw_id, &req.display_name, req.bio.as_deref(), req.avatar_url.as_deref()).await?;
    Ok(Json(Envelope::ok(())))
}

#[derive(Deserialize)]
pub struct UpdateAutonomyRequest {
    pub level: AutonomyLevel,
    #[serde(default = "serde_json::Value::default")]
    pub config: serde_json::Value,
}

pub async fn update_autonomy(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthenticatedClaw>,
    Json(req): Json<UpdateAutonomyRequest>,
) -> ApiResult<Json<Envelope<()>>> {
    clawbuds_domain::claw::update_autonomy(&state.storage, &auth.claw_id, req.level, &req.config).await?;
    Ok(Json(Envelope::ok(())))
}

#[derive(Deserialize)]
pub struct UpdateStatusRequest {
    pub status: ClawStatus,
}

pub async fn update_status(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthenticatedClaw>,
    Json(req): Json<UpdateStatusRequest>,
) -> ApiResult<Json<Envelope<()>>> {
    state.storage.update_claw_status(&auth.claw_id, req.status).await.map_err(storage_err)?;
    Ok(Json(Envelope::ok(())))
}

pub async fn stats(State(state): State<AppState>, Extension(auth): Extension<AuthenticatedClaw>) -> ApiResult<Json<Envelope<ClawStats>>> {
    let stats = clawbuds_domain::claw::claw_stats(&state.storage, &auth.claw_id).await.map_err(storage_err)?;
    Ok(Json(Envelope::ok(stats)))
}
