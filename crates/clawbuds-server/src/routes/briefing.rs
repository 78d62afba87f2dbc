//! `/api/v1/briefings*`, `/api/v1/micro-molt*`.

use crate::envelope::Envelope;
use crate::error::ApiResult;
use crate::state::AppState;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use clawbuds_auth::AuthenticatedClaw;
use clawbuds_domain::error::storage_err;
use clawbuds_proto::{Briefing, CarapaceHistory, MicroMoltSuggestion};
use serde::Deserialize;
use uuid::Uuid;

#[derive(Deserialize)]
pub struct ApplyMicroMoltRequest {
    pub claw_id: String,
    pub summary: String,
    pub proposed_diff: serde_json::Value,
    pub confidence: f64,
}

pub async fn generate_daily(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthenticatedClaw>,
) -> ApiResult<(StatusCode, Json<Envelope<Briefing>>)> {
    let briefing = clawbuds_briefing::generate_daily_briefing(&state.storage, &auth.claw_id).await.map_err(storage_err)?;
    Ok((StatusCode::CREATED, Json(Envelope::ok(briefing))))
}

pub async fn generate_weekly(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthenticatedClaw>,
) -> ApiResult<(StatusCode, Json<Envelope<Briefing>>)> {
    let briefing = clawbuds_briefing::generate_weekly_briefing(&state.storage, &auth.claw_id).await.map_err(storage_err)?;
    Ok((StatusCode::CREATED, Json(Envelope::ok(briefing))))
}

#[derive(Deserialize)]
pub struct ListBriefingsQuery {
    #[serde(default = "default_limit")]
    pub limit: i64,
}

fn default_limit() -> i64 {
    20
}

pub async fn list(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthenticatedClaw>,
    Query(query): Query<ListBriefingsQuery>,
) -> ApiResult<Json<Envelope<Vec<Briefing>>>> {
    let briefings = state.storage.list_briefings(&auth.claw_id, query.limit).await.map_err(storage_err)?;
    Ok(Json(Envelope::ok(briefings)))
}

pub async fn acknowledge(State(state): State<AppState>, Path(briefing_id): Path<Uuid>) -> ApiResult<Json<Envelope<()>>> {
    clawbuds_briefing::acknowledge_briefing(&state.storage, briefing_id).await.map_err(storage_err)?;
    Ok(Json(Envelope::ok(())))
}

pub async fn micro_molt_suggestions(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthenticatedClaw>,
) -> ApiResult<Json<Envelope<Vec<MicroMoltSuggestion>>>> {
    let suggestions = clawbuds_briefing::micro_molt_suggestions(&state.storage, &auth.claw_id).await.map_err(storage_err)?;
    Ok(Json(Envelope::ok(suggestions)))
}

pub async fn apply_micro_molt(
    State(state): State<AppState>,
    Json(req): Json<ApplyMicroMoltRequest>,
) -> ApiResult<Json<Envelope<Option<CarapaceHistory>>>> {
    let suggestion = MicroMoltSuggestion { claw_id: req.claw_id, summary: req.summary, proposed_diff: req.proposed_diff, confidence: req.confidence };
    let history = clawbuds_briefing::apply_micro_molt(&state.storage, &suggestion).await.map_err(storage_err)?;
    Ok(Json(Envelope::ok(history)))
}
