//! `/api/v1/reflexes*`.

use crate::envelope::Envelope;
use crate::error::ApiResult;
use crate::state::AppState;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use clawbuds_auth::AuthenticatedClaw;
use clawbuds_proto::{Reflex, ReflexSuggestion, TriggerLayer};
use serde::Deserialize;
use uuid::Uuid;

#[derive(Deserialize)]
pub struct CreateReflexRequest {
    pub name: String,
    pub value_layer: String,
    pub behavior: String,
    pub trigger_layer: TriggerLayer,
    pub trigger_config: serde_json::Value,
    pub confidence: f64,
}

pub async fn create(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthenticatedClaw>,
    Json(req): Json<CreateReflexRequest>,
) -> ApiResult<(StatusCode, Json<Envelope<Reflex>>)> {
    let reflex = clawbuds_domain::reflex::create_reflex(
        &state.storage,
        &auth.claw_id,
        &req.name,
        &req.value_layer,
        &req.behavior,
        req.trigger_layer,
        req.trigger_config,
        req.confidence,
    )
    .await?;
    Ok((StatusCode::CREATED, Json(Envelope::ok(reflex))))
}

pub async fn list(State(state): State<AppState>, Extension(auth): Extension<AuthenticatedClaw>) -> ApiResult<Json<Envelope<Vec<Reflex>>>> {
    let reflexes = clawbuds_domain::reflex::list_reflexes(&state.storage, &auth.claw_id).await?;
    Ok(Json(Envelope::ok(reflexes)))
}

pub async fn get(State(state): State<AppState>, Path(reflex_id): Path<Uuid>) -> ApiResult<Json<Envelope<Reflex>>> {
    let reflex = clawbuds_domain::reflex::get_reflex(&state.storage, reflex_id).await?;
    Ok(Json(Envelope::ok(reflex)))
}

pub async fn suggestions(State(state): State<AppState>, Extension(auth): Extension<AuthenticatedClaw>) -> ApiResult<Json<Envelope<Vec<ReflexSuggestion>>>> {
    let suggestions = clawbuds_domain::reflex::suggestions(&state.storage, &auth.claw_id).await?;
    Ok(Json(Envelope::ok(suggestions)))
}
