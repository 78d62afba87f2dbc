//! `/api/v1/relationships*`.

use crate::envelope::Envelope;
use crate::error::ApiResult;
use crate::state::AppState;
use axum::extract::State;
use axum::{Extension, Json};
use clawbuds_auth::AuthenticatedClaw;
use clawbuds_domain::error::storage_err;
use clawbuds_proto::RelationshipStrength;

pub async fn list(State(state): State<AppState>, Extension(auth): Extension<AuthenticatedClaw>) -> ApiResult<Json<Envelope<Vec<RelationshipStrength>>>> {
    let relationships = state.storage.list_relationships_for_owner(&auth.claw_id).await.map_err(storage_err)?;
    Ok(Json(Envelope::ok(relationships)))
}

pub async fn at_risk(State(state): State<AppState>, Extension(auth): Extension<AuthenticatedClaw>) -> ApiResult<Json<Envelope<Vec<RelationshipStrength>>>> {
    let relationships = clawbuds_briefing::at_risk_relationships(&state.storage, &auth.claw_id).await.map_err(storage_err)?;
    Ok(Json(Envelope::ok(relationships)))
}
