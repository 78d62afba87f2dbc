//! `/api/v1/carapace*`.

use crate::envelope::Envelope;
use crate::error::ApiResult;
use crate::state::AppState;
use axum::extract::State;
use axum::{Extension, Json};
use clawbuds_auth::AuthenticatedClaw;
use clawbuds_proto::{CarapaceDecision, CarapaceHistory};
use serde::{Deserialize, Serialize};

pub async fn current(State(state): State<AppState>, Extension(auth): Extension<AuthenticatedClaw>) -> ApiResult<Json<Envelope<Option<CarapaceHistory>>>> {
    let current = clawbuds_domain::carapace::current(&state.storage, &auth.claw_id).await?;
    Ok(Json(Envelope::ok(current)))
}

pub async fn history(State(state): State<AppState>, Extension(auth): Extension<AuthenticatedClaw>) -> ApiResult<Json<Envelope<Vec<CarapaceHistory>>>> {
    let history = clawbuds_domain::carapace::history(&state.storage, &auth.claw_id).await?;
    Ok(Json(Envelope::ok(history)))
}

#[derive(Deserialize)]
pub struct ProposeAmendmentRequest {
    pub document: serde_json::Value,
}

pub async fn propose_amendment(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthenticatedClaw>,
    Json(req): Json<ProposeAmendmentRequest>,
) -> ApiResult<Json<Envelope<CarapaceHistory>>> {
    let history = clawbuds_domain::carapace::propose_amendment(&state.storage, &auth.claw_id, &req.document).await?;
    Ok(Json(Envelope::ok(history)))
}

#[derive(Deserialize)]
pub struct EvaluateRequest {
    pub action: String,
}

#[derive(Serialize)]
pub struct EvaluateResponse {
    pub decision: CarapaceDecision,
}

pub async fn evaluate(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthenticatedClaw>,
    Json(req): Json<EvaluateRequest>,
) -> ApiResult<Json<Envelope<EvaluateResponse>>> {
    let decision = clawbuds_domain::carapace::evaluate(&state.storage, &auth.claw_id, &req.action).await?;
    Ok(Json(Envelope::ok(EvaluateResponse { decision })))
}
