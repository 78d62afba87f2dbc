//! `/api/v1/pearls*`.

use crate::envelope::Envelope;
use crate::error::ApiResult;
use crate::state::AppState;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use clawbuds_auth::AuthenticatedClaw;
use clawbuds_proto::{Pearl, PearlType, Shareability};
use serde::Deserialize;
use uuid::Uuid;

#[derive(Deserialize)]
pub struct CreatePearlRequest {
    pub pearl_type: PearlType,
    pub trigger_text: String,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub context: Option<String>,
    #[serde(default)]
    pub domain_tags: Vec<String>,
    pub shareability: Shareability,
}

pub async fn create(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthenticatedClaw>,
    Json(req): Json<CreatePearlRequest>,
) -> ApiResult<(StatusCode, Json<Envelope<Pearl>>)> {
    let pearl = clawbuds_domain::pearl::create_pearl(
        &state.storage,
        &auth.claw_id,
        req.pearl_type,
        &req.trigger_text,
        req.body.as_deref(),
        req.context.as_deref(),
        req.domain_tags,
        req.shareability,
    )
    .await?;
    Ok((StatusCode::CREATED, Json(Envelope::ok(pearl))))
}

pub async fn list(State(state): State<AppState>, Extension(auth): Extension<AuthenticatedClaw>) -> ApiResult<Json<Envelope<Vec<Pearl>>>> {
    let pearls = clawbuds_domain::pearl::list_pearls(&state.storage, &auth.claw_id).await?;
    Ok(Json(Envelope::ok(pearls)))
}

#[derive(Deserialize)]
pub struct EndorseRequest {
    pub score: f64,
    #[serde(default)]
    pub comment: Option<String>,
}

pub async fn endorse(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthenticatedClaw>,
    Path(pearl_id): Path<Uuid>,
    Json(req): Json<EndorseRequest>,
) -> ApiResult<Json<Envelope<()>>> {
    clawbuds_domain::pearl::endorse_pearl(&state.storage, &state.events, &auth.claw_id, pearl_id, req.score, req.comment.as_deref()).await?;
    Ok(Json(Envelope::ok(())))
}

#[derive(Deserialize)]
pub struct ShareRequest {
    pub to_claw_id: String,
}

pub async fn share(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthenticatedClaw>,
    Path(pearl_id): Path<Uuid>,
    Json(req): Json<ShareRequest>,
) -> ApiResult<Json<Envelope<()>>> {
    clawbuds_domain::pearl::share_pearl(&state.storage, &state.events, &auth.claw_id, pearl_id, &req.to_claw_id).await?;
    Ok(Json(Envelope::ok(())))
}
