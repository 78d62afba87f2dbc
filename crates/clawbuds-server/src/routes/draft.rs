//! `/api/v1/drafts*`.

use crate::envelope::Envelope;
use crate::error::ApiResult;
use crate::state::AppState;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use clawbuds_auth::AuthenticatedClaw;
use clawbuds_storage::engagement::MessageDraft;
use serde::Deserialize;
use uuid::Uuid;

#[derive(Deserialize)]
pub struct SaveDraftRequest {
    pub content: String,
}

pub async fn save(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthenticatedClaw>,
    Json(req): Json<SaveDraftRequest>,
) -> ApiResult<(StatusCode, Json<Envelope<MessageDraft>>)> {
    let draft = clawbuds_domain::draft::save_draft(&state.storage, &auth.claw_id, &req.content).await?;
    Ok((StatusCode::CREATED, Json(Envelope::ok(draft))))
}

pub async fn list(State(state): State<AppState>, Extension(auth): Extension<AuthenticatedClaw>) -> ApiResult<Json<Envelope<Vec<MessageDraft>>>> {
    let drafts = clawbuds_domain::draft::list_drafts(&state.storage, &auth.claw_id).await?;
    Ok(Json(Envelope::ok(drafts)))
}

pub async fn delete(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthenticatedClaw>,
    Path(draft_id): Path<Uuid>,
) -> ApiResult<Json<Envelope<()>>> {
    clawbuds_domain::draft::delete_draft(&state.storage, &auth.claw_id, draft_id).await?;
    Ok(Json(Envelope::ok(())))
}
