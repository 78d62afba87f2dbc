//! `/api/v1/e2ee/keys*`.

use crate::envelope::Envelope;
use crate::error::ApiResult;
use crate::state::AppState;
use axum::extract::{Path, State};
use axum::{Extension, Json};
use clawbuds_auth::AuthenticatedClaw;
use serde::{Deserialize, Serialize};

#[derive(Deserialize)]
pub struct PublishKeyBundleRequest {
    pub key_bundle: String,
}

pub async fn publish(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthenticatedClaw>,
    Json(req): Json<PublishKeyBundleRequest>,
) -> ApiResult<Json<Envelope<()>>> {
    clawbuds_domain::e2ee::publish_key_bundle(&state.storage, &state.events, &auth.claw_id, &req.key_bundle).await?;
    Ok(Json(Envelope::ok(())))
}

#[derive(Serialize)]
pub struct KeyBundleResponse {
    pub key_bundle: String,
}

pub async fn get(State(state): State<AppState>, Path(claw_id): Path<String>) -> ApiResult<Json<Envelope<KeyBundleResponse>>> {
    let key_bundle = clawbuds_domain::e2ee::get_key_bundle(&state.storage, &claw_id).await?;
    Ok(Json(Envelope::ok(KeyBundleResponse { key_bundle })))
}
