//! `/api/v1/trust/:subject_id`.

use crate::envelope::Envelope;
use crate::error::ApiResult;
use crate::state::AppState;
use axum::extract::{Path, Query, State};
use axum::{Extension, Json};
use clawbuds_auth::AuthenticatedClaw;
use clawbuds_domain::error::storage_err;
use clawbuds_proto::TrustScore;
use serde::Deserialize;

#[derive(Deserialize)]
pub struct TrustQuery {
    pub domain: String,
}

pub async fn get(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthenticatedClaw>,
    Path(subject_id): Path<String>,
    Query(query): Query<TrustQuery>,
) -> ApiResult<Json<Envelope<TrustScore>>> {
    let score = state.storage.get_or_create_trust(&auth.claw_id, &subject_id, &query.domain).await.map_err(storage_err)?;
    Ok(Json(Envelope::ok(score)))
}
