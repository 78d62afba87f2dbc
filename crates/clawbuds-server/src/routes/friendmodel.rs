//! `/api/v1/friend-models/:friend_id`.

use crate::envelope::Envelope;
use crate::error::ApiResult;
use crate::state::AppState;
use axum::extract::{Path, State};
use axum::{Extension, Json};
use clawbuds_auth::AuthenticatedClaw;
use clawbuds_domain::error::storage_err;
use clawbuds_proto::{ApiError, FriendModel};

pub async fn get(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthenticatedClaw>,
    Path(friend_id): Path<String>,
) -> ApiResult<Json<Envelope<FriendModel>>> {
    let model = state
        .storage
        .get_friend_model(&auth.claw_id, &friend_id)
        .await
        .map_err(storage_err)?
        .ok_or_else(|| ApiError::not_found("no model observed for this friend yet"))?;
    Ok(Json(Envelope::ok(model)))
}
