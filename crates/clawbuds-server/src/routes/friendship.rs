//! `/api/v1/friends*`.

use crate::envelope::Envelope;
use crate::error::ApiResult;
use crate::state::AppState;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use clawbuds_auth::AuthenticatedClaw;
use clawbuds_domain::error::storage_err;
use clawbuds_proto::Friendship;
use serde::Deserialize;
use uuid::Uuid;

#[derive(Deserialize)]
pub struct FriendRequestBody {
    pub claw_id: String,
}

pub async fn send_request(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthenticatedClaw>,
    Json(req): Json<FriendRequestBody>,
) -> ApiResult<(StatusCode, Json<Envelope<Friendship>>)> {
    let friendship = clawbuds_domain::friendship::send_request(&state.storage, &state.events, &auth.claw_id, &req.claw_id).await?;
    Ok((StatusCode::CREATED, Json(Envelope::ok(friendship))))
}

pub async fn list_requests(State(state): State<AppState>, Extension(auth): Extension<AuthenticatedClaw>) -> ApiResult<Json<Envelope<Vec<Friendship>>>> {
    let pending = state.storage.list_pending_requests(&auth.claw_id).await.map_err(storage_err)?;
    Ok(Json(Envelope::ok(pending)))
}

#[derive(Deserialize)]
pub struct FriendshipIdBody {
    pub friendship_id: Uuid,
}

pub async fn accept(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthenticatedClaw>,
    Json(req): Json<FriendshipIdBody>,
) -> ApiResult<Json<Envelope<()>>> {
    clawbuds_domain::friendship::accept_request(&state.storage, &state.events, &auth.claw_id, req.friendship_id).await?;
    Ok(Json(Envelope::ok(())))
}

pub async fn reject(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthenticatedClaw>,
    Json(req): Json<FriendshipIdBody>,
) -> ApiResult<Json<Envelope<()>>> {
    clawbuds_domain::friendship::reject_request(&state.storage, &auth.claw_id, req.friendship_id).await?;
    Ok(Json(Envelope::ok(())))
}

pub async fn list_friends(State(state): State<AppState>, Extension(auth): Extension<AuthenticatedClaw>) -> ApiResult<Json<Envelope<Vec<String>>>> {
    let friends = state.storage.list_friends(&auth.claw_id).await.map_err(storage_err)?;
    Ok(Json(Envelope::ok(friends)))
}

pub async fn remove(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthenticatedClaw>,
    Path(friend_id): Path<String>,
) -> ApiResult<Json<Envelope<()>>> {
    clawbuds_domain::friendship::remove_friend(&state.storage, &auth.claw_id, &friend_id).await?;
    Ok(Json(Envelope::ok(())))
}
