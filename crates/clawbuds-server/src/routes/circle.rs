//! `/api/v1/circles*`.

use crate::envelope::Envelope;
use crate::error::ApiResult;
use crate::state::AppState;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use clawbuds_auth::AuthenticatedClaw;
use clawbuds_domain::error::storage_err;
use clawbuds_proto::Circle;
use serde::Deserialize;
use uuid::Uuid;

#[derive(Deserialize)]
pub struct CreateCircleRequest {
    pub name: String,
}

pub async fn create(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthenticatedClaw>,
    Json(req): Json<CreateCircleRequest>,
) -> ApiResult<(StatusCode, Json<Envelope<Circle>>)> {
    let circle = clawbuds_domain::circle::create_circle(&state.storage, &auth.claw_id, &req.name).await?;
    Ok((StatusCode::CREATED, Json(Envelope::ok(circle))))
}

pub async fn list(State(state): State<AppState>, Extension(auth): Extension<AuthenticatedClaw>) -> ApiResult<Json<Envelope<Vec<Circle>>>> {
    let circles = state.storage.list_circles(&auth.claw_id).await.map_err(storage_err)?;
    Ok(Json(Envelope::ok(circles)))
}

pub async fn delete(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthenticatedClaw>,
    Path(circle_id): Path<Uuid>,
) -> ApiResult<Json<Envelope<()>>> {
    clawbuds_domain::circle::delete_circle(&state.storage, &auth.claw_id, circle_id).await?;
    Ok(Json(Envelope::ok(())))
}

#[derive(Deserialize)]
pub struct CircleFriendRequest {
    pub friend_id: String,
}

pub async fn add_friend(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthenticatedClaw>,
    Path(circle_id): Path<Uuid>,
    Json(req): Json<CircleFriendRequest>,
) -> ApiResult<Json<Envelope<()>>> {
    clawbuds_domain::circle::add_member(&state.storage, &auth.claw_id, circle_id, &req.friend_id).await?;
    Ok(Json(Envelope::ok(())))
}

pub async fn remove_friend(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthenticatedClaw>,
    Path(circle_id): Path<Uuid>,
    Json(req): Json<CircleFriendRequest>,
) -> ApiResult<Json<Envelope<()>>> {
    clawbuds_domain::circle::remove_member(&state.storage, &auth.claw_id, circle_id, &req.friend_id).await?;
    Ok(Json(Envelope::ok(())))
}

pub async fn list_friends(
    State(state): State<AppState>,
    Path(circle_id): Path<Uuid>,
) -> ApiResult<Json<Envelope<Vec<String>>>> {
    let members = state.storage.list_circle_members(circle_id).await.map_err(storage_err)?;
    Ok(Json(Envelope::ok(members)))
}
