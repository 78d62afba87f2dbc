//! `/api/v1/groups*`.

use crate::envelope::Envelope;
use crate::error::ApiResult;
use crate::state::AppState;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use clawbuds_auth::AuthenticatedClaw;
use clawbuds_domain::error::storage_err;
use clawbuds_proto::{ApiError, Group, GroupInvitation, GroupMember, GroupRole, GroupType, Message, SendMessageRequest, SendMessageResult};
use serde::Deserialize;
use uuid::Uuid;

#[derive(Deserialize)]
pub struct CreateGroupRequest {
    pub name: String,
    pub group_type: GroupType,
    pub max_members: u32,
    #[serde(default)]
    pub encrypted: bool,
}

pub async fn create(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthenticatedClaw>,
    Json(req): Json<CreateGroupRequest>,
) -> ApiResult<(StatusCode, Json<Envelope<Group>>)> {
    let group = clawbuds_domain::group::create_group(&state.storage, &auth.claw_id, &req.name, req.group_type, req.max_members, req.encrypted).await?;
    Ok((StatusCode::CREATED, Json(Envelope::ok(group))))
}

pub async fn list(State(state): State<AppState>, Extension(auth): Extension<AuthenticatedClaw>) -> ApiResult<Json<Envelope<Vec<Group>>>> {
    let groups = state.storage.list_groups_for_member(&auth.claw_id).await.map_err(storage_err)?;
    Ok(Json(Envelope::ok(groups)))
}

pub async fn get(State(state): State<AppState>, Path(group_id): Path<Uuid>) -> ApiResult<Json<Envelope<Group>>> {
    let group = state.storage.get_group(group_id).await.map_err(storage_err)?.ok_or_else(|| ApiError::not_found("no such group"))?;
    Ok(Json(Envelope::ok(group)))
}

pub async fn delete(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthenticatedClaw>,
    Path(group_id): Path<Uuid>,
) -> ApiResult<Json<Envelope<()>>> {
    clawbuds_domain::group::delete_group(&state.storage, &auth.claw_id, group_id).await?;
    Ok(Json(Envelope::ok(())))
}

pub async fn list_members(State(state): State<AppState>, Path(group_id): Path<Uuid>) -> ApiResult<Json<Envelope<Vec<GroupMember>>>> {
    let members = state.storage.list_group_members(group_id).await.map_err(storage_err)?;
    Ok(Json(Envelope::ok(members)))
}

#[derive(Deserialize)]
pub struct SetRoleRequest {
    pub role: GroupRole,
}

pub async fn set_member_role(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthenticatedClaw>,
    Path((group_id, target_id)): Path<(Uuid, String)>,
    Json(req): Json<SetRoleRequest>,
) -> ApiResult<Json<Envelope<()>>> {
    clawbuds_domain::group::set_member_role(&state.storage, group_id, &auth.claw_id, &target_id, req.role).await?;
    Ok(Json(Envelope::ok(())))
}

pub async fn remove_member(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthenticatedClaw>,
    Path((group_id, target_id)): Path<(Uuid, String)>,
) -> ApiResult<Json<Envelope<()>>> {
    clawbuds_domain::group::remove_member(&state.storage, &state.events, group_id, &auth.claw_id, &target_id).await?;
    Ok(Json(Envelope::ok(())))
}

#[derive(Deserialize)]
pub struct InviteRequest {
    pub claw_id: String,
}

pub async fn invite(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthenticatedClaw>,
    Path(group_id): Path<Uuid>,
    Json(req): Json<InviteRequest>,
) -> ApiResult<(StatusCode, Json<Envelope<GroupInvitation>>)> {
    let invitation = clawbuds_domain::group::invite_member(&state.storage, &state.events, group_id, &auth.claw_id, &req.claw_id).await?;
    Ok((StatusCode::CREATED, Json(Envelope::ok(invitation))))
}

pub async fn join(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthenticatedClaw>,
    Path(group_id): Path<Uuid>,
) -> ApiResult<Json<Envelope<()>>> {
    clawbuds_domain::group::join_group(&state.storage, &state.events, group_id, &auth.claw_id).await?;
    Ok(Json(Envelope::ok(())))
}

pub async fn leave(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthenticatedClaw>,
    Path(group_id): Path<Uuid>,
) -> ApiResult<Json<Envelope<()>>> {
    clawbuds_domain::group::leave_group(&state.storage, &state.events, group_id, &auth.claw_id).await?;
    Ok(Json(Envelope::ok(())))
}

pub async fn reject_invitation(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthenticatedClaw>,
    Path(group_id): Path<Uuid>,
) -> ApiResult<Json<Envelope<()>>> {
    clawbuds_domain::group::reject_invitation(&state.storage, group_id, &auth.claw_id).await?;
    Ok(Json(Envelope::ok(())))
}

pub async fn list_invitations(State(state): State<AppState>, Extension(auth): Extension<AuthenticatedClaw>) -> ApiResult<Json<Envelope<Vec<GroupInvitation>>>> {
    let invitations = state.storage.list_invitations(&auth.claw_id).await.map_err(storage_err)?;
    Ok(Json(Envelope::ok(invitations)))
}

pub async fn send_message(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthenticatedClaw>,
    Path(group_id): Path<Uuid>,
    Json(mut req): Json<SendMessageRequest>,
) -> ApiResult<(StatusCode, Json<Envelope<SendMessageResult>>)> {
    req.group_id = Some(group_id);
    let result = clawbuds_domain::message::send_message(&state.storage, &state.events, &auth.claw_id, req).await?;
    Ok((StatusCode::CREATED, Json(Envelope::ok(result))))
}

#[derive(Deserialize)]
pub struct ListMessagesQuery {
    #[serde(default = "default_limit")]
    pub limit: i64,
}

fn default_limit() -> i64 {
    50
}

pub async fn list_messages(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthenticatedClaw>,
    Path(group_id): Path<Uuid>,
    Query(query): Query<ListMessagesQuery>,
) -> ApiResult<Json<Envelope<Vec<Message>>>> {
    let messages = clawbuds_domain::message::group_messages(&state.storage, &auth.claw_id, group_id, query.limit).await?;
    Ok(Json(Envelope::ok(messages)))
}
