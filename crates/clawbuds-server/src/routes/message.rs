//! `/api/v1/messages*`, `/api/v1/inbox*`.

use crate::envelope::Envelope;
use crate::error::ApiResult;
use crate::state::AppState;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use clawbuds_auth::AuthenticatedClaw;
use clawbuds_proto::{Block, InboxEntry, Message, SendMessageRequest, SendMessageResult};
use serde::Deserialize;
use uuid::Uuid;

pub async fn send(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthenticatedClaw>,
    Json(req): Json<SendMessageRequest>,
) -> ApiResult<(StatusCode, Json<Envelope<SendMessageResult>>)> {
    let result = clawbuds_domain::message::send_message(&state.storage, &state.events, &auth.claw_id, req).await?;
    Ok((StatusCode::CREATED, Json(Envelope::ok(result))))
}

pub async fn get(State(state): State<AppState>, Path(message_id): Path<Uuid>) -> ApiResult<Json<Envelope<Message>>> {
    let message = clawbuds_domain::message::get_message(&state.storage, message_id).await?;
    Ok(Json(Envelope::ok(message)))
}

#[derive(Deserialize)]
pub struct EditMessageRequest {
    pub blocks: Vec<Block>,
}

pub async fn edit(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthenticatedClaw>,
    Path(message_id): Path<Uuid>,
    Json(req): Json<EditMessageRequest>,
) -> ApiResult<Json<Envelope<()>>> {
    clawbuds_domain::message::edit_message(&state.storage, &state.events, &auth.claw_id, message_id, req.blocks).await?;
    Ok(Json(Envelope::ok(())))
}

pub async fn delete(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthenticatedClaw>,
    Path(message_id): Path<Uuid>,
) -> ApiResult<Json<Envelope<()>>> {
    clawbuds_domain::message::delete_message(&state.storage, &state.events, &auth.claw_id, message_id).await?;
    Ok(Json(Envelope::ok(())))
}

#[derive(Deserialize)]
pub struct InboxQuery {
    #[serde(default)]
    pub after_seq: i64,
    #[serde(default = "default_limit")]
    pub limit: i64,
}

fn default_limit() -> i64 {
    50
}

pub async fn inbox(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthenticatedClaw>,
    Query(query): Query<InboxQuery>,
) -> ApiResult<Json<Envelope<Vec<InboxEntry>>>> {
    let entries = clawbuds_domain::message::list_inbox(&state.storage, &auth.claw_id, query.after_seq, query.limit).await?;
    Ok(Json(Envelope::ok(entries)))
}

pub async fn mark_read(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthenticatedClaw>,
    Path(message_id): Path<Uuid>,
) -> ApiResult<Json<Envelope<()>>> {
    clawbuds_domain::message::mark_read(&state.storage, &auth.claw_id, message_id).await?;
    Ok(Json(Envelope::ok(())))
}

pub async fn ack(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthenticatedClaw>,
    Path(message_id): Path<Uuid>,
) -> ApiResult<Json<Envelope<()>>> {
    clawbuds_domain::message::ack_message(&state.storage, &auth.claw_id, message_id).await?;
    Ok(Json(Envelope::ok(())))
}
