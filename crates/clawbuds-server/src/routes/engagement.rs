//! `/api/v1/messages/:id/reactions*`, `/api/v1/messages/:id/votes*`.

use crate::envelope::Envelope;
use crate::error::ApiResult;
use crate::state::AppState;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use clawbuds_auth::AuthenticatedClaw;
use clawbuds_storage::engagement::{PollVote, Reaction};
use serde::Deserialize;
use uuid::Uuid;

#[derive(Deserialize)]
pub struct ReactionRequest {
    pub emoji: String,
}

pub async fn add_reaction(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthenticatedClaw>,
    Path(message_id): Path<Uuid>,
    Json(req): Json<ReactionRequest>,
) -> ApiResult<(StatusCode, Json<Envelope<()>>)> {
    clawbuds_domain::engagement::add_reaction(&state.storage, &state.events, &auth.claw_id, message_id, &req.emoji).await?;
    Ok((StatusCode::CREATED, Json(Envelope::ok(()))))
}

pub async fn remove_reaction(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthenticatedClaw>,
    Path(message_id): Path<Uuid>,
    Json(req): Json<ReactionRequest>,
) -> ApiResult<Json<Envelope<()>>> {
    clawbuds_domain::engagement::remove_reaction(&state.storage, &state.events, &auth.claw_id, message_id, &req.emoji).await?;
    Ok(Json(Envelope::ok(())))
}

pub async fn list_reactions(State(state): State<AppState>, Path(message_id): Path<Uuid>) -> ApiResult<Json<Envelope<Vec<Reaction>>>> {
    let reactions = clawbuds_domain::engagement::list_reactions(&state.storage, message_id).await?;
    Ok(Json(Envelope::ok(reactions)))
}

#[derive(Deserialize)]
pub struct PollVoteRequest {
    pub option_index: i64,
}

pub async fn cast_vote(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthenticatedClaw>,
    Path(message_id): Path<Uuid>,
    Json(req): Json<PollVoteRequest>,
) -> ApiResult<(StatusCode, Json<Envelope<()>>)> {
    clawbuds_domain::engagement::cast_poll_vote(&state.storage, &state.events, &auth.claw_id, message_id, req.option_index).await?;
    Ok((StatusCode::CREATED, Json(Envelope::ok(()))))
}

pub async fn list_votes(State(state): State<AppState>, Path(message_id): Path<Uuid>) -> ApiResult<Json<Envelope<Vec<PollVote>>>> {
    let votes = clawbuds_domain::engagement::list_poll_votes(&state.storage, message_id).await?;
    Ok(Json(Envelope::ok(votes)))
}
