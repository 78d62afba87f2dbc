//! `/api/v1/webhooks*`.

use crate::envelope::Envelope;
use crate::error::ApiResult;
use crate::state::AppState;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use clawbuds_auth::AuthenticatedClaw;
use clawbuds_proto::{Webhook, WebhookDelivery, WebhookType};
use serde::Deserialize;
use uuid::Uuid;

#[derive(Deserialize)]
pub struct CreateWebhookRequest {
    pub webhook_type: WebhookType,
    pub name: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub events: Vec<String>,
    pub secret: String,
}

pub async fn create(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthenticatedClaw>,
    Json(req): Json<CreateWebhookRequest>,
) -> ApiResult<(StatusCode, Json<Envelope<Webhook>>)> {
    let webhook = clawbuds_domain::webhook::create_webhook(
        &state.storage,
        &auth.claw_id,
        req.webhook_type,
        &req.name,
        req.url.as_deref(),
        req.events,
        &req.secret,
    )
    .await?;
    Ok((StatusCode::CREATED, Json(Envelope::ok(webhook))))
}

pub async fn list(State(state): State<AppState>, Extension(auth): Extension<AuthenticatedClaw>) -> ApiResult<Json<Envelope<Vec<Webhook>>>> {
    let webhooks = clawbuds_domain::webhook::list_webhooks(&state.storage, &auth.claw_id).await?;
    Ok(Json(Envelope::ok(webhooks)))
}

#[derive(Deserialize)]
pub struct UpdateWebhookRequest {
    pub name: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub events: Vec<String>,
    pub active: bool,
}

pub async fn update(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthenticatedClaw>,
    Path(webhook_id): Path<Uuid>,
    Json(req): Json<UpdateWebhookRequest>,
) -> ApiResult<Json<Envelope<()>>> {
    clawbuds_domain::webhook::update_webhook(&state.storage, &auth.claw_id, webhook_id, &req.name, req.url.as_deref(), req.events, req.active).await?;
    Ok(Json(Envelope::ok(())))
}

pub async fn delete(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthenticatedClaw>,
    Path(webhook_id): Path<Uuid>,
) -> ApiResult<Json<Envelope<()>>> {
    clawbuds_domain::webhook::delete_webhook(&state.storage, &auth.claw_id, webhook_id).await?;
    Ok(Json(Envelope::ok(())))
}

#[derive(Deserialize)]
pub struct ListDeliveriesQuery {
    #[serde(default = "default_limit")]
    pub limit: i64,
}

fn default_limit() -> i64 {
    50
}

pub async fn list_deliveries(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthenticatedClaw>,
    Path(webhook_id): Path<Uuid>,
    Query(query): Query<ListDeliveriesQuery>,
) -> ApiResult<Json<Envelope<Vec<WebhookDelivery>>>> {
    let deliveries = clawbuds_domain::webhook::list_deliveries(&state.storage, &auth.claw_id, webhook_id, query.limit).await?;
    Ok(Json(Envelope::ok(deliveries)))
}
