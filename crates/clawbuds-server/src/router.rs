//! Builds the full axum router: a health check, every authenticated
//! `/api/v1/*` route, and the websocket upgrade, each behind the
//! signed-request middleware and the per-request deadline.

use crate::deadline::{enforce_deadline, RequestDeadline};
use crate::routes;
use crate::state::AppState;
use crate::ws;
use axum::extract::Extension;
use axum::http::StatusCode;
use axum::middleware;
use axum::routing::{delete, get, patch, post};
use axum::{Json, Router};
use clawbuds_auth::AuthState;
use clawbuds_realtime::SocketLocalRealtime;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(routes::claw::register))
        .route("/me", get(routes::claw::me))
        .route("/me/profile", patch(routes::claw::update_profile))
        .route("/me/autonomy", patch(routes::claw::update_autonomy))
        .route("/me/status", patch(routes::claw::update_status))
        .route("/me/stats", get(routes::claw::stats))
        .route("/friends/request", post(routes::friendship::send_request))
        .route("/friends/requests", get(routes::friendship::list_requests))
        .route("/friends/accept", post(routes::friendship::accept))
        .route("/friends/reject", post(routes::friendship::reject))
        .route("/friends", get(routes::friendship::list_friends))
        .route("/friends/{claw_id}", delete(routes::friendship::remove))
        .route("/circles", post(routes::circle::create).get(routes::circle::list))
        .route("/circles/{id}", delete(routes::circle::delete))
        .route(
            "/circles/{id}/friends",
            post(routes::circle::add_friend).delete(routes::circle::remove_friend).get(routes::circle::list_friends),
        )
        .route("/groups", post(routes::group::create).get(routes::group::list))
        .route("/groups/invitations", get(routes::group::list_invitations))
        .route("/groups/{id}", get(routes::group::get).delete(routes::group::delete))
        .route("/groups/{id}/members", get(routes::group::list_members))
        .route(
            "/groups/{id}/members/{claw_id}",
            patch(routes::group::set_member_role).delete(routes::group::remove_member),
        )
        .route("/groups/{id}/invite", post(routes::group::invite))
        .route("/groups/{id}/join", post(routes::group::join))
        .route("/groups/{id}/leave", post(routes::group::leave))
        .route("/groups/{id}/reject", post(routes::group::reject_invitation))
        .route("/groups/{id}/messages", post(routes::group::send_message).get(routes::group::list_messages))
        .route("/messages", post(routes::message::send))
        .route(
            "/messages/{id}",
            get(routes::message::get).patch(routes::message::edit).delete(routes::message::delete),
        )
        .route("/messages/{id}/read", post(routes::message::mark_read))
        .route("/messages/{id}/ack", post(routes::message::ack))
        .route("/inbox", get(routes::message::inbox))
        .route(
            "/messages/{id}/reactions",
            post(routes::engagement::add_reaction).delete(routes::engagement::remove_reaction).get(routes::engagement::list_reactions),
        )
        .route(
            "/messages/{id}/votes",
            post(routes::engagement::cast_vote).get(routes::engagement::list_votes),
        )
        .route("/pearls", post(routes::pearl::create).get(routes::pearl::list))
        .route("/pearls/{id}/endorse", post(routes::pearl::endorse))
        .route("/pearls/{id}/share", post(routes::pearl::share))
        .route("/webhooks", post(routes::webhook::create).get(routes::webhook::list))
        .route("/webhooks/{id}", patch(routes::webhook::update).delete(routes::webhook::delete))
        .route("/webhooks/{id}/deliveries", get(routes::webhook::list_deliveries))
        .route("/e2ee/keys", post(routes::e2ee::publish))
        .route("/e2ee/keys/{claw_id}", get(routes::e2ee::get))
        .route("/reflexes", post(routes::reflex::create).get(routes::reflex::list))
        .route("/reflexes/{id}", get(routes::reflex::get))
        .route("/reflexes/suggestions", get(routes::reflex::suggestions))
        .route("/briefings/daily", post(routes::briefing::generate_daily))
        .route("/briefings/weekly", post(routes::briefing::generate_weekly))
        .route("/briefings", get(routes::briefing::list))
        .route("/briefings/{id}/acknowledge", post(routes::briefing::acknowledge))
        .route("/micro-molt/suggestions", get(routes::briefing::micro_molt_suggestions))
        .route("/micro-molt/apply", post(routes::briefing::apply_micro_molt))
        .route("/drafts", post(routes::draft::save).get(routes::draft::list))
        .route("/drafts/{id}", delete(routes::draft::delete))
        .route("/carapace", get(routes::carapace::current))
        .route("/carapace/history", get(routes::carapace::history))
        .route("/carapace/propose", post(routes::carapace::propose_amendment))
        .route("/carapace/evaluate", post(routes::carapace::evaluate))
        .route("/heartbeats", post(routes::heartbeat::send))
        .route("/relationships", get(routes::relationship::list))
        .route("/relationships/at-risk", get(routes::relationship::at_risk))
        .route("/friend-models/{friend_id}", get(routes::friendmodel::get))
        .route("/trust/{subject_id}", get(routes::trust::get))
}

pub fn build(app_state: AppState, auth_state: AuthState, sockets: Arc<SocketLocalRealtime>, request_deadline: Duration) -> Router {
    let authenticated = Router::new()
        .nest("/api/v1", api_routes())
        .route("/ws", get(ws::ws_handler))
        .layer(middleware::from_fn(enforce_deadline))
        .layer(Extension(RequestDeadline(request_deadline)))
        .layer(Extension(sockets))
        .layer(middleware::from_fn_with_state(auth_state, clawbuds_auth::require_signed_request))
        .with_state(app_state);

    Router::new()
        .route("/health", get(health))
        .merge(authenticated)
        .fallback(|| async { (StatusCode::NOT_FOUND, "not found") })
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
