//! Per-request deadline: a request that hasn't produced a response within
//! `CLAWBUDS_REQUEST_DEADLINE_SECS` is aborted with 504 rather than left to
//! hang a connection indefinitely.

use crate::envelope::Envelope;
use axum::extract::Request;
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::{Extension, Json};
use clawbuds_proto::ErrorBody;
use std::time::Duration;

#[derive(Clone, Copy)]
pub struct RequestDeadline(pub Duration);

pub async fn enforce_deadline(Extension(deadline): Extension<RequestDeadline>, request: Request, next: Next) -> Response {
    match tokio::time::timeout(deadline.0, next.run(request)).await {
        Ok(response) => response,
        Err(_) => {
            let body = Envelope::<()> {
                success: false,
                data: None,
                error: Some(ErrorBody {
                    code: "DEADLINE_EXCEEDED".into(),
                    message: "request exceeded the configured deadline".into(),
                    details: None,
                }),
            };
            (StatusCode::GATEWAY_TIMEOUT, Json(body)).into_response()
        }
    }
}
