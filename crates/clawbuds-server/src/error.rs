//! Maps [`clawbuds_proto::ApiError`] onto an HTTP response. Separate from
//! `clawbuds_auth`'s own (private) mapping because every route handler here
//! needs to perform the same conversion via `?`.

use crate::envelope::Envelope;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use clawbuds_proto::ApiError;

pub struct ErrorResponse(pub ApiError);

impl From<ApiError> for ErrorResponse {
    fn from(e: ApiError) -> Self {
        Self(e)
    }
}

impl IntoResponse for ErrorResponse {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.0.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(Envelope::<()>::err(&self.0))).into_response()
    }
}

pub type ApiResult<T> = Result<T, ErrorResponse>;
