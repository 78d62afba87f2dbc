//! Request authentication: the three-header signed-request scheme.
//!
//! Every authenticated call carries `X-Claw-Id`, `X-Claw-Timestamp`, and
//! `X-Claw-Signature`. The signature covers `method + "\n" + path + "\n" +
//! timestamp + "\n" + body` as raw bytes, signed with the claw's Ed25519
//! key (mirrors `clawbuds_identity::build_signed_message`).

#![forbid(unsafe_code)]

use axum::body::{to_bytes, Body};
use axum::extract::{Request, State};
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::Utc;
use clawbuds_proto::ApiError;
use clawbuds_storage::Storage;
use std::sync::Arc;
use tracing::{debug, warn};

/// Header names for the signed-request scheme.
pub const HEADER_CLAW_ID: &str = "x-claw-id";
pub const HEADER_TIMESTAMP: &str = "x-claw-timestamp";
pub const HEADER_SIGNATURE: &str = "x-claw-signature";

const MAX_BODY_BYTES: usize = 5 * 1024 * 1024;

#[derive(Clone)]
pub struct AuthState {
    pub storage: Arc<Storage>,
    pub skew_secs: i64,
}

impl AuthState {
    pub fn new(storage: Arc<Storage>, skew_secs: i64) -> Self {
        Self { storage, skew_secs }
    }
}

/// Identity established by a successful signature check; inserted as a
/// request extension so downstream handlers can read `who called this`.
#[derive(Debug, Clone)]
pub struct AuthenticatedClaw {
    pub claw_id: String,
}

fn into_response(err: ApiError) -> Response {
    let status = StatusCode::from_u16(err.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let body = clawbuds_proto::ErrorBody::from(&err);
    (status, Json(body)).into_response()
}

pub async fn require_signed_request(
    State(state): State<AuthState>,
    request: Request,
    next: Next,
) -> Response {
    match authenticate(&state, request).await {
        Ok(request) => next.run(request).await,
        Err(err) => {
            debug!(code = err.code(), "rejected unauthenticated request");
            into_response(err)
        }
    }
}

async fn authenticate(state: &AuthState, request: Request) -> Result<Request, ApiError> {
    let claw_id = header_str(&request, HEADER_CLAW_ID)
        .ok_or_else(ApiError::unknown_claw)?;
    let timestamp_str = header_str(&request, HEADER_TIMESTAMP)
        .ok_or_else(|| ApiError::bad_signature("missing X-Claw-Timestamp header"))?;
    let signature = header_str(&request, HEADER_SIGNATURE)
        .ok_or_else(|| ApiError::bad_signature("missing X-Claw-Signature header"))?;

    let timestamp_ms: i64 = timestamp_str
        .parse()
        .map_err(|_| ApiError::bad_signature("timestamp is not a valid integer"))?;
    let now_ms = Utc::now().timestamp_millis();
    if (now_ms - timestamp_ms).abs() > state.skew_secs * 1000 {
        return Err(ApiError::timestamp_skew());
    }

    let claw = state
        .storage
        .get_claw(&claw_id)
        .await
        .map_err(|_| ApiError::unknown_claw())?
        .ok_or_else(ApiError::unknown_claw)?;

    let method = request.method().as_str().to_string();
    let path = request.uri().path().to_string();
    let (parts, body) = request.into_parts();
    let bytes = to_bytes(body, MAX_BODY_BYTES)
        .await
        .map_err(|_| ApiError::validation("body exceeds maximum size or is unreadable"))?;

    let message = clawbuds_identity::build_signed_message(&method, &path, timestamp_ms, &bytes);
    clawbuds_identity::verify_signature(&claw.public_key, &message, signature).map_err(|_| {
        warn!(%claw_id, "signature verification failed");
        ApiError::bad_signature("signature verification failed")
    })?;

    let mut request = Request::from_parts(parts, Body::from(bytes));
    request.extensions_mut().insert(AuthenticatedClaw { claw_id });
    Ok(request)
}

fn header_str<'a>(request: &'a Request, name: &str) -> Option<&'a str> {
    request.headers().get(name).and_then(|v| v.to_str().ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request as HttpRequest;
    use clawbuds_identity::ClawIdentity;
    use clawbuds_proto::Claw;

    async fn state_with_claw(identity: &ClawIdentity) -> (AuthState, Claw) {
        let storage = Storage::connect("sqlite::memory:").await.unwrap();
        storage.migrate().await.unwrap();
        let claw = Claw {
            claw_id: identity.claw_id.clone(),
            public_key: identity.public_key_base64url(),
            display_name: "Tester".into(),
            bio: None,
            status: Default::default(),
            tags: Default::default(),
            discoverable: true,
            avatar_url: None,
            autonomy_level: Default::default(),
            autonomy_config: serde_json::json!({}),
            notification_preferences: serde_json::json!({}),
            created_at: Utc::now(),
            last_seen_at: Utc::now(),
        };
        storage.create_claw(&claw).await.unwrap();
        (AuthState::new(Arc::new(storage), 300), claw)
    }

    fn signed_request(identity: &ClawIdentity, method: &str, path: &str, body: &[u8]) -> Request {
        let ts = Utc::now().timestamp_millis();
        let message = clawbuds_identity::build_signed_message(method, path, ts, body);
        let sig = identity.sign(&message);
        HttpRequest::builder()
            .method(method)
            .uri(path)
            .header(HEADER_CLAW_ID, &identity.claw_id)
            .header(HEADER_TIMESTAMP, ts.to_string())
            .header(HEADER_SIGNATURE, sig)
            .body(Body::from(body.to_vec()))
            .unwrap()
    }

    #[tokio::test]
    async fn valid_signature_is_accepted() {
        let identity = ClawIdentity::generate();
        let (state, _claw) = state_with_claw(&identity).await;
        let request = signed_request(&identity, "POST", "/messages", b"{}");
        assert!(authenticate(&state, request).await.is_ok());
    }

    #[tokio::test]
    async fn stale_timestamp_is_rejected() {
        let identity = ClawIdentity::generate();
        let (state, _claw) = state_with_claw(&identity).await;
        let stale_ts = Utc::now().timestamp_millis() - 600_000;
        let message = clawbuds_identity::build_signed_message("GET", "/inbox", stale_ts, b"");
        let sig = identity.sign(&message);
        let request = HttpRequest::builder()
            .method("GET")
            .uri("/inbox")
            .header(HEADER_CLAW_ID, &identity.claw_id)
            .header(HEADER_TIMESTAMP, stale_ts.to_string())
            .header(HEADER_SIGNATURE, sig)
            .body(Body::empty())
            .unwrap();
        let err = authenticate(&state, request).await.unwrap_err();
        assert_eq!(err.code(), "TIMESTAMP_SKEW");
    }

    #[tokio::test]
    async fn unknown_claw_is_rejected() {
        let identity = ClawIdentity::generate();
        let storage = Storage::connect("sqlite::memory:").await.unwrap();
        storage.migrate().await.unwrap();
        let state = AuthState::new(Arc::new(storage), 300);
        let request = signed_request(&identity, "GET", "/inbox", b"");
        let err = authenticate(&state, request).await.unwrap_err();
        assert_eq!(err.code(), "UNKNOWN_CLAW");
    }

    #[tokio::test]
    async fn mutated_body_is_rejected() {
        let identity = ClawIdentity::generate();
        let (state, _claw) = state_with_claw(&identity).await;
        let mut request = signed_request(&identity, "POST", "/messages", b"{\"a\":1}");
        *request.body_mut() = Body::from(&b"{\"a\":2}"[..]);
        let err = authenticate(&state, request).await.unwrap_err();
        assert_eq!(err.code(), "BAD_SIGNATURE");
    }
}
