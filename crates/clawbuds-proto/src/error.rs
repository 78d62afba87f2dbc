use serde::Serialize;
use thiserror::Error;

/// Error-kind taxonomy surfaced to the wire (spec.md §7). Each kind maps to
/// exactly one HTTP status; `code` carries the specific machine-readable
/// reason within that kind.
#[derive(Debug, Error, Clone)]
pub enum ApiError {
    #[error("authentication failed: {code}")]
    AuthenticationFailed { code: &'static str, message: String },
    #[error("not authorized: {code}")]
    NotAuthorized { code: &'static str, message: String },
    #[error("conflict: {code}")]
    Conflict { code: &'static str, message: String },
    #[error("not found: {code}")]
    NotFound { code: &'static str, message: String },
    #[error("validation failed: {code}")]
    ValidationFailed { code: &'static str, message: String },
    #[error("resource exhausted: {code}")]
    ResourceExhausted { code: &'static str, message: String },
    #[error("upstream unavailable: {code}")]
    UpstreamUnavailable { code: &'static str, message: String },
}

impl ApiError {
    pub fn http_status(&self) -> u16 {
        match self {
            Self::AuthenticationFailed { .. } => 401,
            Self::NotAuthorized { .. } => 403,
            Self::Conflict { .. } => 409,
            Self::NotFound { .. } => 404,
            Self::ValidationFailed { .. } => 400,
            Self::ResourceExhausted { .. } => 429,
            Self::UpstreamUnavailable { .. } => 502,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::AuthenticationFailed { code, .. }
            | Self::NotAuthorized { code, .. }
            | Self::Conflict { code, .. }
            | Self::NotFound { code, .. }
            | Self::ValidationFailed { code, .. }
            | Self::ResourceExhausted { code, .. }
            | Self::UpstreamUnavailable { code, .. } => code,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Self::AuthenticationFailed { message, .. }
            | Self::NotAuthorized { message, .. }
            | Self::Conflict { message, .. }
            | Self::NotFound { message, .. }
            | Self::ValidationFailed { message, .. }
            | Self::ResourceExhausted { message, .. }
            | Self::UpstreamUnavailable { message, .. } => message,
        }
    }

    pub fn bad_signature(message: impl Into<String>) -> Self {
        Self::AuthenticationFailed { code: "BAD_SIGNATURE", message: message.into() }
    }

    pub fn timestamp_skew() -> Self {
        Self::AuthenticationFailed {
            code: "TIMESTAMP_SKEW",
            message: "request timestamp outside the accepted window".into(),
        }
    }

    pub fn unknown_claw() -> Self {
        Self::AuthenticationFailed { code: "UNKNOWN_CLAW", message: "claw not registered".into() }
    }

    pub fn duplicate(message: impl Into<String>) -> Self {
        Self::Conflict { code: "DUPLICATE", message: message.into() }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound { code: "NOT_FOUND", message: message.into() }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::ValidationFailed { code: "VALIDATION_FAILED", message: message.into() }
    }

    pub fn forbidden_url(message: impl Into<String>) -> Self {
        Self::ValidationFailed { code: "FORBIDDEN_URL", message: message.into() }
    }

    pub fn not_authorized(message: impl Into<String>) -> Self {
        Self::NotAuthorized { code: "NOT_AUTHORIZED", message: message.into() }
    }

    pub fn already_friends() -> Self {
        Self::Conflict { code: "ALREADY_FRIENDS", message: "already friends".into() }
    }

    pub fn duplicate_request() -> Self {
        Self::Conflict { code: "DUPLICATE_REQUEST", message: "a friend request between these claws is already pending".into() }
    }

    pub fn self_request() -> Self {
        Self::ValidationFailed { code: "SELF_REQUEST", message: "cannot send a friend request to yourself".into() }
    }

    pub fn claw_not_found() -> Self {
        Self::NotFound { code: "CLAW_NOT_FOUND", message: "claw does not exist".into() }
    }

    pub fn claw_id_collision() -> Self {
        Self::Conflict { code: "CLAW_ID_COLLISION", message: "claw id already registered".into() }
    }

    pub fn public_key_taken() -> Self {
        Self::Conflict { code: "PUBLIC_KEY_TAKEN", message: "public key already registered".into() }
    }

    pub fn group_full() -> Self {
        Self::Conflict { code: "GROUP_FULL", message: "group has no open slots".into() }
    }

    pub fn no_invitation() -> Self {
        Self::NotFound { code: "NO_INVITATION", message: "no pending invitation for this claw".into() }
    }
}

/// Wire-format error body: `{"code", "message", "details"}`.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
    pub details: Option<serde_json::Value>,
}

impl From<&ApiError> for ErrorBody {
    fn from(e: &ApiError) -> Self {
        Self { code: e.code().to_string(), message: e.message().to_string(), details: None }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_match_table() {
        assert_eq!(ApiError::bad_signature("x").http_status(), 401);
        assert_eq!(ApiError::unknown_claw().http_status(), 401);
        assert_eq!(ApiError::duplicate("x").http_status(), 409);
        assert_eq!(ApiError::not_found("x").http_status(), 404);
        assert_eq!(ApiError::validation("x").http_status(), 400);
        assert_eq!(ApiError::forbidden_url("x").http_status(), 400);
    }

    #[test]
    fn codes_are_machine_readable() {
        assert_eq!(ApiError::timestamp_skew().code(), "TIMESTAMP_SKEW");
        assert_eq!(ApiError::unknown_claw().code(), "UNKNOWN_CLAW");
    }
}
