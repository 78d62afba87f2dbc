//! The `{"success": ..., "data"/"error": ...}` wire envelope every route
//! handler's response is wrapped in.

use clawbuds_proto::{ApiError, ErrorBody};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct Envelope<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorBody>,
}

impl<T> Envelope<T> {
    pub fn ok(data: T) -> Self {
        Self { success: true, data: Some(data), error: None }
    }
}

impl Envelope<()> {
    pub fn err(e: &ApiError) -> Self {
        Self { success: false, data: None, error: Some(ErrorBody::from(e)) }
    }
}
