//! Shared validation helpers, following the teacher's
//! `validate_instance_id`/`validate_account_id` pattern of small, pure,
//! independently testable validators.

use crate::error::ApiError;

pub fn validate_display_name(name: &str) -> Result<(), ApiError> {
    let len = name.trim().len();
    if len == 0 || len > 80 {
        return Err(ApiError::validation("displayName must be 1-80 characters"));
    }
    Ok(())
}

pub fn validate_circle_name(name: &str) -> Result<(), ApiError> {
    let len = name.trim().len();
    if len == 0 || len > 60 {
        return Err(ApiError::validation("circle name must be 1-60 characters"));
    }
    Ok(())
}

pub fn validate_group_max_members(max_members: u32) -> Result<(), ApiError> {
    if max_members == 0 || max_members > 10_000 {
        return Err(ApiError::validation("maxMembers out of range"));
    }
    Ok(())
}

pub fn validate_score(score: f64) -> Result<(), ApiError> {
    if !(0.0..=1.0).contains(&score) {
        return Err(ApiError::validation("score must be in [0,1]"));
    }
    Ok(())
}
