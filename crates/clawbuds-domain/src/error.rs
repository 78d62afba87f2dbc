//! Maps the storage layer's typed error taxonomy onto the wire taxonomy.
//! A `NOT_FOUND`/`DUPLICATE` distinction survives the crossing; anything
//! else collapses to `VALIDATION_FAILED` since a lower layer only ever
//! raises those two deliberately, everything else is unexpected input.

use clawbuds_proto::ApiError;
use clawbuds_storage::StorageError;

pub fn storage_err(e: StorageError) -> ApiError {
    match e {
        StorageError::Duplicate(msg) => ApiError::duplicate(msg),
        StorageError::NotFound(msg) => ApiError::not_found(msg),
        other => ApiError::validation(other.to_string()),
    }
}
