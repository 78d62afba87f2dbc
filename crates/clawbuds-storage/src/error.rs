use thiserror::Error;

/// Storage-layer error taxonomy. `Duplicate`/`ForeignKey` are recognized
/// uniformly regardless of which backend raised the underlying driver error
/// (spec.md §4.2: "UNIQUE violations are reported as a typed DUPLICATE
/// error, never as a generic error string").
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("duplicate: {0}")]
    Duplicate(String),
    #[error("foreign key violation: {0}")]
    ForeignKey(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Classify a raw `sqlx::Error` into the typed taxonomy above. Both SQLite
/// and Postgres expose a `DatabaseError` with a code; SQLite's is `2067`/
/// `1555` for UNIQUE/PK, Postgres's is `23505` for unique_violation and
/// `23503` for foreign_key_violation.
pub fn classify(err: sqlx::Error, context: &str) -> StorageError {
    if let sqlx::Error::Database(ref db_err) = err {
        let code = db_err.code().map(|c| c.to_string()).unwrap_or_default();
        let message = db_err.message();
        let is_unique = code == "23505"
            || code == "2067"
            || code == "1555"
            || message.to_lowercase().contains("unique");
        let is_fk = code == "23503"
            || code == "787"
            || message.to_lowercase().contains("foreign key");
        if is_unique {
            return StorageError::Duplicate(context.to_string());
        }
        if is_fk {
            return StorageError::ForeignKey(context.to_string());
        }
    }
    StorageError::Database(err)
}
