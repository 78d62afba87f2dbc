use crate::error::{StorageError, StorageResult};
use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Serialize};

pub fn to_ts(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339()
}

pub fn to_ts_opt(dt: Option<DateTime<Utc>>) -> Option<String> {
    dt.map(to_ts)
}

pub fn from_ts(s: &str) -> StorageResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StorageError::Database(sqlx::Error::Decode(Box::new(e))))
}

pub fn from_ts_opt(s: Option<String>) -> StorageResult<Option<DateTime<Utc>>> {
    s.map(|s| from_ts(&s)).transpose()
}

pub fn to_json<T: Serialize>(value: &T) -> StorageResult<String> {
    Ok(serde_json::to_string(value)?)
}

pub fn from_json<T: DeserializeOwned>(s: &str) -> StorageResult<T> {
    Ok(serde_json::from_str(s)?)
}
