//! Journal entry models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::database::time::ms_to_datetime;

/// Journal entry row.
#[derive(Debug, Clone, FromRow)]
pub struct JournalEntryDbModel {
    pub id: i64,
    pub title: String,
    /// Unix epoch milliseconds (UTC).
    pub date: i64,
    pub body: String,
    pub rating: i64,
    pub namespace: String,
}

/// Journal entry as it appears in an export.
///
/// Journal entries are never referenced by other records, so their `id`
/// is informational only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportedJournalEntry {
    pub id: i64,
    pub title: String,
    /// Serialized as Unix epoch milliseconds.
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub date: DateTime<Utc>,
    pub body: String,
    pub rating: i64,
    pub namespace: String,
}

impl From<JournalEntryDbModel> for ExportedJournalEntry {
    fn from(row: JournalEntryDbModel) -> Self {
        Self {
            id: row.id,
            title: row.title,
            date: ms_to_datetime(row.date),
            body: row.body,
            rating: row.rating,
            namespace: row.namespace,
        }
    }
}
