//! Activity models.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Activity row.
#[derive(Debug, Clone, FromRow)]
pub struct ActivityDbModel {
    pub id: i64,
    pub name: String,
    pub date: NaiveDate,
    pub description: String,
    pub contact_id: Option<i64>,
    pub namespace: String,
}

/// Activity as it appears in an export. `contact_id` is an external contact id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportedActivity {
    pub id: i64,
    pub name: String,
    pub date: NaiveDate,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub contact_id: Option<i64>,
}

impl From<ActivityDbModel> for ExportedActivity {
    fn from(row: ActivityDbModel) -> Self {
        Self {
            id: row.id,
            name: row.name,
            date: row.date,
            description: row.description,
            contact_id: row.contact_id,
        }
    }
}
