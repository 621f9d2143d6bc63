//! Contact models.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Contact row.
#[derive(Debug, Clone, FromRow)]
pub struct ContactDbModel {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
    pub nickname: String,
    pub email: String,
    pub pronouns: String,
    pub namespace: String,
    pub birthday: Option<NaiveDate>,
    pub address: String,
    pub notes: String,
}

/// Contact as it appears in an export.
///
/// `id` is the external identifier debts and activities of the same
/// export refer to through their `contact_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportedContact {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
    pub nickname: String,
    pub email: String,
    pub pronouns: String,
    pub namespace: String,
    #[serde(default)]
    pub birthday: Option<NaiveDate>,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub notes: String,
}

impl From<ContactDbModel> for ExportedContact {
    fn from(row: ContactDbModel) -> Self {
        Self {
            id: row.id,
            first_name: row.first_name,
            last_name: row.last_name,
            nickname: row.nickname,
            email: row.email,
            pronouns: row.pronouns,
            namespace: row.namespace,
            birthday: row.birthday,
            address: row.address,
            notes: row.notes,
        }
    }
}
