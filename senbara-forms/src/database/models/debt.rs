//! Debt models.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Debt row.
#[derive(Debug, Clone, FromRow)]
pub struct DebtDbModel {
    pub id: i64,
    pub amount: f64,
    pub currency: String,
    pub description: String,
    pub contact_id: Option<i64>,
    pub namespace: String,
}

/// Debt as it appears in an export. `contact_id` is an external contact id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportedDebt {
    pub id: i64,
    pub amount: f64,
    pub currency: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub contact_id: Option<i64>,
}

impl From<DebtDbModel> for ExportedDebt {
    fn from(row: DebtDbModel) -> Self {
        Self {
            id: row.id,
            amount: row.amount,
            currency: row.currency,
            description: row.description,
            contact_id: row.contact_id,
        }
    }
}
