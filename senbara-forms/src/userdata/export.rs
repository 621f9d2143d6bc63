//! Export walker.

use async_trait::async_trait;
use futures::TryStreamExt;
use serde::Serialize;
use sqlx::SqliteConnection;
use tracing::{debug, warn};

use crate::Result;
use crate::database::DbPool;
use crate::database::models::{
    ExportedActivity, ExportedContact, ExportedDebt, ExportedJournalEntry,
};
use crate::database::repositories::UserDataTxOps;

/// Receives the rows of one account, one call per row.
///
/// Calls arrive in walker order: every journal entry, then every contact,
/// then every debt, then every activity, each group in primary-key order.
/// Returning an error aborts the walk.
#[async_trait]
pub trait UserDataSink: Send {
    async fn on_journal_entry(&mut self, entry: ExportedJournalEntry) -> Result<()>;

    async fn on_contact(&mut self, contact: ExportedContact) -> Result<()>;

    async fn on_debt(&mut self, debt: ExportedDebt) -> Result<()>;

    async fn on_activity(&mut self, activity: ExportedActivity) -> Result<()>;
}

/// Rows handed to the sink by one export.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ExportStats {
    pub journal_entries: u64,
    pub contacts: u64,
    pub debts: u64,
    pub activities: u64,
}

/// Walk every row of `namespace` inside one read transaction.
///
/// The transaction only provides a consistent snapshot; it is rolled back
/// when the walk ends, successfully or not. The first error from a read or
/// from the sink is returned.
pub async fn export_user_data(
    pool: &DbPool,
    namespace: &str,
    sink: &mut dyn UserDataSink,
) -> Result<ExportStats> {
    let mut tx = pool.begin().await?;

    let result = walk(&mut tx, namespace, sink).await;

    if let Err(e) = tx.rollback().await {
        warn!(namespace = %namespace, error = %e, "Failed to end export snapshot");
    }

    let stats = result?;
    debug!(namespace = %namespace, ?stats, "Exported user data");
    Ok(stats)
}

async fn walk(
    conn: &mut SqliteConnection,
    namespace: &str,
    sink: &mut dyn UserDataSink,
) -> Result<ExportStats> {
    let mut stats = ExportStats::default();

    {
        let mut rows = UserDataTxOps::stream_journal_entries(&mut *conn, namespace);
        while let Some(row) = rows.try_next().await? {
            sink.on_journal_entry(row.into()).await?;
            stats.journal_entries += 1;
        }
    }

    {
        let mut rows = UserDataTxOps::stream_contacts(&mut *conn, namespace);
        while let Some(row) = rows.try_next().await? {
            sink.on_contact(row.into()).await?;
            stats.contacts += 1;
        }
    }

    {
        let mut rows = UserDataTxOps::stream_debts(&mut *conn, namespace);
        while let Some(row) = rows.try_next().await? {
            sink.on_debt(row.into()).await?;
            stats.debts += 1;
        }
    }

    {
        let mut rows = UserDataTxOps::stream_activities(&mut *conn, namespace);
        while let Some(row) = rows.try_next().await? {
            sink.on_activity(row.into()).await?;
            stats.activities += 1;
        }
    }

    Ok(stats)
}
