//! Import transaction.

use std::collections::HashMap;

use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::database::models::{
    ExportedActivity, ExportedContact, ExportedDebt, ExportedJournalEntry,
};
use crate::database::repositories::{DeleteStats, UserDataTxOps};
use crate::database::{ImmediateTransaction, WritePool, begin_immediate};
use crate::{Error, Result};

/// Rows inserted by one import.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ImportStats {
    pub journal_entries: u64,
    pub contacts: u64,
    pub debts: u64,
    pub activities: u64,
}

struct ImportState {
    tx: ImmediateTransaction,
    /// External contact id -> internal contact id.
    contact_ids: HashMap<i64, i64>,
    stats: ImportStats,
}

/// One open import into a namespace.
///
/// Holds a single `BEGIN IMMEDIATE` transaction for its whole lifetime. The
/// `import_*` sinks take `&self` and may be driven from concurrent tasks;
/// the transaction and the contact remapping table sit behind one lock.
/// Contacts must be imported before the debts and activities that
/// reference them.
///
/// Finish with [`commit`](Self::commit) or [`rollback`](Self::rollback).
/// Dropping an unfinished import discards everything it wrote.
pub struct UserDataImport {
    namespace: String,
    state: Mutex<ImportState>,
}

impl UserDataImport {
    /// Open the write transaction for `namespace`.
    pub async fn begin(pool: &WritePool, namespace: impl Into<String>) -> Result<Self> {
        let namespace = namespace.into();
        let tx = begin_immediate(pool).await?;

        debug!(namespace = %namespace, "Import transaction started");

        Ok(Self {
            namespace,
            state: Mutex::new(ImportState {
                tx,
                contact_ids: HashMap::new(),
                stats: ImportStats::default(),
            }),
        })
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Remove the namespace's existing rows inside this transaction.
    pub async fn delete_existing(&self) -> Result<DeleteStats> {
        let mut state = self.state.lock().await;
        UserDataTxOps::delete_all(&mut state.tx, &self.namespace).await
    }

    pub async fn import_journal_entry(&self, entry: &ExportedJournalEntry) -> Result<i64> {
        let mut state = self.state.lock().await;
        let id = UserDataTxOps::insert_journal_entry(&mut state.tx, &self.namespace, entry).await?;
        state.stats.journal_entries += 1;
        Ok(id)
    }

    /// Insert a contact and register its external id.
    ///
    /// A second contact with an already registered external id is rejected:
    /// references to that id would otherwise be ambiguous.
    pub async fn import_contact(&self, contact: &ExportedContact) -> Result<i64> {
        let mut state = self.state.lock().await;

        if state.contact_ids.contains_key(&contact.id) {
            return Err(Error::validation(format!(
                "duplicate contact id {} in import",
                contact.id
            )));
        }

        let id = UserDataTxOps::insert_contact(&mut state.tx, &self.namespace, contact).await?;
        state.contact_ids.insert(contact.id, id);
        state.stats.contacts += 1;
        Ok(id)
    }

    pub async fn import_debt(&self, debt: &ExportedDebt) -> Result<i64> {
        let mut state = self.state.lock().await;
        let contact_id = resolve_contact(&state.contact_ids, debt.contact_id)?;
        let id = UserDataTxOps::insert_debt(&mut state.tx, &self.namespace, contact_id, debt).await?;
        state.stats.debts += 1;
        Ok(id)
    }

    pub async fn import_activity(&self, activity: &ExportedActivity) -> Result<i64> {
        let mut state = self.state.lock().await;
        let contact_id = resolve_contact(&state.contact_ids, activity.contact_id)?;
        let id =
            UserDataTxOps::insert_activity(&mut state.tx, &self.namespace, contact_id, activity)
                .await?;
        state.stats.activities += 1;
        Ok(id)
    }

    pub async fn commit(self) -> Result<ImportStats> {
        let state = self.state.into_inner();
        state.tx.commit().await?;

        info!(
            namespace = %self.namespace,
            stats = ?state.stats,
            "Imported user data"
        );

        Ok(state.stats)
    }

    pub async fn rollback(self) -> Result<()> {
        let state = self.state.into_inner();
        state.tx.rollback().await?;

        warn!(namespace = %self.namespace, "Import rolled back");
        Ok(())
    }
}

fn resolve_contact(contact_ids: &HashMap<i64, i64>, external: Option<i64>) -> Result<i64> {
    external
        .and_then(|id| contact_ids.get(&id).copied())
        .ok_or(Error::ContactDoesNotExist)
}
