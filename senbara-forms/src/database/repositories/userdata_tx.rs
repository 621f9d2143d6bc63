//! Transactional row operations for a user's personal data.
//!
//! Every statement is scoped by `namespace`. These operations run inside a
//! caller-managed transaction and never commit; export, import and delete-all
//! in [`crate::userdata`] own the transaction boundaries.

use futures::stream::BoxStream;
use sqlx::SqliteConnection;

use crate::Result;
use crate::database::models::{
    ActivityDbModel, ContactDbModel, DebtDbModel, ExportedActivity, ExportedContact, ExportedDebt,
    ExportedJournalEntry, JournalEntryDbModel,
};

/// Row stream borrowed from an open transaction.
pub type RowStream<'c, T> = BoxStream<'c, std::result::Result<T, sqlx::Error>>;

/// Rows removed by [`UserDataTxOps::delete_all`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct DeleteStats {
    pub activities: u64,
    pub debts: u64,
    pub contacts: u64,
    pub journal_entries: u64,
}

/// Namespace-scoped operations on the four personal data tables.
pub struct UserDataTxOps;

impl UserDataTxOps {
    /// Journal entries of a namespace in primary-key order.
    pub fn stream_journal_entries<'c>(
        tx: &'c mut SqliteConnection,
        namespace: &'c str,
    ) -> RowStream<'c, JournalEntryDbModel> {
        sqlx::query_as::<_, JournalEntryDbModel>(
            "SELECT id, title, date, body, rating, namespace FROM journal_entries WHERE namespace = ? ORDER BY id",
        )
        .bind(namespace)
        .fetch(tx)
    }

    /// Contacts of a namespace in primary-key order.
    pub fn stream_contacts<'c>(
        tx: &'c mut SqliteConnection,
        namespace: &'c str,
    ) -> RowStream<'c, ContactDbModel> {
        sqlx::query_as::<_, ContactDbModel>(
            r#"
            SELECT id, first_name, last_name, nickname, email, pronouns, namespace, birthday, address, notes
            FROM contacts WHERE namespace = ? ORDER BY id
            "#,
        )
        .bind(namespace)
        .fetch(tx)
    }

    /// Debts of a namespace in primary-key order.
    pub fn stream_debts<'c>(
        tx: &'c mut SqliteConnection,
        namespace: &'c str,
    ) -> RowStream<'c, DebtDbModel> {
        sqlx::query_as::<_, DebtDbModel>(
            "SELECT id, amount, currency, description, contact_id, namespace FROM debts WHERE namespace = ? ORDER BY id",
        )
        .bind(namespace)
        .fetch(tx)
    }

    /// Activities of a namespace in primary-key order.
    pub fn stream_activities<'c>(
        tx: &'c mut SqliteConnection,
        namespace: &'c str,
    ) -> RowStream<'c, ActivityDbModel> {
        sqlx::query_as::<_, ActivityDbModel>(
            "SELECT id, name, date, description, contact_id, namespace FROM activities WHERE namespace = ? ORDER BY id",
        )
        .bind(namespace)
        .fetch(tx)
    }

    /// Insert a journal entry; returns the new internal id.
    pub async fn insert_journal_entry(
        tx: &mut SqliteConnection,
        namespace: &str,
        entry: &ExportedJournalEntry,
    ) -> Result<i64> {
        let result = sqlx::query(
            "INSERT INTO journal_entries (title, date, body, rating, namespace) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&entry.title)
        .bind(entry.date.timestamp_millis())
        .bind(&entry.body)
        .bind(entry.rating)
        .bind(namespace)
        .execute(tx)
        .await?;

        Ok(result.last_insert_rowid())
    }

    /// Insert a contact; returns the new internal id.
    pub async fn insert_contact(
        tx: &mut SqliteConnection,
        namespace: &str,
        contact: &ExportedContact,
    ) -> Result<i64> {
        let result = sqlx::query(
            r#"
            INSERT INTO contacts (first_name, last_name, nickname, email, pronouns, namespace, birthday, address, notes)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&contact.first_name)
        .bind(&contact.last_name)
        .bind(&contact.nickname)
        .bind(&contact.email)
        .bind(&contact.pronouns)
        .bind(namespace)
        .bind(contact.birthday)
        .bind(&contact.address)
        .bind(&contact.notes)
        .execute(tx)
        .await?;

        Ok(result.last_insert_rowid())
    }

    /// Insert a debt owed by/to the contact with internal id `contact_id`.
    pub async fn insert_debt(
        tx: &mut SqliteConnection,
        namespace: &str,
        contact_id: i64,
        debt: &ExportedDebt,
    ) -> Result<i64> {
        let result = sqlx::query(
            "INSERT INTO debts (amount, currency, description, contact_id, namespace) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(debt.amount)
        .bind(&debt.currency)
        .bind(&debt.description)
        .bind(contact_id)
        .bind(namespace)
        .execute(tx)
        .await?;

        Ok(result.last_insert_rowid())
    }

    /// Insert an activity with the contact with internal id `contact_id`.
    pub async fn insert_activity(
        tx: &mut SqliteConnection,
        namespace: &str,
        contact_id: i64,
        activity: &ExportedActivity,
    ) -> Result<i64> {
        let result = sqlx::query(
            "INSERT INTO activities (name, date, description, contact_id, namespace) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&activity.name)
        .bind(activity.date)
        .bind(&activity.description)
        .bind(contact_id)
        .bind(namespace)
        .execute(tx)
        .await?;

        Ok(result.last_insert_rowid())
    }

    /// Delete every row of a namespace, children before parents.
    pub async fn delete_all(tx: &mut SqliteConnection, namespace: &str) -> Result<DeleteStats> {
        let activities = sqlx::query("DELETE FROM activities WHERE namespace = ?")
            .bind(namespace)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        let debts = sqlx::query("DELETE FROM debts WHERE namespace = ?")
            .bind(namespace)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        let contacts = sqlx::query("DELETE FROM contacts WHERE namespace = ?")
            .bind(namespace)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        let journal_entries = sqlx::query("DELETE FROM journal_entries WHERE namespace = ?")
            .bind(namespace)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        Ok(DeleteStats {
            activities,
            debts,
            contacts,
            journal_entries,
        })
    }
}
