//! Data portability for one account.
//!
//! - [`export_user_data`] walks the four entity tables inside a read
//!   snapshot and hands every row to a [`UserDataSink`].
//! - [`UserDataImport`] inserts records into a fresh write transaction,
//!   remapping contact references from export ids to new internal ids.
//! - [`delete_user_data`] removes an account's rows in dependency order.
//!
//! [`UserDataStore`] bundles the pools and the JSONL document handling used
//! by the HTTP layer.

pub mod delete;
pub mod export;
pub mod import;
pub mod jsonl;

pub use crate::database::repositories::DeleteStats;
pub use delete::delete_user_data;
pub use export::{ExportStats, UserDataSink, export_user_data};
pub use import::{ImportStats, UserDataImport};
pub use jsonl::{JSON_LINES_CONTENT_TYPE, JsonLinesWriter, UserDataRecord, import_json_lines};

use serde::Deserialize;
use tracing::warn;

use crate::Result;
use crate::database::{DbPool, WritePool};

/// How an import treats the account's existing rows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImportMode {
    /// Add the imported rows next to the existing ones.
    #[default]
    Merge,
    /// Delete the existing rows first, in the same transaction.
    Replace,
}

/// Entry point for export, import and deletion.
#[derive(Clone)]
pub struct UserDataStore {
    pool: DbPool,
    write_pool: WritePool,
}

impl UserDataStore {
    pub fn new(pool: DbPool, write_pool: WritePool) -> Self {
        Self { pool, write_pool }
    }

    pub async fn export(&self, namespace: &str, sink: &mut dyn UserDataSink) -> Result<ExportStats> {
        export_user_data(&self.pool, namespace, sink).await
    }

    /// Export `namespace` as a complete JSONL document.
    pub async fn export_json_lines(&self, namespace: &str) -> Result<Vec<u8>> {
        let mut writer = JsonLinesWriter::new(Vec::new());
        self.export(namespace, &mut writer).await?;
        Ok(writer.into_inner())
    }

    pub async fn begin_import(&self, namespace: &str) -> Result<UserDataImport> {
        UserDataImport::begin(&self.write_pool, namespace).await
    }

    /// Import a JSONL document in one transaction.
    ///
    /// Any error rolls the whole import back, including the deletion done by
    /// [`ImportMode::Replace`].
    pub async fn import_json_lines(
        &self,
        namespace: &str,
        mode: ImportMode,
        input: &str,
    ) -> Result<ImportStats> {
        let import = self.begin_import(namespace).await?;

        let result = async {
            if mode == ImportMode::Replace {
                import.delete_existing().await?;
            }
            import_json_lines(&import, input).await
        }
        .await;

        match result {
            Ok(_) => import.commit().await,
            Err(e) => {
                if let Err(rollback_err) = import.rollback().await {
                    warn!(
                        namespace = %namespace,
                        error = %rollback_err,
                        "Failed to roll back import"
                    );
                }
                Err(e)
            }
        }
    }

    pub async fn delete(&self, namespace: &str) -> Result<DeleteStats> {
        delete_user_data(&self.write_pool, namespace).await
    }
}
