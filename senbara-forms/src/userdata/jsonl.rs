//! Newline-delimited JSON format for exports and imports.
//!
//! One record per line, tagged by `entityName`:
//!
//! ```text
//! {"entityName":"contact","id":7,"first_name":"Jane",...}
//! {"entityName":"debt","id":3,"amount":100.0,"currency":"EUR","contact_id":7,...}
//! ```

use std::io::Write;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::export::UserDataSink;
use super::import::UserDataImport;
use crate::database::models::{
    ExportedActivity, ExportedContact, ExportedDebt, ExportedJournalEntry,
};
use crate::{Error, Result};

/// Media type of an export document.
pub const JSON_LINES_CONTENT_TYPE: &str = "application/jsonl";

/// One line of an export document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "entityName", rename_all = "camelCase")]
pub enum UserDataRecord {
    JournalEntry(ExportedJournalEntry),
    Contact(ExportedContact),
    Debt(ExportedDebt),
    Activity(ExportedActivity),
}

/// Export sink writing one JSON record per line.
pub struct JsonLinesWriter<W> {
    writer: W,
}

impl<W: Write + Send> JsonLinesWriter<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }

    fn write_record(&mut self, record: &UserDataRecord) -> Result<()> {
        serde_json::to_writer(&mut self.writer, record)?;
        self.writer.write_all(b"\n")?;
        Ok(())
    }
}

#[async_trait]
impl<W: Write + Send> UserDataSink for JsonLinesWriter<W> {
    async fn on_journal_entry(&mut self, entry: ExportedJournalEntry) -> Result<()> {
        self.write_record(&UserDataRecord::JournalEntry(entry))
    }

    async fn on_contact(&mut self, contact: ExportedContact) -> Result<()> {
        self.write_record(&UserDataRecord::Contact(contact))
    }

    async fn on_debt(&mut self, debt: ExportedDebt) -> Result<()> {
        self.write_record(&UserDataRecord::Debt(debt))
    }

    async fn on_activity(&mut self, activity: ExportedActivity) -> Result<()> {
        self.write_record(&UserDataRecord::Activity(activity))
    }
}

/// Parse one non-blank line. `line_number` is 1-based.
pub fn parse_record(line: &str, line_number: usize) -> Result<UserDataRecord> {
    serde_json::from_str(line)
        .map_err(|e| Error::validation(format!("invalid record on line {line_number}: {e}")))
}

/// Feed every record of `input` to `import` in document order.
///
/// Blank lines are skipped. The first malformed line or failed insert stops
/// the import; the caller decides whether to commit or roll back.
pub async fn import_json_lines(import: &UserDataImport, input: &str) -> Result<usize> {
    let mut records = 0;

    for (index, line) in input.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        match parse_record(line, index + 1)? {
            UserDataRecord::JournalEntry(entry) => {
                import.import_journal_entry(&entry).await?;
            }
            UserDataRecord::Contact(contact) => {
                import.import_contact(&contact).await?;
            }
            UserDataRecord::Debt(debt) => {
                import.import_debt(&debt).await?;
            }
            UserDataRecord::Activity(activity) => {
                import.import_activity(&activity).await?;
            }
        }
        records += 1;
    }

    Ok(records)
}
