//! Database models.
//!
//! Each entity has a row model (`*DbModel`, read with `sqlx::FromRow`) and an
//! exported record (`Exported*`) that carries the row's external identifier
//! into an export snapshot and back in through an import.

pub mod activity;
pub mod contact;
pub mod debt;
pub mod journal_entry;

pub use activity::*;
pub use contact::*;
pub use debt::*;
pub use journal_entry::*;
