//! Repository layer for database access.

pub mod userdata_tx;

pub use userdata_tx::*;
