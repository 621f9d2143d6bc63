//! senbara-forms library crate.
//!
//! Session authorization against an OpenID Connect provider and
//! transactional export, import and deletion of a user's personal data.

pub mod api;
pub mod auth;
pub mod config;
pub mod database;
pub mod error;
pub mod logging;
pub mod userdata;
pub mod utils;

pub use error::{Error, Result};
