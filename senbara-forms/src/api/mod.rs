//! HTTP surface.
//!
//! Thin handlers around the session authorizer and the user data store.

pub mod error;
pub mod pages;
pub mod routes;
pub mod server;

pub use server::{ApiServer, ApiServerConfig, AppState};
