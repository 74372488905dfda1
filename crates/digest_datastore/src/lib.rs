//! # DataStore Module
//!
//! This module provides functionality for interacting with a Postgres database
//! to store and retrieve generated video summaries.
//!
//! The module uses sqlx for database operations and provides an abstraction layer
//! over summary lookups and idempotent summary writes, keyed by video id.

mod datastore;
mod domain;

pub use datastore::postgres::PgDataStore;
pub use datastore::DataStore;
pub use domain::SavedSummary;
