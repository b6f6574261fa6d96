//! Database storage.
//!
//! This module provides the storage layer for postbox:
//!
//! - SQLite database for users, folders, emails and contacts
//! - [`SqliteStore`], the mailbox and address-book backend used by services
//! - [`LocalDelivery`], the audited capability that writes into a
//!   recipient's inbox
//! - Async-safe database operations via tokio::task::spawn_blocking

mod database;
mod delivery;
pub mod queries;
mod schema;
mod store;

pub use database::{Database, DatabaseError, Result};
pub use delivery::{DeliveryOutcome, LocalDelivery};
pub use store::SqliteStore;
