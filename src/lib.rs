//! postbox - webmail data and workflow layer
//!
//! This crate provides folders, emails and contacts for signed-in users,
//! the send workflow that fans a message out to other users' inboxes, draft
//! handling, a read-through view cache, and user-facing notifications.

pub mod app;
pub mod config;
pub mod domain;
pub mod services;
pub mod storage;

pub use app::App;
