//! Folder domain types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{FolderId, UserId};

/// A named container of emails belonging to one user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Folder {
    pub id: FolderId,
    pub user_id: UserId,
    /// Display name, unique per user (case-insensitive).
    pub name: String,
    /// Icon tag used by the sidebar (e.g. `inbox`, `trash-2`).
    pub icon: String,
    /// Built-in folders are provisioned per user and cannot be deleted.
    pub is_system: bool,
    pub created_at: DateTime<Utc>,
}

impl Folder {
    /// Returns true if the folder carries the given name (case-insensitive).
    pub fn is_named(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
    }
}

/// The built-in folders every user gets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SystemFolder {
    Inbox,
    Sent,
    Drafts,
    Trash,
}

impl SystemFolder {
    /// All system folders in provisioning order.
    pub const ALL: [SystemFolder; 4] = [
        SystemFolder::Inbox,
        SystemFolder::Sent,
        SystemFolder::Drafts,
        SystemFolder::Trash,
    ];

    /// Default folder name.
    pub fn name(&self) -> &'static str {
        match self {
            SystemFolder::Inbox => "Inbox",
            SystemFolder::Sent => "Sent",
            SystemFolder::Drafts => "Drafts",
            SystemFolder::Trash => "Trash",
        }
    }

    /// Default icon tag.
    pub fn icon(&self) -> &'static str {
        match self {
            SystemFolder::Inbox => "inbox",
            SystemFolder::Sent => "send",
            SystemFolder::Drafts => "file-text",
            SystemFolder::Trash => "trash-2",
        }
    }
}

/// Finds a folder by name (case-insensitive).
pub fn find_by_name<'a>(folders: &'a [Folder], name: &str) -> Option<&'a Folder> {
    folders.iter().find(|f| f.is_named(name))
}
