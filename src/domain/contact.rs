//! Contact domain types.
//!
//! Address-book entries created explicitly by a user.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{ContactId, UserId};

/// An address-book entry owned by one user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contact {
    pub id: ContactId,
    pub user_id: UserId,
    /// Email address. Not unique: the address book does not deduplicate.
    pub email: String,
    pub full_name: Option<String>,
    pub avatar_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Contact {
    /// Creates a new contact for `user_id`.
    pub fn new(user_id: UserId, email: impl Into<String>, full_name: Option<String>) -> Self {
        let now = super::now();
        Self {
            id: ContactId::generate(),
            user_id,
            email: email.into(),
            full_name,
            avatar_url: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Returns the display name or email if no name is set.
    pub fn display_name(&self) -> &str {
        self.full_name.as_deref().unwrap_or(&self.email)
    }
}
