//! User profiles and the signed-in session.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::UserId;

/// A user profile. The delivery capability resolves recipient addresses
/// against these.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub email: String,
    pub full_name: Option<String>,
    pub avatar_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// The identity of the signed-in user.
///
/// Every service operation takes the session explicitly; there is no ambient
/// "current user".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub user_id: UserId,
    pub email: String,
    pub full_name: Option<String>,
}

impl Session {
    pub fn new(user_id: UserId, email: impl Into<String>, full_name: Option<String>) -> Self {
        Self {
            user_id,
            email: email.into(),
            full_name,
        }
    }

    /// Name written into the `from` field of outgoing mail.
    pub fn sender_name(&self) -> &str {
        self.full_name.as_deref().unwrap_or(&self.email)
    }
}

impl From<&User> for Session {
    fn from(user: &User) -> Self {
        Self {
            user_id: user.id.clone(),
            email: user.email.clone(),
            full_name: user.full_name.clone(),
        }
    }
}
