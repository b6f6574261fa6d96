//! Email domain types.
//!
//! An [`Email`] is one user's copy of a message. Sending creates a `Sent`
//! copy for the sender and an independent `Received` copy per delivered
//! recipient.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{EmailId, FolderId, UserId};

/// Lifecycle status of an email record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmailStatus {
    /// Editable, never delivered.
    Draft,
    /// Sender's copy of a delivered message.
    Sent,
    /// Recipient's copy of a delivered message.
    Received,
}

impl EmailStatus {
    /// Returns the stored representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            EmailStatus::Draft => "draft",
            EmailStatus::Sent => "sent",
            EmailStatus::Received => "received",
        }
    }
}

impl fmt::Display for EmailStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EmailStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(EmailStatus::Draft),
            "sent" => Ok(EmailStatus::Sent),
            "received" => Ok(EmailStatus::Received),
            other => Err(format!("unknown email status: {other}")),
        }
    }
}

/// A single email record owned by one user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Email {
    /// Unique identifier for this copy.
    pub id: EmailId,
    /// User who holds this copy.
    pub user_id: UserId,
    /// Containing folder. `None` once the folder has been deleted.
    pub folder_id: Option<FolderId>,
    /// Sender address.
    pub from_email: String,
    /// Sender display name.
    pub from_name: Option<String>,
    /// Primary recipients.
    pub to: Vec<String>,
    /// Carbon copy recipients.
    pub cc: Vec<String>,
    /// Blind carbon copy recipients.
    pub bcc: Vec<String>,
    pub subject: String,
    pub body: String,
    pub status: EmailStatus,
    pub is_read: bool,
    pub is_starred: bool,
    /// Set only once the message has been sent.
    pub sent_at: Option<DateTime<Utc>>,
    /// Set on recipient copies when delivered.
    pub received_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Email {
    /// Returns the sender's display name, falling back to the address.
    pub fn sender_display(&self) -> &str {
        self.from_name.as_deref().unwrap_or(&self.from_email)
    }

    /// Timestamp shown in lists: when it was sent, else when it was created.
    pub fn display_date(&self) -> DateTime<Utc> {
        self.sent_at.unwrap_or(self.created_at)
    }

    /// Iterates over every recipient in to, cc, bcc order.
    pub fn all_recipients(&self) -> impl Iterator<Item = &String> {
        self.to.iter().chain(self.cc.iter()).chain(self.bcc.iter())
    }

    /// Case-insensitive match of `query` against subject, sender and body.
    ///
    /// An empty query matches everything.
    pub fn matches_search(&self, query: &str) -> bool {
        let query = query.trim().to_lowercase();
        if query.is_empty() {
            return true;
        }

        self.subject.to_lowercase().contains(&query)
            || self.from_email.to_lowercase().contains(&query)
            || self
                .from_name
                .as_ref()
                .is_some_and(|name| name.to_lowercase().contains(&query))
            || self.body.to_lowercase().contains(&query)
    }

    /// Returns true if this email is a draft.
    pub fn is_draft(&self) -> bool {
        self.status == EmailStatus::Draft
    }
}
