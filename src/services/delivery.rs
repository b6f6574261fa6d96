//! Cross-account delivery capability.
//!
//! Writing into another user's mailbox is the one operation that crosses
//! ownership boundaries. It is exposed only through [`RecipientResolver`],
//! whose single method takes exactly the fields needed to build the
//! recipient's inbox copy.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from the delivery capability itself.
///
/// "Recipient has no account" is not an error; it is `Ok(false)`.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ResolverError {
    #[error("delivery transport failed: {0}")]
    Transport(String),

    #[error("delivery not permitted: {0}")]
    PermissionDenied(String),

    #[error("delivery store error: {0}")]
    Store(String),
}

/// Everything a recipient's inbox copy is built from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryRequest {
    /// Address being delivered to in this call.
    pub recipient: String,
    pub from_email: String,
    pub from_name: String,
    /// Full recipient lists of the original message.
    pub to: Vec<String>,
    pub cc: Vec<String>,
    pub bcc: Vec<String>,
    pub subject: String,
    pub body: String,
    /// Shared by the sender's copy and every recipient copy.
    pub sent_at: DateTime<Utc>,
}

/// Delivers a message into a recipient's inbox.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait RecipientResolver: Send + Sync {
    /// Returns `Ok(true)` when an inbox copy was created, `Ok(false)` when
    /// the address has no in-app account or that account has no inbox.
    async fn deliver(&self, request: &DeliveryRequest) -> Result<bool, ResolverError>;
}
