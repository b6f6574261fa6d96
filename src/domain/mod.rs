//! Domain layer types for postbox.
//!
//! Emails, folders, contacts, user profiles and the signed-in session, plus
//! the id newtypes they are keyed by.

pub mod address;
mod contact;
mod email;
mod folder;
mod types;
mod user;

pub use contact::Contact;
pub use email::{Email, EmailStatus};
pub use folder::{find_by_name, Folder, SystemFolder};
pub use types::{ContactId, EmailId, FolderId, UserId};
pub use user::{Session, User};

#[cfg(test)]
pub(crate) use email::fixtures;

use chrono::{DateTime, SubsecRound, Utc};

/// Current time at the microsecond precision the store keeps.
///
/// Values produced here compare equal after a round trip through storage.
pub fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}
