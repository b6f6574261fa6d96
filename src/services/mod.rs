//! Business services layer.
//!
//! Services sit between the application layer and storage:
//!
//! ```text
//! Application Layer (App, MailboxState, EventBus)
//!          |
//!          v
//!    Services Layer  <-- You are here
//!          |
//!          v
//! Infrastructure (SqliteStore, LocalDelivery)
//! ```
//!
//! # Services Overview
//!
//! - [`MailService`]: send and draft workflow, read-state mutations, folders
//! - [`ContactService`]: the user's address book
//! - [`ViewCache`]: read-through cache of query results
//! - [`NotificationService`]: toasts derived from application events
//! - [`Composer`]: compose form state

mod composer;
mod contact_service;
mod delivery;
mod mail_service;
mod notification_service;
mod view_cache;

pub use composer::{AddOutcome, ComposeError, Composer, ComposerMode, RecipientField};
pub use contact_service::{ContactError, ContactService, ContactStorage};
pub use delivery::{DeliveryRequest, RecipientResolver, ResolverError};
pub use mail_service::{
    ComposePayload, DraftPayload, MailError, MailService, MailStore, SendReport, StoreError,
};
pub use notification_service::{
    NotificationRequest, NotificationService, NotificationSettings, SentNotification, ToastKind,
};
pub use view_cache::{CachedView, QueryKey, QueryKind, ViewCache};

#[cfg(test)]
pub(crate) use delivery::MockRecipientResolver;
#[cfg(test)]
pub(crate) use mail_service::testing;
