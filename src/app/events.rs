//! Event bus for cross-component communication.
//!
//! Services publish an [`AppEvent`] after every confirmed mutation or
//! failure; the notification service and any view layer subscribe.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::domain::{ContactId, EmailId, FolderId};
use crate::services::QueryKind;

/// User-initiated operations, used to label failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    SendEmail,
    SaveDraft,
    MarkAsRead,
    ToggleStar,
    MoveToTrash,
    DeleteEmail,
    CreateFolder,
    DeleteFolder,
    AddContact,
    DeleteContact,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Operation::SendEmail => "send email",
            Operation::SaveDraft => "save draft",
            Operation::MarkAsRead => "update read state",
            Operation::ToggleStar => "update star",
            Operation::MoveToTrash => "move email to trash",
            Operation::DeleteEmail => "delete email",
            Operation::CreateFolder => "create folder",
            Operation::DeleteFolder => "delete folder",
            Operation::AddContact => "add contact",
            Operation::DeleteContact => "delete contact",
        };
        f.write_str(label)
    }
}

/// Domain events.
#[derive(Debug, Clone, PartialEq)]
pub enum AppEvent {
    /// A message was sent and fanned out.
    EmailSent {
        email_id: EmailId,
        delivered: usize,
        undelivered: Vec<String>,
    },
    /// A recipient had no in-app account or no inbox.
    DeliverySkipped { recipient: String },
    /// A draft was inserted or updated.
    DraftSaved { email_id: EmailId },
    EmailReadChanged { email_id: EmailId, is_read: bool },
    EmailStarred { email_id: EmailId, is_starred: bool },
    EmailTrashed {
        email_id: EmailId,
        trash_folder_id: FolderId,
    },
    /// An email was permanently removed.
    EmailDeleted { email_id: EmailId },
    FolderCreated { folder_id: FolderId, name: String },
    FolderDeleted { folder_id: FolderId },
    ContactAdded { contact_id: ContactId, email: String },
    ContactDeleted { contact_id: ContactId },
    /// Cached views of a kind were marked stale.
    ViewsInvalidated(QueryKind),
    /// An operation failed.
    ///
    /// `partial` is set when some writes had already happened, e.g. a send
    /// whose delivery loop aborted after the sender's copy was stored.
    OperationFailed {
        operation: Operation,
        message: String,
        partial: bool,
    },
}

/// Subscriber ID for unsubscribing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(u64);

/// Event handler function type.
pub type EventHandler = Box<dyn Fn(&AppEvent) + Send + Sync>;

#[derive(Default)]
struct Handlers {
    next_id: u64,
    by_id: HashMap<u64, EventHandler>,
}

/// Publish-subscribe bus. Clones share the same subscribers.
#[derive(Clone, Default)]
pub struct EventBus {
    handlers: Arc<Mutex<Handlers>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Handlers> {
        self.handlers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Subscribe to all events.
    pub fn subscribe<F>(&self, handler: F) -> SubscriberId
    where
        F: Fn(&AppEvent) + Send + Sync + 'static,
    {
        let mut handlers = self.lock();
        let id = handlers.next_id;
        handlers.next_id += 1;
        handlers.by_id.insert(id, Box::new(handler));
        SubscriberId(id)
    }

    pub fn unsubscribe(&self, subscriber_id: SubscriberId) {
        self.lock().by_id.remove(&subscriber_id.0);
    }

    /// Publish an event to all subscribers, synchronously.
    ///
    /// Handlers must not publish or subscribe from within the callback.
    pub fn publish(&self, event: AppEvent) {
        tracing::trace!(?event, "publish");
        let handlers = self.lock();
        for handler in handlers.by_id.values() {
            handler(&event);
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.lock().by_id.len()
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}
