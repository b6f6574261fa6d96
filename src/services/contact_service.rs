//! Contact service for the user's address book.
//!
//! Contacts are created explicitly. Addresses are validated but not
//! deduplicated: two entries may share an address.

use std::sync::Arc;

use thiserror::Error;

use super::mail_service::StoreError;
use super::view_cache::{CachedView, QueryKey, QueryKind, ViewCache};
use crate::app::events::{AppEvent, EventBus, Operation};
use crate::domain::address::is_valid_email;
use crate::domain::{Contact, ContactId, Session, UserId};

/// Errors that can occur during contact operations.
#[derive(Debug, Error)]
pub enum ContactError {
    #[error("not signed in")]
    NotAuthenticated,

    #[error("Contact not found: {0}")]
    NotFound(String),

    #[error("Invalid email address: {0}")]
    InvalidEmail(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Result type for contact operations.
pub type Result<T> = std::result::Result<T, ContactError>;

/// Storage trait for contact persistence.
#[async_trait::async_trait]
pub trait ContactStorage: Send + Sync {
    async fn insert_contact(&self, contact: &Contact) -> std::result::Result<(), StoreError>;

    /// Returns `false` when the owner has no contact with that id.
    async fn delete_contact(
        &self,
        owner: &UserId,
        id: &ContactId,
    ) -> std::result::Result<bool, StoreError>;

    /// Named contacts first by name, then unnamed ones by address.
    async fn list_contacts(&self, owner: &UserId) -> std::result::Result<Vec<Contact>, StoreError>;
}

/// Contact service.
pub struct ContactService<S> {
    storage: Arc<S>,
    cache: Arc<ViewCache>,
    events: EventBus,
}

impl<S> Clone for ContactService<S> {
    fn clone(&self) -> Self {
        Self {
            storage: Arc::clone(&self.storage),
            cache: Arc::clone(&self.cache),
            events: self.events.clone(),
        }
    }
}

impl<S: ContactStorage> ContactService<S> {
    /// Creates a new contact service.
    pub fn new(storage: Arc<S>, cache: Arc<ViewCache>, events: EventBus) -> Self {
        Self {
            storage,
            cache,
            events,
        }
    }

    /// Adds a contact for the signed-in user.
    pub async fn add_contact(
        &self,
        session: Option<&Session>,
        email: &str,
        full_name: Option<&str>,
    ) -> Result<Contact> {
        let result: Result<Contact> = async {
            let session = session.ok_or(ContactError::NotAuthenticated)?;
            let email = email.trim();
            if !is_valid_email(email) {
                return Err(ContactError::InvalidEmail(email.to_string()));
            }

            let full_name = full_name
                .map(str::trim)
                .filter(|name| !name.is_empty())
                .map(str::to_string);
            let contact = Contact::new(session.user_id.clone(), email, full_name);
            self.storage.insert_contact(&contact).await?;
            Ok(contact)
        }
        .await;

        match result {
            Ok(contact) => {
                tracing::info!(contact_id = %contact.id, "contact added");
                self.invalidate();
                self.events.publish(AppEvent::ContactAdded {
                    contact_id: contact.id.clone(),
                    email: contact.email.clone(),
                });
                Ok(contact)
            }
            Err(err) => Err(self.report_failure(Operation::AddContact, err)),
        }
    }

    /// Deletes one of the signed-in user's contacts.
    pub async fn delete_contact(&self, session: Option<&Session>, id: &ContactId) -> Result<()> {
        let result: Result<()> = async {
            let session = session.ok_or(ContactError::NotAuthenticated)?;
            if !self.storage.delete_contact(&session.user_id, id).await? {
                return Err(ContactError::NotFound(id.to_string()));
            }
            Ok(())
        }
        .await;

        match result {
            Ok(()) => {
                self.invalidate();
                self.events.publish(AppEvent::ContactDeleted {
                    contact_id: id.clone(),
                });
                Ok(())
            }
            Err(err) => Err(self.report_failure(Operation::DeleteContact, err)),
        }
    }

    /// Lists the signed-in user's contacts. Empty without a session.
    pub async fn list_contacts(&self, session: Option<&Session>) -> Result<Vec<Contact>> {
        let Some(session) = session else {
            return Ok(Vec::new());
        };

        let key = QueryKey::Contacts(session.user_id.clone());
        if let Some(CachedView::Contacts(contacts)) = self.cache.get(&key) {
            return Ok(contacts);
        }

        let generation = self.cache.generation(QueryKind::Contacts);
        let contacts = self.storage.list_contacts(&session.user_id).await?;
        self.cache
            .put(key, CachedView::Contacts(contacts.clone()), generation);
        Ok(contacts)
    }

    /// Contacts whose name or address contains `query`, ignoring case.
    pub async fn search(&self, session: Option<&Session>, query: &str) -> Result<Vec<Contact>> {
        let query = query.trim().to_lowercase();
        let contacts = self.list_contacts(session).await?;
        if query.is_empty() {
            return Ok(contacts);
        }

        Ok(contacts
            .into_iter()
            .filter(|contact| {
                contact.email.to_lowercase().contains(&query)
                    || contact
                        .full_name
                        .as_ref()
                        .is_some_and(|name| name.to_lowercase().contains(&query))
            })
            .collect())
    }

    fn invalidate(&self) {
        self.cache.invalidate(QueryKind::Contacts);
        self.events
            .publish(AppEvent::ViewsInvalidated(QueryKind::Contacts));
    }

    fn report_failure(&self, operation: Operation, err: ContactError) -> ContactError {
        tracing::error!(%operation, error = %err, "operation failed");
        self.events.publish(AppEvent::OperationFailed {
            operation,
            message: err.to_string(),
            partial: false,
        });
        err
    }
}
