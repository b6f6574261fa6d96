//! Send, draft and read-state workflow.
//!
//! [`MailService`] owns the mutation path for a user's mailbox. Every
//! operation takes the caller's [`Session`] explicitly, writes through a
//! [`MailStore`], fans sent mail out through a [`RecipientResolver`], then
//! invalidates the affected [`ViewCache`] kinds and publishes an
//! [`AppEvent`].

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::delivery::{DeliveryRequest, RecipientResolver, ResolverError};
use super::view_cache::{CachedView, QueryKey, QueryKind, ViewCache};
use crate::app::events::{AppEvent, EventBus, Operation};
use crate::domain::address::first_invalid;
use crate::domain::{self, Email, EmailId, EmailStatus, Folder, FolderId, Session, UserId};

/// Errors reported by a [`MailStore`] backend.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    /// A uniqueness or reference constraint rejected the write.
    #[error("constraint violated: {0}")]
    Constraint(String),

    #[error("database error: {0}")]
    Database(String),
}

/// Errors from mailbox operations.
#[derive(Debug, Error)]
pub enum MailError {
    #[error("not signed in")]
    NotAuthenticated,

    #[error("invalid email address: {0}")]
    InvalidAddress(String),

    #[error("folder name must not be blank")]
    InvalidFolderName,

    #[error("a folder named \"{0}\" already exists")]
    DuplicateFolder(String),

    #[error("system folder \"{0}\" cannot be deleted")]
    SystemFolder(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    /// The delivery loop aborted. The sender's copy and every delivery in
    /// `delivered` are kept.
    #[error(
        "delivery to {recipient} failed after {} successful deliveries: {source}",
        .delivered.len()
    )]
    Delivery {
        email_id: EmailId,
        recipient: String,
        delivered: Vec<String>,
        source: ResolverError,
    },
}

impl MailError {
    /// True when the send stored the sender's copy but the fan-out stopped
    /// partway.
    pub fn is_partial_delivery(&self) -> bool {
        matches!(self, MailError::Delivery { .. })
    }
}

pub type Result<T> = std::result::Result<T, MailError>;

/// Persistence for emails and folders, always scoped to an owner.
///
/// Boolean results report whether a row was affected.
#[async_trait::async_trait]
pub trait MailStore: Send + Sync {
    async fn insert_email(&self, email: &Email) -> std::result::Result<(), StoreError>;

    /// Rewrites an existing draft's editable fields.
    async fn update_draft(&self, draft: &Email) -> std::result::Result<bool, StoreError>;

    async fn get_email(
        &self,
        owner: &UserId,
        id: &EmailId,
    ) -> std::result::Result<Option<Email>, StoreError>;

    /// Newest first by creation time.
    async fn list_emails(
        &self,
        owner: &UserId,
        folder: Option<&FolderId>,
    ) -> std::result::Result<Vec<Email>, StoreError>;

    async fn set_read(
        &self,
        owner: &UserId,
        id: &EmailId,
        is_read: bool,
    ) -> std::result::Result<bool, StoreError>;

    async fn set_starred(
        &self,
        owner: &UserId,
        id: &EmailId,
        is_starred: bool,
    ) -> std::result::Result<bool, StoreError>;

    async fn set_folder(
        &self,
        owner: &UserId,
        id: &EmailId,
        folder: &FolderId,
    ) -> std::result::Result<bool, StoreError>;

    async fn delete_email(&self, owner: &UserId, id: &EmailId)
        -> std::result::Result<bool, StoreError>;

    /// System folders first, then by name.
    async fn list_folders(&self, owner: &UserId) -> std::result::Result<Vec<Folder>, StoreError>;

    async fn get_folder(
        &self,
        owner: &UserId,
        id: &FolderId,
    ) -> std::result::Result<Option<Folder>, StoreError>;

    /// Fails with [`StoreError::Constraint`] when the owner already has a
    /// folder of that name.
    async fn insert_folder(&self, folder: &Folder) -> std::result::Result<(), StoreError>;

    /// Deletes a non-system folder. Its emails are kept without a folder.
    async fn delete_folder(&self, owner: &UserId, id: &FolderId)
        -> std::result::Result<bool, StoreError>;
}

/// A message ready to send.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComposePayload {
    pub to: Vec<String>,
    pub cc: Vec<String>,
    pub bcc: Vec<String>,
    pub subject: String,
    pub body: String,
}

/// A draft to insert (no id) or update (existing id).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DraftPayload {
    pub id: Option<EmailId>,
    pub to: Vec<String>,
    pub cc: Vec<String>,
    pub bcc: Vec<String>,
    pub subject: String,
    pub body: String,
}

/// Outcome of a completed send.
#[derive(Debug, Clone, PartialEq)]
pub struct SendReport {
    /// The sender's stored copy.
    pub email: Email,
    /// Recipients that received an inbox copy, in call order.
    pub delivered: Vec<String>,
    /// Recipients with no in-app account or no inbox.
    pub undelivered: Vec<String>,
}

impl SendReport {
    pub fn has_warnings(&self) -> bool {
        !self.undelivered.is_empty()
    }
}

fn validate_addresses<'a>(lists: [&'a [String]; 3]) -> Result<()> {
    match first_invalid(lists.into_iter().flatten()) {
        Some(addr) => Err(MailError::InvalidAddress(addr.to_string())),
        None => Ok(()),
    }
}

/// Mailbox workflow over a store and a delivery capability.
pub struct MailService<S, R> {
    store: Arc<S>,
    resolver: Arc<R>,
    cache: Arc<ViewCache>,
    events: EventBus,
}

impl<S, R> Clone for MailService<S, R> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            resolver: Arc::clone(&self.resolver),
            cache: Arc::clone(&self.cache),
            events: self.events.clone(),
        }
    }
}

impl<S, R> MailService<S, R>
where
    S: MailStore,
    R: RecipientResolver,
{
    pub fn new(store: Arc<S>, resolver: Arc<R>, cache: Arc<ViewCache>, events: EventBus) -> Self {
        Self {
            store,
            resolver,
            cache,
            events,
        }
    }

    pub fn cache(&self) -> &ViewCache {
        &self.cache
    }

    /// Stores the sender's copy, then delivers to every recipient in
    /// `to`, `cc`, `bcc` order.
    ///
    /// Recipients without an account are reported in
    /// [`SendReport::undelivered`] and do not fail the send. A resolver
    /// error stops the loop and returns [`MailError::Delivery`]; the
    /// sender's copy is not rolled back.
    pub async fn send(
        &self,
        session: Option<&Session>,
        payload: ComposePayload,
        sent_folder: Option<&FolderId>,
    ) -> Result<SendReport> {
        self.send_inner(session, payload, sent_folder)
            .await
            .map_err(|err| self.report_failure(Operation::SendEmail, err))
    }

    async fn send_inner(
        &self,
        session: Option<&Session>,
        payload: ComposePayload,
        sent_folder: Option<&FolderId>,
    ) -> Result<SendReport> {
        let session = session.ok_or(MailError::NotAuthenticated)?;
        validate_addresses([payload.to.as_slice(), &payload.cc, &payload.bcc])?;
        self.require_owned_folder(&session.user_id, sent_folder).await?;

        let sent_at = domain::now();
        let email = Email {
            id: EmailId::generate(),
            user_id: session.user_id.clone(),
            folder_id: sent_folder.cloned(),
            from_email: session.email.clone(),
            from_name: Some(session.sender_name().to_string()),
            to: payload.to,
            cc: payload.cc,
            bcc: payload.bcc,
            subject: payload.subject,
            body: payload.body,
            status: EmailStatus::Sent,
            is_read: true,
            is_starred: false,
            sent_at: Some(sent_at),
            received_at: None,
            created_at: sent_at,
            updated_at: sent_at,
        };

        self.store.insert_email(&email).await?;
        tracing::info!(
            email_id = %email.id,
            recipients = email.all_recipients().count(),
            "sent copy stored"
        );

        let fan_out = self.fan_out(&email).await;
        // The sender's copy exists either way.
        self.invalidate(QueryKind::Emails);
        let (delivered, undelivered) = fan_out?;

        self.events.publish(AppEvent::EmailSent {
            email_id: email.id.clone(),
            delivered: delivered.len(),
            undelivered: undelivered.clone(),
        });

        Ok(SendReport {
            email,
            delivered,
            undelivered,
        })
    }

    async fn fan_out(&self, email: &Email) -> Result<(Vec<String>, Vec<String>)> {
        let mut delivered = Vec::new();
        let mut undelivered = Vec::new();

        if email.to.is_empty() {
            tracing::warn!(email_id = %email.id, "no primary recipients; skipping delivery");
            return Ok((delivered, undelivered));
        }

        let from_name = email.sender_display().to_string();
        let sent_at = email.sent_at.unwrap_or(email.created_at);

        for recipient in email.all_recipients() {
            let request = DeliveryRequest {
                recipient: recipient.clone(),
                from_email: email.from_email.clone(),
                from_name: from_name.clone(),
                to: email.to.clone(),
                cc: email.cc.clone(),
                bcc: email.bcc.clone(),
                subject: email.subject.clone(),
                body: email.body.clone(),
                sent_at,
            };

            match self.resolver.deliver(&request).await {
                Ok(true) => {
                    tracing::debug!(%recipient, "delivered");
                    delivered.push(recipient.clone());
                }
                Ok(false) => {
                    tracing::warn!(%recipient, "recipient is not an in-app user; delivery skipped");
                    self.events.publish(AppEvent::DeliverySkipped {
                        recipient: recipient.clone(),
                    });
                    undelivered.push(recipient.clone());
                }
                Err(source) => {
                    tracing::warn!(
                        %recipient,
                        delivered = delivered.len(),
                        error = %source,
                        "delivery aborted"
                    );
                    return Err(MailError::Delivery {
                        email_id: email.id.clone(),
                        recipient: recipient.clone(),
                        delivered,
                        source,
                    });
                }
            }
        }

        Ok((delivered, undelivered))
    }

    /// Inserts a new draft or updates the caller's existing one.
    pub async fn save_draft(
        &self,
        session: Option<&Session>,
        payload: DraftPayload,
        folder: Option<&FolderId>,
    ) -> Result<Email> {
        self.save_draft_inner(session, payload, folder)
            .await
            .map_err(|err| self.report_failure(Operation::SaveDraft, err))
    }

    async fn save_draft_inner(
        &self,
        session: Option<&Session>,
        payload: DraftPayload,
        folder: Option<&FolderId>,
    ) -> Result<Email> {
        let session = session.ok_or(MailError::NotAuthenticated)?;
        validate_addresses([payload.to.as_slice(), &payload.cc, &payload.bcc])?;
        self.require_owned_folder(&session.user_id, folder).await?;

        let now = domain::now();
        let draft = match payload.id {
            Some(id) => {
                let existing = self
                    .store
                    .get_email(&session.user_id, &id)
                    .await?
                    .filter(Email::is_draft)
                    .ok_or_else(|| MailError::NotFound(format!("draft {id}")))?;

                let draft = Email {
                    folder_id: folder.cloned(),
                    from_email: session.email.clone(),
                    from_name: Some(session.sender_name().to_string()),
                    to: payload.to,
                    cc: payload.cc,
                    bcc: payload.bcc,
                    subject: payload.subject,
                    body: payload.body,
                    updated_at: now,
                    ..existing
                };
                if !self.store.update_draft(&draft).await? {
                    return Err(MailError::NotFound(format!("draft {id}")));
                }
                draft
            }
            None => {
                let draft = Email {
                    id: EmailId::generate(),
                    user_id: session.user_id.clone(),
                    folder_id: folder.cloned(),
                    from_email: session.email.clone(),
                    from_name: Some(session.sender_name().to_string()),
                    to: payload.to,
                    cc: payload.cc,
                    bcc: payload.bcc,
                    subject: payload.subject,
                    body: payload.body,
                    status: EmailStatus::Draft,
                    is_read: true,
                    is_starred: false,
                    sent_at: None,
                    received_at: None,
                    created_at: now,
                    updated_at: now,
                };
                self.store.insert_email(&draft).await?;
                draft
            }
        };

        tracing::info!(email_id = %draft.id, "draft saved");
        self.invalidate(QueryKind::Emails);
        self.events.publish(AppEvent::DraftSaved {
            email_id: draft.id.clone(),
        });
        Ok(draft)
    }

    pub async fn mark_as_read(
        &self,
        session: Option<&Session>,
        id: &EmailId,
        is_read: bool,
    ) -> Result<()> {
        let result: Result<()> = async {
            let session = session.ok_or(MailError::NotAuthenticated)?;
            let found = self.store.set_read(&session.user_id, id, is_read).await?;
            require_found(found, id)
        }
        .await;
        self.finish_mutation(
            Operation::MarkAsRead,
            result,
            AppEvent::EmailReadChanged {
                email_id: id.clone(),
                is_read,
            },
        )
    }

    pub async fn toggle_star(
        &self,
        session: Option<&Session>,
        id: &EmailId,
        is_starred: bool,
    ) -> Result<()> {
        let result: Result<()> = async {
            let session = session.ok_or(MailError::NotAuthenticated)?;
            let found = self
                .store
                .set_starred(&session.user_id, id, is_starred)
                .await?;
            require_found(found, id)
        }
        .await;
        self.finish_mutation(
            Operation::ToggleStar,
            result,
            AppEvent::EmailStarred {
                email_id: id.clone(),
                is_starred,
            },
        )
    }

    /// Moves an email into the trash folder. Only the folder changes.
    pub async fn move_to_trash(
        &self,
        session: Option<&Session>,
        id: &EmailId,
        trash_folder: &FolderId,
    ) -> Result<()> {
        let result: Result<()> = async {
            let session = session.ok_or(MailError::NotAuthenticated)?;
            let found = self
                .store
                .set_folder(&session.user_id, id, trash_folder)
                .await?;
            require_found(found, id)
        }
        .await;
        self.finish_mutation(
            Operation::MoveToTrash,
            result,
            AppEvent::EmailTrashed {
                email_id: id.clone(),
                trash_folder_id: trash_folder.clone(),
            },
        )
    }

    /// Removes an email permanently.
    pub async fn delete_email(&self, session: Option<&Session>, id: &EmailId) -> Result<()> {
        let result: Result<()> = async {
            let session = session.ok_or(MailError::NotAuthenticated)?;
            let found = self.store.delete_email(&session.user_id, id).await?;
            require_found(found, id)
        }
        .await;
        self.finish_mutation(
            Operation::DeleteEmail,
            result,
            AppEvent::EmailDeleted {
                email_id: id.clone(),
            },
        )
    }

    /// Emails may only be filed under folders of their owner.
    async fn require_owned_folder(&self, owner: &UserId, folder: Option<&FolderId>) -> Result<()> {
        let Some(id) = folder else {
            return Ok(());
        };
        match self.store.get_folder(owner, id).await? {
            Some(_) => Ok(()),
            None => Err(MailError::NotFound(format!("folder {id}"))),
        }
    }

    fn finish_mutation(
        &self,
        operation: Operation,
        result: Result<()>,
        event: AppEvent,
    ) -> Result<()> {
        match result {
            Ok(()) => {
                self.invalidate(QueryKind::Emails);
                self.events.publish(event);
                Ok(())
            }
            Err(err) => Err(self.report_failure(operation, err)),
        }
    }

    /// Creates a user folder. Names are unique per user, ignoring case.
    pub async fn create_folder(
        &self,
        session: Option<&Session>,
        name: &str,
        icon: Option<&str>,
    ) -> Result<Folder> {
        let result: Result<Folder> = async {
            let session = session.ok_or(MailError::NotAuthenticated)?;
            let name = name.trim();
            if name.is_empty() {
                return Err(MailError::InvalidFolderName);
            }

            let folder = Folder {
                id: FolderId::generate(),
                user_id: session.user_id.clone(),
                name: name.to_string(),
                icon: icon.unwrap_or("folder").to_string(),
                is_system: false,
                created_at: domain::now(),
            };
            match self.store.insert_folder(&folder).await {
                Ok(()) => Ok(folder),
                Err(StoreError::Constraint(_)) => Err(MailError::DuplicateFolder(folder.name)),
                Err(err) => Err(err.into()),
            }
        }
        .await;

        match result {
            Ok(folder) => {
                tracing::info!(folder_id = %folder.id, name = %folder.name, "folder created");
                self.invalidate(QueryKind::Folders);
                self.events.publish(AppEvent::FolderCreated {
                    folder_id: folder.id.clone(),
                    name: folder.name.clone(),
                });
                Ok(folder)
            }
            Err(err) => Err(self.report_failure(Operation::CreateFolder, err)),
        }
    }

    /// Deletes a user folder; its emails stay, without a folder.
    pub async fn delete_folder(&self, session: Option<&Session>, id: &FolderId) -> Result<()> {
        let result: Result<()> = async {
            let session = session.ok_or(MailError::NotAuthenticated)?;
            let folder = self
                .store
                .get_folder(&session.user_id, id)
                .await?
                .ok_or_else(|| MailError::NotFound(format!("folder {id}")))?;
            if folder.is_system {
                return Err(MailError::SystemFolder(folder.name));
            }
            if !self.store.delete_folder(&session.user_id, id).await? {
                return Err(MailError::NotFound(format!("folder {id}")));
            }
            Ok(())
        }
        .await;

        match result {
            Ok(()) => {
                self.invalidate(QueryKind::Folders);
                self.invalidate(QueryKind::Emails);
                self.events.publish(AppEvent::FolderDeleted {
                    folder_id: id.clone(),
                });
                Ok(())
            }
            Err(err) => Err(self.report_failure(Operation::DeleteFolder, err)),
        }
    }

    /// The caller's folders. Empty without a session.
    pub async fn list_folders(&self, session: Option<&Session>) -> Result<Vec<Folder>> {
        let Some(session) = session else {
            return Ok(Vec::new());
        };

        let key = QueryKey::Folders(session.user_id.clone());
        if let Some(CachedView::Folders(folders)) = self.cache.get(&key) {
            return Ok(folders);
        }

        let generation = self.cache.generation(QueryKind::Folders);
        let folders = self.store.list_folders(&session.user_id).await?;
        self.cache
            .put(key, CachedView::Folders(folders.clone()), generation);
        Ok(folders)
    }

    /// The caller's emails, optionally in one folder. Empty without a
    /// session.
    pub async fn list_emails(
        &self,
        session: Option<&Session>,
        folder: Option<&FolderId>,
    ) -> Result<Vec<Email>> {
        let Some(session) = session else {
            return Ok(Vec::new());
        };

        let key = QueryKey::Emails(session.user_id.clone(), folder.cloned());
        if let Some(CachedView::Emails(emails)) = self.cache.get(&key) {
            return Ok(emails);
        }

        let generation = self.cache.generation(QueryKind::Emails);
        let emails = self.store.list_emails(&session.user_id, folder).await?;
        self.cache
            .put(key, CachedView::Emails(emails.clone()), generation);
        Ok(emails)
    }

    pub async fn get_email(&self, session: Option<&Session>, id: &EmailId) -> Result<Option<Email>> {
        let Some(session) = session else {
            return Ok(None);
        };
        Ok(self.store.get_email(&session.user_id, id).await?)
    }

    /// Forces the next folder and email reads to hit the store.
    pub fn refresh(&self) {
        self.invalidate(QueryKind::Emails);
        self.invalidate(QueryKind::Folders);
    }

    fn invalidate(&self, kind: QueryKind) {
        self.cache.invalidate(kind);
        self.events.publish(AppEvent::ViewsInvalidated(kind));
    }

    fn report_failure(&self, operation: Operation, err: MailError) -> MailError {
        tracing::error!(%operation, error = %err, "operation failed");
        self.events.publish(AppEvent::OperationFailed {
            operation,
            message: err.to_string(),
            partial: err.is_partial_delivery(),
        });
        err
    }
}

fn require_found(found: bool, id: &EmailId) -> Result<()> {
    if found {
        Ok(())
    } else {
        Err(MailError::NotFound(format!("email {id}")))
    }
}


#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;
    use std::sync::Mutex;

    use mockall::predicate::always;
    use mockall::Sequence;
    use pretty_assertions::assert_eq;

    use super::testing::MemoryStore;
    use super::*;
    use crate::app::events::recording::record;
    use crate::services::delivery::MockRecipientResolver;

    fn session() -> Session {
        Session::new(UserId::from("user-1"), "me@x.com", Some("Me".to_string()))
    }

    fn sent_folder() -> FolderId {
        FolderId::from("f-sent")
    }

    fn folder(id: &str, name: &str, owner: &str) -> Folder {
        Folder {
            id: FolderId::from(id),
            user_id: UserId::from(owner),
            name: name.into(),
            icon: "folder".into(),
            is_system: true,
            created_at: domain::now(),
        }
    }

    /// The session user's Sent and Drafts, plus another user's Inbox.
    fn mailbox_store() -> MemoryStore {
        MemoryStore::with_folders(vec![
            folder("f-sent", "Sent", "user-1"),
            folder("f-drafts", "Drafts", "user-1"),
            folder("f-other-inbox", "Inbox", "user-2"),
        ])
    }

    fn service(
        store: MemoryStore,
        resolver: MockRecipientResolver,
    ) -> (MailService<MemoryStore, MockRecipientResolver>, EventBus) {
        let events = EventBus::new();
        let service = MailService::new(
            Arc::new(store),
            Arc::new(resolver),
            Arc::new(ViewCache::new(16)),
            events.clone(),
        );
        (service, events)
    }

    fn payload(to: &[&str], cc: &[&str], bcc: &[&str]) -> ComposePayload {
        let owned = |list: &[&str]| list.iter().map(|s| s.to_string()).collect();
        ComposePayload {
            to: owned(to),
            cc: owned(cc),
            bcc: owned(bcc),
            subject: "Hi".into(),
            body: "...".into(),
        }
    }

    fn expect_delivery(
        resolver: &mut MockRecipientResolver,
        seq: &mut Sequence,
        recipient: &'static str,
        outcome: std::result::Result<bool, ResolverError>,
    ) {
        resolver
            .expect_deliver()
            .withf(move |req| req.recipient == recipient)
            .times(1)
            .in_sequence(seq)
            .returning(move |_| outcome.clone());
    }

    #[tokio::test]
    async fn partial_non_delivery_still_succeeds() {
        let mut resolver = MockRecipientResolver::new();
        let mut seq = Sequence::new();
        expect_delivery(&mut resolver, &mut seq, "a@x.com", Ok(true));
        expect_delivery(&mut resolver, &mut seq, "b@x.com", Ok(false));
        let (service, events) = service(mailbox_store(), resolver);
        let recorded = record(&events);

        let report = service
            .send(
                Some(&session()),
                payload(&["a@x.com", "b@x.com"], &[], &[]),
                Some(&sent_folder()),
            )
            .await
            .unwrap();

        assert_eq!(report.delivered, vec!["a@x.com".to_string()]);
        assert_eq!(report.undelivered, vec!["b@x.com".to_string()]);
        assert!(report.has_warnings());
        assert_eq!(report.email.status, EmailStatus::Sent);
        assert_eq!(report.email.folder_id, Some(sent_folder()));
        assert!(report.email.is_read);

        let events = recorded.lock().unwrap();
        assert!(events.contains(&AppEvent::DeliverySkipped {
            recipient: "b@x.com".into()
        }));
        assert!(events.contains(&AppEvent::EmailSent {
            email_id: report.email.id.clone(),
            delivered: 1,
            undelivered: vec!["b@x.com".into()],
        }));
    }

    #[tokio::test]
    async fn hard_failure_aborts_and_keeps_sent_copy() {
        let mut resolver = MockRecipientResolver::new();
        let mut seq = Sequence::new();
        expect_delivery(
            &mut resolver,
            &mut seq,
            "a@x.com",
            Err(ResolverError::Transport("connection reset".into())),
        );
        // No expectation for b@x.com: a call would panic the mock.
        let store = Arc::new(mailbox_store());
        let events = EventBus::new();
        let recorded = record(&events);
        let service = MailService::new(
            Arc::clone(&store),
            Arc::new(resolver),
            Arc::new(ViewCache::default()),
            events,
        );

        let err = service
            .send(
                Some(&session()),
                payload(&["a@x.com", "b@x.com"], &[], &[]),
                Some(&sent_folder()),
            )
            .await
            .unwrap_err();

        assert!(err.is_partial_delivery());
        match &err {
            MailError::Delivery {
                recipient,
                delivered,
                source,
                ..
            } => {
                assert_eq!(recipient, "a@x.com");
                assert!(delivered.is_empty());
                assert_eq!(source, &ResolverError::Transport("connection reset".into()));
            }
            other => panic!("unexpected error: {other:?}"),
        }

        let stored = store.emails();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].status, EmailStatus::Sent);

        let events = recorded.lock().unwrap();
        assert!(events.contains(&AppEvent::ViewsInvalidated(QueryKind::Emails)));
        assert!(events.iter().any(|e| matches!(
            e,
            AppEvent::OperationFailed {
                operation: Operation::SendEmail,
                partial: true,
                ..
            }
        )));
    }

    #[tokio::test]
    async fn failure_mid_loop_reports_delivered_prefix() {
        let mut resolver = MockRecipientResolver::new();
        let mut seq = Sequence::new();
        expect_delivery(&mut resolver, &mut seq, "a@x.com", Ok(true));
        expect_delivery(&mut resolver, &mut seq, "c@x.com", Ok(false));
        expect_delivery(
            &mut resolver,
            &mut seq,
            "d@x.com",
            Err(ResolverError::PermissionDenied("quota".into())),
        );
        let (service, _) = service(MemoryStore::default(), resolver);

        let err = service
            .send(
                Some(&session()),
                payload(&["a@x.com"], &["c@x.com"], &["d@x.com", "e@x.com"]),
                None,
            )
            .await
            .unwrap_err();

        match err {
            MailError::Delivery {
                recipient,
                delivered,
                ..
            } => {
                assert_eq!(recipient, "d@x.com");
                assert_eq!(delivered, vec!["a@x.com".to_string()]);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn resolver_calls_follow_to_cc_bcc_order_without_dedup() {
        let mut resolver = MockRecipientResolver::new();
        let mut seq = Sequence::new();
        for recipient in ["a@x.com", "b@x.com", "c@x.com", "a@x.com"] {
            expect_delivery(&mut resolver, &mut seq, recipient, Ok(true));
        }
        let (service, _) = service(MemoryStore::default(), resolver);

        let report = service
            .send(
                Some(&session()),
                payload(&["a@x.com", "b@x.com"], &["c@x.com"], &["a@x.com"]),
                None,
            )
            .await
            .unwrap();

        assert_eq!(report.delivered.len(), 4);
    }

    #[tokio::test]
    async fn every_request_carries_the_sent_copy_timestamp_and_lists() {
        let seen = Arc::new(Mutex::new(Vec::<DeliveryRequest>::new()));
        let sink = Arc::clone(&seen);
        let mut resolver = MockRecipientResolver::new();
        resolver
            .expect_deliver()
            .with(always())
            .times(2)
            .returning(move |req| {
                sink.lock().unwrap().push(req.clone());
                Ok(true)
            });
        let (service, _) = service(MemoryStore::default(), resolver);

        let report = service
            .send(
                Some(&session()),
                payload(&["a@x.com"], &["b@x.com"], &[]),
                None,
            )
            .await
            .unwrap();

        let seen = seen.lock().unwrap();
        for request in seen.iter() {
            assert_eq!(Some(request.sent_at), report.email.sent_at);
            assert_eq!(request.from_email, "me@x.com");
            assert_eq!(request.from_name, "Me");
            assert_eq!(request.to, vec!["a@x.com".to_string()]);
            assert_eq!(request.cc, vec!["b@x.com".to_string()]);
            assert_eq!(request.subject, "Hi");
        }
        assert_eq!(seen.len(), 2);
        assert_eq!(report.email.sent_at, Some(report.email.created_at));
    }

    #[tokio::test]
    async fn failed_sent_copy_insert_makes_no_resolver_calls() {
        let mut resolver = MockRecipientResolver::new();
        resolver.expect_deliver().never();
        let store = MemoryStore::default();
        store.fail_inserts.store(true, Ordering::SeqCst);
        let (service, events) = service(store, resolver);
        let recorded = record(&events);

        let err = service
            .send(Some(&session()), payload(&["a@x.com"], &[], &[]), None)
            .await
            .unwrap_err();

        assert!(matches!(err, MailError::Store(StoreError::Database(_))));
        assert!(!err.is_partial_delivery());
        let events = recorded.lock().unwrap();
        assert!(!events.contains(&AppEvent::ViewsInvalidated(QueryKind::Emails)));
    }

    #[tokio::test]
    async fn empty_to_skips_delivery() {
        let mut resolver = MockRecipientResolver::new();
        resolver.expect_deliver().never();
        let (service, _) = service(MemoryStore::default(), resolver);

        let report = service
            .send(Some(&session()), payload(&[], &["b@x.com"], &[]), None)
            .await
            .unwrap();

        assert!(report.delivered.is_empty());
        assert!(report.undelivered.is_empty());
    }

    #[tokio::test]
    async fn send_requires_session_and_valid_addresses() {
        let mut resolver = MockRecipientResolver::new();
        resolver.expect_deliver().never();
        let store = Arc::new(MemoryStore::default());
        let service = MailService::new(
            Arc::clone(&store),
            Arc::new(resolver),
            Arc::new(ViewCache::default()),
            EventBus::new(),
        );

        let err = service
            .send(None, payload(&["a@x.com"], &[], &[]), None)
            .await
            .unwrap_err();
        assert!(matches!(err, MailError::NotAuthenticated));

        let err = service
            .send(Some(&session()), payload(&["a@x.com"], &["not-an-address"], &[]), None)
            .await
            .unwrap_err();
        assert!(matches!(err, MailError::InvalidAddress(addr) if addr == "not-an-address"));
        assert!(store.emails().is_empty());
    }

    #[tokio::test]
    async fn new_draft_is_inserted_once() {
        let store = Arc::new(mailbox_store());
        let service = MailService::new(
            Arc::clone(&store),
            Arc::new(MockRecipientResolver::new()),
            Arc::new(ViewCache::default()),
            EventBus::new(),
        );

        let draft = service
            .save_draft(
                Some(&session()),
                DraftPayload {
                    to: vec!["a@x.com".into()],
                    subject: "Plans".into(),
                    ..Default::default()
                },
                Some(&FolderId::from("f-drafts")),
            )
            .await
            .unwrap();

        let stored = store.emails();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0], draft);
        assert_eq!(draft.status, EmailStatus::Draft);
        assert!(draft.sent_at.is_none());
    }

    #[tokio::test]
    async fn existing_draft_is_updated_in_place() {
        let store = Arc::new(MemoryStore::default());
        let service = MailService::new(
            Arc::clone(&store),
            Arc::new(MockRecipientResolver::new()),
            Arc::new(ViewCache::default()),
            EventBus::new(),
        );
        let first = service
            .save_draft(Some(&session()), DraftPayload::default(), None)
            .await
            .unwrap();

        let second = service
            .save_draft(
                Some(&session()),
                DraftPayload {
                    id: Some(first.id.clone()),
                    to: vec!["b@x.com".into()],
                    subject: "Updated".into(),
                    body: "Body".into(),
                    ..Default::default()
                },
                None,
            )
            .await
            .unwrap();

        assert_eq!(second.id, first.id);
        assert_eq!(second.created_at, first.created_at);
        let stored = store.emails();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].subject, "Updated");
        assert_eq!(stored[0].to, vec!["b@x.com".to_string()]);
    }

    #[tokio::test]
    async fn updating_a_sent_email_as_draft_is_not_found() {
        let mut resolver = MockRecipientResolver::new();
        resolver.expect_deliver().returning(|_| Ok(true));
        let (service, _) = service(MemoryStore::default(), resolver);
        let report = service
            .send(Some(&session()), payload(&["a@x.com"], &[], &[]), None)
            .await
            .unwrap();

        let err = service
            .save_draft(
                Some(&session()),
                DraftPayload {
                    id: Some(report.email.id.clone()),
                    ..Default::default()
                },
                None,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, MailError::NotFound(_)));
    }

    #[tokio::test]
    async fn trash_moves_and_delete_removes() {
        let store = Arc::new(MemoryStore::default());
        let mut a = crate::domain::fixtures::email("e1", "f-inbox");
        a.subject = "keep".into();
        let b = crate::domain::fixtures::email("e2", "f-inbox");
        store.emails.lock().unwrap().extend([a.clone(), b]);
        let service = MailService::new(
            Arc::clone(&store),
            Arc::new(MockRecipientResolver::new()),
            Arc::new(ViewCache::default()),
            EventBus::new(),
        );
        let trash = FolderId::from("f-trash");

        service
            .move_to_trash(Some(&session()), &a.id, &trash)
            .await
            .unwrap();
        service
            .delete_email(Some(&session()), &EmailId::from("e2"))
            .await
            .unwrap();

        let stored = store.emails();
        assert_eq!(stored.len(), 1);
        assert_eq!(
            stored[0],
            Email {
                folder_id: Some(trash),
                ..a
            }
        );
    }

    #[tokio::test]
    async fn read_state_mutations_report_missing_rows() {
        let (service, events) = service(MemoryStore::default(), MockRecipientResolver::new());
        let recorded = record(&events);
        let missing = EmailId::from("nope");

        let err = service
            .mark_as_read(Some(&session()), &missing, true)
            .await
            .unwrap_err();
        assert!(matches!(err, MailError::NotFound(_)));

        let err = service
            .toggle_star(None, &missing, true)
            .await
            .unwrap_err();
        assert!(matches!(err, MailError::NotAuthenticated));

        let failures = recorded
            .lock()
            .unwrap()
            .iter()
            .filter(|e| matches!(e, AppEvent::OperationFailed { .. }))
            .count();
        assert_eq!(failures, 2);
    }

    #[tokio::test]
    async fn mark_as_read_and_star_update_flags() {
        let store = Arc::new(MemoryStore::default());
        store
            .emails
            .lock()
            .unwrap()
            .push(crate::domain::fixtures::email("e1", "f-inbox"));
        let service = MailService::new(
            Arc::clone(&store),
            Arc::new(MockRecipientResolver::new()),
            Arc::new(ViewCache::default()),
            EventBus::new(),
        );
        let id = EmailId::from("e1");

        service.mark_as_read(Some(&session()), &id, true).await.unwrap();
        service.toggle_star(Some(&session()), &id, true).await.unwrap();

        let stored = &store.emails()[0];
        assert!(stored.is_read);
        assert!(stored.is_starred);
    }

    #[tokio::test]
    async fn list_emails_is_cached_until_invalidated() {
        let store = Arc::new(MemoryStore::default());
        let service = MailService::new(
            Arc::clone(&store),
            Arc::new(MockRecipientResolver::new()),
            Arc::new(ViewCache::default()),
            EventBus::new(),
        );

        assert!(service.list_emails(Some(&session()), None).await.unwrap().is_empty());
        service.list_emails(Some(&session()), None).await.unwrap();
        assert_eq!(store.list_calls.load(Ordering::SeqCst), 1);

        service
            .save_draft(Some(&session()), DraftPayload::default(), None)
            .await
            .unwrap();

        let emails = service.list_emails(Some(&session()), None).await.unwrap();
        assert_eq!(emails.len(), 1);
        assert_eq!(store.list_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn reads_without_session_are_empty() {
        let (service, _) = service(MemoryStore::default(), MockRecipientResolver::new());

        assert!(service.list_emails(None, None).await.unwrap().is_empty());
        assert!(service.list_folders(None).await.unwrap().is_empty());
        assert!(service
            .get_email(None, &EmailId::from("e1"))
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn folder_lifecycle() {
        let store = Arc::new(MemoryStore::default());
        let service = MailService::new(
            Arc::clone(&store),
            Arc::new(MockRecipientResolver::new()),
            Arc::new(ViewCache::default()),
            EventBus::new(),
        );

        let folder = service
            .create_folder(Some(&session()), "  Receipts ", None)
            .await
            .unwrap();
        assert_eq!(folder.name, "Receipts");
        assert_eq!(folder.icon, "folder");

        let err = service
            .create_folder(Some(&session()), "receipts", Some("tag"))
            .await
            .unwrap_err();
        assert!(matches!(err, MailError::DuplicateFolder(name) if name == "receipts"));

        let err = service
            .create_folder(Some(&session()), "   ", None)
            .await
            .unwrap_err();
        assert!(matches!(err, MailError::InvalidFolderName));

        service
            .delete_folder(Some(&session()), &folder.id)
            .await
            .unwrap();
        assert!(service.list_folders(Some(&session())).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn send_into_another_users_folder_is_rejected() {
        // No resolver expectations: any delivery would panic the mock.
        let store = Arc::new(mailbox_store());
        let events = EventBus::new();
        let recorded = record(&events);
        let service = MailService::new(
            Arc::clone(&store),
            Arc::new(MockRecipientResolver::new()),
            Arc::new(ViewCache::default()),
            events,
        );

        let err = service
            .send(
                Some(&session()),
                payload(&["a@x.com"], &[], &[]),
                Some(&FolderId::from("f-other-inbox")),
            )
            .await
            .unwrap_err();

        assert!(matches!(&err, MailError::NotFound(what) if what == "folder f-other-inbox"));
        assert!(store.emails().is_empty());
        assert!(!recorded
            .lock()
            .unwrap()
            .contains(&AppEvent::ViewsInvalidated(QueryKind::Emails)));
    }

    #[tokio::test]
    async fn draft_into_another_users_or_unknown_folder_is_rejected() {
        let store = Arc::new(mailbox_store());
        let service = MailService::new(
            Arc::clone(&store),
            Arc::new(MockRecipientResolver::new()),
            Arc::new(ViewCache::default()),
            EventBus::new(),
        );
        let draft = service
            .save_draft(Some(&session()), DraftPayload::default(), None)
            .await
            .unwrap();

        for target in ["f-other-inbox", "f-missing"] {
            let err = service
                .save_draft(
                    Some(&session()),
                    DraftPayload {
                        id: Some(draft.id.clone()),
                        subject: "Moved".into(),
                        ..Default::default()
                    },
                    Some(&FolderId::from(target)),
                )
                .await
                .unwrap_err();
            assert!(matches!(err, MailError::NotFound(_)));

            let err = service
                .save_draft(Some(&session()), DraftPayload::default(), Some(&FolderId::from(target)))
                .await
                .unwrap_err();
            assert!(matches!(err, MailError::NotFound(_)));
        }

        let stored = store.emails();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].folder_id, None);
        assert_eq!(stored[0].subject, "");
    }

    #[tokio::test]
    async fn system_folders_cannot_be_deleted() {
        let inbox = folder("f-inbox", "Inbox", "user-1");
        let (service, _) = service(
            MemoryStore::with_folders(vec![inbox.clone()]),
            MockRecipientResolver::new(),
        );

        let err = service
            .delete_folder(Some(&session()), &inbox.id)
            .await
            .unwrap_err();
        assert!(matches!(err, MailError::SystemFolder(name) if name == "Inbox"));
    }

    #[test]
    fn delivery_error_message_counts_prefix() {
        let err = MailError::Delivery {
            email_id: EmailId::from("e1"),
            recipient: "b@x.com".into(),
            delivered: vec!["a@x.com".into()],
            source: ResolverError::Transport("timeout".into()),
        };
        assert_eq!(
            err.to_string(),
            "delivery to b@x.com failed after 1 successful deliveries: \
             delivery transport failed: timeout"
        );
    }
}
