//! Application state and lifecycle management.
//!
//! [`App`] wires storage, services, the view cache and the event bus
//! together and drives [`MailboxState`] through the workflow operations.

pub mod events;
pub mod state;

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use anyhow::{Context, Result};

use crate::config::Settings;
use crate::domain::{Email, Session, SystemFolder};
use crate::services::{
    ContactService, MailService, NotificationService, SendReport, SentNotification, ViewCache,
};
use crate::storage::{Database, LocalDelivery, SqliteStore};

pub use events::{AppEvent, EventBus, Operation};
pub use state::MailboxState;

/// Mail service over the local database.
pub type LocalMailService = MailService<SqliteStore, LocalDelivery>;

/// Composition root.
pub struct App {
    settings: Settings,
    store: Arc<SqliteStore>,
    events: EventBus,
    mail: LocalMailService,
    contacts: ContactService<SqliteStore>,
    notifications: Arc<Mutex<NotificationService>>,
}

impl App {
    /// Opens the database named by `settings`.
    pub async fn open(settings: Settings) -> Result<Self> {
        let path = settings.database_path()?;
        let db = Database::open(&path)
            .await
            .with_context(|| format!("opening database at {}", path.display()))?;
        tracing::info!(path = %path.display(), "database opened");
        Ok(Self::with_database(db, settings))
    }

    /// An app over a fresh in-memory database.
    pub async fn in_memory(settings: Settings) -> Result<Self> {
        let db = Database::open_in_memory().await?;
        Ok(Self::with_database(db, settings))
    }

    fn with_database(db: Database, settings: Settings) -> Self {
        let store = Arc::new(SqliteStore::new(db.clone()));
        let resolver = Arc::new(LocalDelivery::new(db));
        let cache = Arc::new(ViewCache::new(settings.cache.capacity));
        let events = EventBus::new();

        let notifications = Arc::new(Mutex::new(NotificationService::new(
            (&settings.notifications).into(),
        )));
        NotificationService::attach(Arc::clone(&notifications), &events);

        let mail = MailService::new(
            Arc::clone(&store),
            resolver,
            Arc::clone(&cache),
            events.clone(),
        );
        let contacts = ContactService::new(Arc::clone(&store), cache, events.clone());

        Self {
            settings,
            store,
            events,
            mail,
            contacts,
            notifications,
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn mail(&self) -> &LocalMailService {
        &self.mail
    }

    pub fn contacts(&self) -> &ContactService<SqliteStore> {
        &self.contacts
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    fn notification_service(&self) -> MutexGuard<'_, NotificationService> {
        self.notifications
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Toasts currently on screen, oldest first.
    ///
    /// Returns a copy; the service lock is released before this returns.
    pub fn notifications(&self) -> Vec<SentNotification> {
        self.notification_service()
            .active_notifications()
            .into_iter()
            .cloned()
            .collect()
    }

    pub fn dismiss_notification(&self, id: &str) {
        let mut service = self.notification_service();
        service.dismiss(id);
        service.cleanup();
    }

    /// Creates an account with its system folders and returns its session.
    pub async fn provision_user(&self, email: &str, full_name: Option<&str>) -> Result<Session> {
        let user = self
            .store
            .provision_user(email, full_name)
            .await
            .with_context(|| format!("provisioning {email}"))?;
        Ok(Session::from(&user))
    }

    /// The session of an existing account.
    pub async fn session_for(&self, email: &str) -> Result<Option<Session>> {
        let user = self.store.find_user_by_email(email).await?;
        Ok(user.as_ref().map(Session::from))
    }

    /// Loads folders, then the selected folder's emails and the unread
    /// badges.
    pub async fn load_mailbox(&self, session: &Session, state: &mut MailboxState) -> Result<()> {
        state.set_folders(self.mail.list_folders(Some(session)).await?);
        self.reload_emails(session, state).await
    }

    async fn reload_emails(&self, session: &Session, state: &mut MailboxState) -> Result<()> {
        let emails = match state.selected_folder() {
            Some(folder) => self.mail.list_emails(Some(session), Some(folder)).await?,
            None => Vec::new(),
        };
        state.set_emails(emails);
        state.set_all_emails(self.mail.list_emails(Some(session), None).await?);
        Ok(())
    }

    /// Opens an email, marking it read when needed.
    pub async fn open_email(
        &self,
        session: &Session,
        state: &mut MailboxState,
        email: &Email,
    ) -> Result<()> {
        if state.select_email(&email.id) {
            self.mail.mark_as_read(Some(session), &email.id, true).await?;
            self.reload_emails(session, state).await?;
        }
        Ok(())
    }

    /// Sends the open compose form into the sender's Sent folder and closes
    /// it on success. A reopened draft is removed once its message is sent.
    pub async fn send_compose(
        &self,
        session: &Session,
        state: &mut MailboxState,
    ) -> Result<Option<SendReport>> {
        let Some(composer) = state.composer().filter(|c| c.can_send()) else {
            return Ok(None);
        };
        let sent = state
            .folder(SystemFolder::Sent)
            .map(|f| f.id.clone())
            .context("Sent folder is missing")?;

        let draft_id = composer.draft_id().cloned();
        let report = self
            .mail
            .send(Some(session), composer.to_payload(), Some(&sent))
            .await?;
        state.discard_compose();

        if let Some(draft_id) = draft_id {
            if let Err(err) = self.mail.delete_email(Some(session), &draft_id).await {
                tracing::warn!(%draft_id, error = %err, "sent draft could not be removed");
            }
        }
        self.reload_emails(session, state).await?;
        Ok(Some(report))
    }

    /// Closes the compose form, saving it to Drafts if it has content.
    pub async fn close_compose(
        &self,
        session: &Session,
        state: &mut MailboxState,
    ) -> Result<Option<Email>> {
        let drafts = state.folder(SystemFolder::Drafts).map(|f| f.id.clone());
        let Some(payload) = state.close_compose() else {
            return Ok(None);
        };
        let Some(drafts) = drafts else {
            tracing::warn!("no Drafts folder; discarding compose form");
            return Ok(None);
        };

        let draft = self
            .mail
            .save_draft(Some(session), payload, Some(&drafts))
            .await?;
        self.reload_emails(session, state).await?;
        Ok(Some(draft))
    }

    /// Moves the open email to Trash.
    pub async fn trash_selected(&self, session: &Session, state: &mut MailboxState) -> Result<bool> {
        let (Some(email), Some(trash)) = (
            state.selected_email().map(|e| e.id.clone()),
            state.folder(SystemFolder::Trash).map(|f| f.id.clone()),
        ) else {
            return Ok(false);
        };

        self.mail.move_to_trash(Some(session), &email, &trash).await?;
        state.close_email();
        self.reload_emails(session, state).await?;
        Ok(true)
    }

    /// Invalidates cached views and reloads the mailbox.
    pub async fn refresh(&self, session: &Session, state: &mut MailboxState) -> Result<()> {
        self.mail.refresh();
        self.load_mailbox(session, state).await
    }
}

impl std::fmt::Debug for App {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("App")
            .field("settings", &self.settings)
            .field("events", &self.events)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::RecipientField;

    async fn app() -> App {
        App::in_memory(Settings::default()).await.unwrap()
    }

    #[tokio::test]
    async fn compose_send_and_receive() {
        let app = app().await;
        let ann = app.provision_user("ann@x.com", Some("Ann")).await.unwrap();
        let bob = app.provision_user("bob@x.com", None).await.unwrap();

        let mut ann_view = MailboxState::new();
        app.load_mailbox(&ann, &mut ann_view).await.unwrap();
        ann_view.open_compose();
        let composer = ann_view.composer_mut().unwrap();
        composer.add_recipient(RecipientField::To, "bob@x.com").unwrap();
        composer.subject = "Hi".into();

        let report = app.send_compose(&ann, &mut ann_view).await.unwrap().unwrap();
        assert_eq!(report.delivered, vec!["bob@x.com".to_string()]);
        assert!(ann_view.composer().is_none());

        let mut bob_view = MailboxState::new();
        app.load_mailbox(&bob, &mut bob_view).await.unwrap();
        let received = bob_view.visible_emails()[0].clone();
        assert_eq!(received.subject, "Hi");
        assert_eq!(received.from_name.as_deref(), Some("Ann"));
        let inbox = bob_view.selected_folder().cloned().unwrap();
        assert_eq!(bob_view.unread_count(&inbox), 1);

        app.open_email(&bob, &mut bob_view, &received).await.unwrap();
        assert_eq!(bob_view.unread_count(&inbox), 0);

        let titles: Vec<String> = app
            .notifications()
            .iter()
            .map(|n| n.request.title.clone())
            .collect();
        assert_eq!(titles, vec!["Email sent successfully!".to_string()]);
    }

    #[tokio::test]
    async fn notifications_can_be_held_across_mutations() {
        let app = app().await;
        let ann = app.provision_user("ann@x.com", None).await.unwrap();
        let mut view = MailboxState::new();
        app.load_mailbox(&ann, &mut view).await.unwrap();

        let before = app.notifications();
        app.mail()
            .create_folder(Some(&ann), "Receipts", None)
            .await
            .unwrap();
        assert!(before.is_empty());

        let after = app.notifications();
        assert_eq!(after.len(), 1);
        app.dismiss_notification(&after[0].request.id);
        assert!(app.notifications().is_empty());
    }

    #[tokio::test]
    async fn reopened_draft_is_updated_then_consumed_by_send() {
        let app = app().await;
        let ann = app.provision_user("ann@x.com", None).await.unwrap();
        app.provision_user("bob@x.com", None).await.unwrap();
        let mut view = MailboxState::new();
        app.load_mailbox(&ann, &mut view).await.unwrap();

        view.open_compose();
        view.composer_mut().unwrap().subject = "Plan".into();
        let draft = app.close_compose(&ann, &mut view).await.unwrap().unwrap();

        let drafts = view.folder(SystemFolder::Drafts).unwrap().id.clone();
        view.select_folder(drafts.clone());
        app.load_mailbox(&ann, &mut view).await.unwrap();
        assert!(view.open_draft(&draft.id));
        let composer = view.composer_mut().unwrap();
        composer.subject = "Plan v2".into();
        composer.add_recipient(RecipientField::To, "bob@x.com").unwrap();
        let updated = app.close_compose(&ann, &mut view).await.unwrap().unwrap();

        assert_eq!(updated.id, draft.id);
        let stored = app.mail().list_emails(Some(&ann), Some(&drafts)).await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].subject, "Plan v2");

        assert!(view.open_draft(&draft.id));
        app.send_compose(&ann, &mut view).await.unwrap().unwrap();
        assert!(app
            .mail()
            .list_emails(Some(&ann), Some(&drafts))
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn closing_compose_saves_a_draft() {
        let app = app().await;
        let ann = app.provision_user("ann@x.com", None).await.unwrap();
        let mut view = MailboxState::new();
        app.load_mailbox(&ann, &mut view).await.unwrap();

        view.open_compose();
        view.composer_mut().unwrap().body = "half a thought".into();
        let draft = app.close_compose(&ann, &mut view).await.unwrap().unwrap();

        let drafts = view.folder(SystemFolder::Drafts).unwrap().id.clone();
        assert_eq!(draft.folder_id, Some(drafts));
        assert!(draft.is_draft());
    }

    #[tokio::test]
    async fn trash_selected_moves_the_open_email() {
        let app = app().await;
        let ann = app.provision_user("ann@x.com", None).await.unwrap();
        let bob = app.provision_user("bob@x.com", None).await.unwrap();
        app.mail()
            .send(
                Some(&ann),
                crate::services::ComposePayload {
                    to: vec!["bob@x.com".into()],
                    ..Default::default()
                },
                None,
            )
            .await
            .unwrap();

        let mut view = MailboxState::new();
        app.load_mailbox(&bob, &mut view).await.unwrap();
        let email = view.visible_emails()[0].clone();
        app.open_email(&bob, &mut view, &email).await.unwrap();

        assert!(app.trash_selected(&bob, &mut view).await.unwrap());
        assert!(view.visible_emails().is_empty());

        let trash = view.folder(SystemFolder::Trash).unwrap().id.clone();
        view.select_folder(trash);
        app.refresh(&bob, &mut view).await.unwrap();
        assert_eq!(view.visible_emails().len(), 1);
    }

    #[tokio::test]
    async fn session_lookup() {
        let app = app().await;
        let ann = app.provision_user("ann@x.com", None).await.unwrap();

        assert_eq!(app.session_for("ANN@x.com").await.unwrap(), Some(ann));
        assert_eq!(app.session_for("nobody@x.com").await.unwrap(), None);
    }
}
