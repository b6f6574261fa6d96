//! Notification service for in-app toasts.
//!
//! Turns [`AppEvent`]s into short user-facing messages and keeps the
//! visible queue bounded.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use crate::app::events::{AppEvent, EventBus, Operation, SubscriberId};

/// Severity of a toast.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToastKind {
    Success,
    Info,
    Warning,
    Error,
}

/// A notification request.
#[derive(Debug, Clone)]
pub struct NotificationRequest {
    /// Unique identifier.
    pub id: String,
    pub kind: ToastKind,
    pub title: String,
    pub body: Option<String>,
    /// Auto-dismiss after this duration. `None` stays until dismissed.
    pub auto_dismiss: Option<Duration>,
}

impl NotificationRequest {
    /// Creates a new notification request.
    pub fn new(kind: ToastKind, title: impl Into<String>) -> Self {
        Self {
            id: format!("notif-{}", uuid::Uuid::new_v4()),
            kind,
            title: title.into(),
            body: None,
            auto_dismiss: Some(Duration::from_secs(4)),
        }
    }

    /// Sets the body text.
    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Sets auto-dismiss duration.
    pub fn dismiss_after(mut self, duration: Duration) -> Self {
        self.auto_dismiss = Some(duration);
        self
    }

    /// Disables auto-dismiss.
    pub fn persistent(mut self) -> Self {
        self.auto_dismiss = None;
        self
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self::new(ToastKind::Success, message)
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self::new(ToastKind::Info, message)
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self::new(ToastKind::Warning, message).dismiss_after(Duration::from_secs(8))
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(ToastKind::Error, message).dismiss_after(Duration::from_secs(8))
    }

    /// The toast for an event, if the event is user-visible.
    ///
    /// Read and star changes are silent; so are cache invalidations.
    pub fn for_event(event: &AppEvent) -> Option<Self> {
        let request = match event {
            AppEvent::EmailSent { .. } => Self::success("Email sent successfully!"),
            AppEvent::DeliverySkipped { recipient } => Self::warning(format!(
                "Delivery skipped for {recipient} (not an in-app user)"
            )),
            AppEvent::DraftSaved { .. } => Self::success("Draft saved"),
            AppEvent::EmailTrashed { .. } => Self::success("Email moved to trash"),
            AppEvent::EmailDeleted { .. } => Self::success("Email deleted permanently"),
            AppEvent::FolderCreated { name, .. } => {
                Self::success(format!("Folder \"{name}\" created"))
            }
            AppEvent::FolderDeleted { .. } => Self::success("Folder deleted"),
            AppEvent::ContactAdded { .. } => Self::success("Contact added"),
            AppEvent::ContactDeleted { .. } => Self::success("Contact deleted"),
            AppEvent::OperationFailed {
                operation,
                message,
                partial,
            } => {
                let request = Self::error(failure_title(*operation, message));
                if *partial {
                    // Some writes happened; keep it up until the user has seen it.
                    request
                        .body("The message was saved to Sent. Later recipients were not delivered.")
                        .persistent()
                } else {
                    request
                }
            }
            AppEvent::EmailReadChanged { .. }
            | AppEvent::EmailStarred { .. }
            | AppEvent::ViewsInvalidated(_) => return None,
        };
        Some(request)
    }
}

fn failure_title(operation: Operation, message: &str) -> String {
    match operation {
        Operation::SendEmail => format!("Failed to send email: {message}"),
        Operation::SaveDraft => format!("Failed to save draft: {message}"),
        Operation::AddContact => format!("Failed to add contact: {message}"),
        other => format!("Failed to {other}: {message}"),
    }
}

/// A shown notification with tracking info.
#[derive(Debug, Clone)]
pub struct SentNotification {
    pub request: NotificationRequest,
    pub sent_at: Instant,
    pub dismissed: bool,
}

impl SentNotification {
    pub fn new(request: NotificationRequest) -> Self {
        Self {
            request,
            sent_at: Instant::now(),
            dismissed: false,
        }
    }

    /// Returns whether this notification should auto-dismiss.
    pub fn should_auto_dismiss(&self) -> bool {
        if self.dismissed {
            return false;
        }
        self.request
            .auto_dismiss
            .is_some_and(|duration| self.sent_at.elapsed() >= duration)
    }
}

/// Settings for notification behavior.
#[derive(Debug, Clone)]
pub struct NotificationSettings {
    /// Toasts are dropped when disabled.
    pub enabled: bool,
    /// Maximum notifications to keep at once; oldest are dropped first.
    pub max_visible: usize,
    /// Overrides the default dismiss delay of success and info toasts.
    pub success_dismiss: Option<Duration>,
    /// Overrides the default dismiss delay of warning and error toasts.
    pub error_dismiss: Option<Duration>,
}

impl Default for NotificationSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            max_visible: 5,
            success_dismiss: None,
            error_dismiss: None,
        }
    }
}

/// Service for managing notifications.
#[derive(Debug)]
pub struct NotificationService {
    settings: NotificationSettings,
    sent: VecDeque<SentNotification>,
}

impl NotificationService {
    /// Creates a new notification service.
    pub fn new(settings: NotificationSettings) -> Self {
        Self {
            settings,
            sent: VecDeque::new(),
        }
    }

    /// Subscribes a shared service to `events`.
    pub fn attach(service: Arc<Mutex<Self>>, events: &EventBus) -> SubscriberId {
        events.subscribe(move |event| {
            service
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .handle_event(event);
        })
    }

    pub fn settings(&self) -> &NotificationSettings {
        &self.settings
    }

    /// Queues the toast for `event`, if any.
    pub fn handle_event(&mut self, event: &AppEvent) {
        if let Some(request) = NotificationRequest::for_event(event) {
            self.notify(request);
        }
    }

    /// Queues a notification.
    pub fn notify(&mut self, mut request: NotificationRequest) {
        if !self.settings.enabled {
            return;
        }

        let dismiss_override = match request.kind {
            ToastKind::Success | ToastKind::Info => self.settings.success_dismiss,
            ToastKind::Warning | ToastKind::Error => self.settings.error_dismiss,
        };
        if let (Some(delay), Some(_)) = (dismiss_override, request.auto_dismiss) {
            request.auto_dismiss = Some(delay);
        }

        tracing::debug!(kind = ?request.kind, title = %request.title, "toast");
        self.sent.push_back(SentNotification::new(request));
        while self.sent.len() > self.settings.max_visible {
            self.sent.pop_front();
        }
    }

    /// Dismisses a notification by ID.
    pub fn dismiss(&mut self, id: &str) {
        if let Some(notif) = self.sent.iter_mut().find(|n| n.request.id == id) {
            notif.dismissed = true;
        }
    }

    /// Dismisses all notifications.
    pub fn dismiss_all(&mut self) {
        for notif in self.sent.iter_mut() {
            notif.dismissed = true;
        }
    }

    /// Cleans up dismissed and expired notifications.
    pub fn cleanup(&mut self) {
        self.sent
            .retain(|n| !n.dismissed && !n.should_auto_dismiss());
    }

    /// Returns all active notifications, oldest first.
    pub fn active_notifications(&self) -> Vec<&SentNotification> {
        self.sent
            .iter()
            .filter(|n| !n.dismissed && !n.should_auto_dismiss())
            .collect()
    }

    pub fn active_count(&self) -> usize {
        self.active_notifications().len()
    }
}

impl Default for NotificationService {
    fn default() -> Self {
        Self::new(NotificationSettings::default())
    }
}
