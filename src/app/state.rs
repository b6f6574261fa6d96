//! Mailbox view state.
//!
//! What a renderer needs between reads: the loaded folders and emails, the
//! current selection, the search filter and the open compose form.

use std::collections::HashMap;

use crate::domain::{find_by_name, Email, EmailId, Folder, FolderId, SystemFolder};
use crate::services::{Composer, DraftPayload};

/// Selection, search and compose state of the mailbox screen.
#[derive(Debug, Clone, Default)]
pub struct MailboxState {
    folders: Vec<Folder>,
    /// Emails of the selected folder.
    emails: Vec<Email>,
    /// Every email of the user, for unread badges.
    all_emails: Vec<Email>,
    selected_folder: Option<FolderId>,
    selected_email: Option<EmailId>,
    search_query: String,
    composer: Option<Composer>,
}

impl MailboxState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the folder list. Selects the Inbox when nothing valid is
    /// selected.
    pub fn set_folders(&mut self, folders: Vec<Folder>) {
        self.folders = folders;

        let still_present = self
            .selected_folder
            .as_ref()
            .is_some_and(|id| self.folders.iter().any(|f| &f.id == id));
        if !still_present {
            self.selected_folder = self
                .folder(SystemFolder::Inbox)
                .map(|inbox| inbox.id.clone());
            self.selected_email = None;
        }
    }

    pub fn folders(&self) -> &[Folder] {
        &self.folders
    }

    /// The system folder of the given kind, looked up by name.
    pub fn folder(&self, system: SystemFolder) -> Option<&Folder> {
        find_by_name(&self.folders, system.name())
    }

    pub fn selected_folder(&self) -> Option<&FolderId> {
        self.selected_folder.as_ref()
    }

    pub fn current_folder(&self) -> Option<&Folder> {
        let id = self.selected_folder.as_ref()?;
        self.folders.iter().find(|f| &f.id == id)
    }

    /// Selects a folder and clears the open email.
    pub fn select_folder(&mut self, id: FolderId) {
        if self.selected_folder.as_ref() != Some(&id) {
            self.emails.clear();
        }
        self.selected_folder = Some(id);
        self.selected_email = None;
    }

    /// Replaces the emails of the selected folder.
    pub fn set_emails(&mut self, emails: Vec<Email>) {
        if let Some(id) = &self.selected_email {
            if !emails.iter().any(|e| &e.id == id) {
                self.selected_email = None;
            }
        }
        self.emails = emails;
    }

    pub fn set_all_emails(&mut self, emails: Vec<Email>) {
        self.all_emails = emails;
    }

    /// Opens an email. Returns `true` when it is unread and should be
    /// marked read.
    pub fn select_email(&mut self, id: &EmailId) -> bool {
        match self.emails.iter().find(|e| &e.id == id) {
            Some(email) => {
                self.selected_email = Some(email.id.clone());
                !email.is_read
            }
            None => false,
        }
    }

    pub fn close_email(&mut self) {
        self.selected_email = None;
    }

    pub fn selected_email(&self) -> Option<&Email> {
        let id = self.selected_email.as_ref()?;
        self.emails.iter().find(|e| &e.id == id)
    }

    pub fn set_search_query(&mut self, query: impl Into<String>) {
        self.search_query = query.into();
    }

    pub fn search_query(&self) -> &str {
        &self.search_query
    }

    /// Emails of the selected folder matching the search query.
    pub fn visible_emails(&self) -> Vec<&Email> {
        self.emails
            .iter()
            .filter(|e| e.matches_search(&self.search_query))
            .collect()
    }

    /// "1 email" / "N emails" for the list header.
    pub fn count_label(&self) -> String {
        match self.visible_emails().len() {
            1 => "1 email".to_string(),
            n => format!("{n} emails"),
        }
    }

    /// Unread emails per folder.
    pub fn unread_counts(&self) -> HashMap<FolderId, usize> {
        let mut counts = HashMap::new();
        for email in self.all_emails.iter().filter(|e| !e.is_read) {
            if let Some(folder) = &email.folder_id {
                *counts.entry(folder.clone()).or_insert(0) += 1;
            }
        }
        counts
    }

    pub fn unread_count(&self, folder: &FolderId) -> usize {
        self.all_emails
            .iter()
            .filter(|e| !e.is_read && e.folder_id.as_ref() == Some(folder))
            .count()
    }

    /// Opens an empty compose form.
    pub fn open_compose(&mut self) {
        self.composer = Some(Composer::new());
    }

    /// Opens a compose form answering the selected email.
    pub fn reply_to_selected(&mut self) -> bool {
        let Some(composer) = self.selected_email().map(Composer::reply_to) else {
            return false;
        };
        self.composer = Some(composer);
        true
    }

    /// Reopens a draft of the selected folder in the compose form.
    pub fn open_draft(&mut self, id: &EmailId) -> bool {
        let Some(composer) = self
            .emails
            .iter()
            .find(|e| &e.id == id && e.is_draft())
            .map(Composer::from_draft)
        else {
            return false;
        };
        self.composer = Some(composer);
        true
    }

    pub fn composer(&self) -> Option<&Composer> {
        self.composer.as_ref()
    }

    pub fn composer_mut(&mut self) -> Option<&mut Composer> {
        self.composer.as_mut()
    }

    /// Closes the compose form. Returns the draft to keep, if the form had
    /// any content.
    pub fn close_compose(&mut self) -> Option<DraftPayload> {
        let composer = self.composer.take()?;
        composer.has_content().then(|| composer.to_draft())
    }

    /// Closes the form after a successful send, discarding its content.
    pub fn discard_compose(&mut self) {
        self.composer = None;
    }
}
