//! Compose form state.
//!
//! Holds the recipient chips, subject and body of the message being written
//! and turns them into a [`ComposePayload`] or [`DraftPayload`].

use thiserror::Error;

use super::mail_service::{ComposePayload, DraftPayload};
use crate::domain::address::is_valid_email;
use crate::domain::{Email, EmailId};

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ComposeError {
    #[error("Please enter a valid email address: {0}")]
    InvalidAddress(String),
}

/// Which recipient list an address goes into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecipientField {
    To,
    Cc,
    Bcc,
}

/// Result of adding a recipient.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddOutcome {
    Added,
    /// The field already holds that exact address.
    AlreadyPresent,
    /// Nothing but whitespace was entered.
    Empty,
}

/// Whether the form is writing a new message or a reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ComposerMode {
    #[default]
    New,
    Reply,
}

/// Compose form.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Composer {
    mode: ComposerMode,
    draft_id: Option<EmailId>,
    to: Vec<String>,
    cc: Vec<String>,
    bcc: Vec<String>,
    pub subject: String,
    pub body: String,
}

impl Composer {
    pub fn new() -> Self {
        Self::default()
    }

    /// A form prefilled to answer `original`.
    pub fn reply_to(original: &Email) -> Self {
        let quoted_on = original.display_date().format("%-m/%-d/%Y");
        Self {
            mode: ComposerMode::Reply,
            to: vec![original.from_email.clone()],
            subject: format!("Re: {}", original.subject),
            body: format!(
                "\n\n---\nOn {quoted_on}, {} wrote:\n\n{}",
                original.sender_display(),
                original.body
            ),
            ..Self::default()
        }
    }

    /// Reopens a stored draft. Saving the form again updates that draft.
    pub fn from_draft(draft: &Email) -> Self {
        Self {
            draft_id: Some(draft.id.clone()),
            to: draft.to.clone(),
            cc: draft.cc.clone(),
            bcc: draft.bcc.clone(),
            subject: draft.subject.clone(),
            body: draft.body.clone(),
            ..Self::default()
        }
    }

    pub fn mode(&self) -> ComposerMode {
        self.mode
    }

    /// Header title: the subject once typed.
    pub fn title(&self) -> &str {
        if self.subject.is_empty() {
            "New Message"
        } else {
            &self.subject
        }
    }

    pub fn recipients(&self, field: RecipientField) -> &[String] {
        match field {
            RecipientField::To => &self.to,
            RecipientField::Cc => &self.cc,
            RecipientField::Bcc => &self.bcc,
        }
    }

    fn field_mut(&mut self, field: RecipientField) -> &mut Vec<String> {
        match field {
            RecipientField::To => &mut self.to,
            RecipientField::Cc => &mut self.cc,
            RecipientField::Bcc => &mut self.bcc,
        }
    }

    /// Adds a trimmed address to `field`.
    pub fn add_recipient(
        &mut self,
        field: RecipientField,
        address: &str,
    ) -> Result<AddOutcome, ComposeError> {
        let address = address.trim();
        if address.is_empty() {
            return Ok(AddOutcome::Empty);
        }
        if !is_valid_email(address) {
            return Err(ComposeError::InvalidAddress(address.to_string()));
        }

        let list = self.field_mut(field);
        if list.iter().any(|existing| existing == address) {
            return Ok(AddOutcome::AlreadyPresent);
        }
        list.push(address.to_string());
        Ok(AddOutcome::Added)
    }

    /// Removes every occurrence of `address` from `field`.
    pub fn remove_recipient(&mut self, field: RecipientField, address: &str) -> bool {
        let list = self.field_mut(field);
        let before = list.len();
        list.retain(|existing| existing != address);
        list.len() < before
    }

    /// A message needs at least one primary recipient.
    pub fn can_send(&self) -> bool {
        !self.to.is_empty()
    }

    /// Whether closing the form should keep a draft.
    pub fn has_content(&self) -> bool {
        !self.to.is_empty() || !self.subject.is_empty() || !self.body.is_empty()
    }

    pub fn draft_id(&self) -> Option<&EmailId> {
        self.draft_id.as_ref()
    }

    pub fn to_payload(&self) -> ComposePayload {
        ComposePayload {
            to: self.to.clone(),
            cc: self.cc.clone(),
            bcc: self.bcc.clone(),
            subject: self.subject.clone(),
            body: self.body.clone(),
        }
    }

    pub fn to_draft(&self) -> DraftPayload {
        DraftPayload {
            id: self.draft_id.clone(),
            to: self.to.clone(),
            cc: self.cc.clone(),
            bcc: self.bcc.clone(),
            subject: self.subject.clone(),
            body: self.body.clone(),
        }
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
