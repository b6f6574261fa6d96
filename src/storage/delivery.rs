//! Local delivery into other users' inboxes.
//!
//! [`LocalDelivery`] is the only code path that writes a row owned by a user
//! other than the caller. Each call creates at most one `received` copy and
//! always appends one `delivery_log` row.

use rusqlite::params;

use crate::domain::{Email, EmailId, EmailStatus, SystemFolder};
use crate::services::{DeliveryRequest, RecipientResolver, ResolverError};

use super::database::{Database, DatabaseError};
use super::queries::{emails, folders, to_sql_time, users};

/// Outcome recorded in the delivery audit log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Delivered,
    NoAccount,
    NoInbox,
}

impl DeliveryOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryOutcome::Delivered => "delivered",
            DeliveryOutcome::NoAccount => "no_account",
            DeliveryOutcome::NoInbox => "no_inbox",
        }
    }
}

/// Delivers to users of the same database.
#[derive(Debug, Clone)]
pub struct LocalDelivery {
    db: Database,
}

impl LocalDelivery {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

impl From<DatabaseError> for ResolverError {
    fn from(err: DatabaseError) -> Self {
        ResolverError::Store(err.to_string())
    }
}

fn deliver_in(
    conn: &rusqlite::Connection,
    request: &DeliveryRequest,
) -> Result<(DeliveryOutcome, Option<EmailId>), DatabaseError> {
    let Some(user) = users::find_by_email(conn, &request.recipient)? else {
        return Ok((DeliveryOutcome::NoAccount, None));
    };
    let Some(inbox) = folders::find_system(conn, &user.id, SystemFolder::Inbox.name())? else {
        return Ok((DeliveryOutcome::NoInbox, None));
    };

    let now = crate::domain::now();
    let copy = Email {
        id: EmailId::generate(),
        user_id: user.id,
        folder_id: Some(inbox.id),
        from_email: request.from_email.clone(),
        from_name: Some(request.from_name.clone()),
        to: request.to.clone(),
        cc: request.cc.clone(),
        bcc: request.bcc.clone(),
        subject: request.subject.clone(),
        body: request.body.clone(),
        status: EmailStatus::Received,
        is_read: false,
        is_starred: false,
        sent_at: Some(request.sent_at),
        received_at: Some(now),
        created_at: now,
        updated_at: now,
    };
    emails::insert_row(conn, &copy)?;
    Ok((DeliveryOutcome::Delivered, Some(copy.id)))
}

#[async_trait::async_trait]
impl RecipientResolver for LocalDelivery {
    async fn deliver(&self, request: &DeliveryRequest) -> Result<bool, ResolverError> {
        let request = request.clone();

        let (outcome, recipient) = self
            .db
            .transaction(move |tx| {
                let (outcome, copy_id) = deliver_in(tx, &request)?;
                tx.execute(
                    "INSERT INTO delivery_log
                        (recipient_email, from_email, delivered_email_id, outcome, sent_at, logged_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                    params![
                        request.recipient,
                        request.from_email,
                        copy_id.as_ref().map(|id| &id.0),
                        outcome.as_str(),
                        to_sql_time(&request.sent_at),
                        to_sql_time(&crate::domain::now()),
                    ],
                )?;
                Ok((outcome, request.recipient))
            })
            .await?;

        tracing::debug!(%recipient, outcome = outcome.as_str(), "local delivery");
        Ok(outcome == DeliveryOutcome::Delivered)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::services::MailStore;
    use crate::storage::SqliteStore;

    fn request(recipient: &str) -> DeliveryRequest {
        DeliveryRequest {
            recipient: recipient.to_string(),
            from_email: "me@x.com".into(),
            from_name: "Me".into(),
            to: vec![recipient.to_string()],
            cc: vec![],
            bcc: vec![],
            subject: "Hi".into(),
            body: "...".into(),
            sent_at: crate::domain::now(),
        }
    }

    async fn outcomes(db: &Database) -> Vec<String> {
        db.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT outcome FROM delivery_log ORDER BY id")?;
            let rows = stmt.query_map([], |row| row.get(0))?;
            Ok(rows.collect::<rusqlite::Result<Vec<String>>>()?)
        })
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn delivers_unread_copy_into_inbox() {
        let db = Database::open_in_memory().await.unwrap();
        let store = SqliteStore::new(db.clone());
        let bob = store.provision_user("bob@x.com", None).await.unwrap();
        let delivery = LocalDelivery::new(db.clone());
        let req = request("BOB@x.com");

        assert!(delivery.deliver(&req).await.unwrap());

        let inbox = store
            .list_folders(&bob.id)
            .await
            .unwrap()
            .into_iter()
            .find(|f| f.name == "Inbox")
            .unwrap();
        let received = store.list_emails(&bob.id, Some(&inbox.id)).await.unwrap();
        assert_eq!(received.len(), 1);
        let copy = &received[0];
        assert_eq!(copy.status, EmailStatus::Received);
        assert!(!copy.is_read);
        assert_eq!(copy.sent_at, Some(req.sent_at));
        assert_eq!(copy.from_name.as_deref(), Some("Me"));
        assert!(copy.received_at.is_some());

        assert_eq!(outcomes(&db).await, vec!["delivered"]);
    }

    #[tokio::test]
    async fn unknown_recipient_is_not_deliverable() {
        let db = Database::open_in_memory().await.unwrap();
        let delivery = LocalDelivery::new(db.clone());

        assert!(!delivery.deliver(&request("ghost@x.com")).await.unwrap());
        assert_eq!(outcomes(&db).await, vec!["no_account"]);
    }

    #[tokio::test]
    async fn recipient_without_inbox_is_not_deliverable() {
        let db = Database::open_in_memory().await.unwrap();
        let store = SqliteStore::new(db.clone());
        let bob = store.provision_user("bob@x.com", None).await.unwrap();
        let bob_id = bob.id.clone();
        db.with_conn(move |conn| {
            conn.execute(
                "DELETE FROM folders WHERE user_id = ?1 AND name = 'Inbox'",
                params![bob_id.0],
            )?;
            Ok(())
        })
        .await
        .unwrap();

        let delivery = LocalDelivery::new(db.clone());
        assert!(!delivery.deliver(&request("bob@x.com")).await.unwrap());
        assert_eq!(outcomes(&db).await, vec!["no_inbox"]);
        assert!(store.list_emails(&bob.id, None).await.unwrap().is_empty());
    }
}
