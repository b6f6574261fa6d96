//! Email CRUD operations.
//!
//! Every lookup and mutation is scoped to the owning user.

use chrono::Utc;
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};

use super::{from_sql_time, from_sql_time_opt, to_sql_time};
use crate::domain::{Email, EmailId, EmailStatus, FolderId, UserId};
use crate::storage::database::{Database, DatabaseError, Result};

const COLUMNS: &str = "id, user_id, folder_id, from_email, from_name, \
     to_emails, cc_emails, bcc_emails, subject, body, status, \
     is_read, is_starred, sent_at, received_at, created_at, updated_at";

/// Inserts an email using an existing connection or transaction.
pub(crate) fn insert_row(conn: &Connection, email: &Email) -> Result<()> {
    conn.execute(
        &format!(
            "INSERT INTO emails ({COLUMNS}) VALUES \
             (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)"
        ),
        params![
            email.id.0,
            email.user_id.0,
            email.folder_id.as_ref().map(|f| &f.0),
            email.from_email,
            email.from_name,
            to_json(&email.to)?,
            to_json(&email.cc)?,
            to_json(&email.bcc)?,
            email.subject,
            email.body,
            email.status.as_str(),
            email.is_read,
            email.is_starred,
            email.sent_at.as_ref().map(to_sql_time),
            email.received_at.as_ref().map(to_sql_time),
            to_sql_time(&email.created_at),
            to_sql_time(&email.updated_at),
        ],
    )?;
    Ok(())
}

/// Inserts a new email.
pub async fn insert(db: &Database, email: &Email) -> Result<()> {
    let email = email.clone();
    db.with_conn(move |conn| insert_row(conn, &email)).await
}

/// Retrieves one of the owner's emails by id.
pub async fn get_by_id(db: &Database, owner: &UserId, id: &EmailId) -> Result<Option<Email>> {
    let (owner, id) = (owner.clone(), id.clone());

    db.with_conn(move |conn| {
        let email = conn
            .query_row(
                &format!("SELECT {COLUMNS} FROM emails WHERE id = ?1 AND user_id = ?2"),
                params![id.0, owner.0],
                row_to_email,
            )
            .optional()?;
        Ok(email)
    })
    .await
}

/// Lists the owner's emails, newest first, optionally restricted to a folder.
pub async fn list(db: &Database, owner: &UserId, folder: Option<&FolderId>) -> Result<Vec<Email>> {
    let owner = owner.clone();
    let folder = folder.cloned();

    db.with_conn(move |conn| {
        let mut stmt = conn.prepare(&format!(
            "SELECT {COLUMNS} FROM emails
             WHERE user_id = ?1 AND (?2 IS NULL OR folder_id = ?2)
             ORDER BY created_at DESC, rowid DESC"
        ))?;

        let rows = stmt.query_map(params![owner.0, folder.map(|f| f.0)], row_to_email)?;
        let emails: std::result::Result<Vec<_>, _> = rows.collect();
        Ok(emails?)
    })
    .await
}

/// Rewrites the editable fields of an existing draft.
///
/// Identity, status and `created_at` are untouched. Returns `false` when no
/// draft with that id exists for the owner.
pub async fn update_draft(db: &Database, draft: &Email) -> Result<bool> {
    let draft = draft.clone();

    db.with_conn(move |conn| {
        let changed = conn.execute(
            "UPDATE emails SET
                folder_id = ?1, from_email = ?2, from_name = ?3,
                to_emails = ?4, cc_emails = ?5, bcc_emails = ?6,
                subject = ?7, body = ?8, updated_at = ?9
             WHERE id = ?10 AND user_id = ?11 AND status = 'draft'",
            params![
                draft.folder_id.as_ref().map(|f| &f.0),
                draft.from_email,
                draft.from_name,
                to_json(&draft.to)?,
                to_json(&draft.cc)?,
                to_json(&draft.bcc)?,
                draft.subject,
                draft.body,
                to_sql_time(&draft.updated_at),
                draft.id.0,
                draft.user_id.0,
            ],
        )?;
        Ok(changed > 0)
    })
    .await
}

/// Sets the read flag. Returns `false` if the email was not found.
pub async fn set_read(db: &Database, owner: &UserId, id: &EmailId, is_read: bool) -> Result<bool> {
    update_column(db, owner, id, "is_read", is_read).await
}

/// Sets the starred flag. Returns `false` if the email was not found.
pub async fn set_starred(
    db: &Database,
    owner: &UserId,
    id: &EmailId,
    is_starred: bool,
) -> Result<bool> {
    update_column(db, owner, id, "is_starred", is_starred).await
}

/// Moves an email to another of the owner's folders.
pub async fn set_folder(
    db: &Database,
    owner: &UserId,
    id: &EmailId,
    folder: &FolderId,
) -> Result<bool> {
    let (owner, id, folder) = (owner.clone(), id.clone(), folder.clone());

    db.with_conn(move |conn| {
        // The subquery keeps the folder reference within the owner's folders.
        let changed = conn.execute(
            "UPDATE emails SET folder_id = ?1, updated_at = ?2
             WHERE id = ?3 AND user_id = ?4
               AND EXISTS (SELECT 1 FROM folders WHERE id = ?1 AND user_id = ?4)",
            params![folder.0, to_sql_time(&Utc::now()), id.0, owner.0],
        )?;
        Ok(changed > 0)
    })
    .await
}

/// Permanently deletes an email. Returns `false` if it was not found.
pub async fn delete(db: &Database, owner: &UserId, id: &EmailId) -> Result<bool> {
    let (owner, id) = (owner.clone(), id.clone());

    db.with_conn(move |conn| {
        let changed = conn.execute(
            "DELETE FROM emails WHERE id = ?1 AND user_id = ?2",
            params![id.0, owner.0],
        )?;
        Ok(changed > 0)
    })
    .await
}

async fn update_column(
    db: &Database,
    owner: &UserId,
    id: &EmailId,
    column: &'static str,
    value: bool,
) -> Result<bool> {
    let (owner, id) = (owner.clone(), id.clone());

    db.with_conn(move |conn| {
        let changed = conn.execute(
            &format!("UPDATE emails SET {column} = ?1, updated_at = ?2 WHERE id = ?3 AND user_id = ?4"),
            params![value, to_sql_time(&Utc::now()), id.0, owner.0],
        )?;
        Ok(changed > 0)
    })
    .await
}

fn to_json(addresses: &[String]) -> Result<String> {
    serde_json::to_string(addresses).map_err(|e| DatabaseError::Corrupt(e.to_string()))
}

fn json_list(row: &Row<'_>, idx: usize) -> rusqlite::Result<Vec<String>> {
    let raw: String = row.get(idx)?;
    serde_json::from_str(&raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn row_to_email(row: &Row<'_>) -> rusqlite::Result<Email> {
    let status: String = row.get(10)?;
    let status = status.parse::<EmailStatus>().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(10, Type::Text, e.into())
    })?;
    let created_at: String = row.get(15)?;
    let updated_at: String = row.get(16)?;

    Ok(Email {
        id: EmailId(row.get(0)?),
        user_id: UserId(row.get(1)?),
        folder_id: row.get::<_, Option<String>>(2)?.map(FolderId),
        from_email: row.get(3)?,
        from_name: row.get(4)?,
        to: json_list(row, 5)?,
        cc: json_list(row, 6)?,
        bcc: json_list(row, 7)?,
        subject: row.get(8)?,
        body: row.get(9)?,
        status,
        is_read: row.get(11)?,
        is_starred: row.get(12)?,
        sent_at: from_sql_time_opt(13, row.get(13)?)?,
        received_at: from_sql_time_opt(14, row.get(14)?)?,
        created_at: from_sql_time(15, &created_at)?,
        updated_at: from_sql_time(16, &updated_at)?,
    })
}
