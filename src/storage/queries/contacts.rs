//! Contact database queries.

use rusqlite::{params, Connection, Result, Row};

use super::{from_sql_time, to_sql_time};
use crate::domain::{Contact, ContactId, UserId};

/// Inserts a contact. Addresses are not deduplicated.
pub fn insert(conn: &Connection, contact: &Contact) -> Result<()> {
    conn.execute(
        "INSERT INTO contacts (id, user_id, email, full_name, avatar_url, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            contact.id.0,
            contact.user_id.0,
            contact.email,
            contact.full_name,
            contact.avatar_url,
            to_sql_time(&contact.created_at),
            to_sql_time(&contact.updated_at),
        ],
    )?;
    Ok(())
}

/// Lists the owner's contacts ordered by display name, unnamed last.
pub fn list_by_owner(conn: &Connection, owner: &UserId) -> Result<Vec<Contact>> {
    let mut stmt = conn.prepare(
        "SELECT id, user_id, email, full_name, avatar_url, created_at, updated_at
         FROM contacts WHERE user_id = ?1
         ORDER BY full_name IS NULL, full_name COLLATE NOCASE, email",
    )?;

    let contacts = stmt.query_map(params![owner.0], row_to_contact)?;
    contacts.collect()
}

/// Deletes one of the owner's contacts. Returns `false` if not found.
pub fn delete(conn: &Connection, owner: &UserId, id: &ContactId) -> Result<bool> {
    let changed = conn.execute(
        "DELETE FROM contacts WHERE id = ?1 AND user_id = ?2",
        params![id.0, owner.0],
    )?;
    Ok(changed > 0)
}

fn row_to_contact(row: &Row<'_>) -> Result<Contact> {
    let created_at: String = row.get(5)?;
    let updated_at: String = row.get(6)?;
    Ok(Contact {
        id: ContactId(row.get(0)?),
        user_id: UserId(row.get(1)?),
        email: row.get(2)?,
        full_name: row.get(3)?,
        avatar_url: row.get(4)?,
        created_at: from_sql_time(5, &created_at)?,
        updated_at: from_sql_time(6, &updated_at)?,
    })
}
