//! User profile queries.

use rusqlite::{params, Connection, OptionalExtension, Result, Row};

use super::{from_sql_time, to_sql_time};
use crate::domain::{User, UserId};

/// Inserts a user profile.
pub fn insert(conn: &Connection, user: &User) -> Result<()> {
    conn.execute(
        "INSERT INTO users (id, email, full_name, avatar_url, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            user.id.0,
            user.email,
            user.full_name,
            user.avatar_url,
            to_sql_time(&user.created_at),
            to_sql_time(&user.updated_at),
        ],
    )?;
    Ok(())
}

/// Gets a user by id.
pub fn get_by_id(conn: &Connection, id: &UserId) -> Result<Option<User>> {
    conn.query_row(
        "SELECT id, email, full_name, avatar_url, created_at, updated_at
         FROM users WHERE id = ?1",
        params![id.0],
        row_to_user,
    )
    .optional()
}

/// Finds a user by address, ignoring case and surrounding whitespace.
pub fn find_by_email(conn: &Connection, email: &str) -> Result<Option<User>> {
    conn.query_row(
        "SELECT id, email, full_name, avatar_url, created_at, updated_at
         FROM users WHERE email = ?1 COLLATE NOCASE",
        params![email.trim()],
        row_to_user,
    )
    .optional()
}

fn row_to_user(row: &Row<'_>) -> Result<User> {
    let created_at: String = row.get(4)?;
    let updated_at: String = row.get(5)?;
    Ok(User {
        id: UserId(row.get(0)?),
        email: row.get(1)?,
        full_name: row.get(2)?,
        avatar_url: row.get(3)?,
        created_at: from_sql_time(4, &created_at)?,
        updated_at: from_sql_time(5, &updated_at)?,
    })
}
