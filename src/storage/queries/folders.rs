//! Folder queries.

use rusqlite::{params, Connection, OptionalExtension, Result, Row};

use super::{from_sql_time, to_sql_time};
use crate::domain::{Folder, FolderId, UserId};

const COLUMNS: &str = "id, user_id, name, icon, is_system, created_at";

/// Inserts a folder. Fails with a constraint violation if the owner already
/// has a folder of that name.
pub fn insert(conn: &Connection, folder: &Folder) -> Result<()> {
    conn.execute(
        &format!("INSERT INTO folders ({COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6)"),
        params![
            folder.id.0,
            folder.user_id.0,
            folder.name,
            folder.icon,
            folder.is_system,
            to_sql_time(&folder.created_at),
        ],
    )?;
    Ok(())
}

/// Gets one of the owner's folders by id.
pub fn get_by_id(conn: &Connection, owner: &UserId, id: &FolderId) -> Result<Option<Folder>> {
    conn.query_row(
        &format!("SELECT {COLUMNS} FROM folders WHERE id = ?1 AND user_id = ?2"),
        params![id.0, owner.0],
        row_to_folder,
    )
    .optional()
}

/// Lists the owner's folders: system folders first, then by name.
pub fn list_by_owner(conn: &Connection, owner: &UserId) -> Result<Vec<Folder>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {COLUMNS} FROM folders WHERE user_id = ?1
         ORDER BY is_system DESC, name COLLATE NOCASE"
    ))?;

    let folders = stmt.query_map(params![owner.0], row_to_folder)?;
    folders.collect()
}

/// Finds the owner's system folder with the given name.
pub fn find_system(conn: &Connection, owner: &UserId, name: &str) -> Result<Option<Folder>> {
    conn.query_row(
        &format!(
            "SELECT {COLUMNS} FROM folders
             WHERE user_id = ?1 AND name = ?2 COLLATE NOCASE AND is_system = 1"
        ),
        params![owner.0, name],
        row_to_folder,
    )
    .optional()
}

/// Deletes a non-system folder. Returns `false` if nothing was deleted.
pub fn delete(conn: &Connection, owner: &UserId, id: &FolderId) -> Result<bool> {
    let changed = conn.execute(
        "DELETE FROM folders WHERE id = ?1 AND user_id = ?2 AND is_system = 0",
        params![id.0, owner.0],
    )?;
    Ok(changed > 0)
}

fn row_to_folder(row: &Row<'_>) -> Result<Folder> {
    let created_at: String = row.get(5)?;
    Ok(Folder {
        id: FolderId(row.get(0)?),
        user_id: UserId(row.get(1)?),
        name: row.get(2)?,
        icon: row.get(3)?,
        is_system: row.get(4)?,
        created_at: from_sql_time(5, &created_at)?,
    })
}
