//! SQLite-backed implementation of the service storage traits.

use crate::domain::{
    Contact, ContactId, Email, EmailId, Folder, FolderId, SystemFolder, User, UserId,
};
use crate::services::{ContactStorage, MailStore, StoreError};

use super::database::{Database, DatabaseError};
use super::queries::{contacts, emails, folders, users};

impl From<DatabaseError> for StoreError {
    fn from(err: DatabaseError) -> Self {
        if err.is_constraint_violation() {
            StoreError::Constraint(err.to_string())
        } else {
            StoreError::Database(err.to_string())
        }
    }
}

type StoreResult<T> = std::result::Result<T, StoreError>;

/// Mailbox, contact and user-directory storage over one [`Database`].
#[derive(Debug, Clone)]
pub struct SqliteStore {
    db: Database,
}

impl SqliteStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub fn db(&self) -> &Database {
        &self.db
    }

    /// Creates a user profile together with its system folders.
    ///
    /// Fails with [`StoreError::Constraint`] if the address is taken.
    pub async fn provision_user(
        &self,
        email: &str,
        full_name: Option<&str>,
    ) -> StoreResult<User> {
        let now = crate::domain::now();
        let user = User {
            id: UserId::generate(),
            email: email.trim().to_string(),
            full_name: full_name.map(str::to_string),
            avatar_url: None,
            created_at: now,
            updated_at: now,
        };

        let created = user.clone();
        self.db
            .transaction(move |tx| {
                users::insert(tx, &created)?;
                for system in SystemFolder::ALL {
                    let folder = Folder {
                        id: FolderId::generate(),
                        user_id: created.id.clone(),
                        name: system.name().to_string(),
                        icon: system.icon().to_string(),
                        is_system: true,
                        created_at: now,
                    };
                    folders::insert(tx, &folder)?;
                }
                Ok(())
            })
            .await?;

        tracing::info!(user_id = %user.id, "user provisioned");
        Ok(user)
    }

    pub async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let email = email.to_string();
        Ok(self
            .db
            .with_conn(move |conn| Ok(users::find_by_email(conn, &email)?))
            .await?)
    }
}

#[async_trait::async_trait]
impl MailStore for SqliteStore {
    async fn insert_email(&self, email: &Email) -> StoreResult<()> {
        Ok(emails::insert(&self.db, email).await?)
    }

    async fn update_draft(&self, draft: &Email) -> StoreResult<bool> {
        Ok(emails::update_draft(&self.db, draft).await?)
    }

    async fn get_email(&self, owner: &UserId, id: &EmailId) -> StoreResult<Option<Email>> {
        Ok(emails::get_by_id(&self.db, owner, id).await?)
    }

    async fn list_emails(
        &self,
        owner: &UserId,
        folder: Option<&FolderId>,
    ) -> StoreResult<Vec<Email>> {
        Ok(emails::list(&self.db, owner, folder).await?)
    }

    async fn set_read(&self, owner: &UserId, id: &EmailId, is_read: bool) -> StoreResult<bool> {
        Ok(emails::set_read(&self.db, owner, id, is_read).await?)
    }

    async fn set_starred(
        &self,
        owner: &UserId,
        id: &EmailId,
        is_starred: bool,
    ) -> StoreResult<bool> {
        Ok(emails::set_starred(&self.db, owner, id, is_starred).await?)
    }

    async fn set_folder(
        &self,
        owner: &UserId,
        id: &EmailId,
        folder: &FolderId,
    ) -> StoreResult<bool> {
        Ok(emails::set_folder(&self.db, owner, id, folder).await?)
    }

    async fn delete_email(&self, owner: &UserId, id: &EmailId) -> StoreResult<bool> {
        Ok(emails::delete(&self.db, owner, id).await?)
    }

    async fn list_folders(&self, owner: &UserId) -> StoreResult<Vec<Folder>> {
        let owner = owner.clone();
        Ok(self
            .db
            .with_conn(move |conn| Ok(folders::list_by_owner(conn, &owner)?))
            .await?)
    }

    async fn get_folder(&self, owner: &UserId, id: &FolderId) -> StoreResult<Option<Folder>> {
        let (owner, id) = (owner.clone(), id.clone());
        Ok(self
            .db
            .with_conn(move |conn| Ok(folders::get_by_id(conn, &owner, &id)?))
            .await?)
    }

    async fn insert_folder(&self, folder: &Folder) -> StoreResult<()> {
        let folder = folder.clone();
        Ok(self
            .db
            .with_conn(move |conn| Ok(folders::insert(conn, &folder)?))
            .await?)
    }

    async fn delete_folder(&self, owner: &UserId, id: &FolderId) -> StoreResult<bool> {
        let (owner, id) = (owner.clone(), id.clone());
        Ok(self
            .db
            .with_conn(move |conn| Ok(folders::delete(conn, &owner, &id)?))
            .await?)
    }
}

#[async_trait::async_trait]
impl ContactStorage for SqliteStore {
    async fn insert_contact(&self, contact: &Contact) -> StoreResult<()> {
        let contact = contact.clone();
        Ok(self
            .db
            .with_conn(move |conn| Ok(contacts::insert(conn, &contact)?))
            .await?)
    }

    async fn delete_contact(&self, owner: &UserId, id: &ContactId) -> StoreResult<bool> {
        let (owner, id) = (owner.clone(), id.clone());
        Ok(self
            .db
            .with_conn(move |conn| Ok(contacts::delete(conn, &owner, &id)?))
            .await?)
    }

    async fn list_contacts(&self, owner: &UserId) -> StoreResult<Vec<Contact>> {
        let owner = owner.clone();
        Ok(self
            .db
            .with_conn(move |conn| Ok(contacts::list_by_owner(conn, &owner)?))
            .await?)
    }
}
