//! User Storage
//! Credential records behind an async trait, with a SQLite implementation

use crate::auth::models::{NewUser, User, UserRole};
use crate::db::{self, SharedConnection, StoreError};
use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{params, OptionalExtension, Row};
use tracing::info;

/// Persistence contract consumed by the auth service.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;
    async fn find_by_id(&self, id: i64) -> Result<Option<User>, StoreError>;
    /// Fails with `StoreError::DuplicateKey` when the email is taken.
    async fn insert(&self, user: NewUser) -> Result<i64, StoreError>;
    /// Fails with `StoreError::NotFound` when no row has this id.
    async fn update_password(&self, id: i64, password_hash: &str) -> Result<(), StoreError>;
    async fn set_active(&self, id: i64, active: bool) -> Result<(), StoreError>;
    async fn list(&self) -> Result<Vec<User>, StoreError>;
    async fn count_admins(&self) -> Result<i64, StoreError>;
}

const USER_COLUMNS: &str =
    "id, email, password_hash, name, role, active, created_at, updated_at";

/// User storage with SQLite backend
#[derive(Clone)]
pub struct SqliteUserStore {
    conn: SharedConnection,
}

impl SqliteUserStore {
    /// Open the database at `db_path` and create the schema.
    pub fn new(db_path: &str) -> Result<Self> {
        let conn = db::open(db_path)?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS users (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                email TEXT UNIQUE NOT NULL,
                password_hash TEXT NOT NULL,
                name TEXT NOT NULL,
                role TEXT NOT NULL DEFAULT 'user',
                active INTEGER NOT NULL DEFAULT 1,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )",
            [],
        )?;
        conn.execute("CREATE INDEX IF NOT EXISTS idx_users_role ON users(role)", [])?;

        Ok(Self {
            conn: db::shared(conn),
        })
    }
}

struct UserRow {
    id: i64,
    email: String,
    password_hash: String,
    name: String,
    role: String,
    active: bool,
    created_at: String,
    updated_at: String,
}

impl UserRow {
    fn read(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            email: row.get(1)?,
            password_hash: row.get(2)?,
            name: row.get(3)?,
            role: row.get(4)?,
            active: row.get(5)?,
            created_at: row.get(6)?,
            updated_at: row.get(7)?,
        })
    }

    fn into_user(self) -> Result<User, StoreError> {
        let role = UserRole::parse(&self.role)
            .ok_or_else(|| StoreError::Corrupt(format!("unknown role {:?}", self.role)))?;
        Ok(User {
            id: self.id,
            email: self.email,
            password_hash: self.password_hash,
            name: self.name,
            role,
            active: self.active,
            created_at: db::parse_timestamp(&self.created_at)?,
            updated_at: db::parse_timestamp(&self.updated_at)?,
        })
    }
}

#[async_trait]
impl CredentialStore for SqliteUserStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let conn = self.conn.lock().await;
        let mut stmt =
            conn.prepare_cached(&format!("SELECT {USER_COLUMNS} FROM users WHERE email = ?1"))?;
        let row = stmt.query_row(params![email], UserRow::read).optional()?;
        row.map(UserRow::into_user).transpose()
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<User>, StoreError> {
        let conn = self.conn.lock().await;
        let mut stmt =
            conn.prepare_cached(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"))?;
        let row = stmt.query_row(params![id], UserRow::read).optional()?;
        row.map(UserRow::into_user).transpose()
    }

    async fn insert(&self, user: NewUser) -> Result<i64, StoreError> {
        let now = Utc::now().to_rfc3339();
        let conn = self.conn.lock().await;
        conn.execute(
            "INSERT INTO users (email, password_hash, name, role, active, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)",
            params![
                user.email,
                user.password_hash,
                user.name,
                user.role.as_str(),
                user.active,
                now,
            ],
        )
        .map_err(StoreError::from_write)?;

        let id = conn.last_insert_rowid();
        info!(user_id = id, role = user.role.as_str(), "✅ Created user");
        Ok(id)
    }

    async fn update_password(&self, id: i64, password_hash: &str) -> Result<(), StoreError> {
        let conn = self.conn.lock().await;
        let rows = conn.execute(
            "UPDATE users SET password_hash = ?1, updated_at = ?2 WHERE id = ?3",
            params![password_hash, Utc::now().to_rfc3339(), id],
        )?;
        if rows == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn set_active(&self, id: i64, active: bool) -> Result<(), StoreError> {
        let conn = self.conn.lock().await;
        let rows = conn.execute(
            "UPDATE users SET active = ?1, updated_at = ?2 WHERE id = ?3",
            params![active, Utc::now().to_rfc3339(), id],
        )?;
        if rows == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn list(&self) -> Result<Vec<User>, StoreError> {
        let conn = self.conn.lock().await;
        let mut stmt =
            conn.prepare_cached(&format!("SELECT {USER_COLUMNS} FROM users ORDER BY id ASC"))?;
        let rows = stmt
            .query_map([], UserRow::read)?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter().map(UserRow::into_user).collect()
    }

    async fn count_admins(&self) -> Result<i64, StoreError> {
        let conn = self.conn.lock().await;
        let count = conn.query_row(
            "SELECT COUNT(*) FROM users WHERE role = 'admin'",
            [],
            |row| row.get(0),
        )?;
        Ok(count)
    }
}
