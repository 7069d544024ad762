//! Owner accounts for registered nodes
//!
//! Accounts are only ever created together with their node, inside the
//! registration transaction in [`super::NodeRepo::register`].

use argon2::Argon2;
use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension};

use super::{DbPool, parse_datetime};
use crate::{Error, Result};

/// An account owning a node
#[derive(Debug, Clone)]
pub struct Account {
    pub id: i64,
    pub username: String,
    pub email: Option<String>,
    pub is_staff: bool,
    pub created_at: DateTime<Utc>,
}

/// Account repository
#[derive(Clone)]
pub struct AccountRepo {
    pool: DbPool,
}

impl AccountRepo {
    /// Create a new account repository
    #[must_use]
    #[allow(clippy::missing_const_for_fn)]
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Find an account by username
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn find_by_username(&self, username: &str) -> Result<Option<Account>> {
        let conn = self.pool.get()?;

        let account = conn
            .query_row(
                "SELECT id, username, email, is_staff, created_at
                 FROM accounts WHERE username = ?1",
                [username],
                |row| {
                    Ok(Account {
                        id: row.get(0)?,
                        username: row.get(1)?,
                        email: row.get(2)?,
                        is_staff: row.get(3)?,
                        created_at: parse_datetime(&row.get::<_, String>(4)?),
                    })
                },
            )
            .optional()?;

        Ok(account)
    }

    /// Check a password against the stored hash
    ///
    /// Unknown usernames verify as `false`.
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn verify_password(&self, username: &str, password: &str) -> Result<bool> {
        let conn = self.pool.get()?;

        let stored: Option<String> = conn
            .query_row(
                "SELECT password_hash FROM accounts WHERE username = ?1",
                [username],
                |row| row.get(0),
            )
            .optional()?;

        let Some(stored) = stored else {
            return Ok(false);
        };

        let parsed = PasswordHash::new(&stored).map_err(|e| Error::PasswordHash(e.to_string()))?;
        Ok(Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok())
    }
}

/// Hash a password into an Argon2id PHC string
pub(crate) fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| Error::PasswordHash(e.to_string()))
}

/// Insert an account on an existing connection or transaction
pub(super) fn insert_with(
    conn: &Connection,
    username: &str,
    password_hash: &str,
    email: Option<&str>,
    now: &str,
) -> Result<i64> {
    conn.execute(
        "INSERT INTO accounts (username, password_hash, email, is_staff, created_at)
         VALUES (?1, ?2, ?3, 0, ?4)",
        rusqlite::params![username, password_hash, email, now],
    )
    .map_err(|e| {
        if super::is_unique_violation(&e, "accounts.username") {
            Error::DuplicateUsername(username.to_string())
        } else {
            Error::Sqlite(e)
        }
    })?;

    Ok(conn.last_insert_rowid())
}
