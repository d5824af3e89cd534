use anyhow::Result;
use rusqlite::{Connection, OptionalExtension, params};
use uuid::Uuid;

use crate::Database;
use crate::models::{self, USER_COLUMNS, UserRow, WriteOutcome, is_unique_violation, user_row};

pub struct NewUser<'a> {
    pub username: &'a str,
    pub email: &'a str,
    pub password_hash: &'a str,
    pub is_staff: bool,
    pub is_superuser: bool,
}

impl Database {
    // -- Users --

    /// Inserts a user. A username or e-mail collision yields `Duplicate`.
    pub fn create_user(&self, id: Uuid, user: &NewUser<'_>) -> Result<WriteOutcome> {
        self.with_conn(|conn| {
            let inserted = conn.execute(
                "INSERT INTO users (id, username, email, password, is_staff, is_superuser, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    id.to_string(),
                    user.username,
                    user.email,
                    user.password_hash,
                    user.is_staff,
                    user.is_superuser,
                    models::now(),
                ],
            );
            match inserted {
                Ok(_) => Ok(WriteOutcome::Applied),
                Err(e) if is_unique_violation(&e) => Ok(WriteOutcome::Duplicate),
                Err(e) => Err(e.into()),
            }
        })
    }

    /// Same as [`Database::create_user`] with both staff flags forced on.
    pub fn create_superuser(
        &self,
        id: Uuid,
        username: &str,
        email: &str,
        password_hash: &str,
    ) -> Result<WriteOutcome> {
        self.create_user(
            id,
            &NewUser {
                username,
                email,
                password_hash,
                is_staff: true,
                is_superuser: true,
            },
        )
    }

    pub fn get_user_by_id(&self, id: Uuid) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "id", &id.to_string()))
    }

    pub fn get_user_by_email(&self, email: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "email", email))
    }

    pub fn get_user_by_username(&self, username: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "username", username))
    }

    pub fn user_exists(&self, id: Uuid) -> Result<bool> {
        self.with_conn(|conn| {
            let found = conn
                .query_row("SELECT 1 FROM users WHERE id = ?1", [id.to_string()], |_| Ok(()))
                .optional()?;
            Ok(found.is_some())
        })
    }

    pub fn update_profile(&self, id: Uuid, username: &str, introduce: &str) -> Result<WriteOutcome> {
        self.with_conn(|conn| {
            let updated = conn.execute(
                "UPDATE users SET username = ?2, introduce = ?3 WHERE id = ?1",
                params![id.to_string(), username, introduce],
            );
            match updated {
                Ok(_) => Ok(WriteOutcome::Applied),
                Err(e) if is_unique_violation(&e) => Ok(WriteOutcome::Duplicate),
                Err(e) => Err(e.into()),
            }
        })
    }
}

fn query_user(conn: &Connection, column: &str, value: &str) -> Result<Option<UserRow>> {
    // `column` is one of a fixed set of names chosen by the callers above.
    let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE {column} = ?1");
    let row = conn.query_row(&sql, [value], user_row).optional()?;
    Ok(row)
}
