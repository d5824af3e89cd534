use anyhow::Result;
use rusqlite::{Connection, params};
use uuid::Uuid;

use choka_types::models::UserSummary;

use crate::Database;
use crate::models::{self, WriteOutcome, get_uuid, is_unique_violation};

impl Database {
    // -- Follow edges --

    /// Inserts the directed edge `follower -> followed`.
    pub fn insert_follow(&self, follower: Uuid, followed: Uuid) -> Result<WriteOutcome> {
        self.with_conn(|conn| {
            let inserted = conn.execute(
                "INSERT INTO follows (follower_id, followed_id, created_at) VALUES (?1, ?2, ?3)",
                params![follower.to_string(), followed.to_string(), models::now()],
            );
            match inserted {
                Ok(_) => Ok(WriteOutcome::Applied),
                Err(e) if is_unique_violation(&e) => Ok(WriteOutcome::Duplicate),
                Err(e) => Err(e.into()),
            }
        })
    }

    /// Returns false when no such edge existed.
    pub fn delete_follow(&self, follower: Uuid, followed: Uuid) -> Result<bool> {
        self.with_conn(|conn| {
            let removed = conn.execute(
                "DELETE FROM follows WHERE follower_id = ?1 AND followed_id = ?2",
                params![follower.to_string(), followed.to_string()],
            )?;
            Ok(removed > 0)
        })
    }

    pub fn follow_exists(&self, follower: Uuid, followed: Uuid) -> Result<bool> {
        self.with_conn(|conn| query_follow_exists(conn, follower, followed))
    }

    pub fn is_mutual_follow(&self, a: Uuid, b: Uuid) -> Result<bool> {
        self.with_conn(|conn| query_is_mutual(conn, a, b))
    }

    /// Users that `user` follows, newest edge first.
    pub fn list_following(&self, user: Uuid) -> Result<Vec<UserSummary>> {
        self.with_conn(|conn| {
            query_edge_users(
                conn,
                "SELECT u.id, u.username FROM follows f
                 JOIN users u ON u.id = f.followed_id
                 WHERE f.follower_id = ?1
                 ORDER BY f.created_at DESC, f.rowid DESC",
                user,
            )
        })
    }

    /// Users following `user`, newest edge first.
    pub fn list_followers(&self, user: Uuid) -> Result<Vec<UserSummary>> {
        self.with_conn(|conn| {
            query_edge_users(
                conn,
                "SELECT u.id, u.username FROM follows f
                 JOIN users u ON u.id = f.follower_id
                 WHERE f.followed_id = ?1
                 ORDER BY f.created_at DESC, f.rowid DESC",
                user,
            )
        })
    }

    /// (following, followers) counts.
    pub fn follow_counts(&self, user: Uuid) -> Result<(u64, u64)> {
        self.with_conn(|conn| {
            let id = user.to_string();
            let following: i64 =
                conn.query_row("SELECT COUNT(*) FROM follows WHERE follower_id = ?1", [&id], |r| r.get(0))?;
            let followers: i64 =
                conn.query_row("SELECT COUNT(*) FROM follows WHERE followed_id = ?1", [&id], |r| r.get(0))?;
            Ok((following as u64, followers as u64))
        })
    }
}

pub(crate) fn query_follow_exists(conn: &Connection, follower: Uuid, followed: Uuid) -> Result<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM follows WHERE follower_id = ?1 AND followed_id = ?2",
        params![follower.to_string(), followed.to_string()],
        |r| r.get(0),
    )?;
    Ok(count > 0)
}

pub(crate) fn query_is_mutual(conn: &Connection, a: Uuid, b: Uuid) -> Result<bool> {
    if a == b {
        return Ok(false);
    }
    Ok(query_follow_exists(conn, a, b)? && query_follow_exists(conn, b, a)?)
}

fn query_edge_users(conn: &Connection, sql: &str, user: Uuid) -> Result<Vec<UserSummary>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt
        .query_map([user.to_string()], |row| {
            Ok(UserSummary {
                id: get_uuid(row, 0)?,
                username: row.get(1)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}
