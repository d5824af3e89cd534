//! Database row types and column decoding.
//!
//! Ids are stored as hyphenated UUID text and timestamps as RFC 3339 UTC with
//! microseconds, so `ORDER BY created_at` is chronological.

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::Row;
use rusqlite::types::Type;
use uuid::Uuid;

use choka_types::Prefecture;
use choka_types::models::{CatchResult, Comment, Message, Room, Trip, User};

/// A user together with the stored password hash.
pub struct UserRow {
    pub user: User,
    pub password: String,
}

/// One catch result joined with its trip and the trip's owner.
pub struct SearchRow {
    pub result: CatchResult,
    pub trip_title: String,
    pub prefecture: Prefecture,
    pub user_id: Uuid,
    pub username: String,
}

/// Outcome of an insert or update guarded by a unique constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    Applied,
    Duplicate,
}

pub fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn now() -> String {
    timestamp(Utc::now())
}

pub(crate) fn is_unique_violation(err: &rusqlite::Error) -> bool {
    match err {
        rusqlite::Error::SqliteFailure(e, _) => {
            e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                || e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY
        }
        _ => false,
    }
}

fn conversion_error(idx: usize, err: impl std::error::Error + Send + Sync + 'static) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(err))
}

pub(crate) fn get_uuid(row: &Row<'_>, idx: usize) -> rusqlite::Result<Uuid> {
    let raw: String = row.get(idx)?;
    raw.parse().map_err(|e| conversion_error(idx, e))
}

pub(crate) fn get_timestamp(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| conversion_error(idx, e))
}

pub(crate) fn get_prefecture(row: &Row<'_>, idx: usize) -> rusqlite::Result<Prefecture> {
    let raw: String = row.get(idx)?;
    raw.parse().map_err(|e| conversion_error(idx, e))
}

pub(crate) const USER_COLUMNS: &str =
    "id, username, email, password, introduce, is_staff, is_superuser, created_at";

pub(crate) fn user_row(row: &Row<'_>) -> rusqlite::Result<UserRow> {
    Ok(UserRow {
        user: User {
            id: get_uuid(row, 0)?,
            username: row.get(1)?,
            email: row.get(2)?,
            introduce: row.get(4)?,
            is_staff: row.get(5)?,
            is_superuser: row.get(6)?,
            created_at: get_timestamp(row, 7)?,
        },
        password: row.get(3)?,
    })
}

pub(crate) const ROOM_COLUMNS: &str = "id, member_low, member_high, created_at";

pub(crate) fn room_row(row: &Row<'_>) -> rusqlite::Result<Room> {
    Ok(Room {
        id: get_uuid(row, 0)?,
        members: [get_uuid(row, 1)?, get_uuid(row, 2)?],
        created_at: get_timestamp(row, 3)?,
    })
}

/// Expects `m.id, m.room_id, m.sender_id, u.username, m.content, m.created_at`.
pub(crate) fn message_row(row: &Row<'_>) -> rusqlite::Result<Message> {
    Ok(Message {
        id: get_uuid(row, 0)?,
        room_id: get_uuid(row, 1)?,
        sender_id: get_uuid(row, 2)?,
        sender_username: row.get(3)?,
        content: row.get(4)?,
        created_at: get_timestamp(row, 5)?,
    })
}

pub(crate) const TRIP_COLUMNS: &str = "id, owner_id, title, prefecture, content, created_at";

pub(crate) fn trip_row(row: &Row<'_>) -> rusqlite::Result<Trip> {
    Ok(Trip {
        id: get_uuid(row, 0)?,
        owner_id: get_uuid(row, 1)?,
        title: row.get(2)?,
        prefecture: get_prefecture(row, 3)?,
        content: row.get(4)?,
        created_at: get_timestamp(row, 5)?,
    })
}

pub(crate) const RESULT_COLUMNS: &str = "id, trip_id, fish_name, image, created_at";

pub(crate) fn result_row(row: &Row<'_>) -> rusqlite::Result<CatchResult> {
    Ok(CatchResult {
        id: get_uuid(row, 0)?,
        trip_id: get_uuid(row, 1)?,
        fish_name: row.get(2)?,
        image: row.get(3)?,
        created_at: get_timestamp(row, 4)?,
    })
}

/// Expects `c.id, c.trip_id, c.author_id, u.username, c.content, c.created_at`.
pub(crate) fn comment_row(row: &Row<'_>) -> rusqlite::Result<Comment> {
    Ok(Comment {
        id: get_uuid(row, 0)?,
        trip_id: get_uuid(row, 1)?,
        author_id: get_uuid(row, 2)?,
        author_username: row.get(3)?,
        content: row.get(4)?,
        created_at: get_timestamp(row, 5)?,
    })
}
