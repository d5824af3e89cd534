use anyhow::{Result, anyhow};
use rusqlite::{Connection, OptionalExtension, params};
use tracing::{debug, warn};
use uuid::Uuid;

use choka_types::models::{Message, Room};

use crate::Database;
use crate::models::{self, ROOM_COLUMNS, is_unique_violation, message_row, room_row};

const MESSAGE_SELECT: &str = "SELECT m.id, m.room_id, m.sender_id, u.username, m.content, m.created_at
     FROM messages m
     JOIN users u ON u.id = m.sender_id";

/// Canonical storage order for an unordered member pair.
pub fn ordered_pair(a: Uuid, b: Uuid) -> (Uuid, Uuid) {
    if a <= b { (a, b) } else { (b, a) }
}

impl Database {
    // -- Rooms --

    /// Returns the room for the unordered pair `{a, b}`, creating it when absent.
    /// The bool is true when this call created the room.
    ///
    /// The lookup and insert share one immediate transaction, so writers on
    /// other connections queue behind it. The pair is also unique in the
    /// schema; if an insert still collides the existing room is re-read once.
    pub fn get_or_create_room(&self, a: Uuid, b: Uuid) -> Result<(Room, bool)> {
        let (low, high) = ordered_pair(a, b);

        let outcome = self.with_immediate_tx(|tx| {
            if let Some(room) = query_room_by_pair(tx, low, high)? {
                return Ok(Some((room, false)));
            }
            match insert_room(tx, low, high) {
                Ok(room) => Ok(Some((room, true))),
                Err(e) if is_unique_violation(&e) => Ok(None),
                Err(e) => Err(e.into()),
            }
        })?;

        match outcome {
            Some(found) => Ok(found),
            None => {
                warn!("Room for {}/{} created concurrently, re-reading", low, high);
                let room = self
                    .with_conn(|conn| query_room_by_pair(conn, low, high))?
                    .ok_or_else(|| anyhow!("Room for {}/{} vanished after conflict", low, high))?;
                Ok((room, false))
            }
        }
    }

    pub fn get_room(&self, id: Uuid) -> Result<Option<Room>> {
        self.with_conn(|conn| {
            let sql = format!("SELECT {ROOM_COLUMNS} FROM rooms WHERE id = ?1");
            Ok(conn.query_row(&sql, [id.to_string()], room_row).optional()?)
        })
    }

    /// Rooms `user` belongs to, newest first.
    pub fn list_rooms_for_user(&self, user: Uuid) -> Result<Vec<Room>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT r.id, r.member_low, r.member_high, r.created_at
                 FROM room_members rm
                 JOIN rooms r ON r.id = rm.room_id
                 WHERE rm.user_id = ?1
                 ORDER BY r.created_at DESC, r.rowid DESC",
            )?;
            let rows = stmt
                .query_map([user.to_string()], room_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    // -- Messages --

    pub fn insert_message(&self, room_id: Uuid, sender_id: Uuid, content: &str) -> Result<Message> {
        let id = Uuid::new_v4();
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO messages (id, room_id, sender_id, content, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
                params![id.to_string(), room_id.to_string(), sender_id.to_string(), content, models::now()],
            )?;
            let sql = format!("{MESSAGE_SELECT} WHERE m.id = ?1");
            Ok(conn.query_row(&sql, [id.to_string()], message_row)?)
        })
    }

    /// Every message in the room, newest first.
    pub fn list_messages(&self, room_id: Uuid) -> Result<Vec<Message>> {
        self.with_conn(|conn| {
            let sql = format!("{MESSAGE_SELECT} WHERE m.room_id = ?1 ORDER BY m.created_at DESC, m.rowid DESC");
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([room_id.to_string()], message_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }
}

fn query_room_by_pair(conn: &Connection, low: Uuid, high: Uuid) -> Result<Option<Room>> {
    let sql = format!("SELECT {ROOM_COLUMNS} FROM rooms WHERE member_low = ?1 AND member_high = ?2");
    let room = conn
        .query_row(&sql, params![low.to_string(), high.to_string()], room_row)
        .optional()?;
    Ok(room)
}

fn insert_room(conn: &Connection, low: Uuid, high: Uuid) -> rusqlite::Result<Room> {
    let id = Uuid::new_v4().to_string();
    conn.execute(
        "INSERT INTO rooms (id, member_low, member_high, created_at) VALUES (?1, ?2, ?3, ?4)",
        params![id, low.to_string(), high.to_string(), models::now()],
    )?;
    for member in [low, high] {
        conn.execute(
            "INSERT INTO room_members (room_id, user_id) VALUES (?1, ?2)",
            params![id, member.to_string()],
        )?;
    }
    debug!("Created room {} for {}/{}", id, low, high);

    let sql = format!("SELECT {ROOM_COLUMNS} FROM rooms WHERE id = ?1");
    conn.query_row(&sql, [&id], room_row)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queries::test_support::user;

    #[test]
    fn same_room_for_either_argument_order() {
        let db = Database::open_in_memory().unwrap();
        let a = user(&db, "a");
        let b = user(&db, "b");

        let (first, created) = db.get_or_create_room(a, b).unwrap();
        assert!(created);
        let (second, created) = db.get_or_create_room(b, a).unwrap();
        assert!(!created);
        assert_eq!(first, second);

        let count: i64 = db
            .with_conn(|c| Ok(c.query_row("SELECT COUNT(*) FROM rooms", [], |r| r.get(0))?))
            .unwrap();
        assert_eq!(count, 1);
        assert_eq!(db.get_room(first.id).unwrap(), Some(first));
    }

    #[test]
    fn membership_rows_written() {
        let db = Database::open_in_memory().unwrap();
        let a = user(&db, "a");
        let b = user(&db, "b");
        let c = user(&db, "c");
        let (ab, _) = db.get_or_create_room(a, b).unwrap();
        let (ac, _) = db.get_or_create_room(c, a).unwrap();

        let rooms_a: Vec<Uuid> = db.list_rooms_for_user(a).unwrap().into_iter().map(|r| r.id).collect();
        assert_eq!(rooms_a, vec![ac.id, ab.id]);
        assert_eq!(db.list_rooms_for_user(b).unwrap().len(), 1);
        assert!(db.list_rooms_for_user(c).unwrap().iter().all(|r| !r.has_member(b)));
    }

    #[test]
    fn second_insert_for_pair_is_a_unique_violation() {
        let db = Database::open_in_memory().unwrap();
        let (low, high) = ordered_pair(user(&db, "a"), user(&db, "b"));
        db.get_or_create_room(low, high).unwrap();

        let err = db
            .with_conn(|conn| Ok(insert_room(conn, low, high).unwrap_err()))
            .unwrap();
        assert!(is_unique_violation(&err));
    }

    #[test]
    fn concurrent_connections_share_one_room() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rooms.db");
        let setup = Database::open(&path).unwrap();
        let a = user(&setup, "a");
        let b = user(&setup, "b");

        let handles: Vec<Database> = (0..4).map(|_| Database::open(&path).unwrap()).collect();
        let barrier = std::sync::Barrier::new(handles.len());
        let rooms: Vec<Uuid> = std::thread::scope(|scope| {
            let workers: Vec<_> = handles
                .iter()
                .enumerate()
                .map(|(i, db)| {
                    let barrier = &barrier;
                    scope.spawn(move || {
                        barrier.wait();
                        let (x, y) = if i % 2 == 0 { (a, b) } else { (b, a) };
                        db.get_or_create_room(x, y).unwrap().0.id
                    })
                })
                .collect();
            workers.into_iter().map(|w| w.join().unwrap()).collect()
        });

        assert!(rooms.iter().all(|id| *id == rooms[0]));
        let count: i64 = setup
            .with_conn(|c| Ok(c.query_row("SELECT COUNT(*) FROM rooms", [], |r| r.get(0))?))
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn messages_newest_first() {
        let db = Database::open_in_memory().unwrap();
        let a = user(&db, "a");
        let b = user(&db, "b");
        let (room, _) = db.get_or_create_room(a, b).unwrap();

        let first = db.insert_message(room.id, a, "こんにちは").unwrap();
        let second = db.insert_message(room.id, b, "どうも").unwrap();
        assert_eq!(first.sender_username, "a");

        let ids: Vec<Uuid> = db.list_messages(room.id).unwrap().into_iter().map(|m| m.id).collect();
        assert_eq!(ids, vec![second.id, first.id]);
    }
}
