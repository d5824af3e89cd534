use anyhow::Result;
use rusqlite::{Connection, OptionalExtension, params};
use tracing::debug;
use uuid::Uuid;

use choka_types::Prefecture;
use choka_types::api::NewCatchResult;
use choka_types::models::{CatchResult, Comment, Trip};

use crate::Database;
use crate::models::{
    self, RESULT_COLUMNS, SearchRow, TRIP_COLUMNS, comment_row, get_prefecture, get_uuid, result_row, trip_row,
};
use crate::queries::placeholders;

const COMMENT_SELECT: &str = "SELECT c.id, c.trip_id, c.author_id, u.username, c.content, c.created_at
     FROM comments c
     JOIN users u ON u.id = c.author_id";

/// Editable trip fields.
pub struct TripFields<'a> {
    pub title: &'a str,
    pub prefecture: Prefecture,
    pub content: &'a str,
}

impl Database {
    // -- Trips --

    /// Inserts a trip and its results in one transaction.
    pub fn create_trip(&self, owner_id: Uuid, fields: &TripFields<'_>, results: &[NewCatchResult]) -> Result<Trip> {
        let id = Uuid::new_v4();
        self.with_tx(|tx| {
            tx.execute(
                "INSERT INTO trips (id, owner_id, title, prefecture, content, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    id.to_string(),
                    owner_id.to_string(),
                    fields.title,
                    fields.prefecture.as_str(),
                    fields.content,
                    models::now(),
                ],
            )?;
            insert_results(tx, id, results)?;
            query_trip(tx, id)?.ok_or_else(|| anyhow::anyhow!("Trip {} missing after insert", id))
        })
    }

    pub fn get_trip(&self, id: Uuid) -> Result<Option<Trip>> {
        self.with_conn(|conn| query_trip(conn, id))
    }

    /// Replaces the editable fields, appends `new_results` and removes the
    /// listed results that belong to this trip. Returns how many were removed.
    pub fn update_trip(
        &self,
        id: Uuid,
        fields: &TripFields<'_>,
        new_results: &[NewCatchResult],
        deleted_result_ids: &[Uuid],
    ) -> Result<usize> {
        self.with_tx(|tx| {
            tx.execute(
                "UPDATE trips SET title = ?2, prefecture = ?3, content = ?4 WHERE id = ?1",
                params![id.to_string(), fields.title, fields.prefecture.as_str(), fields.content],
            )?;
            insert_results(tx, id, new_results)?;

            let mut removed = 0;
            for result_id in deleted_result_ids {
                removed += tx.execute(
                    "DELETE FROM results WHERE id = ?1 AND trip_id = ?2",
                    params![result_id.to_string(), id.to_string()],
                )?;
            }
            Ok(removed)
        })
    }

    /// Deletes a trip; results and comments go with it.
    pub fn delete_trip(&self, id: Uuid) -> Result<bool> {
        self.with_conn(|conn| {
            let removed = conn.execute("DELETE FROM trips WHERE id = ?1", [id.to_string()])?;
            Ok(removed > 0)
        })
    }

    /// A page of trips, newest first, optionally limited to one owner.
    pub fn list_trips(&self, owner_id: Option<Uuid>, limit: u32, offset: u64) -> Result<Vec<Trip>> {
        self.with_conn(|conn| {
            let rows = match owner_id {
                Some(owner) => {
                    let sql = format!(
                        "SELECT {TRIP_COLUMNS} FROM trips WHERE owner_id = ?1
                         ORDER BY created_at DESC, rowid DESC LIMIT ?2 OFFSET ?3"
                    );
                    let mut stmt = conn.prepare(&sql)?;
                    let rows = stmt
                        .query_map(params![owner.to_string(), limit, offset as i64], trip_row)?
                        .collect::<std::result::Result<Vec<_>, _>>()?;
                    rows
                }
                None => {
                    let sql = format!(
                        "SELECT {TRIP_COLUMNS} FROM trips ORDER BY created_at DESC, rowid DESC LIMIT ?1 OFFSET ?2"
                    );
                    let mut stmt = conn.prepare(&sql)?;
                    let rows = stmt
                        .query_map(params![limit, offset as i64], trip_row)?
                        .collect::<std::result::Result<Vec<_>, _>>()?;
                    rows
                }
            };
            Ok(rows)
        })
    }

    pub fn count_trips(&self, owner_id: Option<Uuid>) -> Result<u64> {
        self.with_conn(|conn| {
            let count: i64 = match owner_id {
                Some(owner) => conn.query_row(
                    "SELECT COUNT(*) FROM trips WHERE owner_id = ?1",
                    [owner.to_string()],
                    |r| r.get(0),
                )?,
                None => conn.query_row("SELECT COUNT(*) FROM trips", [], |r| r.get(0))?,
            };
            Ok(count as u64)
        })
    }

    // -- Results --

    pub fn results_for_trip(&self, trip_id: Uuid) -> Result<Vec<CatchResult>> {
        self.results_for_trips(&[trip_id])
    }

    /// Batch-fetch results for a set of trips, oldest first within each trip.
    pub fn results_for_trips(&self, trip_ids: &[Uuid]) -> Result<Vec<CatchResult>> {
        if trip_ids.is_empty() {
            return Ok(vec![]);
        }

        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {RESULT_COLUMNS} FROM results WHERE trip_id IN ({}) ORDER BY created_at, rowid",
                placeholders(trip_ids.len())
            );
            let ids: Vec<String> = trip_ids.iter().map(Uuid::to_string).collect();
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(rusqlite::params_from_iter(ids.iter()), result_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Results with this exact fish name, newest first, optionally limited to
    /// trips in one prefecture.
    pub fn search_results(&self, fish_name: &str, prefecture: Option<Prefecture>) -> Result<Vec<SearchRow>> {
        self.with_conn(|conn| {
            let base = "SELECT r.id, r.trip_id, r.fish_name, r.image, r.created_at,
                        t.title, t.prefecture, u.id, u.username
                 FROM results r
                 JOIN trips t ON t.id = r.trip_id
                 JOIN users u ON u.id = t.owner_id
                 WHERE r.fish_name = ?1";
            let order = "ORDER BY r.created_at DESC, r.rowid DESC";

            let map = |row: &rusqlite::Row<'_>| -> rusqlite::Result<SearchRow> {
                Ok(SearchRow {
                    result: result_row(row)?,
                    trip_title: row.get(5)?,
                    prefecture: get_prefecture(row, 6)?,
                    user_id: get_uuid(row, 7)?,
                    username: row.get(8)?,
                })
            };

            let rows = match prefecture {
                Some(p) => {
                    let sql = format!("{base} AND t.prefecture = ?2 {order}");
                    let mut stmt = conn.prepare(&sql)?;
                    let rows = stmt
                        .query_map(params![fish_name, p.as_str()], map)?
                        .collect::<std::result::Result<Vec<_>, _>>()?;
                    rows
                }
                None => {
                    let sql = format!("{base} {order}");
                    let mut stmt = conn.prepare(&sql)?;
                    let rows = stmt
                        .query_map([fish_name], map)?
                        .collect::<std::result::Result<Vec<_>, _>>()?;
                    rows
                }
            };
            Ok(rows)
        })
    }

    // -- Comments --

    pub fn insert_comment(&self, trip_id: Uuid, author_id: Uuid, content: &str) -> Result<Comment> {
        let id = Uuid::new_v4();
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO comments (id, trip_id, author_id, content, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
                params![id.to_string(), trip_id.to_string(), author_id.to_string(), content, models::now()],
            )?;
            let sql = format!("{COMMENT_SELECT} WHERE c.id = ?1");
            Ok(conn.query_row(&sql, [id.to_string()], comment_row)?)
        })
    }

    pub fn get_comment(&self, id: Uuid) -> Result<Option<Comment>> {
        self.with_conn(|conn| {
            let sql = format!("{COMMENT_SELECT} WHERE c.id = ?1");
            Ok(conn.query_row(&sql, [id.to_string()], comment_row).optional()?)
        })
    }

    pub fn delete_comment(&self, id: Uuid) -> Result<bool> {
        self.with_conn(|conn| {
            let removed = conn.execute("DELETE FROM comments WHERE id = ?1", [id.to_string()])?;
            Ok(removed > 0)
        })
    }

    /// Comments on a trip, newest first.
    pub fn comments_for_trip(&self, trip_id: Uuid) -> Result<Vec<Comment>> {
        self.with_conn(|conn| {
            let sql = format!("{COMMENT_SELECT} WHERE c.trip_id = ?1 ORDER BY c.created_at DESC, c.rowid DESC");
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([trip_id.to_string()], comment_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }
}

fn query_trip(conn: &Connection, id: Uuid) -> Result<Option<Trip>> {
    let sql = format!("SELECT {TRIP_COLUMNS} FROM trips WHERE id = ?1");
    Ok(conn.query_row(&sql, [id.to_string()], trip_row).optional()?)
}

fn insert_results(conn: &Connection, trip_id: Uuid, results: &[NewCatchResult]) -> Result<()> {
    for result in results {
        conn.execute(
            "INSERT INTO results (id, trip_id, fish_name, image, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                Uuid::new_v4().to_string(),
                trip_id.to_string(),
                result.fish_name,
                result.image,
                models::now(),
            ],
        )?;
    }
    if !results.is_empty() {
        debug!("Stored {} result(s) for trip {}", results.len(), trip_id);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queries::test_support::user;

    fn fields(prefecture: Prefecture) -> TripFields<'static> {
        TripFields {
            title: "釣行",
            prefecture,
            content: "本文",
        }
    }

    fn catch(name: &str) -> NewCatchResult {
        NewCatchResult {
            fish_name: name.to_string(),
            image: None,
        }
    }

    fn count(db: &Database, table: &str) -> i64 {
        db.with_conn(|c| Ok(c.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |r| r.get(0))?))
            .unwrap()
    }

    #[test]
    fn create_trip_with_results() {
        let db = Database::open_in_memory().unwrap();
        let owner = user(&db, "owner");
        let trip = db
            .create_trip(owner, &fields(Prefecture::Hokkaido), &[catch("カレイ"), catch("アジ")])
            .unwrap();

        assert_eq!(trip.owner_id, owner);
        assert_eq!(db.get_trip(trip.id).unwrap(), Some(trip.clone()));
        let names: Vec<String> = db.results_for_trip(trip.id).unwrap().into_iter().map(|r| r.fish_name).collect();
        assert_eq!(names, vec!["カレイ", "アジ"]);
    }

    #[test]
    fn failed_insert_leaves_nothing_behind() {
        let db = Database::open_in_memory().unwrap();
        // Unknown owner trips the foreign key inside the transaction.
        let err = db.create_trip(Uuid::new_v4(), &fields(Prefecture::Tokyo), &[catch("アジ")]);
        assert!(err.is_err());
        assert_eq!(count(&db, "trips"), 0);
        assert_eq!(count(&db, "results"), 0);
    }

    #[test]
    fn update_only_deletes_own_results() {
        let db = Database::open_in_memory().unwrap();
        let owner = user(&db, "owner");
        let trip = db.create_trip(owner, &fields(Prefecture::Hokkaido), &[catch("カレイ")]).unwrap();
        let other = db.create_trip(owner, &fields(Prefecture::Okinawa), &[catch("マグロ")]).unwrap();
        let own_result = db.results_for_trip(trip.id).unwrap()[0].id;
        let foreign_result = db.results_for_trip(other.id).unwrap()[0].id;

        let new_fields = TripFields {
            title: "更新",
            prefecture: Prefecture::Aomori,
            content: "更新本文",
        };
        let removed = db
            .update_trip(trip.id, &new_fields, &[catch("ヒラメ")], &[own_result, foreign_result])
            .unwrap();
        assert_eq!(removed, 1);

        let updated = db.get_trip(trip.id).unwrap().unwrap();
        assert_eq!(updated.title, "更新");
        assert_eq!(updated.prefecture, Prefecture::Aomori);
        let names: Vec<String> = db.results_for_trip(trip.id).unwrap().into_iter().map(|r| r.fish_name).collect();
        assert_eq!(names, vec!["ヒラメ"]);
        assert_eq!(db.results_for_trip(other.id).unwrap().len(), 1);
    }

    #[test]
    fn delete_trip_cascades() {
        let db = Database::open_in_memory().unwrap();
        let owner = user(&db, "owner");
        let trip = db.create_trip(owner, &fields(Prefecture::Hokkaido), &[catch("カレイ")]).unwrap();
        db.insert_comment(trip.id, owner, "いいね").unwrap();

        assert!(db.delete_trip(trip.id).unwrap());
        assert!(db.results_for_trip(trip.id).unwrap().is_empty());
        assert!(db.comments_for_trip(trip.id).unwrap().is_empty());
        assert_eq!(count(&db, "results"), 0);
        assert_eq!(count(&db, "comments"), 0);
        assert!(!db.delete_trip(trip.id).unwrap());
    }

    #[test]
    fn paging_and_owner_filter() {
        let db = Database::open_in_memory().unwrap();
        let a = user(&db, "a");
        let b = user(&db, "b");
        let mut a_trips = Vec::new();
        for _ in 0..3 {
            a_trips.push(db.create_trip(a, &fields(Prefecture::Chiba), &[]).unwrap().id);
        }
        db.create_trip(b, &fields(Prefecture::Chiba), &[]).unwrap();

        assert_eq!(db.count_trips(None).unwrap(), 4);
        assert_eq!(db.count_trips(Some(a)).unwrap(), 3);

        let page: Vec<Uuid> = db.list_trips(Some(a), 2, 0).unwrap().into_iter().map(|t| t.id).collect();
        assert_eq!(page, vec![a_trips[2], a_trips[1]]);
        let page: Vec<Uuid> = db.list_trips(Some(a), 2, 2).unwrap().into_iter().map(|t| t.id).collect();
        assert_eq!(page, vec![a_trips[0]]);
    }

    #[test]
    fn search_filters_by_prefecture() {
        let db = Database::open_in_memory().unwrap();
        let owner = user(&db, "owner");
        db.create_trip(owner, &fields(Prefecture::Hokkaido), &[catch("カレイ")]).unwrap();
        db.create_trip(owner, &fields(Prefecture::Okinawa), &[catch("カレイ"), catch("マグロ")]).unwrap();

        assert_eq!(db.search_results("カレイ", None).unwrap().len(), 2);
        let hokkaido = db.search_results("カレイ", Some(Prefecture::Hokkaido)).unwrap();
        assert_eq!(hokkaido.len(), 1);
        assert_eq!(hokkaido[0].prefecture, Prefecture::Hokkaido);
        assert_eq!(hokkaido[0].username, "owner");
        assert!(db.search_results("カレイ", Some(Prefecture::Tokyo)).unwrap().is_empty());
    }

    #[test]
    fn comments_round_trip() {
        let db = Database::open_in_memory().unwrap();
        let owner = user(&db, "owner");
        let trip = db.create_trip(owner, &fields(Prefecture::Hokkaido), &[]).unwrap();
        let first = db.insert_comment(trip.id, owner, "one").unwrap();
        let second = db.insert_comment(trip.id, owner, "two").unwrap();

        assert_eq!(db.get_comment(first.id).unwrap(), Some(first.clone()));
        let ids: Vec<Uuid> = db.comments_for_trip(trip.id).unwrap().into_iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![second.id, first.id]);
        assert!(db.delete_comment(first.id).unwrap());
        assert!(db.get_comment(first.id).unwrap().is_none());
    }
}
