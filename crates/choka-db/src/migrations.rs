use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version: i64 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |r| r.get(0),
    )?;

    if version < 1 {
        info!("Running migration v1 (accounts, social graph, rooms)");
        conn.execute_batch(
            "
            CREATE TABLE users (
                id              TEXT PRIMARY KEY,
                username        TEXT NOT NULL UNIQUE,
                email           TEXT NOT NULL UNIQUE,
                password        TEXT NOT NULL,
                introduce       TEXT NOT NULL DEFAULT '',
                is_staff        INTEGER NOT NULL DEFAULT 0,
                is_superuser    INTEGER NOT NULL DEFAULT 0,
                created_at      TEXT NOT NULL
            );

            CREATE TABLE follows (
                follower_id     TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                followed_id     TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                created_at      TEXT NOT NULL,
                PRIMARY KEY (follower_id, followed_id),
                CHECK (follower_id <> followed_id)
            );

            CREATE INDEX idx_follows_followed ON follows(followed_id);

            -- One room per unordered pair: members are stored sorted.
            CREATE TABLE rooms (
                id              TEXT PRIMARY KEY,
                member_low      TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                member_high     TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                created_at      TEXT NOT NULL,
                UNIQUE (member_low, member_high),
                CHECK (member_low < member_high)
            );

            CREATE TABLE room_members (
                room_id         TEXT NOT NULL REFERENCES rooms(id) ON DELETE CASCADE,
                user_id         TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                PRIMARY KEY (room_id, user_id)
            );

            CREATE INDEX idx_room_members_user ON room_members(user_id);

            CREATE TABLE messages (
                id              TEXT PRIMARY KEY,
                room_id         TEXT NOT NULL REFERENCES rooms(id) ON DELETE CASCADE,
                sender_id       TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                content         TEXT NOT NULL,
                created_at      TEXT NOT NULL
            );

            CREATE INDEX idx_messages_room ON messages(room_id, created_at);

            INSERT INTO schema_version (version) VALUES (1);
            ",
        )?;
    }

    if version < 2 {
        info!("Running migration v2 (trips, results, comments)");
        conn.execute_batch(
            "
            CREATE TABLE trips (
                id              TEXT PRIMARY KEY,
                owner_id        TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                title           TEXT NOT NULL,
                prefecture      TEXT NOT NULL,
                content         TEXT NOT NULL,
                created_at      TEXT NOT NULL
            );

            CREATE INDEX idx_trips_created ON trips(created_at);
            CREATE INDEX idx_trips_owner ON trips(owner_id, created_at);

            CREATE TABLE results (
                id              TEXT PRIMARY KEY,
                trip_id         TEXT NOT NULL REFERENCES trips(id) ON DELETE CASCADE,
                fish_name       TEXT NOT NULL,
                image           TEXT,
                created_at      TEXT NOT NULL
            );

            CREATE INDEX idx_results_trip ON results(trip_id);
            CREATE INDEX idx_results_fish ON results(fish_name);

            CREATE TABLE comments (
                id              TEXT PRIMARY KEY,
                trip_id         TEXT NOT NULL REFERENCES trips(id) ON DELETE CASCADE,
                author_id       TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                content         TEXT NOT NULL,
                created_at      TEXT NOT NULL
            );

            CREATE INDEX idx_comments_trip ON comments(trip_id, created_at);

            INSERT INTO schema_version (version) VALUES (2);
            ",
        )?;
    }

    info!("Database migrations complete");
    Ok(())
}
