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
        info!("Running migration v1 (initial schema)");
        conn.execute_batch(
            "
            CREATE TABLE users (
                id              TEXT PRIMARY KEY,
                username        TEXT NOT NULL,
                discriminator   TEXT NOT NULL,
                avatar          TEXT,
                is_admin        INTEGER NOT NULL DEFAULT 0,
                is_reviewer     INTEGER NOT NULL DEFAULT 0,
                updated_at      TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
            );

            CREATE TABLE movies (
                id              TEXT PRIMARY KEY,
                name            TEXT NOT NULL,
                tag_line        TEXT NOT NULL DEFAULT '',
                description     TEXT NOT NULL DEFAULT '',
                rating          REAL NOT NULL DEFAULT 0,
                num_reviews     INTEGER NOT NULL DEFAULT 0,
                aggregate_stale INTEGER NOT NULL DEFAULT 0,
                created_at      TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
            );

            CREATE TABLE reviews (
                id          TEXT PRIMARY KEY,
                movie_id    TEXT NOT NULL REFERENCES movies(id) ON DELETE CASCADE,
                user_id     TEXT NOT NULL REFERENCES users(id),
                rating      REAL NOT NULL CHECK (rating >= 0 AND rating <= 10),
                comment     TEXT,
                created_at  TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
            );

            CREATE INDEX idx_reviews_movie ON reviews(movie_id, created_at);
            CREATE INDEX idx_reviews_user_movie ON reviews(user_id, movie_id);
            CREATE INDEX idx_movies_stale ON movies(aggregate_stale) WHERE aggregate_stale = 1;

            INSERT INTO schema_version (version) VALUES (1);
            ",
        )?;
    }

    info!("Database migrations complete");
    Ok(())
}
