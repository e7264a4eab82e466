use crate::models::{MovieRow, ReviewRow, ReviewWithAuthorRow, ReviewWithMovieRow, UserRow};
use crate::store::{InsertReviewOutcome, NewReview};
use crate::Database;
use anyhow::{Result, anyhow};
use rusqlite::{Connection, TransactionBehavior};
use tracing::info;

use smdb_types::models::{ReviewPolicy, User};
use smdb_types::rating::Aggregate;

const MOVIE_COLUMNS: &str =
    "id, name, tag_line, description, rating, num_reviews, aggregate_stale, created_at";
const REVIEW_COLUMNS: &str = "id, movie_id, user_id, rating, comment, created_at";

impl Database {
    // -- Users --

    pub fn upsert_user(&self, user: &User) -> Result<()> {
        self.with_conn_mut(|conn| upsert_user(conn, user))
    }

    pub fn get_user(&self, id: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, id))
    }

    // -- Movies --

    pub fn insert_movie(
        &self,
        id: &str,
        name: &str,
        tag_line: &str,
        description: &str,
    ) -> Result<MovieRow> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO movies (id, name, tag_line, description) VALUES (?1, ?2, ?3, ?4)",
                (id, name, tag_line, description),
            )?;
            query_movie(conn, id)?.ok_or_else(|| anyhow!("Movie vanished after insert: {}", id))
        })
    }

    /// Fetch one movie. Stale aggregates are recomputed on the fly.
    pub fn get_movie(&self, id: &str) -> Result<Option<MovieRow>> {
        self.with_conn(|conn| {
            let tx = conn.unchecked_transaction()?;
            let movie = query_movie(&tx, id)?.map(|row| read_repair(&tx, row)).transpose()?;
            tx.commit()?;
            Ok(movie)
        })
    }

    /// All movies, newest first. Stale aggregates are recomputed on the fly.
    pub fn list_movies(&self) -> Result<Vec<MovieRow>> {
        self.with_conn(|conn| {
            let tx = conn.unchecked_transaction()?;
            let rows = query_movies(&tx)?
                .into_iter()
                .map(|row| read_repair(&tx, row))
                .collect::<Result<Vec<_>>>()?;
            tx.commit()?;
            Ok(rows)
        })
    }

    /// A movie together with its reviews, read from one snapshot so the
    /// aggregate always matches the review list.
    pub fn get_movie_detail(
        &self,
        id: &str,
    ) -> Result<Option<(MovieRow, Vec<ReviewWithAuthorRow>)>> {
        self.with_conn(|conn| {
            let tx = conn.unchecked_transaction()?;
            let detail = match query_movie(&tx, id)? {
                Some(row) => {
                    let movie = read_repair(&tx, row)?;
                    let reviews = query_reviews_for_movie(&tx, id)?;
                    Some((movie, reviews))
                }
                None => None,
            };
            tx.commit()?;
            Ok(detail)
        })
    }

    pub fn delete_movie(&self, id: &str) -> Result<Option<MovieRow>> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            let Some(row) = query_movie(&tx, id)? else {
                return Ok(None);
            };
            let removed = tx.execute("DELETE FROM reviews WHERE movie_id = ?1", [id])?;
            tx.execute("DELETE FROM movies WHERE id = ?1", [id])?;
            tx.commit()?;

            info!("Deleted movie {} ({}) with {} reviews", row.name, id, removed);
            Ok(Some(row))
        })
    }

    // -- Reviews --

    /// Write a review and mark its movie's aggregate stale, atomically.
    ///
    /// The author's user record is upserted in the same transaction so the
    /// review can always be joined to a name.
    pub fn insert_review(
        &self,
        review: &NewReview,
        author: &User,
        policy: ReviewPolicy,
    ) -> Result<InsertReviewOutcome> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

            let movie_exists: bool = tx.query_row(
                "SELECT EXISTS(SELECT 1 FROM movies WHERE id = ?1)",
                [&review.movie_id],
                |row| row.get(0),
            )?;
            if !movie_exists {
                return Ok(InsertReviewOutcome::MovieNotFound);
            }

            if policy == ReviewPolicy::OnePerUser {
                let already: bool = tx.query_row(
                    "SELECT EXISTS(SELECT 1 FROM reviews WHERE movie_id = ?1 AND user_id = ?2)",
                    rusqlite::params![review.movie_id, author.id.to_string()],
                    |row| row.get(0),
                )?;
                if already {
                    return Ok(InsertReviewOutcome::Duplicate);
                }
            }

            upsert_user(&tx, author)?;
            tx.execute(
                "INSERT INTO reviews (id, movie_id, user_id, rating, comment) VALUES (?1, ?2, ?3, ?4, ?5)",
                rusqlite::params![
                    review.id,
                    review.movie_id,
                    author.id.to_string(),
                    review.rating,
                    review.comment
                ],
            )?;
            mark_stale(&tx, &review.movie_id)?;

            let row = query_review(&tx, &review.id)?
                .ok_or_else(|| anyhow!("Review vanished after insert: {}", review.id))?;
            tx.commit()?;
            Ok(InsertReviewOutcome::Inserted(row))
        })
    }

    pub fn get_review(&self, id: &str) -> Result<Option<ReviewRow>> {
        self.with_conn(|conn| query_review(conn, id))
    }

    /// Remove a review and mark its movie's aggregate stale, atomically.
    pub fn delete_review(&self, id: &str) -> Result<Option<ReviewRow>> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            let Some(row) = query_review(&tx, id)? else {
                return Ok(None);
            };
            tx.execute("DELETE FROM reviews WHERE id = ?1", [id])?;
            mark_stale(&tx, &row.movie_id)?;
            tx.commit()?;
            Ok(Some(row))
        })
    }

    pub fn get_reviews_for_movie(&self, movie_id: &str) -> Result<Vec<ReviewWithAuthorRow>> {
        self.with_conn(|conn| query_reviews_for_movie(conn, movie_id))
    }

    pub fn get_reviews_by_user(&self, user_id: &str) -> Result<Vec<ReviewWithMovieRow>> {
        self.with_conn(|conn| query_reviews_by_user(conn, user_id))
    }

    // -- Aggregates --

    /// Rebuild one movie's aggregate from its full review set and clear the
    /// stale mark. Returns `None` if the movie does not exist.
    pub fn recompute_aggregate(&self, movie_id: &str) -> Result<Option<Aggregate>> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            let movie_exists: bool = tx.query_row(
                "SELECT EXISTS(SELECT 1 FROM movies WHERE id = ?1)",
                [movie_id],
                |row| row.get(0),
            )?;
            if !movie_exists {
                return Ok(None);
            }
            let aggregate = store_aggregate(&tx, movie_id)?;
            tx.commit()?;
            Ok(Some(aggregate))
        })
    }

    /// Aggregate computed from scratch over the review store, without
    /// touching the cached projection.
    pub fn compute_aggregate(&self, movie_id: &str) -> Result<Aggregate> {
        self.with_conn(|conn| aggregate_for(conn, movie_id))
    }

    pub fn stale_movie_ids(&self) -> Result<Vec<String>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT id FROM movies WHERE aggregate_stale = 1")?;
            let ids = stmt
                .query_map([], |row| row.get::<_, String>(0))?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(ids)
        })
    }

    /// Persist fresh aggregates for every movie marked stale.
    pub fn repair_stale_aggregates(&self) -> Result<usize> {
        let stale = self.stale_movie_ids()?;
        let mut repaired = 0;
        for id in &stale {
            if self.recompute_aggregate(id)?.is_some() {
                repaired += 1;
            }
        }
        Ok(repaired)
    }

    /// Rebuild the whole projection from the review store.
    pub fn rebuild_all_aggregates(&self) -> Result<usize> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            let ids = {
                let mut stmt = tx.prepare("SELECT id FROM movies")?;
                let ids = stmt
                    .query_map([], |row| row.get::<_, String>(0))?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                ids
            };
            for id in &ids {
                store_aggregate(&tx, id)?;
            }
            tx.commit()?;
            Ok(ids.len())
        })
    }
}

fn upsert_user(conn: &Connection, user: &User) -> Result<()> {
    conn.execute(
        "INSERT INTO users (id, username, discriminator, avatar, is_admin, is_reviewer)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)
         ON CONFLICT(id) DO UPDATE SET
             username = excluded.username,
             discriminator = excluded.discriminator,
             avatar = excluded.avatar,
             is_admin = excluded.is_admin,
             is_reviewer = excluded.is_reviewer,
             updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')",
        rusqlite::params![
            user.id.to_string(),
            user.username,
            user.discriminator,
            user.avatar,
            user.is_admin,
            user.is_reviewer
        ],
    )?;
    Ok(())
}

fn query_user(conn: &Connection, id: &str) -> Result<Option<UserRow>> {
    let row = conn
        .query_row(
            "SELECT id, username, discriminator, avatar, is_admin, is_reviewer FROM users WHERE id = ?1",
            [id],
            |row| {
                Ok(UserRow {
                    id: row.get(0)?,
                    username: row.get(1)?,
                    discriminator: row.get(2)?,
                    avatar: row.get(3)?,
                    is_admin: row.get(4)?,
                    is_reviewer: row.get(5)?,
                })
            },
        )
        .optional()?;
    Ok(row)
}

fn movie_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<MovieRow> {
    Ok(MovieRow {
        id: row.get(0)?,
        name: row.get(1)?,
        tag_line: row.get(2)?,
        description: row.get(3)?,
        rating: row.get(4)?,
        num_reviews: row.get(5)?,
        aggregate_stale: row.get(6)?,
        created_at: row.get(7)?,
    })
}

fn review_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<ReviewRow> {
    Ok(ReviewRow {
        id: row.get(0)?,
        movie_id: row.get(1)?,
        user_id: row.get(2)?,
        rating: row.get(3)?,
        comment: row.get(4)?,
        created_at: row.get(5)?,
    })
}

fn query_movie(conn: &Connection, id: &str) -> Result<Option<MovieRow>> {
    let sql = format!("SELECT {} FROM movies WHERE id = ?1", MOVIE_COLUMNS);
    let row = conn.query_row(&sql, [id], movie_from_row).optional()?;
    Ok(row)
}

fn query_movies(conn: &Connection) -> Result<Vec<MovieRow>> {
    let sql = format!("SELECT {} FROM movies ORDER BY created_at DESC, id", MOVIE_COLUMNS);
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([], movie_from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

fn query_review(conn: &Connection, id: &str) -> Result<Option<ReviewRow>> {
    let sql = format!("SELECT {} FROM reviews WHERE id = ?1", REVIEW_COLUMNS);
    let row = conn.query_row(&sql, [id], review_from_row).optional()?;
    Ok(row)
}

fn query_reviews_for_movie(conn: &Connection, movie_id: &str) -> Result<Vec<ReviewWithAuthorRow>> {
    // LEFT JOIN so a review survives a missing author row
    let mut stmt = conn.prepare(
        "SELECT r.id, r.movie_id, r.user_id, r.rating, r.comment, r.created_at,
                u.id, u.username, u.discriminator, u.avatar, u.is_admin, u.is_reviewer
         FROM reviews r
         LEFT JOIN users u ON r.user_id = u.id
         WHERE r.movie_id = ?1
         ORDER BY r.created_at DESC, r.id",
    )?;

    let rows = stmt
        .query_map([movie_id], |row| {
            let review = review_from_row(row)?;
            let author = match row.get::<_, Option<String>>(6)? {
                Some(id) => Some(UserRow {
                    id,
                    username: row.get(7)?,
                    discriminator: row.get(8)?,
                    avatar: row.get(9)?,
                    is_admin: row.get(10)?,
                    is_reviewer: row.get(11)?,
                }),
                None => None,
            };
            Ok(ReviewWithAuthorRow { review, author })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(rows)
}

fn query_reviews_by_user(conn: &Connection, user_id: &str) -> Result<Vec<ReviewWithMovieRow>> {
    let mut stmt = conn.prepare(
        "SELECT r.id, r.movie_id, r.user_id, r.rating, r.comment, r.created_at, m.name
         FROM reviews r
         JOIN movies m ON r.movie_id = m.id
         WHERE r.user_id = ?1
         ORDER BY r.created_at DESC, r.id",
    )?;

    let rows = stmt
        .query_map([user_id], |row| {
            Ok(ReviewWithMovieRow {
                review: review_from_row(row)?,
                movie_name: row.get(6)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(rows)
}

fn mark_stale(conn: &Connection, movie_id: &str) -> Result<()> {
    conn.execute("UPDATE movies SET aggregate_stale = 1 WHERE id = ?1", [movie_id])?;
    Ok(())
}

fn aggregate_for(conn: &Connection, movie_id: &str) -> Result<Aggregate> {
    let mut stmt = conn.prepare("SELECT rating FROM reviews WHERE movie_id = ?1")?;
    let ratings = stmt
        .query_map([movie_id], |row| row.get::<_, f64>(0))?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(Aggregate::from_ratings(ratings))
}

fn store_aggregate(conn: &Connection, movie_id: &str) -> Result<Aggregate> {
    let aggregate = aggregate_for(conn, movie_id)?;
    conn.execute(
        "UPDATE movies SET rating = ?2, num_reviews = ?3, aggregate_stale = 0 WHERE id = ?1",
        rusqlite::params![movie_id, aggregate.rating, aggregate.num_reviews],
    )?;
    Ok(aggregate)
}

/// Serve a correct aggregate for a movie whose stored one is stale. Nothing
/// is written; the repair loop or the next recompute persists it.
fn read_repair(conn: &Connection, mut row: MovieRow) -> Result<MovieRow> {
    if row.aggregate_stale {
        let aggregate = aggregate_for(conn, &row.id)?;
        row.rating = aggregate.rating;
        row.num_reviews = aggregate.num_reviews;
    }
    Ok(row)
}

/// Extension trait for optional query results
trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
