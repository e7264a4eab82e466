//! Database row types. These map directly to SQLite rows.
//! Conversion into `smdb-types` models happens here so callers never see raw
//! id or timestamp strings.

use chrono::{DateTime, NaiveDateTime, Utc};
use tracing::warn;
use uuid::Uuid;

use smdb_types::models::{Movie, MovieRef, Review, User};

#[derive(Debug, Clone)]
pub struct UserRow {
    pub id: String,
    pub username: String,
    pub discriminator: String,
    pub avatar: Option<String>,
    pub is_admin: bool,
    pub is_reviewer: bool,
}

#[derive(Debug, Clone)]
pub struct MovieRow {
    pub id: String,
    pub name: String,
    pub tag_line: String,
    pub description: String,
    pub rating: f64,
    pub num_reviews: u32,
    pub aggregate_stale: bool,
    pub created_at: String,
}

#[derive(Debug, Clone)]
pub struct ReviewRow {
    pub id: String,
    pub movie_id: String,
    pub user_id: String,
    pub rating: f64,
    pub comment: Option<String>,
    pub created_at: String,
}

/// A review joined to its author; `author` is `None` if the user row is gone.
#[derive(Debug, Clone)]
pub struct ReviewWithAuthorRow {
    pub review: ReviewRow,
    pub author: Option<UserRow>,
}

/// A review joined to the movie it is about.
#[derive(Debug, Clone)]
pub struct ReviewWithMovieRow {
    pub review: ReviewRow,
    pub movie_name: String,
}

impl UserRow {
    pub fn into_user(self) -> User {
        User {
            id: parse_id(&self.id, "user"),
            username: self.username,
            discriminator: self.discriminator,
            avatar: self.avatar,
            is_admin: self.is_admin,
            is_reviewer: self.is_reviewer,
        }
    }
}

impl MovieRow {
    pub fn into_movie(self) -> Movie {
        Movie {
            id: parse_id(&self.id, "movie"),
            created_at: parse_timestamp(&self.created_at, &self.id),
            name: self.name,
            tag_line: self.tag_line,
            description: self.description,
            rating: self.rating,
            num_reviews: self.num_reviews,
        }
    }
}

impl ReviewRow {
    pub fn into_review(self) -> Review {
        Review {
            id: parse_id(&self.id, "review"),
            movie_id: parse_id(&self.movie_id, "movie"),
            user_id: parse_id(&self.user_id, "user"),
            created_at: parse_timestamp(&self.created_at, &self.id),
            rating: self.rating,
            comment: self.comment,
        }
    }
}

impl ReviewWithMovieRow {
    pub fn movie_ref(&self) -> MovieRef {
        MovieRef {
            id: parse_id(&self.review.movie_id, "movie"),
            name: self.movie_name.clone(),
        }
    }
}

fn parse_id(raw: &str, kind: &str) -> Uuid {
    raw.parse().unwrap_or_else(|e| {
        warn!("Corrupt {} id '{}': {}", kind, raw, e);
        Uuid::default()
    })
}

/// Timestamps are written as RFC 3339 by the schema defaults; rows imported by
/// hand may carry SQLite's plain `YYYY-MM-DD HH:MM:SS`.
pub fn parse_timestamp(raw: &str, row_id: &str) -> DateTime<Utc> {
    raw.parse::<DateTime<Utc>>()
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S").map(|ndt| ndt.and_utc()))
        .unwrap_or_else(|e| {
            warn!("Corrupt created_at '{}' on row '{}': {}", raw, row_id, e);
            DateTime::default()
        })
}
