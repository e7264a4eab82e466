use anyhow::Result;

use smdb_types::models::{ReviewPolicy, User};
use smdb_types::rating::Aggregate;

use crate::Database;
use crate::models::{MovieRow, ReviewRow};

/// A review about to be written. Ids are minted by the caller.
#[derive(Debug, Clone)]
pub struct NewReview {
    pub id: String,
    pub movie_id: String,
    pub rating: f64,
    pub comment: Option<String>,
}

#[derive(Debug, Clone)]
pub enum InsertReviewOutcome {
    Inserted(ReviewRow),
    MovieNotFound,
    /// The author already reviewed this movie and the policy allows only one.
    Duplicate,
}

/// The writes the mutation service performs.
///
/// Every write that changes a movie's review set also marks that movie's
/// aggregate stale in the same transaction; [`ReviewStore::recompute_aggregate`]
/// rebuilds the aggregate from the full review set and clears the mark.
pub trait ReviewStore: Send + Sync {
    fn insert_review(
        &self,
        review: &NewReview,
        author: &User,
        policy: ReviewPolicy,
    ) -> Result<InsertReviewOutcome>;

    /// Returns the removed row, or `None` if no review has this id.
    fn delete_review(&self, review_id: &str) -> Result<Option<ReviewRow>>;

    /// Returns `None` if the movie no longer exists.
    fn recompute_aggregate(&self, movie_id: &str) -> Result<Option<Aggregate>>;

    fn insert_movie(&self, id: &str, name: &str, tag_line: &str, description: &str) -> Result<MovieRow>;

    /// Removes the movie and all of its reviews. Returns the removed row.
    fn delete_movie(&self, movie_id: &str) -> Result<Option<MovieRow>>;
}

impl ReviewStore for Database {
    fn insert_review(
        &self,
        review: &NewReview,
        author: &User,
        policy: ReviewPolicy,
    ) -> Result<InsertReviewOutcome> {
        Database::insert_review(self, review, author, policy)
    }

    fn delete_review(&self, review_id: &str) -> Result<Option<ReviewRow>> {
        Database::delete_review(self, review_id)
    }

    fn recompute_aggregate(&self, movie_id: &str) -> Result<Option<Aggregate>> {
        Database::recompute_aggregate(self, movie_id)
    }

    fn insert_movie(&self, id: &str, name: &str, tag_line: &str, description: &str) -> Result<MovieRow> {
        Database::insert_movie(self, id, name, tag_line, description)
    }

    fn delete_movie(&self, movie_id: &str) -> Result<Option<MovieRow>> {
        Database::delete_movie(self, movie_id)
    }
}
