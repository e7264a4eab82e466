//! Review and catalog mutations.
//!
//! Every mutation runs in the same order: authorize and validate, write
//! (the write also marks the movie's aggregate stale in the same
//! transaction), recompute the aggregate, then invalidate the `movies` views
//! once. Nothing is written when authorization or validation fails, and a
//! failed mutation never invalidates.

use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info, warn};
use uuid::Uuid;

use smdb_db::{InsertReviewOutcome, NewReview, ReviewStore};
use smdb_gateway::dispatcher::Dispatcher;
use smdb_types::events::MOVIES_TAG;
use smdb_types::models::{Capabilities, Movie, Review, ReviewPolicy, User};
use smdb_types::rating::{MAX_RATING, MIN_RATING, is_valid_rating};

use crate::error::{ApiResult, CatalogError};

pub const MAX_COMMENT_CHARS: usize = 2000;

#[derive(Debug, Clone)]
pub struct MutationSettings {
    pub review_policy: ReviewPolicy,
    pub require_reviewer_role: bool,
    /// Recompute attempts after a write, including the first.
    pub recompute_attempts: u32,
    /// Delay before retry `n` is `n * recompute_backoff`.
    pub recompute_backoff: Duration,
}

impl Default for MutationSettings {
    fn default() -> Self {
        Self {
            review_policy: ReviewPolicy::default(),
            require_reviewer_role: false,
            recompute_attempts: 3,
            recompute_backoff: Duration::from_millis(50),
        }
    }
}

pub struct MutationService {
    store: Arc<dyn ReviewStore>,
    dispatcher: Dispatcher,
    settings: MutationSettings,
}

impl MutationService {
    pub fn new(store: Arc<dyn ReviewStore>, dispatcher: Dispatcher, settings: MutationSettings) -> Self {
        Self {
            store,
            dispatcher,
            settings,
        }
    }

    pub fn settings(&self) -> &MutationSettings {
        &self.settings
    }

    pub async fn create_review(
        &self,
        actor: Option<&User>,
        movie_id: Uuid,
        rating: f64,
        comment: Option<String>,
    ) -> ApiResult<Review> {
        let author = actor.ok_or_else(CatalogError::unauthenticated)?;
        if !Capabilities::resolve(author, self.settings.require_reviewer_role).submit_review {
            return Err(CatalogError::Unauthorized(
                "Only reviewers can submit reviews".into(),
            ));
        }

        if !is_valid_rating(rating) {
            return Err(CatalogError::Validation(format!(
                "Rating must be between {} and {}",
                MIN_RATING, MAX_RATING
            )));
        }
        let comment = normalize_comment(comment)?;

        let review = NewReview {
            id: Uuid::new_v4().to_string(),
            movie_id: movie_id.to_string(),
            rating,
            comment,
        };
        let policy = self.settings.review_policy;
        let author_owned = author.clone();
        let outcome = self
            .blocking(move |store| store.insert_review(&review, &author_owned, policy))
            .await?;

        let row = match outcome {
            InsertReviewOutcome::Inserted(row) => row,
            InsertReviewOutcome::MovieNotFound => {
                return Err(CatalogError::NotFound(format!("Movie {} not found", movie_id)));
            }
            InsertReviewOutcome::Duplicate => {
                return Err(CatalogError::Conflict(
                    "You have already reviewed this movie".into(),
                ));
            }
        };

        info!(
            "{} reviewed movie {} with {}",
            author.handle(),
            movie_id,
            row.rating
        );

        self.recompute(&row.movie_id).await;
        self.dispatcher.invalidate(MOVIES_TAG);
        Ok(row.into_review())
    }

    pub async fn delete_review(&self, actor: Option<&User>, review_id: Uuid) -> ApiResult<Review> {
        let actor = actor.ok_or_else(CatalogError::unauthenticated)?;
        if !Capabilities::resolve(actor, self.settings.require_reviewer_role).delete_review {
            return Err(CatalogError::Unauthorized(
                "Only admins can delete reviews".into(),
            ));
        }

        let id = review_id.to_string();
        let removed = self
            .blocking(move |store| store.delete_review(&id))
            .await?
            .ok_or_else(|| CatalogError::NotFound(format!("Review {} not found", review_id)))?;

        info!(
            "{} deleted review {} on movie {}",
            actor.handle(),
            review_id,
            removed.movie_id
        );

        self.recompute(&removed.movie_id).await;
        self.dispatcher.invalidate(MOVIES_TAG);
        Ok(removed.into_review())
    }

    pub async fn create_movie(
        &self,
        actor: Option<&User>,
        name: &str,
        tag_line: &str,
        description: &str,
    ) -> ApiResult<Movie> {
        self.require_curator(actor)?;

        let name = name.trim().to_string();
        if name.is_empty() {
            return Err(CatalogError::Validation("Movie name cannot be empty".into()));
        }
        let tag_line = tag_line.trim().to_string();
        let description = description.trim().to_string();

        let id = Uuid::new_v4().to_string();
        let row = self
            .blocking(move |store| store.insert_movie(&id, &name, &tag_line, &description))
            .await?;

        info!("Created movie {} ({})", row.name, row.id);
        self.dispatcher.invalidate(MOVIES_TAG);
        Ok(row.into_movie())
    }

    pub async fn delete_movie(&self, actor: Option<&User>, movie_id: Uuid) -> ApiResult<Movie> {
        self.require_curator(actor)?;

        let id = movie_id.to_string();
        let removed = self
            .blocking(move |store| store.delete_movie(&id))
            .await?
            .ok_or_else(|| CatalogError::NotFound(format!("Movie {} not found", movie_id)))?;

        self.dispatcher.invalidate(MOVIES_TAG);
        Ok(removed.into_movie())
    }

    fn require_curator(&self, actor: Option<&User>) -> ApiResult<()> {
        let actor = actor.ok_or_else(CatalogError::unauthenticated)?;
        if !Capabilities::resolve(actor, self.settings.require_reviewer_role).manage_catalog {
            return Err(CatalogError::Unauthorized(
                "Only admins can manage the catalog".into(),
            ));
        }
        Ok(())
    }

    /// Rebuild a movie's aggregate after a committed write.
    ///
    /// Transient failures are retried with linear backoff. When every attempt
    /// fails the movie stays marked stale: reads repair it on the fly and the
    /// background repair loop persists it later.
    async fn recompute(&self, movie_id: &str) {
        let attempts = self.settings.recompute_attempts.max(1);

        for attempt in 1..=attempts {
            let id = movie_id.to_string();
            let result = self.blocking_raw(move |store| store.recompute_aggregate(&id)).await;

            match result {
                Ok(_) => return,
                Err(e) if smdb_db::is_transient(&e) && attempt < attempts => {
                    warn!(
                        "Recompute of movie {} failed (attempt {}/{}): {}",
                        movie_id, attempt, attempts, e
                    );
                    tokio::time::sleep(self.settings.recompute_backoff * attempt).await;
                }
                Err(e) => {
                    warn!(
                        "Giving up recompute of movie {} after {} attempt(s), left stale: {:#}",
                        movie_id, attempt, e
                    );
                    return;
                }
            }
        }
    }

    async fn blocking<F, T>(&self, f: F) -> ApiResult<T>
    where
        F: FnOnce(&dyn ReviewStore) -> anyhow::Result<T> + Send + 'static,
        T: Send + 'static,
    {
        self.blocking_raw(f).await.map_err(CatalogError::from_store)
    }

    async fn blocking_raw<F, T>(&self, f: F) -> anyhow::Result<T>
    where
        F: FnOnce(&dyn ReviewStore) -> anyhow::Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let store = self.store.clone();
        tokio::task::spawn_blocking(move || f(store.as_ref()))
            .await
            .map_err(|e| {
                error!("spawn_blocking join error: {}", e);
                anyhow::anyhow!("store task failed: {}", e)
            })?
    }
}

/// Trim a comment; blank becomes `None`.
fn normalize_comment(comment: Option<String>) -> ApiResult<Option<String>> {
    let Some(comment) = comment else {
        return Ok(None);
    };
    let trimmed = comment.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    if trimmed.chars().count() > MAX_COMMENT_CHARS {
        return Err(CatalogError::Validation(format!(
            "Comment cannot exceed {} characters",
            MAX_COMMENT_CHARS
        )));
    }
    Ok(Some(trimmed.to_string()))
}
