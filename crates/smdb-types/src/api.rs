use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::links::{avatar_url, share_link};
use crate::models::{Capabilities, Movie, MovieRef, Review, User};
use crate::rating::{Heart, RatingDisplay, hearts};

// -- Identity --

/// Claims of the bearer tokens issued by the identity provider.
///
/// The token carries the whole user record, role flags included; the service
/// trusts it once the signature checks out.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub username: String,
    pub discriminator: String,
    #[serde(default)]
    pub avatar: Option<String>,
    #[serde(default)]
    pub is_admin: bool,
    #[serde(default)]
    pub is_reviewer: bool,
    pub exp: usize,
}

impl Claims {
    pub fn into_user(self) -> User {
        User {
            id: self.sub,
            username: self.username,
            discriminator: self.discriminator,
            avatar: self.avatar,
            is_admin: self.is_admin,
            is_reviewer: self.is_reviewer,
        }
    }
}

// -- Errors --

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub status: u16,
    pub message: String,
}

// -- Users --

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserSummary {
    pub id: Uuid,
    pub username: String,
    pub discriminator: String,
    pub avatar_url: String,
}

impl From<&User> for UserSummary {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            discriminator: user.discriminator.clone(),
            avatar_url: avatar_url(user),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeResponse {
    pub user: UserSummary,
    pub is_admin: bool,
    pub is_reviewer: bool,
    pub capabilities: Capabilities,
    pub view_only: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserReviewResponse {
    pub id: Uuid,
    pub rating: f64,
    pub comment: Option<String>,
    pub created_at: DateTime<Utc>,
    pub movie: MovieRef,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfileResponse {
    pub user: UserSummary,
    pub reviews: Vec<UserReviewResponse>,
}

// -- Movies --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateMovieRequest {
    pub name: String,
    #[serde(default)]
    pub tag_line: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MovieResponse {
    #[serde(flatten)]
    pub movie: Movie,
    pub rating_display: String,
    pub hearts: Option<Vec<Heart>>,
    pub share_link: String,
}

impl MovieResponse {
    pub fn new(movie: Movie, base_url: &str) -> Self {
        let rating_display = RatingDisplay::new(movie.rating, movie.num_reviews).to_string();
        let hearts = hearts(movie.rating, movie.num_reviews).map(|row| row.to_vec());
        let share_link = share_link(base_url, &movie.id);
        Self {
            movie,
            rating_display,
            hearts,
            share_link,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MovieDetailResponse {
    #[serde(flatten)]
    pub movie: MovieResponse,
    pub reviews: Vec<ReviewResponse>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteMovieResponse {
    pub id: Uuid,
    pub name: String,
}

// -- Reviews --

pub const NO_COMMENT: &str = "No comment provided...";

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateReviewRequest {
    pub rating: f64,
    #[serde(default)]
    pub comment: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewResponse {
    pub id: Uuid,
    pub movie_id: Uuid,
    pub rating: f64,
    pub comment: Option<String>,
    /// `comment`, or a placeholder when the review has none.
    pub comment_display: String,
    pub created_at: DateTime<Utc>,
    /// `None` when the author's record is no longer in the users table.
    pub author: Option<UserSummary>,
}

impl ReviewResponse {
    pub fn new(review: Review, author: Option<&User>) -> Self {
        Self {
            id: review.id,
            movie_id: review.movie_id,
            rating: review.rating,
            comment_display: review
                .comment
                .clone()
                .filter(|c| !c.trim().is_empty())
                .unwrap_or_else(|| NO_COMMENT.to_string()),
            comment: review.comment,
            created_at: review.created_at,
            author: author.map(UserSummary::from),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn review(comment: Option<&str>) -> Review {
        Review {
            id: Uuid::new_v4(),
            movie_id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            rating: 7.0,
            comment: comment.map(str::to_string),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn empty_comment_gets_placeholder() {
        assert_eq!(ReviewResponse::new(review(None), None).comment_display, NO_COMMENT);
        assert_eq!(ReviewResponse::new(review(Some("  ")), None).comment_display, NO_COMMENT);
        assert_eq!(ReviewResponse::new(review(Some("Great")), None).comment_display, "Great");
    }

    #[test]
    fn movie_without_reviews_has_no_hearts() {
        let movie = Movie {
            id: Uuid::new_v4(),
            name: "Heat".into(),
            tag_line: String::new(),
            description: String::new(),
            created_at: Utc::now(),
            rating: 0.0,
            num_reviews: 0,
        };
        let response = MovieResponse::new(movie, "http://localhost:3000/");
        assert_eq!(response.rating_display, "No reviews");
        assert!(response.hearts.is_none());
        assert!(response.share_link.starts_with("http://localhost:3000/?movieID="));
    }
}
