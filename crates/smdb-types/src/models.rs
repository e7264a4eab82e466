use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A user record as resolved by the identity provider.
///
/// Reviews reference users by id; the user does not know about its reviews.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub discriminator: String,
    pub avatar: Option<String>,
    pub is_admin: bool,
    pub is_reviewer: bool,
}

impl User {
    /// `username#discriminator`, the handle shown next to a review.
    pub fn handle(&self) -> String {
        format!("{}#{}", self.username, self.discriminator)
    }
}

/// The role flags of an actor resolved into the operations it may perform.
///
/// The same set drives interface gating (`/me`) and mutation authorization,
/// so a capability hidden in the interface is also refused by the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capabilities {
    pub view_catalog: bool,
    pub submit_review: bool,
    pub delete_review: bool,
    pub manage_catalog: bool,
}

impl Capabilities {
    /// Resolve the capability set of `user`.
    ///
    /// When `require_reviewer_role` is set, only admins and reviewers may
    /// submit reviews; everyone else is in view-only mode.
    pub fn resolve(user: &User, require_reviewer_role: bool) -> Self {
        Self {
            view_catalog: true,
            submit_review: !require_reviewer_role || user.is_admin || user.is_reviewer,
            delete_review: user.is_admin,
            manage_catalog: user.is_admin,
        }
    }

    pub fn is_view_only(&self) -> bool {
        !self.submit_review
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Movie {
    pub id: Uuid,
    pub name: String,
    pub tag_line: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
    /// Derived from the movie's reviews, never written directly.
    pub rating: f64,
    pub num_reviews: u32,
}

/// Lightweight movie reference carried by review intents and user profiles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovieRef {
    pub id: Uuid,
    pub name: String,
}

impl From<&Movie> for MovieRef {
    fn from(movie: &Movie) -> Self {
        Self {
            id: movie.id,
            name: movie.name.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Review {
    pub id: Uuid,
    pub movie_id: Uuid,
    pub user_id: Uuid,
    pub rating: f64,
    pub comment: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Whether one user may review the same movie more than once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewPolicy {
    #[default]
    OnePerUser,
    AllowMultiple,
}

impl std::str::FromStr for ReviewPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "one_per_user" => Ok(Self::OnePerUser),
            "allow_multiple" => Ok(Self::AllowMultiple),
            other => Err(format!("unknown review policy '{}'", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(is_admin: bool, is_reviewer: bool) -> User {
        User {
            id: Uuid::new_v4(),
            username: "gill".into(),
            discriminator: "0420".into(),
            avatar: None,
            is_admin,
            is_reviewer,
        }
    }

    #[test]
    fn admin_has_every_capability() {
        let caps = Capabilities::resolve(&user(true, false), true);
        assert!(caps.view_catalog && caps.submit_review && caps.delete_review && caps.manage_catalog);
        assert!(!caps.is_view_only());
    }

    #[test]
    fn plain_user_is_view_only_when_reviewer_role_required() {
        let caps = Capabilities::resolve(&user(false, false), true);
        assert!(caps.view_catalog);
        assert!(!caps.submit_review);
        assert!(!caps.delete_review);
        assert!(caps.is_view_only());

        let open = Capabilities::resolve(&user(false, false), false);
        assert!(open.submit_review);
        assert!(!open.delete_review);
    }

    #[test]
    fn reviewer_cannot_delete() {
        let caps = Capabilities::resolve(&user(false, true), true);
        assert!(caps.submit_review);
        assert!(!caps.delete_review);
        assert!(!caps.manage_catalog);
    }

    #[test]
    fn review_policy_parses() {
        assert_eq!("one_per_user".parse::<ReviewPolicy>(), Ok(ReviewPolicy::OnePerUser));
        assert_eq!("allow_multiple".parse::<ReviewPolicy>(), Ok(ReviewPolicy::AllowMultiple));
        assert!("sometimes".parse::<ReviewPolicy>().is_err());
    }

    #[test]
    fn handle_joins_name_and_discriminator() {
        assert_eq!(user(false, false).handle(), "gill#0420");
    }
}
