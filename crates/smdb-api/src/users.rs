use axum::{
    Extension, Json,
    extract::{Path, State, rejection::PathRejection},
};
use uuid::Uuid;

use smdb_types::api::{MeResponse, UserProfileResponse, UserReviewResponse, UserSummary};
use smdb_types::models::Capabilities;

use crate::auth::AppState;
use crate::error::{ApiResult, CatalogError};
use crate::middleware::Identity;

/// The actor's own record with the capabilities the interface should offer.
pub async fn me(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
) -> ApiResult<Json<MeResponse>> {
    let user = identity.require()?;
    let capabilities = Capabilities::resolve(user, state.settings.require_reviewer_role);

    Ok(Json(MeResponse {
        user: UserSummary::from(user),
        is_admin: user.is_admin,
        is_reviewer: user.is_reviewer,
        capabilities,
        view_only: capabilities.is_view_only(),
    }))
}

pub async fn get_profile(
    State(state): State<AppState>,
    user_id: Result<Path<Uuid>, PathRejection>,
    Extension(identity): Extension<Identity>,
) -> ApiResult<Json<UserProfileResponse>> {
    identity.require()?;
    let Path(user_id) = user_id?;

    let id = user_id.to_string();
    let (user, reviews) = state
        .read(move |db| {
            let Some(user) = db.get_user(&id)? else {
                return Ok(None);
            };
            let reviews = db.get_reviews_by_user(&id)?;
            Ok(Some((user, reviews)))
        })
        .await?
        .ok_or_else(|| CatalogError::NotFound(format!("User {} not found", user_id)))?;

    let user = user.into_user();
    let reviews = reviews
        .into_iter()
        .map(|row| {
            let movie = row.movie_ref();
            let review = row.review.into_review();
            UserReviewResponse {
                id: review.id,
                rating: review.rating,
                comment: review.comment,
                created_at: review.created_at,
                movie,
            }
        })
        .collect();

    Ok(Json(UserProfileResponse {
        user: UserSummary::from(&user),
        reviews,
    }))
}
