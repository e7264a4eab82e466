use axum::{
    Extension, Json,
    extract::{
        Path, State,
        rejection::{JsonRejection, PathRejection},
    },
    http::StatusCode,
    response::IntoResponse,
};
use uuid::Uuid;

use smdb_types::api::{CreateReviewRequest, ReviewResponse};

use crate::auth::AppState;
use crate::error::ApiResult;
use crate::middleware::Identity;

pub async fn create_review(
    State(state): State<AppState>,
    movie_id: Result<Path<Uuid>, PathRejection>,
    Extension(identity): Extension<Identity>,
    req: Result<Json<CreateReviewRequest>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let Path(movie_id) = movie_id?;
    let Json(req) = req?;
    let review = state
        .mutations
        .create_review(identity.user(), movie_id, req.rating, req.comment)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(ReviewResponse::new(review, identity.user())),
    ))
}

pub async fn delete_review(
    State(state): State<AppState>,
    review_id: Result<Path<Uuid>, PathRejection>,
    Extension(identity): Extension<Identity>,
) -> ApiResult<StatusCode> {
    let Path(review_id) = review_id?;
    state.mutations.delete_review(identity.user(), review_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
