use axum::{
    Extension, Json,
    extract::{
        Path, State,
        rejection::{JsonRejection, PathRejection},
    },
    http::StatusCode,
    response::IntoResponse,
};
use serde_json::Value;
use uuid::Uuid;

use smdb_types::api::{
    CreateMovieRequest, DeleteMovieResponse, MovieDetailResponse, MovieResponse, ReviewResponse,
};
use smdb_types::events::MOVIES_TAG;

use crate::auth::AppState;
use crate::error::{ApiResult, CatalogError};
use crate::middleware::Identity;

const LIST_KEY: &str = "movies:list";

fn detail_key(movie_id: &Uuid) -> String {
    format!("movies:{}", movie_id)
}

fn to_view<T: serde::Serialize>(view: &T) -> ApiResult<Value> {
    serde_json::to_value(view).map_err(|e| CatalogError::Internal(format!("Failed to encode view: {}", e)))
}

pub async fn list_movies(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
) -> ApiResult<Json<Value>> {
    identity.require()?;

    let fetch_state = state.clone();
    let view = state
        .views
        .get_or_fetch(MOVIES_TAG, LIST_KEY, || async move {
            let rows = fetch_state.read(|db| db.list_movies()).await?;
            let base_url = &fetch_state.settings.base_url;
            let movies: Vec<MovieResponse> = rows
                .into_iter()
                .map(|row| MovieResponse::new(row.into_movie(), base_url))
                .collect();
            to_view(&movies)
        })
        .await?;

    Ok(Json(Value::clone(&view)))
}

pub async fn get_movie(
    State(state): State<AppState>,
    movie_id: Result<Path<Uuid>, PathRejection>,
    Extension(identity): Extension<Identity>,
) -> ApiResult<Json<Value>> {
    identity.require()?;
    let Path(movie_id) = movie_id?;

    let fetch_state = state.clone();
    let view = state
        .views
        .get_or_fetch(MOVIES_TAG, &detail_key(&movie_id), || async move {
            let id = movie_id.to_string();
            let (movie, reviews) = fetch_state
                .read(move |db| db.get_movie_detail(&id))
                .await?
                .ok_or_else(|| CatalogError::NotFound(format!("Movie {} not found", movie_id)))?;

            let reviews = reviews
                .into_iter()
                .map(|row| {
                    let author = row.author.map(|a| a.into_user());
                    ReviewResponse::new(row.review.into_review(), author.as_ref())
                })
                .collect();
            to_view(&MovieDetailResponse {
                movie: MovieResponse::new(movie.into_movie(), &fetch_state.settings.base_url),
                reviews,
            })
        })
        .await?;

    Ok(Json(Value::clone(&view)))
}

pub async fn create_movie(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    req: Result<Json<CreateMovieRequest>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let Json(req) = req?;
    let movie = state
        .mutations
        .create_movie(identity.user(), &req.name, &req.tag_line, &req.description)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(MovieResponse::new(movie, &state.settings.base_url)),
    ))
}

pub async fn delete_movie(
    State(state): State<AppState>,
    movie_id: Result<Path<Uuid>, PathRejection>,
    Extension(identity): Extension<Identity>,
) -> ApiResult<Json<DeleteMovieResponse>> {
    let Path(movie_id) = movie_id?;
    let movie = state.mutations.delete_movie(identity.user(), movie_id).await?;

    Ok(Json(DeleteMovieResponse {
        id: movie.id,
        name: movie.name,
    }))
}
