use axum::{
    Router,
    extract::{State, WebSocketUpgrade},
    middleware,
    response::IntoResponse,
    routing::{delete, get, post},
};

use smdb_gateway::connection;

use crate::auth::AppState;
use crate::middleware::resolve_identity;
use crate::{movies, reviews, users};

/// Every HTTP and WebSocket route of the catalog service.
pub fn router(state: AppState) -> Router {
    let catalog_routes = Router::new()
        .route("/me", get(users::me))
        .route("/users/{user_id}", get(users::get_profile))
        .route("/movies", get(movies::list_movies).post(movies::create_movie))
        .route("/movies/{movie_id}", get(movies::get_movie).delete(movies::delete_movie))
        .route("/movies/{movie_id}/reviews", post(reviews::create_review))
        .route("/reviews/{review_id}", delete(reviews::delete_review))
        .layer(middleware::from_fn_with_state(state.clone(), resolve_identity));

    Router::new()
        .route("/health", get(health))
        .route("/gateway", get(ws_upgrade))
        .merge(catalog_routes)
        .with_state(state)
}

pub async fn health() -> &'static str {
    "ok"
}

async fn ws_upgrade(State(state): State<AppState>, ws: WebSocketUpgrade) -> impl IntoResponse {
    ws.on_upgrade(move |socket| {
        connection::handle_connection(
            socket,
            state.dispatcher.clone(),
            state.db.clone(),
            state.settings.jwt_secret.clone(),
        )
    })
}
