use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use tracing::debug;

use smdb_gateway::identity;
use smdb_types::models::User;

use crate::auth::AppState;
use crate::error::CatalogError;

/// The actor behind a request, if the bearer token resolved to one.
#[derive(Debug, Clone, Default)]
pub struct Identity(pub Option<User>);

impl Identity {
    pub fn user(&self) -> Option<&User> {
        self.0.as_ref()
    }

    pub fn require(&self) -> Result<&User, CatalogError> {
        self.user().ok_or_else(CatalogError::unauthenticated)
    }
}

/// Resolve the optional identity from the Authorization header.
///
/// Never rejects: a missing or invalid token yields an anonymous identity and
/// the handler decides whether that is enough.
pub async fn resolve_identity(State(state): State<AppState>, mut req: Request, next: Next) -> Response {
    let user = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(identity::bearer_token)
        .and_then(|token| {
            let user = identity::resolve_user(token, &state.settings.jwt_secret);
            if user.is_none() {
                debug!("Rejected bearer token on {}", req.uri().path());
            }
            user
        });

    req.extensions_mut().insert(Identity(user));
    next.run(req).await
}
