use std::sync::Arc;
use std::time::Duration;

use jsonwebtoken::{EncodingKey, Header, encode};
use tracing::error;

use smdb_db::{Database, ReviewStore};
use smdb_gateway::cache::ViewCache;
use smdb_gateway::dispatcher::Dispatcher;
use smdb_types::api::Claims;
use smdb_types::models::{ReviewPolicy, User};

use crate::error::{ApiResult, CatalogError};
use crate::mutations::{MutationService, MutationSettings};

pub type AppState = Arc<AppStateInner>;

/// Everything the API needs that is not read from the store.
#[derive(Debug, Clone)]
pub struct ApiSettings {
    pub jwt_secret: String,
    /// Prefix of share links.
    pub base_url: String,
    pub review_policy: ReviewPolicy,
    pub require_reviewer_role: bool,
    pub recompute_attempts: u32,
    pub recompute_backoff: Duration,
}

impl ApiSettings {
    pub fn new(jwt_secret: impl Into<String>, base_url: impl Into<String>) -> Self {
        let defaults = MutationSettings::default();
        Self {
            jwt_secret: jwt_secret.into(),
            base_url: base_url.into(),
            review_policy: defaults.review_policy,
            require_reviewer_role: defaults.require_reviewer_role,
            recompute_attempts: defaults.recompute_attempts,
            recompute_backoff: defaults.recompute_backoff,
        }
    }

    fn mutation_settings(&self) -> MutationSettings {
        MutationSettings {
            review_policy: self.review_policy,
            require_reviewer_role: self.require_reviewer_role,
            recompute_attempts: self.recompute_attempts,
            recompute_backoff: self.recompute_backoff,
        }
    }
}

pub struct AppStateInner {
    pub db: Arc<Database>,
    pub mutations: MutationService,
    pub dispatcher: Dispatcher,
    pub views: ViewCache,
    pub settings: ApiSettings,
}

impl AppStateInner {
    pub fn new(db: Arc<Database>, dispatcher: Dispatcher, settings: ApiSettings) -> AppState {
        let store: Arc<dyn ReviewStore> = db.clone();
        Self::with_store(db, store, dispatcher, settings)
    }

    /// Like [`AppStateInner::new`] but mutations go through `store`, which
    /// must write to the same database `db` reads from.
    pub fn with_store(
        db: Arc<Database>,
        store: Arc<dyn ReviewStore>,
        dispatcher: Dispatcher,
        settings: ApiSettings,
    ) -> AppState {
        let views = ViewCache::new();
        dispatcher.attach_cache(views.clone());
        let mutations = MutationService::new(store, dispatcher.clone(), settings.mutation_settings());

        Arc::new(Self {
            db,
            mutations,
            dispatcher,
            views,
            settings,
        })
    }

    /// Run a blocking store read off the async runtime.
    pub async fn read<F, T>(&self, f: F) -> ApiResult<T>
    where
        F: FnOnce(&Database) -> anyhow::Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let db = self.db.clone();
        tokio::task::spawn_blocking(move || f(&db))
            .await
            .map_err(|e| {
                error!("spawn_blocking join error: {}", e);
                CatalogError::Internal("Store task failed".into())
            })?
            .map_err(CatalogError::from_store)
    }
}

/// Mint a token the way the identity provider does. The service itself never
/// issues tokens to clients; this exists for the provider integration and for
/// tests.
pub fn create_token(secret: &str, user: &User, ttl: chrono::Duration) -> anyhow::Result<String> {
    let claims = Claims {
        sub: user.id,
        username: user.username.clone(),
        discriminator: user.discriminator.clone(),
        avatar: user.avatar.clone(),
        is_admin: user.is_admin,
        is_reviewer: user.is_reviewer,
        exp: (chrono::Utc::now() + ttl).timestamp() as usize,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;

    Ok(token)
}
