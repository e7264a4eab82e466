use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::MovieRef;

/// Invalidation tag covering every movie list and movie detail view.
pub const MOVIES_TAG: &str = "movies";

/// What the review composer shows, derived from the pending target and the
/// open/close toggle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ComposerState {
    Closed,
    /// Opened without a target movie: nothing can be submitted.
    Disabled,
    Composing { movie: MovieRef },
}

/// Events sent over the WebSocket gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum GatewayEvent {
    /// Server confirms successful authentication
    Ready { user_id: Uuid, username: String },

    /// Views cached under `tag` are stale and must be refetched
    Invalidate { tag: String },

    /// The composer of this session changed
    ComposerState { state: ComposerState },
}

/// Commands sent FROM client TO server over WebSocket.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum GatewayCommand {
    /// Authenticate the WebSocket connection
    Identify { token: String },

    /// Ask for the review composer to target a movie
    SignalReviewIntent { movie_id: Uuid },

    OpenComposer,

    CloseComposer,
}
