use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

use smdb_db::Database;
use smdb_types::events::{GatewayCommand, GatewayEvent};
use smdb_types::models::MovieRef;

use crate::dispatcher::Dispatcher;
use crate::identity;
use crate::intent::ReviewIntentChannel;

/// Heartbeat interval: server sends a Ping every 15 seconds.
/// If 2 consecutive Pongs are missed (~30s), the connection is dropped.
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(15);

const IDENTIFY_TIMEOUT: Duration = Duration::from_secs(10);

/// Handle a single WebSocket connection.
///
/// The client must send `Identify` first. Each connection is one interaction
/// session with its own review-intent channel, created here and dropped with
/// the connection.
pub async fn handle_connection(
    socket: WebSocket,
    dispatcher: Dispatcher,
    db: Arc<Database>,
    jwt_secret: String,
) {
    let (mut sender, mut receiver) = socket.split();

    let (user_id, username) = match wait_for_identify(&mut receiver, &jwt_secret).await {
        Some(id) => id,
        None => {
            warn!("WebSocket client failed to identify, closing");
            return;
        }
    };

    info!("{} ({}) connected to gateway", username, user_id);

    let ready = GatewayEvent::Ready {
        user_id,
        username: username.clone(),
    };
    let Some(msg) = encode(&ready) else { return };
    if sender.send(msg).await.is_err() {
        return;
    }

    let intents = ReviewIntentChannel::new();
    let (session_tx, mut session_rx) = mpsc::unbounded_channel::<GatewayEvent>();
    let mut broadcast_rx = dispatcher.subscribe();

    let pong_received = Arc::new(AtomicBool::new(true));
    let pong_flag_send = pong_received.clone();
    let pong_flag_recv = pong_received.clone();

    // Forward broadcasts + session events -> client, with heartbeat
    let mut send_task = tokio::spawn(async move {
        let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
        heartbeat.tick().await;
        let mut missed_heartbeats: u8 = 0;

        loop {
            let event = tokio::select! {
                result = broadcast_rx.recv() => match result {
                    Ok(event) => event,
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                        // Missed events may include invalidations; tell the
                        // client to drop everything it cached.
                        warn!("Broadcast receiver lagged by {} messages", n);
                        GatewayEvent::Invalidate { tag: smdb_types::events::MOVIES_TAG.into() }
                    }
                    Err(_) => break,
                },
                result = session_rx.recv() => match result {
                    Some(event) => event,
                    None => break,
                },
                _ = heartbeat.tick() => {
                    if pong_flag_send.swap(false, Ordering::Acquire) {
                        missed_heartbeats = 0;
                    } else {
                        missed_heartbeats += 1;
                        if missed_heartbeats >= 2 {
                            warn!("Heartbeat timeout (missed {} pongs), dropping connection", missed_heartbeats);
                            break;
                        }
                    }
                    if sender.send(Message::Ping(Vec::new().into())).await.is_err() {
                        break;
                    }
                    continue;
                }
            };

            let Some(msg) = encode(&event) else { continue };
            if sender.send(msg).await.is_err() {
                break;
            }
        }
    });

    // Read commands from client
    let username_recv = username.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            match msg {
                Message::Text(text) => match serde_json::from_str::<GatewayCommand>(&text) {
                    Ok(cmd) => {
                        if let Some(event) = handle_command(&intents, &db, cmd).await {
                            if session_tx.send(event).is_err() {
                                break;
                            }
                        }
                    }
                    Err(e) => {
                        warn!(
                            "{} ({}) bad command: {} -- raw: {}",
                            username_recv,
                            user_id,
                            e,
                            text.chars().take(200).collect::<String>()
                        );
                    }
                },
                Message::Pong(_) => {
                    pong_flag_recv.store(true, Ordering::Release);
                }
                Message::Close(_) => break,
                _ => {}
            }
        }
    });

    // Wait for either task to finish
    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    info!("{} ({}) disconnected from gateway", username, user_id);
}

fn encode(event: &GatewayEvent) -> Option<Message> {
    match serde_json::to_string(event) {
        Ok(text) => Some(Message::Text(text.into())),
        Err(e) => {
            warn!("Failed to encode gateway event: {}", e);
            None
        }
    }
}

async fn wait_for_identify(
    receiver: &mut futures_util::stream::SplitStream<WebSocket>,
    jwt_secret: &str,
) -> Option<(Uuid, String)> {
    let identify = async {
        while let Some(Ok(msg)) = receiver.next().await {
            if let Message::Text(text) = msg {
                if let Ok(GatewayCommand::Identify { token }) =
                    serde_json::from_str::<GatewayCommand>(&text)
                {
                    let user = identity::resolve_user(&token, jwt_secret)?;
                    return Some((user.id, user.username));
                }
            }
        }
        None
    };

    tokio::time::timeout(IDENTIFY_TIMEOUT, identify).await.ok().flatten()
}

/// Apply one client command to the session's review-intent channel.
/// Returns the composer state to report back, if any.
pub async fn handle_command(
    intents: &ReviewIntentChannel,
    db: &Arc<Database>,
    cmd: GatewayCommand,
) -> Option<GatewayEvent> {
    match cmd {
        GatewayCommand::Identify { .. } => return None, // Already handled

        GatewayCommand::SignalReviewIntent { movie_id } => {
            let db = db.clone();
            let id = movie_id.to_string();
            match tokio::task::spawn_blocking(move || db.get_movie(&id)).await {
                Ok(Ok(Some(row))) => intents.signal_review_intent(MovieRef {
                    id: movie_id,
                    name: row.name,
                }),
                Ok(Ok(None)) => {
                    warn!("Review intent for unknown movie {}", movie_id);
                    return None;
                }
                Ok(Err(e)) => {
                    warn!("Review intent lookup failed for {}: {}", movie_id, e);
                    return None;
                }
                Err(e) => {
                    warn!("spawn_blocking join error: {}", e);
                    return None;
                }
            }
        }

        GatewayCommand::OpenComposer => intents.open_composer(),

        GatewayCommand::CloseComposer => intents.close_composer(),
    }

    Some(GatewayEvent::ComposerState {
        state: intents.composer_state(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use smdb_types::events::ComposerState;

    fn open_db() -> (tempfile::TempDir, Arc<Database>) {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::open(&dir.path().join("gateway.db")).unwrap();
        (dir, Arc::new(db))
    }

    fn add_movie(db: &Database, name: &str) -> Uuid {
        let id = Uuid::new_v4();
        db.insert_movie(&id.to_string(), name, "", "").unwrap();
        id
    }

    fn state_of(event: Option<GatewayEvent>) -> ComposerState {
        match event {
            Some(GatewayEvent::ComposerState { state }) => state,
            other => panic!("expected composer state, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn composer_targets_last_signalled_movie() {
        let (_dir, db) = open_db();
        let a = add_movie(&db, "Heat");
        let b = add_movie(&db, "Alien");
        let intents = ReviewIntentChannel::new();

        handle_command(&intents, &db, GatewayCommand::SignalReviewIntent { movie_id: a }).await;
        handle_command(&intents, &db, GatewayCommand::SignalReviewIntent { movie_id: b }).await;
        let state = state_of(handle_command(&intents, &db, GatewayCommand::OpenComposer).await);

        assert_eq!(
            state,
            ComposerState::Composing {
                movie: MovieRef {
                    id: b,
                    name: "Alien".into()
                }
            }
        );
    }

    #[tokio::test]
    async fn unknown_movie_leaves_target_untouched() {
        let (_dir, db) = open_db();
        let a = add_movie(&db, "Heat");
        let intents = ReviewIntentChannel::new();

        handle_command(&intents, &db, GatewayCommand::SignalReviewIntent { movie_id: a }).await;
        let reply = handle_command(
            &intents,
            &db,
            GatewayCommand::SignalReviewIntent {
                movie_id: Uuid::new_v4(),
            },
        )
        .await;

        assert!(reply.is_none());
        assert_eq!(intents.pending_target().map(|m| m.id), Some(a));
    }

    #[tokio::test]
    async fn opening_without_target_reports_disabled() {
        let (_dir, db) = open_db();
        let intents = ReviewIntentChannel::new();

        let state = state_of(handle_command(&intents, &db, GatewayCommand::OpenComposer).await);
        assert_eq!(state, ComposerState::Disabled);

        let state = state_of(handle_command(&intents, &db, GatewayCommand::CloseComposer).await);
        assert_eq!(state, ComposerState::Closed);
    }
}
