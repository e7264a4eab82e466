use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use tokio::sync::broadcast;
use tracing::debug;

use smdb_types::events::GatewayEvent;

use crate::cache::ViewCache;

/// Fans events out to every connected client and drives view invalidation.
#[derive(Clone)]
pub struct Dispatcher {
    inner: Arc<DispatcherInner>,
}

struct DispatcherInner {
    /// Broadcast channel for gateway events; every connected client receives every event
    broadcast_tx: broadcast::Sender<GatewayEvent>,

    /// In-process caches, invalidated synchronously before the broadcast goes out
    caches: RwLock<Vec<ViewCache>>,

    invalidations: AtomicU64,
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Dispatcher {
    pub fn new() -> Self {
        let (broadcast_tx, _) = broadcast::channel(1024);
        Self {
            inner: Arc::new(DispatcherInner {
                broadcast_tx,
                caches: RwLock::new(Vec::new()),
                invalidations: AtomicU64::new(0),
            }),
        }
    }

    /// Subscribe to gateway events. Returns a broadcast receiver.
    pub fn subscribe(&self) -> broadcast::Receiver<GatewayEvent> {
        self.inner.broadcast_tx.subscribe()
    }

    /// Broadcast an event to all connected clients.
    pub fn broadcast(&self, event: GatewayEvent) {
        let _ = self.inner.broadcast_tx.send(event);
    }

    /// Register a cache that must never serve a view after its tag was
    /// invalidated. Attached caches are updated inside [`Dispatcher::invalidate`]
    /// itself, so a read issued after a mutation returns cannot hit stale data.
    pub fn attach_cache(&self, cache: ViewCache) {
        self.inner
            .caches
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .push(cache);
    }

    /// Drop every view under `tag` locally and tell every client to do the same.
    ///
    /// Called once per confirmed mutation. Repeated calls are harmless.
    pub fn invalidate(&self, tag: &str) {
        let evicted: usize = self
            .inner
            .caches
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .map(|cache| cache.invalidate(tag))
            .sum();

        self.inner.invalidations.fetch_add(1, Ordering::Relaxed);
        debug!("Invalidated tag '{}' ({} cached views evicted)", tag, evicted);

        self.broadcast(GatewayEvent::Invalidate {
            tag: tag.to_string(),
        });
    }

    /// Total invalidations issued since startup.
    pub fn invalidations_sent(&self) -> u64 {
        self.inner.invalidations.load(Ordering::Relaxed)
    }
}
