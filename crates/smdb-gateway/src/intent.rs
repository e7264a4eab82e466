//! Review-intent channel.
//!
//! Lets any view ask for the review composer to open on a movie without being
//! wired to the composer. Two independent pieces of state:
//!
//! - the pending target movie, overwritten by every signal (last write wins)
//!   and read without being cleared;
//! - whether the composer is visible.
//!
//! Opening the composer with no target yields [`ComposerState::Disabled`].

use std::sync::Arc;

use tokio::sync::watch;

use smdb_types::events::ComposerState;
use smdb_types::models::MovieRef;

#[derive(Clone)]
pub struct ReviewIntentChannel {
    inner: Arc<IntentInner>,
}

struct IntentInner {
    target: watch::Sender<Option<MovieRef>>,
    open: watch::Sender<bool>,
}

impl Default for ReviewIntentChannel {
    fn default() -> Self {
        Self::new()
    }
}

impl ReviewIntentChannel {
    pub fn new() -> Self {
        let (target, _) = watch::channel(None);
        let (open, _) = watch::channel(false);
        Self {
            inner: Arc::new(IntentInner { target, open }),
        }
    }

    pub fn signal_review_intent(&self, movie: MovieRef) {
        // send_replace stores the value even when nobody is watching
        self.inner.target.send_replace(Some(movie));
    }

    /// The movie the composer should target. Reading does not clear it.
    pub fn pending_target(&self) -> Option<MovieRef> {
        self.inner.target.borrow().clone()
    }

    pub fn open_composer(&self) {
        self.inner.open.send_replace(true);
    }

    pub fn close_composer(&self) {
        self.inner.open.send_replace(false);
    }

    pub fn is_open(&self) -> bool {
        *self.inner.open.borrow()
    }

    pub fn composer_state(&self) -> ComposerState {
        if !self.is_open() {
            return ComposerState::Closed;
        }
        match self.pending_target() {
            Some(movie) => ComposerState::Composing { movie },
            None => ComposerState::Disabled,
        }
    }

    pub fn watch_target(&self) -> watch::Receiver<Option<MovieRef>> {
        self.inner.target.subscribe()
    }

    pub fn watch_open(&self) -> watch::Receiver<bool> {
        self.inner.open.subscribe()
    }
}
