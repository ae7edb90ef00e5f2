//! # State Store & Effect Channel
//!
//! Both are thin wrappers over `tokio::sync::watch`, which already gives the
//! semantics the screens need: one writer, any number of readers, and a new
//! reader sees the latest value immediately.
//!
//! ```text
//! StateStore<S>       latest snapshot, replaced whole on every transition
//! EffectChannel<E>    latest instruction, reset to E::default() on acknowledge
//! ```

use std::fmt;
use std::sync::Arc;

use log::debug;
use tokio::sync::watch;

/// Holds the current view-state snapshot and broadcasts replacements.
///
/// Only the owning reducer loop writes; observers get `watch::Receiver`s.
pub struct StateStore<S> {
    sender: Arc<watch::Sender<S>>,
}

impl<S> Clone for StateStore<S> {
    fn clone(&self) -> Self {
        Self {
            sender: Arc::clone(&self.sender),
        }
    }
}

impl<S: Clone + fmt::Debug> StateStore<S> {
    pub fn new(initial: S) -> Self {
        let (sender, _) = watch::channel(initial);
        Self {
            sender: Arc::new(sender),
        }
    }

    /// A copy of the current snapshot.
    pub fn snapshot(&self) -> S {
        self.sender.borrow().clone()
    }

    /// Computes the next snapshot from the current one and publishes it
    /// atomically. Observers never see a partially applied update.
    pub fn update(&self, transition: impl FnOnce(S) -> S) {
        let next = transition(self.snapshot());
        debug!("State -> {:?}", next);
        self.sender.send_replace(next);
    }

    pub fn subscribe(&self) -> watch::Receiver<S> {
        self.sender.subscribe()
    }
}

/// Latest-value effect slot with explicit acknowledge-and-reset.
///
/// `E::default()` is the "nothing pending" value, so a late observer never
/// replays an instruction that was already handled.
pub struct EffectChannel<E> {
    sender: Arc<watch::Sender<E>>,
}

impl<E> Clone for EffectChannel<E> {
    fn clone(&self) -> Self {
        Self {
            sender: Arc::clone(&self.sender),
        }
    }
}

impl<E: Clone + Default + PartialEq + fmt::Debug> Default for EffectChannel<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: Clone + Default + PartialEq + fmt::Debug> EffectChannel<E> {
    pub fn new() -> Self {
        let (sender, _) = watch::channel(E::default());
        Self {
            sender: Arc::new(sender),
        }
    }

    pub fn emit(&self, effect: E) {
        debug!("Effect -> {:?}", effect);
        self.sender.send_replace(effect);
    }

    pub fn current(&self) -> E {
        self.sender.borrow().clone()
    }

    /// Resets to `E::default()`. No-op (and no notification) if nothing is pending.
    pub fn acknowledge(&self) {
        self.sender.send_if_modified(|effect| {
            if *effect == E::default() {
                return false;
            }
            *effect = E::default();
            true
        });
    }

    pub fn subscribe(&self) -> watch::Receiver<E> {
        self.sender.subscribe()
    }
}
