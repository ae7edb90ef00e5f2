//! # Coordinator Runtime
//!
//! Every screen gets one coordinator: an unbounded action queue feeding a
//! single reducer loop that owns the screen's [`StateStore`] and
//! [`EffectChannel`].
//!
//! ```text
//!  submit(action) ──▶ [ mpsc, unbounded ] ──▶ loop: reducer.reduce(action).await
//!                                                  │            │
//!                                  StateStore ◀────┘            └───▶ EffectChannel
//!                                      │                                  │
//!                                  state() ──▶ view              effects() ──▶ view
//! ```
//!
//! The loop awaits each `reduce` to completion before taking the next action,
//! so steps of one coordinator never overlap. Dropping the coordinator (or
//! calling [`Coordinator::shutdown`]) aborts the loop along with whatever
//! use case it was waiting on.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use log::{debug, info};
use tokio::runtime::Handle;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::AbortHandle;

use super::store::{EffectChannel, StateStore};

/// Screen logic driven by a coordinator loop.
#[async_trait]
pub trait Reducer: Send + 'static {
    type Action: fmt::Debug + Send + 'static;
    type State: Clone + fmt::Debug + Send + Sync + 'static;
    type Effect: Clone + Default + PartialEq + fmt::Debug + Send + Sync + 'static;

    /// Name used in log lines.
    fn name(&self) -> &'static str;

    /// Handles one action. State changes that must be visible to the next
    /// action have to be published before the first `.await`.
    async fn reduce(
        &mut self,
        action: Self::Action,
        state: &StateStore<Self::State>,
        effects: &EffectChannel<Self::Effect>,
    );
}

/// Returned by [`Coordinator::submit`] once the loop has stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitError {
    Closed,
}

impl fmt::Display for SubmitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubmitError::Closed => write!(f, "coordinator is shut down"),
        }
    }
}

impl std::error::Error for SubmitError {}

enum Envelope<A> {
    Action(A),
    /// Answered once everything queued before it has been reduced.
    Barrier(oneshot::Sender<()>),
}

/// Handle to a running reducer loop.
pub struct Coordinator<R: Reducer> {
    actions: mpsc::UnboundedSender<Envelope<R::Action>>,
    state: StateStore<R::State>,
    effects: EffectChannel<R::Effect>,
    task: AbortHandle,
    /// Set by `shutdown`; checked before anything is queued.
    closed: AtomicBool,
}

impl<R: Reducer> Coordinator<R> {
    /// Starts the reducer loop on `scheduler`.
    pub fn spawn(mut reducer: R, initial: R::State, scheduler: &Handle) -> Self {
        let (actions, mut queue) = mpsc::unbounded_channel::<Envelope<R::Action>>();
        let state = StateStore::new(initial);
        let effects = EffectChannel::new();

        let loop_state = state.clone();
        let loop_effects = effects.clone();
        let task = scheduler.spawn(async move {
            let name = reducer.name();
            info!("{} coordinator started", name);
            while let Some(envelope) = queue.recv().await {
                match envelope {
                    Envelope::Action(action) => {
                        debug!("{} <- {:?}", name, action);
                        reducer.reduce(action, &loop_state, &loop_effects).await;
                    }
                    Envelope::Barrier(done) => {
                        let _ = done.send(());
                    }
                }
            }
            info!("{} coordinator stopped: action queue closed", name);
        });

        Self {
            actions,
            state,
            effects,
            task: task.abort_handle(),
            closed: AtomicBool::new(false),
        }
    }

    fn enqueue(&self, envelope: Envelope<R::Action>) -> Result<(), SubmitError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(SubmitError::Closed);
        }
        self.actions.send(envelope).map_err(|_| SubmitError::Closed)
    }

    /// Queues `action`. Never blocks.
    pub fn submit(&self, action: R::Action) -> Result<(), SubmitError> {
        self.enqueue(Envelope::Action(action))
    }

    /// Live view-state; the receiver starts at the current snapshot.
    pub fn state(&self) -> watch::Receiver<R::State> {
        self.state.subscribe()
    }

    pub fn snapshot(&self) -> R::State {
        self.state.snapshot()
    }

    /// Live effect slot; starts at the pending effect (or the default).
    pub fn effects(&self) -> watch::Receiver<R::Effect> {
        self.effects.subscribe()
    }

    pub fn current_effect(&self) -> R::Effect {
        self.effects.current()
    }

    /// Marks the pending effect as handled. Views must call this after acting
    /// on an effect, otherwise the next observer will see it again.
    pub fn acknowledge_effect(&self) {
        self.effects.acknowledge();
    }

    /// Waits until an effect other than the default is pending and returns it.
    /// The effect stays pending until [`acknowledge_effect`](Self::acknowledge_effect).
    pub async fn next_effect(&self) -> Option<R::Effect> {
        let mut rx = self.effects.subscribe();
        let none = R::Effect::default();
        let effect = rx.wait_for(|effect| *effect != none).await.ok()?.clone();
        Some(effect)
    }

    /// Resolves once every action submitted before this call has been reduced.
    pub async fn settle(&self) -> Result<(), SubmitError> {
        let (done, wait) = oneshot::channel();
        self.enqueue(Envelope::Barrier(done))?;
        wait.await.map_err(|_| SubmitError::Closed)
    }

    /// Stops the loop. In-flight work is dropped; no further transitions apply
    /// and every later `submit` or `settle` fails with [`SubmitError::Closed`].
    pub fn shutdown(&self) {
        self.closed.store(true, Ordering::Release);
        self.task.abort();
    }

    /// False once `shutdown` was called, even if the loop task has not
    /// unwound yet.
    pub fn is_running(&self) -> bool {
        !self.closed.load(Ordering::Acquire) && !self.task.is_finished()
    }
}

impl<R: Reducer> Drop for Coordinator<R> {
    fn drop(&mut self) {
        self.task.abort();
    }
}
