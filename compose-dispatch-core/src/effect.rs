//! Effects: declarative descriptions of asynchronous work
//!
//! A reducer never performs side effects directly. It returns an [`Effect`]
//! describing the work, and the store executes it: a `run` effect becomes a
//! task that can feed any number of actions back through the store's serial
//! queue, a `cancel` effect stops running tasks by identity, and
//! `merge`/`concat` combine effects concurrently or sequentially.
//!
//! Cancellation policy: a cancelled task stops at its next suspension point.
//! Actions it already submitted are still delivered through the queue; no
//! action is sent after the cancellation signal is observed. Timeouts are not
//! a primitive; race the effect against a sleep-then-cancel effect sharing
//! the same identity.
//!
//! # Example
//!
//! ```ignore
//! fn reduce(state: &mut State, action: Action) -> Effect<Action> {
//!     match action {
//!         Action::FactButtonTapped => {
//!             state.is_loading = true;
//!             let client = self.fact_client.clone();
//!             let count = state.count;
//!             Effect::run(move |send| async move {
//!                 send.send(Action::FactResponse(client.fetch(count).await));
//!             })
//!             .cancellable_in_flight(CancelId::new("fact"))
//!         }
//!         Action::StepperChanged(n) => {
//!             state.count = n;
//!             Effect::cancel(CancelId::new("fact"))
//!         }
//!         // ...
//!     }
//! }
//! ```

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tokio_stream::Stream;

use crate::cancel::CancelId;

/// Owned future type used at effect boundaries.
pub type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send>>;

/// Owned stream type used by long-living capability clients.
pub type BoxStream<T> = Pin<Box<dyn Stream<Item = T> + Send>>;

/// Handle a running effect uses to feed actions back into the store.
///
/// Sends are non-blocking: the action is appended to the store's serial
/// queue and processed in order. The handle is cheap to clone and can be
/// adapted across action spaces with [`ActionSender::contramap`].
pub struct ActionSender<A> {
    send: Arc<dyn Fn(A) + Send + Sync>,
}

impl<A> Clone for ActionSender<A> {
    fn clone(&self) -> Self {
        Self {
            send: Arc::clone(&self.send),
        }
    }
}

impl<A: Send + 'static> ActionSender<A> {
    pub(crate) fn new(send: impl Fn(A) + Send + Sync + 'static) -> Self {
        Self {
            send: Arc::new(send),
        }
    }

    /// Feed an action back into the store.
    pub fn send(&self, action: A) {
        (*self.send)(action);
    }

    /// Adapt this sender to accept a different action type.
    pub fn contramap<B: Send + 'static>(
        &self,
        f: impl Fn(B) -> A + Send + Sync + 'static,
    ) -> ActionSender<B> {
        let send = Arc::clone(&self.send);
        ActionSender {
            send: Arc::new(move |b| (*send)(f(b))),
        }
    }
}

pub(crate) type RunFn<A> = Box<dyn FnOnce(ActionSender<A>) -> BoxFuture<()> + Send>;

pub(crate) enum EffectKind<A> {
    None,
    Run(RunFn<A>),
    Send(A),
    Cancel {
        id: CancelId,
        /// Exact match for user-level cancels; prefix match when a scoping
        /// combinator tears down everything under a departed child.
        scope: bool,
    },
    /// An effect registered under a cancellation identity. Cancelling the
    /// identity stops everything inside.
    Cancellable {
        id: CancelId,
        cancel_in_flight: bool,
        inner: Box<Effect<A>>,
    },
    Merge(Vec<Effect<A>>),
    Concat(Vec<Effect<A>>),
}

/// A description of zero or more future actions.
///
/// Values are inert until handed to a store, which executes them after the
/// reducer returns.
pub struct Effect<A> {
    pub(crate) kind: EffectKind<A>,
}

impl<A: Send + 'static> Effect<A> {
    /// No further work.
    pub fn none() -> Self {
        Self {
            kind: EffectKind::None,
        }
    }

    /// Asynchronous work that may feed actions back through the store.
    ///
    /// The closure receives an [`ActionSender`] and returns the future to
    /// run. The future may loop forever (for example, forwarding a stream of
    /// events); tie it to a [`CancelId`] so the owning scope can stop it.
    pub fn run<F, Fut>(f: F) -> Self
    where
        F: FnOnce(ActionSender<A>) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        Self {
            kind: EffectKind::Run(Box::new(move |send| Box::pin(f(send)))),
        }
    }

    /// Immediately feed `action` back through the store queue.
    pub fn send(action: A) -> Self {
        Self {
            kind: EffectKind::Send(action),
        }
    }

    /// Cancel all running effects registered under `id`.
    ///
    /// Cancelling an identity with no live effect is a no-op.
    pub fn cancel(id: impl Into<CancelId>) -> Self {
        Self {
            kind: EffectKind::Cancel {
                id: id.into(),
                scope: false,
            },
        }
    }

    /// Cancel every running effect whose identity lives under `prefix`.
    /// Scoping combinators use this when the state a scope was attached to
    /// goes away.
    pub(crate) fn cancel_scope(prefix: CancelId) -> Self {
        Self {
            kind: EffectKind::Cancel {
                id: prefix,
                scope: true,
            },
        }
    }

    /// Run several effects concurrently.
    pub fn merge(effects: impl IntoIterator<Item = Effect<A>>) -> Self {
        let mut flat: Vec<Effect<A>> = Vec::new();
        for effect in effects {
            match effect.kind {
                EffectKind::None => {}
                EffectKind::Merge(inner) => flat.extend(inner),
                _ => flat.push(effect),
            }
        }
        match flat.len() {
            0 => Self::none(),
            1 => flat.into_iter().next().unwrap_or_else(Self::none),
            _ => Self {
                kind: EffectKind::Merge(flat),
            },
        }
    }

    /// Run several effects one after another, each starting when the
    /// previous one has completed.
    pub fn concat(effects: impl IntoIterator<Item = Effect<A>>) -> Self {
        let flat: Vec<Effect<A>> = effects
            .into_iter()
            .filter(|e| !matches!(e.kind, EffectKind::None))
            .collect();
        match flat.len() {
            0 => Self::none(),
            1 => flat.into_iter().next().unwrap_or_else(Self::none),
            _ => Self {
                kind: EffectKind::Concat(flat),
            },
        }
    }

    /// Tag this effect with a cancellation identity. Cancelling the
    /// identity stops the whole effect, including merged and concatenated
    /// sub-effects that haven't started yet.
    pub fn cancellable(self, id: impl Into<CancelId>) -> Self {
        self.tagged(id.into(), false)
    }

    /// Tag this effect with a cancellation identity, cancelling any effect
    /// already in flight under the same identity. Two effects tagged this
    /// way are mutually exclusive: starting the second atomically cancels
    /// the first.
    pub fn cancellable_in_flight(self, id: impl Into<CancelId>) -> Self {
        self.tagged(id.into(), true)
    }

    fn tagged(self, id: CancelId, cancel_in_flight: bool) -> Self {
        if self.is_none() {
            return self;
        }
        Self {
            kind: EffectKind::Cancellable {
                id,
                cancel_in_flight,
                inner: Box::new(self),
            },
        }
    }

    /// Lift this effect into a parent action space.
    pub fn map<B: Send + 'static>(self, f: impl Fn(A) -> B + Send + Sync + 'static) -> Effect<B> {
        self.map_arc(&Arc::new(f))
    }

    fn map_arc<B: Send + 'static>(self, f: &Arc<impl Fn(A) -> B + Send + Sync + 'static>) -> Effect<B> {
        let kind = match self.kind {
            EffectKind::None => EffectKind::None,
            EffectKind::Run(start) => {
                let f = Arc::clone(f);
                EffectKind::Run(Box::new(move |send: ActionSender<B>| {
                    start(send.contramap(move |a| (*f)(a)))
                }))
            }
            EffectKind::Send(a) => EffectKind::Send((**f)(a)),
            EffectKind::Cancel { id, scope } => EffectKind::Cancel { id, scope },
            EffectKind::Cancellable {
                id,
                cancel_in_flight,
                inner,
            } => EffectKind::Cancellable {
                id,
                cancel_in_flight,
                inner: Box::new(inner.map_arc(f)),
            },
            EffectKind::Merge(inner) => {
                EffectKind::Merge(inner.into_iter().map(|e| e.map_arc(f)).collect())
            }
            EffectKind::Concat(inner) => {
                EffectKind::Concat(inner.into_iter().map(|e| e.map_arc(f)).collect())
            }
        };
        Effect { kind }
    }

    /// Prefix every cancellation identity inside this effect with a scope
    /// segment. Applied by scoping combinators together with [`Effect::map`].
    pub(crate) fn scoped(self, segment: &str) -> Self {
        let kind = match self.kind {
            EffectKind::Cancel { id, scope } => EffectKind::Cancel {
                id: id.prefixed(segment),
                scope,
            },
            EffectKind::Cancellable {
                id,
                cancel_in_flight,
                inner,
            } => EffectKind::Cancellable {
                id: id.prefixed(segment),
                cancel_in_flight,
                inner: Box::new(inner.scoped(segment)),
            },
            EffectKind::Merge(inner) => {
                EffectKind::Merge(inner.into_iter().map(|e| e.scoped(segment)).collect())
            }
            EffectKind::Concat(inner) => {
                EffectKind::Concat(inner.into_iter().map(|e| e.scoped(segment)).collect())
            }
            other => other,
        };
        Self { kind }
    }

    /// Whether this effect describes no work at all.
    pub fn is_none(&self) -> bool {
        matches!(self.kind, EffectKind::None)
    }
}
