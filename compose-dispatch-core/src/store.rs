//! The store: serial action processing and effect execution
//!
//! A store owns the root state, the root reducer, and the cancellation
//! registry. All reducer invocations and state mutation happen on one
//! logical serial queue: whichever thread finds the queue idle drains it,
//! and everyone else appends. Effects run as independent tokio tasks and
//! communicate exclusively by sending actions back through the queue, so
//! state is never mutated concurrently by construction.
//!
//! The synchronous part of a [`Store::send`] is observable immediately when
//! it returns: the reducer has run for that action (and for anything else
//! queued ahead of it). Effects resolve later; their actions re-enter the
//! same pipeline.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::sync::Notify;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::action::Action;
use crate::cancel::{CancelId, Registry};
use crate::effect::{ActionSender, BoxFuture, Effect, EffectKind, RunFn};
use crate::reducer::Reducer;

/// Tracks the effects transitively started by one `send`.
///
/// Counts queued-but-unprocessed actions as well as running effect tasks,
/// so the count can only reach zero once everything downstream of the
/// original action has settled.
#[derive(Clone)]
struct Tracker {
    inner: Arc<TrackerInner>,
}

struct TrackerInner {
    pending: AtomicUsize,
    notify: Notify,
}

impl Tracker {
    fn new() -> Self {
        Self {
            inner: Arc::new(TrackerInner {
                pending: AtomicUsize::new(0),
                notify: Notify::new(),
            }),
        }
    }

    fn add(&self) {
        self.inner.pending.fetch_add(1, Ordering::SeqCst);
    }

    fn done(&self) {
        if self.inner.pending.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.inner.notify.notify_waiters();
        }
    }
}

/// Completion handle returned by [`Store::send`].
///
/// Resolves when every effect synchronously and transitively started by
/// that action has completed. Drive in-flight indicators with it, or drop
/// it if you don't care.
pub struct SendHandle {
    inner: Arc<TrackerInner>,
}

impl SendHandle {
    /// Wait until all effects started by the send have completed.
    pub async fn finish(self) {
        loop {
            let notified = self.inner.notify.notified();
            if self.inner.pending.load(Ordering::SeqCst) == 0 {
                return;
            }
            notified.await;
        }
    }

    /// Whether everything started by the send has already completed.
    pub fn is_finished(&self) -> bool {
        self.inner.pending.load(Ordering::SeqCst) == 0
    }
}

struct Queue<A> {
    items: VecDeque<(A, Tracker)>,
    draining: bool,
}

struct StoreInner<S, A: Action> {
    self_weak: Weak<StoreInner<S, A>>,
    state: Mutex<S>,
    reducer: Box<dyn Fn(&mut S, A) -> Effect<A> + Send + Sync>,
    queue: Mutex<Queue<A>>,
    registry: Registry,
    /// Cancelled when the last store handle is dropped; every effect task
    /// observes it, so no effect outlives the store.
    lifetime: CancellationToken,
    runtime: Handle,
}

impl<S: Send + 'static, A: Action> StoreInner<S, A> {
    /// Append an action to the serial queue and drain it unless another
    /// thread already is. Nested sends from effects land here too, so the
    /// reducer is never re-entered.
    fn enqueue(&self, action: A, tracker: Tracker) {
        tracker.add();
        {
            let mut queue = self.queue.lock();
            queue.items.push_back((action, tracker));
            if queue.draining {
                return;
            }
            queue.draining = true;
        }
        self.drain();
    }

    fn drain(&self) {
        loop {
            let (action, tracker) = {
                let mut queue = self.queue.lock();
                match queue.items.pop_front() {
                    Some(entry) => entry,
                    None => {
                        queue.draining = false;
                        return;
                    }
                }
            };
            tracing::debug!(action = action.name(), "processing action");
            let effect = {
                let mut state = self.state.lock();
                (self.reducer)(&mut state, action)
            };
            self.schedule(effect, &tracker);
            tracker.done();
        }
    }

    /// Execute one reduced effect. Cancellations apply and cancelable tasks
    /// register synchronously, in order, while the action is still being
    /// processed; `cancel_in_flight` is therefore deterministic in send
    /// order. Effects nested inside `concat` register when they start.
    fn schedule(&self, effect: Effect<A>, tracker: &Tracker) {
        match effect.kind {
            EffectKind::None => {}
            EffectKind::Send(action) => self.enqueue(action, tracker.clone()),
            EffectKind::Cancel { id, scope } => {
                if scope {
                    self.registry.cancel_scope(&id);
                } else {
                    self.registry.cancel(&id);
                }
            }
            EffectKind::Merge(effects) => {
                for effect in effects {
                    self.schedule(effect, tracker);
                }
            }
            EffectKind::Run(start) => {
                self.spawn_run(start, tracker.clone());
            }
            EffectKind::Cancellable {
                id,
                cancel_in_flight,
                inner,
            } => {
                let registration = self.registry.register(id, cancel_in_flight);
                tracker.add();
                let ctx = EffectCtx {
                    store: self.self_weak.clone(),
                    tracker: tracker.clone(),
                };
                let lifetime = self.lifetime.clone();
                let store = self.self_weak.clone();
                let tracker = tracker.clone();
                self.runtime.spawn(async move {
                    tokio::select! {
                        biased;
                        _ = lifetime.cancelled() => {}
                        _ = registration.token.cancelled() => {}
                        _ = drive(*inner, ctx) => {}
                    }
                    if let Some(store) = store.upgrade() {
                        store.registry.deregister(&registration.id, registration.seq);
                    }
                    tracker.done();
                });
            }
            EffectKind::Concat(effects) => {
                tracker.add();
                let ctx = EffectCtx {
                    store: self.self_weak.clone(),
                    tracker: tracker.clone(),
                };
                let lifetime = self.lifetime.clone();
                let tracker = tracker.clone();
                self.runtime.spawn(async move {
                    tokio::select! {
                        biased;
                        _ = lifetime.cancelled() => {}
                        _ = async {
                            for effect in effects {
                                drive(effect, ctx.clone()).await;
                            }
                        } => {}
                    }
                    tracker.done();
                });
            }
        }
    }

    fn spawn_run(&self, start: RunFn<A>, tracker: Tracker) {
        tracker.add();
        let sender = self.action_sender(tracker.clone());
        let lifetime = self.lifetime.clone();
        self.runtime.spawn(async move {
            let fut = start(sender);
            // Biased: the store-teardown signal is observed before the
            // effect body is polled, at spawn and at every suspension point.
            tokio::select! {
                biased;
                _ = lifetime.cancelled() => {}
                _ = fut => {}
            }
            tracker.done();
        });
    }

    /// Sender handed to effect tasks. Sends append to the queue under the
    /// same tracker, so transitively started effects keep the original
    /// send's handle open.
    fn action_sender(&self, tracker: Tracker) -> ActionSender<A> {
        let store = self.self_weak.clone();
        ActionSender::new(move |action| {
            if let Some(store) = store.upgrade() {
                store.enqueue(action, tracker.clone());
            }
        })
    }
}

impl<S, A: Action> Drop for StoreInner<S, A> {
    fn drop(&mut self) {
        self.lifetime.cancel();
        self.registry.cancel_all();
    }
}

/// Context threaded through sequentially driven (`concat`) effects.
struct EffectCtx<S, A: Action> {
    store: Weak<StoreInner<S, A>>,
    tracker: Tracker,
}

impl<S, A: Action> Clone for EffectCtx<S, A> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            tracker: self.tracker.clone(),
        }
    }
}

/// Run one effect to completion, inline. Cancelable runs register when they
/// start (the deterministic policy for work sequenced behind other work);
/// merged children run concurrently and are aborted if this driver is.
fn drive<S: Send + 'static, A: Action>(effect: Effect<A>, ctx: EffectCtx<S, A>) -> BoxFuture<()> {
    Box::pin(async move {
        match effect.kind {
            EffectKind::None => {}
            EffectKind::Send(action) => {
                if let Some(store) = ctx.store.upgrade() {
                    store.enqueue(action, ctx.tracker.clone());
                }
            }
            EffectKind::Cancel { id, scope } => {
                if let Some(store) = ctx.store.upgrade() {
                    if scope {
                        store.registry.cancel_scope(&id);
                    } else {
                        store.registry.cancel(&id);
                    }
                }
            }
            EffectKind::Run(start) => {
                // Build the future while holding a strong reference, then
                // release it for the duration of the run.
                let Some(store) = ctx.store.upgrade() else {
                    return;
                };
                let fut = start(store.action_sender(ctx.tracker.clone()));
                drop(store);
                fut.await;
            }
            EffectKind::Cancellable {
                id,
                cancel_in_flight,
                inner,
            } => {
                let Some(store) = ctx.store.upgrade() else {
                    return;
                };
                let registration = store.registry.register(id, cancel_in_flight);
                drop(store);
                tokio::select! {
                    biased;
                    _ = registration.token.cancelled() => {}
                    _ = drive(*inner, ctx.clone()) => {}
                }
                if let Some(store) = ctx.store.upgrade() {
                    store.registry.deregister(&registration.id, registration.seq);
                }
            }
            EffectKind::Merge(effects) => {
                let mut set = JoinSet::new();
                for effect in effects {
                    set.spawn(drive(effect, ctx.clone()));
                }
                while set.join_next().await.is_some() {}
            }
            EffectKind::Concat(effects) => {
                for effect in effects {
                    drive(effect, ctx.clone()).await;
                }
            }
        }
    })
}

trait StoreCore<S, A>: Send + Sync {
    fn send_erased(&self, action: A, tracker: Tracker);
    fn with_state_dyn(&self, f: &mut dyn FnMut(&S));
    fn registry_is_live(&self, id: &CancelId) -> bool;
}

impl<S: Send + 'static, A: Action> StoreCore<S, A> for StoreInner<S, A> {
    fn send_erased(&self, action: A, tracker: Tracker) {
        self.enqueue(action, tracker);
    }

    fn with_state_dyn(&self, f: &mut dyn FnMut(&S)) {
        let state = self.state.lock();
        f(&state);
    }

    fn registry_is_live(&self, id: &CancelId) -> bool {
        self.registry.is_live(id)
    }
}

struct ScopedCore<PS, PA, S, A> {
    parent: Arc<dyn StoreCore<PS, PA>>,
    get: fn(&PS) -> &S,
    embed: Arc<dyn Fn(A) -> PA + Send + Sync>,
}

impl<PS, PA, S, A> StoreCore<S, A> for ScopedCore<PS, PA, S, A>
where
    PS: 'static,
    PA: 'static,
    S: 'static,
    A: Send + 'static,
{
    fn send_erased(&self, action: A, tracker: Tracker) {
        self.parent.send_erased((*self.embed)(action), tracker);
    }

    fn with_state_dyn(&self, f: &mut dyn FnMut(&S)) {
        let get = self.get;
        self.parent.with_state_dyn(&mut |parent_state| f(get(parent_state)));
    }

    fn registry_is_live(&self, id: &CancelId) -> bool {
        self.parent.registry_is_live(id)
    }
}

/// The runtime root of a feature tree.
///
/// Cheap to clone; all clones share the same state, queue, and registry.
/// Scoped child stores ([`Store::scope`]) are zero-copy views whose reads
/// and sends route through the parent.
///
/// Dropping the last handle cancels every outstanding effect.
///
/// # Example
///
/// ```ignore
/// let store = Store::new(Counter::default(), counter_reducer());
/// let handle = store.send(CounterAction::Increment);
/// assert_eq!(store.state().count, 1); // synchronous fold already applied
/// handle.finish().await;              // all effects settled
/// ```
pub struct Store<S, A> {
    core: Arc<dyn StoreCore<S, A>>,
}

impl<S, A> Clone for Store<S, A> {
    fn clone(&self) -> Self {
        Self {
            core: Arc::clone(&self.core),
        }
    }
}

impl<S: Send + 'static, A: Action> Store<S, A> {
    /// Create a store from initial state and a root reducer.
    ///
    /// Must be called within a tokio runtime; effects are spawned onto the
    /// runtime that was current at construction.
    pub fn new<R>(initial: S, reducer: R) -> Self
    where
        R: Reducer<State = S, Action = A>,
    {
        let inner = Arc::new_cyclic(|weak: &Weak<StoreInner<S, A>>| StoreInner {
            self_weak: weak.clone(),
            state: Mutex::new(initial),
            reducer: Box::new(move |state, action| reducer.reduce(state, action)),
            queue: Mutex::new(Queue {
                items: VecDeque::new(),
                draining: false,
            }),
            registry: Registry::new(),
            lifetime: CancellationToken::new(),
            runtime: Handle::current(),
        });
        Self { core: inner }
    }

    /// Send an action into the store.
    ///
    /// The action (and anything already queued) is reduced before this
    /// returns; the returned handle resolves once all effects transitively
    /// started by it have completed.
    pub fn send(&self, action: A) -> SendHandle {
        let tracker = Tracker::new();
        self.core.send_erased(action, tracker.clone());
        SendHandle {
            inner: tracker.inner,
        }
    }

    /// Read the current state through a closure, without cloning.
    pub fn with_state<T>(&self, f: impl FnOnce(&S) -> T) -> T {
        let mut f = Some(f);
        let mut out = None;
        self.core.with_state_dyn(&mut |state| {
            if let Some(f) = f.take() {
                out = Some(f(state));
            }
        });
        match out {
            Some(value) => value,
            None => unreachable!("state accessor was not invoked"),
        }
    }

    /// Snapshot the current state.
    pub fn state(&self) -> S
    where
        S: Clone,
    {
        self.with_state(S::clone)
    }

    /// Derive a zero-copy child store focused on a slice of state and a
    /// case of the action space. Reads and sends route through the parent.
    pub fn scope<CS, CA>(
        &self,
        state: fn(&S) -> &CS,
        embed: impl Fn(CA) -> A + Send + Sync + 'static,
    ) -> Store<CS, CA>
    where
        CS: Send + 'static,
        CA: Action,
    {
        Store {
            core: Arc::new(ScopedCore {
                parent: Arc::clone(&self.core),
                get: state,
                embed: Arc::new(embed),
            }),
        }
    }

    /// Whether any effect is live under exactly `id`. Diagnostic accessor,
    /// mainly for tests.
    pub fn is_effect_live(&self, id: &CancelId) -> bool {
        self.core.registry_is_live(id)
    }
}
