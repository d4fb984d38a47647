//! Cancellation identities and the per-store registry of live effects
//!
//! Every cancelable effect is registered here before it starts running and
//! deregistered when it completes. Cancellation is cooperative: signalling a
//! token stops the task at its next suspension point. Actions the task already
//! submitted are still delivered; nothing is sent afterwards.

use std::collections::HashMap;
use std::fmt;

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

/// Identifies running effects for cancellation and replacement.
///
/// A `CancelId` is a path of segments. Feature code creates leaf ids
/// (`CancelId::new("delay")`); scoping combinators prefix child ids with their
/// own scope segment (and element id, for collections and stacks), so an
/// identity is always reachable from the state that spawned it. Cancelling a
/// prefix cancels everything registered underneath it.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct CancelId {
    segments: Vec<String>,
}

impl CancelId {
    /// Create a single-segment cancellation id.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            segments: vec![name.into()],
        }
    }

    /// Prepend a scope segment. Used by scoping combinators when lifting
    /// child effects into a parent's address space.
    pub(crate) fn prefixed(mut self, segment: &str) -> Self {
        self.segments.insert(0, segment.to_string());
        self
    }

    pub(crate) fn starts_with(&self, prefix: &CancelId) -> bool {
        self.segments.len() >= prefix.segments.len()
            && self.segments[..prefix.segments.len()] == prefix.segments[..]
    }
}

impl From<&'static str> for CancelId {
    fn from(s: &'static str) -> Self {
        Self::new(s)
    }
}

impl From<String> for CancelId {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl fmt::Display for CancelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.segments.join("/"))
    }
}

struct LiveTask {
    seq: u64,
    token: CancellationToken,
}

#[derive(Default)]
struct RegistryInner {
    next_seq: u64,
    live: HashMap<CancelId, Vec<LiveTask>>,
}

/// A successful registration. Holds the token the effect task must observe
/// and the sequence number used to deregister exactly this task.
pub(crate) struct Registration {
    pub(crate) id: CancelId,
    pub(crate) seq: u64,
    pub(crate) token: CancellationToken,
}

/// Map from cancellation identity to the set of live effect tasks.
///
/// One registry per store. All mutation happens under the lock; no lock is
/// held across an await.
#[derive(Default)]
pub(crate) struct Registry {
    inner: Mutex<RegistryInner>,
}

impl Registry {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Register a task under `id`, returning its cancellation token.
    ///
    /// With `cancel_in_flight`, any task already live under the same identity
    /// is cancelled first, atomically under the registry lock, so at most one
    /// task is live per identity when the flag is used consistently.
    pub(crate) fn register(&self, id: CancelId, cancel_in_flight: bool) -> Registration {
        let mut inner = self.inner.lock();
        if cancel_in_flight {
            if let Some(tasks) = inner.live.remove(&id) {
                for task in &tasks {
                    tracing::debug!(id = %id, "cancelling in-flight effect");
                    task.token.cancel();
                }
            }
        }
        let seq = inner.next_seq;
        inner.next_seq += 1;
        let token = CancellationToken::new();
        inner.live.entry(id.clone()).or_default().push(LiveTask {
            seq,
            token: token.clone(),
        });
        Registration { id, seq, token }
    }

    /// Remove a task that completed normally. No-op if it was already
    /// cancelled and removed.
    pub(crate) fn deregister(&self, id: &CancelId, seq: u64) {
        let mut inner = self.inner.lock();
        if let Some(tasks) = inner.live.get_mut(id) {
            tasks.retain(|t| t.seq != seq);
            if tasks.is_empty() {
                inner.live.remove(id);
            }
        }
    }

    /// Cancel every task registered under exactly `id`.
    ///
    /// Cancelling an identity with no live task is a no-op.
    pub(crate) fn cancel(&self, id: &CancelId) {
        let mut inner = self.inner.lock();
        if let Some(tasks) = inner.live.remove(id) {
            tracing::debug!(id = %id, count = tasks.len(), "cancelling effects");
            for task in tasks {
                task.token.cancel();
            }
        }
    }

    /// Cancel every task whose identity starts with `prefix`.
    ///
    /// Used when the state a scope was attached to goes away.
    pub(crate) fn cancel_scope(&self, prefix: &CancelId) {
        let mut inner = self.inner.lock();
        let ids: Vec<CancelId> = inner
            .live
            .keys()
            .filter(|id| id.starts_with(prefix))
            .cloned()
            .collect();
        for id in ids {
            if let Some(tasks) = inner.live.remove(&id) {
                tracing::debug!(scope = %prefix, id = %id, "cancelling scoped effects");
                for task in tasks {
                    task.token.cancel();
                }
            }
        }
    }

    /// Cancel everything. Used on store teardown.
    pub(crate) fn cancel_all(&self) {
        let mut inner = self.inner.lock();
        for (_, tasks) in inner.live.drain() {
            for task in tasks {
                task.token.cancel();
            }
        }
    }

    /// Whether any task is live under exactly `id`.
    pub(crate) fn is_live(&self, id: &CancelId) -> bool {
        self.inner.lock().live.contains_key(id)
    }

    /// Number of live identities.
    #[cfg(test)]
    pub(crate) fn live_len(&self) -> usize {
        self.inner.lock().live.len()
    }
}
