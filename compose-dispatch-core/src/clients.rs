//! Capability clients injected into feature reducers
//!
//! The runtime never inspects what a capability does; reducers hold client
//! values and call them from inside effects. Each client is a small struct
//! of closures so tests can swap in deterministic implementations without a
//! global registry: construct the live client at the composition root and
//! thread it into the feature reducers that need it.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio_stream::wrappers::{BroadcastStream, IntervalStream};
use tokio_stream::{Stream, StreamExt};
use uuid::Uuid;

use crate::effect::{BoxFuture, BoxStream};

/// Time access: cancelable sleeps and lazy infinite tick streams.
#[derive(Clone)]
pub struct Clock {
    sleep: Arc<dyn Fn(Duration) -> BoxFuture<()> + Send + Sync>,
    timer: Arc<dyn Fn(Duration) -> BoxStream<()> + Send + Sync>,
}

impl Clock {
    /// The tokio clock. Controllable in tests via the `testing-time`
    /// feature and `tokio::time::pause`/`advance`.
    pub fn system() -> Self {
        Self {
            sleep: Arc::new(|duration| Box::pin(tokio::time::sleep(duration))),
            timer: Arc::new(|period| {
                let interval = tokio::time::interval(period);
                // Skip the immediate first tick; ticks arrive after each
                // full period, like a wall timer.
                Box::pin(IntervalStream::new(interval).skip(1).map(|_| ()))
            }),
        }
    }

    /// Build a clock from custom sleep/timer implementations.
    pub fn new(
        sleep: impl Fn(Duration) -> BoxFuture<()> + Send + Sync + 'static,
        timer: impl Fn(Duration) -> BoxStream<()> + Send + Sync + 'static,
    ) -> Self {
        Self {
            sleep: Arc::new(sleep),
            timer: Arc::new(timer),
        }
    }

    /// Suspend until `duration` has elapsed. Cancelable at the await point.
    pub fn sleep(&self, duration: Duration) -> BoxFuture<()> {
        (*self.sleep)(duration)
    }

    /// A lazy, infinite stream ticking every `period`.
    pub fn timer(&self, period: Duration) -> BoxStream<()> {
        (*self.timer)(period)
    }
}

/// Unique identifier generation: random in production, deterministic under
/// test.
#[derive(Clone)]
pub struct IdGen {
    next: Arc<dyn Fn() -> Uuid + Send + Sync>,
}

impl IdGen {
    /// Random v4 ids.
    pub fn random() -> Self {
        Self {
            next: Arc::new(Uuid::new_v4),
        }
    }

    /// Deterministic ids 0, 1, 2, ... for tests.
    pub fn incrementing() -> Self {
        let counter = Arc::new(AtomicU64::new(0));
        Self {
            next: Arc::new(move || Uuid::from_u128(counter.fetch_add(1, Ordering::SeqCst).into())),
        }
    }

    pub fn next(&self) -> Uuid {
        (*self.next)()
    }
}

/// Why a number fact could not be fetched.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FactError {
    #[error("fact provider unavailable: {0}")]
    Provider(String),
}

/// Fetches a trivia fact for a number. Async and failable; the failure
/// travels back to the reducer as ordinary data inside a response action.
#[derive(Clone)]
pub struct FactClient {
    fetch: Arc<dyn Fn(i64) -> BoxFuture<Result<String, FactError>> + Send + Sync>,
}

impl FactClient {
    pub fn new<F, Fut>(fetch: F) -> Self
    where
        F: Fn(i64) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<String, FactError>> + Send + 'static,
    {
        Self {
            fetch: Arc::new(move |number| Box::pin(fetch(number))),
        }
    }

    /// Test double that always succeeds with `"<n> is a good number"`.
    pub fn echoing() -> Self {
        Self::new(|number| async move { Ok(format!("{number} is a good number")) })
    }

    /// Test double that always fails.
    pub fn failing(message: impl Into<String>) -> Self {
        let message = message.into();
        Self::new(move |_| {
            let message = message.clone();
            async move { Err(FactError::Provider(message)) }
        })
    }

    pub fn fetch(&self, number: i64) -> BoxFuture<Result<String, FactError>> {
        (*self.fetch)(number)
    }
}

/// A lazy, infinite, cancelable stream of unit events, such as "the user
/// took a screenshot". Each subscription gets its own stream.
#[derive(Clone)]
pub struct ScreenshotClient {
    events: Arc<dyn Fn() -> BoxStream<()> + Send + Sync>,
}

impl ScreenshotClient {
    pub fn new<F, St>(events: F) -> Self
    where
        F: Fn() -> St + Send + Sync + 'static,
        St: Stream<Item = ()> + Send + 'static,
    {
        Self {
            events: Arc::new(move || Box::pin(events())),
        }
    }

    /// Test double driven by hand: send on the returned channel to emit an
    /// event to every live subscription.
    pub fn manual() -> (Self, tokio::sync::broadcast::Sender<()>) {
        let (tx, _) = tokio::sync::broadcast::channel(16);
        let events_tx = tx.clone();
        let client = Self::new(move || {
            BroadcastStream::new(events_tx.subscribe()).filter_map(|event| event.ok())
        });
        (client, tx)
    }

    pub fn events(&self) -> BoxStream<()> {
        (*self.events)()
    }
}

/// One step of an in-progress download.
#[derive(Clone, Debug, PartialEq)]
pub enum DownloadEvent {
    /// Fraction complete, in `0.0..=1.0`.
    Progress(f64),
    /// The downloaded bytes; the stream ends after this.
    Response(Vec<u8>),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DownloadError {
    #[error("download failed: {0}")]
    Failed(String),
}

/// Starts downloads that report progress as they go. Cancellation is
/// expressed by cancelling the effect that consumes the stream, via its
/// cancellation identity.
#[derive(Clone)]
pub struct DownloadClient {
    start: Arc<dyn Fn(String) -> BoxStream<Result<DownloadEvent, DownloadError>> + Send + Sync>,
}

impl DownloadClient {
    pub fn new<F, St>(start: F) -> Self
    where
        F: Fn(String) -> St + Send + Sync + 'static,
        St: Stream<Item = Result<DownloadEvent, DownloadError>> + Send + 'static,
    {
        Self {
            start: Arc::new(move |url| Box::pin(start(url))),
        }
    }

    /// Test double replaying a fixed script of events for every URL.
    pub fn scripted(events: Vec<Result<DownloadEvent, DownloadError>>) -> Self {
        Self::new(move |_url| tokio_stream::iter(events.clone()))
    }

    pub fn start(&self, url: impl Into<String>) -> BoxStream<Result<DownloadEvent, DownloadError>> {
        (*self.start)(url.into())
    }
}
