//! Typed event dispatch.
//!
//! Each event type gets one [`EventDispatcher`], created lazily by the
//! [`EventBus`] together with the event's [`FilterTable`]. Publishing an
//! event matches it against every registered [`Filter`] and starts one task
//! per matching callback:
//!
//! ```rust,ignore
//! use kasumi_framework::{EventBus, events::MessageCreate};
//! use kasumi_core::Filter;
//!
//! let bus = EventBus::new();
//! let id = bus.add_callback(Filter::new().with("content", "ping"), |e: Arc<MessageCreate>| async move {
//!     e.reply("pong").await?;
//!     Ok::<_, BoxError>(())
//! });
//!
//! bus.trigger(event);
//! bus.remove_callback::<MessageCreate>(id);
//! ```
//!
//! # Snapshots
//!
//! The registration list is copy-on-write. A trigger iterates over the
//! snapshot current at the time it started, so callbacks added or removed
//! while a dispatch is in flight never cause skipped or repeated entries.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use futures::FutureExt;
use futures::future::BoxFuture;
use kasumi_core::{Event, Filter, FilterTable};
use parking_lot::RwLock;
use tracing::{debug, debug_span, warn};

use crate::error::BoxError;
use crate::hook::{ExceptionHook, ExceptionSource};
use crate::runner::TaskRunner;

/// Opaque handle of a registered callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CallbackId(u64);

impl CallbackId {
    fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for CallbackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

// =============================================================================
// Callbacks
// =============================================================================

/// Output types a callback may return.
pub trait CallbackResult: Send + 'static {
    fn into_result(self) -> Result<(), BoxError>;
}

impl CallbackResult for () {
    fn into_result(self) -> Result<(), BoxError> {
        Ok(())
    }
}

impl<E> CallbackResult for Result<(), E>
where
    E: Into<BoxError> + Send + 'static,
{
    fn into_result(self) -> Result<(), BoxError> {
        self.map_err(Into::into)
    }
}

/// A type-erased callback body.
pub type BoxedCallback<E> =
    Arc<dyn Fn(Arc<E>) -> BoxFuture<'static, Result<(), BoxError>> + Send + Sync>;

/// Erases an async closure into a [`BoxedCallback`].
pub fn boxed_callback<E, F, Fut>(f: F) -> BoxedCallback<E>
where
    E: Event,
    F: Fn(Arc<E>) -> Fut + Send + Sync + 'static,
    Fut: Future + Send + 'static,
    Fut::Output: CallbackResult,
{
    Arc::new(move |event| f(event).map(CallbackResult::into_result).boxed())
}

struct Registration<E> {
    id: CallbackId,
    filter: Filter,
    callback: BoxedCallback<E>,
}

// =============================================================================
// Event Dispatcher
// =============================================================================

/// Registered callbacks of one event type.
pub struct EventDispatcher<E: Event> {
    table: FilterTable<E>,
    registrations: RwLock<Arc<Vec<Arc<Registration<E>>>>>,
    runner: TaskRunner,
}

impl<E: Event> EventDispatcher<E> {
    /// Creates a dispatcher, building the event's rule table once.
    pub fn new(runner: TaskRunner) -> Self {
        Self {
            table: E::filter_table(),
            registrations: RwLock::new(Arc::new(Vec::new())),
            runner,
        }
    }

    pub fn table(&self) -> &FilterTable<E> {
        &self.table
    }

    /// Registers `callback` for every event satisfying `filter`.
    pub fn add_callback(&self, filter: Filter, callback: BoxedCallback<E>) -> CallbackId {
        for key in filter.keys() {
            if !self.table.has_dimension(key) {
                warn!(event = E::NAME, key, "ignoring unknown filter key");
            }
        }

        let id = CallbackId::next();
        let registration = Arc::new(Registration {
            id,
            filter,
            callback,
        });
        let mut guard = self.registrations.write();
        let mut next = Vec::clone(&guard);
        next.push(registration);
        *guard = Arc::new(next);
        debug!(event = E::NAME, %id, "callback registered");
        id
    }

    /// Deregisters a callback. Returns whether it was registered.
    pub fn remove_callback(&self, id: CallbackId) -> bool {
        let mut guard = self.registrations.write();
        if !guard.iter().any(|r| r.id == id) {
            return false;
        }
        let next = guard.iter().filter(|r| r.id != id).cloned().collect();
        *guard = Arc::new(next);
        debug!(event = E::NAME, %id, "callback removed");
        true
    }

    pub fn len(&self) -> usize {
        self.registrations.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Publishes `event`, starting one task per matching callback.
    ///
    /// Returns the number of callbacks started. Never waits for them.
    pub fn trigger(&self, event: impl Into<E>) -> usize {
        let span = debug_span!("dispatch", event = E::NAME);
        let _enter = span.enter();

        let event = Arc::new(event.into());
        let snapshot = Arc::clone(&self.registrations.read());
        let mut started = 0;
        for registration in snapshot.iter() {
            if !self.table.matches(&event, &registration.filter) {
                continue;
            }
            let fut = (registration.callback)(Arc::clone(&event));
            self.runner
                .spawn(ExceptionSource::Event, E::NAME, span.clone(), fut);
            started += 1;
        }
        debug!(started, "event dispatched");
        started
    }
}

impl<E: Event> fmt::Debug for EventDispatcher<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventDispatcher")
            .field("event", &E::NAME)
            .field("table", &self.table)
            .field("callbacks", &self.len())
            .finish()
    }
}

// =============================================================================
// Event Bus
// =============================================================================

/// The set of dispatchers of one bot, keyed by event type.
#[derive(Default)]
pub struct EventBus {
    dispatchers: RwLock<HashMap<TypeId, Arc<dyn Any + Send + Sync>>>,
    runner: TaskRunner,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the dispatcher for `E`, creating it on first use.
    pub fn dispatcher<E: Event>(&self) -> Arc<EventDispatcher<E>> {
        if let Some(existing) = self.existing::<E>() {
            return existing;
        }
        let mut map = self.dispatchers.write();
        let entry = map
            .entry(TypeId::of::<E>())
            .or_insert_with(|| Arc::new(EventDispatcher::<E>::new(self.runner.clone())));
        Arc::clone(entry)
            .downcast::<EventDispatcher<E>>()
            .unwrap_or_else(|_| Arc::new(EventDispatcher::new(self.runner.clone())))
    }

    fn existing<E: Event>(&self) -> Option<Arc<EventDispatcher<E>>> {
        let any = self.dispatchers.read().get(&TypeId::of::<E>()).cloned()?;
        any.downcast::<EventDispatcher<E>>().ok()
    }

    /// Registers an async callback for `E`.
    pub fn add_callback<E, F, Fut>(&self, filter: Filter, f: F) -> CallbackId
    where
        E: Event,
        F: Fn(Arc<E>) -> Fut + Send + Sync + 'static,
        Fut: Future + Send + 'static,
        Fut::Output: CallbackResult,
    {
        self.dispatcher::<E>()
            .add_callback(filter, boxed_callback(f))
    }

    pub fn remove_callback<E: Event>(&self, id: CallbackId) -> bool {
        self.existing::<E>()
            .is_some_and(|dispatcher| dispatcher.remove_callback(id))
    }

    /// Publishes an event. Returns 0 when nothing was ever registered for `E`.
    pub fn trigger<E: Event>(&self, event: impl Into<E>) -> usize {
        match self.existing::<E>() {
            Some(dispatcher) => dispatcher.trigger(event),
            None => 0,
        }
    }

    /// The runner every callback of this bus is spawned on.
    pub fn runner(&self) -> &TaskRunner {
        &self.runner
    }

    pub fn set_hook(&self, hook: impl ExceptionHook) {
        self.runner.set_hook(hook);
    }

    /// Waits for every in-flight callback and command task.
    pub async fn drain(&self) {
        self.runner.drain().await;
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("event_types", &self.dispatchers.read().len())
            .field("runner", &self.runner)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Halt;
    use crate::hook::Exception;
    use kasumi_core::{Accept, Cmp, FilterValue, ValueKind};
    use parking_lot::Mutex;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    struct Tick {
        n: i64,
        label: &'static str,
    }

    impl Event for Tick {
        const NAME: &'static str = "tick";

        fn filter_table() -> FilterTable<Self> {
            FilterTable::new()
                .rule("n", Accept::Kind(ValueKind::Int), |e: &Tick| Some(e.n.into()), Cmp::Eq)
                .rule("label", Accept::Any, |e: &Tick| Some(e.label.into()), Cmp::Case)
        }
    }

    fn tick(n: i64) -> Tick {
        Tick { n, label: "tock" }
    }

    fn counter(bus: &EventBus, filter: Filter) -> (CallbackId, Arc<AtomicUsize>) {
        let hits = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&hits);
        let id = bus.add_callback(filter, move |_: Arc<Tick>| {
            let seen = Arc::clone(&seen);
            async move {
                seen.fetch_add(1, Ordering::SeqCst);
            }
        });
        (id, hits)
    }

    #[tokio::test]
    async fn triggers_only_matching_callbacks() {
        let bus = EventBus::new();
        let (_, all) = counter(&bus, Filter::new());
        let (_, two) = counter(&bus, Filter::new().with("n", 2i64));
        let (_, pattern) = counter(
            &bus,
            Filter::new().with("label", FilterValue::pattern("^to").unwrap()),
        );

        assert_eq!(bus.trigger::<Tick>(tick(1)), 2);
        assert_eq!(bus.trigger::<Tick>(tick(2)), 3);
        bus.drain().await;

        assert_eq!(all.load(Ordering::SeqCst), 2);
        assert_eq!(two.load(Ordering::SeqCst), 1);
        assert_eq!(pattern.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn trigger_without_registrations_is_a_no_op() {
        let bus = EventBus::new();
        assert_eq!(bus.trigger::<Tick>(tick(1)), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn callbacks_run_concurrently() {
        let bus = EventBus::new();
        let (tx, rx) = tokio::sync::oneshot::channel::<()>();
        let rx = Arc::new(Mutex::new(Some(rx)));
        let tx = Arc::new(Mutex::new(Some(tx)));

        // The first callback waits on a signal only the second one sends.
        bus.add_callback(Filter::new(), move |_: Arc<Tick>| {
            let rx = rx.lock().take();
            async move {
                if let Some(rx) = rx {
                    rx.await?;
                }
                Ok::<_, BoxError>(())
            }
        });
        bus.add_callback(Filter::new(), move |_: Arc<Tick>| {
            let tx = tx.lock().take();
            async move {
                if let Some(tx) = tx {
                    let _ = tx.send(());
                }
            }
        });

        bus.trigger::<Tick>(tick(1));
        tokio::time::timeout(Duration::from_secs(5), bus.drain())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn failures_are_isolated_and_reported() {
        let bus = EventBus::new();
        let reported = Arc::new(Mutex::new(Vec::<Exception>::new()));
        let sink = Arc::clone(&reported);
        bus.set_hook(move |e: &Exception| sink.lock().push(e.clone()));

        bus.add_callback(Filter::new(), |_: Arc<Tick>| async {
            Err::<(), _>("callback exploded")
        });
        bus.add_callback(Filter::new(), |_: Arc<Tick>| async { Err::<(), _>(Halt) });
        let (_, survivor) = counter(&bus, Filter::new());

        assert_eq!(bus.trigger::<Tick>(tick(1)), 3);
        bus.drain().await;

        assert_eq!(survivor.load(Ordering::SeqCst), 1);
        let reported = reported.lock();
        assert_eq!(reported.len(), 1);
        assert_eq!(reported[0].context, "tick");
        assert_eq!(reported[0].source, ExceptionSource::Event);
    }

    #[tokio::test]
    async fn removal_during_dispatch_keeps_other_entries() {
        let bus = Arc::new(EventBus::new());
        let (victim, victim_hits) = counter(&bus, Filter::new());

        let remover_bus = Arc::clone(&bus);
        bus.add_callback(Filter::new(), move |_: Arc<Tick>| {
            let bus = Arc::clone(&remover_bus);
            async move {
                bus.remove_callback::<Tick>(victim);
            }
        });
        let (_, tail) = counter(&bus, Filter::new());

        assert_eq!(bus.trigger::<Tick>(tick(1)), 3);
        bus.drain().await;
        assert_eq!(bus.trigger::<Tick>(tick(2)), 2);
        bus.drain().await;

        assert_eq!(victim_hits.load(Ordering::SeqCst), 1);
        assert_eq!(tail.load(Ordering::SeqCst), 2);
        assert!(!bus.remove_callback::<Tick>(victim));
    }

    #[tokio::test]
    async fn unknown_keys_do_not_block_matching() {
        let bus = EventBus::new();
        let (_, hits) = counter(&bus, Filter::new().with("colour", "red"));
        bus.trigger::<Tick>(tick(1));
        bus.drain().await;
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }
}
