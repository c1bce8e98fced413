//! Live listener handles.
//!
//! Each subscription runs one tokio task that reads the store's change feed
//! and calls the listener. Callback delivery goes through a [`DeliveryGate`]:
//! once [`Subscription::unsubscribe`] returns, no callback of that
//! subscription will start. Called from outside any listener callback it
//! also waits for an in-flight callback to finish. Called from inside a
//! callback (of this or any other subscription) it never waits, so listeners
//! may unsubscribe each other freely.

use std::cell::Cell;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::task::AbortHandle;
use tracing::debug;

static NEXT_SUBSCRIPTION_ID: AtomicU64 = AtomicU64::new(1);

thread_local! {
    /// Number of listener callbacks running on this thread.
    static DELIVERY_DEPTH: Cell<usize> = const { Cell::new(0) };
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn inside_callback() -> bool {
    DELIVERY_DEPTH.with(|depth| depth.get() > 0)
}

struct GateInner {
    open: AtomicBool,
    /// Held for the whole duration of a callback.
    delivery: Mutex<()>,
}

/// Serializes callbacks against cancellation.
#[derive(Clone)]
pub(crate) struct DeliveryGate {
    inner: Arc<GateInner>,
}

impl DeliveryGate {
    pub(crate) fn new() -> Self {
        Self {
            inner: Arc::new(GateInner {
                open: AtomicBool::new(true),
                delivery: Mutex::new(()),
            }),
        }
    }

    pub(crate) fn is_open(&self) -> bool {
        self.inner.open.load(Ordering::SeqCst)
    }

    /// Run `callback` unless the gate is closed. Returns whether the gate is
    /// still open afterwards, i.e. whether delivery should continue.
    pub(crate) fn deliver(&self, callback: impl FnOnce()) -> bool {
        let _delivery = lock(&self.inner.delivery);
        if !self.is_open() {
            return false;
        }
        {
            let _scope = CallbackScope::enter();
            callback();
        }
        self.is_open()
    }

    /// Close the gate. Returns whether this call did the closing.
    ///
    /// Outside a callback, waits for an in-flight callback on another thread
    /// to finish. Inside one, only the flag flips: waiting there could block
    /// on a gate whose callback is itself waiting on ours.
    pub(crate) fn close(&self) -> bool {
        let was_open = self.inner.open.swap(false, Ordering::SeqCst);
        if !inside_callback() {
            drop(lock(&self.inner.delivery));
        }
        was_open
    }
}

/// Marks the current thread as running a listener callback.
struct CallbackScope;

impl CallbackScope {
    fn enter() -> Self {
        DELIVERY_DEPTH.with(|depth| depth.set(depth.get() + 1));
        Self
    }
}

impl Drop for CallbackScope {
    fn drop(&mut self) {
        DELIVERY_DEPTH.with(|depth| depth.set(depth.get().saturating_sub(1)));
    }
}

/// Handle to a live listener. Dropping it unsubscribes.
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    id: u64,
    path: String,
    gate: DeliveryGate,
    task: AbortHandle,
}

impl Subscription {
    /// Spawn the delivery task built by `run` onto the current tokio runtime.
    ///
    /// The gate handed to `run` must wrap every listener callback.
    pub(crate) fn spawn<F>(path: String, run: impl FnOnce(DeliveryGate) -> F) -> Self
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let id = NEXT_SUBSCRIPTION_ID.fetch_add(1, Ordering::Relaxed);
        let gate = DeliveryGate::new();
        let task_gate = gate.clone();
        let fut = run(gate.clone());

        let task_path = path.clone();
        let handle = tokio::spawn(async move {
            fut.await;
            if task_gate.close() {
                debug!(subscription = id, path = %task_path, "subscription terminated");
            }
        });

        debug!(subscription = id, path = %path, "subscription started");
        Self {
            id,
            path,
            gate,
            task: handle.abort_handle(),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// Store path this subscription listens on.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// `false` once unsubscribed or terminated by an error.
    pub fn is_active(&self) -> bool {
        self.gate.is_open()
    }

    /// Detach the listener. Idempotent.
    pub fn unsubscribe(&self) {
        if self.gate.close() {
            debug!(subscription = self.id, path = %self.path, "unsubscribed");
        }
        self.task.abort();
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("path", &self.path)
            .field("active", &self.is_active())
            .finish()
    }
}
