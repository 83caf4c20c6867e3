//! Async-task-to-handle bindings with guaranteed, exactly-once cleanup.
//!
//! `register` parks a handle next to a pending task. When the task settles,
//! fulfilled or rejected, the binding is removed, the optional teardown runs,
//! and the handle is handed to the registry's [`Reclaim`] sink. Teardown
//! failures and task rejections are reported but never stop the release.
//! Cancellation is not modeled: once registered, only settlement (or an
//! explicit `cleanup`/`cleanup_all`) ends a binding.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use tokio::task::JoinHandle;

use reclaim_core::error::Error;
use reclaim_core::handle::Reclaim;
use reclaim_core::id::BindingToken;
use reclaim_core::time::now_ms;

use crate::lifecycle::Lifecycle;

/// Caller-supplied cleanup that runs before the handle is released.
pub type Teardown<H> = Box<dyn FnOnce(&mut H) -> Result<(), Error> + Send>;

/// Box a teardown closure for [`AsyncResourceRegistry::register`].
pub fn teardown<H, F>(f: F) -> Option<Teardown<H>>
where
    F: FnOnce(&mut H) -> Result<(), Error> + Send + 'static,
{
    Some(Box::new(f))
}

type Observer = Arc<dyn Fn(&RegistryEvent) + Send + Sync>;

/// Why a binding was cleaned up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CleanupCause {
    Fulfilled,
    Rejected,
    /// The task panicked or was dropped before settling.
    Abandoned,
    /// `cleanup(token)` ran before the task settled.
    Explicit,
    /// `cleanup_all()`.
    Shutdown,
}

/// Reported to the registry observer (if any).
#[derive(Debug, Clone, PartialEq)]
pub enum RegistryEvent {
    Rejected { token: BindingToken, error: String },
    TeardownFailed { token: BindingToken, error: String },
    Released { token: BindingToken, cause: CleanupCause },
}

struct Binding<H> {
    handle: H,
    teardown: Option<Teardown<H>>,
    label: Option<String>,
    bound_at_ms: u64,
}

/// Snapshot of a live binding, without its handle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BindingInfo {
    pub label: Option<String>,
    pub bound_at_ms: u64,
}

#[derive(Default)]
struct RegistryCounters {
    registered: AtomicU64,
    fulfilled: AtomicU64,
    rejected: AtomicU64,
    teardown_failures: AtomicU64,
    released: AtomicU64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct RegistryStats {
    pub registered: u64,
    pub fulfilled: u64,
    pub rejected: u64,
    pub teardown_failures: u64,
    pub released: u64,
    /// Bindings still waiting for their task.
    pub active: usize,
}

struct RegistryInner<H> {
    bindings: Mutex<HashMap<BindingToken, Binding<H>>>,
    sink: Box<dyn Reclaim<H>>,
    observer: Mutex<Option<Observer>>,
    counters: RegistryCounters,
}

impl<H: Send + 'static> RegistryInner<H> {
    fn bindings(&self) -> MutexGuard<'_, HashMap<BindingToken, Binding<H>>> {
        self.bindings.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn report(&self, event: RegistryEvent) {
        let observer = self
            .observer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        if let Some(observer) = observer {
            observer(&event);
        }
    }

    /// Remove and finish one binding. False if it was already gone.
    fn cleanup(&self, token: BindingToken, cause: CleanupCause) -> bool {
        let binding = self.bindings().remove(&token);
        match binding {
            Some(binding) => {
                self.finish(token, binding, cause);
                true
            }
            None => false,
        }
    }

    fn finish(&self, token: BindingToken, mut binding: Binding<H>, cause: CleanupCause) {
        if let Some(teardown) = binding.teardown.take() {
            let handle = &mut binding.handle;
            let failure = match catch_unwind(AssertUnwindSafe(move || teardown(handle))) {
                Ok(Ok(())) => None,
                Ok(Err(e)) => Some(e.to_string()),
                Err(panic) => Some(panic_message(panic.as_ref())),
            };
            if let Some(error) = failure {
                self.counters.teardown_failures.fetch_add(1, Ordering::Relaxed);
                #[cfg(feature = "tracing")]
                tracing::warn!(%token, %error, "teardown failed; releasing handle anyway");
                self.report(RegistryEvent::TeardownFailed { token, error });
            }
        }

        self.sink.reclaim(binding.handle);
        self.counters.released.fetch_add(1, Ordering::Relaxed);

        Lifecycle::BindingReleased {
            token,
            label: binding.label.as_deref(),
            cause,
            held_ms: now_ms().saturating_sub(binding.bound_at_ms),
        }
        .emit();
        self.report(RegistryEvent::Released { token, cause });
    }
}

/// Runs cleanup when the settling task finishes *or* is torn down early
/// (panic, runtime shutdown), so a binding can never outlive its task.
struct Settle<H: Send + 'static> {
    inner: Arc<RegistryInner<H>>,
    token: BindingToken,
    cause: CleanupCause,
}

impl<H: Send + 'static> Drop for Settle<H> {
    fn drop(&mut self) {
        self.inner.cleanup(self.token, self.cause);
    }
}

pub struct AsyncResourceRegistry<H> {
    inner: Arc<RegistryInner<H>>,
}

impl<H> Clone for AsyncResourceRegistry<H> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<H> fmt::Debug for AsyncResourceRegistry<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AsyncResourceRegistry").finish_non_exhaustive()
    }
}

impl<H: Send + 'static> AsyncResourceRegistry<H> {
    /// Create a registry that hands finished handles to `sink`
    /// (a `ResourcePool`, or a `ReclaimFn` for host-specific detach).
    pub fn new<R>(sink: R) -> Self
    where
        R: Reclaim<H> + 'static,
    {
        Self {
            inner: Arc::new(RegistryInner {
                bindings: Mutex::new(HashMap::new()),
                sink: Box::new(sink),
                observer: Mutex::new(None),
                counters: RegistryCounters::default(),
            }),
        }
    }

    /// Install an observer for rejections, teardown failures and releases.
    /// It is never called while registry locks are held.
    pub fn set_observer<F>(&self, observer: F)
    where
        F: Fn(&RegistryEvent) + Send + Sync + 'static,
    {
        *self
            .inner
            .observer
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(Arc::new(observer));
    }

    /// Bind `handle` to `task` and return the binding's token.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn register<F, T, E>(
        &self,
        task: F,
        handle: H,
        teardown: Option<Teardown<H>>,
    ) -> BindingToken
    where
        F: Future<Output = Result<T, E>> + Send + 'static,
        T: Send + 'static,
        E: fmt::Display + Send + 'static,
    {
        self.bind(task, handle, teardown).0
    }

    /// [`register`](Self::register) with a label that shows up in
    /// [`binding`](Self::binding) and in release traces.
    pub fn register_labeled<F, T, E>(
        &self,
        label: impl Into<String>,
        task: F,
        handle: H,
        teardown: Option<Teardown<H>>,
    ) -> BindingToken
    where
        F: Future<Output = Result<T, E>> + Send + 'static,
        T: Send + 'static,
        E: fmt::Display + Send + 'static,
    {
        self.spawn_binding(Some(label.into()), task, handle, teardown).0
    }

    /// Like [`register`](Self::register), but also returns the task's join
    /// handle so the caller can observe its output.
    pub fn bind<F, T, E>(
        &self,
        task: F,
        handle: H,
        teardown: Option<Teardown<H>>,
    ) -> (BindingToken, JoinHandle<Result<T, E>>)
    where
        F: Future<Output = Result<T, E>> + Send + 'static,
        T: Send + 'static,
        E: fmt::Display + Send + 'static,
    {
        self.spawn_binding(None, task, handle, teardown)
    }

    pub fn bind_labeled<F, T, E>(
        &self,
        label: impl Into<String>,
        task: F,
        handle: H,
        teardown: Option<Teardown<H>>,
    ) -> (BindingToken, JoinHandle<Result<T, E>>)
    where
        F: Future<Output = Result<T, E>> + Send + 'static,
        T: Send + 'static,
        E: fmt::Display + Send + 'static,
    {
        self.spawn_binding(Some(label.into()), task, handle, teardown)
    }

    fn spawn_binding<F, T, E>(
        &self,
        label: Option<String>,
        task: F,
        handle: H,
        teardown: Option<Teardown<H>>,
    ) -> (BindingToken, JoinHandle<Result<T, E>>)
    where
        F: Future<Output = Result<T, E>> + Send + 'static,
        T: Send + 'static,
        E: fmt::Display + Send + 'static,
    {
        let token = BindingToken::fresh();
        self.inner.bindings().insert(
            token,
            Binding {
                handle,
                teardown,
                label,
                bound_at_ms: now_ms(),
            },
        );
        self.inner.counters.registered.fetch_add(1, Ordering::Relaxed);

        let mut settle = Settle {
            inner: Arc::clone(&self.inner),
            token,
            cause: CleanupCause::Abandoned,
        };
        let join = tokio::spawn(async move {
            let outcome = task.await;
            settle.cause = match &outcome {
                Ok(_) => {
                    settle.inner.counters.fulfilled.fetch_add(1, Ordering::Relaxed);
                    CleanupCause::Fulfilled
                }
                Err(e) => {
                    let error = e.to_string();
                    settle.inner.counters.rejected.fetch_add(1, Ordering::Relaxed);
                    #[cfg(feature = "tracing")]
                    tracing::warn!(%token, %error, "bound task rejected; cleaning up");
                    settle.inner.report(RegistryEvent::Rejected { token, error });
                    CleanupCause::Rejected
                }
            };
            drop(settle);
            outcome
        });

        #[cfg(feature = "tracing")]
        tracing::trace!(%token, "binding registered");
        (token, join)
    }

    /// Clean up one binding now instead of waiting for its task.
    /// Returns false if the binding was already cleaned up.
    pub fn cleanup(&self, token: BindingToken) -> bool {
        self.inner.cleanup(token, CleanupCause::Explicit)
    }

    /// Clean up every binding immediately. Returns how many were cleaned.
    pub fn cleanup_all(&self) -> usize {
        let drained: Vec<(BindingToken, Binding<H>)> = self.inner.bindings().drain().collect();
        let n = drained.len();
        for (token, binding) in drained {
            self.inner.finish(token, binding, CleanupCause::Shutdown);
        }
        #[cfg(feature = "tracing")]
        tracing::debug!(cleaned = n, "registry cleanup_all");
        n
    }

    /// Label and bind time of a live binding.
    pub fn binding(&self, token: BindingToken) -> Option<BindingInfo> {
        self.inner.bindings().get(&token).map(|b| BindingInfo {
            label: b.label.clone(),
            bound_at_ms: b.bound_at_ms,
        })
    }

    pub fn contains(&self, token: BindingToken) -> bool {
        self.inner.bindings().contains_key(&token)
    }

    pub fn len(&self) -> usize {
        self.inner.bindings().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> RegistryStats {
        let c = &self.inner.counters;
        RegistryStats {
            registered: c.registered.load(Ordering::Relaxed),
            fulfilled: c.fulfilled.load(Ordering::Relaxed),
            rejected: c.rejected.load(Ordering::Relaxed),
            teardown_failures: c.teardown_failures.load(Ordering::Relaxed),
            released: c.released.load(Ordering::Relaxed),
            active: self.len(),
        }
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "teardown panicked".to_string()
    }
}
