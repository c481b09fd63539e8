//! Structured concurrency scope owning every async dispatch of one engine.
//!
//! The scope is created with the engine and outlives every coroutine spawned
//! under it. Each in-flight dispatch is tracked together with an abandon hook
//! so shutdown can fail whatever is still running instead of leaving its
//! pending result hanging.

use crate::error::{HandlerFailure, SchedulingFailure};
use crate::ids::DispatchId;
use crate::reporter::{ContextName, ErrorReporter};
use crate::runtime_config::{RuntimeConfig, DRAIN_POLL_INTERVAL};
use dashmap::DashMap;
use may::coroutine;
use serde::Serialize;
use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Cooperative cancellation signal shared by a scope and its dispatches
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    /// `Err(HandlerFailure::Cancelled)` once cancelled, for use with `?` in handler bodies.
    ///
    /// # Errors
    ///
    /// Returns [`HandlerFailure::Cancelled`] naming `scope` after cancellation.
    pub fn check(&self, scope: &str) -> Result<(), HandlerFailure> {
        if self.is_cancelled() {
            return Err(HandlerFailure::Cancelled {
                scope: scope.to_string(),
            });
        }
        Ok(())
    }
}

/// Called with the failure to deliver when a dispatch is abandoned
pub(crate) type AbandonHook = Box<dyn FnOnce(HandlerFailure) + Send + Sync>;

/// Counters for a dispatch scope
#[derive(Debug, Default)]
pub struct ScopeMetrics {
    spawned: AtomicU64,
    finished: AtomicU64,
    abandoned: AtomicU64,
    scheduling_failures: AtomicU64,
}

impl ScopeMetrics {
    fn record_spawn(&self) {
        self.spawned.fetch_add(1, Ordering::Relaxed);
    }

    fn record_finish(&self) {
        self.finished.fetch_add(1, Ordering::Relaxed);
    }

    fn record_abandon(&self) {
        self.abandoned.fetch_add(1, Ordering::Relaxed);
    }

    fn record_scheduling_failure(&self) {
        self.scheduling_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Async dispatches handed to the runtime
    #[must_use]
    pub fn spawned(&self) -> u64 {
        self.spawned.load(Ordering::Relaxed)
    }

    /// Async dispatches whose coroutine ran to the end
    #[must_use]
    pub fn finished(&self) -> u64 {
        self.finished.load(Ordering::Relaxed)
    }

    /// Dispatches failed as cancelled by shutdown
    #[must_use]
    pub fn abandoned(&self) -> u64 {
        self.abandoned.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn scheduling_failures(&self) -> u64 {
        self.scheduling_failures.load(Ordering::Relaxed)
    }
}

/// Result of shutting a scope down
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ShutdownReport {
    /// Dispatches that finished within the grace period
    pub drained: usize,
    /// Dispatches still running at the deadline, failed as cancelled
    pub abandoned: Vec<DispatchId>,
}

/// Owner of all async work spawned by one dispatch engine
pub struct TaskScope {
    name: Arc<str>,
    config: RuntimeConfig,
    reporter: Arc<dyn ErrorReporter>,
    token: CancellationToken,
    closed: AtomicBool,
    in_flight: DashMap<DispatchId, AbandonHook>,
    metrics: ScopeMetrics,
}

impl TaskScope {
    #[must_use]
    pub fn new(name: Arc<str>, config: RuntimeConfig, reporter: Arc<dyn ErrorReporter>) -> Self {
        Self {
            name,
            config,
            reporter,
            token: CancellationToken::new(),
            closed: AtomicBool::new(false),
            in_flight: DashMap::new(),
            metrics: ScopeMetrics::default(),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    #[must_use]
    pub fn metrics(&self) -> &ScopeMetrics {
        &self.metrics
    }

    #[must_use]
    pub fn cancellation(&self) -> &CancellationToken {
        &self.token
    }

    /// Dispatches currently running under this scope
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    pub(crate) fn context_name(&self, id: DispatchId) -> ContextName {
        ContextName::dispatch(Arc::clone(&self.name), id)
    }

    fn report(&self, id: DispatchId, failure: &SchedulingFailure) {
        self.metrics.record_scheduling_failure();
        self.reporter.report(&self.context_name(id), failure);
    }

    /// Run `task` on a new coroutine tracked by this scope.
    ///
    /// `abandon` fires at most once, with the failure to deliver, when the task
    /// cannot be scheduled, panics outside its own error handling, or is still
    /// running when shutdown gives up on it.
    ///
    /// # Errors
    ///
    /// [`SchedulingFailure`] if the scope is closed or the coroutine cannot be
    /// spawned. The failure has already been reported and passed to `abandon`.
    pub(crate) fn spawn<F>(
        self: &Arc<Self>,
        id: DispatchId,
        abandon: AbandonHook,
        task: F,
    ) -> Result<(), SchedulingFailure>
    where
        F: FnOnce(CancellationToken) + Send + 'static,
    {
        // Registered before the closed check so a concurrent shutdown either
        // sees the entry or this call sees the scope closed.
        self.in_flight.insert(id, abandon);
        if self.is_closed() {
            let failure = SchedulingFailure::ScopeClosed {
                scope: self.name.to_string(),
            };
            self.report(id, &failure);
            // Absent when shutdown already swept it and failed it as cancelled.
            if let Some((_, hook)) = self.in_flight.remove(&id) {
                hook(HandlerFailure::Scheduling(failure.clone()));
            }
            return Err(failure);
        }
        self.metrics.record_spawn();

        let scope = Arc::clone(self);
        let coroutine_name = self.context_name(id).to_string();
        let stack_size = self.config.stack_size;

        // SAFETY: may::coroutine::Builder::spawn() is marked unsafe by the may runtime.
        // The closure is Send + 'static and owns everything it touches; panics are
        // caught inside so none unwind across the coroutine boundary.
        let spawn_result = unsafe {
            coroutine::Builder::new()
                .name(coroutine_name.clone())
                .stack_size(stack_size)
                .spawn(move || {
                    let token = scope.token.clone();
                    if let Err(panic) = catch_unwind(AssertUnwindSafe(|| task(token))) {
                        let failure = SchedulingFailure::TaskPanicked {
                            context: scope.context_name(id).to_string(),
                            message: panic_message(panic.as_ref()),
                        };
                        error!(
                            dispatch_id = %id,
                            scope = %scope.name,
                            error = %failure,
                            "Dispatch coroutine panicked outside handler - CRITICAL"
                        );
                        scope.report(id, &failure);
                        if let Some((_, hook)) = scope.in_flight.remove(&id) {
                            hook(HandlerFailure::Scheduling(failure));
                        }
                    }
                    scope.finish(id);
                })
        };

        if let Err(e) = spawn_result {
            let failure = SchedulingFailure::Spawn {
                context: coroutine_name,
                message: e.to_string(),
            };
            error!(
                dispatch_id = %id,
                scope = %self.name,
                stack_size = stack_size,
                error = %e,
                "Failed to spawn dispatch coroutine - CRITICAL"
            );
            self.report(id, &failure);
            if let Some((_, hook)) = self.in_flight.remove(&id) {
                hook(HandlerFailure::Scheduling(failure.clone()));
            }
            return Err(failure);
        }

        Ok(())
    }

    fn finish(&self, id: DispatchId) {
        self.in_flight.remove(&id);
        self.metrics.record_finish();
        debug!(dispatch_id = %id, scope = %self.name, "Dispatch coroutine finished");
    }

    /// Close the scope, signal cancellation and wait up to `grace` for in-flight
    /// dispatches. Whatever is still running afterwards is failed as cancelled.
    ///
    /// Idempotent: a second call only abandons dispatches that slipped in
    /// before the first one closed the scope.
    pub fn shutdown(&self, grace: Duration) -> ShutdownReport {
        let was_closed = self.closed.swap(true, Ordering::AcqRel);
        self.token.cancel();

        let initial = self.in_flight.len();
        if !was_closed {
            info!(
                scope = %self.name,
                in_flight = initial,
                grace_ms = grace.as_millis() as u64,
                "Shutting down dispatch scope"
            );
        }

        let deadline = Instant::now() + grace;
        while !self.in_flight.is_empty() && Instant::now() < deadline {
            std::thread::sleep(DRAIN_POLL_INTERVAL);
        }

        let stragglers: Vec<DispatchId> = self.in_flight.iter().map(|e| *e.key()).collect();
        let mut abandoned = Vec::with_capacity(stragglers.len());
        for id in stragglers {
            if let Some((_, hook)) = self.in_flight.remove(&id) {
                warn!(
                    dispatch_id = %id,
                    scope = %self.name,
                    "Abandoning dispatch still running after shutdown grace period"
                );
                hook(HandlerFailure::Cancelled {
                    scope: self.name.to_string(),
                });
                self.metrics.record_abandon();
                abandoned.push(id);
            }
        }

        ShutdownReport {
            drained: initial.saturating_sub(abandoned.len()),
            abandoned,
        }
    }
}

/// Best-effort text of a panic payload
pub(crate) fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_check() {
        let token = CancellationToken::new();
        assert!(token.check("scope").is_ok());
        token.clone().cancel();
        assert!(token.is_cancelled());
        assert!(token.check("scope").unwrap_err().is_cancelled());
    }

    #[test]
    fn test_panic_message_variants() {
        let s: Box<dyn Any + Send> = Box::new("static");
        assert_eq!(panic_message(s.as_ref()), "static");
        let s: Box<dyn Any + Send> = Box::new(String::from("owned"));
        assert_eq!(panic_message(s.as_ref()), "owned");
        let s: Box<dyn Any + Send> = Box::new(7_u8);
        assert_eq!(panic_message(s.as_ref()), "non-string panic payload");
    }

    #[test]
    fn test_closed_scope_rejects_and_abandons() {
        let reports = Arc::new(std::sync::Mutex::new(Vec::new()));
        let sink = Arc::clone(&reports);
        let reporter = move |ctx: &ContextName, err: &SchedulingFailure| {
            sink.lock().unwrap().push((ctx.to_string(), err.clone()));
        };
        let scope = Arc::new(TaskScope::new(
            Arc::from("test-scope"),
            RuntimeConfig::default(),
            Arc::new(reporter),
        ));
        let report = scope.shutdown(Duration::ZERO);
        assert_eq!(report, ShutdownReport::default());

        let hit = Arc::new(std::sync::Mutex::new(None));
        let hit_hook = Arc::clone(&hit);
        let id = DispatchId::new();
        let err = scope
            .spawn(
                id,
                Box::new(move |failure| {
                    *hit_hook.lock().unwrap() = Some(failure.to_string());
                }),
                |_token| {},
            )
            .unwrap_err();

        assert!(matches!(err, SchedulingFailure::ScopeClosed { .. }));
        assert_eq!(
            hit.lock().unwrap().as_deref(),
            Some("dispatch scope `test-scope` is shut down")
        );
        let reports = reports.lock().unwrap();
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].0, format!("test-scope#{id}"));
        assert_eq!(scope.metrics().scheduling_failures(), 1);
        assert_eq!(scope.metrics().spawned(), 0);
    }

    #[test]
    fn test_spawn_racing_shutdown_never_strands_a_dispatch() {
        let scope = Arc::new(TaskScope::new(
            Arc::from("race-scope"),
            RuntimeConfig::default(),
            Arc::new(|_: &ContextName, _: &SchedulingFailure| {}),
        ));
        let release = Arc::new(AtomicBool::new(false));
        let settled = Arc::new(AtomicU64::new(0));
        let (threads, per_thread) = (4_u64, 50_u64);

        let spawners: Vec<_> = (0..threads)
            .map(|_| {
                let scope = Arc::clone(&scope);
                let release = Arc::clone(&release);
                let settled = Arc::clone(&settled);
                std::thread::spawn(move || {
                    for _ in 0..per_thread {
                        let settled = Arc::clone(&settled);
                        let release = Arc::clone(&release);
                        // Ignores cancellation, so only the abandon hook can settle it.
                        let _ = scope.spawn(
                            DispatchId::new(),
                            Box::new(move |_failure| {
                                settled.fetch_add(1, Ordering::SeqCst);
                            }),
                            move |_token| {
                                while !release.load(Ordering::Acquire) {
                                    coroutine::sleep(Duration::from_millis(1));
                                }
                            },
                        );
                    }
                })
            })
            .collect();

        std::thread::sleep(Duration::from_millis(2));
        scope.shutdown(Duration::ZERO);
        for spawner in spawners {
            spawner.join().unwrap();
        }

        assert_eq!(settled.load(Ordering::SeqCst), threads * per_thread);
        assert!(scope.in_flight.is_empty());
        release.store(true, Ordering::Release);
    }
}
