//! Single-assignment completion slot bridging a handler coroutine back to the transport.

use crate::error::{DoubleCompletion, HandlerFailure};
use crate::ids::DispatchId;
use serde::Serialize;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// Observable state of a [`PendingResult`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PendingState {
    Pending,
    Completed,
    Failed,
}

impl fmt::Display for PendingState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PendingState::Pending => "pending",
            PendingState::Completed => "completed",
            PendingState::Failed => "failed",
        })
    }
}

enum Slot<R> {
    Pending,
    Ready(Result<R, HandlerFailure>),
    /// Outcome handed to a waiter; the terminal state is remembered
    Taken(PendingState),
}

impl<R> Slot<R> {
    fn state(&self) -> PendingState {
        match self {
            Slot::Pending => PendingState::Pending,
            Slot::Ready(Ok(_)) => PendingState::Completed,
            Slot::Ready(Err(_)) => PendingState::Failed,
            Slot::Taken(state) => *state,
        }
    }
}

struct Shared<R> {
    id: DispatchId,
    slot: Mutex<Slot<R>>,
    settled: Condvar,
    rejected: AtomicUsize,
}

/// Pending-result handle for one async dispatch.
///
/// Clones share the same slot. The slot moves from pending to completed or
/// failed exactly once; later attempts return [`DoubleCompletion`] and leave
/// the first outcome in place. Completion and waiting are safe from any thread
/// or coroutine.
///
/// The outcome is moved out by the first successful [`wait`](Self::wait),
/// [`wait_timeout`](Self::wait_timeout) or [`try_take`](Self::try_take);
/// subsequent takers get [`HandlerFailure::Consumed`].
pub struct PendingResult<R> {
    shared: Arc<Shared<R>>,
}

impl<R> Clone for PendingResult<R> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<R> fmt::Debug for PendingResult<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingResult")
            .field("id", &self.shared.id)
            .field("state", &self.state())
            .finish()
    }
}

impl<R> Default for PendingResult<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R> PendingResult<R> {
    #[must_use]
    pub fn new() -> Self {
        Self::with_id(DispatchId::new())
    }

    #[must_use]
    pub fn with_id(id: DispatchId) -> Self {
        Self {
            shared: Arc::new(Shared {
                id,
                slot: Mutex::new(Slot::Pending),
                settled: Condvar::new(),
                rejected: AtomicUsize::new(0),
            }),
        }
    }

    #[must_use]
    pub fn id(&self) -> DispatchId {
        self.shared.id
    }

    fn lock(&self) -> MutexGuard<'_, Slot<R>> {
        self.shared
            .slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Complete with a value.
    ///
    /// # Errors
    ///
    /// [`DoubleCompletion`] if the result already reached a terminal state.
    pub fn complete(&self, value: R) -> Result<(), DoubleCompletion> {
        self.settle(Ok(value))
    }

    /// Complete with a failure.
    ///
    /// # Errors
    ///
    /// [`DoubleCompletion`] if the result already reached a terminal state.
    pub fn fail(&self, failure: HandlerFailure) -> Result<(), DoubleCompletion> {
        self.settle(Err(failure))
    }

    /// Complete with either outcome.
    ///
    /// # Errors
    ///
    /// [`DoubleCompletion`] if the result already reached a terminal state.
    pub fn settle(&self, outcome: Result<R, HandlerFailure>) -> Result<(), DoubleCompletion> {
        let mut slot = self.lock();
        if let Slot::Pending = *slot {
            *slot = Slot::Ready(outcome);
            drop(slot);
            self.shared.settled.notify_all();
            return Ok(());
        }

        let state = slot.state();
        drop(slot);
        self.shared.rejected.fetch_add(1, Ordering::Relaxed);
        Err(DoubleCompletion {
            id: self.shared.id,
            state,
        })
    }

    #[must_use]
    pub fn state(&self) -> PendingState {
        self.lock().state()
    }

    #[must_use]
    pub fn is_done(&self) -> bool {
        self.state() != PendingState::Pending
    }

    /// Number of completion attempts rejected after the first one
    #[must_use]
    pub fn rejected_completions(&self) -> usize {
        self.shared.rejected.load(Ordering::Relaxed)
    }

    /// Take the outcome if the result has settled, without blocking.
    #[must_use]
    pub fn try_take(&self) -> Option<Result<R, HandlerFailure>> {
        let mut slot = self.lock();
        take_settled(&mut slot)
    }

    /// Block until the result settles and take its outcome.
    pub fn wait(&self) -> Result<R, HandlerFailure> {
        let mut slot = self.lock();
        while let Slot::Pending = *slot {
            slot = self
                .shared
                .settled
                .wait(slot)
                .unwrap_or_else(PoisonError::into_inner);
        }
        take_settled(&mut slot).unwrap_or(Err(HandlerFailure::Consumed))
    }

    /// Block for at most `timeout`; `None` if the result is still pending.
    #[must_use]
    pub fn wait_timeout(&self, timeout: Duration) -> Option<Result<R, HandlerFailure>> {
        let slot = self.lock();
        let (mut slot, _) = self
            .shared
            .settled
            .wait_timeout_while(slot, timeout, |s| matches!(s, Slot::Pending))
            .unwrap_or_else(PoisonError::into_inner);
        take_settled(&mut slot)
    }
}

fn take_settled<R>(slot: &mut Slot<R>) -> Option<Result<R, HandlerFailure>> {
    match slot {
        Slot::Pending => None,
        Slot::Taken(_) => Some(Err(HandlerFailure::Consumed)),
        Slot::Ready(_) => {
            let state = slot.state();
            match std::mem::replace(slot, Slot::Taken(state)) {
                Slot::Ready(outcome) => Some(outcome),
                _ => None,
            }
        }
    }
}
