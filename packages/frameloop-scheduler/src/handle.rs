use crate::error::JobError;
use crate::registry::JobId;
use crate::task::TaskId;
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll, Waker};

/// Lifecycle of a deferred unit of work.
///
/// `Pending -> Queued -> Resolved` when the condition is met, or
/// `Pending -> Rejected` when cancelled. Nothing leaves a settled state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JobState {
    Pending,
    Queued,
    Resolved,
    Rejected,
}

impl JobState {
    pub fn is_settled(self) -> bool {
        matches!(self, JobState::Resolved | JobState::Rejected)
    }
}

/// Type-erased view of a completion, stored in the cancellation table.
pub(crate) trait Settle {
    fn state(&self) -> JobState;
    fn mark_queued(&self);
    fn reject(&self, error: JobError) -> bool;
    /// The rejection has a listener; don't warn when the handle is dropped.
    fn set_quiet(&self);
}

struct Inner<T> {
    state: JobState,
    outcome: Option<Result<T, JobError>>,
    waker: Option<Waker>,
    quiet: bool,
}

/// Shared slot between a `JobHandle` and the work that settles it.
pub(crate) struct Completion<T> {
    inner: RefCell<Inner<T>>,
}

impl<T> Completion<T> {
    pub(crate) fn new() -> Rc<Self> {
        Rc::new(Self {
            inner: RefCell::new(Inner {
                state: JobState::Pending,
                outcome: None,
                waker: None,
                quiet: false,
            }),
        })
    }

    pub(crate) fn resolve(&self, value: T) -> bool {
        self.settle(Ok(value))
    }

    fn settle(&self, outcome: Result<T, JobError>) -> bool {
        let waker = {
            let mut inner = self.inner.borrow_mut();
            if inner.state.is_settled() {
                return false;
            }
            inner.state = if outcome.is_ok() {
                JobState::Resolved
            } else {
                JobState::Rejected
            };
            inner.outcome = Some(outcome);
            inner.waker.take()
        };

        if let Some(waker) = waker {
            waker.wake();
        }
        true
    }
}

impl<T> Settle for Completion<T> {
    fn state(&self) -> JobState {
        self.inner.borrow().state
    }

    fn mark_queued(&self) {
        let mut inner = self.inner.borrow_mut();
        if inner.state == JobState::Pending {
            inner.state = JobState::Queued;
        }
    }

    fn reject(&self, error: JobError) -> bool {
        self.settle(Err(error))
    }

    fn set_quiet(&self) {
        self.inner.borrow_mut().quiet = true;
    }
}

/// Where a handle came from, used by `cancel_job` to find what to cancel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Origin {
    Job(JobId),
    Task(TaskId),
    /// Not backed by a registry slot (tweens).
    Detached,
}

/// Completion handle returned by every registration.
///
/// Await it (from a coroutine or any executor) to get the work's return value,
/// or inspect it directly with [`state`](Self::state) and
/// [`try_take`](Self::try_take). Dropping the handle does not cancel the job.
pub struct JobHandle<T> {
    origin: Origin,
    completion: Rc<Completion<T>>,
}

impl<T> JobHandle<T> {
    pub(crate) fn new(origin: Origin, completion: Rc<Completion<T>>) -> Self {
        Self { origin, completion }
    }

    pub(crate) fn origin(&self) -> Origin {
        self.origin
    }

    /// Identity of the completion, compared against the cancellation table
    /// so a handle from another scheduler never matches a foreign slot.
    pub(crate) fn completion_addr(&self) -> *const () {
        Rc::as_ptr(&self.completion) as *const ()
    }

    /// The registry slot backing this handle, if any.
    pub fn job_id(&self) -> Option<JobId> {
        match self.origin {
            Origin::Job(id) => Some(id),
            _ => None,
        }
    }

    pub fn state(&self) -> JobState {
        self.completion.inner.borrow().state
    }

    pub fn is_settled(&self) -> bool {
        self.state().is_settled()
    }

    /// Takes the outcome out of a settled handle. Returns `None` while the job
    /// is still pending and after the outcome has been taken once.
    pub fn try_take(&mut self) -> Option<Result<T, JobError>> {
        let mut inner = self.completion.inner.borrow_mut();
        let outcome = inner.outcome.take();
        if outcome.is_some() {
            inner.quiet = true;
        }
        outcome
    }

    /// Marks a rejection as handled so dropping the handle stays silent.
    pub fn silence_rejection(&self) {
        self.completion.set_quiet();
    }
}

impl<T> Future for JobHandle<T> {
    type Output = Result<T, JobError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let mut inner = self.completion.inner.borrow_mut();
        if let Some(outcome) = inner.outcome.take() {
            inner.quiet = true;
            return Poll::Ready(outcome);
        }
        assert!(
            !inner.state.is_settled(),
            "JobHandle polled after completion"
        );

        let stale = inner
            .waker
            .as_ref()
            .is_none_or(|waker| !waker.will_wake(cx.waker()));
        if stale {
            inner.waker = Some(cx.waker().clone());
        }
        Poll::Pending
    }
}

impl<T> Drop for JobHandle<T> {
    fn drop(&mut self) {
        let Ok(inner) = self.completion.inner.try_borrow() else {
            return;
        };
        if let Some(Err(error)) = &inner.outcome {
            if !inner.quiet {
                tracing::warn!(origin = ?self.origin, %error, "rejected job handle dropped without being observed");
            }
        }
    }
}

impl<T> fmt::Debug for JobHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobHandle")
            .field("origin", &self.origin)
            .field("state", &self.state())
            .finish()
    }
}
