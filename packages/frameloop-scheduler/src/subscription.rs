use crate::error::JobError;
use crate::handle::{Completion, Settle};
use crate::registry::JobId;
use std::cell::Cell;
use std::rc::{Rc, Weak};

/// Removes a pending registration without knowing the scheduler's context types.
pub(crate) trait CancelPending {
    fn cancel_pending(&self, id: JobId) -> bool;
}

/// Shared between a subscription's task and its `Subscription` handle.
pub(crate) struct SubscriptionState {
    active: Cell<bool>,
    /// Registry slot of the currently armed run.
    pending: Cell<Option<JobId>>,
}

impl SubscriptionState {
    pub(crate) fn new() -> Rc<Self> {
        Rc::new(Self {
            active: Cell::new(true),
            pending: Cell::new(None),
        })
    }

    pub(crate) fn is_active(&self) -> bool {
        self.active.get()
    }

    pub(crate) fn armed(&self, id: JobId) {
        self.pending.set(Some(id));
    }

    /// Returns whether the subscription was still active.
    pub(crate) fn deactivate(&self) -> bool {
        self.pending.set(None);
        self.active.replace(false)
    }

    fn take_pending(&self) -> Option<JobId> {
        self.pending.take()
    }
}

/// Handle to a per-frame subscription created by `subscribe`.
///
/// Dropping it leaves the subscription running; call
/// [`unsubscribe`](Self::unsubscribe) to stop it.
pub struct Subscription {
    state: Rc<SubscriptionState>,
    scheduler: Weak<dyn CancelPending>,
}

impl Subscription {
    pub(crate) fn new(state: Rc<SubscriptionState>, scheduler: Weak<dyn CancelPending>) -> Self {
        Self { state, scheduler }
    }

    pub fn is_active(&self) -> bool {
        self.state.is_active()
    }

    /// Stops the subscription. If the current run is already queued for this
    /// tick it is skipped. Returns `false` (and logs) if it was already stopped.
    pub fn unsubscribe(&self) -> bool {
        if !self.stop() {
            tracing::warn!("tried to unsubscribe a subscription that is no longer active");
            return false;
        }
        true
    }

    pub(crate) fn stop(&self) -> bool {
        let pending = self.state.take_pending();
        if !self.state.deactivate() {
            return false;
        }
        if let (Some(id), Some(scheduler)) = (pending, self.scheduler.upgrade()) {
            scheduler.cancel_pending(id);
        }
        true
    }
}

/// Cancels a running tween, returned alongside its completion handle.
pub struct TweenCanceller {
    subscription: Subscription,
    completion: Rc<Completion<()>>,
}

impl TweenCanceller {
    pub(crate) fn new(subscription: Subscription, completion: Rc<Completion<()>>) -> Self {
        Self {
            subscription,
            completion,
        }
    }

    pub fn is_running(&self) -> bool {
        self.subscription.is_active()
    }

    /// Stops the tween and rejects its handle with [`JobError::TweenCancelled`].
    /// Returns `false` if the tween had already finished or been cancelled.
    pub fn cancel(&self) -> bool {
        self.subscription.stop();
        self.completion.set_quiet();
        self.completion.reject(JobError::TweenCancelled)
    }
}
