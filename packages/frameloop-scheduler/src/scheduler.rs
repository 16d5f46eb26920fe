use crate::cancel::CancellationTable;
use crate::clock::VirtualClock;
use crate::condition::Condition;
use crate::error::{JobError, SchedulerError, panic_message};
use crate::handle::{Completion, JobHandle, JobState, Origin, Settle};
use crate::queue::{ExecutionQueue, QueuedJob};
use crate::registry::{JobId, JobRegistry, RepeatBody, RepeatingTask, Work};
use crate::subscription::{CancelPending, Subscription, SubscriptionState};
use crate::task::{TaskId, TaskSet};
use serde::{Deserialize, Serialize};
use std::cell::{Cell, RefCell};
use std::future::Future;
use std::ops::ControlFlow;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::rc::Rc;
use std::task::{Context, Poll};
use std::time::Duration;
use tracing::{debug, error, trace, warn};

/// What a single `tick` did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TickStats {
    /// Frame counter after this tick.
    pub frame: u64,
    /// Virtual seconds after this tick.
    pub elapsed: f64,
    /// Jobs moved from the registry to the execution queue.
    pub promoted: usize,
    /// Queue entries drained.
    pub executed: usize,
    /// Work, predicates or coroutines that panicked.
    pub failed: usize,
    /// Jobs still waiting when the tick ended.
    pub pending: usize,
    pub coroutines_polled: usize,
}

pub(crate) struct Core<S, A> {
    clock: Cell<VirtualClock>,
    delta: Cell<f64>,
    registry: RefCell<JobRegistry<S, A>>,
    queue: ExecutionQueue<S, A>,
    table: RefCell<CancellationTable>,
    tasks: RefCell<TaskSet>,
    ticking: Cell<bool>,
}

impl<S, A> CancelPending for Core<S, A> {
    fn cancel_pending(&self, id: JobId) -> bool {
        let removed = self.registry.borrow_mut().remove(id);
        removed.is_some()
    }
}

/// Resets the re-entrancy flag even if a tick unwinds.
struct TickGuard<'a>(&'a Cell<bool>);

impl Drop for TickGuard<'_> {
    fn drop(&mut self) {
        self.0.set(false);
    }
}

enum Readiness {
    Ready,
    NotYet,
    Gone,
    Panicked(String),
}

/// Frame-driven job scheduler.
///
/// The host calls [`tick`](Self::tick) once per frame with the frame delta;
/// everything else (deferred work, virtual-clock timeouts, subscriptions,
/// tweens, coroutines) advances only inside that call. `S` and `A` are the
/// host's per-frame context and auxiliary context, handed unchanged to
/// subscribers.
///
/// Cloning is cheap and every clone drives the same scheduler, so work can
/// capture a clone to register follow-up jobs. The scheduler is
/// single-threaded and not `Send`.
pub struct JobScheduler<S = (), A = ()> {
    pub(crate) core: Rc<Core<S, A>>,
}

impl<S, A> Clone for JobScheduler<S, A> {
    fn clone(&self) -> Self {
        Self {
            core: self.core.clone(),
        }
    }
}

impl<S, A> std::fmt::Debug for JobScheduler<S, A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobScheduler")
            .field("clock", &self.core.clock.get())
            .field("pending", &self.core.registry.borrow().len())
            .field("tasks", &self.core.tasks.borrow().len())
            .finish()
    }
}

impl<S: 'static, A: 'static> Default for JobScheduler<S, A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: 'static, A: 'static> JobScheduler<S, A> {
    pub fn new() -> Self {
        Self::with_clock(VirtualClock::new())
    }

    /// Starts from an existing clock, e.g. when resuming a world.
    pub fn with_clock(clock: VirtualClock) -> Self {
        Self {
            core: Rc::new(Core {
                clock: Cell::new(clock),
                delta: Cell::new(0.0),
                registry: RefCell::new(JobRegistry::new()),
                queue: ExecutionQueue::new(),
                table: RefCell::new(CancellationTable::new()),
                tasks: RefCell::new(TaskSet::new()),
                ticking: Cell::new(false),
            }),
        }
    }

    pub fn clock(&self) -> VirtualClock {
        self.core.clock.get()
    }

    /// Virtual seconds accumulated from tick deltas.
    pub fn elapsed(&self) -> f64 {
        self.core.clock.get().elapsed()
    }

    pub fn frame_count(&self) -> u64 {
        self.core.clock.get().frame()
    }

    /// Delta of the most recent tick.
    pub fn delta(&self) -> f64 {
        self.core.delta.get()
    }

    /// Jobs (including armed subscription runs) waiting for their condition.
    pub fn pending_jobs(&self) -> usize {
        self.core.registry.borrow().len()
    }

    /// Entries promoted but not drained yet. Only non-zero during the
    /// promotion scan (e.g. read from a predicate); draining takes the whole
    /// batch out first.
    pub fn queued_jobs(&self) -> usize {
        self.core.queue.len()
    }

    /// One-shot handles that can still settle.
    pub fn tracked_handles(&self) -> usize {
        self.core.table.borrow().len()
    }

    /// Live coroutines.
    pub fn running_tasks(&self) -> usize {
        self.core.tasks.borrow().len()
    }

    pub fn is_idle(&self) -> bool {
        self.pending_jobs() == 0 && self.running_tasks() == 0
    }

    /// Advances the virtual clock by `delta` seconds and one frame, promotes
    /// every job whose condition holds, runs them in promotion order, then
    /// resumes the coroutines that were woken.
    ///
    /// Jobs registered during this call (by predicates, work, subscribers or
    /// coroutines) are evaluated on the next tick at the earliest.
    pub fn tick(&self, frame: &S, delta: f64, aux: Option<&A>) -> Result<TickStats, SchedulerError> {
        if self.core.ticking.get() {
            return Err(SchedulerError::ReentrantTick);
        }
        if !delta.is_finite() || delta < 0.0 {
            return Err(SchedulerError::InvalidDelta(delta));
        }
        self.core.ticking.set(true);
        let _guard = TickGuard(&self.core.ticking);

        let mut clock = self.core.clock.get();
        clock.advance(delta);
        self.core.clock.set(clock);
        self.core.delta.set(delta);

        let mut stats = TickStats {
            frame: clock.frame(),
            elapsed: clock.elapsed(),
            ..TickStats::default()
        };

        self.promote_ready(&clock, &mut stats);
        self.drain(frame, delta, aux, &mut stats);
        self.poll_tasks(&mut stats);

        stats.pending = self.pending_jobs();
        trace!(
            frame = stats.frame,
            promoted = stats.promoted,
            executed = stats.executed,
            pending = stats.pending,
            "tick complete"
        );
        Ok(stats)
    }

    fn promote_ready(&self, clock: &VirtualClock, stats: &mut TickStats) {
        let snapshot = self.core.registry.borrow().snapshot();

        for id in snapshot {
            match self.readiness(id, clock) {
                Readiness::Ready => {
                    let job = self.core.registry.borrow_mut().remove(id);
                    let Some(job) = job else { continue };
                    if let Some(settle) = self.core.table.borrow().get(id) {
                        settle.mark_queued();
                    }
                    trace!(job = ?id, "promoted job");
                    self.core.queue.push(QueuedJob { id, work: job.work });
                    stats.promoted += 1;
                }
                Readiness::Panicked(message) => {
                    let job = self.core.registry.borrow_mut().remove(id);
                    stats.failed += 1;
                    error!(job = ?id, %message, "job condition panicked");
                    if let Some(job) = job {
                        self.fail_work(id, job.work, message);
                    }
                }
                Readiness::NotYet | Readiness::Gone => {}
            }
        }
    }

    /// Evaluates one job's condition. User predicates are taken out of the
    /// registry while they run so they can register or cancel jobs.
    fn readiness(&self, id: JobId, clock: &VirtualClock) -> Readiness {
        let mut predicate = {
            let mut registry = self.core.registry.borrow_mut();
            let Some(job) = registry.get_mut(id) else {
                return Readiness::Gone;
            };
            match &mut job.condition {
                None => return Readiness::Ready,
                Some(Condition::Until(predicate)) => {
                    let placeholder: Box<dyn FnMut() -> bool> = Box::new(|| false);
                    std::mem::replace(predicate, placeholder)
                }
                Some(condition) => {
                    return match condition.check_clock(clock) {
                        Some(true) => Readiness::Ready,
                        _ => Readiness::NotYet,
                    };
                }
            }
        };

        let result = catch_unwind(AssertUnwindSafe(|| predicate()));

        if let Some(job) = self.core.registry.borrow_mut().get_mut(id) {
            if let Some(Condition::Until(slot)) = &mut job.condition {
                std::mem::swap(slot, &mut predicate);
            }
        } else {
            return Readiness::Gone;
        }

        match result {
            Ok(true) => Readiness::Ready,
            Ok(false) => Readiness::NotYet,
            Err(payload) => Readiness::Panicked(panic_message(payload.as_ref())),
        }
    }

    /// Settles whatever was waiting on work that can no longer run.
    fn fail_work(&self, id: JobId, work: Work<S, A>, message: String) {
        match work {
            Work::Once(_) => {
                let settle = self.core.table.borrow_mut().remove(id);
                if let Some(settle) = settle {
                    settle.reject(JobError::Panicked(message));
                }
            }
            Work::Repeat(task) => {
                task.state.deactivate();
                if let Some(owner) = &task.owner {
                    owner.reject(JobError::Panicked(message));
                }
            }
        }
    }

    fn drain(&self, frame: &S, delta: f64, aux: Option<&A>, stats: &mut TickStats) {
        self.core.queue.drain_with(|job| {
            stats.executed += 1;
            match job.work {
                Work::Once(run) => {
                    let outcome = catch_unwind(AssertUnwindSafe(run));
                    let settle = self.core.table.borrow_mut().remove(job.id);
                    if let Err(payload) = outcome {
                        let message = panic_message(payload.as_ref());
                        stats.failed += 1;
                        error!(job = ?job.id, %message, "job panicked");
                        if let Some(settle) = settle {
                            settle.reject(JobError::Panicked(message));
                        }
                    }
                }
                Work::Repeat(task) => self.run_repeating(job.id, task, frame, delta, aux, stats),
            }
        });
    }

    fn run_repeating(
        &self,
        id: JobId,
        mut task: RepeatingTask<S, A>,
        frame: &S,
        delta: f64,
        aux: Option<&A>,
        stats: &mut TickStats,
    ) {
        // Unsubscribed after promotion.
        if !task.state.is_active() {
            return;
        }

        if let Some(stop) = task.stop.as_mut() {
            let clock = self.core.clock.get();
            let stopped = catch_unwind(AssertUnwindSafe(|| match stop {
                Condition::Until(predicate) => predicate(),
                other => other.check_clock(&clock).unwrap_or(false),
            }));
            match stopped {
                Ok(false) => {}
                Ok(true) => {
                    debug!(job = ?id, "subscription stop condition met");
                    task.state.deactivate();
                    return;
                }
                Err(payload) => {
                    let message = panic_message(payload.as_ref());
                    stats.failed += 1;
                    error!(job = ?id, %message, "subscription stop condition panicked");
                    self.fail_work(id, Work::Repeat(task), message);
                    return;
                }
            }
        }

        let body = &mut task.body;
        let outcome = catch_unwind(AssertUnwindSafe(|| body(frame, delta, aux)));
        match outcome {
            Ok(ControlFlow::Continue(())) => {
                // The body may have unsubscribed itself.
                if task.state.is_active() {
                    self.arm(task);
                }
            }
            Ok(ControlFlow::Break(())) => {
                task.state.deactivate();
            }
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                stats.failed += 1;
                error!(job = ?id, %message, "subscriber panicked");
                self.fail_work(id, Work::Repeat(task), message);
            }
        }
    }

    /// Registers the next run of a repeating task for the next tick.
    pub(crate) fn arm(&self, task: RepeatingTask<S, A>) {
        let state = task.state.clone();
        let id = self.core.registry.borrow_mut().insert(None, Work::Repeat(task));
        state.armed(id);
    }

    fn poll_tasks(&self, stats: &mut TickStats) {
        let woken = self.core.tasks.borrow_mut().take_woken();

        for id in woken {
            let taken = self.core.tasks.borrow_mut().take_future(id);
            let Some((mut future, waker)) = taken else {
                continue;
            };
            stats.coroutines_polled += 1;

            let mut cx = Context::from_waker(&waker);
            match catch_unwind(AssertUnwindSafe(|| future.as_mut().poll(&mut cx))) {
                Ok(Poll::Pending) => {
                    let orphan = self.core.tasks.borrow_mut().restore(id, future);
                    drop(orphan);
                }
                Ok(Poll::Ready(())) => {
                    let finished = self.core.tasks.borrow_mut().remove(id);
                    drop(finished);
                    trace!(task = ?id, "coroutine finished");
                }
                Err(payload) => {
                    let message = panic_message(payload.as_ref());
                    stats.failed += 1;
                    error!(task = ?id, %message, "coroutine panicked");
                    let removed = self.core.tasks.borrow_mut().remove(id);
                    if let Some(task) = removed {
                        task.settle.reject(JobError::Panicked(message));
                    }
                }
            }
        }
    }

    fn register<T, F>(&self, work: F, condition: Option<Condition>) -> JobHandle<T>
    where
        T: 'static,
        F: FnOnce() -> T + 'static,
    {
        let completion = Completion::<T>::new();
        let sink = completion.clone();
        let run: Box<dyn FnOnce()> = Box::new(move || {
            sink.resolve(work());
        });

        let id = self
            .core
            .registry
            .borrow_mut()
            .insert(condition, Work::Once(run));
        self.core.table.borrow_mut().insert(id, completion.clone());
        debug!(job = ?id, frame = self.frame_count(), "registered job");

        JobHandle::new(Origin::Job(id), completion)
    }

    /// Runs `work` inside the frame loop once `condition` holds, or on the
    /// next tick when there is no condition. The handle resolves with the
    /// work's return value.
    pub fn defer<T, F>(&self, work: F, condition: Option<Condition>) -> JobHandle<T>
    where
        T: 'static,
        F: FnOnce() -> T + 'static,
    {
        self.register(work, condition)
    }

    /// `setTimeout` on the virtual clock: runs once the tick deltas summed
    /// since registration reach `after`. A paused host never fires it.
    pub fn delay<T, F>(&self, work: F, after: Duration) -> JobHandle<T>
    where
        T: 'static,
        F: FnOnce() -> T + 'static,
    {
        let target = self.elapsed() + after.as_secs_f64();
        self.register(work, Some(Condition::ElapsedAtLeast(target)))
    }

    /// Runs on the tick where the frame counter reaches `frames` past the
    /// current frame.
    pub fn delay_frames<T, F>(&self, work: F, frames: u64) -> JobHandle<T>
    where
        T: 'static,
        F: FnOnce() -> T + 'static,
    {
        let target = self.frame_count().saturating_add(frames);
        self.register(work, Some(Condition::FrameAtLeast(target)))
    }

    /// Cancels a pending job (or a coroutine) and rejects its handle with
    /// [`JobError::Cancelled`].
    ///
    /// Returns `false` and logs a warning when the handle is unknown, already
    /// settled, or already queued for the current tick. Promotion is the
    /// commit point: a queued job always runs.
    pub fn cancel_job<T>(&self, handle: &JobHandle<T>) -> bool {
        match handle.origin() {
            Origin::Job(id) => self.cancel_registered(id, handle.completion_addr()),
            Origin::Task(id) => self.cancel_task(id),
            Origin::Detached => {
                warn!("tried to cancel a job that was not registered");
                false
            }
        }
    }

    fn cancel_registered(&self, id: JobId, completion: *const ()) -> bool {
        let settle = self
            .core
            .table
            .borrow()
            .get(id)
            .filter(|settle| std::ptr::addr_eq(Rc::as_ptr(settle), completion));
        let Some(settle) = settle else {
            warn!(job = ?id, "tried to cancel a job that was not registered");
            return false;
        };
        if settle.state() != JobState::Pending {
            warn!(job = ?id, state = ?settle.state(), "job is already queued for this frame and will still run");
            return false;
        }

        let removed = self.core.registry.borrow_mut().remove(id);
        self.core.table.borrow_mut().remove(id);
        settle.set_quiet();
        settle.reject(JobError::Cancelled);
        drop(removed);

        debug!(job = ?id, "cancelled job");
        true
    }

    fn cancel_task(&self, id: TaskId) -> bool {
        let removed = self.core.tasks.borrow_mut().remove(id);
        let Some(task) = removed else {
            warn!(task = ?id, "tried to cancel a coroutine that is not running");
            return false;
        };
        task.settle.set_quiet();
        task.settle.reject(JobError::Cancelled);
        debug!(task = ?id, "cancelled coroutine");
        true
    }

    /// Spawns a coroutine polled from inside `tick`. Its first poll happens on
    /// the next tick; afterwards it resumes in the tick where one of the
    /// handles it awaits settles.
    pub fn spawn<F>(&self, future: F) -> JobHandle<F::Output>
    where
        F: Future + 'static,
        F::Output: 'static,
    {
        let completion = Completion::<F::Output>::new();
        let sink = completion.clone();
        let wrapped = async move {
            sink.resolve(future.await);
        };

        let id = self
            .core
            .tasks
            .borrow_mut()
            .insert(Box::pin(wrapped), completion.clone());
        debug!(task = ?id, "spawned coroutine");

        JobHandle::new(Origin::Task(id), completion)
    }

    pub(crate) fn subscribe_task(
        &self,
        body: RepeatBody<S, A>,
        stop: Option<Condition>,
        owner: Option<Rc<dyn Settle>>,
    ) -> Subscription {
        let state = SubscriptionState::new();
        self.arm(RepeatingTask {
            body,
            stop,
            state: state.clone(),
            owner,
        });

        let weak = Rc::downgrade(&self.core);
        Subscription::new(state, weak)
    }
}
