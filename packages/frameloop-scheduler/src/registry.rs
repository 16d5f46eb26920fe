use crate::condition::Condition;
use crate::handle::Settle;
use crate::subscription::SubscriptionState;
use slotmap::{SlotMap, new_key_type};
use smallvec::SmallVec;
use std::ops::ControlFlow;
use std::rc::Rc;

new_key_type! {
    /// Versioned key of a pending job. A key never matches a reused slot,
    /// so handles holding a stale key simply stop finding their job.
    pub struct JobId;
}

/// Per-tick body of a repeating task: `(frame context, delta seconds, aux context)`.
pub(crate) type RepeatBody<S, A> = Box<dyn FnMut(&S, f64, Option<&A>) -> ControlFlow<()>>;

/// Recurring task descriptor. The tick driver re-arms it after every run
/// until the body breaks, the stop condition fires, or it is unsubscribed.
pub(crate) struct RepeatingTask<S, A> {
    pub(crate) body: RepeatBody<S, A>,
    pub(crate) stop: Option<Condition>,
    pub(crate) state: Rc<SubscriptionState>,
    /// Completion rejected if the body panics (tweens).
    pub(crate) owner: Option<Rc<dyn Settle>>,
}

pub(crate) enum Work<S, A> {
    /// Runs once and settles its own completion.
    Once(Box<dyn FnOnce()>),
    Repeat(RepeatingTask<S, A>),
}

pub(crate) struct PendingJob<S, A> {
    seq: u64,
    pub(crate) condition: Option<Condition>,
    pub(crate) work: Work<S, A>,
}

/// The set of jobs waiting for their condition.
pub(crate) struct JobRegistry<S, A> {
    jobs: SlotMap<JobId, PendingJob<S, A>>,
    next_seq: u64,
}

impl<S, A> JobRegistry<S, A> {
    pub(crate) fn new() -> Self {
        Self {
            jobs: SlotMap::with_key(),
            next_seq: 0,
        }
    }

    pub(crate) fn insert(&mut self, condition: Option<Condition>, work: Work<S, A>) -> JobId {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.jobs.insert(PendingJob {
            seq,
            condition,
            work,
        })
    }

    pub(crate) fn get_mut(&mut self, id: JobId) -> Option<&mut PendingJob<S, A>> {
        self.jobs.get_mut(id)
    }

    pub(crate) fn remove(&mut self, id: JobId) -> Option<PendingJob<S, A>> {
        self.jobs.remove(id)
    }

    pub(crate) fn len(&self) -> usize {
        self.jobs.len()
    }

    /// Ids of every pending job in registration order. Jobs registered after
    /// the snapshot is taken wait for the next tick.
    pub(crate) fn snapshot(&self) -> SmallVec<[JobId; 16]> {
        let mut ordered: SmallVec<[(u64, JobId); 16]> =
            self.jobs.iter().map(|(id, job)| (job.seq, id)).collect();
        ordered.sort_unstable_by_key(|&(seq, _)| seq);
        ordered.into_iter().map(|(_, id)| id).collect()
    }
}
