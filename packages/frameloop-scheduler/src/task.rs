use crate::handle::Settle;
use futures::task::{ArcWake, waker};
use slotmap::{SlotMap, new_key_type};
use smallvec::SmallVec;
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::task::Waker;

new_key_type! {
    /// Key of a coroutine spawned on the scheduler.
    pub struct TaskId;
}

pub(crate) type LocalFuture = Pin<Box<dyn Future<Output = ()>>>;

/// Waking only raises a flag; the coroutine is polled in the next poll phase
/// of `tick`, never from inside `wake`.
struct WakeFlag {
    woken: AtomicBool,
}

impl ArcWake for WakeFlag {
    fn wake_by_ref(arc_self: &Arc<Self>) {
        arc_self.woken.store(true, Ordering::Release);
    }
}

pub(crate) struct Coroutine {
    seq: u64,
    /// `None` while the coroutine is being polled.
    future: Option<LocalFuture>,
    flag: Arc<WakeFlag>,
    waker: Waker,
    pub(crate) settle: Rc<dyn Settle>,
}

/// Coroutines spawned with `JobScheduler::spawn`.
pub(crate) struct TaskSet {
    tasks: SlotMap<TaskId, Coroutine>,
    next_seq: u64,
}

impl TaskSet {
    pub(crate) fn new() -> Self {
        Self {
            tasks: SlotMap::with_key(),
            next_seq: 0,
        }
    }

    /// New coroutines start woken so their first poll happens on the next tick.
    pub(crate) fn insert(&mut self, future: LocalFuture, settle: Rc<dyn Settle>) -> TaskId {
        let flag = Arc::new(WakeFlag {
            woken: AtomicBool::new(true),
        });
        let seq = self.next_seq;
        self.next_seq += 1;
        self.tasks.insert(Coroutine {
            seq,
            future: Some(future),
            waker: waker(flag.clone()),
            flag,
            settle,
        })
    }

    /// Clears the wake flags and returns the woken coroutines in spawn order.
    pub(crate) fn take_woken(&mut self) -> SmallVec<[TaskId; 8]> {
        let mut woken: SmallVec<[(u64, TaskId); 8]> = self
            .tasks
            .iter()
            .filter(|(_, task)| task.flag.woken.swap(false, Ordering::AcqRel))
            .map(|(id, task)| (task.seq, id))
            .collect();
        woken.sort_unstable_by_key(|&(seq, _)| seq);
        woken.into_iter().map(|(_, id)| id).collect()
    }

    pub(crate) fn take_future(&mut self, id: TaskId) -> Option<(LocalFuture, Waker)> {
        let task = self.tasks.get_mut(id)?;
        let future = task.future.take()?;
        Some((future, task.waker.clone()))
    }

    /// Puts a polled future back. Hands it back if the coroutine was
    /// cancelled while it was being polled.
    pub(crate) fn restore(&mut self, id: TaskId, future: LocalFuture) -> Option<LocalFuture> {
        match self.tasks.get_mut(id) {
            Some(task) => {
                task.future = Some(future);
                None
            }
            None => Some(future),
        }
    }

    pub(crate) fn remove(&mut self, id: TaskId) -> Option<Coroutine> {
        self.tasks.remove(id)
    }

    pub(crate) fn len(&self) -> usize {
        self.tasks.len()
    }
}
