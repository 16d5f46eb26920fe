use crate::registry::{JobId, Work};
use std::cell::RefCell;
use std::collections::VecDeque;

/// A promoted job waiting to run in the current tick.
pub(crate) struct QueuedJob<S, A> {
    pub(crate) id: JobId,
    pub(crate) work: Work<S, A>,
}

/// FIFO of promoted work.
/// Since the scheduler is single-threaded, we use RefCell<VecDeque>.
pub(crate) struct ExecutionQueue<S, A> {
    queue: RefCell<VecDeque<QueuedJob<S, A>>>,
}

impl<S, A> ExecutionQueue<S, A> {
    pub(crate) fn new() -> Self {
        Self {
            queue: RefCell::new(VecDeque::new()),
        }
    }

    pub(crate) fn push(&self, job: QueuedJob<S, A>) {
        self.queue.borrow_mut().push_back(job);
    }

    pub(crate) fn len(&self) -> usize {
        self.queue.borrow().len()
    }

    /// Runs every queued job in arrival order. The batch is taken out first,
    /// so nothing pushed while draining joins this drain and `run` may
    /// freely call back into the scheduler.
    pub(crate) fn drain_with(&self, mut run: impl FnMut(QueuedJob<S, A>)) {
        let batch = std::mem::take(&mut *self.queue.borrow_mut());
        for job in batch {
            run(job);
        }
    }
}
