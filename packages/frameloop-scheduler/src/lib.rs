//! Deferred jobs and coroutines for a single-threaded, frame-driven loop.
//!
//! The host calls [`JobScheduler::tick`] once per rendered frame. Work
//! registered through the primitives (`defer`, `delay`, `delay_frames`,
//! `subscribe`, `tween`, `spawn`, ...) runs inside that call once its
//! condition holds, so sequential-looking code can wait on time, frames or
//! arbitrary predicates without ever blocking the frame loop.

mod cancel;
pub mod clock;
pub mod condition;
pub mod error;
pub mod handle;
mod primitives;
mod queue;
mod registry;
pub mod scheduler;
pub mod subscription;
pub mod task;

pub use clock::VirtualClock;
pub use condition::Condition;
pub use error::{JobError, SchedulerError};
pub use handle::{JobHandle, JobState};
pub use primitives::DeferredFn;
pub use registry::JobId;
pub use scheduler::{JobScheduler, TickStats};
pub use subscription::{Subscription, TweenCanceller};
pub use task::TaskId;

/// Anything a host frame loop can advance once per frame.
/// Lets hosts run the same loop over different schedulers or wrappers.
pub trait FrameDriver<S = (), A = ()> {
    /// Advance by `delta` seconds, handing the frame and auxiliary context through.
    fn advance(&self, frame: &S, delta: f64, aux: Option<&A>) -> Result<TickStats, SchedulerError>;

    /// Nothing left to run.
    fn is_idle(&self) -> bool;
}

impl<S: 'static, A: 'static> FrameDriver<S, A> for JobScheduler<S, A> {
    fn advance(&self, frame: &S, delta: f64, aux: Option<&A>) -> Result<TickStats, SchedulerError> {
        self.tick(frame, delta, aux)
    }

    fn is_idle(&self) -> bool {
        JobScheduler::is_idle(self)
    }
}
