//! Conveniences layered on `defer`, `delay`, `delay_frames` and repeating
//! tasks: sleeps, deferred functions, subscriptions and tweens.

use crate::condition::Condition;
use crate::handle::{Completion, JobHandle, Origin};
use crate::registry::RepeatBody;
use crate::scheduler::JobScheduler;
use crate::subscription::{Subscription, TweenCanceller};
use std::ops::ControlFlow;
use std::rc::Rc;
use std::time::Duration;

impl<S: 'static, A: 'static> JobScheduler<S, A> {
    /// Resolves on the first tick where `predicate` returns `true`.
    pub fn sleep_until(&self, predicate: impl FnMut() -> bool + 'static) -> JobHandle<()> {
        self.defer(|| {}, Some(Condition::until(predicate)))
    }

    /// Resolves once `duration` of virtual time has passed.
    pub fn sleep(&self, duration: Duration) -> JobHandle<()> {
        self.delay(|| {}, duration)
    }

    pub fn sleep_frames(&self, frames: u64) -> JobHandle<()> {
        self.delay_frames(|| {}, frames)
    }

    /// Wraps `f` so that every call is deferred into the frame loop.
    ///
    /// ```
    /// use frameloop_scheduler::{Condition, JobScheduler};
    ///
    /// let scheduler: JobScheduler = JobScheduler::new();
    /// let add = scheduler.create_deferred_fn(|(a, b): (i32, i32)| a + b);
    /// let now = add.call((1, 2));
    /// let later = add.call_when((3, 4), Condition::FrameAtLeast(5));
    /// # let _ = (now, later);
    /// ```
    pub fn create_deferred_fn<Args, T, F>(&self, f: F) -> DeferredFn<Args, T, S, A>
    where
        Args: 'static,
        T: 'static,
        F: Fn(Args) -> T + 'static,
    {
        DeferredFn {
            scheduler: self.clone(),
            f: Rc::new(f),
        }
    }

    /// Calls `body(frame, delta, aux)` once per tick, starting with the next
    /// tick, until `stop` holds or the returned [`Subscription`] is
    /// unsubscribed. `stop` is checked before each call; once it holds the
    /// body is not called again.
    pub fn subscribe<F>(&self, mut body: F, stop: Option<Condition>) -> Subscription
    where
        F: FnMut(&S, f64, Option<&A>) + 'static,
    {
        let body: RepeatBody<S, A> = Box::new(move |frame, delta, aux| {
            body(frame, delta, aux);
            ControlFlow::Continue(())
        });
        self.subscribe_task(body, stop, None)
    }

    /// Animates `progress` from 0 to 1 over `duration` of virtual time,
    /// calling `f(progress)` once per tick. Each tick advances progress by
    /// `delta / duration`, clamped to 1, so the last step may be shorter.
    ///
    /// The handle resolves in the tick that calls `f(1.0)`. Cancelling
    /// through the [`TweenCanceller`] rejects it with
    /// [`JobError::TweenCancelled`](crate::JobError::TweenCancelled); that
    /// rejection never warns when the handle is dropped unobserved, but a
    /// panic in `f` does.
    pub fn tween<F>(&self, mut f: F, duration: Duration) -> (JobHandle<()>, TweenCanceller)
    where
        F: FnMut(f64) + 'static,
    {
        let secs = duration.as_secs_f64();
        let completion = Completion::<()>::new();

        let sink = completion.clone();
        let mut progress = 0.0_f64;
        let body: RepeatBody<S, A> = Box::new(move |_, delta, _| {
            let step = if secs > 0.0 { delta / secs } else { 1.0 };
            progress = (progress + step).min(1.0);
            f(progress);
            if progress >= 1.0 {
                sink.resolve(());
                ControlFlow::Break(())
            } else {
                ControlFlow::Continue(())
            }
        });

        let subscription = self.subscribe_task(body, None, Some(completion.clone()));
        (
            JobHandle::new(Origin::Detached, completion.clone()),
            TweenCanceller::new(subscription, completion),
        )
    }
}

/// A function whose calls are deferred into the frame loop, created by
/// [`JobScheduler::create_deferred_fn`].
///
/// Arguments are passed as one value (a tuple for several parameters), and
/// the optional readiness condition is an explicit second argument of
/// [`call_when`](Self::call_when).
pub struct DeferredFn<Args, T, S = (), A = ()> {
    scheduler: JobScheduler<S, A>,
    f: Rc<dyn Fn(Args) -> T>,
}

impl<Args, T, S, A> Clone for DeferredFn<Args, T, S, A> {
    fn clone(&self) -> Self {
        Self {
            scheduler: self.scheduler.clone(),
            f: self.f.clone(),
        }
    }
}

impl<Args: 'static, T: 'static, S: 'static, A: 'static> DeferredFn<Args, T, S, A> {
    /// Same as `defer(|| f(args), None)`: runs on the next tick.
    pub fn call(&self, args: Args) -> JobHandle<T> {
        self.defer_call(args, None)
    }

    /// Same as `defer(|| f(args), Some(condition))`.
    pub fn call_when(&self, args: Args, condition: Condition) -> JobHandle<T> {
        self.defer_call(args, Some(condition))
    }

    fn defer_call(&self, args: Args, condition: Option<Condition>) -> JobHandle<T> {
        let f = self.f.clone();
        self.scheduler.defer(move || f(args), condition)
    }
}
