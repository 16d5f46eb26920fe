use crate::clock::VirtualClock;
use std::fmt;

/// Readiness test for a pending job.
///
/// A job registered without a condition is ready on the next tick. The clock
/// variants are checked against the scheduler's [`VirtualClock`], so `delay`
/// and `delay_frames` never need to capture the scheduler.
pub enum Condition {
    /// Ready once the predicate returns `true`.
    Until(Box<dyn FnMut() -> bool>),
    /// Ready once the virtual clock has reached this many seconds.
    ElapsedAtLeast(f64),
    /// Ready once the frame counter has reached this frame.
    FrameAtLeast(u64),
}

impl Condition {
    pub fn until(predicate: impl FnMut() -> bool + 'static) -> Self {
        Condition::Until(Box::new(predicate))
    }

    /// Evaluates the clock-based variants. Returns `None` for `Until`, which
    /// the driver must call itself with no internal borrow held.
    pub(crate) fn check_clock(&self, clock: &VirtualClock) -> Option<bool> {
        match self {
            Condition::Until(_) => None,
            Condition::ElapsedAtLeast(target) => Some(clock.elapsed() >= *target),
            Condition::FrameAtLeast(target) => Some(clock.frame() >= *target),
        }
    }
}

impl fmt::Debug for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Condition::Until(_) => f.write_str("Until(..)"),
            Condition::ElapsedAtLeast(t) => f.debug_tuple("ElapsedAtLeast").field(t).finish(),
            Condition::FrameAtLeast(n) => f.debug_tuple("FrameAtLeast").field(n).finish(),
        }
    }
}
