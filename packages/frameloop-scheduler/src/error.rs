use thiserror::Error;

/// Why a [`JobHandle`](crate::JobHandle) settled without a value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum JobError {
    /// The job was removed from the registry through `cancel_job`.
    #[error("job was cancelled")]
    Cancelled,

    /// The tween was stopped through its `TweenCanceller`.
    #[error("tween cancelled")]
    TweenCancelled,

    /// The work, predicate or coroutine panicked while the scheduler ran it.
    #[error("job panicked: {0}")]
    Panicked(String),
}

/// Misuse of the tick driver by the host loop.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SchedulerError {
    #[error("tick() was called while a previous tick was still running")]
    ReentrantTick,

    #[error("tick delta must be finite and non-negative, got {0}")]
    InvalidDelta(f64),
}

/// Turns a `catch_unwind` payload into something printable.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&'static str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
