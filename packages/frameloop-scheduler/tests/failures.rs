use frameloop_scheduler::{Condition, JobError, JobScheduler, JobState, SchedulerError};
use std::cell::{Cell, RefCell};
use std::io;
use std::rc::Rc;
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Clone, Default)]
struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

impl io::Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Runs `f` with a warn-level subscriber installed and returns what it logged.
fn capture_warnings(f: impl FnOnce()) -> String {
    let logs = CapturedLogs::default();
    let writer = logs.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::WARN)
        .with_ansi(false)
        .with_writer(move || writer.clone())
        .finish();
    tracing::subscriber::with_default(subscriber, f);
    let bytes = logs.0.lock().unwrap().clone();
    String::from_utf8_lossy(&bytes).into_owned()
}

#[test]
fn test_panicking_work_does_not_stall_the_drain() {
    let scheduler: JobScheduler = JobScheduler::new();
    let after = Rc::new(Cell::new(false));

    let mut failing = scheduler.defer(|| -> u32 { panic!("boom") }, None);
    let _next = {
        let after = after.clone();
        scheduler.defer(move || after.set(true), None)
    };

    let stats = scheduler.tick(&(), 0.016, None).unwrap();

    assert_eq!(stats.executed, 2);
    assert_eq!(stats.failed, 1);
    assert!(after.get());
    assert_eq!(
        failing.try_take(),
        Some(Err(JobError::Panicked("boom".to_string())))
    );
    assert_eq!(scheduler.tracked_handles(), 0);
}

#[test]
fn test_panicking_condition_rejects_job() {
    let scheduler: JobScheduler = JobScheduler::new();
    let ran = Rc::new(Cell::new(false));

    let mut handle = {
        let ran = ran.clone();
        scheduler.defer(
            move || ran.set(true),
            Some(Condition::until(|| panic!("bad predicate"))),
        )
    };

    let stats = scheduler.tick(&(), 0.016, None).unwrap();
    assert_eq!(stats.failed, 1);
    assert_eq!(stats.promoted, 0);
    assert!(!ran.get());
    assert_eq!(scheduler.pending_jobs(), 0);
    assert!(matches!(handle.try_take(), Some(Err(JobError::Panicked(_)))));
}

#[test]
fn test_panicking_subscriber_is_dropped() {
    let scheduler: JobScheduler = JobScheduler::new();
    let calls = Rc::new(Cell::new(0));

    let sub = {
        let calls = calls.clone();
        scheduler.subscribe(
            move |_, _, _| {
                calls.set(calls.get() + 1);
                if calls.get() == 2 {
                    panic!("subscriber failed");
                }
            },
            None,
        )
    };

    for _ in 0..5 {
        scheduler.tick(&(), 0.016, None).unwrap();
    }
    assert_eq!(calls.get(), 2);
    assert!(!sub.is_active());
    assert!(scheduler.is_idle());
}

#[test]
fn test_panicking_tween_rejects_its_handle() {
    let scheduler: JobScheduler = JobScheduler::new();
    let (mut handle, cancel) = scheduler.tween(
        |t| {
            if t > 0.5 {
                panic!("tween step failed");
            }
        },
        Duration::from_millis(1000),
    );

    for _ in 0..4 {
        scheduler.tick(&(), 0.3, None).unwrap();
    }
    assert!(!cancel.is_running());
    assert_eq!(
        handle.try_take(),
        Some(Err(JobError::Panicked("tween step failed".to_string())))
    );
}

#[test]
fn test_panicking_coroutine_is_removed() {
    let scheduler: JobScheduler = JobScheduler::new();

    let should_fail = true;
    let failing = scheduler.spawn(async move {
        if should_fail {
            panic!("coroutine failed");
        }
    });
    let healthy = scheduler.spawn(async { 1 });

    let stats = scheduler.tick(&(), 0.016, None).unwrap();
    assert_eq!(stats.coroutines_polled, 2);
    assert_eq!(stats.failed, 1);
    assert_eq!(scheduler.running_tasks(), 0);
    assert_eq!(failing.state(), JobState::Rejected);
    assert_eq!(healthy.state(), JobState::Resolved);
    failing.silence_rejection();
}

#[test]
fn test_reentrant_tick_is_refused() {
    let scheduler: JobScheduler = JobScheduler::new();
    let nested = Rc::new(RefCell::new(None));

    let _job = {
        let sch = scheduler.clone();
        let nested = nested.clone();
        scheduler.defer(move || *nested.borrow_mut() = Some(sch.tick(&(), 0.016, None)), None)
    };

    scheduler.tick(&(), 0.016, None).unwrap();

    assert_eq!(
        nested.borrow_mut().take(),
        Some(Err(SchedulerError::ReentrantTick))
    );
    assert_eq!(scheduler.frame_count(), 1);

    // The guard is released once the outer tick returns.
    assert!(scheduler.tick(&(), 0.016, None).is_ok());
}

#[test]
fn test_dropped_tween_handle_warns_only_on_panic() {
    let cancelled = capture_warnings(|| {
        let scheduler: JobScheduler = JobScheduler::new();
        let (handle, cancel) = scheduler.tween(|_| {}, Duration::from_secs(1));
        scheduler.tick(&(), 0.1, None).unwrap();
        assert!(cancel.cancel());
        assert_eq!(handle.state(), JobState::Rejected);
        drop(handle);
    });
    assert!(!cancelled.contains("rejected job handle dropped"));

    let panicked = capture_warnings(|| {
        let scheduler: JobScheduler = JobScheduler::new();
        let (handle, _cancel) = scheduler.tween(|_| panic!("tween step failed"), Duration::from_secs(1));
        scheduler.tick(&(), 0.1, None).unwrap();
        assert_eq!(handle.state(), JobState::Rejected);
        drop(handle);
    });
    assert!(panicked.contains("rejected job handle dropped"));
}
