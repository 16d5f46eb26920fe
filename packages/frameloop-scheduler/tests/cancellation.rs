use frameloop_scheduler::{JobError, JobHandle, JobScheduler, JobState};
use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::time::Duration;

#[test]
fn test_cancel_twice() {
    let scheduler: JobScheduler = JobScheduler::new();
    let mut handle = scheduler.sleep_until(|| false);

    assert!(scheduler.cancel_job(&handle));
    assert_eq!(handle.state(), JobState::Rejected);

    assert!(!scheduler.cancel_job(&handle));
    assert_eq!(handle.state(), JobState::Rejected);

    assert_eq!(handle.try_take(), Some(Err(JobError::Cancelled)));
    assert_eq!(handle.try_take(), None);
}

#[test]
fn test_cancelled_job_never_runs() {
    let scheduler: JobScheduler = JobScheduler::new();
    let ran = Rc::new(Cell::new(false));

    let handle = {
        let ran = ran.clone();
        scheduler.delay(move || ran.set(true), Duration::from_millis(50))
    };
    assert_eq!(scheduler.pending_jobs(), 1);

    assert!(scheduler.cancel_job(&handle));
    assert_eq!(scheduler.pending_jobs(), 0);
    assert_eq!(scheduler.tracked_handles(), 0);

    for _ in 0..5 {
        scheduler.tick(&(), 0.05, None).unwrap();
    }
    assert!(!ran.get());
}

#[test]
fn test_cancel_after_execution_fails() {
    let scheduler: JobScheduler = JobScheduler::new();
    let mut handle = scheduler.defer(|| 1, None);

    scheduler.tick(&(), 0.016, None).unwrap();
    assert!(!scheduler.cancel_job(&handle));
    assert_eq!(handle.try_take(), Some(Ok(1)));
}

#[test]
fn test_queued_job_cannot_be_cancelled() {
    // Both jobs are promoted in the same scan; by the time the first one
    // runs, the second is already committed to this tick.
    let scheduler: JobScheduler = JobScheduler::new();
    let victim: Rc<RefCell<Option<JobHandle<&'static str>>>> = Rc::new(RefCell::new(None));
    let cancel_result = Rc::new(Cell::new(None));

    let _canceller = {
        let sch = scheduler.clone();
        let victim = victim.clone();
        let cancel_result = cancel_result.clone();
        scheduler.defer(
            move || {
                if let Some(handle) = victim.borrow().as_ref() {
                    cancel_result.set(Some(sch.cancel_job(handle)));
                }
            },
            None,
        )
    };
    *victim.borrow_mut() = Some(scheduler.defer(|| "ran anyway", None));

    scheduler.tick(&(), 0.016, None).unwrap();

    assert_eq!(cancel_result.get(), Some(false));
    let mut handle = victim.borrow_mut().take().unwrap();
    assert_eq!(handle.try_take(), Some(Ok("ran anyway")));
}

#[test]
fn test_cancel_from_predicate_of_same_job() {
    let scheduler: JobScheduler = JobScheduler::new();
    let slot: Rc<RefCell<Option<JobHandle<()>>>> = Rc::new(RefCell::new(None));

    let handle = {
        let sch = scheduler.clone();
        let slot = slot.clone();
        scheduler.sleep_until(move || {
            if let Some(me) = slot.borrow().as_ref() {
                sch.cancel_job(me);
            }
            true
        })
    };
    *slot.borrow_mut() = Some(handle);

    let stats = scheduler.tick(&(), 0.016, None).unwrap();
    assert_eq!(stats.promoted, 0);
    assert_eq!(stats.executed, 0);

    let handle = slot.borrow_mut().take().unwrap();
    assert_eq!(handle.state(), JobState::Rejected);
    assert_eq!(scheduler.pending_jobs(), 0);
}

#[test]
fn test_cancel_detached_handle_fails() {
    let scheduler: JobScheduler = JobScheduler::new();
    let (handle, _cancel) = scheduler.tween(|_| {}, Duration::from_millis(100));

    assert!(!scheduler.cancel_job(&handle));
    assert_eq!(handle.state(), JobState::Pending);
}

#[test]
fn test_handle_from_other_scheduler_is_unknown() {
    let a: JobScheduler = JobScheduler::new();
    let b: JobScheduler = JobScheduler::new();
    let handle = a.sleep_until(|| false);

    // Same slot key in both registries, but `b` never issued this handle.
    let other = b.sleep_until(|| false);
    assert!(!b.cancel_job(&handle));
    assert_eq!(handle.state(), JobState::Pending);
    assert_eq!(other.state(), JobState::Pending);
    assert_eq!(b.pending_jobs(), 1);
}

#[test]
fn test_no_registry_leaks() {
    let scheduler: JobScheduler = JobScheduler::new();

    let mut handles = Vec::new();
    for i in 0..20u64 {
        handles.push(scheduler.delay_frames(move || i, i % 4));
    }
    for handle in handles.iter().step_by(3) {
        scheduler.cancel_job(handle);
    }

    for _ in 0..5 {
        scheduler.tick(&(), 0.016, None).unwrap();
    }

    assert_eq!(scheduler.pending_jobs(), 0);
    assert_eq!(scheduler.tracked_handles(), 0);
    assert!(handles.iter().all(|h| h.is_settled()));
    assert_eq!(
        handles
            .iter()
            .filter(|h| h.state() == JobState::Rejected)
            .count(),
        7
    );
}
