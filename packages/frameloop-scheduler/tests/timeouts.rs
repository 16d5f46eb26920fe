use frameloop_scheduler::{JobScheduler, JobState, SchedulerError, VirtualClock};
use std::time::Duration;

#[test]
fn test_delay_uses_tick_deltas_only() {
    let scheduler: JobScheduler = JobScheduler::new();
    let handle = scheduler.delay(|| "done", Duration::from_millis(1000));

    scheduler.tick(&(), 0.4, None).unwrap();
    assert_eq!(handle.state(), JobState::Pending);

    scheduler.tick(&(), 0.4, None).unwrap();
    assert_eq!(handle.state(), JobState::Pending);

    // 1.1s accumulated
    scheduler.tick(&(), 0.3, None).unwrap();
    assert_eq!(handle.state(), JobState::Resolved);
}

#[test]
fn test_delay_fires_when_target_is_reached_exactly() {
    let scheduler: JobScheduler = JobScheduler::new();
    let handle = scheduler.sleep(Duration::from_millis(1000));

    scheduler.tick(&(), 0.5, None).unwrap();
    assert_eq!(handle.state(), JobState::Pending);

    scheduler.tick(&(), 0.5, None).unwrap();
    assert_eq!(handle.state(), JobState::Resolved);
}

#[test]
fn test_delay_is_measured_from_registration() {
    let scheduler: JobScheduler = JobScheduler::new();
    scheduler.tick(&(), 2.0, None).unwrap();

    let handle = scheduler.sleep(Duration::from_millis(1000));

    scheduler.tick(&(), 0.5, None).unwrap();
    assert_eq!(handle.state(), JobState::Pending);

    scheduler.tick(&(), 0.5, None).unwrap();
    assert_eq!(handle.state(), JobState::Resolved);
    assert_eq!(scheduler.elapsed(), 3.0);
}

#[test]
fn test_paused_host_never_fires_timeouts() {
    let scheduler: JobScheduler = JobScheduler::new();
    let handle = scheduler.sleep(Duration::from_millis(100));

    // Zero-delta frames advance the frame counter but not the clock.
    for _ in 0..10 {
        scheduler.tick(&(), 0.0, None).unwrap();
    }
    assert_eq!(scheduler.frame_count(), 10);
    assert_eq!(handle.state(), JobState::Pending);

    scheduler.tick(&(), 0.1, None).unwrap();
    assert_eq!(handle.state(), JobState::Resolved);
}

#[test]
fn test_delay_frames_fires_on_target_frame() {
    let scheduler: JobScheduler = JobScheduler::new();
    for _ in 0..10 {
        scheduler.tick(&(), 0.016, None).unwrap();
    }
    assert_eq!(scheduler.frame_count(), 10);

    let sch = scheduler.clone();
    let mut handle = scheduler.delay_frames(move || sch.frame_count(), 3);

    scheduler.tick(&(), 0.016, None).unwrap();
    scheduler.tick(&(), 0.016, None).unwrap();
    assert_eq!(handle.state(), JobState::Pending);

    scheduler.tick(&(), 0.016, None).unwrap();
    assert_eq!(handle.try_take(), Some(Ok(13)));
}

#[test]
fn test_injected_clock_offsets_frame_timeouts() {
    let scheduler: JobScheduler = JobScheduler::with_clock(VirtualClock::starting_at(5.0, 10));
    let sch = scheduler.clone();
    let mut handle = scheduler.delay_frames(move || sch.frame_count(), 3);

    for _ in 0..3 {
        scheduler.tick(&(), 0.016, None).unwrap();
    }
    assert_eq!(handle.try_take(), Some(Ok(13)));
}

#[test]
fn test_zero_frame_delay_runs_next_tick() {
    let scheduler: JobScheduler = JobScheduler::new();
    let handle = scheduler.sleep_frames(0);
    assert_eq!(handle.state(), JobState::Pending);

    scheduler.tick(&(), 0.016, None).unwrap();
    assert_eq!(handle.state(), JobState::Resolved);
}

#[test]
fn test_clock_is_monotonic() {
    let scheduler: JobScheduler = JobScheduler::new();
    scheduler.tick(&(), 0.25, None).unwrap();
    let before = scheduler.clock();

    for bad in [-0.1, f64::NAN, f64::INFINITY] {
        let err = scheduler.tick(&(), bad, None).unwrap_err();
        assert!(matches!(err, SchedulerError::InvalidDelta(_)));
    }

    assert_eq!(scheduler.clock(), before);
    assert_eq!(scheduler.frame_count(), 1);
    assert_eq!(scheduler.delta(), 0.25);
}

#[test]
fn test_far_frame_timeout_saturates() {
    let scheduler: JobScheduler = JobScheduler::new();
    scheduler.tick(&(), 0.016, None).unwrap();

    // u64::MAX frames means "never"; it must not wrap to a near frame.
    let handle = scheduler.sleep_frames(u64::MAX);
    scheduler.tick(&(), 0.016, None).unwrap();
    assert_eq!(handle.state(), JobState::Pending);
    assert_eq!(scheduler.pending_jobs(), 1);
}

#[test]
fn test_frame_counter_saturates_at_max() {
    let scheduler: JobScheduler = JobScheduler::with_clock(VirtualClock::starting_at(0.0, u64::MAX));
    let stats = scheduler.tick(&(), 0.016, None).unwrap();
    assert_eq!(stats.frame, u64::MAX);
}
