//! Demo workloads installed on a fresh scheduler before the host loop runs.

use crate::host::HostFrame;
use clap::ValueEnum;
use frameloop_scheduler::{Condition, JobScheduler};
use serde::Serialize;
use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::time::Duration;

pub type Scheduler = JobScheduler<HostFrame>;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Event {
    pub frame: u64,
    pub elapsed: f64,
    pub message: String,
}

/// Timestamped notes written by scenario jobs as they run.
#[derive(Debug, Clone, Default)]
pub struct EventLog {
    events: Rc<RefCell<Vec<Event>>>,
}

impl EventLog {
    pub fn note(&self, scheduler: &Scheduler, message: impl Into<String>) {
        self.events.borrow_mut().push(Event {
            frame: scheduler.frame_count(),
            elapsed: scheduler.elapsed(),
            message: message.into(),
        });
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.borrow().clone()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Scenario {
    /// defer, delay, delay_frames, sleep_until and a cancelled timeout
    Timers,
    /// A finished tween and a tween cancelled halfway
    Tweens,
    /// Per-frame subscriptions with stop conditions and unsubscribe
    Subscriptions,
    /// One coroutine awaiting sleeps, jobs and a tween in sequence
    Coroutine,
    /// Everything above at once
    Showcase,
}

impl Scenario {
    pub fn install(self, scheduler: &Scheduler, log: &EventLog) {
        match self {
            Scenario::Timers => timers(scheduler, log),
            Scenario::Tweens => tweens(scheduler, log),
            Scenario::Subscriptions => subscriptions(scheduler, log),
            Scenario::Coroutine => coroutine(scheduler, log),
            Scenario::Showcase => {
                timers(scheduler, log);
                tweens(scheduler, log);
                subscriptions(scheduler, log);
                coroutine(scheduler, log);
            }
        }
    }
}

fn timers(scheduler: &Scheduler, log: &EventLog) {
    let note = |message: &'static str| {
        let sch = scheduler.clone();
        let log = log.clone();
        move || log.note(&sch, message)
    };

    let _ = scheduler.defer(note("deferred job ran"), None);
    let _ = scheduler.delay(note("0.5s timeout fired"), Duration::from_millis(500));
    let _ = scheduler.delay_frames(note("10-frame timeout fired"), 10);

    let clock = scheduler.clone();
    let _ = scheduler.defer(
        note("predicate saw 1s of virtual time"),
        Some(Condition::until(move || clock.elapsed() >= 1.0)),
    );

    let doomed = scheduler.delay(note("cancelled timeout fired"), Duration::from_millis(750));
    if scheduler.cancel_job(&doomed) {
        log.note(scheduler, "cancelled the 0.75s timeout before it ran");
    }
}

fn tweens(scheduler: &Scheduler, log: &EventLog) {
    let milestones = Rc::new(Cell::new(0u32));
    let (done, _) = {
        let sch = scheduler.clone();
        let log = log.clone();
        let milestones = milestones.clone();
        scheduler.tween(
            move |progress| {
                // Note each quarter once.
                let reached = (progress * 4.0).floor() as u32;
                if reached > milestones.get() {
                    milestones.set(reached);
                    log.note(&sch, format!("tween at {:.0}%", progress * 100.0));
                }
            },
            Duration::from_secs(1),
        )
    };

    let (halted, canceller) = scheduler.tween(|_| {}, Duration::from_secs(2));
    {
        let sch = scheduler.clone();
        let log = log.clone();
        let _ = scheduler.delay(
            move || {
                if canceller.cancel() {
                    log.note(&sch, "cancelled the 2s tween");
                }
            },
            Duration::from_millis(500),
        );
    }

    let sch = scheduler.clone();
    let log = log.clone();
    let _ = scheduler.spawn(async move {
        if done.await.is_ok() {
            log.note(&sch, "tween finished");
        }
        if let Err(error) = halted.await {
            log.note(&sch, format!("second tween ended: {error}"));
        }
    });
}

fn subscriptions(scheduler: &Scheduler, log: &EventLog) {
    let frames = Rc::new(Cell::new(0u64));
    let _ = {
        let frames = frames.clone();
        scheduler.subscribe(
            move |_, _, _| frames.set(frames.get() + 1),
            Some(Condition::ElapsedAtLeast(scheduler.elapsed() + 0.5)),
        )
    };
    {
        let sch = scheduler.clone();
        let log = log.clone();
        let _ = scheduler.delay(
            move || log.note(&sch, format!("stopped subscriber counted {} frames", frames.get())),
            Duration::from_secs(1),
        );
    }

    let ticker = {
        let sch = scheduler.clone();
        let log = log.clone();
        scheduler.subscribe(
            move |frame: &HostFrame, _, _| {
                if frame.index % 30 == 0 {
                    log.note(&sch, format!("ticker saw host frame {}", frame.index));
                }
            },
            None,
        )
    };
    let sch = scheduler.clone();
    let log = log.clone();
    let _ = scheduler.delay_frames(
        move || {
            if ticker.unsubscribe() {
                log.note(&sch, "ticker unsubscribed");
            }
        },
        90,
    );
}

fn coroutine(scheduler: &Scheduler, log: &EventLog) {
    let sch = scheduler.clone();
    let log = log.clone();
    let _ = scheduler.spawn(async move {
        log.note(&sch, "coroutine started");

        if sch.sleep(Duration::from_millis(250)).await.is_err() {
            return;
        }
        log.note(&sch, "coroutine slept 0.25s");

        let answer = sch.defer(|| 6 * 7, None).await;
        log.note(&sch, format!("coroutine got {answer:?} from a job"));

        let (tween, _) = sch.tween(|_| {}, Duration::from_millis(500));
        if tween.await.is_ok() {
            log.note(&sch, "coroutine waited out a 0.5s tween");
        }

        let _ = sch.sleep_frames(5).await;
        log.note(&sch, "coroutine finished");
    });
}
