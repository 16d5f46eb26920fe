use frameloop_scheduler::{FrameDriver, SchedulerError, TickStats};
use serde::Serialize;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Per-frame context handed to subscribers.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct HostFrame {
    pub index: u64,
    pub delta: f64,
}

#[derive(Debug, Clone, Copy)]
pub struct HostConfig {
    pub fps: f64,
    pub frames: u64,
    /// Sleep out the rest of each frame so virtual time tracks the wall clock.
    pub realtime: bool,
}

impl HostConfig {
    pub fn frame_delta(&self) -> f64 {
        1.0 / self.fps
    }
}

/// Totals over a whole run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunSummary {
    pub frames: u64,
    pub elapsed: f64,
    pub promoted: usize,
    pub executed: usize,
    pub failed: usize,
    pub coroutines_polled: usize,
    pub peak_pending: usize,
    pub final_pending: usize,
    pub idle: bool,
    pub wall_secs: f64,
}

impl RunSummary {
    fn record(&mut self, stats: &TickStats) {
        self.frames = stats.frame;
        self.elapsed = stats.elapsed;
        self.promoted += stats.promoted;
        self.executed += stats.executed;
        self.failed += stats.failed;
        self.coroutines_polled += stats.coroutines_polled;
        self.peak_pending = self.peak_pending.max(stats.pending);
        self.final_pending = stats.pending;
    }
}

/// Stands in for a render loop: one `advance` per simulated frame.
pub struct HostLoop<D> {
    driver: D,
    config: HostConfig,
}

impl<D: FrameDriver<HostFrame>> HostLoop<D> {
    pub fn new(driver: D, config: HostConfig) -> Self {
        Self { driver, config }
    }

    pub fn run(&self) -> Result<RunSummary, SchedulerError> {
        let delta = self.config.frame_delta();
        let budget = Duration::from_secs_f64(delta);
        let started = Instant::now();
        let mut summary = RunSummary::default();

        info!(fps = self.config.fps, frames = self.config.frames, "host loop starting");

        for index in 0..self.config.frames {
            let frame_started = Instant::now();
            let stats = self.driver.advance(&HostFrame { index, delta }, delta, None)?;
            if stats.executed > 0 || stats.coroutines_polled > 0 {
                debug!(
                    frame = stats.frame,
                    executed = stats.executed,
                    polled = stats.coroutines_polled,
                    "frame did work"
                );
            }
            summary.record(&stats);

            if self.config.realtime {
                if let Some(rest) = budget.checked_sub(frame_started.elapsed()) {
                    std::thread::sleep(rest);
                }
            }
        }

        summary.idle = self.driver.is_idle();
        summary.wall_secs = started.elapsed().as_secs_f64();
        info!(
            frames = summary.frames,
            executed = summary.executed,
            pending = summary.final_pending,
            "host loop finished"
        );
        Ok(summary)
    }
}
