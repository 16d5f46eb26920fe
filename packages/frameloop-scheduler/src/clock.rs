use serde::{Deserialize, Serialize};

/// Elapsed time and frame count, advanced only by `tick`.
///
/// Both counters are monotonic: `advance` is the only mutator and callers
/// validate the delta before handing it over.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct VirtualClock {
    elapsed: f64,
    frame: u64,
}

impl VirtualClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// A clock that has already run for `elapsed` seconds over `frame` frames.
    /// Used to resume a world or to start tests mid-stream.
    pub fn starting_at(elapsed: f64, frame: u64) -> Self {
        Self {
            elapsed: elapsed.max(0.0),
            frame,
        }
    }

    /// Seconds accumulated from tick deltas.
    pub fn elapsed(&self) -> f64 {
        self.elapsed
    }

    /// Number of ticks seen so far.
    pub fn frame(&self) -> u64 {
        self.frame
    }

    pub(crate) fn advance(&mut self, delta: f64) {
        debug_assert!(delta.is_finite() && delta >= 0.0);
        self.elapsed += delta;
        self.frame = self.frame.saturating_add(1);
    }
}
