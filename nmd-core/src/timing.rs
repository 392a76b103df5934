//! # Timing
//!
//! Monotonic measurements around engine calls.
//!
//! - `Stopwatch` wraps `Instant`; durations come out as `f64` seconds.
//! - `TimingSeries` is an ordered, fixed-capacity list of durations. Failed
//!   operations are kept in sequence as `FAILED_SAMPLE` so averages can
//!   skip them without losing the ordering.
//! - `SessionStats` pairs each retrieved frame's timestamp with its decode
//!   time.
//!
//! Capacities are reserved up front from the run budget. Exceeding one is
//! reported as an error instead of growing.

use std::time::Instant;

use crate::scenario::HarnessError;

/// Marks a duration whose operation produced nothing
pub const FAILED_SAMPLE: f64 = -1.0;

#[derive(Debug, Clone, Copy)]
pub struct Stopwatch {
    start: Instant,
}

impl Stopwatch {
    pub fn start() -> Self {
        Self { start: Instant::now() }
    }

    pub fn restart(&mut self) {
        self.start = Instant::now();
    }

    pub fn elapsed_secs(&self) -> f64 {
        self.start.elapsed().as_secs_f64()
    }
}

/// Run `f` and return its result with the elapsed seconds
pub fn timed<T>(f: impl FnOnce() -> T) -> (T, f64) {
    let watch = Stopwatch::start();
    let value = f();
    (value, watch.elapsed_secs())
}

fn reserve(capacity: usize) -> Result<Vec<f64>, HarnessError> {
    let mut samples = Vec::new();
    samples
        .try_reserve_exact(capacity)
        .map_err(|_| HarnessError::Allocation { samples: capacity })?;
    Ok(samples)
}

#[derive(Debug, Clone, PartialEq)]
pub struct TimingSeries {
    samples: Vec<f64>,
    capacity: usize,
}

impl TimingSeries {
    pub fn with_budget(capacity: usize) -> Result<Self, HarnessError> {
        Ok(Self {
            samples: reserve(capacity)?,
            capacity,
        })
    }

    pub fn record(&mut self, secs: f64) -> Result<(), HarnessError> {
        if self.is_full() {
            return Err(HarnessError::Overflow { capacity: self.capacity });
        }
        self.samples.push(secs);
        Ok(())
    }

    pub fn record_failure(&mut self) -> Result<(), HarnessError> {
        self.record(FAILED_SAMPLE)
    }

    pub fn is_full(&self) -> bool {
        self.samples.len() >= self.capacity
    }

    pub fn successes(&self) -> impl Iterator<Item = f64> + '_ {
        self.samples.iter().copied().filter(|s| *s >= 0.0)
    }

    pub fn success_count(&self) -> usize {
        self.successes().count()
    }

    /// Mean of the successful samples, `None` when there are none
    pub fn average_success(&self) -> Option<f64> {
        let count = self.success_count();
        if count == 0 {
            return None;
        }
        Some(self.successes().sum::<f64>() / count as f64)
    }

    pub fn into_vec(self) -> Vec<f64> {
        self.samples
    }
}

/// Per-session retrieval record
#[derive(Debug, Clone, PartialEq)]
pub struct SessionStats {
    timestamps: Vec<f64>,
    decode_times: Vec<f64>,
    end_of_stream: bool,
    capacity: usize,
}

impl SessionStats {
    pub fn with_budget(capacity: usize) -> Result<Self, HarnessError> {
        Ok(Self {
            timestamps: reserve(capacity)?,
            decode_times: reserve(capacity)?,
            end_of_stream: false,
            capacity,
        })
    }

    /// Record one retrieved frame
    pub fn record_frame(&mut self, timestamp: f64, decode_secs: f64) -> Result<(), HarnessError> {
        if self.timestamps.len() >= self.capacity {
            return Err(HarnessError::Overflow { capacity: self.capacity });
        }
        debug_assert!(!self.end_of_stream, "frame recorded after end of stream");
        self.timestamps.push(timestamp);
        self.decode_times.push(decode_secs);
        Ok(())
    }

    /// Sticky: once set the session is skipped for retrieval
    pub fn mark_end_of_stream(&mut self) {
        self.end_of_stream = true;
    }

    pub fn is_exhausted(&self) -> bool {
        self.end_of_stream
    }

    pub fn frame_count(&self) -> u64 {
        self.timestamps.len() as u64
    }

    pub fn timestamps(&self) -> &[f64] {
        &self.timestamps
    }

    pub fn decode_times(&self) -> &[f64] {
        &self.decode_times
    }
}
