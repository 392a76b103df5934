//! # Scenario Drivers
//!
//! Fixed benchmark scenarios run against an `Engine`:
//!
//! | Driver       | Sessions | Retrieval                          | Report |
//! |--------------|----------|------------------------------------|--------|
//! | `linear`     | 1        | sequential, then paced and replay  | logs   |
//! | `seek_sweep` | 1        | seek + get at 512 positions        | seek   |
//! | `concurrent` | N        | round-robin with periodic re-seek  | decode |
//! | `audio`      | 1        | sequential, audio stream           | logs   |
//!
//! Every driver builds its sessions first and aborts if any of them fails
//! to come up. Whatever was created is torn down when the driver returns,
//! on every path.

pub mod audio;
pub mod concurrent;
pub mod linear;
pub mod seek_sweep;

use std::sync::Arc;

use thiserror::Error;

use crate::engine::{EngineError, EngineFrame, EngineInstance};
use crate::fixtures::{self, ReplayFixture};
use crate::logging::{LogSink, TracingSink};
use crate::session::{Session, SurfaceBinding};

pub use audio::AudioOutcome;
pub use concurrent::{ConcurrentOutcome, ConcurrentParams};
pub use linear::{LinearOutcome, LinearParams};
pub use seek_sweep::{SeekSweepOutcome, SeekSweepParams};

#[derive(Debug, Error)]
pub enum HarnessError {
    #[error("Failed to open {path}")]
    Open { path: String },
    #[error("Failed to configure session for {path}: {source}")]
    Configure {
        path: String,
        #[source]
        source: EngineError,
    },
    #[error("Failed to start session for {path}: {source}")]
    Start {
        path: String,
        #[source]
        source: EngineError,
    },
    #[error("Failed to reserve {samples} timing samples")]
    Allocation { samples: usize },
    #[error("Timing buffer full ({capacity} samples)")]
    Overflow { capacity: usize },
    #[error("Expected {expected} surfaces, got {actual}")]
    SurfaceCount { expected: usize, actual: usize },
}

/// Runs scenarios against one engine, routing native logs to one sink
pub struct Harness<E> {
    engine: E,
    sink: Arc<dyn LogSink>,
}

impl<E> Harness<E> {
    pub fn new(engine: E) -> Self {
        Self::with_sink(engine, Arc::new(TracingSink))
    }

    pub fn with_sink(engine: E, sink: Arc<dyn LogSink>) -> Self {
        Self { engine, sink }
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub(crate) fn sink(&self) -> Arc<dyn LogSink> {
        self.sink.clone()
    }
}

/// Hit/miss tally for lookups by timestamp
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplayStats {
    pub attempts: usize,
    pub hits: usize,
}

impl ReplayStats {
    pub fn misses(&self) -> usize {
        self.attempts - self.hits
    }

    fn record(&mut self, hit: bool) {
        self.attempts += 1;
        if hit {
            self.hits += 1;
        }
    }

    fn merge(&mut self, other: ReplayStats) {
        self.attempts += other.attempts;
        self.hits += other.hits;
    }
}

/// Look up one timestamp, disposing of whatever comes back. A miss is
/// logged and counted.
fn lookup<I: EngineInstance, S: SurfaceBinding>(
    session: &mut Session<I, S>,
    seconds: f64,
    stats: &mut ReplayStats,
) {
    match session.get_frame_at(seconds) {
        Some(frame) => {
            tracing::debug!("Got frame at {:.3}s (ts={:.3})", seconds, frame.timestamp());
            session.dispose(frame);
            stats.record(true);
        }
        None => {
            tracing::error!("Could not get frame at {:.3}s", seconds);
            stats.record(false);
        }
    }
}

/// Paced `get_frame_at(i / 60)` over the first `frames` frame positions
fn paced_pass<I: EngineInstance, S: SurfaceBinding>(
    session: &mut Session<I, S>,
    frames: u64,
    fixture: &ReplayFixture,
) -> ReplayStats {
    let mut stats = ReplayStats::default();
    for i in 0..frames {
        lookup(session, fixtures::paced_timestamp(i), &mut stats);
        if let Some(interval) = fixture.frame_interval() {
            std::thread::sleep(interval);
        }
    }
    tracing::info!("Paced replay: {}/{} frames", stats.hits, stats.attempts);
    stats
}

/// All passes over the fixture table, stalling where the fixture says so
fn table_passes<I: EngineInstance, S: SurfaceBinding>(
    session: &mut Session<I, S>,
    fixture: &ReplayFixture,
) -> ReplayStats {
    let mut stats = ReplayStats::default();
    for pass in 0..fixture.passes {
        for (index, &seconds) in fixture.timestamps.iter().enumerate() {
            lookup(session, seconds, &mut stats);
            if let Some(stall) = fixture.stall_after(pass, index) {
                tracing::info!("Stalling {:?} after lookup {} of pass {}", stall, index, pass);
                std::thread::sleep(stall);
            }
        }
    }
    tracing::info!("Table replay: {}/{} frames", stats.hits, stats.attempts);
    stats
}

/// Paced pass followed by the table passes
pub(crate) fn replay<I: EngineInstance, S: SurfaceBinding>(
    session: &mut Session<I, S>,
    frames: u64,
    fixture: &ReplayFixture,
) -> ReplayStats {
    let mut stats = paced_pass(session, frames, fixture);
    stats.merge(table_passes(session, fixture));
    if stats.misses() > 0 {
        tracing::warn!("{} of {} replay lookups returned no frame", stats.misses(), stats.attempts);
    }
    stats
}
