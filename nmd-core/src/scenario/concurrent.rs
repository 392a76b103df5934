//! # Concurrent Multi-Session Playback
//!
//! N sessions decode the same source, interleaved round-robin on one
//! thread. Session `i` starts at `i * initial_offset_step` seconds.
//!
//! ## Tick
//! 1. Until every session has produced a frame, check whether they all
//!    have now; the first time they do, the wall-clock timer restarts so
//!    start-up latency stays out of the rate.
//! 2. Every `reseek_interval` ticks (0 included) every session, exhausted
//!    or not, is re-seeked to `i * reseek_offset_step`.
//! 3. Each session still live retrieves one frame, disposes of it and
//!    records its timestamp and decode time. No frame marks the session
//!    exhausted for good.
//!
//! The run ends at the tick budget or once every session is exhausted.
//! The first session's frame count is the run's frame count; sessions that
//! disagree are reported once, at the end.

use serde::{Deserialize, Serialize};

use super::{Harness, HarnessError};
use crate::engine::{Engine, EngineFrame};
use crate::session::{Session, SessionConfig, SurfaceBinding};
use crate::timing::{timed, SessionStats, Stopwatch, TimingSeries};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConcurrentParams {
    /// Maximum number of ticks
    pub budget: usize,
    pub initial_offset_step: f64,
    pub reseek_offset_step: f64,
    /// Ticks between re-seeks, 0 to never re-seek
    pub reseek_interval: usize,
}

impl Default for ConcurrentParams {
    fn default() -> Self {
        Self {
            budget: 1000,
            initial_offset_step: 20.0,
            reseek_offset_step: 10.0,
            reseek_interval: 100,
        }
    }
}

impl ConcurrentParams {
    pub fn with_budget(budget: usize) -> Self {
        Self {
            budget,
            ..Self::default()
        }
    }

    fn reseeks_at(&self, tick: usize) -> bool {
        self.reseek_interval > 0 && tick % self.reseek_interval == 0
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConcurrentOutcome {
    pub sessions: Vec<SessionStats>,
    /// Duration of each tick, in tick order
    pub tick_durations: Vec<f64>,
    pub ticks: usize,
    /// Tick at which every session had produced a frame
    pub warmup_tick: Option<usize>,
    /// Wall-clock time since warm-up (since the first tick without one)
    pub elapsed: f64,
    /// Frames produced by the first session
    pub frame_count: u64,
    /// Sessions that produced at least one frame
    pub active_sessions: usize,
    /// Sessions whose frame count differs from `frame_count`
    pub mismatched: Vec<usize>,
}

impl ConcurrentOutcome {
    /// Frames per wall-clock second
    pub fn fps(&self) -> f64 {
        if self.elapsed > 0.0 {
            self.frame_count as f64 / self.elapsed
        } else {
            0.0
        }
    }
}

impl<E: Engine> Harness<E> {
    /// One session per entry of `surfaces`
    pub fn concurrent<S: SurfaceBinding>(
        &self,
        source: &str,
        config: &SessionConfig,
        surfaces: Vec<Option<S>>,
        params: &ConcurrentParams,
    ) -> Result<ConcurrentOutcome, HarnessError> {
        let count = surfaces.len();
        let mut sessions = Vec::with_capacity(count);
        for (i, surface) in surfaces.into_iter().enumerate() {
            let mut session = Session::create(self.engine(), source, config, surface, self.sink())?;
            session.start()?;
            session.seek(i as f64 * params.initial_offset_step);
            sessions.push(session);
        }

        let mut stats = Vec::with_capacity(count);
        for _ in 0..count {
            stats.push(SessionStats::with_budget(params.budget)?);
        }
        let mut tick_durations = TimingSeries::with_budget(params.budget)?;

        tracing::info!("Decoding {} with {} sessions, budget {} ticks", source, count, params.budget);

        let mut watch = Stopwatch::start();
        let mut warmup_tick = None;
        let mut ticks = 0;
        while ticks < params.budget {
            let tick_watch = Stopwatch::start();

            if warmup_tick.is_none() && stats.iter().all(|s| s.frame_count() > 0) {
                tracing::debug!("All sessions producing frames at tick {}", ticks);
                warmup_tick = Some(ticks);
                watch.restart();
            }

            if params.reseeks_at(ticks) {
                for (i, session) in sessions.iter_mut().enumerate() {
                    session.seek(i as f64 * params.reseek_offset_step);
                }
            }

            for (i, (session, stat)) in sessions.iter_mut().zip(stats.iter_mut()).enumerate() {
                if stat.is_exhausted() {
                    continue;
                }
                let (retrieved, secs) = timed(|| {
                    let frame = session.get_next_frame()?;
                    let ts = frame.timestamp();
                    session.dispose(frame);
                    Some(ts)
                });
                match retrieved {
                    Some(ts) => stat.record_frame(ts, secs)?,
                    None => {
                        tracing::debug!("Session {} reached end of stream at tick {}", i, ticks);
                        stat.mark_end_of_stream();
                    }
                }
            }

            tick_durations.record(tick_watch.elapsed_secs())?;
            ticks += 1;

            if stats.iter().all(SessionStats::is_exhausted) {
                break;
            }
        }
        let elapsed = watch.elapsed_secs();

        for session in sessions {
            session.destroy();
        }

        let frame_count = stats.first().map_or(0, SessionStats::frame_count);
        let mismatched: Vec<usize> = stats
            .iter()
            .enumerate()
            .filter(|(_, s)| s.frame_count() != frame_count)
            .map(|(i, _)| i)
            .collect();
        if !mismatched.is_empty() {
            tracing::warn!(
                "Decoded frame count does not match: sessions {:?} differ from {} frames",
                mismatched,
                frame_count
            );
        }

        let outcome = ConcurrentOutcome {
            active_sessions: stats.iter().filter(|s| s.frame_count() > 0).count(),
            tick_durations: tick_durations.into_vec(),
            sessions: stats,
            ticks,
            warmup_tick,
            elapsed,
            frame_count,
            mismatched,
        };
        tracing::info!(
            "{} ticks, {} frames per session, {}/{} sessions active, {:.2} fps",
            outcome.ticks,
            outcome.frame_count,
            outcome.active_sessions,
            count,
            outcome.fps()
        );
        Ok(outcome)
    }
}
