//! Seek sweep: a dense, ordered series of seek + retrieve pairs.
//!
//! Each position is timed from just before the seek to just after the frame
//! has been disposed. A position that yields no frame records
//! `FAILED_SAMPLE` and is left out of the average.

use serde::{Deserialize, Serialize};

use super::{Harness, HarnessError};
use crate::engine::{Engine, EngineFrame};
use crate::fixtures::FRAME_RATE;
use crate::session::{Session, SessionConfig, SurfaceBinding};
use crate::timing::{timed, TimingSeries};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SeekSweepParams {
    pub positions: usize,
    /// Distance between consecutive positions, in seconds
    pub step: f64,
}

impl Default for SeekSweepParams {
    fn default() -> Self {
        Self {
            positions: 512,
            step: 1.0 / FRAME_RATE,
        }
    }
}

impl SeekSweepParams {
    pub fn positions(&self) -> Vec<f64> {
        (0..self.positions).map(|i| i as f64 * self.step).collect()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SeekSweepOutcome {
    pub positions: Vec<f64>,
    /// One entry per position, `FAILED_SAMPLE` where no frame came back
    pub seek_times: Vec<f64>,
    pub successes: usize,
    /// Mean successful seek time, `None` when nothing succeeded
    pub average: Option<f64>,
}

impl<E: Engine> Harness<E> {
    pub fn seek_sweep<S: SurfaceBinding>(
        &self,
        source: &str,
        config: &SessionConfig,
        surface: Option<S>,
        params: &SeekSweepParams,
    ) -> Result<SeekSweepOutcome, HarnessError> {
        let positions = params.positions();
        let mut times = TimingSeries::with_budget(positions.len())?;

        let mut session = Session::create(self.engine(), source, config, surface, self.sink())?;
        session.start()?;

        for &position in &positions {
            let (landed, secs) = timed(|| {
                session.seek(position);
                let frame = session.get_frame_at(position)?;
                let ts = frame.timestamp();
                session.dispose(frame);
                Some(ts)
            });
            match landed {
                Some(ts) => {
                    tracing::debug!("Seek to {:.3}s landed on {:.3}s in {:.6} s", position, ts, secs);
                    times.record(secs)?;
                }
                None => {
                    tracing::warn!("Seek to {:.3}s returned no frame", position);
                    times.record_failure()?;
                }
            }
        }

        session.destroy();

        let outcome = SeekSweepOutcome {
            successes: times.success_count(),
            average: times.average_success(),
            seek_times: times.into_vec(),
            positions,
        };
        match outcome.average {
            Some(avg) => tracing::info!(
                "Seek sweep: {}/{} frames, {:.6} s average",
                outcome.successes,
                outcome.positions.len(),
                avg
            ),
            None => tracing::warn!("Seek sweep: no seek produced a frame"),
        }
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::NoSurface;
    use crate::testing::{Call, ScriptedEngine};
    use crate::timing::FAILED_SAMPLE;

    #[test]
    fn test_default_positions() {
        let positions = SeekSweepParams::default().positions();
        assert_eq!(positions.len(), 512);
        assert_eq!(positions[0], 0.0);
        assert!((positions[60] - 1.0).abs() < 1e-12);
        assert!(positions.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_partial_coverage() {
        // 100 frames: positions 0..100 hit, the rest miss
        let engine = ScriptedEngine::with_frames(100);
        let harness = Harness::with_sink(engine.clone(), engine.sink());

        let outcome = harness
            .seek_sweep::<NoSurface>("clip.mp4", &SessionConfig::playback(), None, &SeekSweepParams::default())
            .unwrap();

        assert_eq!(outcome.seek_times.len(), 512);
        assert_eq!(outcome.successes, 100);
        assert!(outcome.seek_times[..100].iter().all(|t| *t >= 0.0));
        assert!(outcome.seek_times[100..].iter().all(|t| *t == FAILED_SAMPLE));
        assert!(outcome.average.unwrap() >= 0.0);

        assert_eq!(engine.disposals(), 100);
        assert_eq!(engine.count(|c| matches!(c, Call::Seek(..))), 512);
        assert_eq!(engine.count(|c| matches!(c, Call::FrameAt(..))), 512);
        assert!(engine.calls().contains(&Call::Start(0)));
    }

    #[test]
    fn test_seek_precedes_lookup_at_same_position() {
        let engine = ScriptedEngine::with_frames(10);
        let harness = Harness::with_sink(engine.clone(), engine.sink());
        let params = SeekSweepParams { positions: 3, step: 0.5 };

        harness
            .seek_sweep::<NoSurface>("clip.mp4", &SessionConfig::playback(), None, &params)
            .unwrap();

        let pairs: Vec<Call> = engine
            .calls()
            .into_iter()
            .filter(|c| matches!(c, Call::Seek(..) | Call::FrameAt(..)))
            .collect();
        assert_eq!(
            pairs,
            vec![
                Call::Seek(0, 0.0),
                Call::FrameAt(0, 0.0),
                Call::Seek(0, 0.5),
                Call::FrameAt(0, 0.5),
                Call::Seek(0, 1.0),
                Call::FrameAt(0, 1.0),
            ]
        );
    }

    #[test]
    fn test_zero_successes_has_no_average() {
        let engine = ScriptedEngine::with_frames(0);
        let harness = Harness::with_sink(engine.clone(), engine.sink());

        let outcome = harness
            .seek_sweep::<NoSurface>("empty.mp4", &SessionConfig::playback(), None, &SeekSweepParams::default())
            .unwrap();

        assert_eq!(outcome.successes, 0);
        assert_eq!(outcome.average, None);
        assert!(outcome.seek_times.iter().all(|t| *t == FAILED_SAMPLE));
        assert_eq!(engine.disposals(), 0);
    }

    #[test]
    fn test_start_precedes_first_seek() {
        let engine = ScriptedEngine::with_frames(10);
        let harness = Harness::with_sink(engine.clone(), engine.sink());

        harness
            .seek_sweep::<NoSurface>("clip.mp4", &SessionConfig::playback(), None, &SeekSweepParams::default())
            .unwrap();

        let calls = engine.calls();
        let start = calls.iter().position(|c| *c == Call::Start(0)).unwrap();
        let seek = calls.iter().position(|c| matches!(c, Call::Seek(..))).unwrap();
        assert!(start < seek);
    }
}
