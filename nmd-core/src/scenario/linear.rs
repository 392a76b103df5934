//! Single-session linear playback.
//!
//! Frames are pulled in stream order until end of stream or the frame cap.
//! Unless replay is disabled (live playback), the decoded range is then
//! looked up again frame by frame at playback pace, followed by the
//! fixture table passes.

use serde::{Deserialize, Serialize};

use super::{replay, Harness, HarnessError, ReplayStats};
use crate::engine::Engine;
use crate::fixtures::ReplayFixture;
use crate::session::{Session, SessionConfig, SurfaceBinding};
use crate::timing::Stopwatch;

/// Frame cap for live and random-seek playback
pub const LIVE_FRAME_CAP: u64 = 600;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinearParams {
    /// Stop after this many frames, `None` to run to end of stream
    pub frame_cap: Option<u64>,
    pub replay: bool,
    pub fixture: ReplayFixture,
}

impl Default for LinearParams {
    fn default() -> Self {
        Self {
            frame_cap: None,
            replay: true,
            fixture: ReplayFixture::default(),
        }
    }
}

impl LinearParams {
    pub fn live() -> Self {
        Self {
            frame_cap: Some(LIVE_FRAME_CAP),
            replay: false,
            ..Self::default()
        }
    }

    /// Capped playback followed by the full replay
    pub fn random_seek() -> Self {
        Self {
            frame_cap: Some(LIVE_FRAME_CAP),
            ..Self::default()
        }
    }

    /// `live` selects live playback, anything else a full run
    pub fn from_live_flag(live: bool) -> Self {
        if live {
            Self::live()
        } else {
            Self::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LinearOutcome {
    pub frames: u64,
    /// Time from session creation to the first frame
    pub first_frame_secs: Option<f64>,
    /// Time from the first frame to the last one
    pub elapsed: f64,
    pub replay: Option<ReplayStats>,
}

impl LinearOutcome {
    pub fn fps(&self) -> f64 {
        if self.elapsed > 0.0 {
            self.frames as f64 / self.elapsed
        } else {
            0.0
        }
    }
}

impl<E: Engine> Harness<E> {
    pub fn linear<S: SurfaceBinding>(
        &self,
        source: &str,
        config: &SessionConfig,
        surface: Option<S>,
        params: &LinearParams,
    ) -> Result<LinearOutcome, HarnessError> {
        let mut watch = Stopwatch::start();
        let mut session = Session::create(self.engine(), source, config, surface, self.sink())?;

        let mut frames = 0u64;
        let mut first_frame_secs = None;
        while let Some(frame) = session.get_next_frame() {
            frames += 1;
            session.dispose(frame);

            if frames == 1 {
                let secs = watch.elapsed_secs();
                tracing::info!("Got first frame in {:.6} s", secs);
                first_frame_secs = Some(secs);
                watch.restart();
            }
            if params.frame_cap.is_some_and(|cap| frames >= cap) {
                break;
            }
        }
        let elapsed = watch.elapsed_secs();

        let mut outcome = LinearOutcome {
            frames,
            first_frame_secs,
            elapsed,
            replay: None,
        };
        tracing::info!(
            "Got {} frames in {:.6} s: {:.2} fps",
            frames,
            elapsed,
            outcome.fps()
        );

        if params.replay {
            outcome.replay = Some(replay(&mut session, frames, &params.fixture));
        }

        session.destroy();
        tracing::info!("Done");
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::PixelFormat;
    use crate::session::NoSurface;
    use crate::testing::{Call, ScriptedEngine, TestSurface};

    fn unpaced(params: LinearParams) -> LinearParams {
        LinearParams {
            fixture: ReplayFixture::unpaced(),
            ..params
        }
    }

    #[test]
    fn test_runs_to_end_of_stream() {
        let engine = ScriptedEngine::with_frames(42);
        let harness = Harness::with_sink(engine.clone(), engine.sink());

        let outcome = harness
            .linear::<NoSurface>("clip.mp4", &SessionConfig::playback(), None, &unpaced(LinearParams::default()))
            .unwrap();

        assert_eq!(outcome.frames, 42);
        assert!(outcome.first_frame_secs.is_some());
        let replay = outcome.replay.unwrap();
        assert_eq!(replay.attempts, 42 + 110);
        assert_eq!(engine.disposals(), engine.retrievals());
        assert_eq!(engine.count(|c| matches!(c, Call::Close(_))), 1);
        assert!(!engine.calls().contains(&Call::Start(0)));
    }

    #[test]
    fn test_live_stops_at_cap() {
        let engine = ScriptedEngine::with_frames(2000);
        let harness = Harness::with_sink(engine.clone(), engine.sink());

        let outcome = harness
            .linear::<NoSurface>("live.ts", &SessionConfig::playback(), None, &LinearParams::live())
            .unwrap();

        assert_eq!(outcome.frames, LIVE_FRAME_CAP);
        assert_eq!(outcome.replay, None);
        assert_eq!(engine.count(|c| matches!(c, Call::NextFrame(_))), LIVE_FRAME_CAP as usize);
        assert_eq!(engine.count(|c| matches!(c, Call::FrameAt(..))), 0);
    }

    #[test]
    fn test_live_on_short_stream() {
        let engine = ScriptedEngine::with_frames(5);
        let harness = Harness::with_sink(engine.clone(), engine.sink());

        let outcome = harness
            .linear::<NoSurface>("short.mp4", &SessionConfig::playback(), None, &LinearParams::live())
            .unwrap();
        assert_eq!(outcome.frames, 5);
    }

    #[test]
    fn test_random_seek_caps_then_replays() {
        let engine = ScriptedEngine::with_frames(1200);
        let harness = Harness::with_sink(engine.clone(), engine.sink());

        let outcome = harness
            .linear::<NoSurface>(
                "clip.mp4",
                &SessionConfig::software_rgba(),
                None,
                &unpaced(LinearParams::random_seek()),
            )
            .unwrap();

        assert_eq!(outcome.frames, 600);
        let replay = outcome.replay.unwrap();
        assert_eq!(replay.attempts, 600 + 110);
        // 20 s of content covers every table entry
        assert_eq!(replay.misses(), 0);
        assert!(engine.calls().contains(&Call::Configure(0, "sw_pix_fmt")));
        assert!(!engine.calls().contains(&Call::Configure(0, "auto_hwaccel")));
    }

    #[test]
    fn test_empty_stream() {
        let engine = ScriptedEngine::with_frames(0);
        let harness = Harness::with_sink(engine.clone(), engine.sink());

        let outcome = harness
            .linear::<NoSurface>("empty.mp4", &SessionConfig::playback(), None, &unpaced(LinearParams::default()))
            .unwrap();

        assert_eq!(outcome.frames, 0);
        assert_eq!(outcome.first_frame_secs, None);
        assert_eq!(outcome.fps(), 0.0);
        // Only the table passes run, all missing
        let replay = outcome.replay.unwrap();
        assert_eq!(replay.hits, 0);
        assert_eq!(replay.attempts, 110);
        assert_eq!(engine.disposals(), 0);
    }

    #[test]
    fn test_surface_frames_rendered_and_surface_released_last() {
        let engine = ScriptedEngine::with_frames(3).with_format(PixelFormat::MediaCodec);
        let harness = Harness::with_sink(engine.clone(), engine.sink());
        let surface = TestSurface::new(0, engine.log());

        harness
            .linear("clip.mp4", &SessionConfig::playback(), Some(surface), &LinearParams::live())
            .unwrap();

        let calls = engine.calls();
        assert_eq!(calls.iter().filter(|c| matches!(c, Call::RenderAndRelease(_))).count(), 3);
        assert_eq!(calls.last(), Some(&Call::SurfaceReleased(0)));
        assert_eq!(calls[calls.len() - 2], Call::Close(0));
        assert!(calls.contains(&Call::Configure(0, "opaque")));
    }

    #[test]
    fn test_open_failure_aborts() {
        let engine = ScriptedEngine::with_frames(3).failing_open();
        let harness = Harness::with_sink(engine.clone(), engine.sink());
        let surface = TestSurface::new(0, engine.log());

        let result = harness.linear("missing.mp4", &SessionConfig::playback(), Some(surface), &LinearParams::live());

        assert!(matches!(result, Err(HarnessError::Open { .. })));
        assert_eq!(engine.calls(), vec![Call::SurfaceReleased(0)]);
    }

    #[test]
    fn test_params_from_live_flag() {
        assert_eq!(LinearParams::from_live_flag(true), LinearParams::live());
        assert_eq!(LinearParams::from_live_flag(false), LinearParams::default());
        assert_eq!(LinearParams::random_seek().frame_cap, Some(600));
        assert!(LinearParams::random_seek().replay);
    }
}
