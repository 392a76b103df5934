//! Audio-only throughput: sequential retrieval on the audio stream, no
//! seeking and no surface.

use super::{Harness, HarnessError};
use crate::engine::Engine;
use crate::session::{NoSurface, Session, SessionConfig};
use crate::timing::Stopwatch;

#[derive(Debug, Clone, PartialEq)]
pub struct AudioOutcome {
    pub frames: u64,
    pub first_frame_secs: Option<f64>,
    /// Time from the first frame to end of stream
    pub elapsed: f64,
}

impl<E: Engine> Harness<E> {
    pub fn audio(&self, source: &str, config: &SessionConfig) -> Result<AudioOutcome, HarnessError> {
        let mut watch = Stopwatch::start();
        let mut session =
            Session::<_, NoSurface>::create(self.engine(), source, config, None, self.sink())?;

        let mut frames = 0u64;
        let mut first_frame_secs = None;
        while let Some(frame) = session.get_next_frame() {
            frames += 1;
            session.dispose(frame);
            if frames == 1 {
                first_frame_secs = Some(watch.elapsed_secs());
                watch.restart();
            }
        }
        let elapsed = watch.elapsed_secs();
        session.destroy();

        if let Some(first) = first_frame_secs {
            tracing::info!("Got first audio frame in {:.6} s", first);
        }
        tracing::info!("Got {} audio frames in {:.6} s", frames, elapsed);

        Ok(AudioOutcome {
            frames,
            first_frame_secs,
            elapsed,
        })
    }
}
