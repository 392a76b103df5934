//! Frame release policy.
//!
//! Every frame the harness retrieves leaves through `dispose`, exactly once.
//! Surface-backed frames are rendered on the way out; everything else is
//! plainly released.

use crate::engine::{EngineFrame, EngineInstance, PixelFormat};

/// The path a frame took back to the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposal {
    RenderAndRelease,
    Release,
}

impl Disposal {
    pub fn for_format(format: PixelFormat) -> Self {
        if format.is_surface_backed() {
            Self::RenderAndRelease
        } else {
            Self::Release
        }
    }
}

pub fn dispose<I: EngineInstance>(instance: &mut I, frame: I::Frame) -> Disposal {
    let disposal = Disposal::for_format(frame.pixel_format());
    match disposal {
        Disposal::RenderAndRelease => instance.render_and_release_frame(frame),
        Disposal::Release => instance.release_frame(frame),
    }
    disposal
}
