//! # Decode Engine Seam
//!
//! The harness never decodes. It drives an external engine through the
//! traits below; `ffi::FfiEngine` binds them to libnopemd and the test
//! suite binds them to a scripted engine.
//!
//! ## Lifetimes
//! - `Engine::open` yields an instance or nothing.
//! - Dropping an instance closes it. There is no other close path, so an
//!   instance cannot be closed twice.
//! - Frames are moved into `release_frame` / `render_and_release_frame`,
//!   so a frame cannot be disposed twice.

use std::ffi::c_void;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::logging::LogSink;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Failed to load {path}: {reason}")]
    Load { path: String, reason: String },
    #[error("Missing engine symbol: {0}")]
    MissingSymbol(&'static str),
    #[error("Engine rejected option {key} (code {code})")]
    Rejected { key: &'static str, code: i32 },
    #[error("Engine failed to start (code {0})")]
    Start(i32),
}

/// Pixel format tag reported with each frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PixelFormat {
    Rgba,
    Bgra,
    VideoToolbox,
    /// Hardware buffer owned by an Android MediaCodec output surface
    MediaCodec,
    Vaapi,
    Other(i32),
}

impl PixelFormat {
    /// Whether the frame lives on a hardware surface and must be rendered
    /// to be given back.
    pub fn is_surface_backed(&self) -> bool {
        matches!(self, Self::MediaCodec)
    }
}

/// Which elementary stream the engine decodes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamSelect {
    Video,
    Audio,
}

/// The recognized engine option set
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EngineOption {
    MaxNbPackets(i32),
    MaxNbFrames(i32),
    MaxNbSink(i32),
    AutoHwaccel(bool),
    SwPixFmt(PixelFormat),
    AvSelect(StreamSelect),
    AudioTexture(bool),
    /// Address of the platform surface handle. Must stay valid until the
    /// instance is closed.
    Opaque(*mut c_void),
}

impl EngineOption {
    pub fn key(&self) -> &'static str {
        match self {
            Self::MaxNbPackets(_) => "max_nb_packets",
            Self::MaxNbFrames(_) => "max_nb_frames",
            Self::MaxNbSink(_) => "max_nb_sink",
            Self::AutoHwaccel(_) => "auto_hwaccel",
            Self::SwPixFmt(_) => "sw_pix_fmt",
            Self::AvSelect(_) => "avselect",
            Self::AudioTexture(_) => "audio_texture",
            Self::Opaque(_) => "opaque",
        }
    }
}

/// A frame handed out by the engine
pub trait EngineFrame {
    /// Presentation timestamp in seconds
    fn timestamp(&self) -> f64;

    fn pixel_format(&self) -> PixelFormat;
}

/// One open engine context. Dropping it closes the context.
pub trait EngineInstance {
    type Frame: EngineFrame;

    fn configure(&mut self, option: EngineOption) -> Result<(), EngineError>;

    /// Route the engine's own log output to `sink`
    fn set_log_sink(&mut self, sink: Arc<dyn LogSink>);

    fn start(&mut self) -> Result<(), EngineError>;

    /// Request that the next retrieval lands at or after `seconds`
    fn seek(&mut self, seconds: f64);

    /// Next frame in stream order, `None` at end of stream
    fn next_frame(&mut self) -> Option<Self::Frame>;

    /// Frame nearest to `seconds`, `None` if the engine has nothing there
    fn frame_at(&mut self, seconds: f64) -> Option<Self::Frame>;

    fn release_frame(&mut self, frame: Self::Frame);

    /// Display the frame on the bound surface and give it back
    fn render_and_release_frame(&mut self, frame: Self::Frame);
}

/// Factory for engine instances
pub trait Engine {
    type Instance: EngineInstance;

    fn open(&self, source: &str) -> Option<Self::Instance>;
}
