//! # Decode Session
//!
//! One engine instance, its tunables and an optional surface back-reference.
//!
//! The surface reference is taken by the caller before `Session::create`
//! and moved in; it is released when the session goes away, strictly after
//! the engine instance has been closed.

use std::ffi::c_void;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::engine::{Engine, EngineInstance, EngineOption, PixelFormat, StreamSelect};
use crate::logging::LogSink;
use crate::release::{self, Disposal};
use crate::scenario::HarnessError;

/// A durable reference to a platform rendering target
pub trait SurfaceBinding {
    /// Address handed to the engine's `opaque` option. Must stay valid for
    /// as long as the binding is alive.
    fn opaque(&self) -> *mut c_void;
}

/// Surface type for sessions that never render (desktop, audio)
#[derive(Debug)]
pub enum NoSurface {}

impl SurfaceBinding for NoSurface {
    fn opaque(&self) -> *mut c_void {
        match *self {}
    }
}

/// Engine tunables applied at creation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub max_nb_packets: i32,
    pub max_nb_frames: i32,
    pub max_nb_sink: i32,
    /// `None` leaves the engine default in place
    pub auto_hwaccel: Option<bool>,
    pub sw_pix_fmt: Option<PixelFormat>,
    pub stream: Option<StreamSelect>,
    pub audio_texture: Option<bool>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self::playback()
    }
}

impl SessionConfig {
    /// Single hardware-accelerated playback session, minimal buffering
    pub fn playback() -> Self {
        Self {
            max_nb_packets: 1,
            max_nb_frames: 1,
            max_nb_sink: 1,
            auto_hwaccel: Some(true),
            sw_pix_fmt: None,
            stream: None,
            audio_texture: None,
        }
    }

    /// One of several sessions decoding side by side
    pub fn concurrent() -> Self {
        Self {
            max_nb_packets: 10,
            ..Self::playback()
        }
    }

    /// Software decode to RGBA
    pub fn software_rgba() -> Self {
        Self {
            auto_hwaccel: None,
            sw_pix_fmt: Some(PixelFormat::Rgba),
            ..Self::playback()
        }
    }

    /// Audio stream only, samples kept in system memory
    pub fn audio() -> Self {
        Self {
            auto_hwaccel: None,
            stream: Some(StreamSelect::Audio),
            audio_texture: Some(false),
            ..Self::playback()
        }
    }

    /// Options in the order they are applied
    pub fn options(&self) -> Vec<EngineOption> {
        let mut options = Vec::with_capacity(7);
        if let Some(stream) = self.stream {
            options.push(EngineOption::AvSelect(stream));
        }
        if let Some(texture) = self.audio_texture {
            options.push(EngineOption::AudioTexture(texture));
        }
        options.push(EngineOption::MaxNbPackets(self.max_nb_packets));
        options.push(EngineOption::MaxNbFrames(self.max_nb_frames));
        options.push(EngineOption::MaxNbSink(self.max_nb_sink));
        if let Some(hwaccel) = self.auto_hwaccel {
            options.push(EngineOption::AutoHwaccel(hwaccel));
        }
        if let Some(fmt) = self.sw_pix_fmt {
            options.push(EngineOption::SwPixFmt(fmt));
        }
        options
    }
}

/// An open decode session
pub struct Session<I: EngineInstance, S: SurfaceBinding> {
    // Field order matters: the engine is closed before the surface
    // reference is released.
    instance: I,
    _surface: Option<S>,
    source: String,
}

impl<I: EngineInstance, S: SurfaceBinding> Session<I, S> {
    /// Open `source` and apply `config`.
    ///
    /// On failure nothing is left open: a half-configured instance is
    /// closed and the surface reference is released before returning.
    pub fn create<E>(
        engine: &E,
        source: &str,
        config: &SessionConfig,
        surface: Option<S>,
        sink: Arc<dyn LogSink>,
    ) -> Result<Self, HarnessError>
    where
        E: Engine<Instance = I>,
    {
        let mut instance = engine.open(source).ok_or_else(|| HarnessError::Open {
            path: source.to_string(),
        })?;

        for option in config.options() {
            instance.configure(option).map_err(|e| HarnessError::Configure {
                path: source.to_string(),
                source: e,
            })?;
        }
        if let Some(surface) = &surface {
            instance
                .configure(EngineOption::Opaque(surface.opaque()))
                .map_err(|e| HarnessError::Configure {
                    path: source.to_string(),
                    source: e,
                })?;
        }
        instance.set_log_sink(sink);

        tracing::debug!("Session opened: {}", source);

        Ok(Self {
            instance,
            _surface: surface,
            source: source.to_string(),
        })
    }

    /// Start buffering ahead of the first retrieval
    pub fn start(&mut self) -> Result<(), HarnessError> {
        self.instance.start().map_err(|e| HarnessError::Start {
            path: self.source.clone(),
            source: e,
        })
    }

    pub fn seek(&mut self, seconds: f64) {
        self.instance.seek(seconds);
    }

    pub fn get_next_frame(&mut self) -> Option<I::Frame> {
        self.instance.next_frame()
    }

    pub fn get_frame_at(&mut self, seconds: f64) -> Option<I::Frame> {
        self.instance.frame_at(seconds)
    }

    /// Hand a retrieved frame back through the release policy
    pub fn dispose(&mut self, frame: I::Frame) -> Disposal {
        release::dispose(&mut self.instance, frame)
    }

    /// Close the engine, then release the surface reference
    pub fn destroy(self) {
        tracing::debug!("Session closed: {}", self.source);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{Call, ScriptedEngine, TestSurface};

    #[test]
    fn test_playback_options() {
        let keys: Vec<_> = SessionConfig::playback()
            .options()
            .iter()
            .map(|o| o.key())
            .collect();
        assert_eq!(keys, ["max_nb_packets", "max_nb_frames", "max_nb_sink", "auto_hwaccel"]);
    }

    #[test]
    fn test_preset_values() {
        assert_eq!(SessionConfig::concurrent().max_nb_packets, 10);
        assert_eq!(SessionConfig::software_rgba().sw_pix_fmt, Some(PixelFormat::Rgba));
        assert_eq!(SessionConfig::software_rgba().auto_hwaccel, None);

        let audio = SessionConfig::audio().options();
        assert_eq!(audio[0], EngineOption::AvSelect(StreamSelect::Audio));
        assert_eq!(audio[1], EngineOption::AudioTexture(false));
        assert!(!audio.iter().any(|o| o.key() == "auto_hwaccel"));
    }

    #[test]
    fn test_config_from_json() {
        let config: SessionConfig =
            serde_json::from_str(r#"{ "max_nb_packets": 4, "sw_pix_fmt": "Rgba" }"#).unwrap();
        assert_eq!(config.max_nb_packets, 4);
        assert_eq!(config.max_nb_frames, 1);
        assert_eq!(config.sw_pix_fmt, Some(PixelFormat::Rgba));
    }

    #[test]
    fn test_surface_released_after_close() {
        let engine = ScriptedEngine::with_frames(3);
        let surface = TestSurface::new(0, engine.log());

        let session = Session::create(
            &engine,
            "clip.mp4",
            &SessionConfig::playback(),
            Some(surface),
            engine.sink(),
        )
        .unwrap();
        assert_eq!(engine.memory_sink().lines().len(), 1);
        session.destroy();

        let calls = engine.calls();
        let close = calls.iter().position(|c| *c == Call::Close(0)).unwrap();
        let release = calls.iter().position(|c| *c == Call::SurfaceReleased(0)).unwrap();
        assert!(close < release);
        assert_eq!(calls.iter().filter(|c| matches!(c, Call::Close(_))).count(), 1);
    }

    #[test]
    fn test_opaque_follows_config_options() {
        let engine = ScriptedEngine::with_frames(3);
        let surface = TestSurface::new(0, engine.log());

        let mut session = Session::create(
            &engine,
            "clip.mp4",
            &SessionConfig::concurrent(),
            Some(surface),
            engine.sink(),
        )
        .unwrap();
        session.start().unwrap();
        drop(session);
        assert!(engine.calls().contains(&Call::Start(0)));

        let configured: Vec<_> = engine
            .calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Configure(_, key) => Some(key),
                _ => None,
            })
            .collect();
        assert_eq!(configured.last(), Some(&"opaque"));
        assert_eq!(configured.len(), 5);
        assert_eq!(engine.calls()[0], Call::Open(0));
    }

    #[test]
    fn test_open_failure_releases_surface() {
        let engine = ScriptedEngine::with_frames(3).failing_open();
        let surface = TestSurface::new(7, engine.log());

        let result = Session::create(
            &engine,
            "missing.mp4",
            &SessionConfig::playback(),
            Some(surface),
            engine.sink(),
        );
        assert!(matches!(result, Err(HarnessError::Open { .. })));
        assert_eq!(engine.calls(), vec![Call::SurfaceReleased(7)]);
    }

    #[test]
    fn test_rejected_option_closes_instance() {
        let engine = ScriptedEngine::with_frames(3).rejecting("auto_hwaccel");

        let result = Session::<_, NoSurface>::create(
            &engine,
            "clip.mp4",
            &SessionConfig::playback(),
            None,
            engine.sink(),
        );
        assert!(matches!(result, Err(HarnessError::Configure { .. })));
        assert!(engine.calls().contains(&Call::Close(0)));
    }
}
