//! Scripted in-memory engine for tests.
//!
//! Every call made against it lands in a shared call log so tests can assert
//! ordering (close before surface release), disposal counts and seek
//! fan-out without the native library.
//!
//! Streams are synthetic: frame `k` has timestamp `k / rate`. `seek(t)`
//! moves the cursor to `round(t * rate)`; a cursor past the stream length
//! yields end of stream.

use std::ffi::c_void;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::engine::{Engine, EngineError, EngineFrame, EngineInstance, EngineOption, PixelFormat};
use crate::logging::{LogLevel, LogSink};
use crate::session::SurfaceBinding;

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Open(usize),
    Configure(usize, &'static str),
    Start(usize),
    Seek(usize, f64),
    NextFrame(usize),
    FrameAt(usize, f64),
    Release(usize),
    RenderAndRelease(usize),
    Close(usize),
    SurfaceReleased(usize),
}

pub type CallLog = Arc<Mutex<Vec<Call>>>;

#[derive(Debug, Clone)]
pub struct ScriptedFrame {
    session: usize,
    timestamp: f64,
    format: PixelFormat,
}

impl EngineFrame for ScriptedFrame {
    fn timestamp(&self) -> f64 {
        self.timestamp
    }

    fn pixel_format(&self) -> PixelFormat {
        self.format
    }
}

#[derive(Clone)]
pub struct ScriptedEngine {
    log: CallLog,
    next_id: Arc<Mutex<usize>>,
    retrieved: Arc<Mutex<usize>>,
    frames: u64,
    per_session: Vec<u64>,
    rate: f64,
    format: PixelFormat,
    fail_open: bool,
    rejected: Option<&'static str>,
    sink: Arc<MemorySink>,
}

impl ScriptedEngine {
    /// Every opened stream holds `frames` frames at 60 fps
    pub fn with_frames(frames: u64) -> Self {
        Self {
            log: Arc::new(Mutex::new(Vec::new())),
            next_id: Arc::new(Mutex::new(0)),
            retrieved: Arc::new(Mutex::new(0)),
            frames,
            per_session: Vec::new(),
            rate: 60.0,
            format: PixelFormat::Rgba,
            fail_open: false,
            rejected: None,
            sink: Arc::new(MemorySink::default()),
        }
    }

    /// Stream length by open order; sessions past the list use the default
    pub fn with_session_frames(mut self, frames: &[u64]) -> Self {
        self.per_session = frames.to_vec();
        self
    }

    pub fn with_rate(mut self, rate: f64) -> Self {
        self.rate = rate;
        self
    }

    pub fn with_format(mut self, format: PixelFormat) -> Self {
        self.format = format;
        self
    }

    pub fn failing_open(mut self) -> Self {
        self.fail_open = true;
        self
    }

    pub fn rejecting(mut self, key: &'static str) -> Self {
        self.rejected = Some(key);
        self
    }

    pub fn log(&self) -> CallLog {
        self.log.clone()
    }

    pub fn calls(&self) -> Vec<Call> {
        self.log.lock().clone()
    }

    pub fn sink(&self) -> Arc<dyn LogSink> {
        self.sink.clone()
    }

    pub fn memory_sink(&self) -> Arc<MemorySink> {
        self.sink.clone()
    }

    pub fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
        self.log.lock().iter().filter(|c| pred(c)).count()
    }

    pub fn disposals(&self) -> usize {
        self.count(|c| matches!(c, Call::Release(_) | Call::RenderAndRelease(_)))
    }

    /// Frames successfully handed out by `next_frame` or `frame_at`
    pub fn retrievals(&self) -> usize {
        *self.retrieved.lock()
    }
}

impl Engine for ScriptedEngine {
    type Instance = ScriptedInstance;

    fn open(&self, _source: &str) -> Option<ScriptedInstance> {
        if self.fail_open {
            return None;
        }
        let id = {
            let mut next = self.next_id.lock();
            let id = *next;
            *next += 1;
            id
        };
        self.log.lock().push(Call::Open(id));
        Some(ScriptedInstance {
            id,
            log: self.log.clone(),
            retrieved: self.retrieved.clone(),
            frames: self.per_session.get(id).copied().unwrap_or(self.frames),
            rate: self.rate,
            format: self.format,
            rejected: self.rejected,
            cursor: 0,
            handed_out: 0,
        })
    }
}

pub struct ScriptedInstance {
    id: usize,
    log: CallLog,
    retrieved: Arc<Mutex<usize>>,
    frames: u64,
    rate: f64,
    format: PixelFormat,
    rejected: Option<&'static str>,
    cursor: u64,
    handed_out: usize,
}

impl ScriptedInstance {
    fn push(&self, call: Call) {
        self.log.lock().push(call);
    }

    fn index_of(&self, seconds: f64) -> Option<u64> {
        if seconds < 0.0 {
            return None;
        }
        let index = (seconds * self.rate).round() as u64;
        (index < self.frames).then_some(index)
    }

    fn frame(&mut self, index: u64) -> ScriptedFrame {
        self.handed_out += 1;
        *self.retrieved.lock() += 1;
        ScriptedFrame {
            session: self.id,
            timestamp: index as f64 / self.rate,
            format: self.format,
        }
    }
}

impl EngineInstance for ScriptedInstance {
    type Frame = ScriptedFrame;

    fn configure(&mut self, option: EngineOption) -> Result<(), EngineError> {
        self.push(Call::Configure(self.id, option.key()));
        if self.rejected == Some(option.key()) {
            return Err(EngineError::Rejected {
                key: option.key(),
                code: -22,
            });
        }
        Ok(())
    }

    fn set_log_sink(&mut self, sink: Arc<dyn LogSink>) {
        sink.log(LogLevel::Debug, "NopeMD", "log sink attached");
    }

    fn start(&mut self) -> Result<(), EngineError> {
        self.push(Call::Start(self.id));
        Ok(())
    }

    fn seek(&mut self, seconds: f64) {
        self.push(Call::Seek(self.id, seconds));
        self.cursor = (seconds.max(0.0) * self.rate).round() as u64;
    }

    fn next_frame(&mut self) -> Option<ScriptedFrame> {
        self.push(Call::NextFrame(self.id));
        if self.cursor >= self.frames {
            return None;
        }
        let index = self.cursor;
        self.cursor += 1;
        Some(self.frame(index))
    }

    fn frame_at(&mut self, seconds: f64) -> Option<ScriptedFrame> {
        self.push(Call::FrameAt(self.id, seconds));
        let index = self.index_of(seconds)?;
        self.cursor = index + 1;
        Some(self.frame(index))
    }

    fn release_frame(&mut self, frame: ScriptedFrame) {
        assert_eq!(frame.session, self.id, "frame released on the wrong instance");
        self.handed_out -= 1;
        self.push(Call::Release(self.id));
    }

    fn render_and_release_frame(&mut self, frame: ScriptedFrame) {
        assert_eq!(frame.session, self.id, "frame rendered on the wrong instance");
        self.handed_out -= 1;
        self.push(Call::RenderAndRelease(self.id));
    }
}

impl Drop for ScriptedInstance {
    fn drop(&mut self) {
        if !std::thread::panicking() {
            assert_eq!(self.handed_out, 0, "instance closed with frames outstanding");
        }
        self.push(Call::Close(self.id));
    }
}

/// Stand-in for a durable platform surface reference
pub struct TestSurface {
    id: usize,
    log: CallLog,
    handle: Box<usize>,
}

impl TestSurface {
    pub fn new(id: usize, log: CallLog) -> Self {
        Self {
            id,
            log,
            handle: Box::new(id),
        }
    }
}

impl SurfaceBinding for TestSurface {
    fn opaque(&self) -> *mut c_void {
        &*self.handle as *const usize as *mut c_void
    }
}

impl Drop for TestSurface {
    fn drop(&mut self) {
        self.log.lock().push(Call::SurfaceReleased(self.id));
    }
}

/// Sink that keeps every message
#[derive(Default)]
pub struct MemorySink {
    lines: Mutex<Vec<(LogLevel, String, String)>>,
}

impl MemorySink {
    pub fn lines(&self) -> Vec<(LogLevel, String, String)> {
        self.lines.lock().clone()
    }
}

impl LogSink for MemorySink {
    fn log(&self, level: LogLevel, tag: &str, message: &str) {
        self.lines.lock().push((level, tag.to_string(), message.to_string()));
    }
}
