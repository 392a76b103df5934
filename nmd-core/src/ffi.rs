// FFI - libnopemd and FFmpeg hooks, loaded at runtime
//
// The decode engine ships as libnopemd.so next to the app. Nothing is
// linked at build time; the library is opened with libloading and the
// entry points are copied into a function table kept alive with it.
//
// Optional FFmpeg hooks (libavcodec / libavutil) are loaded the same way.
// They only exist on Android builds that bundle FFmpeg as shared objects.

use std::ffi::{c_void, CStr, CString};
use std::os::raw::{c_char, c_double, c_int};
use std::path::Path;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::engine::{Engine, EngineError, EngineFrame, EngineInstance, EngineOption, PixelFormat, StreamSelect};
use crate::logging::{LogLevel, LogSink};

// ============================================================================
// nopemd.h constants
// ============================================================================
//
// Values and the `nmd_frame` prefix below mirror the nopemd.h that ships
// with libnopemd.so (the `nmd_*` API exposing `nmd_mc_frame_render_and_releasep`
// and `nmd_get_frame`). The engine build pins no header version, so diff
// this block against the bundled nopemd.h whenever libnopemd.so is updated.

pub const NMD_LOG_VERBOSE: c_int = 0;
pub const NMD_LOG_DEBUG: c_int = 1;
pub const NMD_LOG_INFO: c_int = 2;
pub const NMD_LOG_WARNING: c_int = 3;
pub const NMD_LOG_ERROR: c_int = 4;

const NMD_PIXFMT_RGBA: c_int = 0;
const NMD_PIXFMT_BGRA: c_int = 1;
const NMD_PIXFMT_VT: c_int = 2;
const NMD_PIXFMT_MEDIACODEC: c_int = 3;
const NMD_PIXFMT_VAAPI: c_int = 4;

const NMD_SELECT_VIDEO: c_int = 0;
const NMD_SELECT_AUDIO: c_int = 1;

// libavutil/log.h
pub const AV_LOG_ERROR: c_int = 16;
pub const AV_LOG_WARNING: c_int = 24;
pub const AV_LOG_INFO: c_int = 32;
pub const AV_LOG_VERBOSE: c_int = 40;
pub const AV_LOG_DEBUG: c_int = 48;
pub const AV_LOG_TRACE: c_int = 56;

/// Default engine library name, overridable with `NMD_LIBRARY`
pub const DEFAULT_LIBRARY: &str = "libnopemd.so";

const LOG_LINE_MAX: usize = 4096;

impl PixelFormat {
    pub fn from_raw(raw: c_int) -> Self {
        match raw {
            NMD_PIXFMT_RGBA => Self::Rgba,
            NMD_PIXFMT_BGRA => Self::Bgra,
            NMD_PIXFMT_VT => Self::VideoToolbox,
            NMD_PIXFMT_MEDIACODEC => Self::MediaCodec,
            NMD_PIXFMT_VAAPI => Self::Vaapi,
            other => Self::Other(other),
        }
    }

    pub fn as_raw(&self) -> c_int {
        match self {
            Self::Rgba => NMD_PIXFMT_RGBA,
            Self::Bgra => NMD_PIXFMT_BGRA,
            Self::VideoToolbox => NMD_PIXFMT_VT,
            Self::MediaCodec => NMD_PIXFMT_MEDIACODEC,
            Self::Vaapi => NMD_PIXFMT_VAAPI,
            Self::Other(raw) => *raw,
        }
    }
}

impl StreamSelect {
    fn as_raw(&self) -> c_int {
        match self {
            Self::Video => NMD_SELECT_VIDEO,
            Self::Audio => NMD_SELECT_AUDIO,
        }
    }
}

/// Resolve the engine library path
pub fn library_path() -> String {
    std::env::var("NMD_LIBRARY").unwrap_or_else(|_| DEFAULT_LIBRARY.to_string())
}

// ============================================================================
// Engine Structures
// ============================================================================

#[repr(C)]
pub struct NmdCtx {
    _private: [u8; 0],
}

/// Leading fields of `struct nmd_frame`, in nopemd.h order up to `pix_fmt`.
/// Only read through the pointer handed out by the engine, so trailing
/// fields may be omitted. Must be re-checked with every nopemd.h update.
#[repr(C)]
#[allow(dead_code)]
struct NmdFrame {
    datap: [*mut u8; 4],
    linesizep: [c_int; 4],
    nb_samples: c_int,
    ts: c_double,
    width: c_int,
    height: c_int,
    pix_fmt: c_int,
}

// `va_list` crosses the boundary as a pointer on every Android ABI
// (array decay on x86_64, by-reference aggregate on aarch64, a single
// pointer on armv7 and x86).
type VaList = *mut c_void;

extern "C" {
    fn vsnprintf(buf: *mut c_char, size: libc::size_t, format: *const c_char, ap: VaList) -> c_int;
}

// ============================================================================
// Function Types
// ============================================================================

type NmdLogCallbackFn = unsafe extern "C" fn(
    *mut c_void,
    c_int,
    *const c_char,
    c_int,
    *const c_char,
    *const c_char,
    VaList,
);
type NmdCreateFn = unsafe extern "C" fn(*const c_char) -> *mut NmdCtx;
type NmdSetOptionFn = unsafe extern "C" fn(*mut NmdCtx, *const c_char, ...) -> c_int;
type NmdSetLogCallbackFn = unsafe extern "C" fn(*mut NmdCtx, *mut c_void, NmdLogCallbackFn);
type NmdStartFn = unsafe extern "C" fn(*mut NmdCtx) -> c_int;
type NmdSeekFn = unsafe extern "C" fn(*mut NmdCtx, c_double) -> c_int;
type NmdGetNextFrameFn = unsafe extern "C" fn(*mut NmdCtx) -> *mut NmdFrame;
type NmdGetFrameFn = unsafe extern "C" fn(*mut NmdCtx, c_double) -> *mut NmdFrame;
type NmdFrameReleasepFn = unsafe extern "C" fn(*mut *mut NmdFrame);
type NmdMcFrameRenderAndReleasepFn = unsafe extern "C" fn(*mut *mut NmdFrame) -> c_int;
type NmdFreepFn = unsafe extern "C" fn(*mut *mut NmdCtx);

type AvLogCallbackFn = unsafe extern "C" fn(*mut c_void, c_int, *const c_char, VaList);
type AvLogSetCallbackFn = unsafe extern "C" fn(Option<AvLogCallbackFn>);
type AvJniSetJavaVmFn = unsafe extern "C" fn(*mut c_void, *mut c_void) -> c_int;

// ============================================================================
// Loaded Functions Container
// ============================================================================

pub struct NmdLibrary {
    _lib: libloading::Library,

    create: NmdCreateFn,
    set_option: NmdSetOptionFn,
    set_log_callback: NmdSetLogCallbackFn,
    start: NmdStartFn,
    seek: NmdSeekFn,
    get_next_frame: NmdGetNextFrameFn,
    get_frame: NmdGetFrameFn,
    frame_releasep: NmdFrameReleasepFn,
    mc_frame_render_and_releasep: NmdMcFrameRenderAndReleasepFn,
    freep: NmdFreepFn,
}

unsafe impl Send for NmdLibrary {}
unsafe impl Sync for NmdLibrary {}

unsafe fn symbol<T: Copy>(lib: &libloading::Library, name: &'static str) -> Result<T, EngineError> {
    lib.get::<T>(name.as_bytes())
        .map(|sym| *sym)
        .map_err(|_| EngineError::MissingSymbol(name))
}

impl NmdLibrary {
    pub fn load(path: impl AsRef<Path>) -> Result<Arc<Self>, EngineError> {
        let path = path.as_ref();

        unsafe {
            let lib = libloading::Library::new(path).map_err(|e| EngineError::Load {
                path: path.display().to_string(),
                reason: e.to_string(),
            })?;

            let create = symbol::<NmdCreateFn>(&lib, "nmd_create")?;
            let set_option = symbol::<NmdSetOptionFn>(&lib, "nmd_set_option")?;
            let set_log_callback = symbol::<NmdSetLogCallbackFn>(&lib, "nmd_set_log_callback")?;
            let start = symbol::<NmdStartFn>(&lib, "nmd_start")?;
            let seek = symbol::<NmdSeekFn>(&lib, "nmd_seek")?;
            let get_next_frame = symbol::<NmdGetNextFrameFn>(&lib, "nmd_get_next_frame")?;
            let get_frame = symbol::<NmdGetFrameFn>(&lib, "nmd_get_frame")?;
            let frame_releasep = symbol::<NmdFrameReleasepFn>(&lib, "nmd_frame_releasep")?;
            let mc_frame_render_and_releasep =
                symbol::<NmdMcFrameRenderAndReleasepFn>(&lib, "nmd_mc_frame_render_and_releasep")?;
            let freep = symbol::<NmdFreepFn>(&lib, "nmd_freep")?;

            tracing::info!("NopeMD library loaded from {}", path.display());

            Ok(Arc::new(Self {
                _lib: lib,
                create,
                set_option,
                set_log_callback,
                start,
                seek,
                get_next_frame,
                get_frame,
                frame_releasep,
                mc_frame_render_and_releasep,
                freep,
            }))
        }
    }
}

// ============================================================================
// Engine Binding
// ============================================================================

/// `Engine` backed by libnopemd
#[derive(Clone)]
pub struct FfiEngine {
    lib: Arc<NmdLibrary>,
}

impl FfiEngine {
    pub fn new(lib: Arc<NmdLibrary>) -> Self {
        Self { lib }
    }

    /// Load the library found at `library_path()`
    pub fn load_default() -> Result<Self, EngineError> {
        NmdLibrary::load(library_path()).map(Self::new)
    }
}

impl Engine for FfiEngine {
    type Instance = NmdContext;

    fn open(&self, source: &str) -> Option<NmdContext> {
        let path = match CString::new(source) {
            Ok(path) => path,
            Err(_) => {
                tracing::warn!("Source path contains a NUL byte: {:?}", source);
                return None;
            }
        };

        let ctx = unsafe { (self.lib.create)(path.as_ptr()) };
        if ctx.is_null() {
            return None;
        }

        Some(NmdContext {
            ctx,
            lib: Arc::clone(&self.lib),
            sink: None,
        })
    }
}

/// An open `nmd_ctx`. Freed on drop.
pub struct NmdContext {
    ctx: *mut NmdCtx,
    lib: Arc<NmdLibrary>,
    // Boxed so the callback argument keeps a stable address
    sink: Option<Box<Arc<dyn LogSink>>>,
}

impl EngineInstance for NmdContext {
    type Frame = NmdFrameRef;

    fn configure(&mut self, option: EngineOption) -> Result<(), EngineError> {
        let key = option.key();
        let ckey = CString::new(key).map_err(|_| EngineError::Rejected { key, code: -1 })?;
        let k = ckey.as_ptr();

        let ret = unsafe {
            match option {
                EngineOption::MaxNbPackets(n)
                | EngineOption::MaxNbFrames(n)
                | EngineOption::MaxNbSink(n) => (self.lib.set_option)(self.ctx, k, n as c_int),
                EngineOption::AutoHwaccel(on) | EngineOption::AudioTexture(on) => {
                    (self.lib.set_option)(self.ctx, k, on as c_int)
                }
                EngineOption::SwPixFmt(fmt) => (self.lib.set_option)(self.ctx, k, fmt.as_raw()),
                EngineOption::AvSelect(sel) => (self.lib.set_option)(self.ctx, k, sel.as_raw()),
                EngineOption::Opaque(ptr) => (self.lib.set_option)(self.ctx, k, ptr),
            }
        };

        if ret < 0 {
            return Err(EngineError::Rejected { key, code: ret });
        }
        Ok(())
    }

    fn set_log_sink(&mut self, sink: Arc<dyn LogSink>) {
        let boxed = Box::new(sink);
        let arg = &*boxed as *const Arc<dyn LogSink> as *mut c_void;
        unsafe { (self.lib.set_log_callback)(self.ctx, arg, nmd_log_callback) };
        // The previous sink is only dropped once the engine points at the new one
        self.sink = Some(boxed);
    }

    fn start(&mut self) -> Result<(), EngineError> {
        let ret = unsafe { (self.lib.start)(self.ctx) };
        if ret < 0 {
            return Err(EngineError::Start(ret));
        }
        Ok(())
    }

    fn seek(&mut self, seconds: f64) {
        let ret = unsafe { (self.lib.seek)(self.ctx, seconds) };
        if ret < 0 {
            tracing::debug!("nmd_seek({}) returned {}", seconds, ret);
        }
    }

    fn next_frame(&mut self) -> Option<NmdFrameRef> {
        let ptr = unsafe { (self.lib.get_next_frame)(self.ctx) };
        NmdFrameRef::wrap(ptr, &self.lib)
    }

    fn frame_at(&mut self, seconds: f64) -> Option<NmdFrameRef> {
        let ptr = unsafe { (self.lib.get_frame)(self.ctx, seconds) };
        NmdFrameRef::wrap(ptr, &self.lib)
    }

    fn release_frame(&mut self, frame: NmdFrameRef) {
        frame.release();
    }

    fn render_and_release_frame(&mut self, frame: NmdFrameRef) {
        frame.render_and_release();
    }
}

impl Drop for NmdContext {
    fn drop(&mut self) {
        unsafe { (self.lib.freep)(&mut self.ctx) };
        self.ctx = std::ptr::null_mut();
    }
}

/// A frame owned by the harness until it is handed back to the engine.
/// Dropping it without an explicit disposal still releases it.
pub struct NmdFrameRef {
    ptr: *mut NmdFrame,
    lib: Arc<NmdLibrary>,
}

impl NmdFrameRef {
    fn wrap(ptr: *mut NmdFrame, lib: &Arc<NmdLibrary>) -> Option<Self> {
        if ptr.is_null() {
            return None;
        }
        Some(Self { ptr, lib: Arc::clone(lib) })
    }

    fn release(mut self) {
        unsafe { (self.lib.frame_releasep)(&mut self.ptr) };
        self.ptr = std::ptr::null_mut();
    }

    fn render_and_release(mut self) {
        let ret = unsafe { (self.lib.mc_frame_render_and_releasep)(&mut self.ptr) };
        if ret < 0 {
            tracing::debug!("MediaCodec render returned {}", ret);
        }
        self.ptr = std::ptr::null_mut();
    }
}

impl EngineFrame for NmdFrameRef {
    fn timestamp(&self) -> f64 {
        unsafe { (*self.ptr).ts }
    }

    fn pixel_format(&self) -> PixelFormat {
        PixelFormat::from_raw(unsafe { (*self.ptr).pix_fmt })
    }
}

impl Drop for NmdFrameRef {
    fn drop(&mut self) {
        if !self.ptr.is_null() {
            unsafe { (self.lib.frame_releasep)(&mut self.ptr) };
        }
    }
}

// ============================================================================
// Log Callbacks
// ============================================================================

unsafe fn format_va(fmt: *const c_char, vl: VaList) -> String {
    let mut buf = [0 as c_char; LOG_LINE_MAX];
    if vsnprintf(buf.as_mut_ptr(), buf.len(), fmt, vl) < 0 {
        return String::new();
    }
    CStr::from_ptr(buf.as_ptr())
        .to_string_lossy()
        .trim_end()
        .to_string()
}

unsafe extern "C" fn nmd_log_callback(
    arg: *mut c_void,
    level: c_int,
    _filename: *const c_char,
    _ln: c_int,
    _func: *const c_char,
    fmt: *const c_char,
    vl: VaList,
) {
    if arg.is_null() || fmt.is_null() {
        return;
    }
    let sink = &*(arg as *const Arc<dyn LogSink>);
    let message = format_va(fmt, vl);
    sink.log(LogLevel::from_engine(level), "NopeMD", &message);
}

static AV_SINK: Mutex<Option<Arc<dyn LogSink>>> = parking_lot::const_mutex(None);

unsafe extern "C" fn av_log_callback(_avcl: *mut c_void, level: c_int, fmt: *const c_char, vl: VaList) {
    if fmt.is_null() {
        return;
    }
    let sink = AV_SINK.lock().clone();
    if let Some(sink) = sink {
        let message = format_va(fmt, vl);
        sink.log(LogLevel::from_av(level), "AV", &message);
    }
}

// ============================================================================
// FFmpeg Hooks
// ============================================================================

/// Process-wide FFmpeg hooks. Each one is optional: a build without shared
/// FFmpeg libraries simply has none.
pub struct AvHooks {
    _avcodec: Option<libloading::Library>,
    _avutil: Option<libloading::Library>,
    jni_set_java_vm: Option<AvJniSetJavaVmFn>,
    log_set_callback: Option<AvLogSetCallbackFn>,
}

unsafe impl Send for AvHooks {}
unsafe impl Sync for AvHooks {}

impl AvHooks {
    pub fn load() -> Self {
        unsafe {
            let avcodec = match libloading::Library::new("libavcodec.so") {
                Ok(lib) => Some(lib),
                Err(e) => {
                    tracing::debug!("libavcodec not available: {}", e);
                    None
                }
            };
            let avutil = match libloading::Library::new("libavutil.so") {
                Ok(lib) => Some(lib),
                Err(e) => {
                    tracing::debug!("libavutil not available: {}", e);
                    None
                }
            };

            let jni_set_java_vm = avcodec
                .as_ref()
                .and_then(|lib| symbol::<AvJniSetJavaVmFn>(lib, "av_jni_set_java_vm").ok());
            let log_set_callback = avutil
                .as_ref()
                .and_then(|lib| symbol::<AvLogSetCallbackFn>(lib, "av_log_set_callback").ok());

            Self {
                _avcodec: avcodec,
                _avutil: avutil,
                jni_set_java_vm,
                log_set_callback,
            }
        }
    }

    /// Hand the Java VM to FFmpeg's MediaCodec wrappers
    ///
    /// # Safety
    /// `vm` must be the process `JavaVM*`.
    pub unsafe fn set_java_vm(&self, vm: *mut c_void) -> bool {
        match self.jni_set_java_vm {
            Some(f) => f(vm, std::ptr::null_mut()) >= 0,
            None => false,
        }
    }

    /// Route every `av_log` message to `sink`
    pub fn route_logs(&self, sink: Arc<dyn LogSink>) -> bool {
        let Some(f) = self.log_set_callback else {
            return false;
        };
        *AV_SINK.lock() = Some(sink);
        unsafe { f(Some(av_log_callback)) };
        true
    }
}
