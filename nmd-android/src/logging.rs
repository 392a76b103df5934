//! Logcat plumbing.
//!
//! Harness diagnostics go through `tracing`; on device the subscriber is a
//! `tracing-android` layer tagged `NopeMD`. Engine and FFmpeg messages keep
//! their own logcat tag (`NopeMD` / `AV`) and are written directly.

use std::sync::{Arc, Once};

use nmd_core::LogSink;
#[cfg(target_os = "android")]
use nmd_core::LogLevel;

pub const LOG_TAG: &str = "NopeMD";

const DEFAULT_FILTER: &str = "nmd=info";

static INIT: Once = Once::new();

/// Install the process-wide subscriber. Later calls are no-ops.
pub fn init() {
    INIT.call_once(install);
}

#[cfg(target_os = "android")]
fn install() {
    use tracing_subscriber::prelude::*;
    use tracing_subscriber::EnvFilter;

    let layer = match tracing_android::layer(LOG_TAG) {
        Ok(layer) => layer,
        Err(e) => {
            LogcatSink.log(LogLevel::Error, LOG_TAG, &format!("tracing-android unavailable: {}", e));
            return;
        }
    };
    let _ = tracing_subscriber::registry()
        .with(EnvFilter::new(DEFAULT_FILTER))
        .with(layer)
        .try_init();
}

#[cfg(not(target_os = "android"))]
fn install() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(DEFAULT_FILTER)),
        )
        .try_init();
}

/// Sink for native engine logs
pub fn sink() -> Arc<dyn LogSink> {
    #[cfg(target_os = "android")]
    {
        Arc::new(LogcatSink)
    }
    #[cfg(not(target_os = "android"))]
    {
        Arc::new(nmd_core::TracingSink)
    }
}

#[cfg(target_os = "android")]
mod ffi {
    use std::os::raw::{c_char, c_int};

    #[link(name = "log")]
    extern "C" {
        pub fn __android_log_write(prio: c_int, tag: *const c_char, text: *const c_char) -> c_int;
    }
}

/// Writes straight to logcat under the caller's tag
#[cfg(target_os = "android")]
pub struct LogcatSink;

#[cfg(target_os = "android")]
impl LogSink for LogcatSink {
    fn log(&self, level: LogLevel, tag: &str, message: &str) {
        use std::ffi::CString;

        let (Ok(tag), Ok(text)) = (CString::new(tag), CString::new(message.replace('\0', ""))) else {
            return;
        };
        unsafe {
            ffi::__android_log_write(level.android_priority() as libc::c_int, tag.as_ptr(), text.as_ptr());
        }
    }
}
