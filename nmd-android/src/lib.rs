//! # NopeMD Android
//!
//! JNI entry points behind `org.nopeforge.nmd_android.NopeMD`. Each one
//! runs a single benchmark scenario to completion on the calling thread.
//!
//! Entry points never return an error to Java: failures are logged and the
//! call returns. Every global reference taken is released before returning,
//! on success and failure alike.

pub mod logging;
pub mod surface;

use std::ffi::c_void;
use std::path::Path;
use std::sync::OnceLock;

use anyhow::{anyhow, Result};
use jni::objects::{JClass, JObject, JObjectArray, JString};
use jni::sys::{jint, JNI_VERSION_1_6};
use jni::JNIEnv;

use nmd_core::report;
use nmd_core::{
    AvHooks, ConcurrentParams, FfiEngine, Harness, LinearParams, RunMetadata, SeekSweepParams,
    SessionConfig,
};

use crate::surface::AndroidSurface;

// ============================================================================
// Process State
// ============================================================================

static ENGINE: OnceLock<Option<FfiEngine>> = OnceLock::new();
static AV_HOOKS: OnceLock<AvHooks> = OnceLock::new();

fn harness() -> Result<Harness<FfiEngine>> {
    let engine = ENGINE.get_or_init(|| match FfiEngine::load_default() {
        Ok(engine) => Some(engine),
        Err(e) => {
            tracing::error!("{}", e);
            None
        }
    });
    let engine = engine
        .clone()
        .ok_or_else(|| anyhow!("NopeMD engine unavailable"))?;
    Ok(Harness::with_sink(engine, logging::sink()))
}

fn java_string(env: &mut JNIEnv, value: &JString) -> Result<String> {
    env.get_string(value)
        .map(|s| s.into())
        .map_err(|e| anyhow!("Failed to read Java string: {}", e))
}

fn count(value: jint, what: &str) -> Result<usize> {
    usize::try_from(value).map_err(|_| anyhow!("Invalid {}: {}", what, value))
}

fn report_outcome(entry: &str, result: Result<()>) {
    match result {
        Ok(()) => tracing::info!("{}: done", entry),
        Err(e) => tracing::error!("{}: {:#}", entry, e),
    }
}

/// Persist `report`; a failure is logged and does not fail the run
fn write_report(report: report::RunReport, path: &str) {
    tracing::info!("Writing: {}to {}", report.as_str(), path);
    if let Err(e) = report.persist(Path::new(path)) {
        tracing::error!("{}", e);
    }
}

// ============================================================================
// Library Load
// ============================================================================

/// Installs logging and hands the VM and a log sink to FFmpeg when it is
/// bundled as shared libraries.
#[no_mangle]
pub extern "system" fn JNI_OnLoad(vm: *mut jni::sys::JavaVM, _reserved: *mut c_void) -> jint {
    logging::init();
    tracing::info!("{} v{} loaded", logging::LOG_TAG, nmd_core::VERSION);

    let hooks = AV_HOOKS.get_or_init(AvHooks::load);
    if unsafe { hooks.set_java_vm(vm as *mut c_void) } {
        tracing::debug!("Java VM handed to FFmpeg");
    }
    if hooks.route_logs(logging::sink()) {
        tracing::debug!("FFmpeg logs routed to logcat");
    }

    JNI_VERSION_1_6
}

// ============================================================================
// Entry Points
// ============================================================================

#[no_mangle]
pub extern "system" fn Java_org_nopeforge_nmd_1android_NopeMD_nativeDecodeAllFramesToSurface(
    mut env: JNIEnv,
    _class: JClass,
    filename: JString,
    live: jint,
    surface: JObject,
) {
    let result = (|| -> Result<()> {
        let surface = AndroidSurface::acquire(&mut env, &surface)?;
        let filename = java_string(&mut env, &filename)?;
        let params = LinearParams::from_live_flag(live != 0);

        harness()?.linear(&filename, &SessionConfig::playback(), surface, &params)?;
        Ok(())
    })();
    report_outcome("nativeDecodeAllFramesToSurface", result);
}

#[no_mangle]
pub extern "system" fn Java_org_nopeforge_nmd_1android_NopeMD_nativeMultipleDecodesToSurfaces(
    mut env: JNIEnv,
    _class: JClass,
    model: JString,
    filename: JString,
    surfaces: JObjectArray,
    nb_surfaces: jint,
    nb_frames: jint,
    output_path: JString,
) {
    let result = (|| -> Result<()> {
        let model = java_string(&mut env, &model)?;
        let filename = java_string(&mut env, &filename)?;
        let output_path = java_string(&mut env, &output_path)?;
        let nb_surfaces = count(nb_surfaces, "surface count")?;
        let params = ConcurrentParams::with_budget(count(nb_frames, "frame count")?);

        let surfaces = AndroidSurface::acquire_all(&mut env, &surfaces, nb_surfaces)?;
        let outcome = harness()?.concurrent(&filename, &SessionConfig::concurrent(), surfaces, &params)?;

        let meta = RunMetadata::new(model, filename);
        write_report(report::decode_report(&meta, &outcome), &output_path);
        Ok(())
    })();
    report_outcome("nativeMultipleDecodesToSurfaces", result);
}

#[no_mangle]
pub extern "system" fn Java_org_nopeforge_nmd_1android_NopeMD_nativeSeekAndDecodeToSurfaces(
    mut env: JNIEnv,
    _class: JClass,
    model: JString,
    filename: JString,
    surface: JObject,
    output_path: JString,
) {
    let result = (|| -> Result<()> {
        let model = java_string(&mut env, &model)?;
        let filename = java_string(&mut env, &filename)?;
        let surface = AndroidSurface::acquire(&mut env, &surface)?;
        let output_path = java_string(&mut env, &output_path)?;

        let outcome = harness()?.seek_sweep(
            &filename,
            &SessionConfig::playback(),
            surface,
            &SeekSweepParams::default(),
        )?;

        let meta = RunMetadata::new(model, filename);
        write_report(report::seek_report(&meta, &outcome), &output_path);
        Ok(())
    })();
    report_outcome("nativeSeekAndDecodeToSurfaces", result);
}

#[no_mangle]
pub extern "system" fn Java_org_nopeforge_nmd_1android_NopeMD_nativeRandomSeekAndDecodeToSurface(
    mut env: JNIEnv,
    _class: JClass,
    filename: JString,
    surface: JObject,
) {
    let result = (|| -> Result<()> {
        let surface = AndroidSurface::acquire(&mut env, &surface)?;
        let filename = java_string(&mut env, &filename)?;

        harness()?.linear(
            &filename,
            &SessionConfig::software_rgba(),
            surface,
            &LinearParams::random_seek(),
        )?;
        Ok(())
    })();
    report_outcome("nativeRandomSeekAndDecodeToSurface", result);
}

#[no_mangle]
pub extern "system" fn Java_org_nopeforge_nmd_1android_NopeMD_nativeAudioDecode(
    mut env: JNIEnv,
    _class: JClass,
    filename: JString,
) {
    let result = (|| -> Result<()> {
        let filename = java_string(&mut env, &filename)?;
        harness()?.audio(&filename, &SessionConfig::audio())?;
        Ok(())
    })();
    report_outcome("nativeAudioDecode", result);
}
