//! # NMD Core
//!
//! Benchmark harness for the NopeMD decode engine: sessions, scenario
//! drivers, timing and reports. The engine itself is loaded at runtime
//! and never linked.

// ============================================================================
// Engine Seam
// ============================================================================
pub mod engine;
pub mod ffi;
pub mod logging;

// ============================================================================
// Sessions
// ============================================================================
pub mod session;
pub mod release;

// ============================================================================
// Measurement
// ============================================================================
pub mod timing;
pub mod report;

// ============================================================================
// Scenarios
// ============================================================================
pub mod fixtures;
pub mod scenario;
pub mod config;

#[cfg(test)]
pub(crate) mod testing;

pub use config::{ConfigError, RunConfig, ScenarioKind};
pub use engine::{Engine, EngineError, EngineFrame, EngineInstance, EngineOption, PixelFormat, StreamSelect};
pub use ffi::{AvHooks, FfiEngine};
pub use fixtures::ReplayFixture;
pub use logging::{LogLevel, LogSink, TracingSink};
pub use report::{ReportError, RunMetadata, RunReport};
pub use scenario::{
    AudioOutcome, ConcurrentOutcome, ConcurrentParams, Harness, HarnessError, LinearOutcome,
    LinearParams, SeekSweepOutcome, SeekSweepParams,
};
pub use session::{NoSurface, Session, SessionConfig, SurfaceBinding};

// ============================================================================
// Version
// ============================================================================
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
