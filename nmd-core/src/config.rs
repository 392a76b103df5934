//! Run configuration.
//!
//! A run is one scenario against one source. It can be described entirely
//! in JSON; every field except `source` has a default:
//!
//! ```json
//! {
//!     "scenario": "concurrent",
//!     "source": "/data/bbb_1080p.mp4",
//!     "model": "bench-host",
//!     "sessions": 4,
//!     "concurrent": { "budget": 1000 }
//! }
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::fixtures::ReplayFixture;
use crate::report::RunMetadata;
use crate::scenario::{ConcurrentParams, LinearParams, SeekSweepParams};
use crate::session::SessionConfig;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid run config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Invalid run config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScenarioKind {
    /// Decode to end of stream, then replay
    #[default]
    Linear,
    /// Decode up to the live frame cap, no replay
    Live,
    /// Software RGBA decode up to the frame cap, then replay
    RandomSeek,
    SeekSweep,
    Concurrent,
    Audio,
}

impl ScenarioKind {
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "linear" => Some(Self::Linear),
            "live" => Some(Self::Live),
            "random-seek" | "random_seek" => Some(Self::RandomSeek),
            "seek-sweep" | "seek_sweep" | "seek" => Some(Self::SeekSweep),
            "concurrent" | "multi" => Some(Self::Concurrent),
            "audio" => Some(Self::Audio),
            _ => None,
        }
    }

    /// Whether the scenario produces a report file
    pub fn writes_report(&self) -> bool {
        matches!(self, Self::SeekSweep | Self::Concurrent)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub scenario: ScenarioKind,
    pub source: String,
    /// Device or host identifier written into reports
    pub model: String,
    /// Concurrent sessions, ignored by single-session scenarios
    pub sessions: usize,
    /// Explicit report path. Derived from model and source when unset.
    pub output: Option<PathBuf>,
    pub output_dir: PathBuf,
    /// Replaces the scenario's session preset
    pub session: Option<SessionConfig>,
    pub fixture: ReplayFixture,
    pub seek_sweep: SeekSweepParams,
    pub concurrent: ConcurrentParams,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            scenario: ScenarioKind::default(),
            source: String::new(),
            model: String::from("desktop"),
            sessions: 1,
            output: None,
            output_dir: PathBuf::from("."),
            session: None,
            fixture: ReplayFixture::default(),
            seek_sweep: SeekSweepParams::default(),
            concurrent: ConcurrentParams::default(),
        }
    }
}

impl RunConfig {
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&text)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.source.is_empty() {
            return Err(ConfigError::Invalid("no source given".into()));
        }
        if self.scenario == ScenarioKind::Concurrent && self.sessions == 0 {
            return Err(ConfigError::Invalid("concurrent run needs at least one session".into()));
        }
        Ok(())
    }

    pub fn session_config(&self) -> SessionConfig {
        if let Some(config) = &self.session {
            return config.clone();
        }
        match self.scenario {
            ScenarioKind::Linear | ScenarioKind::Live | ScenarioKind::SeekSweep => {
                SessionConfig::playback()
            }
            ScenarioKind::RandomSeek => SessionConfig::software_rgba(),
            ScenarioKind::Concurrent => SessionConfig::concurrent(),
            ScenarioKind::Audio => SessionConfig::audio(),
        }
    }

    /// Parameters for the linear-driver scenarios
    pub fn linear_params(&self) -> Option<LinearParams> {
        let params = match self.scenario {
            ScenarioKind::Linear => LinearParams::default(),
            ScenarioKind::Live => LinearParams::live(),
            ScenarioKind::RandomSeek => LinearParams::random_seek(),
            _ => return None,
        };
        Some(LinearParams {
            fixture: self.fixture.clone(),
            ..params
        })
    }

    pub fn metadata(&self) -> RunMetadata {
        RunMetadata::new(self.model.clone(), self.source.clone())
    }

    /// Where the report goes, for scenarios that write one
    pub fn report_path(&self) -> Option<PathBuf> {
        if !self.scenario.writes_report() {
            return None;
        }
        if let Some(path) = &self.output {
            return Some(path.clone());
        }
        let meta = self.metadata();
        let name = match self.scenario {
            ScenarioKind::Concurrent => meta.decode_report_name(self.sessions),
            _ => meta.seek_report_name(),
        };
        Some(self.output_dir.join(name))
    }
}
