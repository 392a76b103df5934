//! # Run Reports
//!
//! A run's results are assembled into one JSON document and written once.
//! The layout is a fixed template (three-space field indent, one list
//! element per line, six-digit floats) so reports from different devices
//! diff cleanly.
//!
//! ## Decode report
//! `model`, `filename`, `nb_decoders`, `nb_active_decoders`, `nb_frames`,
//! `fps`, `decode_times`
//!
//! ## Seek report
//! `model`, `filename`, `nb_frames`, `avg_seek_time`, `seek_times`
//!
//! `avg_seek_time` is `null` when no seek produced a frame.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::scenario::concurrent::ConcurrentOutcome;
use crate::scenario::seek_sweep::SeekSweepOutcome;

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("Failed to write report to {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Identifies the device and media a run was made with
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunMetadata {
    pub model: String,
    pub filename: String,
}

impl RunMetadata {
    pub fn new(model: impl Into<String>, filename: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            filename: filename.into(),
        }
    }

    /// Last path component of the source, extension included
    pub fn basename(&self) -> &str {
        self.filename.rsplit('/').next().unwrap_or(&self.filename)
    }

    /// `<model>-<basename>-decode-<sessions>.json`
    pub fn decode_report_name(&self, sessions: usize) -> String {
        format!("{}-{}-decode-{}.json", self.model, self.basename(), sessions)
    }

    /// `<model>-<basename>-seek.json`
    pub fn seek_report_name(&self) -> String {
        format!("{}-{}-seek.json", self.model, self.basename())
    }
}

// ============================================================================
// Builder
// ============================================================================

const FIELD_INDENT: &str = "   ";
const ELEMENT_INDENT: &str = "       ";

/// Append-only report assembly. Fields are emitted in call order.
#[derive(Debug)]
pub struct ReportBuilder {
    text: String,
    fields: usize,
}

impl Default for ReportBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ReportBuilder {
    pub fn new() -> Self {
        Self {
            text: String::from("{\n"),
            fields: 0,
        }
    }

    fn key(&mut self, key: &str) {
        if self.fields > 0 {
            self.text.push_str(",\n");
        }
        self.fields += 1;
        let _ = write!(self.text, "{}{}: ", FIELD_INDENT, quote(key));
    }

    pub fn string(mut self, key: &str, value: &str) -> Self {
        self.key(key);
        self.text.push_str(&quote(value));
        self
    }

    pub fn integer(mut self, key: &str, value: u64) -> Self {
        self.key(key);
        let _ = write!(self.text, "{}", value);
        self
    }

    pub fn number(mut self, key: &str, value: f64) -> Self {
        self.key(key);
        self.text.push_str(&number(value));
        self
    }

    /// `null` for `None`
    pub fn optional_number(mut self, key: &str, value: Option<f64>) -> Self {
        self.key(key);
        match value {
            Some(v) => self.text.push_str(&number(v)),
            None => self.text.push_str("null"),
        }
        self
    }

    pub fn numbers(mut self, key: &str, values: &[f64]) -> Self {
        self.key(key);
        self.text.push_str("[\n");
        for (i, v) in values.iter().enumerate() {
            let sep = if i + 1 < values.len() { "," } else { "" };
            let _ = writeln!(self.text, "{}{}{}", ELEMENT_INDENT, number(*v), sep);
        }
        self.text.push_str(FIELD_INDENT);
        self.text.push(']');
        self
    }

    pub fn finish(mut self) -> RunReport {
        self.text.push_str("\n}\n");
        RunReport { text: self.text }
    }
}

fn quote(s: &str) -> String {
    // Serializing a str cannot fail
    serde_json::to_string(s).unwrap_or_else(|_| String::from("\"\""))
}

fn number(v: f64) -> String {
    if v.is_finite() {
        format!("{:.6}", v)
    } else {
        String::from("null")
    }
}

// ============================================================================
// Report
// ============================================================================

/// A finished report. Immutable; consumed by `persist`.
#[derive(Debug, Clone, PartialEq)]
pub struct RunReport {
    text: String,
}

impl RunReport {
    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Write the report, replacing any existing file. The parent directory
    /// must already exist.
    pub fn persist(self, path: &Path) -> Result<(), ReportError> {
        std::fs::write(path, self.text.as_bytes()).map_err(|source| ReportError::Write {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::info!("Report written to {}", path.display());
        Ok(())
    }
}

/// Multi-session decode report
pub fn decode_report(meta: &RunMetadata, outcome: &ConcurrentOutcome) -> RunReport {
    let nb_frames = outcome.frame_count;
    let listed = (nb_frames as usize).min(outcome.tick_durations.len());

    ReportBuilder::new()
        .string("model", &meta.model)
        .string("filename", &meta.filename)
        .integer("nb_decoders", outcome.sessions.len() as u64)
        .integer("nb_active_decoders", outcome.active_sessions as u64)
        .integer("nb_frames", nb_frames)
        .number("fps", outcome.fps())
        .numbers("decode_times", &outcome.tick_durations[..listed])
        .finish()
}

/// Seek sweep report
pub fn seek_report(meta: &RunMetadata, outcome: &SeekSweepOutcome) -> RunReport {
    ReportBuilder::new()
        .string("model", &meta.model)
        .string("filename", &meta.filename)
        .integer("nb_frames", outcome.successes as u64)
        .optional_number("avg_seek_time", outcome.average)
        .numbers("seek_times", &outcome.seek_times)
        .finish()
}
