//! Leveled log sink shared by the engine adapter and the platform glue.
//!
//! Engine and FFmpeg levels map onto the five sink levels. The mapping is
//! total: anything unknown is reported as an error.

use serde::{Deserialize, Serialize};

use crate::ffi::{
    AV_LOG_DEBUG, AV_LOG_ERROR, AV_LOG_INFO, AV_LOG_TRACE, AV_LOG_VERBOSE, AV_LOG_WARNING,
    NMD_LOG_DEBUG, NMD_LOG_ERROR, NMD_LOG_INFO, NMD_LOG_VERBOSE, NMD_LOG_WARNING,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum LogLevel {
    Verbose,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    /// Map a libnopemd log level
    pub fn from_engine(level: i32) -> Self {
        match level {
            NMD_LOG_VERBOSE => Self::Verbose,
            NMD_LOG_DEBUG => Self::Debug,
            NMD_LOG_INFO => Self::Info,
            NMD_LOG_WARNING => Self::Warn,
            NMD_LOG_ERROR => Self::Error,
            _ => Self::Error,
        }
    }

    /// Map an FFmpeg `av_log` level
    pub fn from_av(level: i32) -> Self {
        match level {
            AV_LOG_TRACE | AV_LOG_VERBOSE => Self::Verbose,
            AV_LOG_DEBUG => Self::Debug,
            AV_LOG_INFO => Self::Info,
            AV_LOG_WARNING => Self::Warn,
            AV_LOG_ERROR => Self::Error,
            _ => Self::Error,
        }
    }

    /// `android_LogPriority` value for this level
    pub fn android_priority(&self) -> i32 {
        match self {
            Self::Verbose => 2,
            Self::Debug => 3,
            Self::Info => 4,
            Self::Warn => 5,
            Self::Error => 6,
        }
    }
}

/// Receives leveled messages from native code
pub trait LogSink: Send + Sync {
    fn log(&self, level: LogLevel, tag: &str, message: &str);
}

/// Re-emits sink messages as `tracing` events under the `nmd` target.
/// Whatever subscriber the process installed decides where they land.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl LogSink for TracingSink {
    fn log(&self, level: LogLevel, tag: &str, message: &str) {
        match level {
            LogLevel::Verbose => tracing::trace!(target: "nmd", tag, "{}", message),
            LogLevel::Debug => tracing::debug!(target: "nmd", tag, "{}", message),
            LogLevel::Info => tracing::info!(target: "nmd", tag, "{}", message),
            LogLevel::Warn => tracing::warn!(target: "nmd", tag, "{}", message),
            LogLevel::Error => tracing::error!(target: "nmd", tag, "{}", message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_level_mapping() {
        assert_eq!(LogLevel::from_engine(NMD_LOG_VERBOSE), LogLevel::Verbose);
        assert_eq!(LogLevel::from_engine(NMD_LOG_DEBUG), LogLevel::Debug);
        assert_eq!(LogLevel::from_engine(NMD_LOG_INFO), LogLevel::Info);
        assert_eq!(LogLevel::from_engine(NMD_LOG_WARNING), LogLevel::Warn);
        assert_eq!(LogLevel::from_engine(NMD_LOG_ERROR), LogLevel::Error);
        assert_eq!(LogLevel::from_engine(17), LogLevel::Error);
        assert_eq!(LogLevel::from_engine(-1), LogLevel::Error);
    }

    #[test]
    fn test_av_level_mapping() {
        assert_eq!(LogLevel::from_av(AV_LOG_TRACE), LogLevel::Verbose);
        assert_eq!(LogLevel::from_av(AV_LOG_VERBOSE), LogLevel::Verbose);
        assert_eq!(LogLevel::from_av(AV_LOG_DEBUG), LogLevel::Debug);
        assert_eq!(LogLevel::from_av(AV_LOG_INFO), LogLevel::Info);
        assert_eq!(LogLevel::from_av(AV_LOG_WARNING), LogLevel::Warn);
        assert_eq!(LogLevel::from_av(AV_LOG_ERROR), LogLevel::Error);
        // AV_LOG_FATAL / AV_LOG_PANIC are not in the table
        assert_eq!(LogLevel::from_av(8), LogLevel::Error);
        assert_eq!(LogLevel::from_av(0), LogLevel::Error);
    }

    #[test]
    fn test_android_priorities_are_ordered() {
        let levels = [
            LogLevel::Verbose,
            LogLevel::Debug,
            LogLevel::Info,
            LogLevel::Warn,
            LogLevel::Error,
        ];
        for pair in levels.windows(2) {
            assert!(pair[0].android_priority() < pair[1].android_priority());
        }
        assert_eq!(LogLevel::Error.android_priority(), 6);
    }
}
