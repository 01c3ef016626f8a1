//! Resource profiles: bundled default sets for the tunable settings.

use serde::{Deserialize, Serialize};

use crate::errors::{GardenResult, MemoGardenError};

/// Log verbosity, lowest to highest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogLevel {
    Error,
    Warning,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warning => "warning",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

impl std::str::FromStr for LogLevel {
    type Err = MemoGardenError;

    fn from_str(s: &str) -> GardenResult<Self> {
        match s {
            "error" => Ok(LogLevel::Error),
            "warning" | "warn" => Ok(LogLevel::Warning),
            "info" => Ok(LogLevel::Info),
            "debug" => Ok(LogLevel::Debug),
            "trace" => Ok(LogLevel::Trace),
            other => Err(MemoGardenError::validation(format!(
                "unknown log level '{other}'"
            ))),
        }
    }
}

/// Named default set for the tunable settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceProfile {
    /// Personal embedded store; conservative limits, quiet logs.
    #[default]
    Embedded,
    /// Standing service; larger working sets, faster checkpoints.
    Standard,
}

/// The values a profile contributes to settings resolution.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProfileDefaults {
    pub view_entries: usize,
    pub search_limit: usize,
    pub fossilization_threshold: f64,
    pub checkpoint_interval_secs: u64,
    pub log_level: LogLevel,
}

impl ResourceProfile {
    pub fn defaults(self) -> ProfileDefaults {
        match self {
            ResourceProfile::Embedded => ProfileDefaults {
                view_entries: 100,
                search_limit: 20,
                fossilization_threshold: 0.80,
                checkpoint_interval_secs: 300,
                log_level: LogLevel::Warning,
            },
            ResourceProfile::Standard => ProfileDefaults {
                view_entries: 1000,
                search_limit: 100,
                fossilization_threshold: 0.90,
                checkpoint_interval_secs: 60,
                log_level: LogLevel::Info,
            },
        }
    }
}

impl std::str::FromStr for ResourceProfile {
    type Err = MemoGardenError;

    fn from_str(s: &str) -> GardenResult<Self> {
        match s {
            "embedded" => Ok(ResourceProfile::Embedded),
            "standard" => Ok(ResourceProfile::Standard),
            other => Err(MemoGardenError::validation(format!(
                "unknown resource profile '{other}'"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embedded_profile_values() {
        let d = ResourceProfile::Embedded.defaults();
        assert_eq!(d.view_entries, 100);
        assert_eq!(d.search_limit, 20);
        assert_eq!(d.fossilization_threshold, 0.80);
        assert_eq!(d.checkpoint_interval_secs, 300);
        assert_eq!(d.log_level, LogLevel::Warning);
    }

    #[test]
    fn standard_profile_values() {
        let d = ResourceProfile::Standard.defaults();
        assert_eq!(d.view_entries, 1000);
        assert_eq!(d.search_limit, 100);
        assert_eq!(d.fossilization_threshold, 0.90);
        assert_eq!(d.checkpoint_interval_secs, 60);
        assert_eq!(d.log_level, LogLevel::Info);
    }

    #[test]
    fn unknown_profile_is_a_validation_error() {
        let err = "turbo".parse::<ResourceProfile>().unwrap_err();
        assert!(matches!(err, MemoGardenError::Validation { .. }));
    }
}
