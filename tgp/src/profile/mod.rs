//! Profile schema
//!
//! One generic record shape, [`ProfileRecord`], parameterized over the
//! profiling mode selected at startup:
//! - [`GranularityProfile`]: threads, executor, timestamps, self cost
//! - [`CallingContextProfile`]: calling contexts at init/submit/exec

pub mod calling_context;
pub mod granularity;
pub mod record;

use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

pub use calling_context::CallingContextProfile;
pub use granularity::{
    ExecutorInfo, GranularityCreation, GranularityExecution, GranularityProfile,
    GranularitySubmission,
};
pub use record::{ProfileMode, ProfileRecord};

use crate::domain::ConfigError;

/// Runtime selector for the profiling mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum ProfileModeKind {
    #[default]
    Granularity,
    CallingContext,
}

impl ProfileModeKind {
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Granularity => GranularityProfile::NAME,
            Self::CallingContext => CallingContextProfile::NAME,
        }
    }
}

impl fmt::Display for ProfileModeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ProfileModeKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "granularity" | "task" => Ok(Self::Granularity),
            "calling-context" | "cc" => Ok(Self::CallingContext),
            other => Err(ConfigError::UnknownMode(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_kind_parse() {
        assert_eq!("granularity".parse::<ProfileModeKind>().unwrap(), ProfileModeKind::Granularity);
        assert_eq!("CC".parse::<ProfileModeKind>().unwrap(), ProfileModeKind::CallingContext);
        assert!("cycles".parse::<ProfileModeKind>().is_err());
    }

    #[test]
    fn test_mode_kind_display_matches_mode_name() {
        assert_eq!(ProfileModeKind::CallingContext.to_string(), "calling-context");
        assert_eq!(ProfileModeKind::Granularity.to_string(), "granularity");
    }
}
