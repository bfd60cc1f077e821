//! Runtime configuration
//!
//! Defaults, overridden by `TGP_*` environment variables, overridden in turn
//! by command-line flags (see [`crate::cli`]).
//!
//! | Variable                | Field               | Default              |
//! |-------------------------|---------------------|----------------------|
//! | `TGP_PROFILE`           | `enabled`           | `true`               |
//! | `TGP_MODE`              | `mode`              | `granularity`        |
//! | `TGP_OUTPUT`            | `output`            | `profiles/tasks.csv` |
//! | `TGP_COST_EVENT`        | `cost_event`        | `PAPI_REF_CYC`       |
//! | `TGP_CSV_PRINT_HEADER`  | `csv.print_header`  | `true`               |
//! | `TGP_CSV_APPEND`        | `csv.append`        | `false`              |
//! | `TGP_CSV_PREFIX`        | `csv.prefix`        | none                 |
//! | `TGP_CSV_SUFFIX`        | `csv.suffix`        | none                 |
//! | `TGP_CSV_PREFIX_HEADER` | `csv.prefix_header` | none                 |
//! | `TGP_CSV_SUFFIX_HEADER` | `csv.suffix_header` | none                 |

use log::debug;
use serde::Deserialize;
use std::path::PathBuf;

use crate::domain::ConfigError;
use crate::export::CsvOptions;
use crate::profile::ProfileModeKind;

pub const DEFAULT_OUTPUT: &str = "profiles/tasks.csv";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Initial state of the profiling toggle
    pub enabled: bool,
    pub mode: ProfileModeKind,
    pub output: PathBuf,
    pub csv: CsvOptions,
    /// Counter a hardware cost source opens; wall-clock timing only logs it
    pub cost_event: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            enabled: true,
            mode: ProfileModeKind::default(),
            output: PathBuf::from(DEFAULT_OUTPUT),
            csv: CsvOptions::default(),
            cost_event: tgp_common::DEFAULT_COST_EVENT.to_string(),
        }
    }
}

impl Config {
    /// Read configuration from the process environment
    ///
    /// # Errors
    /// Returns [`ConfigError`] if a variable holds an invalid value.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read configuration through `lookup`, which maps a variable name to
    /// its value
    ///
    /// # Errors
    /// Returns [`ConfigError`] if a variable holds an invalid value.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(enabled) = parse_bool(&lookup, "TGP_PROFILE")? {
            config.enabled = enabled;
        }
        if let Some(mode) = lookup("TGP_MODE") {
            config.mode = mode.parse()?;
        }
        if let Some(output) = lookup("TGP_OUTPUT") {
            if output.trim().is_empty() {
                return Err(ConfigError::EmptyPath("TGP_OUTPUT".to_string()));
            }
            config.output = PathBuf::from(output);
        }
        if let Some(event) = lookup("TGP_COST_EVENT") {
            config.cost_event = event;
        }

        if let Some(print_header) = parse_bool(&lookup, "TGP_CSV_PRINT_HEADER")? {
            config.csv.print_header = print_header;
        }
        if let Some(append) = parse_bool(&lookup, "TGP_CSV_APPEND")? {
            config.csv.append = append;
        }
        config.csv.prefix = lookup("TGP_CSV_PREFIX").or(config.csv.prefix);
        config.csv.suffix = lookup("TGP_CSV_SUFFIX").or(config.csv.suffix);
        config.csv.prefix_header = lookup("TGP_CSV_PREFIX_HEADER").or(config.csv.prefix_header);
        config.csv.suffix_header = lookup("TGP_CSV_SUFFIX_HEADER").or(config.csv.suffix_header);

        debug!("Loaded configuration: {config:?}");
        Ok(config)
    }
}

fn parse_bool(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
) -> Result<Option<bool>, ConfigError> {
    let Some(value) = lookup(key) else {
        return Ok(None);
    };
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(Some(true)),
        "false" | "0" | "no" | "off" => Ok(Some(false)),
        _ => Err(ConfigError::InvalidBool { key: key.to_string(), value }),
    }
}
