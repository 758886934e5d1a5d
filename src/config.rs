//! Configuration loading and management
//!
//! Everything comes from environment variables, with defaults matching the
//! glove firmware's usual output range.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};

use crate::chord::{ApplyDelay, FINGER_COUNT};
use crate::glove::{GloveSettings, Sensitivity};

/// Socket path override
pub const SOCKET_VAR: &str = "CHORD_GLOVE_SOCKET";
/// Chord disambiguation window in milliseconds
pub const APPLY_DELAY_VAR: &str = "CHORD_GLOVE_APPLY_DELAY_MS";
/// One threshold for all fingers, or five comma-separated thresholds
pub const SENSITIVITY_VAR: &str = "CHORD_GLOVE_SENSITIVITY";
/// Moving-mean window size, 0 disables smoothing
pub const AGGREGATION_VAR: &str = "CHORD_GLOVE_AGGREGATION";

const DEFAULT_AGGREGATION_WINDOW: usize = 10;

/// Daemon configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Path to the Unix domain socket for IPC
    pub socket_path: PathBuf,

    /// Directory for runtime data
    pub data_dir: PathBuf,

    /// Initial chord disambiguation window
    pub apply_delay: ApplyDelay,

    /// Flex thresholding for the glove listener
    pub glove: GloveSettings,
}

impl Config {
    /// Load configuration from environment and defaults
    pub fn load() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from any variable source
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let home = lookup("HOME").context("HOME is not set")?;
        let data_dir = PathBuf::from(&home)
            .join(".local")
            .join("share")
            .join("chord-glove");

        let socket_path = lookup(SOCKET_VAR)
            .map(PathBuf::from)
            .unwrap_or_else(|| data_dir.join("daemon.sock"));

        let apply_delay = match lookup(APPLY_DELAY_VAR) {
            Some(raw) => parse_apply_delay(&raw)
                .with_context(|| format!("invalid {APPLY_DELAY_VAR}"))?,
            None => ApplyDelay::default(),
        };

        let sensitivity = match lookup(SENSITIVITY_VAR) {
            Some(raw) => {
                parse_sensitivity(&raw).with_context(|| format!("invalid {SENSITIVITY_VAR}"))?
            }
            None => Sensitivity::default(),
        };

        let aggregation_window = match lookup(AGGREGATION_VAR) {
            Some(raw) => raw
                .trim()
                .parse()
                .with_context(|| format!("invalid {AGGREGATION_VAR}: {raw:?}"))?,
            None => DEFAULT_AGGREGATION_WINDOW,
        };

        Ok(Self {
            socket_path,
            data_dir,
            apply_delay,
            glove: GloveSettings {
                sensitivity,
                aggregation_window,
            },
        })
    }

    /// Ensure data directory exists
    pub fn ensure_dirs(&self) -> Result<()> {
        std::fs::create_dir_all(&self.data_dir)
            .with_context(|| format!("failed to create {}", self.data_dir.display()))?;
        Ok(())
    }
}

fn parse_apply_delay(raw: &str) -> Result<ApplyDelay> {
    let millis: u64 = raw
        .trim()
        .parse()
        .with_context(|| format!("not a number of milliseconds: {raw:?}"))?;
    Ok(ApplyDelay::from_millis(millis)?)
}

fn parse_sensitivity(raw: &str) -> Result<Sensitivity> {
    let values = raw
        .split(',')
        .map(|field| {
            field
                .trim()
                .parse::<u16>()
                .with_context(|| format!("not a threshold: {field:?}"))
        })
        .collect::<Result<Vec<_>>>()?;

    match values.as_slice() {
        [uniform] => Ok(Sensitivity::uniform(*uniform)),
        _ => match <[u16; FINGER_COUNT]>::try_from(values.as_slice()) {
            Ok(thresholds) => Ok(Sensitivity::new(thresholds)),
            Err(_) => bail!("expected 1 or {FINGER_COUNT} thresholds, got {}", values.len()),
        },
    }
}
