//! Runtime configuration.
//!
//! Values come from the environment (a `.env` file is loaded first when
//! present); command-line flags override them in `app`.
//!
//! | variable          | default  |
//! |-------------------|----------|
//! | `SED_DATA_DIR`    | `./data` |
//! | `SED_PLOT_WIDTH`  | 72       |
//! | `SED_PLOT_HEIGHT` | 20       |

use std::path::PathBuf;

use crate::error::SedError;
use crate::render::{DEFAULT_HEIGHT, DEFAULT_WIDTH};

pub const DATA_DIR_VAR: &str = "SED_DATA_DIR";
pub const PLOT_WIDTH_VAR: &str = "SED_PLOT_WIDTH";
pub const PLOT_HEIGHT_VAR: &str = "SED_PLOT_HEIGHT";

const DEFAULT_DATA_DIR: &str = "./data";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub data_dir: PathBuf,
    pub plot_width: usize,
    pub plot_height: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            plot_width: DEFAULT_WIDTH,
            plot_height: DEFAULT_HEIGHT,
        }
    }
}

impl Config {
    /// Load `.env` (if any) and read the process environment.
    pub fn from_env() -> Result<Self, SedError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, SedError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        if let Some(dir) = lookup(DATA_DIR_VAR).filter(|s| !s.trim().is_empty()) {
            config.data_dir = PathBuf::from(dir.trim());
        }
        if let Some(w) = lookup(PLOT_WIDTH_VAR) {
            config.plot_width = parse_dimension(PLOT_WIDTH_VAR, &w)?;
        }
        if let Some(h) = lookup(PLOT_HEIGHT_VAR) {
            config.plot_height = parse_dimension(PLOT_HEIGHT_VAR, &h)?;
        }
        Ok(config)
    }
}

fn parse_dimension(var: &str, raw: &str) -> Result<usize, SedError> {
    match raw.trim().parse::<usize>() {
        Ok(v) if v > 0 => Ok(v),
        _ => Err(SedError::Config(format!("{var} must be a positive integer, got '{raw}'"))),
    }
}
