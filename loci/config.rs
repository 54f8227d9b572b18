//! Segmentation parameters.
//!
//! Defaults match the values the GATK locus-statistics workflow has always used.
//! A TOML file can override any subset of them, and command-line flags override the
//! file.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

/// Distance in basepairs tolerated past the mean locus length before a site is
/// considered part of a different locus.
pub const MERGE_DISTANCE: u64 = 80;

pub const DEFAULT_MIN_DEPTH: u32 = 6;
pub const DEFAULT_MEAN_LOCUS_LENGTH: u64 = 270;
pub const DEFAULT_MIN_SAMPLES: u32 = 4;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse TOML config file: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SegmentConfig {
    /// Minimum read depth for a site (or a sample at a site) to count.
    pub min_depth: u32,
    /// Expected RAD locus length in basepairs.
    pub mean_locus_length: u64,
    /// Minimum number of supporting samples for an across-sample locus.
    pub min_samples: u32,
    /// Finalize the locus still open when the table ends.
    pub flush_final: bool,
}

impl Default for SegmentConfig {
    fn default() -> Self {
        Self {
            min_depth: DEFAULT_MIN_DEPTH,
            mean_locus_length: DEFAULT_MEAN_LOCUS_LENGTH,
            min_samples: DEFAULT_MIN_SAMPLES,
            flush_final: false,
        }
    }
}

impl SegmentConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Largest start-to-site distance that still joins the active locus.
    pub fn merge_window(&self) -> u64 {
        self.mean_locus_length.saturating_add(MERGE_DISTANCE)
    }

    pub fn validate_within_sample(&self) -> Result<(), ConfigError> {
        if self.mean_locus_length == 0 {
            return Err(ConfigError::Invalid(
                "mean_locus_length must be greater than zero".into(),
            ));
        }
        Ok(())
    }

    pub fn validate_across_sample(&self) -> Result<(), ConfigError> {
        self.validate_within_sample()?;
        if self.min_samples == 0 {
            return Err(ConfigError::Invalid(
                "min_samples must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}
