use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};
use crate::outputs::{OutputFormat, DEFAULT_MISSING_MARKER};
use crate::pipelines::{Cadence, OutputEpoch, PipelineOptions};
use crate::sentinel::SentinelPolicy;

pub const ENV_CADENCE: &str = "SEALEVEL_CADENCE";
pub const ENV_EPOCH: &str = "SEALEVEL_EPOCH";
pub const ENV_LATITUDE: &str = "SEALEVEL_LATITUDE";
pub const ENV_MIN_HOURS_PER_DAY: &str = "SEALEVEL_MIN_HOURS_PER_DAY";
pub const ENV_SENTINEL_MIN_DIGITS: &str = "SEALEVEL_SENTINEL_MIN_DIGITS";
pub const ENV_SENTINEL_MAX_DIGITS: &str = "SEALEVEL_SENTINEL_MAX_DIGITS";
pub const ENV_MISSING_MARKER: &str = "SEALEVEL_MISSING_MARKER";
pub const ENV_SCRATCH_DIR: &str = "SEALEVEL_SCRATCH_DIR";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineSection {
    pub cadence: Cadence,
    pub epoch: OutputEpoch,
    pub latitude: f64,
    pub min_hours_per_day: usize,
}

impl Default for PipelineSection {
    fn default() -> Self {
        let options = PipelineOptions::default();
        Self {
            cadence: options.cadence,
            epoch: options.epoch,
            latitude: options.latitude,
            min_hours_per_day: options.min_hours_per_day,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SentinelSection {
    pub min_digits: u32,
    pub max_digits: u32,
}

impl Default for SentinelSection {
    fn default() -> Self {
        let policy = SentinelPolicy::default();
        Self {
            min_digits: policy.min_digits,
            max_digits: policy.max_digits,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputSection {
    pub missing_marker: String,
    /// Directory for in-flight artifacts; defaults to the destination's directory.
    pub scratch_dir: Option<PathBuf>,
}

impl Default for OutputSection {
    fn default() -> Self {
        Self {
            missing_marker: DEFAULT_MISSING_MARKER.to_string(),
            scratch_dir: None,
        }
    }
}

/// Layered settings: defaults, then an optional TOML file, then `SEALEVEL_*`
/// environment variables. Command-line flags are applied by the caller last.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub pipeline: PipelineSection,
    pub sentinel: SentinelSection,
    pub output: OutputSection,
}

impl PipelineConfig {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|err| PipelineError::Config(err.to_string()))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|err| {
            PipelineError::Config(format!("failed to read {}: {err}", path.display()))
        })?;
        Self::from_toml_str(&content)
    }

    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_env_from(|key| std::env::var(key).ok())
    }

    /// Applies overrides from `lookup`, which maps a variable name to its value.
    pub fn apply_env_from<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup(ENV_CADENCE) {
            self.pipeline.cadence = value
                .parse()
                .map_err(|err| env_error(ENV_CADENCE, err))?;
        }
        if let Some(value) = lookup(ENV_EPOCH) {
            self.pipeline.epoch = value.parse().map_err(|err| env_error(ENV_EPOCH, err))?;
        }
        if let Some(value) = lookup(ENV_LATITUDE) {
            self.pipeline.latitude = value
                .trim()
                .parse()
                .map_err(|err| env_error(ENV_LATITUDE, err))?;
        }
        if let Some(value) = lookup(ENV_MIN_HOURS_PER_DAY) {
            self.pipeline.min_hours_per_day = value
                .trim()
                .parse()
                .map_err(|err| env_error(ENV_MIN_HOURS_PER_DAY, err))?;
        }
        if let Some(value) = lookup(ENV_SENTINEL_MIN_DIGITS) {
            self.sentinel.min_digits = value
                .trim()
                .parse()
                .map_err(|err| env_error(ENV_SENTINEL_MIN_DIGITS, err))?;
        }
        if let Some(value) = lookup(ENV_SENTINEL_MAX_DIGITS) {
            self.sentinel.max_digits = value
                .trim()
                .parse()
                .map_err(|err| env_error(ENV_SENTINEL_MAX_DIGITS, err))?;
        }
        if let Some(value) = lookup(ENV_MISSING_MARKER) {
            self.output.missing_marker = value;
        }
        if let Some(value) = lookup(ENV_SCRATCH_DIR) {
            self.output.scratch_dir = Some(PathBuf::from(value));
        }
        Ok(())
    }

    pub fn sentinel_policy(&self) -> Result<SentinelPolicy> {
        SentinelPolicy::new(self.sentinel.min_digits, self.sentinel.max_digits)
            .map_err(|err| PipelineError::Config(err.to_string()))
    }

    pub fn pipeline_options(&self) -> Result<PipelineOptions> {
        let options = PipelineOptions::builder()
            .cadence(self.pipeline.cadence)
            .epoch(self.pipeline.epoch)
            .latitude(self.pipeline.latitude)
            .min_hours_per_day(self.pipeline.min_hours_per_day)
            .sentinel(self.sentinel_policy()?)
            .build();
        options.validate()?;
        Ok(options)
    }

    pub fn output_format(&self) -> OutputFormat {
        OutputFormat {
            missing_marker: self.output.missing_marker.clone(),
            ..OutputFormat::default()
        }
    }
}

fn env_error(key: &str, err: impl std::fmt::Display) -> PipelineError {
    PipelineError::Config(format!("{key}: {err}"))
}
