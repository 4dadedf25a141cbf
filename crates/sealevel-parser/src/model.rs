use std::fmt;
use std::path::Path;

use polars::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Station identifier used when the upload carries no station metadata.
pub const PLACEHOLDER_STATION_ID: &str = "014";
/// Channel name given to the single measured quantity of a two-column upload.
pub const DEFAULT_CHANNEL: &str = "sealevel";

#[derive(Debug, Error, PartialEq)]
pub enum SeriesError {
    #[error("time column had {times} rows but value column had {values} rows")]
    LengthMismatch { times: usize, values: usize },
    #[error("timestamp at index {index} ({current}) precedes previous timestamp {previous}")]
    OutOfOrder {
        index: usize,
        previous: f64,
        current: f64,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InputFormat {
    CommaDelimited,
    TabDelimited,
}

impl InputFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            InputFormat::CommaDelimited => "csv",
            InputFormat::TabDelimited => "tsv",
        }
    }

    pub fn delimiter(&self) -> u8 {
        match self {
            InputFormat::CommaDelimited => b',',
            InputFormat::TabDelimited => b'\t',
        }
    }
}

impl fmt::Display for InputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the caller knows about an upload before its bytes are read.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InputDescriptor {
    pub file_name: Option<String>,
    pub content_type: Option<String>,
}

impl InputDescriptor {
    pub fn new(file_name: Option<String>, content_type: Option<String>) -> Self {
        Self {
            file_name,
            content_type,
        }
    }

    pub fn from_path(path: &Path) -> Self {
        Self {
            file_name: path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned()),
            content_type: None,
        }
    }

    pub fn extension(&self) -> Option<String> {
        let name = self.file_name.as_deref()?;
        Path::new(name)
            .extension()
            .map(|ext| ext.to_string_lossy().to_ascii_lowercase())
    }

    /// Media type without parameters, lowercased (`text/csv; charset=utf-8` -> `text/csv`).
    pub fn media_type(&self) -> Option<String> {
        let raw = self.content_type.as_deref()?;
        let essence = raw.split(';').next().unwrap_or_default().trim();
        if essence.is_empty() {
            None
        } else {
            Some(essence.to_ascii_lowercase())
        }
    }
}

/// A single-channel series of `(serial epoch, value)` samples.
///
/// `times` and `values` are index aligned and `times` is non-decreasing; both are
/// checked on construction and cannot be broken afterwards because the columns are
/// only handed out as slices. A `None` value marks a missing reading.
#[derive(Debug, Clone, PartialEq)]
pub struct TimeSeries {
    pub station_id: String,
    pub channel: String,
    pub file_hash: String,
    times: Vec<f64>,
    values: Vec<Option<f64>>,
}

impl TimeSeries {
    pub fn new(
        station_id: impl Into<String>,
        channel: impl Into<String>,
        times: Vec<f64>,
        values: Vec<Option<f64>>,
    ) -> Result<Self, SeriesError> {
        if times.len() != values.len() {
            return Err(SeriesError::LengthMismatch {
                times: times.len(),
                values: values.len(),
            });
        }

        for (index, window) in times.windows(2).enumerate() {
            if window[1] < window[0] {
                return Err(SeriesError::OutOfOrder {
                    index: index + 1,
                    previous: window[0],
                    current: window[1],
                });
            }
        }

        Ok(Self {
            station_id: station_id.into(),
            channel: channel.into(),
            file_hash: String::new(),
            times,
            values,
        })
    }

    /// Builds a series under the placeholder station and default channel.
    pub fn single_channel(times: Vec<f64>, values: Vec<Option<f64>>) -> Result<Self, SeriesError> {
        Self::new(PLACEHOLDER_STATION_ID, DEFAULT_CHANNEL, times, values)
    }

    pub fn times(&self) -> &[f64] {
        &self.times
    }

    pub fn values(&self) -> &[Option<f64>] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    pub fn first_time(&self) -> Option<f64> {
        self.times.first().copied()
    }

    pub fn last_time(&self) -> Option<f64> {
        self.times.last().copied()
    }

    pub fn missing_count(&self) -> usize {
        self.values.iter().filter(|value| value.is_none()).count()
    }

    pub fn samples(&self) -> impl Iterator<Item = (f64, Option<f64>)> + '_ {
        self.times.iter().copied().zip(self.values.iter().copied())
    }

    pub fn into_columns(self) -> (Vec<f64>, Vec<Option<f64>>) {
        (self.times, self.values)
    }

    pub fn to_dataframe(&self) -> PolarsResult<DataFrame> {
        DataFrame::new(vec![
            Series::new("time".into(), self.times.as_slice()).into(),
            Series::new(self.channel.as_str().into(), self.values.as_slice()).into(),
        ])
    }
}
