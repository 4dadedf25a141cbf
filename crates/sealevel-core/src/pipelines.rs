use std::fmt;
use std::str::FromStr;

use chrono::NaiveDateTime;
use sealevel_parser::TimeSeries;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::codec::{calendar_to_serial, format_calendar, serial_to_calendar};
use crate::error::{PipelineError, Result, Stage};
use crate::filters::{ChannelSet, ChannelWeights, FilterBackend, InstantSeries, ReferenceFilters};
use crate::sentinel::{strip_sentinel, SentinelPolicy};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unrecognized {selector} '{value}' (expected one of: {expected})")]
pub struct SelectorError {
    pub selector: &'static str,
    pub value: String,
    pub expected: &'static str,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Cadence {
    #[default]
    Hourly,
    Daily,
}

impl Cadence {
    pub fn as_str(&self) -> &'static str {
        match self {
            Cadence::Hourly => "hourly",
            Cadence::Daily => "daily",
        }
    }
}

impl fmt::Display for Cadence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Cadence {
    type Err = SelectorError;

    fn from_str(value: &str) -> std::result::Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "hourly" => Ok(Cadence::Hourly),
            "daily" => Ok(Cadence::Daily),
            _ => Err(SelectorError {
                selector: "cadence",
                value: value.to_string(),
                expected: "hourly, daily",
            }),
        }
    }
}

/// Encoding of the output time column.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputEpoch {
    /// Serial day number.
    #[default]
    #[serde(alias = "serial")]
    Matlab,
    /// ISO-8601 calendar string.
    #[serde(alias = "calendar", alias = "iso")]
    Datetime,
}

impl OutputEpoch {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutputEpoch::Matlab => "matlab",
            OutputEpoch::Datetime => "datetime",
        }
    }
}

impl fmt::Display for OutputEpoch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OutputEpoch {
    type Err = SelectorError;

    fn from_str(value: &str) -> std::result::Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "matlab" | "serial" => Ok(OutputEpoch::Matlab),
            "datetime" | "calendar" | "iso" => Ok(OutputEpoch::Datetime),
            _ => Err(SelectorError {
                selector: "epoch",
                value: value.to_string(),
                expected: "matlab, datetime",
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineOptions {
    pub cadence: Cadence,
    pub epoch: OutputEpoch,
    /// Station latitude in degrees, passed to the daily filter.
    pub latitude: f64,
    pub sentinel: SentinelPolicy,
    pub min_hours_per_day: usize,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            cadence: Cadence::default(),
            epoch: OutputEpoch::default(),
            latitude: 0.0,
            sentinel: SentinelPolicy::default(),
            min_hours_per_day: 12,
        }
    }
}

impl PipelineOptions {
    pub fn builder() -> PipelineOptionsBuilder {
        PipelineOptionsBuilder::default()
    }

    /// Rejects settings no run could use, whatever the cadence.
    pub fn validate(&self) -> Result<()> {
        self.sentinel
            .validate()
            .map_err(|err| PipelineError::Config(err.to_string()))?;
        if !self.latitude.is_finite() || !(-90.0..=90.0).contains(&self.latitude) {
            return Err(PipelineError::Config(format!(
                "latitude {} is outside [-90, 90]",
                self.latitude
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub struct PipelineOptionsBuilder {
    options: PipelineOptions,
}

impl PipelineOptionsBuilder {
    pub fn cadence(mut self, cadence: Cadence) -> Self {
        self.options.cadence = cadence;
        self
    }

    pub fn epoch(mut self, epoch: OutputEpoch) -> Self {
        self.options.epoch = epoch;
        self
    }

    pub fn latitude(mut self, latitude: f64) -> Self {
        self.options.latitude = latitude;
        self
    }

    pub fn sentinel(mut self, sentinel: SentinelPolicy) -> Self {
        self.options.sentinel = sentinel;
        self
    }

    pub fn min_hours_per_day(mut self, hours: usize) -> Self {
        self.options.min_hours_per_day = hours;
        self
    }

    pub fn build(self) -> PipelineOptions {
        self.options
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineState {
    Ingested,
    HourlyFiltered,
    DailyFiltered,
    Finalizing,
    Done,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Timestamp {
    Serial(f64),
    Calendar(NaiveDateTime),
}

impl Timestamp {
    /// Text written to the time column. Whole serial days keep a trailing `.0`.
    pub fn render(&self) -> String {
        match self {
            Timestamp::Serial(value) if value.fract() == 0.0 => format!("{value:.1}"),
            Timestamp::Serial(value) => value.to_string(),
            Timestamp::Calendar(instant) => format_calendar(instant),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FinalRow {
    pub timestamp: Timestamp,
    /// Whole-unit reading; `None` is written as the missing marker.
    pub value: Option<i64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FinalSeries {
    pub station_id: String,
    pub channel: String,
    pub cadence: Cadence,
    pub epoch: OutputEpoch,
    pub rows: Vec<FinalRow>,
}

impl FinalSeries {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PipelineSummary {
    pub station_id: String,
    pub channel: String,
    pub input_hash: String,
    pub cadence: Cadence,
    pub epoch: OutputEpoch,
    pub input_rows: usize,
    pub hourly_rows: usize,
    pub daily_rows: Option<usize>,
    pub output_rows: usize,
    pub missing_values: usize,
    pub sentinel_replaced: usize,
    /// Readings too large for a whole-unit integer, written as missing.
    pub unrepresentable_values: usize,
    pub first_timestamp: Option<String>,
    pub last_timestamp: Option<String>,
    pub states: Vec<PipelineState>,
}

#[derive(Debug, Clone)]
pub struct PipelineRun {
    pub series: FinalSeries,
    pub summary: PipelineSummary,
}

/// Runs quality control, optional daily aggregation and finalisation for one
/// parsed series. Nothing is written; the caller serialises the result.
pub struct Pipeline<B = ReferenceFilters> {
    backend: B,
    options: PipelineOptions,
}

impl Pipeline<ReferenceFilters> {
    pub fn new(options: PipelineOptions) -> Self {
        let backend = ReferenceFilters::default()
            .with_qc_sentinel(Some(options.sentinel))
            .with_min_hours_per_day(options.min_hours_per_day);
        Self { backend, options }
    }
}

impl<B: FilterBackend> Pipeline<B> {
    pub fn with_backend(backend: B, options: PipelineOptions) -> Self {
        Self { backend, options }
    }

    pub fn options(&self) -> &PipelineOptions {
        &self.options
    }

    pub fn run(&self, series: &TimeSeries) -> Result<PipelineRun> {
        let options = &self.options;
        options.validate()?;

        let mut states = vec![PipelineState::Ingested];
        info!(
            station = %series.station_id,
            channel = %series.channel,
            rows = series.len(),
            cadence = %options.cadence,
            epoch = %options.epoch,
            "pipeline ingested series"
        );

        let instants = decode_series(series)?;
        let (start, end) = match (instants.times().first(), instants.times().last()) {
            (Some(start), Some(end)) => (*start, *end),
            _ => {
                return Err(PipelineError::processing(
                    Stage::HourlyFilter,
                    crate::filters::FilterError::EmptySeries {
                        stage: "hourly_filter",
                    },
                ))
            }
        };

        let hourly = self
            .backend
            .hourly_filter(&instants, start, end)
            .map_err(|err| PipelineError::processing(Stage::HourlyFilter, err))?;
        let hourly_rows = hourly.len();
        states.push(PipelineState::HourlyFiltered);
        info!(rows = hourly_rows, %start, %end, "hourly filter complete");

        let (filtered, daily_rows) = match options.cadence {
            Cadence::Hourly => (hourly, None),
            Cadence::Daily => {
                let daily = self.aggregate_daily(&series.channel, hourly)?;
                let rows = daily.len();
                states.push(PipelineState::DailyFiltered);
                info!(rows, latitude = options.latitude, "daily filter complete");
                (daily, Some(rows))
            }
        };

        states.push(PipelineState::Finalizing);
        let rounded: Vec<Option<f64>> = filtered
            .values()
            .iter()
            .map(|value| value.map(f64::round))
            .collect();
        let (cleaned, report) = strip_sentinel(&rounded, &options.sentinel);
        if report.replaced > 0 {
            warn!(
                replaced = report.replaced,
                first_index = ?report.first_index,
                "replaced sentinel readings with missing marker"
            );
        }

        let mut unrepresentable = 0usize;
        let rows = filtered
            .times()
            .iter()
            .zip(cleaned)
            .enumerate()
            .map(|(idx, (instant, value))| {
                let timestamp = encode_timestamp(*instant, options.epoch)
                    .map_err(|err| PipelineError::timestamp(Stage::Finalize, idx + 1, err))?;
                let whole = value.and_then(|v| {
                    let whole = whole_units(v);
                    if whole.is_none() {
                        unrepresentable += 1;
                        warn!(
                            row = idx + 1,
                            value = v,
                            "reading exceeds whole-unit range; writing missing marker"
                        );
                    }
                    whole
                });
                Ok(FinalRow {
                    timestamp,
                    value: whole,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let missing_values = rows.iter().filter(|row| row.value.is_none()).count();
        debug!(rows = rows.len(), missing_values, "finalized series");
        states.push(PipelineState::Done);

        let summary = PipelineSummary {
            station_id: series.station_id.clone(),
            channel: series.channel.clone(),
            input_hash: series.file_hash.clone(),
            cadence: options.cadence,
            epoch: options.epoch,
            input_rows: series.len(),
            hourly_rows,
            daily_rows,
            output_rows: rows.len(),
            missing_values,
            sentinel_replaced: report.replaced,
            unrepresentable_values: unrepresentable,
            first_timestamp: rows.first().map(|row| row.timestamp.render()),
            last_timestamp: rows.last().map(|row| row.timestamp.render()),
            states,
        };

        Ok(PipelineRun {
            series: FinalSeries {
                station_id: series.station_id.clone(),
                channel: series.channel.clone(),
                cadence: options.cadence,
                epoch: options.epoch,
                rows,
            },
            summary,
        })
    }

    /// Single channel at full weight through the merge step, then the daily filter.
    fn aggregate_daily(&self, channel: &str, hourly: InstantSeries) -> Result<InstantSeries> {
        let mut channels = ChannelSet::new();
        channels.insert(channel.to_string(), hourly);
        let mut weights = ChannelWeights::new();
        weights.insert(channel.to_string(), 1.0);

        let merged = self
            .backend
            .merge_channels(&channels, &weights)
            .map_err(|err| PipelineError::processing(Stage::MergeChannels, err))?;

        self.backend
            .daily_filter(&merged, self.options.latitude)
            .map_err(|err| PipelineError::processing(Stage::DailyFilter, err))
    }
}

/// Converts a rounded reading to an integer, `None` when it does not fit `i64`.
fn whole_units(value: f64) -> Option<i64> {
    // i64::MAX as f64 rounds up to 2^63, so the upper bound is exclusive.
    let (min, max) = (i64::MIN as f64, i64::MAX as f64);
    (value.is_finite() && value >= min && value < max).then(|| value as i64)
}

fn decode_series(series: &TimeSeries) -> Result<InstantSeries> {
    let times = series
        .times()
        .iter()
        .enumerate()
        .map(|(idx, serial)| {
            serial_to_calendar(*serial)
                .map_err(|err| PipelineError::timestamp(Stage::Decode, idx + 1, err))
        })
        .collect::<Result<Vec<_>>>()?;

    InstantSeries::new(times, series.values().to_vec())
        .map_err(|err| PipelineError::processing(Stage::Decode, err))
}

fn encode_timestamp(
    instant: NaiveDateTime,
    epoch: OutputEpoch,
) -> std::result::Result<Timestamp, crate::codec::CodecError> {
    match epoch {
        OutputEpoch::Matlab => calendar_to_serial(instant).map(Timestamp::Serial),
        OutputEpoch::Datetime => Ok(Timestamp::Calendar(instant)),
    }
}
