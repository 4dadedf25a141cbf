//! Hourly quality control, channel merge and daily aggregation.
//!
//! The orchestrator only relies on the [`FilterBackend`] contract. A numerical
//! library with the full harmonic/119-point filter plugs in by implementing the
//! trait; [`ReferenceFilters`] is the in-tree backend used by the CLI and tests.

use std::collections::BTreeMap;

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use polars::prelude::*;
use thiserror::Error;
use tracing::debug;

use crate::sentinel::SentinelPolicy;

const HOUR_MILLIS: i64 = 3_600_000;

#[derive(Debug, Error)]
pub enum FilterError {
    #[error("{stage} received an empty series")]
    EmptySeries { stage: &'static str },
    #[error("time column had {times} rows but value column had {values} rows")]
    LengthMismatch { times: usize, values: usize },
    #[error("instant at index {index} precedes the one before it")]
    OutOfOrder { index: usize },
    #[error("window end {end} precedes window start {start}")]
    InvalidWindow {
        start: NaiveDateTime,
        end: NaiveDateTime,
    },
    #[error("no channels supplied to merge")]
    NoChannels,
    #[error("weight given for unknown channel '{0}'")]
    UnknownChannel(String),
    #[error("channel '{0}' has no weight")]
    MissingWeight(String),
    #[error("channel '{channel}' has invalid weight {weight}")]
    InvalidWeight { channel: String, weight: f64 },
    #[error("channel '{0}' is not aligned with the other channels")]
    MisalignedChannels(String),
    #[error("latitude {0} is outside [-90, 90]")]
    InvalidLatitude(f64),
    #[error("polars operation failed: {0}")]
    Polars(#[from] PolarsError),
}

/// A series keyed by calendar instants, index aligned and non-decreasing.
#[derive(Debug, Clone, PartialEq)]
pub struct InstantSeries {
    times: Vec<NaiveDateTime>,
    values: Vec<Option<f64>>,
}

impl InstantSeries {
    pub fn new(times: Vec<NaiveDateTime>, values: Vec<Option<f64>>) -> Result<Self, FilterError> {
        if times.len() != values.len() {
            return Err(FilterError::LengthMismatch {
                times: times.len(),
                values: values.len(),
            });
        }
        if let Some(index) = times.windows(2).position(|w| w[1] < w[0]) {
            return Err(FilterError::OutOfOrder { index: index + 1 });
        }
        Ok(Self { times, values })
    }

    pub fn times(&self) -> &[NaiveDateTime] {
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

    pub fn samples(&self) -> impl Iterator<Item = (NaiveDateTime, Option<f64>)> + '_ {
        self.times.iter().copied().zip(self.values.iter().copied())
    }
}

/// Named channels handed to the merge step.
pub type ChannelSet = BTreeMap<String, InstantSeries>;
/// Per-channel weights for the merge step.
pub type ChannelWeights = BTreeMap<String, f64>;

pub trait FilterBackend {
    /// Regularises a raw series to whole hours bounded by `[start, end]`.
    fn hourly_filter(
        &self,
        series: &InstantSeries,
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> Result<InstantSeries, FilterError>;

    /// Combines aligned channels into one using per-channel weights.
    fn merge_channels(
        &self,
        channels: &ChannelSet,
        weights: &ChannelWeights,
    ) -> Result<InstantSeries, FilterError>;

    /// Reduces an hourly series to one value per day.
    fn daily_filter(
        &self,
        series: &InstantSeries,
        latitude: f64,
    ) -> Result<InstantSeries, FilterError>;
}

#[derive(Debug, Clone)]
pub struct ReferenceFilters {
    /// Raw readings matching this policy are dropped before hourly binning.
    pub qc_sentinel: Option<SentinelPolicy>,
    /// Days with fewer present hourly values are reported as missing.
    pub min_hours_per_day: usize,
    /// Time of day stamped on daily values.
    pub daily_anchor: NaiveTime,
}

impl Default for ReferenceFilters {
    fn default() -> Self {
        Self {
            qc_sentinel: Some(SentinelPolicy::default()),
            min_hours_per_day: 12,
            daily_anchor: NaiveTime::from_hms_opt(12, 0, 0).unwrap_or(NaiveTime::MIN),
        }
    }
}

impl ReferenceFilters {
    pub fn with_qc_sentinel(mut self, policy: Option<SentinelPolicy>) -> Self {
        self.qc_sentinel = policy;
        self
    }

    pub fn with_min_hours_per_day(mut self, hours: usize) -> Self {
        self.min_hours_per_day = hours;
        self
    }
}

fn round_to_hour(instant: NaiveDateTime) -> NaiveDateTime {
    let floor = instant.date().and_time(NaiveTime::MIN) + Duration::hours(i64::from(instant.hour()));
    if (instant - floor).num_milliseconds() * 2 >= HOUR_MILLIS {
        floor + Duration::hours(1)
    } else {
        floor
    }
}

impl FilterBackend for ReferenceFilters {
    /// Each present reading inside the window is assigned to its nearest whole
    /// hour; an hour's value is the mean of its readings, `None` when it has none.
    /// The grid runs from the hour nearest `start` to the hour nearest `end`.
    fn hourly_filter(
        &self,
        series: &InstantSeries,
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> Result<InstantSeries, FilterError> {
        if series.is_empty() {
            return Err(FilterError::EmptySeries {
                stage: "hourly_filter",
            });
        }
        if end < start {
            return Err(FilterError::InvalidWindow { start, end });
        }

        let first_hour = round_to_hour(start);
        let last_hour = round_to_hour(end);
        let slots = ((last_hour - first_hour).num_hours() + 1) as usize;

        let mut sums = vec![0.0f64; slots];
        let mut counts = vec![0usize; slots];
        let mut masked = 0usize;

        for (instant, value) in series.samples() {
            if instant < start || instant > end {
                continue;
            }
            let Some(value) = value else {
                continue;
            };
            if let Some(policy) = &self.qc_sentinel {
                if policy.is_sentinel(value.round()) {
                    masked += 1;
                    continue;
                }
            }
            let offset = (round_to_hour(instant) - first_hour).num_hours();
            if let Ok(slot) = usize::try_from(offset) {
                if slot < slots {
                    sums[slot] += value;
                    counts[slot] += 1;
                }
            }
        }

        debug!(slots, masked, "hourly filter binned readings");

        let times = (0..slots)
            .map(|slot| first_hour + Duration::hours(slot as i64))
            .collect();
        let values = sums
            .iter()
            .zip(&counts)
            .map(|(sum, &count)| (count > 0).then(|| sum / count as f64))
            .collect();

        InstantSeries::new(times, values)
    }

    /// Weighted mean across channels for every instant, skipping channels whose
    /// value is missing at that instant.
    fn merge_channels(
        &self,
        channels: &ChannelSet,
        weights: &ChannelWeights,
    ) -> Result<InstantSeries, FilterError> {
        let mut iter = channels.iter();
        let Some((_, reference)) = iter.next() else {
            return Err(FilterError::NoChannels);
        };

        for (name, weight) in weights {
            if !channels.contains_key(name) {
                return Err(FilterError::UnknownChannel(name.clone()));
            }
            if !weight.is_finite() || *weight <= 0.0 {
                return Err(FilterError::InvalidWeight {
                    channel: name.clone(),
                    weight: *weight,
                });
            }
        }
        for name in channels.keys() {
            if !weights.contains_key(name) {
                return Err(FilterError::MissingWeight(name.clone()));
            }
        }
        for (name, series) in iter {
            if series.times() != reference.times() {
                return Err(FilterError::MisalignedChannels(name.clone()));
            }
        }

        let values = (0..reference.len())
            .map(|idx| {
                let mut numerator = 0.0;
                let mut denominator = 0.0;
                for (name, series) in channels {
                    if let Some(value) = series.values()[idx] {
                        let weight = weights[name];
                        numerator += weight * value;
                        denominator += weight;
                    }
                }
                (denominator > 0.0).then(|| numerator / denominator)
            })
            .collect();

        InstantSeries::new(reference.times().to_vec(), values)
    }

    /// Calendar-day means stamped at `daily_anchor`. The reference backend does no
    /// tidal correction, so `latitude` is only validated; a harmonic filter uses it
    /// for its latitude-dependent terms.
    fn daily_filter(
        &self,
        series: &InstantSeries,
        latitude: f64,
    ) -> Result<InstantSeries, FilterError> {
        if !latitude.is_finite() || !(-90.0..=90.0).contains(&latitude) {
            return Err(FilterError::InvalidLatitude(latitude));
        }
        if series.is_empty() {
            return Err(FilterError::EmptySeries {
                stage: "daily_filter",
            });
        }

        let day_keys: Vec<i32> = series
            .times()
            .iter()
            .map(|instant| instant.date().num_days_from_ce())
            .collect();

        let frame = df!(
            "day" => day_keys,
            "value" => series.values().to_vec(),
        )?;

        let daily = frame
            .lazy()
            .group_by_stable([col("day")])
            .agg([
                col("value").mean().alias("mean"),
                col("value").count().cast(DataType::Int64).alias("present"),
            ])
            .collect()?;

        let days = daily.column("day")?.i32()?;
        let means = daily.column("mean")?.f64()?;
        let present = daily.column("present")?.i64()?;

        let mut times = Vec::with_capacity(daily.height());
        let mut values = Vec::with_capacity(daily.height());
        for idx in 0..daily.height() {
            let Some(date) = days.get(idx).and_then(NaiveDate::from_num_days_from_ce_opt) else {
                continue;
            };
            let enough = present
                .get(idx)
                .is_some_and(|count| count >= self.min_hours_per_day as i64);
            times.push(date.and_time(self.daily_anchor));
            values.push(if enough { means.get(idx) } else { None });
        }

        debug!(days = times.len(), latitude, "daily filter aggregated hours");

        InstantSeries::new(times, values)
    }
}
