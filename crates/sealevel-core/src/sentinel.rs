use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Widest whole number that still fits `u64` digit handling.
const MAX_SUPPORTED_DIGITS: u32 = 18;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SentinelPolicyError {
    #[error("sentinel width must be at least one digit")]
    ZeroWidth,
    #[error("sentinel min_digits {min} exceeds max_digits {max}")]
    InvertedRange { min: u32, max: u32 },
    #[error("sentinel max_digits {0} exceeds the supported 18")]
    TooWide(u32),
}

/// Recognises instrument "no data" readings written as a run of nines.
///
/// Matching is done on the decimal text of a whole value so that a genuine
/// extreme reading such as `9998` or `10000` is never mistaken for a placeholder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SentinelPolicy {
    pub min_digits: u32,
    pub max_digits: u32,
}

impl Default for SentinelPolicy {
    fn default() -> Self {
        Self {
            min_digits: 3,
            max_digits: 4,
        }
    }
}

impl SentinelPolicy {
    pub fn new(min_digits: u32, max_digits: u32) -> Result<Self, SentinelPolicyError> {
        let policy = Self {
            min_digits,
            max_digits,
        };
        policy.validate()?;
        Ok(policy)
    }

    /// Matches exactly one width, e.g. `exact(4)` for `9999`.
    pub fn exact(digits: u32) -> Result<Self, SentinelPolicyError> {
        Self::new(digits, digits)
    }

    pub fn validate(&self) -> Result<(), SentinelPolicyError> {
        if self.min_digits == 0 {
            return Err(SentinelPolicyError::ZeroWidth);
        }
        if self.min_digits > self.max_digits {
            return Err(SentinelPolicyError::InvertedRange {
                min: self.min_digits,
                max: self.max_digits,
            });
        }
        if self.max_digits > MAX_SUPPORTED_DIGITS {
            return Err(SentinelPolicyError::TooWide(self.max_digits));
        }
        Ok(())
    }

    pub fn is_sentinel(&self, value: f64) -> bool {
        if !value.is_finite() || value < 0.0 || value.fract() != 0.0 {
            return false;
        }
        if value >= 10f64.powi(MAX_SUPPORTED_DIGITS as i32) {
            return false;
        }

        let digits = (value as u64).to_string();
        let width = digits.len() as u32;
        width >= self.min_digits
            && width <= self.max_digits
            && digits.bytes().all(|b| b == b'9')
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SentinelReport {
    pub replaced: usize,
    pub first_index: Option<usize>,
}

/// Replaces sentinel readings with `None`, keeping every other entry and the
/// overall length untouched. Values are expected to be rounded already.
pub fn strip_sentinel(
    values: &[Option<f64>],
    policy: &SentinelPolicy,
) -> (Vec<Option<f64>>, SentinelReport) {
    let mut report = SentinelReport::default();
    let cleaned = values
        .iter()
        .enumerate()
        .map(|(idx, value)| match value {
            Some(v) if policy.is_sentinel(*v) => {
                report.replaced += 1;
                report.first_index.get_or_insert(idx);
                None
            }
            other => *other,
        })
        .collect();
    (cleaned, report)
}
