use thiserror::Error;

#[derive(Debug, Error)]
pub enum ParserError {
    #[error("unsupported input format: {reason}")]
    UnsupportedFormat { reason: String },

    #[error("{parser} line {line_index}: expected 2 columns, found {found}")]
    ColumnCount {
        parser: &'static str,
        line_index: usize,
        found: usize,
    },

    #[error("{parser} line {line_index} invalid: {message}")]
    DataRow {
        parser: &'static str,
        line_index: usize,
        message: String,
    },

    #[error("{parser} line {line_index}: timestamp {current} precedes previous timestamp {previous}")]
    OutOfOrder {
        parser: &'static str,
        line_index: usize,
        previous: f64,
        current: f64,
    },

    #[error("{parser} CSV error: {source}")]
    Csv {
        parser: &'static str,
        #[source]
        source: csv::Error,
    },

    #[error("{parser} validation error: {message}")]
    Validation {
        parser: &'static str,
        message: String,
    },

    #[error("{parser} file did not contain any data rows")]
    EmptyData { parser: &'static str },
}

impl ParserError {
    /// True when the input was rejected before any row was read.
    pub fn is_unsupported_format(&self) -> bool {
        matches!(self, ParserError::UnsupportedFormat { .. })
    }

    /// Line number of the offending row, when the failure is tied to one.
    pub fn line_index(&self) -> Option<usize> {
        match self {
            ParserError::ColumnCount { line_index, .. }
            | ParserError::DataRow { line_index, .. }
            | ParserError::OutOfOrder { line_index, .. } => Some(*line_index),
            _ => None,
        }
    }
}
