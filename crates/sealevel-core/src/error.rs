// crates/sealevel-core/src/error.rs

use std::fmt;

use sealevel_parser::ParserError;
use serde::Serialize;
use thiserror::Error;

use crate::codec::CodecError;
use crate::filters::FilterError;

/// Pipeline step a failure is attributed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Parse,
    Decode,
    HourlyFilter,
    MergeChannels,
    DailyFilter,
    Finalize,
    Serialize,
    Config,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Parse => "parse",
            Stage::Decode => "decode",
            Stage::HourlyFilter => "hourly_filter",
            Stage::MergeChannels => "merge_channels",
            Stage::DailyFilter => "daily_filter",
            Stage::Finalize => "finalize",
            Stage::Serialize => "serialize",
            Stage::Config => "config",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    UnsupportedFormat,
    MalformedInput,
    InvalidTimestamp,
    ProcessingFailed,
    Io,
    Config,
}

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("[{stage}] unsupported format: {source}")]
    UnsupportedFormat {
        stage: Stage,
        #[source]
        source: ParserError,
    },

    #[error("[{stage}] malformed input: {source}")]
    MalformedInput {
        stage: Stage,
        #[source]
        source: ParserError,
    },

    #[error("[{stage}] invalid timestamp at row {row}: {source}")]
    InvalidTimestamp {
        stage: Stage,
        row: usize,
        #[source]
        source: CodecError,
    },

    #[error("[{stage}] processing failed: {source}")]
    ProcessingFailed {
        stage: Stage,
        #[source]
        source: FilterError,
    },

    #[error("[{stage}] file I/O error: {source}")]
    Io {
        stage: Stage,
        #[source]
        source: std::io::Error,
    },

    #[error("[{stage}] CSV error: {source}")]
    Csv {
        stage: Stage,
        #[source]
        source: csv::Error,
    },

    #[error("configuration error: {0}")]
    Config(String),
}

impl PipelineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PipelineError::UnsupportedFormat { .. } => ErrorKind::UnsupportedFormat,
            PipelineError::MalformedInput { .. } => ErrorKind::MalformedInput,
            PipelineError::InvalidTimestamp { .. } => ErrorKind::InvalidTimestamp,
            PipelineError::ProcessingFailed { .. } => ErrorKind::ProcessingFailed,
            PipelineError::Io { .. } | PipelineError::Csv { .. } => ErrorKind::Io,
            PipelineError::Config(_) => ErrorKind::Config,
        }
    }

    pub fn stage(&self) -> Stage {
        match self {
            PipelineError::UnsupportedFormat { stage, .. }
            | PipelineError::MalformedInput { stage, .. }
            | PipelineError::InvalidTimestamp { stage, .. }
            | PipelineError::ProcessingFailed { stage, .. }
            | PipelineError::Io { stage, .. }
            | PipelineError::Csv { stage, .. } => *stage,
            PipelineError::Config(_) => Stage::Config,
        }
    }

    pub(crate) fn processing(stage: Stage, source: FilterError) -> Self {
        PipelineError::ProcessingFailed { stage, source }
    }

    pub(crate) fn timestamp(stage: Stage, row: usize, source: CodecError) -> Self {
        PipelineError::InvalidTimestamp { stage, row, source }
    }

    pub(crate) fn io(stage: Stage, source: std::io::Error) -> Self {
        PipelineError::Io { stage, source }
    }
}

impl From<ParserError> for PipelineError {
    fn from(source: ParserError) -> Self {
        if source.is_unsupported_format() {
            PipelineError::UnsupportedFormat {
                stage: Stage::Parse,
                source,
            }
        } else {
            PipelineError::MalformedInput {
                stage: Stage::Parse,
                source,
            }
        }
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;
