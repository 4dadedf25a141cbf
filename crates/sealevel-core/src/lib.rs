pub mod codec;
pub mod config;
pub mod error;
pub mod filters;
pub mod outputs;
pub mod pipelines;
pub mod sentinel;

pub use error::{ErrorKind, PipelineError, Result, Stage};
pub use pipelines::{Cadence, OutputEpoch, Pipeline, PipelineOptions, PipelineRun};
