pub mod errors;
pub mod formats;
pub mod model;
mod registry;

pub use errors::ParserError;
pub use model::{InputDescriptor, InputFormat, SeriesError, TimeSeries};
pub use registry::{detect_format, parse_series_file, parse_with_parser, SeriesParser};

#[cfg(test)]
mod tests;
