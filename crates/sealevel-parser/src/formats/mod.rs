mod common;
mod delimited;

pub use delimited::DelimitedParser;

pub(crate) use common::{parse_epoch, parse_value};
