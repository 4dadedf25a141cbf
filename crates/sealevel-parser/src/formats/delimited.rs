use crate::errors::ParserError;
use crate::model::{InputFormat, TimeSeries};
use crate::registry::SeriesParser;

use super::{parse_epoch, parse_value};

const EXPECTED_COLUMNS: usize = 2;

/// Headerless `time<delim>value` text, one sample per line.
pub struct DelimitedParser {
    format: InputFormat,
}

impl DelimitedParser {
    pub const fn new(format: InputFormat) -> Self {
        Self { format }
    }

    pub const fn comma() -> Self {
        Self::new(InputFormat::CommaDelimited)
    }

    pub const fn tab() -> Self {
        Self::new(InputFormat::TabDelimited)
    }

    pub fn format(&self) -> InputFormat {
        self.format
    }
}

impl Default for DelimitedParser {
    fn default() -> Self {
        Self::comma()
    }
}

impl SeriesParser for DelimitedParser {
    fn name(&self) -> &'static str {
        match self.format {
            InputFormat::CommaDelimited => "COMMA_DELIMITED",
            InputFormat::TabDelimited => "TAB_DELIMITED",
        }
    }

    fn parse(&self, content: &str) -> Result<TimeSeries, ParserError> {
        let parser = self.name();
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .delimiter(self.format.delimiter())
            .from_reader(content.as_bytes());

        let mut times = Vec::new();
        let mut values = Vec::new();
        let mut previous: Option<f64> = None;

        for (row_idx, record) in reader.records().enumerate() {
            let record = record.map_err(|err| ParserError::Csv {
                parser,
                source: err,
            })?;
            let line_index = record
                .position()
                .map(|pos| pos.line() as usize)
                .unwrap_or(row_idx + 1);

            if record.iter().all(|field| field.trim().is_empty()) {
                continue;
            }

            if record.len() != EXPECTED_COLUMNS {
                return Err(ParserError::ColumnCount {
                    parser,
                    line_index,
                    found: record.len(),
                });
            }

            let time = parse_epoch(parser, &record[0], line_index)?;
            let value = parse_value(parser, &record[1], line_index)?;

            if let Some(prev) = previous {
                if time < prev {
                    return Err(ParserError::OutOfOrder {
                        parser,
                        line_index,
                        previous: prev,
                        current: time,
                    });
                }
            }
            previous = Some(time);

            times.push(time);
            values.push(value);
        }

        if times.is_empty() {
            return Err(ParserError::EmptyData { parser });
        }

        TimeSeries::single_channel(times, values).map_err(|err| ParserError::Validation {
            parser,
            message: err.to_string(),
        })
    }
}
