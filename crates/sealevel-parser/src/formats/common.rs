use crate::errors::ParserError;

pub(crate) fn parse_epoch(
    parser: &'static str,
    value: &str,
    line_index: usize,
) -> Result<f64, ParserError> {
    let trimmed = value.trim();
    let parsed = trimmed
        .parse::<f64>()
        .map_err(|err| ParserError::DataRow {
            parser,
            line_index,
            message: format!("failed to parse time column '{trimmed}' as float: {err}"),
        })?;

    if !parsed.is_finite() {
        return Err(ParserError::DataRow {
            parser,
            line_index,
            message: format!("time column must be finite, got '{trimmed}'"),
        });
    }

    Ok(parsed)
}

/// Parses the value column. `nan` (any case) is the only accepted spelling of a
/// missing reading; blank fields are rejected so that short rows are not masked.
pub(crate) fn parse_value(
    parser: &'static str,
    value: &str,
    line_index: usize,
) -> Result<Option<f64>, ParserError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ParserError::DataRow {
            parser,
            line_index,
            message: "value column is empty".to_string(),
        });
    }
    if trimmed.eq_ignore_ascii_case("nan") {
        return Ok(None);
    }

    match trimmed.parse::<f64>() {
        Ok(parsed) if parsed.is_finite() => Ok(Some(parsed)),
        Ok(_) => Err(ParserError::DataRow {
            parser,
            line_index,
            message: format!("value column must be finite, got '{trimmed}'"),
        }),
        Err(err) => Err(ParserError::DataRow {
            parser,
            line_index,
            message: format!("failed to parse value column '{trimmed}' as float: {err}"),
        }),
    }
}
