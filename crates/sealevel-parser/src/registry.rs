use crate::errors::ParserError;
use crate::formats::DelimitedParser;
use crate::model::{InputDescriptor, InputFormat, TimeSeries};

pub trait SeriesParser {
    fn name(&self) -> &'static str;
    fn parse(&self, content: &str) -> Result<TimeSeries, ParserError>;
}

const COMMA_EXTENSIONS: &[&str] = &["csv", "txt", "dat"];
const TAB_EXTENSIONS: &[&str] = &["tsv", "tab"];
const COMMA_MEDIA_TYPES: &[&str] = &["text/csv", "text/plain", "application/csv"];
const TAB_MEDIA_TYPES: &[&str] = &["text/tab-separated-values"];
// Sent by browsers for arbitrary uploads; carries no format information.
const NEUTRAL_MEDIA_TYPES: &[&str] = &["application/octet-stream", "application/vnd.ms-excel"];
// Any delimiter fits plain text, so it never contradicts the extension.
const GENERIC_TEXT_MEDIA_TYPES: &[&str] = &["text/plain"];

fn format_for_extension(ext: &str) -> Option<InputFormat> {
    if COMMA_EXTENSIONS.contains(&ext) {
        Some(InputFormat::CommaDelimited)
    } else if TAB_EXTENSIONS.contains(&ext) {
        Some(InputFormat::TabDelimited)
    } else {
        None
    }
}

fn format_for_media_type(media_type: &str) -> Option<InputFormat> {
    if COMMA_MEDIA_TYPES.contains(&media_type) {
        Some(InputFormat::CommaDelimited)
    } else if TAB_MEDIA_TYPES.contains(&media_type) {
        Some(InputFormat::TabDelimited)
    } else {
        None
    }
}

/// Decides the input format from the file name and declared content type.
///
/// The extension decides when both are present. A content type naming a
/// non-text kind of file, or the other delimiter, is rejected as a mismatch.
pub fn detect_format(descriptor: &InputDescriptor) -> Result<InputFormat, ParserError> {
    let media_type = descriptor.media_type();
    let media_format = match media_type.as_deref() {
        None => None,
        Some(mt) if NEUTRAL_MEDIA_TYPES.contains(&mt) => None,
        Some(mt) => match format_for_media_type(mt) {
            Some(format) => Some(format),
            None => {
                return Err(ParserError::UnsupportedFormat {
                    reason: format!("content type '{mt}' is not delimited text"),
                })
            }
        },
    };

    if let Some(ext) = descriptor.extension() {
        let ext_format = format_for_extension(&ext);
        if let (Some(by_ext), Some(by_type), Some(mt)) =
            (ext_format, media_format, media_type.as_deref())
        {
            if by_ext != by_type && !GENERIC_TEXT_MEDIA_TYPES.contains(&mt) {
                return Err(ParserError::UnsupportedFormat {
                    reason: format!(
                        "file extension '.{ext}' ({by_ext}) disagrees with content type '{mt}' ({by_type})"
                    ),
                });
            }
        }
        return ext_format.ok_or_else(|| ParserError::UnsupportedFormat {
            reason: format!(
                "file extension '.{ext}' is not a recognized delimited-text format (expected one of {})",
                COMMA_EXTENSIONS
                    .iter()
                    .chain(TAB_EXTENSIONS)
                    .map(|e| format!(".{e}"))
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
        });
    }

    Ok(media_format.unwrap_or(InputFormat::CommaDelimited))
}

fn decode_text(bytes: &[u8]) -> Result<&str, ParserError> {
    if bytes.contains(&0) {
        return Err(ParserError::UnsupportedFormat {
            reason: "input contains NUL bytes; binary files are not supported".to_string(),
        });
    }
    std::str::from_utf8(bytes).map_err(|err| ParserError::UnsupportedFormat {
        reason: format!("input is not valid UTF-8 text: {err}"),
    })
}

/// Detects the format of an upload, parses it, and stamps the content hash.
pub fn parse_series_file(
    bytes: &[u8],
    descriptor: &InputDescriptor,
) -> Result<TimeSeries, ParserError> {
    let format = detect_format(descriptor)?;
    let content = decode_text(bytes)?;
    let parser = DelimitedParser::new(format);
    let mut series = parse_with_parser(content, &parser)?;
    series.file_hash = blake3::hash(bytes).to_hex().to_string();
    Ok(series)
}

pub fn parse_with_parser(
    content: &str,
    parser: &dyn SeriesParser,
) -> Result<TimeSeries, ParserError> {
    parser.parse(content)
}
