use std::fs;
use std::path::PathBuf;

use crate::errors::ParserError;
use crate::formats::DelimitedParser;
use crate::model::{InputDescriptor, InputFormat, SeriesError, TimeSeries, DEFAULT_CHANNEL};
use crate::registry::SeriesParser;
use crate::{detect_format, parse_series_file};

fn fixture(path: &str) -> Vec<u8> {
    let base = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    let full_path = base.join("tests/data").join(path);
    fs::read(&full_path)
        .unwrap_or_else(|err| panic!("failed to read fixture {}: {}", full_path.display(), err))
}

fn csv_descriptor(name: &str) -> InputDescriptor {
    InputDescriptor::new(Some(name.to_string()), None)
}

#[test]
fn parses_savetxt_style_hourly_file() {
    let bytes = fixture("station_014_hourly.csv");
    let series = parse_series_file(&bytes, &csv_descriptor("station_014_hourly.csv"))
        .expect("hourly parse failed");

    assert_eq!(series.len(), 48);
    assert_eq!(series.times().len(), series.values().len());
    assert_eq!(series.channel, DEFAULT_CHANNEL);
    assert_eq!(series.first_time(), Some(738000.0));
    assert_eq!(series.values()[0], Some(1500.0));
    assert_eq!(series.values()[5], Some(9999.0));
    assert!(series.times().windows(2).all(|w| w[0] <= w[1]));
}

#[test]
fn stamps_blake3_hash_of_raw_bytes() {
    let bytes = fixture("scenario_a.csv");
    let series =
        parse_series_file(&bytes, &csv_descriptor("scenario_a.csv")).expect("parse failed");
    assert_eq!(series.file_hash, blake3::hash(&bytes).to_hex().to_string());
    assert_eq!(series.file_hash.len(), 64);
}

#[test]
fn parses_tab_delimited_file() {
    let bytes = fixture("station_014_hourly.tsv");
    let series = parse_series_file(&bytes, &csv_descriptor("station_014_hourly.tsv"))
        .expect("tsv parse failed");
    assert_eq!(series.len(), 6);
    assert_eq!(series.values()[5], Some(9999.0));
}

#[test]
fn nan_values_become_missing_and_blank_lines_are_skipped() {
    let bytes = fixture("with_missing.csv");
    let series =
        parse_series_file(&bytes, &csv_descriptor("with_missing.csv")).expect("parse failed");
    assert_eq!(series.len(), 3);
    assert_eq!(series.values(), &[Some(150.0), None, Some(152.0)]);
    assert_eq!(series.missing_count(), 1);
}

#[test]
fn three_columns_are_rejected() {
    let bytes = fixture("three_columns.csv");
    let err = parse_series_file(&bytes, &csv_descriptor("three_columns.csv"))
        .expect_err("three columns should fail");
    match err {
        ParserError::ColumnCount {
            line_index, found, ..
        } => {
            assert_eq!(line_index, 1);
            assert_eq!(found, 3);
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn single_column_row_is_rejected() {
    let err = DelimitedParser::comma()
        .parse("738000.0,150\n738000.1\n")
        .expect_err("short row should fail");
    assert!(matches!(err, ParserError::ColumnCount { found: 1, .. }));
    assert_eq!(err.line_index(), Some(2));
}

#[test]
fn non_numeric_fields_are_rejected() {
    let err = DelimitedParser::comma()
        .parse("738000.0,abc\n")
        .expect_err("text value should fail");
    assert!(matches!(err, ParserError::DataRow { line_index: 1, .. }));

    let err = DelimitedParser::comma()
        .parse("inf,1\n")
        .expect_err("infinite time should fail");
    assert!(matches!(err, ParserError::DataRow { .. }));

    let err = DelimitedParser::comma()
        .parse("738000.0,\n")
        .expect_err("empty value should fail");
    assert!(matches!(err, ParserError::DataRow { .. }));
}

#[test]
fn decreasing_timestamps_are_rejected_not_sorted() {
    let bytes = fixture("out_of_order.csv");
    let err = parse_series_file(&bytes, &csv_descriptor("out_of_order.csv"))
        .expect_err("out of order should fail");
    assert!(matches!(err, ParserError::OutOfOrder { line_index: 2, .. }));
}

#[test]
fn empty_input_is_rejected() {
    let err = DelimitedParser::comma()
        .parse("\n\n")
        .expect_err("empty input should fail");
    assert!(matches!(err, ParserError::EmptyData { .. }));
}

#[test]
fn negative_epochs_are_left_for_the_codec() {
    let series = DelimitedParser::comma()
        .parse("-5.0,150\n")
        .expect("parser only checks shape");
    assert_eq!(series.times(), &[-5.0]);
}

#[test]
fn unsupported_extensions_fail_before_parsing() {
    let err = parse_series_file(b"\x89PNG", &csv_descriptor("plot.png"))
        .expect_err("png should be unsupported");
    assert!(err.is_unsupported_format());

    let err = parse_series_file(b"738000.0,1\n", &csv_descriptor("data.xlsx"))
        .expect_err("xlsx should be unsupported");
    assert!(err.is_unsupported_format());
}

#[test]
fn binary_payload_is_unsupported() {
    let err = parse_series_file(b"738000.0,1\0\n", &csv_descriptor("data.csv"))
        .expect_err("NUL bytes should be unsupported");
    assert!(err.is_unsupported_format());

    let err = parse_series_file(&[0xff, 0xfe, 0x31], &csv_descriptor("data.csv"))
        .expect_err("invalid utf-8 should be unsupported");
    assert!(err.is_unsupported_format());
}

#[test]
fn detect_format_uses_extension_then_content_type() {
    let tsv = InputDescriptor::new(Some("a.TSV".into()), None);
    assert_eq!(detect_format(&tsv).unwrap(), InputFormat::TabDelimited);

    let by_type = InputDescriptor::new(None, Some("text/csv; charset=utf-8".into()));
    assert_eq!(detect_format(&by_type).unwrap(), InputFormat::CommaDelimited);

    let octet = InputDescriptor::new(
        Some("upload.csv".into()),
        Some("application/octet-stream".into()),
    );
    assert_eq!(detect_format(&octet).unwrap(), InputFormat::CommaDelimited);

    let mismatch = InputDescriptor::new(Some("upload.csv".into()), Some("image/png".into()));
    assert!(detect_format(&mismatch).unwrap_err().is_unsupported_format());

    let crossed = InputDescriptor::new(
        Some("upload.csv".into()),
        Some("text/tab-separated-values".into()),
    );
    assert!(detect_format(&crossed).unwrap_err().is_unsupported_format());

    let crossed = InputDescriptor::new(Some("upload.tsv".into()), Some("text/csv".into()));
    assert!(detect_format(&crossed).unwrap_err().is_unsupported_format());

    let plain = InputDescriptor::new(Some("upload.tsv".into()), Some("text/plain".into()));
    assert_eq!(detect_format(&plain).unwrap(), InputFormat::TabDelimited);

    assert_eq!(
        detect_format(&InputDescriptor::default()).unwrap(),
        InputFormat::CommaDelimited
    );
}

#[test]
fn time_series_enforces_alignment_and_order() {
    let err = TimeSeries::single_channel(vec![1.0, 2.0], vec![Some(1.0)]).unwrap_err();
    assert_eq!(err, SeriesError::LengthMismatch { times: 2, values: 1 });

    let err = TimeSeries::single_channel(vec![2.0, 1.0], vec![None, None]).unwrap_err();
    assert!(matches!(err, SeriesError::OutOfOrder { index: 1, .. }));

    let equal = TimeSeries::single_channel(vec![1.0, 1.0], vec![None, Some(3.0)]);
    assert!(equal.is_ok());
}

#[test]
fn to_dataframe_keeps_columns_aligned() {
    let series =
        TimeSeries::single_channel(vec![1.0, 2.0, 3.0], vec![Some(1.0), None, Some(3.0)])
            .unwrap();
    let df = series.to_dataframe().expect("dataframe");
    assert_eq!(df.height(), 3);
    let names: Vec<&str> = df
        .get_column_names()
        .into_iter()
        .map(|name| name.as_str())
        .collect();
    assert_eq!(names, vec!["time", DEFAULT_CHANNEL]);
    assert_eq!(df.column(DEFAULT_CHANNEL).unwrap().null_count(), 1);
}
