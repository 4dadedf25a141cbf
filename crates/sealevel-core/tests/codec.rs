use chrono::NaiveDateTime;
use sealevel_core::codec::{
    calendar_to_serial, format_calendar, iso_to_serial, parse_calendar, serial_bounds,
    serial_to_calendar, serial_to_iso, CodecError,
};

fn parse_naive(ts: &str) -> NaiveDateTime {
    NaiveDateTime::parse_from_str(ts, "%Y-%m-%d %H:%M:%S").expect("parse timestamp")
}

#[test]
fn known_serial_days_decode_to_calendar_dates() {
    assert_eq!(serial_to_iso(738_000.0).unwrap(), "2020-07-28T00:00:00");
    assert_eq!(serial_to_iso(738_000.5).unwrap(), "2020-07-28T12:00:00");
    assert_eq!(serial_to_iso(730_486.0).unwrap(), "2000-01-01T00:00:00");
    assert_eq!(serial_to_iso(738_000.25 + 0.5 / 86_400.0).unwrap(), "2020-07-28T06:00:00.500");
}

#[test]
fn calendar_encodes_to_serial_days() {
    let serial = calendar_to_serial(parse_naive("2020-07-28 18:00:00")).unwrap();
    assert!((serial - 738_000.75).abs() < 1e-9);
}

#[test]
fn round_trip_is_stable_within_tolerance() {
    let samples = [
        657_438.0,
        700_000.123_456,
        719_529.0,
        738_000.041_7,
        738_000.999_4,
        745_000.333_333_333,
        serial_bounds().0,
        serial_bounds().1 - 1e-3,
    ];

    // Rounds up onto the exclusive upper bound.
    let (_, max) = serial_bounds();
    assert!(matches!(
        serial_to_calendar(max - 1e-9),
        Err(CodecError::OutOfRange { .. })
    ));
    assert!(matches!(
        serial_to_iso(max - 1e-9),
        Err(CodecError::OutOfRange { .. })
    ));

    for serial in samples {
        let calendar = serial_to_calendar(serial).unwrap();
        let reencoded = calendar_to_serial(calendar).unwrap();
        let again = serial_to_calendar(reencoded).unwrap();
        assert_eq!(again, calendar, "round trip drifted for {serial}");
        assert!(
            (reencoded - serial).abs() < 1e-6,
            "serial {serial} re-encoded as {reencoded}"
        );
    }
}

#[test]
fn hourly_grid_round_trips_without_sub_second_noise() {
    for hour in 0..48 {
        let serial = 738_000.0 + f64::from(hour) / 24.0;
        let text = serial_to_iso(serial).unwrap();
        assert!(!text.contains('.'), "unexpected fraction in {text}");
        let back = iso_to_serial(&text).unwrap();
        assert_eq!(serial_to_iso(back).unwrap(), text);
    }
}

#[test]
fn negative_epoch_is_rejected_not_clamped() {
    assert_eq!(serial_to_calendar(-5.0), Err(CodecError::Negative(-5.0)));
}

#[test]
fn non_finite_and_out_of_range_epochs_are_rejected() {
    assert!(matches!(
        serial_to_calendar(f64::NAN),
        Err(CodecError::NonFinite(_))
    ));
    assert!(matches!(
        serial_to_calendar(f64::INFINITY),
        Err(CodecError::NonFinite(_))
    ));
    assert!(matches!(
        serial_to_calendar(5.0),
        Err(CodecError::OutOfRange { .. })
    ));
    assert!(matches!(
        serial_to_calendar(10_000_000.0),
        Err(CodecError::OutOfRange { .. })
    ));
}

#[test]
fn parse_calendar_accepts_common_iso_spellings() {
    let expected = parse_naive("2020-07-28 12:00:00");
    assert_eq!(parse_calendar("2020-07-28T12:00:00").unwrap(), expected);
    assert_eq!(parse_calendar("2020-07-28 12:00:00").unwrap(), expected);
    assert_eq!(parse_calendar("2020-07-28T12:00").unwrap(), expected);
    assert_eq!(
        parse_calendar("2020-07-28").unwrap(),
        parse_naive("2020-07-28 00:00:00")
    );
    assert_eq!(
        format_calendar(&parse_calendar("2020-07-28T12:00:00.250").unwrap()),
        "2020-07-28T12:00:00.250"
    );
    assert!(matches!(
        parse_calendar("28/07/2020"),
        Err(CodecError::Unparseable(_))
    ));
}
