use std::collections::HashMap;
use std::path::PathBuf;

use sealevel_core::config::{
    PipelineConfig, ENV_CADENCE, ENV_EPOCH, ENV_LATITUDE, ENV_MISSING_MARKER, ENV_SCRATCH_DIR,
    ENV_SENTINEL_MAX_DIGITS,
};
use sealevel_core::sentinel::SentinelPolicy;
use sealevel_core::{Cadence, ErrorKind, OutputEpoch};

fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let map: HashMap<String, String> = vars
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    move |key| map.get(key).cloned()
}

#[test]
fn defaults_match_pipeline_defaults() {
    let config = PipelineConfig::default();
    let options = config.pipeline_options().unwrap();

    assert_eq!(options.cadence, Cadence::Hourly);
    assert_eq!(options.epoch, OutputEpoch::Matlab);
    assert_eq!(options.sentinel, SentinelPolicy::default());
    assert_eq!(options.min_hours_per_day, 12);
    assert_eq!(config.output_format().missing_marker, "NaN");
}

#[test]
fn toml_sections_are_optional_and_layered() {
    let config = PipelineConfig::from_toml_str(
        r#"
        [pipeline]
        cadence = "daily"
        epoch = "datetime"
        latitude = 21.3

        [sentinel]
        max_digits = 5
        "#,
    )
    .unwrap();

    let options = config.pipeline_options().unwrap();
    assert_eq!(options.cadence, Cadence::Daily);
    assert_eq!(options.epoch, OutputEpoch::Datetime);
    assert_eq!(options.latitude, 21.3);
    assert_eq!(options.sentinel, SentinelPolicy::new(3, 5).unwrap());
    assert_eq!(config.output.missing_marker, "NaN");
}

#[test]
fn epoch_aliases_are_accepted_in_toml() {
    let config = PipelineConfig::from_toml_str("[pipeline]\nepoch = \"iso\"\n").unwrap();
    assert_eq!(config.pipeline.epoch, OutputEpoch::Datetime);
}

#[test]
fn unknown_selectors_are_rejected() {
    let err = PipelineConfig::from_toml_str("[pipeline]\ncadence = \"weekly\"\n").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Config);

    let mut config = PipelineConfig::default();
    let err = config
        .apply_env_from(lookup(&[(ENV_EPOCH, "julian")]))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Config);
    assert!(err.to_string().contains(ENV_EPOCH));
}

#[test]
fn environment_overrides_file_values() {
    let mut config = PipelineConfig::from_toml_str(
        "[pipeline]\ncadence = \"hourly\"\n[output]\nmissing_marker = \"-\"\n",
    )
    .unwrap();

    config
        .apply_env_from(lookup(&[
            (ENV_CADENCE, "Daily"),
            (ENV_LATITUDE, " -33.9 "),
            (ENV_MISSING_MARKER, "NA"),
            (ENV_SCRATCH_DIR, "/var/tmp/sealevel"),
        ]))
        .unwrap();

    assert_eq!(config.pipeline.cadence, Cadence::Daily);
    assert_eq!(config.pipeline.latitude, -33.9);
    assert_eq!(config.output_format().missing_marker, "NA");
    assert_eq!(
        config.output.scratch_dir,
        Some(PathBuf::from("/var/tmp/sealevel"))
    );
}

#[test]
fn invalid_sentinel_width_surfaces_as_config_error() {
    let mut config = PipelineConfig::default();
    config
        .apply_env_from(lookup(&[(ENV_SENTINEL_MAX_DIGITS, "2")]))
        .unwrap();

    let err = config.pipeline_options().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Config);
}

#[test]
fn unparsable_numbers_are_reported() {
    let mut config = PipelineConfig::default();
    let err = config
        .apply_env_from(lookup(&[(ENV_LATITUDE, "north")]))
        .unwrap_err();
    assert!(err.to_string().contains(ENV_LATITUDE));
}

#[test]
fn out_of_range_latitude_is_rejected_for_hourly_runs() {
    let mut config = PipelineConfig::default();
    config
        .apply_env_from(lookup(&[(ENV_CADENCE, "hourly"), (ENV_LATITUDE, "500")]))
        .unwrap();

    let err = config.pipeline_options().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Config);
    assert!(err.to_string().contains("latitude"));
}
