use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use comfy_table::Table;
use polars::prelude::ChunkAgg;
use sealevel_core::codec::serial_to_iso;
use sealevel_core::config::PipelineConfig;
use sealevel_core::outputs::OutputArtifact;
use sealevel_core::{Cadence, OutputEpoch, Pipeline, PipelineError};
use sealevel_parser::{parse_series_file, InputDescriptor, TimeSeries};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about = "Sea-level series conversion tooling", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Quality-control a two-column series and write it at the requested cadence and epoch
    Convert(ConvertArgs),
    /// Parse a two-column series and print a summary table
    Inspect(InspectArgs),
}

#[derive(Args, Debug)]
struct ConvertArgs {
    /// Headerless `time,value` file with serial day numbers in the first column
    input: PathBuf,
    /// Output cadence: hourly or daily
    #[arg(long)]
    cadence: Option<Cadence>,
    /// Output time encoding: matlab or datetime
    #[arg(long)]
    epoch: Option<OutputEpoch>,
    /// Station latitude in degrees, used by the daily filter
    #[arg(long, allow_hyphen_values = true)]
    latitude: Option<f64>,
    /// Destination file (defaults to `<input stem>_<cadence>.csv` next to the input)
    #[arg(short, long)]
    output: Option<PathBuf>,
    /// TOML configuration file
    #[arg(long)]
    config: Option<PathBuf>,
    /// Text written in place of missing values
    #[arg(long)]
    missing_marker: Option<String>,
    /// Print the run summary as JSON on stdout
    #[arg(long)]
    summary: bool,
}

#[derive(Args, Debug)]
struct InspectArgs {
    /// Headerless `time,value` file with serial day numbers in the first column
    input: PathBuf,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .json()
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Command::Convert(args) => handle_convert(args),
        Command::Inspect(args) => handle_inspect(args),
    };

    if let Err(err) = &result {
        report_failure(err);
    }
    result
}

fn report_failure(err: &anyhow::Error) {
    match err.chain().find_map(|cause| cause.downcast_ref::<PipelineError>()) {
        Some(pipeline_err) => error!(
            kind = ?pipeline_err.kind(),
            stage = %pipeline_err.stage(),
            error = %pipeline_err,
            "conversion failed"
        ),
        None => error!(error = %err, "command failed"),
    }
}

fn load_config(path: Option<&Path>) -> Result<PipelineConfig> {
    dotenvy::dotenv().ok();

    let mut config = match path {
        Some(path) => PipelineConfig::load(path)?,
        None => PipelineConfig::default(),
    };
    config.apply_env()?;
    Ok(config)
}

fn read_series(input: &Path) -> Result<TimeSeries> {
    let bytes =
        fs::read(input).with_context(|| format!("failed to read {}", input.display()))?;
    let descriptor = InputDescriptor::from_path(input);
    let series = parse_series_file(&bytes, &descriptor)
        .map_err(PipelineError::from)
        .with_context(|| format!("failed to parse {}", input.display()))?;
    Ok(series)
}

fn default_output_path(input: &Path, cadence: Cadence) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| "sealevel".to_string());
    input.with_file_name(format!("{stem}_{cadence}.csv"))
}

fn scratch_dir(config: &PipelineConfig, dest: &Path) -> PathBuf {
    config
        .output
        .scratch_dir
        .clone()
        .or_else(|| dest.parent().map(Path::to_path_buf))
        .filter(|dir| !dir.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from("."))
}

fn handle_convert(args: ConvertArgs) -> Result<()> {
    let config = load_config(args.config.as_deref())?;

    let mut options = config.pipeline_options()?;
    if let Some(cadence) = args.cadence {
        options.cadence = cadence;
    }
    if let Some(epoch) = args.epoch {
        options.epoch = epoch;
    }
    if let Some(latitude) = args.latitude {
        options.latitude = latitude;
    }
    options.validate()?;

    let mut format = config.output_format();
    if let Some(marker) = args.missing_marker {
        format.missing_marker = marker;
    }

    let series = read_series(&args.input)?;
    let run = Pipeline::new(options).run(&series)?;

    let dest = args
        .output
        .unwrap_or_else(|| default_output_path(&args.input, run.series.cadence));
    let artifact = OutputArtifact::write(&scratch_dir(&config, &dest), &run.series, &format)?;
    let rows = artifact.rows();
    let written = artifact
        .persist(&dest)
        .with_context(|| format!("failed to write {}", dest.display()))?;

    info!(
        output = %written.display(),
        rows,
        cadence = %run.summary.cadence,
        epoch = %run.summary.epoch,
        "conversion complete"
    );

    if args.summary {
        println!("{}", serde_json::to_string_pretty(&run.summary)?);
    }

    Ok(())
}

fn handle_inspect(args: InspectArgs) -> Result<()> {
    let series = read_series(&args.input)?;

    let calendar = |serial: Option<f64>| match serial {
        Some(value) => serial_to_iso(value).unwrap_or_else(|err| format!("invalid ({err})")),
        None => "-".to_string(),
    };
    let serial = |value: Option<f64>| value.map_or_else(|| "-".to_string(), |v| v.to_string());

    let frame = series
        .to_dataframe()
        .context("failed to build a data frame from the series")?;
    let readings = frame.column(&series.channel)?.f64()?;
    let stat = |value: Option<f64>| value.map_or_else(|| "-".to_string(), |v| format!("{v:.3}"));

    let mut table = Table::new();
    table.set_header(vec!["field", "value"]);
    table.add_row(vec!["file".to_string(), args.input.display().to_string()]);
    table.add_row(vec!["station".to_string(), series.station_id.clone()]);
    table.add_row(vec!["channel".to_string(), series.channel.clone()]);
    table.add_row(vec!["blake3".to_string(), series.file_hash.clone()]);
    table.add_row(vec!["rows".to_string(), series.len().to_string()]);
    table.add_row(vec!["missing".to_string(), readings.null_count().to_string()]);
    table.add_row(vec!["min value".to_string(), stat(readings.min())]);
    table.add_row(vec!["max value".to_string(), stat(readings.max())]);
    table.add_row(vec!["mean value".to_string(), stat(readings.mean())]);
    table.add_row(vec!["first serial".to_string(), serial(series.first_time())]);
    table.add_row(vec!["last serial".to_string(), serial(series.last_time())]);
    table.add_row(vec!["first instant".to_string(), calendar(series.first_time())]);
    table.add_row(vec!["last instant".to_string(), calendar(series.last_time())]);
    if let Some(spacing) = median_spacing_hours(series.times()) {
        table.add_row(vec!["median spacing (h)".to_string(), format!("{spacing:.3}")]);
    }

    println!("{table}");
    Ok(())
}

fn median_spacing_hours(times: &[f64]) -> Option<f64> {
    let mut gaps: Vec<f64> = times.windows(2).map(|w| (w[1] - w[0]) * 24.0).collect();
    if gaps.is_empty() {
        return None;
    }
    gaps.sort_by(|a, b| a.total_cmp(b));
    Some(gaps[gaps.len() / 2])
}
