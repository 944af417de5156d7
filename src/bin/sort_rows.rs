//! CLI driver: parses rows from one or more CSV files, sorts and
//! dedups them by a compound key, and writes either a sorted CSV or a
//! PostgreSQL COPY BINARY file.
//!
//! Generalizes the teacher crate's `examples/sort_text_file.rs` into a
//! real `clap`-based binary; progress logging follows the teacher's
//! `log`/`simple_logger` pairing.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{bail, Context};
use clap::{Parser, ValueEnum};
use log::{error, info};
use row_sort::sorter::Sorter;
use row_sort::validation::{ColumnRule, Rule};

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Copy,
    Csv,
}

/// Sort and dedup tabular rows by a compound key, with optional PostgreSQL
/// COPY BINARY output.
#[derive(Parser, Debug)]
#[command(name = "sort-rows", version)]
struct Args {
    /// Input CSV file. May be given more than once.
    #[arg(long = "input", required = true)]
    inputs: Vec<PathBuf>,

    /// Comma-separated 0-based key column indices, e.g. "0,2".
    #[arg(long)]
    key: String,

    /// Output path.
    #[arg(long)]
    output: PathBuf,

    /// Output format.
    #[arg(long, value_enum, default_value_t = OutputFormat::Copy)]
    format: OutputFormat,

    /// Optional "lon_col,lat_col" geo column indices.
    #[arg(long)]
    geo: Option<String>,

    /// Soft in-memory buffer cap, in megabytes.
    #[arg(long = "buffer-mb", default_value_t = 100)]
    buffer_mb: u64,

    /// Per-digest retention cap in dedupe mode.
    #[arg(long = "max-per-key", default_value_t = 200)]
    max_per_key: usize,

    /// Opaque source id, carried through into the COPY output.
    #[arg(long = "source-id", default_value = "")]
    source_id: String,

    /// Opaque source key, reflected in COPY BINARY column 1.
    #[arg(long = "source-key", default_value = "")]
    source_key: String,

    /// Optional path for the CSV validation error log.
    #[arg(long = "error-log")]
    error_log: Option<PathBuf>,

    /// Per-column validation rules: comma-separated "none|url|protocol".
    #[arg(long = "validate")]
    validate: Option<String>,
}

fn parse_columns(spec: &str) -> anyhow::Result<Vec<usize>> {
    spec.split(',')
        .map(|s| s.trim().parse::<usize>().with_context(|| format!("invalid column index '{s}'")))
        .collect()
}

fn parse_geo(spec: &str) -> anyhow::Result<[usize; 2]> {
    let cols = parse_columns(spec)?;
    match cols.as_slice() {
        [lon, lat] => Ok([*lon, *lat]),
        _ => bail!("--geo requires exactly two columns: lon,lat"),
    }
}

fn parse_validation(spec: &str) -> anyhow::Result<Vec<ColumnRule>> {
    spec.split(',')
        .map(|s| match s.trim() {
            "none" | "" => Ok(ColumnRule::new(Rule::None)),
            "url" => Ok(ColumnRule::new(Rule::Url)),
            "protocol" => Ok(ColumnRule::new(Rule::Protocol)),
            other => bail!("unknown validation rule '{other}'"),
        })
        .collect()
}

fn run(args: Args) -> anyhow::Result<()> {
    let key_columns = parse_columns(&args.key)?;
    let geo_columns = args.geo.as_deref().map(parse_geo).transpose()?;

    let mut sorter = Sorter::with_buffer_mb(
        args.source_id,
        args.source_key,
        key_columns,
        geo_columns,
        args.buffer_mb,
    );
    sorter.with_max_records_per_key(args.max_per_key);

    if let Some(spec) = &args.validate {
        let rules = parse_validation(spec)?;
        sorter.set_validation_schema(rules).context("installing validation schema")?;
    }
    if let Some(path) = &args.error_log {
        sorter.with_error_log(path.clone()).context("opening error log")?;
    }

    for input in &args.inputs {
        info!("reading {}", input.display());
        sorter.add_file(input).with_context(|| format!("reading {}", input.display()))?;
    }

    let stats = sorter.sort().context("sorting rows")?;
    info!(
        "sorted {} rows ({} processed, {} url failures, {} protocol failures)",
        stats.total_rows, stats.total_rows_processed, stats.failed_url_error_count, stats.failed_protocol_error_count
    );

    match args.format {
        OutputFormat::Copy => {
            sorter.write_binary_postgres_file(&args.output).context("writing COPY BINARY output")?;
        }
        OutputFormat::Csv => {
            let file = std::fs::File::create(&args.output).context("creating output file")?;
            let mut writer = csv::Writer::from_writer(file);
            for batch in sorter.each_batch(1000).context("iterating sorted output")? {
                for (_digest, row) in batch? {
                    writer.write_record(&row)?;
                }
            }
            writer.flush()?;
        }
    }

    Ok(())
}

fn main() -> ExitCode {
    simple_logger::SimpleLogger::new().init().ok();

    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::from(1);
        }
    };

    match run(args) {
        Ok(()) => ExitCode::from(0),
        Err(err) => {
            error!("{err:#}");
            ExitCode::from(2)
        }
    }
}
