use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use covidcast_cli::{run_aggregate, run_pivot, AggregateOptions, InputSpec};
use covidcast_common::{Config, Layout, OutputFormat};

#[derive(Parser)]
#[command(name = "covidcast")]
#[command(about = "Combine, shift and reshape covidcast signals")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Combine signal files into one wide or long table
    Aggregate {
        /// Signal file, as `path`, `path=source:signal` or `path=source:signal:geo_type`
        #[arg(short, long = "input", required = true)]
        inputs: Vec<InputSpec>,

        /// Metadata file (covidcast_meta rows) to attach to the inputs
        #[arg(long)]
        meta: Option<PathBuf>,

        /// Comma-separated day shifts. Give once for all inputs, or once per input
        #[arg(long = "shift", allow_hyphen_values = true)]
        shifts: Vec<String>,

        /// Only use issues published on or before this date
        #[arg(long)]
        as_of: Option<NaiveDate>,

        /// wide or long (default from COVIDCAST_LAYOUT, else wide)
        #[arg(long)]
        layout: Option<Layout>,

        /// csv or json (default from COVIDCAST_OUTPUT_FORMAT, else csv)
        #[arg(long)]
        format: Option<OutputFormat>,

        /// Write here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Convert a JSON table written by `aggregate` to the other layout
    Pivot {
        #[arg(short, long)]
        input: PathBuf,

        /// Target layout: long or wide
        #[arg(long)]
        to: Layout,

        #[arg(long)]
        format: Option<OutputFormat>,

        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn main() -> ExitCode {
    let _ = dotenvy::dotenv();

    if let Err(e) = run() {
        eprintln!("Error: {:#}", e);
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn run() -> Result<()> {
    // Logs go to stderr so stdout stays clean for table output.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("covidcast=info".parse()?))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = Config::from_env()?;
    config.log_summary();

    match cli.command {
        Commands::Aggregate {
            inputs,
            meta,
            shifts,
            as_of,
            layout,
            format,
            output,
        } => {
            let options = AggregateOptions::resolve(
                &config, inputs, meta, &shifts, as_of, layout, format, output,
            )?;
            let result = run_aggregate(&options)?;
            info!(layout = %result.layout(), signals = result.meta().len(), "Aggregate complete");
        }
        Commands::Pivot {
            input,
            to,
            format,
            output,
        } => {
            run_pivot(
                &input,
                to,
                format.unwrap_or(config.output_format),
                output.as_deref(),
            )?;
        }
    }
    Ok(())
}
