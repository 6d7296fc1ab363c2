use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use csv_db_loader::execution::{Dispatcher, LogRunObserver, RunOptions, DEFAULT_FILE_PATTERN, DEFAULT_WORKERS};
use csv_db_loader::ingestion::{LoadOptions, LogObserver, DEFAULT_BATCH_SIZE};

#[derive(Parser)]
#[command(author, version, about = "Load a directory of CSV files into per-file SQLite databases", long_about = None)]
struct Cli {
    /// Directory containing the source files
    #[arg(long, short, env = "CSV2DB_INPUT", default_value = ".")]
    input: PathBuf,
    /// Directory receiving one `<name>.db` per source file
    #[arg(long, short, env = "CSV2DB_OUTPUT", default_value = "./output")]
    output: PathBuf,
    /// Append-only log of failed files (two lines per failure)
    #[arg(long, env = "CSV2DB_ERROR_LOG", default_value = "./errors.txt")]
    error_log: PathBuf,
    /// Worker threads
    #[arg(long, short, env = "CSV2DB_WORKERS", default_value_t = DEFAULT_WORKERS)]
    workers: usize,
    /// Source rows per batch
    #[arg(long, env = "CSV2DB_BATCH_SIZE", default_value_t = DEFAULT_BATCH_SIZE)]
    batch_size: usize,
    /// Glob matched against file names in the input directory
    #[arg(long, env = "CSV2DB_PATTERN", default_value = DEFAULT_FILE_PATTERN)]
    pattern: String,
    /// Print the run summary as JSON on stdout
    #[arg(long)]
    json: bool,
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let dispatcher = Dispatcher::new(RunOptions {
        workers: cli.workers,
        file_pattern: cli.pattern,
        load: LoadOptions {
            batch_size: cli.batch_size,
            ..Default::default()
        },
        observer: Some(Arc::new(LogObserver)),
        run_observer: Some(Arc::new(LogRunObserver)),
        ..Default::default()
    })
    .context("invalid configuration")?;

    let summary = dispatcher
        .run(&cli.input, &cli.output, &cli.error_log)
        .context("run setup failed")?;

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        println!("{summary}");
    }
    Ok(())
}
