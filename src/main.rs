// Entrypoint for the CLI application.
// - Keeps `main` small: parse flags, set up logging, run one transfer.
// - Progress goes to stderr; stdout only carries the server's answer.

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::Context;
use clap::error::ErrorKind;
use clap::{CommandFactory, Parser};
use file_push::console::ConsoleObserver;
use file_push::{TransferConfig, TransferError, TransferPipeline, TransferRequest, TransferResult};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "file-push")]
#[command(about = "Upload a file to an HTTP endpoint as multipart/form-data")]
#[command(version)]
struct Cli {
    /// File to upload
    #[arg(long, env = "FILE_PUSH_FILE")]
    file: PathBuf,

    /// Destination URL (http or https)
    #[arg(long, env = "FILE_PUSH_URL")]
    url: String,

    /// Overall request timeout in seconds
    #[arg(long, default_value = "1800")]
    timeout_secs: u64,

    /// Log verbosity: debug, info, warn, error (RUST_LOG takes precedence)
    #[arg(long, default_value = "warn")]
    verbosity: String,

    /// Print the result as JSON to stdout instead of the raw body
    #[arg(long)]
    output_json: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    // clap's PathBuf parser already refuses an empty --file; --url is a
    // plain string, so an empty one is reported here with usage.
    if cli.url.trim().is_empty() {
        Cli::command()
            .error(
                ErrorKind::InvalidValue,
                "a value is required for '--url <URL>' but none was supplied",
            )
            .exit();
    }

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            match e.downcast_ref::<TransferError>() {
                Some(transfer) => eprintln!("{}", transfer.format_detailed()),
                None => eprintln!("Error: {e:#}"),
            }
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> anyhow::Result<()> {
    setup_logging(&cli.verbosity)?;

    let request = TransferRequest::new(&cli.file, &cli.url)?;
    let mut console = ConsoleObserver::new(request.destination_url());
    let config = TransferConfig {
        timeout: Duration::from_secs(cli.timeout_secs),
    };
    let pipeline = TransferPipeline::new(request, &config)?;

    let result = pipeline.run(&mut console)?;

    report(&result, cli.output_json)
}

/// Status goes to stderr, body (or JSON) to stdout. A non-2xx status is
/// reported, not turned into a failing exit code.
fn report(result: &TransferResult, as_json: bool) -> anyhow::Result<()> {
    eprintln!("\nResponse status: {}", result.status);
    if result.is_success() {
        eprintln!("Upload succeeded");
    } else {
        eprintln!("Upload failed");
    }

    if as_json {
        println!("{}", result.to_json().context("serializing result")?);
    } else {
        println!("{}", result.body_text());
    }
    Ok(())
}

fn setup_logging(verbosity: &str) -> anyhow::Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(verbosity.to_lowercase())
            .with_context(|| format!("invalid verbosity {verbosity:?}"))?,
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init()
        .map_err(|e| anyhow::anyhow!(e))
}
