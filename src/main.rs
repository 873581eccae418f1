use std::io;
use std::process::ExitCode;

use clap::Parser;
use samlsts::cli::Cli;
use tracing::{Level, subscriber};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = init_logging(cli.verbose) {
        eprintln!("Failed to initialize logging: {e}");
        return ExitCode::FAILURE;
    }

    match cli.execute().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            // {:#} keeps the stage context and the IdP/STS cause on one line
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

/// Our own events at the level chosen by `-v`; dependencies stay at WARN
/// until -vvv so SDK and HTTP chatter does not drown the flow.
fn filter_directive(verbose: u8) -> String {
    let level = match verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };
    let dependencies = if verbose >= 3 { Level::DEBUG } else { Level::WARN };
    format!("{dependencies},samlsts={level}")
}

fn init_logging(verbose: u8) -> anyhow::Result<()> {
    // RUST_LOG wins over -v
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter_directive(verbose)));

    // stdout carries `auth --env` / `env` exports meant for eval
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(verbose >= 2)
        .with_file(verbose >= 3)
        .with_line_number(verbose >= 3)
        .compact()
        .finish();

    subscriber::set_global_default(subscriber)?;

    Ok(())
}
