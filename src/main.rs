//! # Prepline Command-Line Entry Point
//!
//! ```text
//! main()
//!   │
//!   ├─> Parse CLI arguments (clap)
//!   ├─> Load settings and install logging
//!   ├─> Create Tokio runtime
//!   └─> Execute command
//! ```
//!
//! Responses are printed to stdout as JSON. On failure the structured error
//! response is printed to stderr and the process exits non-zero.
//!
//! ```bash
//! prepline ingest data.csv
//! prepline transform --id <ID> --filename data.csv --output cleaned.csv
//! prepline configure --id <ID> --filename data.csv --fields-file form.json
//! ```

#![warn(clippy::all, rust_2018_idioms)]
#![expect(clippy::print_stdout, clippy::print_stderr)]

mod cli;

use anyhow::Result;
use clap::Parser as _;
use prepline::error::{ErrorKind, ErrorResponse, PreplineError};
use std::process::ExitCode;

fn main() -> ExitCode {
    let cli = cli::Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!("{err:#}");
            let response = error_response(&err);
            match serde_json::to_string_pretty(&response) {
                Ok(json) => eprintln!("{json}"),
                Err(_) => eprintln!("{}", response.message),
            }
            ExitCode::FAILURE
        }
    }
}

fn run(cli: cli::Cli) -> Result<()> {
    let config = cli::load_config(&cli)?;
    prepline::logging::init(config.log_dir.as_deref(), !cli.no_log_files)?;

    tokio::runtime::Runtime::new()?.block_on(cli::run_command(cli.command, config))
}

fn error_response(err: &anyhow::Error) -> ErrorResponse {
    match err.downcast_ref::<PreplineError>() {
        Some(inner) => ErrorResponse::from(inner),
        None => ErrorResponse {
            kind: ErrorKind::Internal,
            message: format!("{err:#}"),
        },
    }
}
