//! hpck CLI - Main entry point.
//!
//! Exit codes:
//! - 0: Success
//! - 1: General error
//! - 2: Invalid arguments
//! - 3: Validation failure
//! - 4: Blueprint error
//! - 5: Deployment error

use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use hpck_config::{ConfigError, Errors};
use hpck_deploy::DeployError;
use hpck_policy::PolicyError;

mod commands;

use commands::{Cli, Commands};

/// CI-friendly exit codes
pub struct ExitCodes;

impl ExitCodes {
    pub const SUCCESS: u8 = 0;
    pub const GENERAL_ERROR: u8 = 1;
    pub const INVALID_ARGS: u8 = 2;
    pub const VALIDATION_FAILURE: u8 = 3;
    pub const BLUEPRINT_ERROR: u8 = 4;
    pub const DEPLOYMENT_ERROR: u8 = 5;
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = init_logging(cli.verbose, cli.quiet) {
        eprintln!("Warning: logging not initialized: {}", e);
    }

    let result = match cli.command {
        Commands::Expand(args) => commands::expand::execute(args),
        Commands::Create(args) => commands::create::execute(args),
    };

    match result {
        Ok(()) => ExitCode::from(ExitCodes::SUCCESS),
        Err(e) => {
            let exit_code = categorize_error(&e);
            eprintln!("Error: {:#}", e);
            if let Some(hint) = e.downcast_ref::<DeployError>().and_then(DeployError::hint) {
                eprintln!("Hint: {}", hint);
            }
            ExitCode::from(exit_code)
        }
    }
}

/// Log filter used when `RUST_LOG` is not set.
fn default_filter(verbose: bool, quiet: bool) -> &'static str {
    if verbose {
        "hpck=debug,warn"
    } else if quiet {
        "warn"
    } else {
        "hpck=info,warn"
    }
}

fn init_logging(verbose: bool, quiet: bool) -> Result<(), tracing_subscriber::util::TryInitError> {
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false))
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(default_filter(verbose, quiet))),
        )
        .try_init()
}

/// Categorize error to determine exit code
fn categorize_error(e: &anyhow::Error) -> u8 {
    for cause in e.chain() {
        if let Some(err) = cause.downcast_ref::<PolicyError>() {
            return match err {
                PolicyError::InvalidValidationLevel(_) => ExitCodes::INVALID_ARGS,
                _ => ExitCodes::VALIDATION_FAILURE,
            };
        }
        if cause.is::<DeployError>() {
            return ExitCodes::DEPLOYMENT_ERROR;
        }
        if let Some(err) = cause.downcast_ref::<ConfigError>() {
            return match err {
                ConfigError::InputValue { .. } => ExitCodes::INVALID_ARGS,
                ConfigError::Io(_) => ExitCodes::GENERAL_ERROR,
                _ => ExitCodes::BLUEPRINT_ERROR,
            };
        }
        if cause.is::<Errors>() {
            return ExitCodes::BLUEPRINT_ERROR;
        }
    }
    ExitCodes::GENERAL_ERROR
}
