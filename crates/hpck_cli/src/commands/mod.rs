//! CLI command definitions.
//!
//! `expand` and `create` share the blueprint loading options in
//! [`blueprint::BlueprintArgs`].

use clap::{Parser, Subcommand};

pub mod blueprint;
pub mod create;
pub mod expand;

/// hpck - blueprint compiler for HPC deployments
#[derive(Parser)]
#[command(name = "hpck")]
#[command(version, about = "hpck - blueprint compiler for HPC deployments")]
#[command(long_about = r#"
hpck expands a deployment blueprint into a fully resolved one and prepares a
deployment directory for it.

COMMANDS:
  expand   → Expand a blueprint and write the result to a file
  create   → Expand a blueprint and create a deployment directory

EXIT CODES:
  0 - Success
  1 - General error
  2 - Invalid arguments
  3 - Validation failure
  4 - Blueprint error
  5 - Deployment error
"#)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Expand a blueprint into a fully resolved blueprint
    Expand(expand::ExpandArgs),

    /// Create a new deployment from a blueprint
    Create(create::CreateArgs),
}
