//! Expand command - Write the expanded blueprint to a file.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use tracing::info;

use hpck_config::BlueprintWriter;

use super::blueprint::{load_and_expand, BlueprintArgs};

#[derive(Args)]
pub struct ExpandArgs {
    #[command(flatten)]
    pub blueprint: BlueprintArgs,

    /// Output file for the expanded blueprint
    #[arg(short, long, default_value = "expanded.yaml")]
    pub out: PathBuf,
}

pub fn execute(args: ExpandArgs) -> Result<()> {
    info!("Expanding blueprint: {:?}", args.blueprint.blueprint);

    let bp = load_and_expand(&args.blueprint)?;
    BlueprintWriter::write_blueprint(&bp, &args.out)
        .with_context(|| format!("Failed to write expanded blueprint to {:?}", args.out))?;

    println!("Expanded blueprint written to {:?}", args.out);
    Ok(())
}
