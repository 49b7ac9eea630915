//! Create command - Create a deployment directory from a blueprint.

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use tracing::info;

use hpck_deploy::{check_overwrite_allowed, deployment_dir, write_deployment_metadata};

use super::blueprint::{load_and_expand, BlueprintArgs};

#[derive(Args)]
pub struct CreateArgs {
    #[command(flatten)]
    pub blueprint: BlueprintArgs,

    /// Directory in which the deployment directory is created
    #[arg(short, long, default_value = ".")]
    pub out: PathBuf,

    /// Overwrite an existing deployment directory of the same version
    #[arg(short = 'w', long = "overwrite-deployment")]
    pub overwrite: bool,

    /// Overwrite an existing deployment directory without any checks (implies -w)
    #[arg(long)]
    pub force: bool,
}

pub fn execute(args: CreateArgs) -> Result<()> {
    info!("Creating deployment from: {:?}", args.blueprint.blueprint);

    let bp = load_and_expand(&args.blueprint)?;
    let depl_dir = deployment_dir(&args.out, &bp)?;
    check_overwrite_allowed(&depl_dir, &bp, args.overwrite, args.force)?;
    write_deployment_metadata(&bp, &depl_dir)?;

    println!("Deployment {:?} created successfully!", bp.deployment_name()?);
    println!();
    println!("Location: {:?}", depl_dir);
    Ok(())
}
