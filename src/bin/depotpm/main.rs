//! Thin CLI front end over [`depotpm::context::Context`] (`spec.md` §6).

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use depotpm::context::{default_depot_root, Context};
use depotpm::depot::Depot;
use depotpm::error::Error;
use depotpm::resolver::PreservationLevel;
use depotpm::version::{parse_version, Version};
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "depotpm", version, about = "Resolve and install declared package dependencies")]
struct Cli {
    /// Path to the Project file.
    #[arg(long, global = true, default_value = "Project.toml")]
    project: PathBuf,

    /// Path to the Manifest file.
    #[arg(long, global = true, default_value = "Manifest.toml")]
    manifest: PathBuf,

    /// The host-language release resolution should target.
    #[arg(long, global = true)]
    host_version: Option<String>,

    /// Compute what would change without writing any file.
    #[arg(long, global = true)]
    preview: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Resolve dependencies and write the manifest, preserving as much of
    /// the existing manifest as possible.
    Resolve,
    /// Add a dependency to the project, then resolve.
    Add { name: String, uuid: Uuid },
    /// Remove a dependency from the project, then resolve.
    Rm { name: String },
    /// Re-resolve ignoring the existing manifest (upgrade everything).
    Up,
    /// Install every manifest entry into the package store.
    Instantiate,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    match run(Cli::parse()) {
        Ok(()) => ExitCode::from(0),
        Err(Error::Interrupted) => ExitCode::from(130),
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::from(1)
        }
    }
}

fn run(cli: Cli) -> depotpm::Result<()> {
    let host_version = match &cli.host_version {
        Some(s) => parse_version(s)?,
        None => current_host_version(),
    };

    let depot = Depot::from_env(&default_depot_root());
    let mut ctx = Context::load(cli.project.clone(), cli.manifest.clone(), host_version, depot, cli.preview)?;

    match cli.command {
        Command::Resolve => {
            ctx.resolve(&[], PreservationLevel::Tiered)?;
        }
        Command::Add { name, uuid } => {
            ctx.project.deps.insert(name, uuid);
            if !ctx.preview {
                ctx.project.save(&ctx.project_path)?;
            }
            ctx.resolve(&[], PreservationLevel::Tiered)?;
        }
        Command::Rm { name } => {
            ctx.project.deps.shift_remove(&name);
            ctx.project.compat.shift_remove(&name);
            if !ctx.preview {
                ctx.project.save(&ctx.project_path)?;
            }
            ctx.resolve(&[], PreservationLevel::Tiered)?;
        }
        Command::Up => {
            ctx.resolve(&[], PreservationLevel::None)?;
        }
        Command::Instantiate => {
            ctx.instantiate()?;
        }
    }

    Ok(())
}

fn current_host_version() -> Version {
    Version::new(1, 0, 0)
}
