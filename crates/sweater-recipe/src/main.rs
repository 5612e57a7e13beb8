//! sweater-recipe - inspect and run the Sweater packaging recipe.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use sweater_recipe::{Recipe, ResolvedRecipe, Settings, TargetOs};

#[derive(Parser, Debug)]
#[command(name = "sweater-recipe", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the recipe as JSON
    Show {
        /// Also resolve requirements for this target OS
        #[arg(long)]
        os: Option<TargetOs>,
    },

    /// Print the requirements for a target OS, one per line
    Requirements {
        #[arg(long, env = "SWEATER_TARGET_OS")]
        os: TargetOs,
    },

    /// Copy the exported headers into a package folder
    Package {
        #[arg(long, default_value = ".")]
        source: PathBuf,
        #[arg(long)]
        dest: PathBuf,
    },

    /// Print the package id for a set of build settings
    PackageId {
        #[arg(long, env = "SWEATER_TARGET_OS")]
        os: TargetOs,
        #[arg(long)]
        arch: Option<String>,
        #[arg(long)]
        compiler: Option<String>,
        #[arg(long)]
        compiler_version: Option<String>,
        #[arg(long)]
        build_type: Option<String>,
    },

    /// Print the scm block with `auto` values resolved from a checkout
    Scm {
        #[arg(long, default_value = ".")]
        repo: PathBuf,
    },

    /// Write the CMake build info of an installed package
    Generate {
        #[arg(long)]
        package_root: PathBuf,
        #[arg(long, default_value = ".")]
        out: PathBuf,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let recipe = Recipe::sweater();

    match cli.command {
        Command::Show { os } => {
            let json = match os {
                Some(os) => serde_json::to_string_pretty(&ResolvedRecipe::new(&recipe, os)),
                None => serde_json::to_string_pretty(&recipe),
            }
            .context("failed to serialize recipe")?;
            println!("{json}");
        }
        Command::Requirements { os } => {
            for requirement in recipe.requirements(os) {
                println!("{requirement}");
            }
        }
        Command::Package { source, dest } => {
            let files = sweater_recipe::package(&recipe, &source, &dest).with_context(|| {
                format!("failed to package {} into {}", source.display(), dest.display())
            })?;
            println!("{}", files.len());
        }
        Command::PackageId {
            os,
            arch,
            compiler,
            compiler_version,
            build_type,
        } => {
            let settings = Settings {
                os: Some(os),
                arch,
                compiler,
                compiler_version,
                build_type,
            };
            println!("{}", sweater_recipe::package_id(&recipe, &settings));
        }
        Command::Scm { repo } => {
            let scm = recipe
                .scm
                .resolve(&repo)
                .with_context(|| format!("failed to resolve scm from {}", repo.display()))?;
            println!("{}", serde_json::to_string_pretty(&scm)?);
        }
        Command::Generate { package_root, out } => {
            for generator in &recipe.generators {
                let path = generator
                    .write(&recipe, &package_root, &out)
                    .with_context(|| format!("failed to run the {generator} generator"))?;
                println!("{}", path.display());
            }
        }
    }

    Ok(())
}
