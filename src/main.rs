// src/main.rs

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use localrepo::{LocalImporter, LocalRepoConfig, RepositoryFormat, Target};
use std::path::PathBuf;
use tracing::info;

#[derive(Parser)]
#[command(name = "localrepo")]
#[command(author, version, about = "Import built packages into local apt and RPM repositories", long_about = None)]
struct Cli {
    /// Path to a TOML configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Repository base directory (overrides the configuration)
    #[arg(long, global = true)]
    repo_base: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create empty repository metadata for one or more targets
    Init {
        /// Targets as os:codename:arch (e.g. ubuntu:noble:amd64)
        #[arg(required = true, value_parser = parse_target)]
        targets: Vec<Target>,
    },

    /// Import the source package of one build
    ImportSource {
        /// Operating system name (e.g. ubuntu, fedora)
        os_name: String,

        /// OS codename or release version
        os_code_name: String,

        /// Build artifact directory
        artifact_path: PathBuf,
    },

    /// Import the binary packages of one build
    ImportBinary {
        /// Operating system name (e.g. ubuntu, fedora)
        os_name: String,

        /// OS codename or release version
        os_code_name: String,

        /// Package architecture
        arch: String,

        /// Build artifact directory
        artifact_path: PathBuf,
    },

    /// Show the repository format used for an operating system
    Engine {
        /// Operating system name
        os_name: String,

        /// Also print the installer URL below this base URL
        #[arg(long)]
        base_url: Option<String>,
    },
}

fn parse_target(value: &str) -> std::result::Result<Target, String> {
    match value.split(':').collect::<Vec<_>>().as_slice() {
        [os, code, arch] if !os.is_empty() && !code.is_empty() && !arch.is_empty() => {
            Ok(Target::new(os, code, arch))
        }
        _ => Err(format!("expected os:codename:arch, got '{}'", value)),
    }
}

fn load_config(cli: &Cli) -> Result<LocalRepoConfig> {
    let mut config = match &cli.config {
        Some(path) => LocalRepoConfig::load(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display()))?,
        None => LocalRepoConfig::default(),
    };
    if let Some(base) = &cli.repo_base {
        config.repository.base = base.clone();
    }
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing subscriber for logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli)?;

    match cli.command {
        Commands::Init { targets } => {
            let importer = LocalImporter::new(config);
            info!("Initializing {} target(s) under {:?}", targets.len(), importer.base());
            importer.initialize_targets(&targets).await?;
            println!("Initialized {} target(s)", targets.len());
            Ok(())
        }
        Commands::ImportSource {
            os_name,
            os_code_name,
            artifact_path,
        } => {
            let importer = LocalImporter::new(config);
            importer
                .import_source(&os_name, &os_code_name, &artifact_path)
                .await
                .with_context(|| format!("Source import from {} failed", artifact_path.display()))
        }
        Commands::ImportBinary {
            os_name,
            os_code_name,
            arch,
            artifact_path,
        } => {
            let importer = LocalImporter::new(config);
            importer
                .import_binary(&os_name, &os_code_name, &arch, &artifact_path)
                .await
                .with_context(|| format!("Binary import from {} failed", artifact_path.display()))
        }
        Commands::Engine { os_name, base_url } => {
            let Some(format) = RepositoryFormat::for_os(&os_name) else {
                anyhow::bail!("No local repository support for {}", os_name);
            };
            println!("{}", format);
            if let Some(base_url) = base_url {
                println!("{}", format.repository_url(&base_url, &os_name));
            }
            Ok(())
        }
    }
}
