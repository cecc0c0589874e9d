use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use project_bootstrap::config::BootstrapConfig;
use project_bootstrap::{
    build_archive, init_telemetry, BuildOrchestrator, BuildRequest, LocalWorkflowEngine, Origin,
};

#[derive(Parser)]
#[command(name = "project-bootstrap")]
#[command(about = "Generate business application projects through a workflow engine")]
#[command(long_about = "project-bootstrap starts the project generation workflow, waits for it \
                       to finish and hands back the packaged project as a zip archive. Get started \
                       with 'project-bootstrap generate'.")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a project and write its archive
    Generate {
        /// Project name
        #[arg(long, help = "Project name, also the archive file name")]
        name: Option<String>,
        /// Java package name
        #[arg(long = "package", help = "Base package of the generated sources")]
        package_name: Option<String>,
        /// KIE version of the generated project
        #[arg(long, help = "KIE version, e.g. 7.59.0.Final")]
        version: Option<String>,
        /// Module options (kjar, model, service, dkjar)
        #[arg(long = "option", help = "Module to generate; repeat for several")]
        options: Vec<String>,
        /// Capabilities (bpm, brm, planner)
        #[arg(long = "capability", help = "Application capability; repeat for several")]
        capabilities: Vec<String>,
        /// Build as a REST client instead of an interactive download
        #[arg(long, help = "Use the rest generation type")]
        rest: bool,
        /// Directory the archive is written to
        #[arg(long, default_value = ".", help = "Output directory for the archive")]
        output: PathBuf,
    },
    /// Pack a directory into a zip archive
    Archive {
        /// Directory to pack
        source: PathBuf,
        /// Archive file to create
        destination: PathBuf,
    },
    /// Print or save the effective configuration
    Config {
        /// Write the configuration as TOML to this path
        #[arg(long, help = "Save the effective configuration to a file")]
        write: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    BootstrapConfig::load_env_file()?;
    let config = BootstrapConfig::load()?;
    init_telemetry(&config.observability)?;

    match cli.command {
        Commands::Generate {
            name,
            package_name,
            version,
            options,
            capabilities,
            rest,
            output,
        } => {
            let origin = if rest { Origin::Rest } else { Origin::Web };
            let mut request = BuildRequest::new(origin);
            request.name = name;
            request.package_name = package_name;
            request.version = version;
            if !options.is_empty() {
                request = request.with_options(options);
            }
            if !capabilities.is_empty() {
                request = request.with_capabilities(capabilities);
            }

            tokio::runtime::Runtime::new()?
                .block_on(async { generate_command(config, request, &output).await })
        }
        Commands::Archive {
            source,
            destination,
        } => archive_command(&source, &destination),
        Commands::Config { write } => config_command(&config, write.as_deref()),
    }
}

async fn generate_command(
    config: BootstrapConfig,
    request: BuildRequest,
    output: &Path,
) -> Result<()> {
    let archive_name = request
        .clone()
        .normalize(&config.generation.default_version)
        .archive_file_name();

    println!("🛠️  Generating {}...", archive_name);

    let engine = Arc::new(LocalWorkflowEngine::new(&config.engine));
    let orchestrator = BuildOrchestrator::new(config, engine);

    let artifact = match orchestrator.build(request).await {
        Ok(artifact) => artifact,
        Err(e) => {
            orchestrator.metrics().log_stats();
            return Err(e).context("project generation failed");
        }
    };

    tokio::fs::create_dir_all(output)
        .await
        .with_context(|| format!("failed to create {}", output.display()))?;
    let target = output.join(&archive_name);
    tokio::fs::write(&target, &artifact.bytes)
        .await
        .with_context(|| format!("failed to write {}", target.display()))?;

    println!("✅ Wrote {} ({} bytes)", target.display(), artifact.bytes.len());
    if let Some(header) = artifact.content_disposition() {
        println!("   Content-Disposition: {}", header);
    }
    orchestrator.metrics().log_stats();

    Ok(())
}

fn archive_command(source: &Path, destination: &Path) -> Result<()> {
    let summary = build_archive(source, destination).with_context(|| {
        format!(
            "failed to pack {} into {}",
            source.display(),
            destination.display()
        )
    })?;

    println!(
        "📦 Packed {} entries into {} ({} bytes)",
        summary.entries,
        summary.path.display(),
        summary.bytes_packed
    );
    Ok(())
}

fn config_command(config: &BootstrapConfig, write: Option<&Path>) -> Result<()> {
    match write {
        Some(path) => {
            config.save_to_file(path)?;
            println!("💾 Configuration saved to {}", path.display());
        }
        None => {
            let rendered = toml::to_string_pretty(config).context("failed to render configuration")?;
            print!("{}", rendered);
        }
    }
    Ok(())
}
