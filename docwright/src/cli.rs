/// # docwright CLI Interface (Module)
///
/// Command parsing and orchestration for the `docwright` binary. The pipeline
/// itself lives in [`docwright-core`]; this module only wires configuration,
/// the external clients and the pipeline together.
///
/// ## Commands
/// - `serve`: run the HTTP API.
/// - `generate`: document one Python file into the output directory.
/// - `check`: compare existing Markdown docs with a fresh rendering.
/// - `repo`: document every Python file of a GitHub repository.
///
/// For programmatic and integration use, call [`run`] with a constructed [`Cli`].
///
/// [`docwright-core`]: ../../docwright_core/
use crate::completion::DeepSeekClient;
use crate::github::GitHubClient;
use crate::load_config::load_config;
use crate::server;
use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use docwright_core::config::AppConfig;
use docwright_core::contract::RepoRef;
use docwright_core::narrate::Narrator;
use docwright_core::pipeline::{self, DocsStatus};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// CLI for docwright: AI-assisted documentation for Python code.
#[derive(Parser)]
#[clap(
    name = "docwright",
    version,
    about = "Generate, explain and check documentation for Python code"
)]
pub struct Cli {
    /// Path to an optional YAML config file
    #[clap(long, global = true)]
    pub config: Option<PathBuf>,

    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the HTTP API
    Serve {
        /// Address to bind, overrides `server.bind`
        #[clap(long)]
        bind: Option<String>,
    },
    /// Generate Markdown and HTML documentation for a Python file
    Generate {
        #[clap(long)]
        input: PathBuf,
        /// Overrides `output.dir`
        #[clap(long)]
        output_dir: Option<PathBuf>,
    },
    /// Check whether existing Markdown documentation is up to date
    Check {
        #[clap(long)]
        input: PathBuf,
        #[clap(long)]
        docs: PathBuf,
    },
    /// Document every Python file of a GitHub repository
    Repo {
        #[clap(long)]
        owner: String,
        #[clap(long)]
        repo: String,
        /// Overrides `output.dir`
        #[clap(long)]
        output_dir: Option<PathBuf>,
    },
}

/// Async CLI entrypoint for integration tests and main()
pub async fn run(cli: Cli) -> Result<()> {
    tracing::info!("trace_initialised");

    let mut config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Serve { bind } => {
            if let Some(bind) = bind {
                config.bind = bind;
            }
            tracing::info!(command = "serve", bind = %config.bind, "Starting server");
            server::serve(&config).await
        }
        Commands::Generate { input, output_dir } => {
            if let Some(dir) = output_dir {
                config.output.dir = dir;
            }
            let code = read_input(&input).await?;
            let narrator = narrator(&config)?;
            tracing::info!(command = "generate", input = %input.display(), "Generating documentation");
            match pipeline::generate_docs(&code, &narrator, &config.output).await {
                Ok(_) => {
                    println!(
                        "Wrote {} and {}",
                        config.output.markdown_path().display(),
                        config.output.html_path().display()
                    );
                    Ok(())
                }
                Err(e) => {
                    tracing::error!(command = "generate", error = %e, "Generation failed");
                    Err(anyhow::Error::new(e))
                }
            }
        }
        Commands::Check { input, docs } => {
            let code = read_input(&input).await?;
            let existing = read_input(&docs).await?;
            let narrator = narrator(&config)?;
            let status = pipeline::check_docs(&code, &existing, &narrator).await?;
            println!("{}", status.message());
            match status {
                DocsStatus::UpToDate => Ok(()),
                DocsStatus::Outdated => Err(anyhow!(status.message())),
            }
        }
        Commands::Repo {
            owner,
            repo,
            output_dir,
        } => {
            let dir = output_dir.unwrap_or_else(|| config.output.dir.clone());
            let narrator = narrator(&config)?;
            let locator = GitHubClient::new(config.github.clone())
                .context("Failed to construct GitHub client")?;
            let repo = RepoRef { owner, repo };
            tracing::info!(command = "repo", owner = %repo.owner, repo = %repo.repo, "Documenting repository");
            let report = pipeline::document_repository(&locator, &narrator, &repo, &dir).await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(())
        }
    }
}

fn narrator(config: &AppConfig) -> Result<Narrator> {
    let completer = DeepSeekClient::new(config.completion.clone())
        .context("Failed to construct completion client")?;
    Ok(Narrator::with_max_concurrency(
        Arc::new(completer),
        config.completion.max_concurrency,
    ))
}

async fn read_input(path: &Path) -> Result<String> {
    tokio::fs::read_to_string(path).await.map_err(|e| {
        tracing::error!(error = ?e, path = %path.display(), "Failed to read input file");
        anyhow!("Failed to read {}: {}", path.display(), e)
    })
}
