//! Mooring - Branch-aware codebase index client
//!
//! CLI host for the indexing engine: scans and watches a workspace, runs
//! searches, and manages the remote index.

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use mooring::observability::init_tracing;
use mooring::{Config, Engine, Result};

/// Mooring - keep a remote code-search index in sync with this checkout
///
/// Scans the current git workspace, uploads content chunks to the managed
/// index service, and keeps the index current as files change. Searches are
/// branch-aware: results prefer the current branch and fall back to the base
/// branch with locally deleted files masked.
#[derive(Parser, Debug)]
#[command(name = "mooring")]
#[command(version)]
#[command(about = "Branch-aware codebase index client")]
struct Cli {
    /// Workspace root (a git checkout)
    #[arg(short, long, env = "MOORING_WORKSPACE", default_value = ".", global = true)]
    workspace: PathBuf,

    /// Organization id
    #[arg(long, env = "MOORING_ORG", default_value = "", global = true)]
    org: String,

    /// Project id
    #[arg(long, env = "MOORING_PROJECT", default_value = "", global = true)]
    project: String,

    /// Bearer token for the index service
    #[arg(long, env = "MOORING_TOKEN", default_value = "", global = true)]
    token: String,

    /// Directory for cache files
    #[arg(long, env = "MOORING_CACHE_DIR", default_value = "./.mooring", global = true)]
    cache_dir: PathBuf,

    /// Override the service base URL (normally derived from the token)
    #[arg(long, env = "MOORING_BASE_URL", global = true)]
    base_url: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "MOORING_LOG_LEVEL", default_value = "info", global = true)]
    log_level: String,

    /// Enable JSON logging output
    #[arg(long, env = "MOORING_LOG_JSON", global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Scan the workspace and keep watching for changes
    ///
    /// Reconciles the workspace against the remote index, uploads what is
    /// missing, then watches the filesystem until interrupted.
    Start {
        /// Scan once and exit instead of watching
        #[arg(long)]
        no_watch: bool,
    },

    /// Search the index
    ///
    /// Results prefer the current branch and fall back to the base branch;
    /// files deleted locally are excluded from fallback results.
    Search {
        /// Search query (natural language or code keywords)
        #[arg(value_name = "QUERY")]
        query: String,

        /// Restrict results to a path prefix
        #[arg(long)]
        path: Option<String>,
    },

    /// Show index status for the current branch
    Status,

    /// Delete this branch's index and the local cache
    Clear,

    /// Delete this branch's index on the server
    DeleteBranch,

    /// Delete the whole project's index on the server
    DeleteProject,
}

impl Cli {
    fn config(&self) -> Config {
        Config {
            workspace: self.workspace.clone(),
            organization_id: self.org.clone(),
            project_id: self.project.clone(),
            api_token: self.token.clone(),
            cache_dir: self.cache_dir.clone(),
            base_url: self.base_url.clone(),
            ..Default::default()
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_tracing(&cli.log_level, cli.log_json);

    tracing::info!(
        "Mooring v{} - branch-aware codebase index client",
        env!("CARGO_PKG_VERSION")
    );

    let mut config = cli.config();
    match cli.command {
        Commands::Start { no_watch } => {
            config.watch_enabled = !no_watch;
            start_command(config).await
        }
        Commands::Search { ref query, ref path } => {
            search_command(config, query, path.clone()).await
        }
        Commands::Status => status_command(&config),
        Commands::Clear => clear_command(config).await,
        Commands::DeleteBranch => delete_branch_command(config).await,
        Commands::DeleteProject => delete_project_command(config).await,
    }
}

/// Start command: scan, then watch until interrupted.
async fn start_command(config: Config) -> Result<()> {
    let engine = Engine::new(config)?;

    let handle = engine
        .start(Arc::new(|event| {
            tracing::info!(status = ?event.status, "{}", event.message);
        }))
        .await?;

    tokio::signal::ctrl_c()
        .await
        .map_err(|e| mooring::Error::internal(format!("signal handler failed: {e}")))?;

    tracing::info!("Interrupted; stopping indexer");
    handle.stop().await;
    Ok(())
}

/// Search command: branch-aware semantic search.
async fn search_command(config: Config, query: &str, path: Option<String>) -> Result<()> {
    let engine = Engine::new(config)?;
    let results = engine.search(query, path).await?;

    if results.is_empty() {
        println!("No results.");
        return Ok(());
    }

    for result in results {
        let branch = result.git_branch.as_deref().unwrap_or("?");
        println!(
            "{:.3}  {}:{}-{}  [{branch}]",
            result.score, result.file_path, result.start_line, result.end_line
        );
    }
    Ok(())
}

/// Status command: cache-derived state for the current branch.
fn status_command(config: &Config) -> Result<()> {
    let engine = Engine::new(config.clone())?;
    let state = engine.state()?;

    println!("status:  {:?}", state.status);
    println!("message: {}", state.message);
    if let Some(branch) = &state.git_branch {
        println!("branch:  {branch}");
    }
    if let (Some(files), Some(chunks)) = (state.total_files, state.total_chunks) {
        println!("files:   {files}");
        println!("chunks:  {chunks}");
    }

    let ws = config.workspace_abs()?;
    if mooring::git::is_repo(&ws) {
        if let Ok(commit) = mooring::git::current_commit(&ws) {
            println!("commit:  {commit}");
        }
        if let Ok(url) = mooring::git::remote_url(&ws) {
            println!("origin:  {url}");
        }
        if mooring::git::has_uncommitted(&ws).unwrap_or(false) {
            println!("note:    workspace has uncommitted changes");
        }
    }
    Ok(())
}

/// Clear command: drop the branch index and local cache.
async fn clear_command(config: Config) -> Result<()> {
    let engine = Engine::new(config)?;
    engine.clear().await?;
    println!("Branch index and cache cleared.");
    Ok(())
}

/// Delete-branch command: drop the branch index server-side.
async fn delete_branch_command(config: Config) -> Result<()> {
    let engine = Engine::new(config)?;
    engine.delete_branch().await?;
    println!("Branch index deleted.");
    Ok(())
}

/// Delete-project command: drop the project index server-side.
async fn delete_project_command(config: Config) -> Result<()> {
    let engine = Engine::new(config)?;
    engine.delete_project().await?;
    println!("Project index deleted.");
    Ok(())
}
