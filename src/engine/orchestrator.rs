//! Engine lifecycle orchestration.
//!
//! The [`Engine`] validates the workspace, reconciles it against the remote
//! index, installs the filesystem watcher, and serves searches. State events
//! flow to the host through a [`StateSink`]; the returned [`EngineHandle`]
//! stops everything and emits the terminal idle event exactly once.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::config::Config;
use crate::error::summarize_errors;
use crate::git;
use crate::index::cache::{CacheStore, ClientCache};
use crate::index::{EventFilter, Scanner};
use crate::remote::{
    DeleteBranchRequest, DeleteProjectRequest, HttpRemoteIndex, ManifestQuery, SearchRequest,
    SearchResult, ServerManifest, SharedRemoteIndex,
};
use crate::watcher::{EventHandler, WorkspaceWatcher};
use crate::{Error, Result};

use super::state::StateEvent;

/// Host callback receiving every user-visible state transition.
pub type StateSink = Arc<dyn Fn(StateEvent) + Send + Sync>;

/// How long a graceful stop waits before cancelling the run task outright.
const STOP_GRACE: Duration = Duration::from_secs(5);

/// The indexing/search engine for one workspace.
pub struct Engine {
    config: Config,
    remote: SharedRemoteIndex,
    store: CacheStore,
}

impl Engine {
    /// Create an engine talking HTTPS to the managed service.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the HTTP client
    /// cannot be built.
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        let remote: SharedRemoteIndex = Arc::new(HttpRemoteIndex::new(&config)?);
        Ok(Self::assemble(config, remote))
    }

    /// Create an engine over an injected remote (tests, custom transports).
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn with_remote(config: Config, remote: SharedRemoteIndex) -> Result<Self> {
        config.validate()?;
        Ok(Self::assemble(config, remote))
    }

    fn assemble(config: Config, remote: SharedRemoteIndex) -> Self {
        let store = CacheStore::new(config.cache_dir.clone());
        Self {
            config,
            remote,
            store,
        }
    }

    /// Start indexing: validate, fetch the manifest, scan, then watch.
    ///
    /// State transitions are emitted through `on_state`; the returned handle
    /// stops the engine.
    ///
    /// # Errors
    ///
    /// Returns an error (after emitting a matching error event) when the
    /// workspace is not a git repository, branch discovery fails, or the
    /// manifest cannot be fetched.
    pub async fn start(&self, on_state: StateSink) -> Result<EngineHandle> {
        let ws = match self.config.workspace_abs() {
            Ok(ws) => ws,
            Err(err) => {
                on_state(StateEvent::error("Workspace unavailable", err.to_string()));
                return Err(err);
            }
        };

        if !git::is_repo(&ws) {
            let err = Error::NotARepo {
                path: ws.display().to_string(),
            };
            on_state(StateEvent::error(
                "Codebase indexing requires a git repository",
                err.to_string(),
            ));
            return Err(err);
        }

        let branch = match git::current_branch(&ws) {
            Ok(branch) => branch,
            Err(err) => {
                on_state(StateEvent::error(
                    "Could not determine the current branch",
                    err.to_string(),
                ));
                return Err(err);
            }
        };
        let is_base = git::is_base_branch(&branch, Some(&ws));

        // 404 comes back as None and means "branch not indexed yet".
        let manifest = match self
            .remote
            .manifest(ManifestQuery {
                organization_id: self.config.organization_id.clone(),
                project_id: self.config.project_id.clone(),
                git_branch: branch.clone(),
            })
            .await
        {
            Ok(manifest) => manifest,
            Err(err) => {
                on_state(StateEvent::error(
                    "Could not reach the index service",
                    err.to_string(),
                ));
                return Err(err);
            }
        };

        let cache = Arc::new(Mutex::new(self.store.load(&ws, &branch)));
        let idle_emitted = Arc::new(AtomicBool::new(false));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        on_state(StateEvent::scanning("Scanning: starting", &branch));

        let task = tokio::spawn(run_engine(RunContext {
            config: self.config.clone(),
            remote: Arc::clone(&self.remote),
            store: self.store.clone(),
            ws: ws.clone(),
            branch,
            is_base,
            manifest,
            cache: Arc::clone(&cache),
            on_state: Arc::clone(&on_state),
            idle_emitted: Arc::clone(&idle_emitted),
            shutdown_rx,
        }));

        Ok(EngineHandle {
            shutdown: shutdown_tx,
            task: Some(task),
            on_state,
            idle_emitted,
            store: self.store.clone(),
            cache,
            workspace: ws,
        })
    }

    /// Branch-preference semantic search.
    ///
    /// On feature branches, locally deleted files (diff plus cache) are sent
    /// as exclusions so the base-branch fallback never surfaces them; git
    /// failures degrade to searching without exclusions.
    ///
    /// # Errors
    ///
    /// Returns an error if branch discovery or the service call fails.
    pub async fn search(
        &self,
        query: &str,
        path: Option<String>,
    ) -> Result<Vec<SearchResult>> {
        let ws = self.config.workspace_abs()?;
        let branch = git::current_branch(&ws)?;
        let base = git::base_branch(&ws);

        let exclude_files = if git::is_base_branch(&branch, Some(&ws)) {
            Vec::new()
        } else {
            let mut exclude = match git::diff(&branch, &base, &ws) {
                Ok(diff) => diff.deleted,
                Err(err) => {
                    tracing::warn!(error = %err, "Diff failed; searching without exclusions");
                    Vec::new()
                }
            };
            for path in self.store.load(&ws, &branch).deleted_files {
                if !exclude.contains(&path) {
                    exclude.push(path);
                }
            }
            exclude
        };

        self.remote
            .search(SearchRequest {
                query: query.to_string(),
                organization_id: self.config.organization_id.clone(),
                project_id: self.config.project_id.clone(),
                prefer_branch: branch,
                fallback_branch: base,
                exclude_files,
                path,
            })
            .await
    }

    /// Current indexer state derived from the cache and live branch.
    ///
    /// # Errors
    ///
    /// Returns an error if the workspace path cannot be resolved or branch
    /// discovery fails.
    pub fn state(&self) -> Result<StateEvent> {
        let ws = self.config.workspace_abs()?;
        if !git::is_repo(&ws) {
            return Ok(StateEvent::error(
                "Codebase indexing requires a git repository",
                format!("workspace '{}' is not a git repository", ws.display()),
            ));
        }

        let branch = git::current_branch(&ws)?;
        let cache = self.store.load(&ws, &branch);

        if cache.files.is_empty() {
            return Ok(
                StateEvent::idle("Branch not indexed; re-scan needed").with_branch(branch)
            );
        }

        Ok(StateEvent::idle("Index ready")
            .with_branch(branch)
            .with_totals(cache.files.len(), cache.total_chunks(), cache.last_sync()))
    }

    /// Delete this branch's server index and the local cache.
    ///
    /// # Errors
    ///
    /// Returns an error if branch discovery or the service call fails.
    pub async fn clear(&self) -> Result<()> {
        let ws = self.config.workspace_abs()?;
        let branch = git::current_branch(&ws)?;

        self.delete_branch_named(&branch).await?;
        self.store.remove(&ws, &branch);

        tracing::info!(branch = %branch, "Cleared branch index and cache");
        Ok(())
    }

    /// Delete the current branch's server index.
    ///
    /// # Errors
    ///
    /// Returns an error if branch discovery or the service call fails.
    pub async fn delete_branch(&self) -> Result<()> {
        let ws = self.config.workspace_abs()?;
        let branch = git::current_branch(&ws)?;
        self.delete_branch_named(&branch).await
    }

    async fn delete_branch_named(&self, branch: &str) -> Result<()> {
        self.remote
            .delete_branch(DeleteBranchRequest {
                organization_id: self.config.organization_id.clone(),
                project_id: self.config.project_id.clone(),
                git_branch: branch.to_string(),
            })
            .await
    }

    /// Delete the whole project's server index.
    ///
    /// # Errors
    ///
    /// Returns an error if the service call fails.
    pub async fn delete_project(&self) -> Result<()> {
        self.remote
            .delete_project(DeleteProjectRequest {
                organization_id: self.config.organization_id.clone(),
                project_id: self.config.project_id.clone(),
            })
            .await
    }
}

/// Everything the detached run task needs.
struct RunContext {
    config: Config,
    remote: SharedRemoteIndex,
    store: CacheStore,
    ws: PathBuf,
    branch: String,
    is_base: bool,
    manifest: Option<ServerManifest>,
    cache: Arc<Mutex<ClientCache>>,
    on_state: StateSink,
    idle_emitted: Arc<AtomicBool>,
    shutdown_rx: watch::Receiver<bool>,
}

/// Scan, then watch until shutdown.
async fn run_engine(mut ctx: RunContext) {
    let scanner = Scanner::new(
        ctx.config.clone(),
        Arc::clone(&ctx.remote),
        ctx.store.clone(),
    );

    let progress_sink = Arc::clone(&ctx.on_state);
    let progress_branch = ctx.branch.clone();
    let scan_result = scanner
        .scan(&ctx.cache, ctx.manifest.as_ref(), move |p| {
            progress_sink(StateEvent::scanning(
                format!(
                    "Scanning: {}/{} files ({} chunks)",
                    p.files_done, p.files_total, p.chunks_indexed
                ),
                progress_branch.clone(),
            ));
        })
        .await;

    let outcome = match scan_result {
        Ok(outcome) => outcome,
        Err(err) => {
            (ctx.on_state)(StateEvent::error("Indexing failed", err.to_string()));
            return;
        }
    };

    if !outcome.success() {
        (ctx.on_state)(StateEvent::error(
            "Indexing finished with errors",
            summarize_errors(&outcome.errors),
        ));
        return;
    }

    if outcome.files_processed == 0 && outcome.chunks_indexed == 0 {
        flush(&ctx.store, &ctx.ws, &ctx.cache);
        emit_idle_once(
            &ctx.on_state,
            &ctx.idle_emitted,
            "No files indexed; workspace has no supported files",
        );
        return;
    }

    if !ctx.config.watch_enabled {
        flush(&ctx.store, &ctx.ws, &ctx.cache);
        emit_idle_once(
            &ctx.on_state,
            &ctx.idle_emitted,
            "Scan complete; watcher disabled",
        );
        return;
    }

    let filter = EventFilter::new(&ctx.ws, ctx.config.extensions.clone());
    let mut watcher = match WorkspaceWatcher::new(&ctx.ws, filter, ctx.config.debounce()) {
        Ok(watcher) => watcher,
        Err(err) => {
            (ctx.on_state)(StateEvent::error(
                "Could not watch the workspace",
                err.to_string(),
            ));
            return;
        }
    };

    {
        let cache = ctx.cache.lock();
        (ctx.on_state)(StateEvent::watching(
            "Index up to date; watching for changes",
            &ctx.branch,
            cache.files.len(),
            cache.total_chunks(),
            cache.last_sync(),
        ));
    }

    let handler = EventHandler::new(
        ctx.config.clone(),
        Arc::clone(&ctx.remote),
        Arc::clone(&ctx.cache),
        ctx.store.clone(),
        ctx.ws.clone(),
        ctx.branch.clone(),
        ctx.is_base,
    );

    loop {
        tokio::select! {
            _ = ctx.shutdown_rx.changed() => break,
            batch = watcher.recv() => match batch {
                Some(batch) => handler.process_batch(batch).await,
                None => break,
            },
        }
    }

    flush(&ctx.store, &ctx.ws, &ctx.cache);
    emit_idle_once(&ctx.on_state, &ctx.idle_emitted, "Indexer stopped");
}

fn flush(store: &CacheStore, ws: &Path, cache: &Mutex<ClientCache>) {
    let snapshot = cache.lock().clone();
    store.save(ws, &snapshot);
}

fn emit_idle_once(on_state: &StateSink, idle_emitted: &AtomicBool, message: &str) {
    if !idle_emitted.swap(true, Ordering::SeqCst) {
        on_state(StateEvent::idle(message));
    }
}

/// Running engine handle. Stopping (or dropping) cancels the watcher and the
/// in-flight scan, flushes the cache, and emits the terminal idle event
/// exactly once.
pub struct EngineHandle {
    shutdown: watch::Sender<bool>,
    task: Option<JoinHandle<()>>,
    on_state: StateSink,
    idle_emitted: Arc<AtomicBool>,
    store: CacheStore,
    cache: Arc<Mutex<ClientCache>>,
    workspace: PathBuf,
}

impl EngineHandle {
    /// Stop the engine: request shutdown, wait briefly, then cancel.
    pub async fn stop(mut self) {
        let _ = self.shutdown.send(true);

        if let Some(mut task) = self.task.take() {
            // Grace expired means the scan is still mid-flight; cancellation
            // lands at its next await point.
            if tokio::time::timeout(STOP_GRACE, &mut task).await.is_err() {
                task.abort();
                let _ = task.await;
            }
        }

        let snapshot = self.cache.lock().clone();
        self.store.save(&self.workspace, &snapshot);

        if !self.idle_emitted.swap(true, Ordering::SeqCst) {
            (self.on_state)(StateEvent::idle("Indexer stopped"));
        }
    }
}

impl Drop for EngineHandle {
    fn drop(&mut self) {
        let _ = self.shutdown.send(true);
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}
