//! Dependency resolution and build-file monitoring
//!
//! [`DependencyManager`] runs the (external, long-running) dependency
//! resolver off the request path, tracks the resolution lifecycle as an
//! explicit state machine, and keeps the dependency list fresh by watching
//! the workspace's build files for edits.

pub mod hub;

use crate::error::{Error, Result};
use crate::parser::ContentHash;
use async_trait::async_trait;
use groovylens_utils::FileWatcher;
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tokio::task::JoinHandle;

/// Build files that trigger dependency re-resolution when edited
const BUILD_FILE_NAMES: &[&str] = &[
    "build.gradle",
    "build.gradle.kts",
    "settings.gradle",
    "settings.gradle.kts",
    "pom.xml",
];

/// Lifecycle of one workspace's dependency resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DependencyState {
    /// Nothing has run yet
    NotStarted,
    /// A resolution task is running
    InProgress,
    /// The last resolution succeeded
    Completed,
    /// The last resolution failed
    Failed,
}

impl fmt::Display for DependencyState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

/// What a resolver produced for a workspace
#[derive(Debug, Clone, Default)]
pub struct WorkspaceResolution {
    /// Dependency entries (JARs and class directories)
    pub dependencies: Vec<PathBuf>,
    /// Source directories reported by the build tool
    pub source_directories: Vec<PathBuf>,
}

/// External dependency resolver (Gradle tooling, BSP, Maven, pom readers)
#[async_trait]
pub trait DependencyResolver: Send + Sync {
    /// Resolver name, for logging
    fn name(&self) -> &str;

    /// Resolve a workspace's dependencies. Long-running; always called off
    /// the request path.
    async fn resolve(&self, project_dir: &Path) -> Result<WorkspaceResolution>;
}

/// Tries resolvers in order and returns the first success
pub struct CompositeResolver {
    resolvers: Vec<Arc<dyn DependencyResolver>>,
}

impl CompositeResolver {
    /// Create a composite over an ordered resolver chain
    pub fn new(resolvers: Vec<Arc<dyn DependencyResolver>>) -> Self {
        Self { resolvers }
    }
}

#[async_trait]
impl DependencyResolver for CompositeResolver {
    fn name(&self) -> &str {
        "composite"
    }

    async fn resolve(&self, project_dir: &Path) -> Result<WorkspaceResolution> {
        for resolver in &self.resolvers {
            match resolver.resolve(project_dir).await {
                Ok(resolution) => {
                    tracing::info!(resolver = resolver.name(), "dependency resolution succeeded");
                    return Ok(resolution);
                }
                Err(e) => {
                    tracing::debug!(resolver = resolver.name(), "resolver did not apply: {e}");
                }
            }
        }
        Err(Error::dependency_resolution(
            project_dir,
            "no resolver could handle this workspace",
        ))
    }
}

/// Observer of one resolution run
pub trait ResolutionObserver: Send + Sync {
    /// Coarse progress: ~25% connecting, ~75% resolving, 100% done
    fn on_progress(&self, percent: u8, message: &str);

    /// Resolution succeeded with this dependency list
    fn on_complete(&self, dependencies: &[PathBuf]);

    /// Resolution failed
    fn on_error(&self, error: &Error);
}

/// Observer that ignores everything
#[derive(Debug, Default)]
pub struct NoOpResolutionObserver;

impl ResolutionObserver for NoOpResolutionObserver {
    fn on_progress(&self, _percent: u8, _message: &str) {}
    fn on_complete(&self, _dependencies: &[PathBuf]) {}
    fn on_error(&self, _error: &Error) {}
}

/// Watches a workspace root for build-file edits.
///
/// Raw events are debounced by the underlying watcher; on top of that, an
/// event whose file content hashes identically to the last seen content is
/// dropped, so touch-only and synthetic modifications do not trigger
/// re-resolution.
pub struct BuildFileWatcher {
    file_names: Mutex<Vec<String>>,
    hashes: Arc<Mutex<HashMap<PathBuf, ContentHash>>>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl Default for BuildFileWatcher {
    fn default() -> Self {
        Self {
            file_names: Mutex::new(BUILD_FILE_NAMES.iter().map(|s| s.to_string()).collect()),
            hashes: Arc::new(Mutex::new(HashMap::new())),
            task: Mutex::new(None),
        }
    }
}

impl BuildFileWatcher {
    /// Create a watcher for the standard Gradle/Maven build files
    pub fn new() -> Self {
        Self::default()
    }

    /// Watch an additional build file name
    pub fn register_file_name(&self, name: impl Into<String>) {
        self.file_names.lock().unwrap().push(name.into());
    }

    /// Whether a path is one of the watched build files
    pub fn is_build_file(&self, path: &Path) -> bool {
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            return false;
        };
        self.file_names.lock().unwrap().iter().any(|n| n == name)
    }

    /// Start watching a workspace root; a previous watch is stopped first.
    /// `on_change` fires once per effective build-file edit.
    pub fn start(&self, root: &Path, on_change: Arc<dyn Fn() + Send + Sync>) -> Result<()> {
        self.stop();

        let mut watcher = FileWatcher::new()?;
        watcher.watch_dir(root)?;

        // Seed content hashes so the first real edit is comparable.
        {
            let names = self.file_names.lock().unwrap().clone();
            let mut hashes = self.hashes.lock().unwrap();
            hashes.clear();
            for name in &names {
                let path = root.join(name);
                if let Ok(content) = std::fs::read_to_string(&path) {
                    hashes.insert(path, ContentHash::of(&content));
                }
            }
        }

        let names = self.file_names.lock().unwrap().clone();
        let hashes = Arc::clone(&self.hashes);
        let root = root.to_path_buf();
        tracing::info!(root = %root.display(), "build file watcher started");

        let task = tokio::spawn(async move {
            while let Some(event) = watcher.next_change().await {
                let Some(file_name) = event.path.file_name().and_then(|n| n.to_str()) else {
                    continue;
                };
                if !names.iter().any(|n| n == file_name) {
                    continue;
                }
                if !refresh_hash(&hashes, &event.path).await {
                    tracing::debug!(path = %event.path.display(), "build file event with unchanged content ignored");
                    continue;
                }
                tracing::info!(path = %event.path.display(), "build file changed");
                on_change();
            }
        });

        *self.task.lock().unwrap() = Some(task);
        Ok(())
    }

    /// Stop watching. Aborting the event task drops the underlying watcher,
    /// which releases the OS watch handles.
    pub fn stop(&self) {
        if let Some(task) = self.task.lock().unwrap().take() {
            task.abort();
            tracing::debug!("build file watcher stopped");
        }
    }

    /// Whether the watcher is currently running
    pub fn is_running(&self) -> bool {
        self.task.lock().unwrap().is_some()
    }
}

impl Drop for BuildFileWatcher {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Re-hash a build file, updating the stored hash. Returns whether the
/// content actually changed since the last observation.
async fn refresh_hash(hashes: &Arc<Mutex<HashMap<PathBuf, ContentHash>>>, path: &Path) -> bool {
    match tokio::fs::read_to_string(path).await {
        Ok(content) => {
            let new_hash = ContentHash::of(&content);
            let mut hashes = hashes.lock().unwrap();
            match hashes.insert(path.to_path_buf(), new_hash) {
                Some(previous) => previous != new_hash,
                None => true,
            }
        }
        // Deleted or unreadable counts as a change.
        Err(_) => hashes.lock().unwrap().remove(path).is_some(),
    }
}

/// Shared state behind every [`DependencyManager`] handle
struct ManagerState {
    resolver: Arc<dyn DependencyResolver>,
    lifecycle: Mutex<DependencyState>,
    workspace_root: Mutex<Option<PathBuf>>,
    dependencies: Mutex<Vec<PathBuf>>,
    job: Mutex<Option<JoinHandle<()>>>,
    watcher: BuildFileWatcher,
}

impl Drop for ManagerState {
    fn drop(&mut self) {
        if let Some(job) = self.job.lock().unwrap().take() {
            job.abort();
        }
    }
}

/// Runs dependency resolution off the request path and keeps it fresh.
///
/// Cheap to clone; clones share all state.
#[derive(Clone)]
pub struct DependencyManager {
    inner: Arc<ManagerState>,
}

impl DependencyManager {
    /// Create a manager around a resolver
    pub fn new(resolver: Arc<dyn DependencyResolver>) -> Self {
        Self {
            inner: Arc::new(ManagerState {
                resolver,
                lifecycle: Mutex::new(DependencyState::NotStarted),
                workspace_root: Mutex::new(None),
                dependencies: Mutex::new(Vec::new()),
                job: Mutex::new(None),
                watcher: BuildFileWatcher::new(),
            }),
        }
    }

    /// Start resolving a workspace's dependencies.
    ///
    /// While a resolution for the same workspace is in progress this is a
    /// no-op, as is re-starting a finished workspace without a [`reset`]
    /// in between. A different workspace cancels the current run first.
    /// With `enable_watch`, a successful resolution starts the build-file
    /// watcher, which resets and re-resolves on every effective edit.
    ///
    /// [`reset`]: DependencyManager::reset
    pub fn start_async_resolution(
        &self,
        workspace_root: PathBuf,
        observer: Arc<dyn ResolutionObserver>,
        enable_watch: bool,
    ) {
        let same_root =
            self.inner.workspace_root.lock().unwrap().as_deref() == Some(&*workspace_root);
        if same_root {
            match self.state() {
                DependencyState::InProgress => {
                    tracing::debug!("resolution already in progress, ignoring duplicate start");
                    return;
                }
                DependencyState::Completed | DependencyState::Failed => {
                    tracing::debug!("resolution already finished; reset() before restarting");
                    return;
                }
                DependencyState::NotStarted => {}
            }
        } else if self.state() == DependencyState::InProgress {
            tracing::info!("workspace changed, cancelling current resolution");
            self.cancel();
        }

        *self.inner.workspace_root.lock().unwrap() = Some(workspace_root.clone());
        *self.inner.lifecycle.lock().unwrap() = DependencyState::InProgress;
        tracing::info!(root = %workspace_root.display(), "dependency resolution started");

        let manager = self.clone();
        let handle = tokio::spawn(async move {
            manager
                .run_resolution(workspace_root, observer, enable_watch)
                .await;
        });
        *self.inner.job.lock().unwrap() = Some(handle);
    }

    async fn run_resolution(
        &self,
        workspace_root: PathBuf,
        observer: Arc<dyn ResolutionObserver>,
        enable_watch: bool,
    ) {
        observer.on_progress(25, "connecting to build tool");
        let outcome = self.inner.resolver.resolve(&workspace_root).await;
        observer.on_progress(75, "resolving dependencies");

        match outcome {
            Ok(resolution) => {
                *self.inner.dependencies.lock().unwrap() = resolution.dependencies.clone();
                *self.inner.lifecycle.lock().unwrap() = DependencyState::Completed;
                tracing::info!(
                    count = resolution.dependencies.len(),
                    "dependency resolution completed"
                );
                observer.on_progress(100, "dependency resolution complete");
                observer.on_complete(&resolution.dependencies);

                if enable_watch {
                    self.start_watcher(workspace_root, observer);
                }
            }
            Err(e) => {
                *self.inner.lifecycle.lock().unwrap() = DependencyState::Failed;
                tracing::warn!("dependency resolution failed: {e}");
                observer.on_error(&e);
            }
        }
    }

    fn start_watcher(&self, workspace_root: PathBuf, observer: Arc<dyn ResolutionObserver>) {
        let manager = self.clone();
        let root = workspace_root.clone();
        let on_change: Arc<dyn Fn() + Send + Sync> = Arc::new(move || {
            manager.reset();
            manager.start_async_resolution(root.clone(), Arc::clone(&observer), true);
        });

        if let Err(e) = self.inner.watcher.start(&workspace_root, on_change) {
            tracing::warn!("could not start build file watcher: {e}");
        }
    }

    /// Register an extra build file name with the watcher
    pub fn register_build_file_pattern(&self, name: impl Into<String>) {
        self.inner.watcher.register_file_name(name);
    }

    /// Cancel the current resolution and stop the watcher. An in-progress
    /// state resets to [`DependencyState::NotStarted`].
    pub fn cancel(&self) {
        if let Some(job) = self.inner.job.lock().unwrap().take() {
            job.abort();
        }
        self.inner.watcher.stop();

        let mut lifecycle = self.inner.lifecycle.lock().unwrap();
        if *lifecycle == DependencyState::InProgress {
            *lifecycle = DependencyState::NotStarted;
        }
    }

    /// Cancel, clear the dependency list and return to
    /// [`DependencyState::NotStarted`]
    pub fn reset(&self) {
        self.cancel();
        self.inner.dependencies.lock().unwrap().clear();
        *self.inner.lifecycle.lock().unwrap() = DependencyState::NotStarted;
        tracing::debug!("dependency manager reset");
    }

    /// The most recently resolved dependency list
    pub fn current_dependencies(&self) -> Vec<PathBuf> {
        self.inner.dependencies.lock().unwrap().clone()
    }

    /// Current lifecycle state
    pub fn state(&self) -> DependencyState {
        *self.inner.lifecycle.lock().unwrap()
    }

    /// Workspace the manager is bound to
    pub fn workspace_root(&self) -> Option<PathBuf> {
        self.inner.workspace_root.lock().unwrap().clone()
    }
}
