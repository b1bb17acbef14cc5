//! Compilation service
//!
//! The front end every feature goes through: turns `(uri, content)` into a
//! cached [`ParseResult`], coalesces concurrent compiles of the same
//! document onto one in-flight job, owns the per-document symbol indexes,
//! and drives lossy workspace-wide symbol indexing. Parser failures never
//! escape; they come back as failed results carrying diagnostics.

use crate::ast::{AstModel, FileAst};
use crate::classpath::ClasspathService;
use crate::deps::hub::DependencyListener;
use crate::error::{Error, Result};
use crate::parser::{
    CompilePhase, ContentHash, Diagnostic, GroovyParser, ParseRequest, ParseResult,
};
use crate::position::Span;
use crate::symbols::SymbolIndex;
use crate::uri::DocumentUri;
use crate::workspace::WorkspaceManager;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures::future::{BoxFuture, Shared};
use futures::FutureExt;
use lru::LruCache;
use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Documents indexed per parallel batch during workspace indexing
const INDEXING_BATCH_SIZE: usize = 10;

/// Capacity of the lazily rebuilt symbol-index side cache
const SYMBOL_CACHE_CAPACITY: usize = 100;

/// Back-off before re-awaiting a job that was cancelled mid-flight
const ENSURE_COMPILED_RETRY_DELAY: Duration = Duration::from_millis(50);

/// Attempts `ensure_compiled` makes before falling back to the cache
const ENSURE_COMPILED_MAX_RETRIES: usize = 3;

/// Marker resolved by a shared compile job whose task was cancelled or
/// panicked; waiters retry or fall back to the cache
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompileInterrupted;

/// A coalesced in-flight compile every concurrent caller awaits
pub type SharedCompile =
    Shared<BoxFuture<'static, std::result::Result<Arc<ParseResult>, CompileInterrupted>>>;

/// Progress callback for workspace indexing
pub trait IndexingProgress: Send + Sync {
    /// Called after each document, with the running count and the total
    fn report(&self, indexed: usize, total: usize);
}

/// Progress sink that reports nothing
#[derive(Debug, Default)]
pub struct NoOpIndexingProgress;

impl IndexingProgress for NoOpIndexingProgress {
    fn report(&self, _indexed: usize, _total: usize) {}
}

/// Shared state behind every [`CompilationService`] handle
struct ServiceState {
    parser: Arc<dyn GroovyParser>,
    workspace: Arc<WorkspaceManager>,
    classpath: Arc<ClasspathService>,
    ast_model: Arc<AstModel>,
    /// Latest parse per document; a lookup hits only when the stored
    /// content hash matches. The compile phase is deliberately not part of
    /// the key: a document parsed to a later phase satisfies requests for
    /// earlier phases. Phase-exact callers use
    /// [`CompilationService::compile_transient`].
    parse_cache: DashMap<DocumentUri, Arc<ParseResult>>,
    /// Symbol indexes rebuilt lazily from the AST model, bounded
    symbol_cache: Mutex<LruCache<DocumentUri, Arc<SymbolIndex>>>,
    /// Workspace-wide symbol storage fed by compiles and indexing; the
    /// resolver's global-lookup tier iterates this
    symbol_storages: DashMap<DocumentUri, Arc<SymbolIndex>>,
    /// In-flight compiles, one per document
    jobs: DashMap<DocumentUri, SharedCompile>,
}

/// Cache-backed, job-coalescing compilation front end.
///
/// Cheap to clone; clones share all state.
#[derive(Clone)]
pub struct CompilationService {
    state: Arc<ServiceState>,
}

impl CompilationService {
    /// Create a service around a parser and workspace state
    pub fn new(
        parser: Arc<dyn GroovyParser>,
        workspace: Arc<WorkspaceManager>,
        classpath: Arc<ClasspathService>,
    ) -> Self {
        Self {
            state: Arc::new(ServiceState {
                parser,
                workspace,
                classpath,
                ast_model: Arc::new(AstModel::new()),
                parse_cache: DashMap::new(),
                symbol_cache: Mutex::new(LruCache::new(
                    NonZeroUsize::new(SYMBOL_CACHE_CAPACITY).unwrap(),
                )),
                symbol_storages: DashMap::new(),
                jobs: DashMap::new(),
            }),
        }
    }

    /// Compile a document, serving from the cache when the content is
    /// unchanged. Never fails: parser errors come back as a failed
    /// [`ParseResult`] with diagnostics.
    pub async fn compile(
        &self,
        uri: &DocumentUri,
        content: &str,
        phase: CompilePhase,
    ) -> Arc<ParseResult> {
        let hash = ContentHash::of(content);
        if let Some(hit) = self.state.cache_lookup(uri, hash) {
            tracing::debug!(uri = %uri, hash = %hash, "compile cache hit");
            return hit;
        }

        let result = Arc::new(
            self.state
                .run_parse(uri.clone(), content.to_string(), phase, true)
                .await,
        );
        self.state.store_result(&result);
        result
    }

    /// Compile without touching any cache or the AST model. Used for
    /// speculative parses (e.g. completion with an inserted placeholder).
    pub async fn compile_transient(
        &self,
        uri: &DocumentUri,
        content: &str,
        phase: CompilePhase,
    ) -> Arc<ParseResult> {
        Arc::new(
            self.state
                .run_parse(uri.clone(), content.to_string(), phase, true)
                .await,
        )
    }

    /// Start or join the in-flight compile for a document. Concurrent calls
    /// with the same document coalesce onto the same job and resolve to the
    /// same [`ParseResult`].
    pub fn compile_async(
        &self,
        uri: &DocumentUri,
        content: &str,
        phase: CompilePhase,
    ) -> SharedCompile {
        match self.state.jobs.entry(uri.clone()) {
            Entry::Occupied(job) => {
                tracing::debug!(uri = %uri, "joining in-flight compile");
                job.get().clone()
            }
            Entry::Vacant(slot) => {
                let service = self.clone();
                let job_uri = uri.clone();
                let content = content.to_string();
                let handle = tokio::spawn(async move {
                    let result = service.compile(&job_uri, &content, phase).await;
                    // The job unregisters itself whatever the outcome, so a
                    // later edit can start a fresh compile.
                    service.state.jobs.remove(&job_uri);
                    result
                });

                let shared: SharedCompile = async move {
                    handle.await.map_err(|e| {
                        tracing::warn!("compile job interrupted: {e}");
                        CompileInterrupted
                    })
                }
                .boxed()
                .shared();

                slot.insert(shared.clone());
                shared
            }
        }
    }

    /// Await the in-flight compile for a document if one exists, otherwise
    /// serve the cache. Rides out rapid edit cycles: a job cancelled while
    /// being awaited is retried after a short delay.
    pub async fn ensure_compiled(&self, uri: &DocumentUri) -> Option<Arc<ParseResult>> {
        for attempt in 0..ENSURE_COMPILED_MAX_RETRIES {
            let job = match self.state.jobs.get(uri) {
                Some(job) => job.clone(),
                None => break,
            };
            match job.await {
                Ok(result) => return Some(result),
                Err(CompileInterrupted) => {
                    tracing::debug!(uri = %uri, attempt, "awaited compile was interrupted, retrying");
                    tokio::time::sleep(ENSURE_COMPILED_RETRY_DELAY).await;
                }
            }
        }
        self.cached_result(uri)
    }

    /// Latest cached result for a document, regardless of content
    pub fn cached_result(&self, uri: &DocumentUri) -> Option<Arc<ParseResult>> {
        self.state
            .parse_cache
            .get(uri)
            .map(|entry| Arc::clone(&entry))
    }

    /// The shared AST model
    pub fn ast_model(&self) -> Arc<AstModel> {
        Arc::clone(&self.state.ast_model)
    }

    /// AST of a document, from the cached result or the AST model
    pub fn ast(&self, uri: &DocumentUri) -> Option<Arc<FileAst>> {
        if let Some(result) = self.cached_result(uri) {
            if let Some(ast) = &result.ast {
                return Some(Arc::clone(ast));
            }
        }
        self.state.ast_model.file(uri)
    }

    /// Symbol index of a document, rebuilt lazily from the AST model when
    /// no cached result carries one
    pub fn symbol_table(&self, uri: &DocumentUri) -> Option<Arc<SymbolIndex>> {
        if let Some(result) = self.cached_result(uri) {
            if let Some(symbols) = &result.symbols {
                return Some(Arc::clone(symbols));
            }
        }

        if let Some(symbols) = self.state.symbol_cache.lock().unwrap().get(uri) {
            return Some(Arc::clone(symbols));
        }

        let ast = self.state.ast_model.file(uri)?;
        let symbols = Arc::new(SymbolIndex::build(&ast));
        self.state
            .symbol_cache
            .lock()
            .unwrap()
            .put(uri.clone(), Arc::clone(&symbols));
        Some(symbols)
    }

    /// Workspace symbol storage for a document
    pub fn symbol_storage(&self, uri: &DocumentUri) -> Option<Arc<SymbolIndex>> {
        self.state
            .symbol_storages
            .get(uri)
            .map(|entry| Arc::clone(&entry))
    }

    /// Snapshot of every known symbol storage
    pub fn all_symbol_storages(&self) -> HashMap<DocumentUri, Arc<SymbolIndex>> {
        self.state
            .symbol_storages
            .iter()
            .map(|entry| (entry.key().clone(), Arc::clone(entry.value())))
            .collect()
    }

    /// Diagnostics of the latest cached result
    pub fn diagnostics(&self, uri: &DocumentUri) -> Vec<Diagnostic> {
        self.cached_result(uri)
            .map(|result| result.diagnostics.clone())
            .unwrap_or_default()
    }

    /// Symbol-index a workspace document without full AST traversal.
    /// Already-indexed documents are skipped; read or parse failures are
    /// logged and yield `None`.
    pub async fn index_workspace_file(&self, uri: &DocumentUri) -> Option<Arc<SymbolIndex>> {
        if let Some(existing) = self.symbol_storage(uri) {
            return Some(existing);
        }

        let path = uri.to_file_path()?;
        let content = match tokio::fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) => {
                tracing::warn!(uri = %uri, "skipping unreadable workspace source: {e}");
                return None;
            }
        };

        let result = self
            .state
            .run_parse(uri.clone(), content, CompilePhase::Conversion, false)
            .await;
        let symbols = match result.symbols {
            Some(symbols) => symbols,
            None => {
                tracing::warn!(uri = %uri, "workspace source failed to parse, no symbols indexed");
                return None;
            }
        };

        self.state
            .symbol_storages
            .insert(uri.clone(), Arc::clone(&symbols));
        Some(symbols)
    }

    /// Index a set of workspace sources: parallel within fixed-size batches,
    /// serial across batches. Per-document failures are logged and skipped;
    /// cancellation of an indexing task aborts the run. Returns the number
    /// of documents visited.
    pub async fn index_all_workspace_sources(
        &self,
        uris: Vec<DocumentUri>,
        progress: Arc<dyn IndexingProgress>,
    ) -> Result<usize> {
        let total = uris.len();
        let counter = Arc::new(AtomicUsize::new(0));
        tracing::info!(total, "workspace indexing started");

        for batch in uris.chunks(INDEXING_BATCH_SIZE) {
            let mut tasks = Vec::with_capacity(batch.len());
            for uri in batch {
                let service = self.clone();
                let uri = uri.clone();
                let counter = Arc::clone(&counter);
                let progress = Arc::clone(&progress);
                tasks.push(tokio::spawn(async move {
                    service.index_workspace_file(&uri).await;
                    let indexed = counter.fetch_add(1, Ordering::Relaxed) + 1;
                    progress.report(indexed, total);
                }));
            }

            for task in tasks {
                match task.await {
                    Ok(()) => {}
                    Err(e) if e.is_cancelled() => {
                        return Err(Error::cancelled("workspace indexing"))
                    }
                    Err(e) => tracing::warn!("indexing task failed: {e}"),
                }
            }
        }

        let visited = counter.load(Ordering::Relaxed);
        tracing::info!(visited, "workspace indexing finished");
        Ok(visited)
    }

    /// Drop everything cached for one document, including its in-flight job
    pub fn invalidate_cache(&self, uri: &DocumentUri) {
        tracing::debug!(uri = %uri, "cache invalidated");
        self.state.parse_cache.remove(uri);
        self.state.symbol_cache.lock().unwrap().pop(uri);
        self.state.symbol_storages.remove(uri);
        self.state.jobs.remove(uri);
    }

    /// Drop every cache and tear down the classpath class index
    pub fn clear_caches(&self) {
        tracing::info!("all compilation caches cleared");
        self.state.parse_cache.clear();
        self.state.symbol_cache.lock().unwrap().clear();
        self.state.symbol_storages.clear();
        self.state.jobs.clear();
        self.state.ast_model.clear();
        self.state.classpath.invalidate();
    }

    /// Locate a class on the dependency classpath. Returns a `jar:file:`
    /// URI for archive members, a `file:` URI for directory entries.
    pub fn find_classpath_class(&self, fqcn: &str) -> Option<DocumentUri> {
        self.state.classpath.find_class(fqcn)
    }

    /// Apply a new workspace model. When the set actually changed, the
    /// classpath service is re-pointed, the flavor providers are
    /// reinitialized against the new model (inside the workspace update),
    /// and every cache is cleared. Returns whether anything changed.
    pub fn update_workspace_model(
        &self,
        root: Option<PathBuf>,
        dependencies: Vec<PathBuf>,
        source_directories: Vec<PathBuf>,
    ) -> bool {
        let changed = self
            .state
            .workspace
            .update_workspace_model(root, dependencies, source_directories);
        if changed {
            self.apply_dependency_change();
        }
        changed
    }

    /// The workspace manager this service compiles against
    pub fn workspace(&self) -> Arc<WorkspaceManager> {
        Arc::clone(&self.state.workspace)
    }

    fn apply_dependency_change(&self) {
        self.state.classpath.set_entries(
            self.state
                .workspace
                .dependency_classpath()
                .entries()
                .to_vec(),
        );
        self.clear_caches();
    }
}

impl ServiceState {
    fn cache_lookup(&self, uri: &DocumentUri, hash: ContentHash) -> Option<Arc<ParseResult>> {
        let entry = self.parse_cache.get(uri)?;
        (entry.content_hash == hash).then(|| Arc::clone(&entry))
    }

    fn store_result(&self, result: &Arc<ParseResult>) {
        self.parse_cache
            .insert(result.uri.clone(), Arc::clone(result));

        if let Some(ast) = &result.ast {
            self.ast_model.replace(result.uri.clone(), Arc::clone(ast));
        }
        if let Some(symbols) = &result.symbols {
            self.symbol_storages
                .insert(result.uri.clone(), Arc::clone(symbols));
            self.symbol_cache
                .lock()
                .unwrap()
                .put(result.uri.clone(), Arc::clone(symbols));
        }
    }

    /// Run one parser invocation on the blocking pool and translate every
    /// failure mode into a [`ParseResult`].
    async fn run_parse(
        &self,
        uri: DocumentUri,
        content: String,
        phase: CompilePhase,
        recursive_visitor: bool,
    ) -> ParseResult {
        let hash = ContentHash::of(&content);
        let request = ParseRequest {
            classpath: self.workspace.classpath_for_file(&uri, &content),
            source_roots: self.workspace.source_roots(),
            workspace_sources: self.workspace.workspace_sources(),
            uri: uri.clone(),
            content,
            recursive_visitor,
            phase,
        };

        let parser = Arc::clone(&self.parser);
        let outcome = tokio::task::spawn_blocking(move || parser.parse(&request)).await;

        match outcome {
            Ok(Ok(output)) => match output.ast {
                Some(ast) => ParseResult::success(uri, hash, phase, ast, output.diagnostics),
                None => ParseResult::failure(uri, hash, phase, output.diagnostics),
            },
            Ok(Err(e)) => {
                tracing::warn!(uri = %uri, "parser failed: {e}");
                let diagnostic =
                    Diagnostic::error(Span::new(1, 1, 1, 1), format!("compilation failed: {e}"));
                ParseResult::failure(uri, hash, phase, vec![diagnostic])
            }
            Err(join_error) => {
                tracing::warn!(uri = %uri, "parser task aborted: {join_error}");
                let diagnostic = Diagnostic::error(
                    Span::new(1, 1, 1, 1),
                    "compilation aborted before completion",
                );
                ParseResult::failure(uri, hash, phase, vec![diagnostic])
            }
        }
    }
}

impl DependencyListener for CompilationService {
    fn on_dependencies_updated(&self, dependencies: &[PathBuf]) -> Result<()> {
        if self
            .state
            .workspace
            .update_dependencies(dependencies.to_vec())
        {
            self.apply_dependency_change();
        }
        Ok(())
    }
}
