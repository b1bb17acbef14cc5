//! Workspace model and per-file classpath assembly
//!
//! [`WorkspaceManager`] tracks the workspace root, resolved dependencies,
//! source roots and the set of workspace sources, and assembles the
//! effective classpath for a document. Flavor detectors (Jenkins pipelines,
//! Spock specifications) hook in here to enrich the classpath of files they
//! recognize; their providers are re-run on every effective model change so
//! the enrichment follows the current dependencies.

use crate::classpath::Classpath;
use crate::uri::DocumentUri;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use walkdir::WalkDir;

/// Conventional Gradle/Maven/Jenkins source layouts probed during
/// workspace initialization
const SOURCE_ROOT_CANDIDATES: &[&str] = &[
    "src/main/groovy",
    "src/test/groovy",
    "src/main/java",
    "src/test/java",
    "vars",
    "src",
];

/// Directories never scanned for workspace sources
const EXCLUDED_DIRS: &[&str] = &[".git", ".gradle", "build", "out", "target", "node_modules"];

/// Snapshot of what the workspace looks like
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WorkspaceModel {
    /// Workspace root directory
    pub root: Option<PathBuf>,
    /// Resolved dependency entries (JARs and class directories)
    pub dependencies: Vec<PathBuf>,
    /// Source root directories
    pub source_directories: Vec<PathBuf>,
    /// Groovy sources of interest under the root
    pub workspace_sources: Vec<PathBuf>,
}

impl WorkspaceModel {
    /// Set-equality comparison of the parts that drive caching: root,
    /// dependencies and source directories. Ordering differences are not a
    /// change.
    pub fn same_sets(&self, root: Option<&Path>, deps: &[PathBuf], source_dirs: &[PathBuf]) -> bool {
        let as_set = |paths: &[PathBuf]| paths.iter().cloned().collect::<HashSet<_>>();
        self.root.as_deref() == root
            && as_set(&self.dependencies) == as_set(deps)
            && as_set(&self.source_directories) == as_set(source_dirs)
    }
}

/// A workspace flavor: recognizes its files and enriches their classpath
pub trait FlavorDetector: Send + Sync {
    /// Flavor name, for logging
    fn name(&self) -> &str;

    /// Fast heuristic over file name and shallow content markers
    fn is_flavor_file(&self, uri: &DocumentUri, content: &str) -> bool;

    /// Additively extend the classpath for a recognized file
    fn enrich_classpath(&self, classpath: &mut Classpath);
}

static JENKINS_MARKERS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^\s*pipeline\s*\{|@Library\b").unwrap());

/// Detects Jenkins pipeline files by name or pipeline-block markers
#[derive(Debug, Default)]
pub struct JenkinsDetector {
    library_paths: Vec<PathBuf>,
}

impl JenkinsDetector {
    /// Create a detector adding the given shared-library paths to
    /// recognized files
    pub fn new(library_paths: Vec<PathBuf>) -> Self {
        Self { library_paths }
    }
}

impl FlavorDetector for JenkinsDetector {
    fn name(&self) -> &str {
        "jenkins"
    }

    fn is_flavor_file(&self, uri: &DocumentUri, content: &str) -> bool {
        let file_name = uri.file_name();
        if file_name == "Jenkinsfile" || file_name.ends_with(".jenkinsfile") {
            return true;
        }
        JENKINS_MARKERS.is_match(content)
    }

    fn enrich_classpath(&self, classpath: &mut Classpath) {
        classpath.extend(self.library_paths.iter().cloned());
    }
}

/// Builds a flavor detector against a workspace model.
///
/// Detectors are immutable; the manager re-runs every registered provider
/// whenever the model effectively changes, so flavor classpath additions
/// follow the current dependencies and workspace layout instead of the
/// state at registration time.
pub trait FlavorProvider: Send + Sync {
    /// Provider name, for logging
    fn name(&self) -> &str;

    /// Build a detector for the given model
    fn create_detector(&self, model: &WorkspaceModel) -> Arc<dyn FlavorDetector>;
}

/// Provides [`JenkinsDetector`]s: configured shared-library directories
/// plus the directories of any GDSL descriptors found under the root
#[derive(Debug, Default)]
pub struct JenkinsProvider {
    library_paths: Vec<PathBuf>,
}

impl JenkinsProvider {
    /// Create a provider with configured shared-library paths
    pub fn new(library_paths: Vec<PathBuf>) -> Self {
        Self { library_paths }
    }
}

impl FlavorProvider for JenkinsProvider {
    fn name(&self) -> &str {
        "jenkins"
    }

    fn create_detector(&self, model: &WorkspaceModel) -> Arc<dyn FlavorDetector> {
        let mut paths = self.library_paths.clone();
        if let Some(root) = &model.root {
            paths.extend(gdsl_directories(root));
        }
        Arc::new(JenkinsDetector::new(paths))
    }
}

/// Provides [`SpockDetector`]s: configured library paths plus the
/// `spock-*` JARs of the current dependency set
#[derive(Debug, Default)]
pub struct SpockProvider {
    library_paths: Vec<PathBuf>,
}

impl SpockProvider {
    /// Create a provider with configured library paths
    pub fn new(library_paths: Vec<PathBuf>) -> Self {
        Self { library_paths }
    }
}

impl FlavorProvider for SpockProvider {
    fn name(&self) -> &str {
        "spock"
    }

    fn create_detector(&self, model: &WorkspaceModel) -> Arc<dyn FlavorDetector> {
        let mut paths = self.library_paths.clone();
        paths.extend(
            model
                .dependencies
                .iter()
                .filter(|dep| {
                    dep.file_name()
                        .and_then(|name| name.to_str())
                        .is_some_and(|name| name.starts_with("spock-"))
                })
                .cloned(),
        );
        Arc::new(SpockDetector::new(paths))
    }
}

static SPOCK_MARKERS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"import\s+spock\.lang|extends\s+Specification\b").unwrap());

/// Detects Spock specifications by their imports and base class
#[derive(Debug, Default)]
pub struct SpockDetector {
    library_paths: Vec<PathBuf>,
}

impl SpockDetector {
    /// Create a detector adding the given Spock JARs to recognized files
    pub fn new(library_paths: Vec<PathBuf>) -> Self {
        Self { library_paths }
    }
}

impl FlavorDetector for SpockDetector {
    fn name(&self) -> &str {
        "spock"
    }

    fn is_flavor_file(&self, _uri: &DocumentUri, content: &str) -> bool {
        SPOCK_MARKERS.is_match(content)
    }

    fn enrich_classpath(&self, classpath: &mut Classpath) {
        classpath.extend(self.library_paths.iter().cloned());
    }
}

/// Configuration for a Jenkins shared-library workspace
#[derive(Debug, Clone, Default)]
pub struct JenkinsWorkspaceConfig {
    /// Workspace root
    pub root: PathBuf,
    /// Shared-library directories added to pipeline classpaths
    pub library_paths: Vec<PathBuf>,
}

/// Tracks workspace state and assembles per-file classpaths
#[derive(Default)]
pub struct WorkspaceManager {
    model: RwLock<WorkspaceModel>,
    providers: RwLock<Vec<Arc<dyn FlavorProvider>>>,
    detectors: RwLock<Vec<Arc<dyn FlavorDetector>>>,
}

impl WorkspaceManager {
    /// Create an empty manager with no registered flavors
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a flavor provider. A detector is built against the current
    /// model immediately; later model changes rebuild it.
    pub fn register_provider(&self, provider: Arc<dyn FlavorProvider>) {
        let model = self.model.read().unwrap().clone();
        let detector = provider.create_detector(&model);
        tracing::debug!(flavor = provider.name(), "flavor provider registered");
        self.providers.write().unwrap().push(provider);
        self.detectors.write().unwrap().push(detector);
    }

    /// Drop all registered flavor providers and their detectors
    pub fn clear_providers(&self) {
        self.providers.write().unwrap().clear();
        self.detectors.write().unwrap().clear();
    }

    /// Initialize from a workspace root: probe conventional source roots,
    /// scan for Groovy sources and reinitialize the flavor providers.
    pub fn initialize_workspace(&self, root: impl Into<PathBuf>) {
        let root = root.into();
        let source_directories = discover_source_roots(&root);
        let workspace_sources = scan_workspace_sources(&root);

        tracing::info!(
            root = %root.display(),
            source_roots = source_directories.len(),
            sources = workspace_sources.len(),
            "workspace initialized"
        );

        let snapshot = {
            let mut model = self.model.write().unwrap();
            model.root = Some(root);
            model.source_directories = source_directories;
            model.workspace_sources = workspace_sources;
            model.clone()
        };
        self.rebuild_detectors(&snapshot);
    }

    /// Initialize a Jenkins shared-library workspace: registers a Jenkins
    /// provider for the configured libraries, then initializes normally.
    pub fn initialize_jenkins_workspace(&self, config: JenkinsWorkspaceConfig) {
        self.register_provider(Arc::new(JenkinsProvider::new(config.library_paths)));
        self.initialize_workspace(config.root);
    }

    /// Replace root/dependencies/source-roots if the sets actually changed.
    /// On a change the flavor providers are reinitialized against the new
    /// model. Returns true iff something changed; callers invalidate caches
    /// on true.
    pub fn update_workspace_model(
        &self,
        root: Option<PathBuf>,
        dependencies: Vec<PathBuf>,
        source_directories: Vec<PathBuf>,
    ) -> bool {
        let snapshot = {
            let mut model = self.model.write().unwrap();
            if model.same_sets(root.as_deref(), &dependencies, &source_directories) {
                return false;
            }

            let root_changed = model.root != root;
            model.dependencies = dependencies;
            model.source_directories = source_directories;
            model.root = root;

            if root_changed {
                model.workspace_sources = model
                    .root
                    .as_ref()
                    .map(|root| scan_workspace_sources(root))
                    .unwrap_or_default();
            }

            tracing::info!(
                deps = model.dependencies.len(),
                source_roots = model.source_directories.len(),
                "workspace model updated"
            );
            model.clone()
        };

        self.rebuild_detectors(&snapshot);
        true
    }

    /// Re-run every registered provider against a model snapshot, replacing
    /// the active detector set.
    fn rebuild_detectors(&self, model: &WorkspaceModel) {
        let providers: Vec<_> = self.providers.read().unwrap().clone();
        if providers.is_empty() {
            return;
        }

        let detectors: Vec<_> = providers
            .iter()
            .map(|provider| provider.create_detector(model))
            .collect();
        tracing::debug!(count = detectors.len(), "flavor detectors reinitialized");
        *self.detectors.write().unwrap() = detectors;
    }

    /// Replace only the dependency list. Returns true iff the set changed.
    pub fn update_dependencies(&self, dependencies: Vec<PathBuf>) -> bool {
        let (root, source_directories) = {
            let model = self.model.read().unwrap();
            (model.root.clone(), model.source_directories.clone())
        };
        self.update_workspace_model(root, dependencies, source_directories)
    }

    /// Effective classpath for a document: dependencies, then source roots,
    /// then additions from every flavor that recognizes the file.
    pub fn classpath_for_file(&self, uri: &DocumentUri, content: &str) -> Classpath {
        let mut classpath = {
            let model = self.model.read().unwrap();
            let mut classpath: Classpath = model.dependencies.iter().cloned().collect();
            classpath.extend(model.source_directories.iter().cloned());
            classpath
        };

        for detector in self.detectors.read().unwrap().iter() {
            if detector.is_flavor_file(uri, content) {
                tracing::debug!(flavor = detector.name(), uri = %uri, "flavor classpath applied");
                detector.enrich_classpath(&mut classpath);
            }
        }
        classpath
    }

    /// Dependency entries only, as a classpath
    pub fn dependency_classpath(&self) -> Classpath {
        self.model
            .read()
            .unwrap()
            .dependencies
            .iter()
            .cloned()
            .collect()
    }

    /// Current source roots
    pub fn source_roots(&self) -> Vec<PathBuf> {
        self.model.read().unwrap().source_directories.clone()
    }

    /// Current workspace sources
    pub fn workspace_sources(&self) -> Vec<PathBuf> {
        self.model.read().unwrap().workspace_sources.clone()
    }

    /// Current workspace root
    pub fn root(&self) -> Option<PathBuf> {
        self.model.read().unwrap().root.clone()
    }

    /// Snapshot of the whole model
    pub fn model(&self) -> WorkspaceModel {
        self.model.read().unwrap().clone()
    }
}

/// Probe conventional source layouts under the root, falling back to the
/// root itself when none exist.
fn discover_source_roots(root: &Path) -> Vec<PathBuf> {
    let mut roots: Vec<PathBuf> = SOURCE_ROOT_CANDIDATES
        .iter()
        .map(|candidate| root.join(candidate))
        .filter(|path| path.is_dir())
        .collect();

    if roots.is_empty() {
        roots.push(root.to_path_buf());
    }
    roots
}

/// Directories of GDSL descriptors under the root; pipeline DSL metadata
/// ships alongside shared libraries and joins their classpath
fn gdsl_directories(root: &Path) -> Vec<PathBuf> {
    let mut directories = Vec::new();
    for entry in WalkDir::new(root)
        .into_iter()
        .filter_entry(|entry| {
            entry
                .file_name()
                .to_str()
                .map(|name| !EXCLUDED_DIRS.contains(&name))
                .unwrap_or(true)
        })
        .filter_map(|entry| entry.ok())
    {
        if !entry.file_type().is_file() {
            continue;
        }
        if !entry.file_name().to_string_lossy().ends_with(".gdsl") {
            continue;
        }
        if let Some(parent) = entry.path().parent() {
            let parent = parent.to_path_buf();
            if !directories.contains(&parent) {
                directories.push(parent);
            }
        }
    }
    directories
}

/// Collect Groovy sources and Jenkinsfiles under the root
fn scan_workspace_sources(root: &Path) -> Vec<PathBuf> {
    WalkDir::new(root)
        .into_iter()
        .filter_entry(|entry| {
            entry
                .file_name()
                .to_str()
                .map(|name| !EXCLUDED_DIRS.contains(&name))
                .unwrap_or(true)
        })
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .filter(|entry| {
            let name = entry.file_name().to_string_lossy();
            name.ends_with(".groovy") || name == "Jenkinsfile" || name.ends_with(".jenkinsfile")
        })
        .map(|entry| entry.into_path())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_jenkins_detector_by_name_and_content() {
        let detector = JenkinsDetector::new(vec![PathBuf::from("/jenkins/libs")]);

        let jenkinsfile = DocumentUri::new("file:///ws/Jenkinsfile");
        assert!(detector.is_flavor_file(&jenkinsfile, ""));

        let other = DocumentUri::new("file:///ws/deploy.groovy");
        assert!(detector.is_flavor_file(&other, "pipeline {\n  agent any\n}"));
        assert!(detector.is_flavor_file(&other, "@Library('shared') _"));
        assert!(!detector.is_flavor_file(&other, "def x = 1"));
    }

    #[test]
    fn test_spock_detector() {
        let detector = SpockDetector::new(Vec::new());
        let uri = DocumentUri::new("file:///ws/FooSpec.groovy");

        assert!(detector.is_flavor_file(&uri, "import spock.lang.Specification"));
        assert!(detector.is_flavor_file(&uri, "class FooSpec extends Specification {}"));
        assert!(!detector.is_flavor_file(&uri, "class Foo {}"));
    }

    #[test]
    fn test_flavor_enrichment_is_additive() {
        let manager = WorkspaceManager::new();
        manager.update_workspace_model(
            Some(PathBuf::from("/ws")),
            vec![PathBuf::from("/deps/a.jar")],
            vec![PathBuf::from("/ws/src")],
        );
        manager.register_provider(Arc::new(JenkinsProvider::new(vec![PathBuf::from(
            "/jenkins/libs",
        )])));

        let uri = DocumentUri::new("file:///ws/Jenkinsfile");
        let classpath = manager.classpath_for_file(&uri, "pipeline {}");
        assert!(classpath.contains(Path::new("/deps/a.jar")));
        assert!(classpath.contains(Path::new("/ws/src")));
        assert!(classpath.contains(Path::new("/jenkins/libs")));

        let plain = DocumentUri::new("file:///ws/util.groovy");
        let classpath = manager.classpath_for_file(&plain, "def x = 1");
        assert!(!classpath.contains(Path::new("/jenkins/libs")));
    }

    /// Provider whose detector advertises how many dependencies it was
    /// built against, so tests can observe detector rebuilds directly.
    struct CountingProvider;

    impl FlavorProvider for CountingProvider {
        fn name(&self) -> &str {
            "counting"
        }

        fn create_detector(&self, model: &WorkspaceModel) -> Arc<dyn FlavorDetector> {
            Arc::new(JenkinsDetector::new(vec![PathBuf::from(format!(
                "/flavor/deps-{}.jar",
                model.dependencies.len()
            ))]))
        }
    }

    #[test]
    fn test_flavor_classpath_follows_dependency_updates() {
        let manager = WorkspaceManager::new();
        manager.register_provider(Arc::new(CountingProvider));
        manager.update_workspace_model(
            Some(PathBuf::from("/ws")),
            vec![PathBuf::from("/deps/a.jar")],
            vec![],
        );

        let uri = DocumentUri::new("file:///ws/Jenkinsfile");
        let classpath = manager.classpath_for_file(&uri, "pipeline {}");
        assert!(classpath.contains(Path::new("/flavor/deps-1.jar")));

        // A dependency change rebuilds the detectors; the enrichment must
        // reflect the new model, not the registration-time snapshot.
        manager.update_workspace_model(
            Some(PathBuf::from("/ws")),
            vec![PathBuf::from("/deps/a.jar"), PathBuf::from("/deps/b.jar")],
            vec![],
        );
        let classpath = manager.classpath_for_file(&uri, "pipeline {}");
        assert!(classpath.contains(Path::new("/flavor/deps-2.jar")));
        assert!(!classpath.contains(Path::new("/flavor/deps-1.jar")));
    }

    #[test]
    fn test_provider_registered_after_model_sees_current_state() {
        let manager = WorkspaceManager::new();
        manager.update_workspace_model(
            Some(PathBuf::from("/ws")),
            vec![PathBuf::from("/deps/a.jar")],
            vec![],
        );

        // Registration builds against the model as it is now.
        manager.register_provider(Arc::new(CountingProvider));

        let uri = DocumentUri::new("file:///ws/Jenkinsfile");
        let classpath = manager.classpath_for_file(&uri, "pipeline {}");
        assert!(classpath.contains(Path::new("/flavor/deps-1.jar")));
    }

    #[test]
    fn test_spock_provider_derives_spock_jars() {
        let provider = SpockProvider::new(vec![PathBuf::from("/libs/spock-extra")]);
        let model = WorkspaceModel {
            dependencies: vec![
                PathBuf::from("/deps/a.jar"),
                PathBuf::from("/deps/spock-core-2.3.jar"),
            ],
            ..Default::default()
        };

        let detector = provider.create_detector(&model);
        let mut classpath = Classpath::new();
        detector.enrich_classpath(&mut classpath);

        assert!(classpath.contains(Path::new("/libs/spock-extra")));
        assert!(classpath.contains(Path::new("/deps/spock-core-2.3.jar")));
        assert!(!classpath.contains(Path::new("/deps/a.jar")));
    }

    #[test]
    fn test_jenkins_provider_discovers_gdsl_directories() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        // A GDSL descriptor outside any conventional source root: its
        // directory reaches the pipeline classpath only via the provider.
        fs::create_dir_all(root.join("gdsl")).unwrap();
        fs::write(root.join("gdsl/pipeline.gdsl"), "// dsl metadata").unwrap();
        fs::write(root.join("Jenkinsfile"), "pipeline {}").unwrap();

        let manager = WorkspaceManager::new();
        manager.initialize_jenkins_workspace(JenkinsWorkspaceConfig {
            root: root.to_path_buf(),
            library_paths: vec![PathBuf::from("/jenkins/libs")],
        });

        let uri = DocumentUri::new("file:///ws/Jenkinsfile");
        let classpath = manager.classpath_for_file(&uri, "pipeline {}");
        assert!(classpath.contains(Path::new("/jenkins/libs")));
        assert!(classpath.contains(&root.join("gdsl")));
        assert!(!manager.source_roots().contains(&root.join("gdsl")));
    }

    #[test]
    fn test_clear_providers_drops_detectors() {
        let manager = WorkspaceManager::new();
        manager.register_provider(Arc::new(JenkinsProvider::new(vec![PathBuf::from(
            "/jenkins/libs",
        )])));
        manager.clear_providers();

        let uri = DocumentUri::new("file:///ws/Jenkinsfile");
        let classpath = manager.classpath_for_file(&uri, "pipeline {}");
        assert!(!classpath.contains(Path::new("/jenkins/libs")));
    }

    #[test]
    fn test_update_workspace_model_set_equality() {
        let manager = WorkspaceManager::new();
        let deps = vec![PathBuf::from("/a.jar"), PathBuf::from("/b.jar")];
        assert!(manager.update_workspace_model(Some(PathBuf::from("/ws")), deps.clone(), vec![]));

        // Same sets, different order: not a change.
        let reordered = vec![PathBuf::from("/b.jar"), PathBuf::from("/a.jar")];
        assert!(!manager.update_workspace_model(Some(PathBuf::from("/ws")), reordered, vec![]));

        // One entry differs: a change.
        let changed = vec![PathBuf::from("/a.jar"), PathBuf::from("/c.jar")];
        assert!(manager.update_workspace_model(Some(PathBuf::from("/ws")), changed, vec![]));
    }

    #[test]
    fn test_initialize_workspace_discovers_layout() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        fs::create_dir_all(root.join("src/main/groovy/demo")).unwrap();
        fs::write(
            root.join("src/main/groovy/demo/App.groovy"),
            "class App {}",
        )
        .unwrap();
        fs::write(root.join("Jenkinsfile"), "pipeline {}").unwrap();
        fs::create_dir_all(root.join("build/classes")).unwrap();
        fs::write(root.join("build/classes/Gen.groovy"), "// generated").unwrap();

        let manager = WorkspaceManager::new();
        manager.initialize_workspace(root);

        let roots = manager.source_roots();
        assert!(roots.contains(&root.join("src/main/groovy")));

        let sources = manager.workspace_sources();
        assert!(sources.contains(&root.join("src/main/groovy/demo/App.groovy")));
        assert!(sources.contains(&root.join("Jenkinsfile")));
        assert!(
            !sources.iter().any(|p| p.starts_with(root.join("build"))),
            "excluded directories must not be scanned"
        );
    }

    #[test]
    fn test_source_root_fallback_to_root() {
        let temp = TempDir::new().unwrap();
        let manager = WorkspaceManager::new();
        manager.initialize_workspace(temp.path());
        assert_eq!(manager.source_roots(), vec![temp.path().to_path_buf()]);
    }
}
