//! Classpath indexing
//!
//! [`ClasspathService`] turns an ordered list of classpath entries (JARs and
//! class directories) into an in-memory table of classes, lazily and behind
//! a mutex. The table is the Rust stand-in for a closable URL classloader:
//! dropping it releases every archive handle, and the next lookup rebuilds
//! it from the current entry list.

use crate::error::{Error, Result};
use crate::uri::DocumentUri;
use rayon::prelude::*;
use std::collections::HashMap;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, RwLock};
use walkdir::WalkDir;
use zip::ZipArchive;

/// Ordered list of classpath entries. Order is resolution order; duplicates
/// are dropped on insertion.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Classpath {
    entries: Vec<PathBuf>,
}

impl Classpath {
    /// Create an empty classpath
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry unless it is already present
    pub fn push(&mut self, entry: impl Into<PathBuf>) {
        let entry = entry.into();
        if !self.entries.contains(&entry) {
            self.entries.push(entry);
        }
    }

    /// Append several entries, preserving order and dropping duplicates
    pub fn extend(&mut self, entries: impl IntoIterator<Item = PathBuf>) {
        for entry in entries {
            self.push(entry);
        }
    }

    /// The entries in resolution order
    pub fn entries(&self) -> &[PathBuf] {
        &self.entries
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the classpath is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether an entry is present
    pub fn contains(&self, entry: &Path) -> bool {
        self.entries.iter().any(|e| e == entry)
    }
}

impl From<Vec<PathBuf>> for Classpath {
    fn from(entries: Vec<PathBuf>) -> Self {
        let mut classpath = Classpath::new();
        classpath.extend(entries);
        classpath
    }
}

impl FromIterator<PathBuf> for Classpath {
    fn from_iter<T: IntoIterator<Item = PathBuf>>(iter: T) -> Self {
        let mut classpath = Classpath::new();
        classpath.extend(iter);
        classpath
    }
}

/// Where an indexed class lives
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClassContainer {
    /// Inside a JAR archive
    Jar(PathBuf),
    /// Under a class directory
    Directory(PathBuf),
}

/// One class found on the classpath
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassEntry {
    /// Simple class name (`Lib`)
    pub simple_name: String,
    /// Fully qualified name (`com.example.Lib`)
    pub fqcn: String,
    /// Containing JAR or directory
    pub container: ClassContainer,
    /// Resource path inside the container (`com/example/Lib.class`)
    pub resource_path: String,
}

impl ClassEntry {
    /// URI of the class resource: `jar:file:` for archive members,
    /// `file:` for directory entries
    pub fn uri(&self) -> DocumentUri {
        match &self.container {
            ClassContainer::Jar(jar) => DocumentUri::from_jar_entry(jar, &self.resource_path),
            ClassContainer::Directory(dir) => DocumentUri::from_path(dir.join(&self.resource_path)),
        }
    }
}

/// Immutable class table built from one snapshot of the classpath
#[derive(Debug, Default)]
struct ClassTable {
    by_fqcn: HashMap<String, ClassEntry>,
    by_simple: HashMap<String, Vec<ClassEntry>>,
    class_count: usize,
}

impl ClassTable {
    fn insert(&mut self, entry: ClassEntry) {
        self.class_count += 1;
        self.by_simple
            .entry(entry.simple_name.clone())
            .or_default()
            .push(entry.clone());
        // First entry on the classpath wins, like classloader resolution.
        self.by_fqcn.entry(entry.fqcn.clone()).or_insert(entry);
    }
}

/// Lazily built class index over the current classpath
#[derive(Debug, Default)]
pub struct ClasspathService {
    entries: RwLock<Vec<PathBuf>>,
    table: Mutex<Option<Arc<ClassTable>>>,
}

impl ClasspathService {
    /// Create a service with an empty classpath
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the classpath entry list. Returns true when the list actually
    /// changed; the lazily built table is dropped in that case.
    pub fn set_entries(&self, entries: Vec<PathBuf>) -> bool {
        {
            let current = self.entries.read().unwrap();
            if *current == entries {
                return false;
            }
        }
        *self.entries.write().unwrap() = entries;
        self.invalidate();
        true
    }

    /// Current classpath entries
    pub fn entries(&self) -> Vec<PathBuf> {
        self.entries.read().unwrap().clone()
    }

    /// Drop the built table; archive handles are released with it. The next
    /// lookup rebuilds from the current entry list.
    pub fn invalidate(&self) {
        let mut table = self.table.lock().unwrap();
        if table.take().is_some() {
            tracing::debug!("classpath index invalidated");
        }
    }

    /// Locate a class by fully qualified name
    pub fn find_class(&self, fqcn: &str) -> Option<DocumentUri> {
        let table = self.table_snapshot();
        table.by_fqcn.get(fqcn).map(ClassEntry::uri)
    }

    /// All classes sharing a simple name
    pub fn find_by_simple_name(&self, simple_name: &str) -> Vec<ClassEntry> {
        let table = self.table_snapshot();
        table
            .by_simple
            .get(simple_name)
            .cloned()
            .unwrap_or_default()
    }

    /// Number of classes currently indexed (builds the table if needed)
    pub fn class_count(&self) -> usize {
        self.table_snapshot().class_count
    }

    /// Get or build the table under the mutex.
    fn table_snapshot(&self) -> Arc<ClassTable> {
        let mut slot = self.table.lock().unwrap();
        if let Some(table) = slot.as_ref() {
            return Arc::clone(table);
        }

        let entries = self.entries();
        let table = Arc::new(build_table(&entries));
        tracing::info!(
            entries = entries.len(),
            classes = table.class_count,
            "classpath index built"
        );
        *slot = Some(Arc::clone(&table));
        table
    }
}

/// Scan every classpath entry in parallel and merge into one table.
/// Unreadable entries are logged and skipped.
fn build_table(entries: &[PathBuf]) -> ClassTable {
    let scanned: Vec<Vec<ClassEntry>> = entries
        .par_iter()
        .map(|entry| match scan_entry(entry) {
            Ok(classes) => classes,
            Err(e) => {
                tracing::warn!("skipping classpath entry {}: {e}", entry.display());
                Vec::new()
            }
        })
        .collect();

    let mut table = ClassTable::default();
    for classes in scanned {
        for class in classes {
            table.insert(class);
        }
    }
    table
}

fn scan_entry(entry: &Path) -> Result<Vec<ClassEntry>> {
    if entry.is_dir() {
        scan_directory(entry)
    } else if entry.extension().is_some_and(|ext| ext == "jar") {
        scan_jar(entry)
    } else {
        Ok(Vec::new())
    }
}

fn scan_jar(jar: &Path) -> Result<Vec<ClassEntry>> {
    let file = File::open(jar)?;
    let archive = ZipArchive::new(file)
        .map_err(|e| Error::classpath(jar, format!("unreadable archive: {e}")))?;

    Ok(archive
        .file_names()
        .filter_map(|name| class_entry_for(name, ClassContainer::Jar(jar.to_path_buf())))
        .collect())
}

fn scan_directory(dir: &Path) -> Result<Vec<ClassEntry>> {
    let mut classes = Vec::new();
    for entry in WalkDir::new(dir).into_iter().filter_map(|e| e.ok()) {
        if !entry.file_type().is_file() {
            continue;
        }
        let Ok(relative) = entry.path().strip_prefix(dir) else {
            continue;
        };
        let resource = relative.to_string_lossy().replace('\\', "/");
        if let Some(class) = class_entry_for(&resource, ClassContainer::Directory(dir.to_path_buf()))
        {
            classes.push(class);
        }
    }
    Ok(classes)
}

/// Build a [`ClassEntry`] from a `.class` resource path, skipping synthetic
/// and anonymous classes (names containing `$`).
fn class_entry_for(resource_path: &str, container: ClassContainer) -> Option<ClassEntry> {
    let stem = resource_path.strip_suffix(".class")?;
    if stem.contains('$') {
        return None;
    }

    let fqcn = stem.replace('/', ".");
    let simple_name = fqcn.rsplit('.').next().unwrap_or(&fqcn).to_string();
    Some(ClassEntry {
        simple_name,
        fqcn,
        container,
        resource_path: resource_path.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::io::Write;
    use tempfile::TempDir;
    use zip::write::SimpleFileOptions;

    fn write_fixture_jar(path: &Path, entries: &[&str]) {
        let file = File::create(path).unwrap();
        let mut writer = zip::ZipWriter::new(file);
        for entry in entries {
            writer
                .start_file(entry.to_string(), SimpleFileOptions::default())
                .unwrap();
            writer.write_all(b"\xca\xfe\xba\xbe").unwrap();
        }
        writer.finish().unwrap();
    }

    #[test]
    fn test_classpath_dedup_preserves_order() {
        let mut classpath = Classpath::new();
        classpath.push("/a.jar");
        classpath.push("/b.jar");
        classpath.push("/a.jar");
        assert_eq!(
            classpath.entries(),
            &[PathBuf::from("/a.jar"), PathBuf::from("/b.jar")]
        );
    }

    #[test]
    fn test_jar_indexing() {
        let temp = TempDir::new().unwrap();
        let jar = temp.path().join("lib.jar");
        write_fixture_jar(
            &jar,
            &[
                "com/example/Lib.class",
                "com/example/Lib$Inner.class",
                "com/example/util/Helper.class",
                "META-INF/MANIFEST.MF",
            ],
        );

        let service = ClasspathService::new();
        service.set_entries(vec![jar.clone()]);

        let uri = service.find_class("com.example.Lib").unwrap();
        assert_eq!(
            uri.as_str(),
            format!(
                "jar:file://{}!/com/example/Lib.class",
                jar.to_string_lossy()
            )
        );
        assert!(service.find_class("com.example.util.Helper").is_some());
        // Inner classes are skipped.
        assert!(service.find_class("com.example.Lib$Inner").is_none());
        assert_eq!(service.class_count(), 2);
    }

    #[test]
    fn test_directory_indexing() {
        let temp = TempDir::new().unwrap();
        let classes = temp.path().join("classes");
        fs::create_dir_all(classes.join("com/example")).unwrap();
        fs::write(classes.join("com/example/Lib.class"), b"\xca\xfe").unwrap();

        let service = ClasspathService::new();
        service.set_entries(vec![classes.clone()]);

        let uri = service.find_class("com.example.Lib").unwrap();
        assert!(uri.as_str().starts_with("file://"));
        assert!(uri.as_str().ends_with("com/example/Lib.class"));
    }

    #[test]
    fn test_simple_name_lookup() {
        let temp = TempDir::new().unwrap();
        let jar = temp.path().join("lib.jar");
        write_fixture_jar(&jar, &["a/Lib.class", "b/Lib.class"]);

        let service = ClasspathService::new();
        service.set_entries(vec![jar]);

        let found = service.find_by_simple_name("Lib");
        assert_eq!(found.len(), 2);
    }

    #[test]
    fn test_set_entries_detects_change() {
        let service = ClasspathService::new();
        assert!(service.set_entries(vec![PathBuf::from("/a.jar")]));
        assert!(!service.set_entries(vec![PathBuf::from("/a.jar")]));
        assert!(service.set_entries(vec![PathBuf::from("/b.jar")]));
    }

    #[test]
    fn test_unreadable_entry_is_skipped() {
        let temp = TempDir::new().unwrap();
        let bogus = temp.path().join("not-a.jar");
        fs::write(&bogus, b"garbage").unwrap();

        let service = ClasspathService::new();
        service.set_entries(vec![bogus]);
        assert_eq!(service.class_count(), 0);
    }

    #[test]
    fn test_invalidate_forces_rebuild() {
        let temp = TempDir::new().unwrap();
        let jar = temp.path().join("lib.jar");
        write_fixture_jar(&jar, &["x/A.class"]);

        let service = ClasspathService::new();
        service.set_entries(vec![jar.clone()]);
        assert_eq!(service.class_count(), 1);

        // Add a class to the archive; the built table is stale until
        // invalidated.
        write_fixture_jar(&jar, &["x/A.class", "x/B.class"]);
        assert_eq!(service.class_count(), 1);
        service.invalidate();
        assert_eq!(service.class_count(), 2);
    }
}
