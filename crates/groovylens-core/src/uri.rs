//! Canonical document identifiers
//!
//! Every cache and index in the crate is keyed by [`DocumentUri`]. Clients
//! send the same document under syntactically different URIs (`file:///a/b`,
//! `file:///a//b`, `file:///a/./b`), so URIs are canonicalized once at
//! construction and compared by canonical form only.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// An opaque, canonicalized document identifier (`file:` or `jar:file:`)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DocumentUri(String);

impl DocumentUri {
    /// Canonicalize and wrap a URI string
    pub fn new(uri: impl AsRef<str>) -> Self {
        Self(canonicalize(uri.as_ref()))
    }

    /// Build a `file:` URI from a filesystem path
    pub fn from_path(path: impl AsRef<Path>) -> Self {
        let normalized = normalize_path(path.as_ref());
        let mut text = normalized.to_string_lossy().replace('\\', "/");
        if !text.starts_with('/') {
            text.insert(0, '/');
        }
        Self(format!("file://{text}"))
    }

    /// Build a `jar:file:` URI pointing at an entry inside an archive
    pub fn from_jar_entry(jar: impl AsRef<Path>, entry: &str) -> Self {
        let jar = normalize_path(jar.as_ref());
        let mut text = jar.to_string_lossy().replace('\\', "/");
        if !text.starts_with('/') {
            text.insert(0, '/');
        }
        Self(format!("jar:file://{text}!/{}", entry.trim_start_matches('/')))
    }

    /// The canonical URI text
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Filesystem path for `file:` URIs, `None` for other schemes
    pub fn to_file_path(&self) -> Option<PathBuf> {
        self.0
            .strip_prefix("file://")
            .map(PathBuf::from)
    }

    /// Whether this URI points inside an archive
    pub fn is_jar(&self) -> bool {
        self.0.starts_with("jar:")
    }

    /// Last path segment, e.g. `Jenkinsfile` or `Foo.groovy`
    pub fn file_name(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or("")
    }
}

impl fmt::Display for DocumentUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DocumentUri {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Canonicalize a URI string: lowercase the scheme and normalize the path of
/// `file:` URIs. Other schemes are kept opaque apart from the scheme case.
fn canonicalize(uri: &str) -> String {
    let Some(colon) = uri.find(':') else {
        // Not a URI; treat as a raw path.
        return DocumentUri::from_path(uri).0;
    };

    let scheme = uri[..colon].to_ascii_lowercase();
    let rest = &uri[colon + 1..];

    if scheme == "file" {
        let path = rest.trim_start_matches("//");
        let normalized = normalize_path(Path::new(&format!("/{}", path.trim_start_matches('/'))));
        format!("file://{}", normalized.to_string_lossy().replace('\\', "/"))
    } else {
        format!("{scheme}:{rest}")
    }
}

/// Lexically normalize a path: drop `.` components, resolve `..` against the
/// parent where possible, collapse duplicate separators.
fn normalize_path(path: &Path) -> PathBuf {
    use std::path::Component;

    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push(component.as_os_str());
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_equivalent_file_uris_canonicalize_equal() {
        let a = DocumentUri::new("file:///work/src/Main.groovy");
        let b = DocumentUri::new("file:///work//src/./Main.groovy");
        let c = DocumentUri::new("FILE:///work/lib/../src/Main.groovy");
        assert_eq!(a, b);
        assert_eq!(a, c);
    }

    #[test]
    fn test_from_path_round_trip() {
        let uri = DocumentUri::from_path("/work/src/Main.groovy");
        assert_eq!(uri.as_str(), "file:///work/src/Main.groovy");
        assert_eq!(uri.to_file_path(), Some(PathBuf::from("/work/src/Main.groovy")));
    }

    #[test]
    fn test_jar_entry_uri() {
        let uri = DocumentUri::from_jar_entry("/deps/lib.jar", "com/example/Lib.class");
        assert_eq!(uri.as_str(), "jar:file:///deps/lib.jar!/com/example/Lib.class");
        assert!(uri.is_jar());
        assert_eq!(uri.to_file_path(), None);
    }

    #[test]
    fn test_file_name() {
        assert_eq!(
            DocumentUri::new("file:///ws/Jenkinsfile").file_name(),
            "Jenkinsfile"
        );
    }
}
