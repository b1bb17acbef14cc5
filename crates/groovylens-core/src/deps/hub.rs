//! Centralized dependency broadcast
//!
//! A single source of truth for the resolved dependency list. Compilation
//! scopes (single-file, workspace, flavor-specific) register as listeners
//! and are told about every effective change; they never poll the resolver
//! themselves.

use crate::error::Result;
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, RwLock};

/// Receives dependency-list updates
pub trait DependencyListener: Send + Sync {
    /// Called with the full new dependency list after every effective change
    fn on_dependencies_updated(&self, dependencies: &[PathBuf]) -> Result<()>;
}

/// Observer hub broadcasting classpath changes
#[derive(Default)]
pub struct CentralizedDependencyManager {
    /// Current list. The mutex also serializes notification rounds, so
    /// listeners observe updates in call order.
    dependencies: Mutex<Vec<PathBuf>>,
    listeners: RwLock<Vec<Arc<dyn DependencyListener>>>,
}

impl CentralizedDependencyManager {
    /// Create an empty hub
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the dependency list and notify every listener. Set-equal
    /// input is a no-op. Listeners are notified serially, in registration
    /// order; a failing listener is logged and does not block the rest.
    pub fn update_dependencies(&self, new_dependencies: Vec<PathBuf>) {
        let mut current = self.dependencies.lock().unwrap();
        if same_set(&current, &new_dependencies) {
            tracing::debug!("dependency update ignored: set unchanged");
            return;
        }

        *current = new_dependencies;
        tracing::info!(count = current.len(), "dependencies updated, notifying listeners");
        self.notify_all(&current);
    }

    /// Register a listener. If a non-empty dependency list is already
    /// known, the listener is brought up to date before registration
    /// returns, so no update can fall between registration and first
    /// notification.
    pub fn add_listener(&self, listener: Arc<dyn DependencyListener>) {
        let current = self.dependencies.lock().unwrap();
        if !current.is_empty() {
            notify_one(listener.as_ref(), &current);
        }
        self.listeners.write().unwrap().push(listener);
    }

    /// Remove a previously registered listener
    pub fn remove_listener(&self, listener: &Arc<dyn DependencyListener>) {
        self.listeners
            .write()
            .unwrap()
            .retain(|existing| !Arc::ptr_eq(existing, listener));
    }

    /// Clear the dependency list, notifying listeners iff it was non-empty
    pub fn clear_dependencies(&self) {
        let mut current = self.dependencies.lock().unwrap();
        if current.is_empty() {
            return;
        }
        current.clear();
        tracing::info!("dependencies cleared, notifying listeners");
        self.notify_all(&current);
    }

    /// Snapshot of the current dependency list
    pub fn current_dependencies(&self) -> Vec<PathBuf> {
        self.dependencies.lock().unwrap().clone()
    }

    /// Number of registered listeners
    pub fn listener_count(&self) -> usize {
        self.listeners.read().unwrap().len()
    }

    fn notify_all(&self, dependencies: &[PathBuf]) {
        let snapshot: Vec<_> = self.listeners.read().unwrap().clone();
        for listener in snapshot {
            notify_one(listener.as_ref(), dependencies);
        }
    }
}

/// The hub can sit directly behind a resolution run as its observer:
/// every successful resolution is broadcast to the registered listeners.
impl super::ResolutionObserver for CentralizedDependencyManager {
    fn on_progress(&self, percent: u8, message: &str) {
        tracing::debug!(percent, message, "dependency resolution progress");
    }

    fn on_complete(&self, dependencies: &[PathBuf]) {
        self.update_dependencies(dependencies.to_vec());
    }

    fn on_error(&self, error: &crate::error::Error) {
        tracing::warn!("dependency resolution failed, keeping previous list: {error}");
    }
}

fn notify_one(listener: &dyn DependencyListener, dependencies: &[PathBuf]) {
    if let Err(e) = listener.on_dependencies_updated(dependencies) {
        tracing::warn!("dependency listener failed: {e}");
    }
}

fn same_set(a: &[PathBuf], b: &[PathBuf]) -> bool {
    let a: HashSet<_> = a.iter().collect();
    let b: HashSet<_> = b.iter().collect();
    a == b
}
