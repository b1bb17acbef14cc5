//! Debounced file system watcher
//!
//! Wraps a platform watcher and coalesces the burst of raw events a single
//! editor save produces into one [`WatchEvent`] per path.

use crate::error::{Error, Result};
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio::time::sleep;

/// Kind of observed file change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchKind {
    /// File created
    Created,
    /// File content or metadata modified
    Modified,
    /// File removed
    Removed,
}

/// A debounced file change notification
#[derive(Debug, Clone)]
pub struct WatchEvent {
    /// Root directory the watch was registered under
    pub watch_root: PathBuf,
    /// Changed file path
    pub path: PathBuf,
    /// Kind of change
    pub kind: WatchKind,
    /// When the last raw event for this path was seen
    pub at: Instant,
}

impl WatchEvent {
    /// Create a new watch event stamped with the current time
    pub fn new(watch_root: PathBuf, path: PathBuf, kind: WatchKind) -> Self {
        Self {
            watch_root,
            path,
            kind,
            at: Instant::now(),
        }
    }
}

/// Coalesces raw events per path: only the newest event for a path is
/// delivered, and only once the path has been quiet for the debounce window.
struct Debouncer {
    pending: Arc<Mutex<HashMap<PathBuf, WatchEvent>>>,
    tx: mpsc::UnboundedSender<WatchEvent>,
    window: Duration,
}

impl Debouncer {
    fn new(tx: mpsc::UnboundedSender<WatchEvent>, window: Duration) -> Self {
        Self {
            pending: Arc::new(Mutex::new(HashMap::new())),
            tx,
            window,
        }
    }

    fn submit(&self, event: WatchEvent) {
        let path = event.path.clone();
        {
            let mut pending = self.pending.lock().unwrap();
            pending.insert(path.clone(), event);
        }

        let pending = Arc::clone(&self.pending);
        let tx = self.tx.clone();
        let window = self.window;

        tokio::spawn(async move {
            sleep(window).await;

            let flushed = {
                let mut pending = pending.lock().unwrap();
                match pending.get(&path) {
                    // A newer raw event restarted the window; its own flush
                    // task will deliver it.
                    Some(ev) if ev.at.elapsed() < window => None,
                    Some(_) => pending.remove(&path),
                    None => None,
                }
            };

            if let Some(event) = flushed {
                let _ = tx.send(event);
            }
        });
    }
}

/// Debounced file system watcher
pub struct FileWatcher {
    watcher: RecommendedWatcher,
    debouncer: Arc<Debouncer>,
    rx: mpsc::UnboundedReceiver<WatchEvent>,
    roots: Arc<Mutex<Vec<PathBuf>>>,
}

impl FileWatcher {
    /// Default debounce window applied by [`FileWatcher::new`]
    pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(50);

    /// Create a watcher with the default debounce window
    pub fn new() -> Result<Self> {
        Self::with_debounce(Self::DEFAULT_DEBOUNCE)
    }

    /// Create a watcher with a custom debounce window
    pub fn with_debounce(window: Duration) -> Result<Self> {
        let (event_tx, rx) = mpsc::unbounded_channel();
        let debouncer = Arc::new(Debouncer::new(event_tx, window));
        let roots: Arc<Mutex<Vec<PathBuf>>> = Arc::new(Mutex::new(Vec::new()));

        let (raw_tx, mut raw_rx) = mpsc::unbounded_channel();
        let watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| {
                if let Ok(event) = res {
                    let _ = raw_tx.send(event);
                }
            },
            Config::default(),
        )
        .map_err(|e| Error::watcher(format!("failed to create watcher: {e}")))?;

        let debouncer_task = Arc::clone(&debouncer);
        let roots_task = Arc::clone(&roots);
        tokio::spawn(async move {
            while let Some(event) = raw_rx.recv().await {
                for converted in convert_event(&event, &roots_task) {
                    debouncer_task.submit(converted);
                }
            }
        });

        Ok(Self {
            watcher,
            debouncer,
            rx,
            roots,
        })
    }

    /// Watch a directory tree
    pub fn watch_dir(&mut self, root: &Path) -> Result<()> {
        self.watcher
            .watch(root, RecursiveMode::Recursive)
            .map_err(|e| Error::watcher(format!("failed to watch {}: {e}", root.display())))?;

        tracing::debug!(root = %root.display(), "watching directory tree");
        self.roots.lock().unwrap().push(root.to_path_buf());
        Ok(())
    }

    /// Stop watching a directory tree
    pub fn unwatch(&mut self, root: &Path) -> Result<()> {
        self.watcher
            .unwatch(root)
            .map_err(|e| Error::watcher(format!("failed to unwatch {}: {e}", root.display())))?;

        tracing::debug!(root = %root.display(), "stopped watching directory tree");
        self.roots.lock().unwrap().retain(|p| p != root);
        Ok(())
    }

    /// Receive the next debounced change, or `None` once the watcher is gone
    pub async fn next_change(&mut self) -> Option<WatchEvent> {
        self.rx.recv().await
    }

    /// Debounce window this watcher coalesces with
    pub fn debounce_window(&self) -> Duration {
        self.debouncer.window
    }
}

/// Map a raw notify event onto debounced events, one per affected path.
fn convert_event(event: &Event, roots: &Arc<Mutex<Vec<PathBuf>>>) -> Vec<WatchEvent> {
    let kind = match event.kind {
        EventKind::Create(_) => WatchKind::Created,
        EventKind::Modify(_) | EventKind::Any => WatchKind::Modified,
        EventKind::Remove(_) => WatchKind::Removed,
        _ => return Vec::new(),
    };

    let roots = roots.lock().unwrap();
    event
        .paths
        .iter()
        .map(|path| {
            let watch_root = roots
                .iter()
                .find(|root| path.starts_with(root))
                .cloned()
                .unwrap_or_else(|| path.clone());
            WatchEvent::new(watch_root, path.clone(), kind)
        })
        .collect()
}
