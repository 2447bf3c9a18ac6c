//! File watcher that triggers a reload.

use std::path::{Path, PathBuf};
use std::time::Duration;

use notify::{
    Config, Event, EventKind, PollWatcher, RecommendedWatcher, RecursiveMode, Watcher,
};
use tokio::sync::mpsc;

use crate::config::ReloaderType;
use crate::reload::ReloaderError;

/// The running executable followed by `extra`.
pub fn watched_paths(extra: &[PathBuf]) -> Result<Vec<PathBuf>, ReloaderError> {
    let exe = std::env::current_exe().map_err(ReloaderError::CurrentExe)?;
    let mut paths = Vec::with_capacity(extra.len() + 1);
    paths.push(exe);
    paths.extend(extra.iter().cloned());
    Ok(paths)
}

enum ActiveWatcher {
    Native(RecommendedWatcher),
    Poll(PollWatcher),
}

impl ActiveWatcher {
    fn watch(&mut self, path: &Path, mode: RecursiveMode) -> notify::Result<()> {
        match self {
            ActiveWatcher::Native(watcher) => watcher.watch(path, mode),
            ActiveWatcher::Poll(watcher) => watcher.watch(path, mode),
        }
    }
}

/// What a change must touch to count.
#[derive(Debug, Clone)]
enum Target {
    File(PathBuf),
    Dir(PathBuf),
}

impl Target {
    fn matches(&self, changed: &Path) -> bool {
        match self {
            Target::File(file) => changed == file,
            Target::Dir(dir) => changed.starts_with(dir),
        }
    }
}

/// Watches a set of files and directories and reports the first change.
pub struct FileWatcher {
    _watcher: ActiveWatcher,
    rx: mpsc::UnboundedReceiver<PathBuf>,
}

impl FileWatcher {
    /// Start watching `paths` with the chosen backend.
    ///
    /// Files are watched through their parent directory. Directories are
    /// watched recursively. Paths that do not exist are skipped with a warning.
    pub fn start(paths: &[PathBuf], kind: ReloaderType, interval: Duration) -> Result<Self, ReloaderError> {
        let (tx, rx) = mpsc::unbounded_channel();
        let targets: Vec<Target> = paths.iter().filter_map(|p| target_for(p)).collect();

        let handler_targets = targets.clone();
        let handler = move |res: notify::Result<Event>| match res {
            Ok(event) => {
                if !is_relevant(&event.kind) {
                    return;
                }
                let hit = event
                    .paths
                    .iter()
                    .find(|changed| handler_targets.iter().any(|t| t.matches(changed)));
                if let Some(changed) = hit {
                    let _ = tx.send(changed.clone());
                }
            }
            Err(e) => tracing::error!(error = %e, "Watch error"),
        };

        let config = Config::default().with_poll_interval(interval);
        let mut watcher = match kind {
            ReloaderType::Notify => ActiveWatcher::Native(RecommendedWatcher::new(handler, config)?),
            ReloaderType::Poll => ActiveWatcher::Poll(PollWatcher::new(handler, config)?),
        };

        let mut watched_dirs: Vec<PathBuf> = Vec::new();
        for target in &targets {
            let (dir, mode) = match target {
                Target::Dir(dir) => (dir.clone(), RecursiveMode::Recursive),
                Target::File(file) => match file.parent() {
                    Some(parent) => (parent.to_path_buf(), RecursiveMode::NonRecursive),
                    None => continue,
                },
            };
            if watched_dirs.contains(&dir) {
                continue;
            }
            watcher.watch(&dir, mode)?;
            watched_dirs.push(dir);
        }

        let backend = match kind {
            ReloaderType::Notify => "notify",
            ReloaderType::Poll => "poll",
        };
        tracing::info!(backend, files = targets.len(), "File watcher started");

        Ok(Self { _watcher: watcher, rx })
    }

    /// Wait for the next change to a watched path.
    ///
    /// Returns `None` only if the watcher backend has stopped.
    pub async fn changed(&mut self) -> Option<PathBuf> {
        self.rx.recv().await
    }
}

fn target_for(path: &Path) -> Option<Target> {
    match path.canonicalize() {
        Ok(canonical) if canonical.is_dir() => Some(Target::Dir(canonical)),
        Ok(canonical) => Some(Target::File(canonical)),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Not watching missing path");
            None
        }
    }
}

fn is_relevant(kind: &EventKind) -> bool {
    kind.is_modify() || kind.is_create() || kind.is_remove()
}
