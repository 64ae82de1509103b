//! File watching for the dev server.

use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::time::{Duration, Instant};

use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc as async_mpsc;

use niveflow_sync::fingerprint::is_tracked;
use niveflow_sync::fsutil::is_ignored_name;

use crate::error::ServerError;

/// A change to a file that feeds the site.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchEvent {
    Changed(PathBuf),
    Removed(PathBuf),
}

impl WatchEvent {
    pub fn path(&self) -> &Path {
        match self {
            WatchEvent::Changed(path) | WatchEvent::Removed(path) => path,
        }
    }
}

/// Watches directories for `.md`/`.json` changes. Stops when dropped.
pub struct FileWatcher {
    _watcher: RecommendedWatcher,
}

impl FileWatcher {
    /// Watch `paths` recursively; `debounce` collapses bursts of events.
    pub fn new(
        paths: &[PathBuf],
        debounce: Duration,
    ) -> Result<(Self, async_mpsc::Receiver<WatchEvent>), ServerError> {
        let (sync_tx, sync_rx) = mpsc::channel();
        let (async_tx, async_rx) = async_mpsc::channel(100);

        let mut watcher = notify::recommended_watcher(move |res: Result<notify::Event, _>| {
            if let Ok(event) = res {
                let _ = sync_tx.send(event);
            }
        })
        .map_err(|e| ServerError::Watch(e.to_string()))?;

        for path in paths {
            if path.exists() {
                watcher
                    .watch(path, RecursiveMode::Recursive)
                    .map_err(|e| ServerError::Watch(format!("{}: {}", path.display(), e)))?;
            } else {
                tracing::warn!("Not watching missing path {}", path.display());
            }
        }

        let roots = paths.to_vec();
        std::thread::spawn(move || {
            let mut debouncer = Debouncer::new(debounce);

            loop {
                let received = match debouncer.wait(Instant::now()) {
                    Some(wait) => sync_rx.recv_timeout(wait),
                    None => sync_rx.recv().map_err(|_| RecvTimeoutError::Disconnected),
                };

                match received {
                    Ok(event) => {
                        let events = event
                            .paths
                            .iter()
                            .filter_map(|path| classify_event(&roots, path, &event.kind));
                        debouncer.push(events, Instant::now());
                    }
                    Err(RecvTimeoutError::Timeout) => {}
                    Err(RecvTimeoutError::Disconnected) => return,
                }

                for e in debouncer.flush(Instant::now()) {
                    if async_tx.blocking_send(e).is_err() {
                        return;
                    }
                }
            }
        });

        Ok((Self { _watcher: watcher }, async_rx))
    }
}

/// Holds events until no new one has arrived for `quiet`.
#[derive(Debug)]
struct Debouncer {
    quiet: Duration,
    pending: Vec<WatchEvent>,
    last: Option<Instant>,
}

impl Debouncer {
    fn new(quiet: Duration) -> Self {
        Self {
            quiet,
            pending: Vec::new(),
            last: None,
        }
    }

    fn push(&mut self, events: impl IntoIterator<Item = WatchEvent>, now: Instant) {
        for event in events {
            self.last = Some(now);
            if !self.pending.contains(&event) {
                self.pending.push(event);
            }
        }
    }

    /// Time left until pending events are due, `None` when nothing is pending.
    fn wait(&self, now: Instant) -> Option<Duration> {
        if self.pending.is_empty() {
            return None;
        }
        let due = self.last? + self.quiet;
        Some(due.saturating_duration_since(now))
    }

    /// Pending events once the burst has gone quiet.
    fn flush(&mut self, now: Instant) -> Vec<WatchEvent> {
        match self.wait(now) {
            Some(wait) if wait.is_zero() => {
                self.last = None;
                std::mem::take(&mut self.pending)
            }
            _ => Vec::new(),
        }
    }
}

/// Map a raw event to a [`WatchEvent`]; only tracked files outside hidden
/// directories and `node_modules` (below the watched root) count.
fn classify_event(roots: &[PathBuf], path: &Path, kind: &EventKind) -> Option<WatchEvent> {
    let relative = roots
        .iter()
        .find_map(|root| path.strip_prefix(root).ok())
        .unwrap_or_else(|| Path::new(path.file_name().unwrap_or_default()));
    let hidden = relative
        .components()
        .any(|c| is_ignored_name(&c.as_os_str().to_string_lossy()));
    let name = path.file_name()?.to_string_lossy();
    if hidden || !is_tracked(&name) {
        return None;
    }

    match kind {
        EventKind::Create(_) | EventKind::Modify(_) => Some(WatchEvent::Changed(path.to_path_buf())),
        EventKind::Remove(_) => Some(WatchEvent::Removed(path.to_path_buf())),
        _ => None,
    }
}
