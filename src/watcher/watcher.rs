//! File system watcher using notify.
//!
//! The notify callback runs on its own thread; events are mapped and handed
//! to the async indexing context through an unbounded channel so a burst of
//! rapid file events can never stall notification delivery.

use std::path::Path;

use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use super::events::{map_event, FileEvent};
use crate::error::WatcherError;
use crate::Result;

/// File system watcher for one project root.
///
/// Dropping the watcher unsubscribes from OS notifications and, once the
/// callback thread quiesces, closes the event channel.
pub struct FileWatcher {
    watcher: RecommendedWatcher,
    event_rx: Option<mpsc::UnboundedReceiver<FileEvent>>,
}

impl FileWatcher {
    /// Create a watcher subscribed recursively to the given root.
    ///
    /// # Errors
    ///
    /// Returns an error if the OS watcher cannot be created or the root
    /// cannot be watched.
    pub fn new(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref();

        if !root.exists() {
            return Err(WatcherError::WatchFailed {
                path: root.display().to_string(),
                reason: "directory does not exist".to_string(),
            }
            .into());
        }

        let (event_tx, event_rx) = mpsc::unbounded_channel();

        let mut watcher = notify::recommended_watcher(
            move |result: std::result::Result<notify::Event, notify::Error>| match result {
                Ok(event) => {
                    for mapped in map_event(&event) {
                        // Unbounded send never blocks the notify thread;
                        // a closed channel just means we are shutting down
                        let _ = event_tx.send(mapped);
                    }
                }
                Err(e) => {
                    tracing::error!(error = %e, "Watch error");
                }
            },
        )
        .map_err(|e| WatcherError::WatchFailed {
            path: root.display().to_string(),
            reason: e.to_string(),
        })?;

        watcher
            .watch(root, RecursiveMode::Recursive)
            .map_err(|e| WatcherError::WatchFailed {
                path: root.display().to_string(),
                reason: e.to_string(),
            })?;

        tracing::info!(path = %root.display(), "Watching directory");

        Ok(Self {
            watcher,
            event_rx: Some(event_rx),
        })
    }

    /// Take the event receiver. Yields `None` after the first call.
    pub fn take_events(&mut self) -> Option<mpsc::UnboundedReceiver<FileEvent>> {
        self.event_rx.take()
    }

    /// Stop watching a path explicitly.
    ///
    /// # Errors
    ///
    /// Returns an error if unwatching fails.
    pub fn unwatch(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        self.watcher
            .unwatch(path)
            .map_err(|e| WatcherError::WatchFailed {
                path: path.display().to_string(),
                reason: e.to_string(),
            })?;

        tracing::info!(path = %path.display(), "Stopped watching directory");
        Ok(())
    }
}

impl std::fmt::Debug for FileWatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileWatcher")
            .field("events_taken", &self.event_rx.is_none())
            .finish_non_exhaustive()
    }
}
