//! Incremental indexing coordinator.
//!
//! Owns the per-file processing functions shared by the watch loop and the
//! full scan, the single-flight scan state machine, and the status/search
//! operations exposed to transports.

mod status;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use walkdir::WalkDir;

use crate::chunker::TextChunker;
use crate::index::{DocumentChunk, IndexBackend, SearchHit};
use crate::watcher::{
    fingerprint_file, ChangeRegistry, ChangeVerdict, FileEvent, FileFingerprint, IgnoreMatcher,
};
use crate::{Error, Result};

pub use status::{IndexStatus, ScanState, StatusReport};

/// Get current unix time in fractional seconds.
fn now_unix() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

/// Counters for one scan pass.
#[derive(Debug, Default, Clone, Copy)]
pub struct ScanOutcome {
    /// Files indexed or re-indexed.
    pub indexed: u64,
    /// Files skipped (ignored or unchanged).
    pub skipped: u64,
    /// Files that failed to process; the scan continues past them.
    pub failed: u64,
}

/// The incremental indexing coordinator.
///
/// One instance manages one project root. Constructed `Initializing`;
/// the bootstrap marks it `Watching` (or permanently `Error`) once the
/// backend is ready.
pub struct IndexCoordinator {
    project_root: PathBuf,
    project_root_str: String,
    backend: Arc<dyn IndexBackend>,
    chunker: TextChunker,
    matcher: IgnoreMatcher,
    registry: ChangeRegistry,
    state: Mutex<ScanState>,
}

impl IndexCoordinator {
    /// Create a coordinator for a project root.
    ///
    /// # Errors
    ///
    /// Returns an error if the root cannot be resolved or the ignore rules
    /// are invalid.
    pub fn new(
        project_root: impl AsRef<Path>,
        index_dir: impl AsRef<Path>,
        ignore_patterns: &[String],
        chunker: TextChunker,
        backend: Arc<dyn IndexBackend>,
    ) -> Result<Self> {
        let matcher = IgnoreMatcher::new(&project_root, &index_dir, ignore_patterns)?;
        let project_root = matcher.root().to_path_buf();
        let project_root_str = project_root.to_string_lossy().to_string();

        tracing::info!(path = %project_root.display(), "Monitoring project path");

        Ok(Self {
            project_root,
            project_root_str,
            backend,
            chunker,
            matcher,
            registry: ChangeRegistry::new(),
            state: Mutex::new(ScanState::new()),
        })
    }

    /// The canonical project root.
    #[must_use]
    pub fn project_root(&self) -> &Path {
        &self.project_root
    }

    /// The ignore matcher used for both watching and scanning.
    #[must_use]
    pub fn matcher(&self) -> &IgnoreMatcher {
        &self.matcher
    }

    /// The change registry (fingerprints of known files).
    #[must_use]
    pub fn registry(&self) -> &ChangeRegistry {
        &self.registry
    }

    /// Snapshot the current status without querying the backend.
    #[must_use]
    pub fn state_snapshot(&self) -> ScanState {
        self.state.lock().clone()
    }

    /// Mark the service ready and watching. Called by the bootstrap after
    /// backend initialization succeeds.
    pub fn mark_watching(&self) {
        self.state.lock().mark_watching();
    }

    /// Mark an unrecoverable failure. Backend initialization is never
    /// retried after this.
    pub fn mark_error(&self, error: impl Into<String>) {
        let error = error.into();
        tracing::error!(error = %error, "Coordinator entering error state");
        self.state.lock().mark_error(error);
    }

    /// Finalize state on shutdown: a scan interrupted by shutdown must not
    /// leave callers waiting on `Scanning` forever.
    pub fn shutdown(&self) {
        let mut state = self.state.lock();
        if state.status == IndexStatus::Scanning {
            tracing::warn!("Shut down during scan; marking scan as failed");
            state.finish_scan_err(now_unix(), "service shut down during scan");
        }
    }

    // --- scan -----------------------------------------------------------

    /// Request a full scan of the project tree.
    ///
    /// The scan runs asynchronously relative to the caller. With
    /// `force_reindex`, previously indexed chunks for the project are
    /// cleared first and every file is re-indexed.
    ///
    /// # Errors
    ///
    /// Returns `Conflict` if a scan is already in flight.
    pub fn request_scan(self: Arc<Self>, force_reindex: bool) -> Result<()> {
        self.state.lock().begin_scan(now_unix())?;

        tokio::spawn(async move {
            self.run_scan(force_reindex).await;
        });

        Ok(())
    }

    /// Execute a full scan and record its terminal state. A scan always
    /// terminates the `Scanning` status, success or failure.
    async fn run_scan(&self, force_reindex: bool) {
        tracing::info!(force_reindex, "Starting project scan");
        crate::server::metrics::SCANS_TOTAL.inc();
        let started = std::time::Instant::now();

        match self.scan_project(force_reindex).await {
            Ok(outcome) => {
                self.state.lock().finish_scan_ok(now_unix());
                tracing::info!(
                    indexed = outcome.indexed,
                    skipped = outcome.skipped,
                    failed = outcome.failed,
                    elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
                    "Scan complete; now watching"
                );
            }
            Err(e) => {
                tracing::error!(error = %e, "Scan failed");
                self.state
                    .lock()
                    .finish_scan_err(now_unix(), format!("scan failed: {e}"));
            }
        }
    }

    /// Walk the tree and apply the per-file decision logic.
    ///
    /// Per-file failures are logged and counted but never abort the walk;
    /// only coordinator-level failures (clearing the index, an unreadable
    /// root) fail the scan as a whole.
    async fn scan_project(&self, force_reindex: bool) -> Result<ScanOutcome> {
        if force_reindex {
            tracing::info!("Force re-index: clearing existing index");
            self.backend.clear_by_prefix(&self.project_root_str).await?;
            self.registry.clear();
        }

        if !self.project_root.is_dir() {
            return Err(Error::internal(format!(
                "project root is not a directory: {}",
                self.project_root.display()
            )));
        }

        let mut outcome = ScanOutcome::default();

        let walker = WalkDir::new(&self.project_root)
            .follow_links(false)
            .into_iter()
            .filter_entry(|entry| {
                !entry.file_type().is_dir() || !self.matcher.is_ignored_dir(entry.path())
            });

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::warn!(error = %e, "Error walking directory");
                    outcome.failed += 1;
                    continue;
                }
            };

            if entry.file_type().is_dir() {
                continue;
            }

            let path = entry.path();
            if self.matcher.should_ignore(path) {
                outcome.skipped += 1;
                continue;
            }

            match self.registry.decide(path) {
                ChangeVerdict::Unchanged => outcome.skipped += 1,
                ChangeVerdict::NeedsIndex(fingerprint) => {
                    match self.reindex_file(path, fingerprint).await {
                        Ok(_) => outcome.indexed += 1,
                        Err(e) => {
                            tracing::error!(path = %path.display(), error = %e, "Failed to re-index file");
                            outcome.failed += 1;
                        }
                    }
                }
                ChangeVerdict::Unknown(fingerprint) => {
                    match self.index_with_fingerprint(path, fingerprint).await {
                        Ok(_) => outcome.indexed += 1,
                        Err(e) => {
                            tracing::error!(path = %path.display(), error = %e, "Failed to index file");
                            outcome.failed += 1;
                        }
                    }
                }
                ChangeVerdict::Failed => {
                    if self.registry.contains(path) {
                        self.process_deleted(path).await;
                    }
                    outcome.failed += 1;
                }
            }
        }

        Ok(outcome)
    }

    // --- status / search ------------------------------------------------

    /// Current status, including the indexed chunk count when stable.
    pub async fn status(&self) -> StatusReport {
        let snapshot = self.state.lock().clone();

        // The count is only queried in a stable state; during a scan (or
        // after a failure) it would be misleading or unavailable.
        let indexed_chunk_count = if snapshot.status == IndexStatus::Watching {
            match self.backend.count_by_prefix(&self.project_root_str).await {
                Ok(count) => {
                    crate::server::metrics::CHUNKS_TOTAL.set(count);
                    Some(count)
                }
                Err(e) => {
                    tracing::error!(error = %e, "Failed to retrieve indexed chunk count");
                    None
                }
            }
        } else {
            None
        };

        StatusReport {
            project_path: self.project_root_str.clone(),
            status: snapshot.status,
            last_scan_start_time: snapshot.last_scan_start,
            last_scan_end_time: snapshot.last_scan_end,
            indexed_chunk_count,
            error_message: snapshot.last_error,
        }
    }

    /// Search the index.
    ///
    /// # Errors
    ///
    /// Returns `Unavailable` while the service is initializing, scanning,
    /// or in an error state.
    pub async fn search(&self, query: &str, top_k: usize) -> Result<Vec<SearchHit>> {
        {
            let state = self.state.lock();
            match state.status {
                IndexStatus::Watching => {}
                IndexStatus::Initializing => {
                    return Err(Error::unavailable("server is initializing"));
                }
                IndexStatus::Scanning => {
                    return Err(Error::unavailable("a scan is in progress"));
                }
                IndexStatus::Error => {
                    let detail = state
                        .last_error
                        .clone()
                        .unwrap_or_else(|| "unknown server error".to_string());
                    return Err(Error::unavailable(detail));
                }
            }
        }

        crate::server::metrics::SEARCH_REQUESTS.inc();
        self.backend.search(query, top_k).await
    }

    // --- per-file processing --------------------------------------------

    /// Route one file event through the decision logic.
    pub async fn process_event(&self, event: FileEvent) {
        match event {
            FileEvent::Created(path) => self.process_created(&path).await,
            FileEvent::Modified(path) => self.process_modified(&path).await,
            FileEvent::Deleted(path) => self.process_deleted(&path).await,
            FileEvent::Renamed { from, to } => self.process_renamed(&from, &to).await,
        }
    }

    /// Handle a creation: the fingerprint is unknown by construction, so
    /// hash, chunk, upsert, then record.
    pub async fn process_created(&self, path: &Path) {
        if self.matcher.should_ignore(path) {
            return;
        }

        tracing::debug!(path = %path.display(), "Processing creation");
        if let Err(e) = self.insert_file(path).await {
            tracing::error!(path = %path.display(), error = %e, "Failed to index created file");
        }
    }

    /// Handle a modification through the registry's verdict.
    pub async fn process_modified(&self, path: &Path) {
        if self.matcher.should_ignore(path) {
            return;
        }

        tracing::debug!(path = %path.display(), "Processing modification");
        match self.registry.decide(path) {
            ChangeVerdict::Unchanged => {
                tracing::debug!(path = %path.display(), "No significant change; skipping");
            }
            ChangeVerdict::NeedsIndex(fingerprint) => {
                tracing::info!(path = %path.display(), "Detected change; re-indexing");
                if let Err(e) = self.reindex_file(path, fingerprint).await {
                    tracing::error!(path = %path.display(), error = %e, "Failed to re-index modified file");
                }
            }
            ChangeVerdict::Unknown(fingerprint) => {
                tracing::warn!(path = %path.display(), "Modified event for unknown file; processing as new");
                if let Err(e) = self.index_with_fingerprint(path, fingerprint).await {
                    tracing::error!(path = %path.display(), error = %e, "Failed to index file");
                }
            }
            ChangeVerdict::Failed => {
                if self.registry.contains(path) {
                    tracing::warn!(path = %path.display(), "Known file became unreadable; treating as deleted");
                    self.process_deleted(path).await;
                } else {
                    tracing::debug!(path = %path.display(), "Unreadable unknown file; skipping");
                }
            }
        }
    }

    /// Handle a deletion. No ignore check: a previously-known file must be
    /// cleaned up even if ignore rules changed since it was indexed.
    pub async fn process_deleted(&self, path: &Path) {
        if !self.registry.contains(path) {
            tracing::debug!(path = %path.display(), "Deletion event for untracked file");
            return;
        }

        tracing::debug!(path = %path.display(), "Processing deletion");
        let path_str = path.to_string_lossy();
        match self.backend.remove_by_file(&path_str).await {
            Ok(removed) => {
                self.registry.forget(path);
                tracing::info!(path = %path.display(), removed, "Removed index entries for deleted file");
            }
            Err(e) => {
                // Fingerprint kept so a later scan retries the cleanup
                tracing::error!(path = %path.display(), error = %e, "Failed to remove index entries");
            }
        }
    }

    /// Handle a move as deletion of the old path then creation of the new.
    pub async fn process_renamed(&self, from: &Path, to: &Path) {
        tracing::debug!(from = %from.display(), to = %to.display(), "Processing move");
        self.process_deleted(from).await;
        self.process_created(to).await;
    }

    /// Index a file whose fingerprint is not yet computed.
    async fn insert_file(&self, path: &Path) -> Result<usize> {
        let fingerprint = fingerprint_file(path)?;
        self.index_with_fingerprint(path, fingerprint).await
    }

    /// Remove stale chunks, then index the new content. Used when a known
    /// file changed: the chunk count may differ between versions, so the
    /// old set is removed wholesale rather than patched.
    async fn reindex_file(&self, path: &Path, fingerprint: FileFingerprint) -> Result<usize> {
        let path_str = path.to_string_lossy();
        self.backend.remove_by_file(&path_str).await?;
        tracing::debug!(path = %path.display(), "Removed old chunks");

        self.index_with_fingerprint(path, fingerprint).await
    }

    /// Chunk and upsert a file, recording its fingerprint afterwards.
    ///
    /// Zero chunks (empty file) still records the fingerprint after clearing
    /// any stale chunks, so unchanged empty files are not rescanned every
    /// cycle. On a backend failure the fingerprint is NOT recorded, so a
    /// later scan retries the file.
    async fn index_with_fingerprint(
        &self,
        path: &Path,
        fingerprint: FileFingerprint,
    ) -> Result<usize> {
        let path_str = path.to_string_lossy().to_string();

        let bytes = std::fs::read(path)?;
        let text = String::from_utf8_lossy(&bytes);

        let chunks = self.chunker.chunk(&text);
        let total_chunks = u32::try_from(chunks.len())
            .map_err(|_| Error::internal(format!("chunk count overflow for {path_str}")))?;

        if chunks.is_empty() {
            tracing::info!(path = %path.display(), "Skipping empty or unchunkable file");
            self.backend.remove_by_file(&path_str).await?;
            self.registry.record(path, fingerprint);
            return Ok(0);
        }

        for (index, chunk_text) in chunks.into_iter().enumerate() {
            let chunk = DocumentChunk::new(
                path_str.clone(),
                fingerprint.content_hash.clone(),
                fingerprint.modified_at,
                u32::try_from(index).unwrap_or(u32::MAX),
                total_chunks,
                chunk_text,
            );
            self.backend.upsert(chunk).await?;
        }

        self.registry.record(path, fingerprint);
        crate::server::metrics::FILES_INDEXED.inc();
        tracing::info!(path = %path.display(), chunks = total_chunks, "Indexed file");
        Ok(total_chunks as usize)
    }

    // --- watch loop handoff ---------------------------------------------

    /// Spawn the task that drains watcher events into the processing
    /// functions, serially and in arrival order.
    ///
    /// The producer side (the notify callback thread) never blocks; this
    /// pump is the only consumer. Cancel the token to stop it.
    pub fn spawn_event_pump(
        self: Arc<Self>,
        mut events: mpsc::UnboundedReceiver<FileEvent>,
        cancel: CancellationToken,
    ) -> tokio::task::JoinHandle<()> {
        let coordinator = self;
        tokio::spawn(async move {
            tracing::info!("File event pump started");
            loop {
                tokio::select! {
                    () = cancel.cancelled() => {
                        tracing::info!("File event pump stopping");
                        break;
                    }
                    event = events.recv() => match event {
                        Some(event) => coordinator.process_event(event).await,
                        None => {
                            tracing::info!("Watcher channel closed; event pump exiting");
                            break;
                        }
                    }
                }
            }
        })
    }
}

impl std::fmt::Debug for IndexCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndexCoordinator")
            .field("project_root", &self.project_root)
            .field("tracked_files", &self.registry.len())
            .finish_non_exhaustive()
    }
}
