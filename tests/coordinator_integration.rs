//! Integration tests for the indexing coordinator.
//!
//! Drives the coordinator against a recording backend to observe exactly
//! which index writes each file event or scan produces.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use semdex::chunker::{ChunkerConfig, TextChunker};
use semdex::coordinator::{IndexCoordinator, IndexStatus};
use semdex::index::{DocumentChunk, IndexBackend, SearchHit};
use semdex::Result;
use tempfile::TempDir;

/// In-memory backend that counts every write call.
#[derive(Default)]
struct RecordingBackend {
    chunks: parking_lot::Mutex<HashMap<String, DocumentChunk>>,
    upsert_calls: AtomicUsize,
    remove_calls: AtomicUsize,
}

impl RecordingBackend {
    fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn upserts(&self) -> usize {
        self.upsert_calls.load(Ordering::SeqCst)
    }

    fn chunk_ids_for(&self, file_path: &str) -> Vec<String> {
        let mut ids: Vec<String> = self
            .chunks
            .lock()
            .values()
            .filter(|c| c.file_path == file_path)
            .map(|c| c.document_id.clone())
            .collect();
        ids.sort();
        ids
    }

    fn total_chunks(&self) -> usize {
        self.chunks.lock().len()
    }
}

#[async_trait::async_trait]
impl IndexBackend for RecordingBackend {
    async fn upsert(&self, chunk: DocumentChunk) -> Result<()> {
        self.upsert_calls.fetch_add(1, Ordering::SeqCst);
        self.chunks.lock().insert(chunk.document_id.clone(), chunk);
        Ok(())
    }

    async fn remove_by_file(&self, file_path: &str) -> Result<u64> {
        self.remove_calls.fetch_add(1, Ordering::SeqCst);
        let mut chunks = self.chunks.lock();
        let before = chunks.len();
        chunks.retain(|_, c| c.file_path != file_path);
        Ok((before - chunks.len()) as u64)
    }

    async fn search(&self, query: &str, top_k: usize) -> Result<Vec<SearchHit>> {
        let chunks = self.chunks.lock();
        Ok(chunks
            .values()
            .filter(|c| c.text.contains(query))
            .take(top_k)
            .map(|c| SearchHit {
                document_id: c.document_id.clone(),
                file_path: c.file_path.clone(),
                content_hash: c.content_hash.clone(),
                modified_at: c.modified_at,
                chunk_index: c.chunk_index,
                total_chunks: c.total_chunks,
                text: c.text.clone(),
                metadata: c.metadata.clone(),
                score: 1.0,
            })
            .collect())
    }

    async fn count_by_prefix(&self, prefix: &str) -> Result<i64> {
        let count = self
            .chunks
            .lock()
            .values()
            .filter(|c| c.file_path.starts_with(prefix))
            .count();
        Ok(count as i64)
    }

    async fn clear_by_prefix(&self, prefix: &str) -> Result<u64> {
        let mut chunks = self.chunks.lock();
        let before = chunks.len();
        chunks.retain(|_, c| !c.file_path.starts_with(prefix));
        Ok((before - chunks.len()) as u64)
    }
}

fn coordinator_with(
    root: &Path,
    backend: Arc<RecordingBackend>,
    chunk_size: usize,
    overlap: usize,
) -> Arc<IndexCoordinator> {
    let chunker = TextChunker::new(ChunkerConfig {
        chunk_size,
        overlap,
    })
    .unwrap();

    Arc::new(
        IndexCoordinator::new(root, root.join(".semdex"), &[], chunker, backend).unwrap(),
    )
}

fn canonical_root(tmp: &TempDir) -> PathBuf {
    tmp.path().canonicalize().unwrap()
}

async fn run_scan(coordinator: &Arc<IndexCoordinator>, force: bool) {
    Arc::clone(coordinator).request_scan(force).unwrap();
    for _ in 0..500 {
        if coordinator.state_snapshot().status != IndexStatus::Scanning {
            assert_eq!(
                coordinator.state_snapshot().status,
                IndexStatus::Watching,
                "scan ended in error: {:?}",
                coordinator.state_snapshot()
            );
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("scan did not finish");
}

#[tokio::test]
async fn test_second_scan_produces_zero_backend_writes() {
    let tmp = TempDir::new().unwrap();
    let root = canonical_root(&tmp);
    std::fs::write(root.join("a.txt"), "alpha content").unwrap();
    std::fs::create_dir_all(root.join("sub")).unwrap();
    std::fs::write(root.join("sub").join("b.txt"), "beta content").unwrap();

    let backend = RecordingBackend::new();
    let coordinator = coordinator_with(&root, Arc::clone(&backend), 64, 8);

    run_scan(&coordinator, false).await;
    let writes_after_first = backend.upserts();
    assert_eq!(writes_after_first, 2);

    // No file changed in between: every path must come back Unchanged
    run_scan(&coordinator, false).await;
    assert_eq!(backend.upserts(), writes_after_first);
}

#[tokio::test]
async fn test_rewriting_identical_bytes_triggers_reindex() {
    // The fingerprint compares hash AND mtime; rewriting the same bytes
    // moves mtime, so the file must be re-indexed
    let tmp = TempDir::new().unwrap();
    let root = canonical_root(&tmp);
    let path = root.join("a.txt");
    std::fs::write(&path, "stable bytes").unwrap();

    let backend = RecordingBackend::new();
    let coordinator = coordinator_with(&root, Arc::clone(&backend), 64, 8);

    coordinator.process_created(&path).await;
    assert_eq!(backend.upserts(), 1);

    tokio::time::sleep(Duration::from_millis(50)).await;
    std::fs::write(&path, "stable bytes").unwrap();

    coordinator.process_modified(&path).await;
    assert_eq!(backend.upserts(), 2);
}

#[tokio::test]
async fn test_modification_round_trip_replaces_chunk_set() {
    let tmp = TempDir::new().unwrap();
    let root = canonical_root(&tmp);
    let path = root.join("a.txt");
    let path_str = path.to_string_lossy().to_string();

    std::fs::write(&path, "X").unwrap();

    let backend = RecordingBackend::new();
    // 400-char windows, no overlap: 1000 chars -> 3 chunks
    let coordinator = coordinator_with(&root, Arc::clone(&backend), 400, 0);

    coordinator.process_created(&path).await;
    assert_eq!(
        backend.chunk_ids_for(&path_str),
        vec![format!("{path_str}::0")]
    );

    tokio::time::sleep(Duration::from_millis(50)).await;
    std::fs::write(&path, "X".repeat(1000)).unwrap();
    coordinator.process_modified(&path).await;

    let ids = backend.chunk_ids_for(&path_str);
    assert_eq!(
        ids,
        vec![
            format!("{path_str}::0"),
            format!("{path_str}::1"),
            format!("{path_str}::2"),
        ]
    );

    // The replacement chunk set carries the new content
    let chunks = backend.chunks.lock();
    let first = chunks.get(&format!("{path_str}::0")).unwrap();
    assert_eq!(first.text.len(), 400);
    assert_eq!(first.total_chunks, 3);
}

#[tokio::test]
async fn test_empty_file_recorded_but_not_indexed() {
    let tmp = TempDir::new().unwrap();
    let root = canonical_root(&tmp);
    let path = root.join("empty.txt");
    std::fs::write(&path, "").unwrap();

    let backend = RecordingBackend::new();
    let coordinator = coordinator_with(&root, Arc::clone(&backend), 64, 8);

    coordinator.process_created(&path).await;

    assert_eq!(backend.upserts(), 0);
    assert_eq!(backend.total_chunks(), 0);
    assert!(coordinator.registry().contains(&path));

    // A second pass must see it as unchanged, not rescan it
    coordinator.process_modified(&path).await;
    assert_eq!(backend.upserts(), 0);

    // Deleting it still runs the cleanup path
    std::fs::remove_file(&path).unwrap();
    let removes_before = backend.remove_calls.load(Ordering::SeqCst);
    coordinator.process_deleted(&path).await;
    assert!(backend.remove_calls.load(Ordering::SeqCst) > removes_before);
    assert!(!coordinator.registry().contains(&path));
}

#[tokio::test]
async fn test_index_dir_never_indexed() {
    let tmp = TempDir::new().unwrap();
    let root = canonical_root(&tmp);

    let index_dir = root.join(".semdex");
    std::fs::create_dir_all(&index_dir).unwrap();
    std::fs::write(index_dir.join("segment.bin"), "index internals").unwrap();
    std::fs::write(root.join("real.txt"), "real content").unwrap();

    let backend = RecordingBackend::new();
    let coordinator = coordinator_with(&root, Arc::clone(&backend), 64, 8);

    // Scan walk must prune the index dir
    run_scan(&coordinator, false).await;
    assert_eq!(backend.upserts(), 1);
    assert!(backend
        .chunk_ids_for(&index_dir.join("segment.bin").to_string_lossy())
        .is_empty());

    // Watch-path filtering must exclude it too
    coordinator
        .process_created(&index_dir.join("segment.bin"))
        .await;
    assert_eq!(backend.upserts(), 1);
}

#[tokio::test]
async fn test_move_relocates_chunks() {
    let tmp = TempDir::new().unwrap();
    let root = canonical_root(&tmp);
    let old_path = root.join("old.txt");
    let new_path = root.join("new.txt");

    std::fs::write(&old_path, "movable content").unwrap();

    let backend = RecordingBackend::new();
    let coordinator = coordinator_with(&root, Arc::clone(&backend), 64, 8);

    coordinator.process_created(&old_path).await;
    assert_eq!(backend.chunk_ids_for(&old_path.to_string_lossy()).len(), 1);

    std::fs::rename(&old_path, &new_path).unwrap();
    coordinator.process_renamed(&old_path, &new_path).await;

    assert!(backend
        .chunk_ids_for(&old_path.to_string_lossy())
        .is_empty());
    assert_eq!(
        backend.chunk_ids_for(&new_path.to_string_lossy()),
        vec![format!("{}::0", new_path.to_string_lossy())]
    );
    assert!(!coordinator.registry().contains(&old_path));
    assert!(coordinator.registry().contains(&new_path));
}

#[tokio::test]
async fn test_forced_scan_clears_and_rebuilds() {
    let tmp = TempDir::new().unwrap();
    let root = canonical_root(&tmp);
    std::fs::write(root.join("a.txt"), "alpha").unwrap();

    let backend = RecordingBackend::new();
    let coordinator = coordinator_with(&root, Arc::clone(&backend), 64, 8);

    run_scan(&coordinator, false).await;
    assert_eq!(backend.upserts(), 1);

    // Unforced rescan: nothing to do. Forced: everything again.
    run_scan(&coordinator, false).await;
    assert_eq!(backend.upserts(), 1);

    run_scan(&coordinator, true).await;
    assert_eq!(backend.upserts(), 2);
    assert_eq!(backend.total_chunks(), 1);
}

#[tokio::test]
async fn test_gitignored_files_skipped_in_scan() {
    let tmp = TempDir::new().unwrap();
    let root = canonical_root(&tmp);
    std::fs::write(root.join(".gitignore"), "*.log\n").unwrap();
    std::fs::write(root.join("keep.txt"), "kept").unwrap();
    std::fs::write(root.join("skip.log"), "skipped").unwrap();

    let backend = RecordingBackend::new();
    let coordinator = coordinator_with(&root, Arc::clone(&backend), 64, 8);

    run_scan(&coordinator, false).await;

    // .gitignore itself and keep.txt are indexed; skip.log is not
    let indexed: Vec<String> = backend
        .chunks
        .lock()
        .values()
        .map(|c| c.file_path.clone())
        .collect();
    assert!(indexed.iter().any(|p| p.ends_with("keep.txt")));
    assert!(!indexed.iter().any(|p| p.ends_with("skip.log")));
}

#[tokio::test]
async fn test_status_reports_count_only_when_watching() {
    let tmp = TempDir::new().unwrap();
    let root = canonical_root(&tmp);
    std::fs::write(root.join("a.txt"), "alpha").unwrap();

    let backend = RecordingBackend::new();
    let coordinator = coordinator_with(&root, Arc::clone(&backend), 64, 8);

    // Initializing: no count
    let report = coordinator.status().await;
    assert_eq!(report.status, IndexStatus::Initializing);
    assert!(report.indexed_chunk_count.is_none());

    run_scan(&coordinator, false).await;

    let report = coordinator.status().await;
    assert_eq!(report.status, IndexStatus::Watching);
    assert_eq!(report.indexed_chunk_count, Some(1));
    assert!(report.last_scan_start_time.is_some());
    assert!(report.last_scan_end_time.is_some());
}

#[tokio::test]
async fn test_watch_loop_indexes_created_file() {
    use tokio_util::sync::CancellationToken;

    let tmp = TempDir::new().unwrap();
    let root = canonical_root(&tmp);

    let backend = RecordingBackend::new();
    let coordinator = coordinator_with(&root, Arc::clone(&backend), 64, 8);
    coordinator.mark_watching();

    let mut watcher = semdex::watcher::FileWatcher::new(&root).unwrap();
    let events = watcher.take_events().unwrap();
    let cancel = CancellationToken::new();
    let pump = Arc::clone(&coordinator).spawn_event_pump(events, cancel.clone());

    std::fs::write(root.join("live.txt"), "created while watching").unwrap();

    let mut indexed = false;
    for _ in 0..500 {
        if backend.upserts() > 0 {
            indexed = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    cancel.cancel();
    drop(watcher);
    let _ = tokio::time::timeout(Duration::from_secs(5), pump).await;

    assert!(indexed, "watch loop never indexed the created file");
    assert_eq!(
        backend.chunk_ids_for(&root.join("live.txt").to_string_lossy()),
        vec![format!("{}::0", root.join("live.txt").to_string_lossy())]
    );
}
