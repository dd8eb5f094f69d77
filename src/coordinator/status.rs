//! Scan status state machine.
//!
//! Exactly one [`ScanState`] exists per running coordinator; it is mutated
//! only by the coordinator and read by any number of status/search callers.
//! `Scanning` is mutually exclusive: at most one scan may be in flight.

use serde::Serialize;

use crate::{Error, Result};

/// Operational status of the index service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum IndexStatus {
    /// Starting up; backend not ready yet.
    Initializing,
    /// A full scan is in flight.
    Scanning,
    /// Ready and watching for file changes.
    Watching,
    /// Unrecoverable failure; carries its message in the scan state.
    Error,
}

impl std::fmt::Display for IndexStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Initializing => "Initializing",
            Self::Scanning => "Scanning",
            Self::Watching => "Watching",
            Self::Error => "Error",
        };
        f.write_str(name)
    }
}

/// Mutable scan/status state owned by the coordinator.
#[derive(Debug, Clone)]
pub struct ScanState {
    /// Current status.
    pub status: IndexStatus,
    /// When the last scan started, unix seconds.
    pub last_scan_start: Option<f64>,
    /// When the last scan finished, unix seconds.
    pub last_scan_end: Option<f64>,
    /// Message for the most recent error, if any.
    pub last_error: Option<String>,
}

impl Default for ScanState {
    fn default() -> Self {
        Self {
            status: IndexStatus::Initializing,
            last_scan_start: None,
            last_scan_end: None,
            last_error: None,
        }
    }
}

impl ScanState {
    /// Create the initial state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Admit a new scan.
    ///
    /// The `Scanning` flag is the only admission gate: a second request
    /// while scanning is rejected outright, never queued, and the recorded
    /// start time of the running scan is left untouched.
    ///
    /// # Errors
    ///
    /// Returns `Conflict` if a scan is already in flight.
    pub fn begin_scan(&mut self, now: f64) -> Result<()> {
        if self.status == IndexStatus::Scanning {
            return Err(Error::conflict("a scan is already in progress"));
        }

        self.status = IndexStatus::Scanning;
        self.last_scan_start = Some(now);
        self.last_scan_end = None;
        self.last_error = None;
        Ok(())
    }

    /// Record a successfully completed scan; the service returns to watching.
    pub fn finish_scan_ok(&mut self, now: f64) {
        self.status = IndexStatus::Watching;
        self.last_scan_end = Some(now);
    }

    /// Record a failed scan. The scan still terminates `Scanning`.
    pub fn finish_scan_err(&mut self, now: f64, error: impl Into<String>) {
        self.status = IndexStatus::Error;
        self.last_scan_end = Some(now);
        self.last_error = Some(error.into());
    }

    /// Mark the service ready and watching.
    pub fn mark_watching(&mut self) {
        self.status = IndexStatus::Watching;
    }

    /// Mark an unrecoverable failure (startup configuration, fatal shutdown).
    pub fn mark_error(&mut self, error: impl Into<String>) {
        self.status = IndexStatus::Error;
        self.last_error = Some(error.into());
    }
}

/// Status payload surfaced to transports.
#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
    /// The project path this status pertains to.
    pub project_path: String,
    /// Current status.
    pub status: IndexStatus,
    /// When the last scan started, unix seconds.
    pub last_scan_start_time: Option<f64>,
    /// When the last scan finished, unix seconds.
    pub last_scan_end_time: Option<f64>,
    /// Chunks currently indexed for the path; only queried when the status
    /// is stable.
    pub indexed_chunk_count: Option<i64>,
    /// Details when the status is `Error`.
    pub error_message: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_state() {
        let state = ScanState::new();
        assert_eq!(state.status, IndexStatus::Initializing);
        assert!(state.last_scan_start.is_none());
        assert!(state.last_scan_end.is_none());
        assert!(state.last_error.is_none());
    }

    #[test]
    fn test_begin_scan_transitions() {
        let mut state = ScanState::new();
        state.begin_scan(100.0).unwrap();

        assert_eq!(state.status, IndexStatus::Scanning);
        assert_eq!(state.last_scan_start, Some(100.0));
        assert!(state.last_scan_end.is_none());
    }

    #[test]
    fn test_second_scan_rejected_without_resetting_start() {
        let mut state = ScanState::new();
        state.begin_scan(100.0).unwrap();

        let err = state.begin_scan(200.0).unwrap_err();
        assert!(matches!(err, Error::Conflict(_)));
        assert_eq!(state.last_scan_start, Some(100.0));
        assert_eq!(state.status, IndexStatus::Scanning);
    }

    #[test]
    fn test_finish_scan_ok() {
        let mut state = ScanState::new();
        state.begin_scan(100.0).unwrap();
        state.finish_scan_ok(150.0);

        assert_eq!(state.status, IndexStatus::Watching);
        assert_eq!(state.last_scan_end, Some(150.0));
        assert!(state.last_error.is_none());
    }

    #[test]
    fn test_finish_scan_err_still_ends_scanning() {
        let mut state = ScanState::new();
        state.begin_scan(100.0).unwrap();
        state.finish_scan_err(150.0, "backend exploded");

        assert_eq!(state.status, IndexStatus::Error);
        assert_eq!(state.last_scan_end, Some(150.0));
        assert_eq!(state.last_error.as_deref(), Some("backend exploded"));
    }

    #[test]
    fn test_scan_clears_previous_error() {
        let mut state = ScanState::new();
        state.begin_scan(100.0).unwrap();
        state.finish_scan_err(150.0, "first failure");

        state.begin_scan(200.0).unwrap();
        assert!(state.last_error.is_none());
        assert!(state.last_scan_end.is_none());
    }

    #[test]
    fn test_rescan_after_success() {
        let mut state = ScanState::new();
        state.begin_scan(100.0).unwrap();
        state.finish_scan_ok(150.0);

        state.begin_scan(200.0).unwrap();
        assert_eq!(state.status, IndexStatus::Scanning);
        assert_eq!(state.last_scan_start, Some(200.0));
    }

    #[test]
    fn test_status_display() {
        assert_eq!(IndexStatus::Initializing.to_string(), "Initializing");
        assert_eq!(IndexStatus::Scanning.to_string(), "Scanning");
        assert_eq!(IndexStatus::Watching.to_string(), "Watching");
        assert_eq!(IndexStatus::Error.to_string(), "Error");
    }

    #[test]
    fn test_status_serializes_as_string() {
        let json = serde_json::to_string(&IndexStatus::Watching).unwrap();
        assert_eq!(json, "\"Watching\"");
    }
}
