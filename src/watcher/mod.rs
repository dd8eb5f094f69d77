//! File system watching and change detection.
//!
//! This module provides:
//! - Raw-event mapping from notify into create/modify/delete/rename actions
//! - Gitignore-aware path filtering with project-root containment
//! - The content-fingerprint registry behind change decisions
//! - The watcher whose callback thread feeds the async indexing context

mod events;
mod filter;
mod registry;
mod watcher;

pub use events::{map_event, FileEvent};
pub use filter::IgnoreMatcher;
pub use registry::{fingerprint_file, ChangeRegistry, ChangeVerdict, FileFingerprint};
pub use watcher::FileWatcher;
