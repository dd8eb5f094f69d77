//! File system event types and notify mapping.

use std::path::PathBuf;

use notify::event::{CreateKind, ModifyKind, RemoveKind, RenameMode};
use notify::EventKind;

/// File system event types the coordinator acts on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileEvent {
    /// File was created.
    Created(PathBuf),
    /// File content or metadata was modified.
    Modified(PathBuf),
    /// File was deleted.
    Deleted(PathBuf),
    /// File was renamed from old path to new path.
    Renamed { from: PathBuf, to: PathBuf },
}

impl FileEvent {
    /// Get the primary path associated with this event.
    #[must_use]
    pub fn path(&self) -> &PathBuf {
        match self {
            Self::Created(p) | Self::Modified(p) | Self::Deleted(p) => p,
            Self::Renamed { to, .. } => to,
        }
    }
}

/// Map a raw notify event into zero or more [`FileEvent`]s.
///
/// Rename events with both paths decompose into one `Renamed`; one-sided
/// rename halves surface as `Deleted`/`Created`. Directory moves are not
/// decomposed into per-file events here; the notification source is relied
/// on to emit them.
#[must_use]
pub fn map_event(event: &notify::Event) -> Vec<FileEvent> {
    match &event.kind {
        EventKind::Create(kind) => {
            if matches!(kind, CreateKind::Folder) {
                log_directory_event(event);
                return Vec::new();
            }
            event.paths.iter().cloned().map(FileEvent::Created).collect()
        }
        EventKind::Modify(ModifyKind::Name(mode)) => match mode {
            RenameMode::Both if event.paths.len() >= 2 => vec![FileEvent::Renamed {
                from: event.paths[0].clone(),
                to: event.paths[1].clone(),
            }],
            RenameMode::From => event.paths.iter().cloned().map(FileEvent::Deleted).collect(),
            RenameMode::To => event.paths.iter().cloned().map(FileEvent::Created).collect(),
            // `Any`/`Other` rename halves carry one path and no direction;
            // treat as modification so the registry decides
            _ => event.paths.iter().cloned().map(FileEvent::Modified).collect(),
        },
        EventKind::Modify(_) => event
            .paths
            .iter()
            .cloned()
            .map(FileEvent::Modified)
            .collect(),
        EventKind::Remove(kind) => {
            if matches!(kind, RemoveKind::Folder) {
                log_directory_event(event);
                return Vec::new();
            }
            event.paths.iter().cloned().map(FileEvent::Deleted).collect()
        }
        EventKind::Access(_) | EventKind::Any | EventKind::Other => Vec::new(),
    }
}

fn log_directory_event(event: &notify::Event) {
    tracing::debug!(
        kind = ?event.kind,
        paths = ?event.paths,
        "Ignoring directory-level event; relying on per-file notifications"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{DataChange, MetadataKind};
    use notify::Event;

    fn event(kind: EventKind, paths: Vec<&str>) -> Event {
        let mut e = Event::new(kind);
        e.paths = paths.into_iter().map(PathBuf::from).collect();
        e
    }

    #[test]
    fn test_create_file_maps_to_created() {
        let e = event(EventKind::Create(CreateKind::File), vec!["/p/a.txt"]);
        assert_eq!(
            map_event(&e),
            vec![FileEvent::Created(PathBuf::from("/p/a.txt"))]
        );
    }

    #[test]
    fn test_create_folder_is_dropped() {
        let e = event(EventKind::Create(CreateKind::Folder), vec!["/p/dir"]);
        assert!(map_event(&e).is_empty());
    }

    #[test]
    fn test_data_change_maps_to_modified() {
        let e = event(
            EventKind::Modify(ModifyKind::Data(DataChange::Content)),
            vec!["/p/a.txt"],
        );
        assert_eq!(
            map_event(&e),
            vec![FileEvent::Modified(PathBuf::from("/p/a.txt"))]
        );
    }

    #[test]
    fn test_metadata_change_maps_to_modified() {
        // mtime-only touches arrive as metadata modifications and must reach
        // the registry's decision function
        let e = event(
            EventKind::Modify(ModifyKind::Metadata(MetadataKind::WriteTime)),
            vec!["/p/a.txt"],
        );
        assert_eq!(
            map_event(&e),
            vec![FileEvent::Modified(PathBuf::from("/p/a.txt"))]
        );
    }

    #[test]
    fn test_remove_maps_to_deleted() {
        let e = event(EventKind::Remove(RemoveKind::File), vec!["/p/a.txt"]);
        assert_eq!(
            map_event(&e),
            vec![FileEvent::Deleted(PathBuf::from("/p/a.txt"))]
        );
    }

    #[test]
    fn test_rename_both_maps_to_renamed() {
        let e = event(
            EventKind::Modify(ModifyKind::Name(RenameMode::Both)),
            vec!["/p/old.txt", "/p/new.txt"],
        );
        assert_eq!(
            map_event(&e),
            vec![FileEvent::Renamed {
                from: PathBuf::from("/p/old.txt"),
                to: PathBuf::from("/p/new.txt"),
            }]
        );
    }

    #[test]
    fn test_rename_halves() {
        let from = event(
            EventKind::Modify(ModifyKind::Name(RenameMode::From)),
            vec!["/p/old.txt"],
        );
        assert_eq!(
            map_event(&from),
            vec![FileEvent::Deleted(PathBuf::from("/p/old.txt"))]
        );

        let to = event(
            EventKind::Modify(ModifyKind::Name(RenameMode::To)),
            vec!["/p/new.txt"],
        );
        assert_eq!(
            map_event(&to),
            vec![FileEvent::Created(PathBuf::from("/p/new.txt"))]
        );
    }

    #[test]
    fn test_access_is_dropped() {
        let e = event(
            EventKind::Access(notify::event::AccessKind::Read),
            vec!["/p/a.txt"],
        );
        assert!(map_event(&e).is_empty());
    }

    #[test]
    fn test_event_path() {
        let renamed = FileEvent::Renamed {
            from: PathBuf::from("/old.rs"),
            to: PathBuf::from("/new.rs"),
        };
        assert_eq!(renamed.path(), &PathBuf::from("/new.rs"));
    }
}
