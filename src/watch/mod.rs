use notify::event::{ModifyKind, RenameMode};
use notify::{Config as NotifyConfig, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::{Result, SpacedError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Created,
    Written,
    Removed,
    Renamed,
}

/// One filesystem notification for an entry in the watched directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    pub path: PathBuf,
    pub kind: ChangeKind,
}

impl ChangeEvent {
    pub fn new(path: impl Into<PathBuf>, kind: ChangeKind) -> Self {
        Self {
            path: path.into(),
            kind,
        }
    }
}

/// The two sequences a watch source produces.
///
/// Both close once every sender is gone. A closed error sequence means the source
/// can no longer observe the directory.
pub struct WatchStreams {
    pub events: mpsc::UnboundedReceiver<ChangeEvent>,
    pub errors: mpsc::UnboundedReceiver<SpacedError>,
}

impl WatchStreams {
    /// Creates a pair of connected streams; used by sources and by tests feeding the pipeline.
    pub fn channel() -> (
        mpsc::UnboundedSender<ChangeEvent>,
        mpsc::UnboundedSender<SpacedError>,
        Self,
    ) {
        let (event_tx, events) = mpsc::unbounded_channel();
        let (error_tx, errors) = mpsc::unbounded_channel();
        (event_tx, error_tx, Self { events, errors })
    }
}

/// Non-recursive watch over a single directory.
pub struct DirectoryWatcher {
    watcher: RecommendedWatcher,
    path: PathBuf,
}

impl DirectoryWatcher {
    /// Starts watching `path`, which must be an existing directory.
    pub fn open(path: &Path) -> Result<(Self, WatchStreams)> {
        if !path.is_dir() {
            return Err(SpacedError::Watch(format!(
                "monitor path is not a directory: {}",
                path.display()
            )));
        }

        let (event_tx, error_tx, streams) = WatchStreams::channel();

        let mut converter = EventConverter::default();
        let mut watcher = RecommendedWatcher::new(
            move |res: std::result::Result<Event, notify::Error>| match res {
                Ok(event) => {
                    for change in converter.convert(event) {
                        // receiver gone means the pipeline has stopped
                        let _ = event_tx.send(change);
                    }
                }
                Err(e) => {
                    let _ = error_tx.send(SpacedError::Watch(e.to_string()));
                }
            },
            NotifyConfig::default(),
        )
        .map_err(|e| SpacedError::Watch(format!("failed to create watcher: {e}")))?;

        watcher
            .watch(path, RecursiveMode::NonRecursive)
            .map_err(|e| SpacedError::Watch(format!("failed to watch {}: {e}", path.display())))?;

        info!("Watching {}", path.display());

        Ok((
            Self {
                watcher,
                path: path.to_path_buf(),
            },
            streams,
        ))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Stops watching. Dropping the watcher closes both streams.
    pub fn close(mut self) -> Result<()> {
        debug!("Closing watcher on {}", self.path.display());
        self.watcher
            .unwatch(&self.path)
            .map_err(|e| SpacedError::Watch(format!("failed to close watcher: {e}")))
    }
}

/// Maps notify events to [`ChangeEvent`]s.
///
/// A file renamed into the directory is reported as `Created` under its new
/// name, and its old name as `Renamed`. inotify reports a rename once as
/// `To` and again as `Both`; the destination is only reported the first time.
#[derive(Debug, Default)]
pub struct EventConverter {
    last_rename_to: Option<PathBuf>,
}

impl EventConverter {
    pub fn convert(&mut self, event: Event) -> Vec<ChangeEvent> {
        let Event { kind, paths, .. } = event;

        match kind {
            EventKind::Create(_) => all(paths, ChangeKind::Created),
            EventKind::Modify(ModifyKind::Name(mode)) => self.convert_rename(mode, paths),
            EventKind::Modify(_) => all(paths, ChangeKind::Written),
            EventKind::Remove(_) => all(paths, ChangeKind::Removed),
            EventKind::Access(_) | EventKind::Any | EventKind::Other => Vec::new(),
        }
    }

    fn convert_rename(&mut self, mode: RenameMode, paths: Vec<PathBuf>) -> Vec<ChangeEvent> {
        match mode {
            RenameMode::From => all(paths, ChangeKind::Renamed),
            RenameMode::To => {
                self.last_rename_to = paths.last().cloned();
                all(paths, ChangeKind::Created)
            }
            RenameMode::Both => {
                let reported = self.last_rename_to.take();
                let mut paths = paths.into_iter();
                let mut changes = Vec::with_capacity(2);
                if let Some(from) = paths.next() {
                    changes.push(ChangeEvent::new(from, ChangeKind::Renamed));
                }
                if let Some(to) = paths.next() {
                    if reported.as_deref() != Some(to.as_path()) {
                        changes.push(ChangeEvent::new(to, ChangeKind::Created));
                    }
                }
                changes
            }
            // FSEvents and kqueue do not say which side of the rename a path is
            RenameMode::Any | RenameMode::Other => paths
                .into_iter()
                .map(|path| {
                    let kind = if path.exists() {
                        ChangeKind::Created
                    } else {
                        ChangeKind::Renamed
                    };
                    ChangeEvent::new(path, kind)
                })
                .collect(),
        }
    }
}

fn all(paths: Vec<PathBuf>, kind: ChangeKind) -> Vec<ChangeEvent> {
    paths
        .into_iter()
        .map(|path| ChangeEvent::new(path, kind))
        .collect()
}
