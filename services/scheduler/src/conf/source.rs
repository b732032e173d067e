//! Filesystem change sources.
//!
//! A [`ChangeSource`] turns a watched directory into two streams: change
//! events and source errors. The watch loop only cares about the streams, so
//! anything able to produce them can drive reloads:
//!
//! - `InotifyWatcher` reports kernel directory events (Linux)
//! - [`ChannelSource`] forwards events pushed by the embedder

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;
use tokio::sync::{mpsc, watch};

/// Errors raised while watching a directory.
#[derive(Debug, Error)]
pub enum WatchError {
    /// The watch target is missing or not a directory.
    #[error("cannot watch {path}: not a directory")]
    NotADirectory { path: PathBuf },

    /// Filesystem error while establishing or reading the watch.
    #[error("cannot watch {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// No directory watcher exists for this platform.
    #[error("cannot watch {path}: directory watching is not supported on this platform")]
    Unsupported { path: PathBuf },

    /// Error reported by an external event source.
    #[error("change source error: {0}")]
    Source(String),
}

/// Kind of change observed on a path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileEventKind {
    Create,
    Write,
    Remove,
}

impl FileEventKind {
    /// Whether this kind of change should trigger a policy reload.
    pub fn triggers_reload(self) -> bool {
        matches!(self, Self::Create | Self::Write)
    }
}

impl fmt::Display for FileEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Create => "create",
            Self::Write => "write",
            Self::Remove => "remove",
        };
        f.write_str(s)
    }
}

/// A change to a path inside the watched directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEvent {
    pub path: PathBuf,
    pub kind: FileEventKind,
}

impl FileEvent {
    pub fn new(path: impl Into<PathBuf>, kind: FileEventKind) -> Self {
        Self {
            path: path.into(),
            kind,
        }
    }
}

/// Event and error streams produced by a started source.
///
/// Either stream closing means the source is gone.
#[derive(Debug)]
pub struct WatchStreams {
    pub events: mpsc::Receiver<FileEvent>,
    pub errors: mpsc::Receiver<WatchError>,
}

/// Something that reports changes in a directory.
pub trait ChangeSource: Send + 'static {
    /// Start producing events. Called once, from within the tokio runtime.
    ///
    /// The source should stop and close its streams once `shutdown` flips.
    fn start(self: Box<Self>, shutdown: watch::Receiver<bool>) -> WatchStreams;
}

/// A change source fed by the embedder through [`ChannelSourceHandle`].
pub struct ChannelSource {
    events: mpsc::Receiver<FileEvent>,
    errors: mpsc::Receiver<WatchError>,
}

/// Sending half of a [`ChannelSource`].
///
/// Dropping either sender closes the corresponding stream.
#[derive(Debug, Clone)]
pub struct ChannelSourceHandle {
    pub events: mpsc::Sender<FileEvent>,
    pub errors: mpsc::Sender<WatchError>,
}

impl ChannelSource {
    /// Create a source and the handle that feeds it.
    pub fn new(capacity: usize) -> (Self, ChannelSourceHandle) {
        let (event_tx, events) = mpsc::channel(capacity);
        let (error_tx, errors) = mpsc::channel(capacity);
        (
            Self { events, errors },
            ChannelSourceHandle {
                events: event_tx,
                errors: error_tx,
            },
        )
    }
}

impl ChangeSource for ChannelSource {
    fn start(self: Box<Self>, _shutdown: watch::Receiver<bool>) -> WatchStreams {
        WatchStreams {
            events: self.events,
            errors: self.errors,
        }
    }
}
