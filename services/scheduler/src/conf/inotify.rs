//! inotify directory watcher.
//!
//! Watches the configuration directory itself rather than the file, so that
//! editors replacing the file by rename and mounted volumes swapping a
//! `..data` symlink both surface as events.

use std::fmt;
use std::fs;
use std::io;
use std::os::fd::{AsFd, AsRawFd, RawFd};
use std::path::{Path, PathBuf};

use nix::sys::inotify::{AddWatchFlags, InitFlags, Inotify, InotifyEvent};
use tokio::io::unix::AsyncFd;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info};

use super::source::{ChangeSource, FileEvent, FileEventKind, WatchError, WatchStreams};

const EVENT_BUFFER: usize = 64;
const ERROR_BUFFER: usize = 16;

fn watch_mask() -> AddWatchFlags {
    AddWatchFlags::IN_CREATE
        | AddWatchFlags::IN_CLOSE_WRITE
        | AddWatchFlags::IN_MOVED_TO
        | AddWatchFlags::IN_DELETE
        | AddWatchFlags::IN_MOVED_FROM
}

/// Watches one directory through inotify.
pub struct InotifyWatcher {
    dir: PathBuf,
    inotify: Inotify,
}

impl InotifyWatcher {
    /// Establish a watch on `dir`.
    ///
    /// Fails if `dir` does not exist, is not a directory, or inotify refuses
    /// the watch.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self, WatchError> {
        let dir = dir.into();
        let io_err = |source: io::Error| WatchError::Io {
            path: dir.clone(),
            source,
        };

        let metadata = fs::metadata(&dir).map_err(io_err)?;
        if !metadata.is_dir() {
            return Err(WatchError::NotADirectory { path: dir.clone() });
        }

        let inotify = Inotify::init(InitFlags::IN_CLOEXEC | InitFlags::IN_NONBLOCK)
            .map_err(|errno| io_err(errno.into()))?;
        inotify
            .add_watch(dir.as_path(), watch_mask())
            .map_err(|errno| io_err(errno.into()))?;
        debug!(dir = %dir.display(), "Directory watch established");

        Ok(Self { dir, inotify })
    }

    /// The watched directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    async fn forward(
        self,
        events: mpsc::Sender<FileEvent>,
        errors: mpsc::Sender<WatchError>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        let Self { dir, inotify } = self;
        let fd = match AsyncFd::new(InotifyFd(inotify)) {
            Ok(fd) => fd,
            Err(source) => {
                let _ = errors.send(WatchError::Io { path: dir, source }).await;
                return;
            }
        };

        loop {
            let batch = tokio::select! {
                biased;

                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!(dir = %dir.display(), "Directory watch stopped");
                        return;
                    }
                    continue;
                }
                ready = fd.readable() => {
                    let read = match ready {
                        Ok(mut guard) => guard.try_io(|inner| {
                            inner.get_ref().0.read_events().map_err(io::Error::from)
                        }),
                        Err(source) => Ok(Err(source)),
                    };
                    match read {
                        Ok(Ok(batch)) => batch,
                        Ok(Err(source)) => {
                            let _ = errors.send(WatchError::Io { path: dir, source }).await;
                            return;
                        }
                        // Spurious readiness; readiness was cleared.
                        Err(_) => continue,
                    }
                }
            };

            for event in &batch {
                if event.mask.contains(AddWatchFlags::IN_Q_OVERFLOW) {
                    let overflow = WatchError::Source("inotify queue overflow".to_string());
                    if errors.send(overflow).await.is_err() {
                        return;
                    }
                    continue;
                }
                if event.mask.contains(AddWatchFlags::IN_IGNORED) {
                    let removed = WatchError::Source(format!(
                        "watch on {} was removed",
                        dir.display()
                    ));
                    let _ = errors.send(removed).await;
                    return;
                }
                if let Some(event) = translate(&dir, event) {
                    if events.send(event).await.is_err() {
                        return;
                    }
                }
            }
        }
    }
}

impl fmt::Debug for InotifyWatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InotifyWatcher")
            .field("dir", &self.dir)
            .finish_non_exhaustive()
    }
}

impl ChangeSource for InotifyWatcher {
    fn start(self: Box<Self>, shutdown: watch::Receiver<bool>) -> WatchStreams {
        let (event_tx, events) = mpsc::channel(EVENT_BUFFER);
        let (error_tx, errors) = mpsc::channel(ERROR_BUFFER);
        tokio::spawn((*self).forward(event_tx, error_tx, shutdown));
        WatchStreams { events, errors }
    }
}

/// Registers the inotify descriptor with the tokio reactor.
struct InotifyFd(Inotify);

impl AsRawFd for InotifyFd {
    fn as_raw_fd(&self) -> RawFd {
        self.0.as_fd().as_raw_fd()
    }
}

fn event_kind(mask: AddWatchFlags) -> Option<FileEventKind> {
    if mask.intersects(AddWatchFlags::IN_CREATE | AddWatchFlags::IN_MOVED_TO) {
        Some(FileEventKind::Create)
    } else if mask.contains(AddWatchFlags::IN_CLOSE_WRITE) {
        Some(FileEventKind::Write)
    } else if mask.intersects(AddWatchFlags::IN_DELETE | AddWatchFlags::IN_MOVED_FROM) {
        Some(FileEventKind::Remove)
    } else {
        None
    }
}

fn translate(dir: &Path, event: &InotifyEvent) -> Option<FileEvent> {
    let kind = event_kind(event.mask)?;
    let path = match event.name.as_deref() {
        Some(name) if !name.is_empty() => dir.join(name),
        _ => dir.to_path_buf(),
    };
    Some(FileEvent::new(path, kind))
}
