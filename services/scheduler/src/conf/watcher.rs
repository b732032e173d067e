//! Configuration watch loop.
//!
//! Bridges a [`ChangeSource`](super::ChangeSource) to the store: every create
//! or write event in the configuration directory triggers a reload followed by
//! the change handlers. Both run on the blocking pool, one event at a time.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, error, info, instrument, warn};

use super::source::WatchStreams;
use super::store::ConfigStore;

impl ConfigStore {
    /// Run the watch loop until shutdown or until the source closes.
    ///
    /// Returns immediately when the store has no configuration file, or when
    /// the source was already taken by an earlier call.
    #[instrument(skip_all, fields(path = ?self.path()))]
    pub async fn watch(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        let Some(source) = self.take_source() else {
            debug!("No configuration file to watch");
            return;
        };

        let WatchStreams {
            mut events,
            mut errors,
        } = source.start(shutdown.clone());
        info!("Watching scheduler configuration");

        loop {
            if *shutdown.borrow() {
                break;
            }

            tokio::select! {
                biased;

                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
                event = events.recv() => {
                    let Some(event) = event else {
                        info!("Configuration event stream closed");
                        break;
                    };
                    debug!(file = %event.path.display(), kind = %event.kind, "Configuration directory event");
                    if event.kind.triggers_reload() {
                        let store = Arc::clone(&self);
                        let reloaded = tokio::task::spawn_blocking(move || {
                            let outcome = store.reload();
                            store.notify_handlers(&outcome);
                        })
                        .await;
                        if let Err(e) = reloaded {
                            error!(error = %e, "Configuration reload panicked");
                        }
                    }
                }
                error = errors.recv() => {
                    let Some(error) = error else {
                        info!("Configuration error stream closed");
                        break;
                    };
                    warn!(error = %error, "Configuration watch error");
                }
            }
        }

        info!("Configuration watch stopped");
    }
}
