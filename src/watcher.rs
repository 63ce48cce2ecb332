// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! File system watcher for monitoring a single drop directory

use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tracing::{debug, info};

use crate::Result;

/// Live watch on one directory.
///
/// Owns the OS watch handle; dropping the subscription releases it. Both
/// streams stay open for as long as the handle is alive.
pub struct WatchSubscription {
    /// Paths reported by create events
    pub candidates: UnboundedReceiver<PathBuf>,
    /// Errors reported by the watch backend
    pub errors: UnboundedReceiver<notify::Error>,
    handle: Option<RecommendedWatcher>,
}

impl WatchSubscription {
    /// Subscription fed by the caller instead of an OS watch
    pub fn from_channels(
        candidates: UnboundedReceiver<PathBuf>,
        errors: UnboundedReceiver<notify::Error>,
    ) -> Self {
        Self {
            candidates,
            errors,
            handle: None,
        }
    }

    /// Whether an OS watch backs this subscription
    pub fn is_attached(&self) -> bool {
        self.handle.is_some()
    }
}

impl std::fmt::Debug for WatchSubscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatchSubscription")
            .field("attached", &self.is_attached())
            .finish()
    }
}

/// Opens non-recursive create-event subscriptions
pub struct DirectoryWatcher;

impl DirectoryWatcher {
    /// Start watching `path`.
    ///
    /// The directory must already exist; subdirectories are not watched.
    pub fn subscribe(path: &Path) -> Result<WatchSubscription> {
        let (candidate_tx, candidate_rx) = unbounded_channel();
        let (error_tx, error_rx) = unbounded_channel();

        let config = Config::default()
            .with_poll_interval(Duration::from_secs(2));

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| forward(res, &candidate_tx, &error_tx),
            config,
        )?;
        watcher.watch(path, RecursiveMode::NonRecursive)?;
        info!("Watching: {:?}", path);

        Ok(WatchSubscription {
            candidates: candidate_rx,
            errors: error_rx,
            handle: Some(watcher),
        })
    }
}

/// Route one backend notification into the subscription streams
fn forward(
    res: notify::Result<Event>,
    candidates: &UnboundedSender<PathBuf>,
    errors: &UnboundedSender<notify::Error>,
) {
    match res {
        Ok(event) => {
            if let EventKind::Create(_) = event.kind {
                for path in event.paths {
                    debug!("Create event: {:?}", path);
                    // receiver gone means the owner is shutting down
                    let _ = candidates.send(path);
                }
            }
        }
        Err(e) => {
            let _ = errors.send(e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{CreateKind, ModifyKind, RemoveKind};
    use tokio::time::timeout;

    fn event(kind: EventKind, path: &str) -> notify::Result<Event> {
        Ok(Event::new(kind).add_path(PathBuf::from(path)))
    }

    #[test]
    fn test_only_create_events_are_forwarded() {
        let (ctx, mut crx) = unbounded_channel();
        let (etx, mut erx) = unbounded_channel();

        forward(event(EventKind::Modify(ModifyKind::Any), "/d/m.jpg"), &ctx, &etx);
        forward(event(EventKind::Remove(RemoveKind::File), "/d/r.jpg"), &ctx, &etx);
        forward(event(EventKind::Create(CreateKind::File), "/d/c.jpg"), &ctx, &etx);

        assert_eq!(crx.try_recv().unwrap(), PathBuf::from("/d/c.jpg"));
        assert!(crx.try_recv().is_err());
        assert!(erx.try_recv().is_err());
    }

    #[test]
    fn test_backend_errors_go_to_error_stream() {
        let (ctx, mut crx) = unbounded_channel();
        let (etx, mut erx) = unbounded_channel();

        forward(Err(notify::Error::generic("backend hiccup")), &ctx, &etx);

        assert!(crx.try_recv().is_err());
        assert!(erx.try_recv().unwrap().to_string().contains("backend hiccup"));
    }

    #[test]
    fn test_subscribe_missing_directory_fails() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope");
        assert!(DirectoryWatcher::subscribe(&missing).is_err());
    }

    #[tokio::test]
    async fn test_subscription_reports_created_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut sub = DirectoryWatcher::subscribe(dir.path()).unwrap();
        assert!(sub.is_attached());

        let created = dir.path().join("shot.jpg");
        std::fs::write(&created, b"jpeg").unwrap();

        let seen = timeout(Duration::from_secs(5), sub.candidates.recv())
            .await
            .expect("no create event")
            .expect("stream closed");
        assert_eq!(seen, created);
    }

    #[test]
    fn test_detached_subscription_streams_close_with_senders() {
        let (ctx, crx) = unbounded_channel::<PathBuf>();
        let (etx, erx) = unbounded_channel();
        let mut sub = WatchSubscription::from_channels(crx, erx);
        assert!(!sub.is_attached());

        drop(ctx);
        drop(etx);
        assert!(sub.candidates.try_recv().is_err());
        assert!(sub.errors.try_recv().is_err());
    }
}
