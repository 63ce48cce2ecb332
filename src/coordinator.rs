// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Runs one rename worker per watched directory and reports when all are done

use serde::Serialize;
use tokio::sync::{broadcast, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::config::{EngineSettings, NamingOrder};
use crate::session::WatchTarget;
use crate::watcher::{DirectoryWatcher, WatchSubscription};
use crate::worker::{RenameWorker, SessionEvent, WorkerOutcome};
use crate::{AutoRenameError, Result};

/// Capacity of the progress channel; slow subscribers see `Lagged`
pub const EVENT_CAPACITY: usize = 256;

/// Final result of a monitoring session, one entry per target in start order
#[derive(Debug, Clone, Default, Serialize)]
pub struct SessionReport {
    pub outcomes: Vec<(WatchTarget, WorkerOutcome)>,
}

impl SessionReport {
    /// Successful renames across all directories
    pub fn renamed_total(&self) -> usize {
        self.outcomes.iter().map(|(_, o)| o.renamed()).sum()
    }

    /// Targets whose worker could not run or died
    pub fn failures(&self) -> impl Iterator<Item = &(WatchTarget, WorkerOutcome)> {
        self.outcomes.iter().filter(|(_, o)| o.is_failure())
    }

    /// True when every directory used up its naming order
    pub fn all_exhausted(&self) -> bool {
        self.outcomes
            .iter()
            .all(|(_, o)| matches!(o, WorkerOutcome::Exhausted { .. }))
    }
}

enum Launch {
    Run(RenameWorker, WatchSubscription),
    Done(WorkerOutcome),
}

/// Starts monitoring sessions
pub struct MonitorCoordinator {
    settings: EngineSettings,
}

impl MonitorCoordinator {
    /// Create a coordinator whose workers share `settings`
    pub fn new(settings: EngineSettings) -> Self {
        Self { settings }
    }

    /// Launch one worker per target, each seeded with its own copy of the
    /// naming order.
    ///
    /// Watches are opened before this returns. A directory that cannot be
    /// watched ends up as `WatchFailed` in the report and does not hold up
    /// the others. Must be called from within a tokio runtime.
    pub fn start(&self, targets: Vec<WatchTarget>, naming_order: &NamingOrder) -> SessionHandle {
        let (cancel_tx, _) = watch::channel(false);
        let (done_tx, done_rx) = oneshot::channel();
        // one bus per session, with a receiver that sees it from the start
        let (events_tx, first_rx) = broadcast::channel(EVENT_CAPACITY);

        info!(
            "Starting session: {} directories, {} names each",
            targets.len(),
            naming_order.len()
        );

        let mut tasks: Vec<(WatchTarget, JoinHandle<WorkerOutcome>)> = Vec::with_capacity(targets.len());
        for target in targets {
            let worker = RenameWorker::new(
                target.clone(),
                naming_order.names().to_vec(),
                &self.settings,
                events_tx.clone(),
            );

            let launch = if worker.is_exhausted() {
                Launch::Done(WorkerOutcome::Exhausted { renamed: 0 })
            } else {
                match DirectoryWatcher::subscribe(&target.resolved()) {
                    Ok(subscription) => Launch::Run(worker, subscription),
                    Err(e) => {
                        error!("Cannot watch {}: {}", target, e);
                        Launch::Done(WorkerOutcome::WatchFailed { error: e.to_string() })
                    }
                }
            };

            let cancel_rx = cancel_tx.subscribe();
            let events = events_tx.clone();
            let finished = target.clone();
            let task = tokio::spawn(async move {
                let outcome = match launch {
                    Launch::Run(worker, subscription) => worker.run(subscription, cancel_rx).await,
                    Launch::Done(outcome) => outcome,
                };
                let _ = events.send(SessionEvent::WorkerFinished {
                    target: finished,
                    outcome: outcome.clone(),
                });
                outcome
            });
            tasks.push((target, task));
        }

        tokio::spawn(supervise(tasks, done_tx));

        SessionHandle {
            cancel: cancel_tx,
            events: events_tx,
            initial_events: Some(first_rx),
            completion: Completion::Pending(done_rx),
        }
    }
}

/// Join every worker in start order, then fire the completion once
async fn supervise(
    tasks: Vec<(WatchTarget, JoinHandle<WorkerOutcome>)>,
    done: oneshot::Sender<SessionReport>,
) {
    let mut outcomes = Vec::with_capacity(tasks.len());
    for (target, task) in tasks {
        let outcome = match task.await {
            Ok(outcome) => outcome,
            Err(e) if e.is_panic() => {
                error!("Worker for {} panicked: {}", target, e);
                WorkerOutcome::Panicked { error: e.to_string() }
            }
            Err(e) => {
                warn!("Worker for {} aborted: {}", target, e);
                WorkerOutcome::Cancelled { renamed: 0 }
            }
        };
        outcomes.push((target, outcome));
    }

    let report = SessionReport { outcomes };
    info!(
        "Session finished: {} renames, {} failed directories",
        report.renamed_total(),
        report.failures().count()
    );
    // the handle may be gone already
    let _ = done.send(report);
}

/// Where the completion value currently lives
#[derive(Debug)]
enum Completion {
    Pending(oneshot::Receiver<SessionReport>),
    Taken(SessionReport),
    Lost,
}

/// Control surface of a running session.
///
/// Dropping the handle cancels every worker.
#[derive(Debug)]
pub struct SessionHandle {
    cancel: watch::Sender<bool>,
    events: broadcast::Sender<SessionEvent>,
    initial_events: Option<broadcast::Receiver<SessionEvent>>,
    completion: Completion,
}

impl SessionHandle {
    /// Progress stream of this session from this point on
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    /// Progress stream including everything published since `start`.
    ///
    /// Only the first call returns a receiver.
    pub fn take_events(&mut self) -> Option<broadcast::Receiver<SessionEvent>> {
        self.initial_events.take()
    }

    /// Ask every worker to stop at its next suspension point
    pub fn cancel(&self) {
        // send_replace never fails, even with every worker gone
        self.cancel.send_replace(true);
    }

    /// Non-blocking check for the completion value.
    ///
    /// Returns the report once; `wait` and `shutdown` still hand it out
    /// afterwards.
    pub fn poll_completion(&mut self) -> Option<SessionReport> {
        let Completion::Pending(rx) = &mut self.completion else {
            return None;
        };
        match rx.try_recv() {
            Ok(report) => {
                self.completion = Completion::Taken(report.clone());
                Some(report)
            }
            Err(oneshot::error::TryRecvError::Empty) => None,
            Err(oneshot::error::TryRecvError::Closed) => {
                self.completion = Completion::Lost;
                None
            }
        }
    }

    /// Wait until every worker has terminated
    pub async fn wait(self) -> Result<SessionReport> {
        let SessionHandle { cancel, completion, .. } = self;
        let report = match completion {
            Completion::Pending(rx) => rx.await.ok(),
            Completion::Taken(report) => Some(report),
            Completion::Lost => None,
        };
        // keep workers un-cancelled until the report is in
        drop(cancel);
        report.ok_or_else(|| AutoRenameError::Session("completion channel closed".to_string()))
    }

    /// Cancel, then wait for every worker to release its watch
    pub async fn shutdown(self) -> Result<SessionReport> {
        self.cancel();
        self.wait().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::Path;
    use std::time::Duration;
    use tokio::time::timeout;

    const WAIT: Duration = Duration::from_secs(10);

    fn coordinator() -> MonitorCoordinator {
        MonitorCoordinator::new(EngineSettings {
            stabilization_delay: Duration::from_millis(50),
            ..EngineSettings::default()
        })
    }

    fn order(list: &[&str]) -> NamingOrder {
        NamingOrder::new(list.iter().map(|s| s.to_string()).collect())
    }

    fn targets(root: &Path, subs: &[&str]) -> Vec<WatchTarget> {
        subs.iter()
            .map(|s| {
                fs::create_dir_all(root.join(s)).unwrap();
                WatchTarget::new(root, *s)
            })
            .collect()
    }

    async fn wait_finished(events: &mut broadcast::Receiver<SessionEvent>, dir: &str) -> WorkerOutcome {
        loop {
            let event = timeout(WAIT, events.recv()).await.expect("no event").expect("bus closed");
            if let SessionEvent::WorkerFinished { target, outcome } = event {
                if target.subdirectory == dir {
                    return outcome;
                }
            }
        }
    }

    #[tokio::test]
    async fn test_scenario_two_names_one_directory() {
        let dir = tempfile::tempdir().unwrap();
        let work = dir.path();
        let coord = coordinator();
        let mut handle = coord.start(targets(work, &["a"]), &order(&["001", "002"]));
        let mut events = handle.take_events().unwrap();

        fs::write(work.join("a/x.jpg"), b"x").unwrap();
        loop {
            let event = timeout(WAIT, events.recv()).await.unwrap().unwrap();
            if matches!(event, SessionEvent::Renamed { .. }) {
                break;
            }
        }
        fs::write(work.join("a/y.png"), b"y").unwrap();

        let report = timeout(WAIT, handle.wait()).await.unwrap().unwrap();
        assert!(report.all_exhausted());
        assert_eq!(report.renamed_total(), 2);
        assert!(work.join("a/001.jpg").exists());
        assert!(work.join("a/002.png").exists());

        // worker is gone, later drops stay as they are
        fs::write(work.join("a/z.jpg"), b"z").unwrap();
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(work.join("a/z.jpg").exists());
    }

    #[tokio::test]
    async fn test_completion_waits_for_every_worker() {
        let dir = tempfile::tempdir().unwrap();
        let work = dir.path();
        let coord = coordinator();
        let mut handle = coord.start(targets(work, &["a", "b"]), &order(&["001"]));
        let mut events = handle.take_events().unwrap();

        fs::write(work.join("a/x.jpg"), b"x").unwrap();
        let outcome = wait_finished(&mut events, "a").await;
        assert_eq!(outcome, WorkerOutcome::Exhausted { renamed: 1 });

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(handle.poll_completion().is_none());

        fs::write(work.join("b/y.png"), b"y").unwrap();
        let report = timeout(WAIT, handle.wait()).await.unwrap().unwrap();
        assert_eq!(report.outcomes.len(), 2);
        assert!(report.all_exhausted());
        assert!(work.join("a/001.jpg").exists());
        assert!(work.join("b/001.png").exists());
    }

    #[tokio::test]
    async fn test_empty_naming_order_completes_immediately() {
        let dir = tempfile::tempdir().unwrap();
        let coord = coordinator();
        let handle = coord.start(targets(dir.path(), &["a", "b"]), &NamingOrder::default());

        let report = timeout(WAIT, handle.wait()).await.unwrap().unwrap();
        assert_eq!(report.renamed_total(), 0);
        assert!(report.all_exhausted());
    }

    #[tokio::test]
    async fn test_watch_failure_is_isolated() {
        let dir = tempfile::tempdir().unwrap();
        let work = dir.path();
        let mut list = targets(work, &["ok"]);
        list.insert(0, WatchTarget::new(work, "missing"));

        let coord = coordinator();
        let handle = coord.start(list, &order(&["001"]));

        fs::write(work.join("ok/x.jpg"), b"x").unwrap();
        let report = timeout(WAIT, handle.wait()).await.unwrap().unwrap();

        assert!(matches!(report.outcomes[0].1, WorkerOutcome::WatchFailed { .. }));
        assert_eq!(report.outcomes[1].1, WorkerOutcome::Exhausted { renamed: 1 });
        assert_eq!(report.failures().count(), 1);
        assert!(work.join("ok/001.jpg").exists());
    }

    #[tokio::test]
    async fn test_shutdown_cancels_all_workers() {
        let dir = tempfile::tempdir().unwrap();
        let work = dir.path();
        let coord = coordinator();
        let handle = coord.start(targets(work, &["a", "b", "c"]), &order(&["001", "002"]));

        let report = timeout(WAIT, handle.shutdown()).await.unwrap().unwrap();
        assert_eq!(report.outcomes.len(), 3);
        for (_, outcome) in &report.outcomes {
            assert_eq!(*outcome, WorkerOutcome::Cancelled { renamed: 0 });
        }
    }

    #[tokio::test]
    async fn test_completion_is_delivered_once() {
        let dir = tempfile::tempdir().unwrap();
        let coord = coordinator();
        let mut handle = coord.start(targets(dir.path(), &["a"]), &NamingOrder::default());

        let mut first = None;
        for _ in 0..100 {
            if let Some(report) = handle.poll_completion() {
                first = Some(report);
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(first.is_some());
        assert!(handle.poll_completion().is_none());
    }

    #[tokio::test]
    async fn test_shutdown_after_polled_completion_returns_report() {
        let dir = tempfile::tempdir().unwrap();
        let coord = coordinator();
        let mut handle = coord.start(targets(dir.path(), &["a"]), &NamingOrder::default());

        let mut polled = None;
        for _ in 0..100 {
            polled = handle.poll_completion();
            if polled.is_some() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        let polled = polled.expect("session never completed");

        let report = timeout(WAIT, handle.shutdown()).await.unwrap().unwrap();
        assert_eq!(report.outcomes, polled.outcomes);
    }

    #[tokio::test]
    async fn test_sessions_do_not_share_progress() {
        let dir = tempfile::tempdir().unwrap();
        let coord = coordinator();
        let mut first = coord.start(targets(dir.path(), &["a"]), &NamingOrder::default());
        let mut first_events = first.take_events().unwrap();
        let second = coord.start(targets(dir.path(), &["b"]), &NamingOrder::default());

        timeout(WAIT, second.wait()).await.unwrap().unwrap();
        assert_eq!(wait_finished(&mut first_events, "a").await, WorkerOutcome::Exhausted { renamed: 0 });
        assert!(first.take_events().is_none());
        timeout(WAIT, first.wait()).await.unwrap().unwrap();

        while let Ok(event) = first_events.try_recv() {
            if let SessionEvent::WorkerFinished { target, .. } = event {
                assert_eq!(target.subdirectory, "a");
            }
        }
    }

    #[test]
    fn test_report_serializes_outcomes() {
        let report = SessionReport {
            outcomes: vec![(WatchTarget::new("/work", "a"), WorkerOutcome::Exhausted { renamed: 2 })],
        };
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["outcomes"][0][1]["status"], "exhausted");
        assert_eq!(json["outcomes"][0][1]["renamed"], 2);
    }
}
