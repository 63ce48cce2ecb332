// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Per-directory rename loop

use serde::Serialize;
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::{broadcast, watch};
use tracing::{debug, error, info, warn};

use crate::allocator::{NameAllocator, Refusal};
use crate::config::EngineSettings;
use crate::filter::ImageFilter;
use crate::session::WatchTarget;
use crate::watcher::WatchSubscription;

/// Why a create event did not lead to a rename
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    NotImage,
    Exhausted,
    SourceMissing,
    AlreadyAssigned,
}

/// Progress notifications published while a session runs
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SessionEvent {
    Renamed {
        target: WatchTarget,
        from: PathBuf,
        to: PathBuf,
        name: String,
    },
    RenameFailed {
        target: WatchTarget,
        path: PathBuf,
        name: String,
        error: String,
    },
    Skipped {
        target: WatchTarget,
        path: PathBuf,
        reason: SkipReason,
    },
    WatchError {
        target: WatchTarget,
        message: String,
    },
    WorkerFinished {
        target: WatchTarget,
        outcome: WorkerOutcome,
    },
}

/// How a worker ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum WorkerOutcome {
    /// Every name of the naming order was handed out
    Exhausted { renamed: usize },
    /// Stopped on request before the naming order ran out
    Cancelled { renamed: usize },
    /// The event stream ended underneath the worker
    StreamClosed { renamed: usize },
    /// The directory could not be watched at all
    WatchFailed { error: String },
    /// The worker task died
    Panicked { error: String },
}

impl WorkerOutcome {
    /// Files successfully renamed before the worker stopped
    pub fn renamed(&self) -> usize {
        match self {
            WorkerOutcome::Exhausted { renamed }
            | WorkerOutcome::Cancelled { renamed }
            | WorkerOutcome::StreamClosed { renamed } => *renamed,
            WorkerOutcome::WatchFailed { .. } | WorkerOutcome::Panicked { .. } => 0,
        }
    }

    /// True when the directory was never (or no longer) properly watched
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            WorkerOutcome::WatchFailed { .. } | WorkerOutcome::Panicked { .. }
        )
    }
}

enum Step {
    Continue,
    Cancelled,
}

/// Renames images arriving in one directory until its names run out.
pub struct RenameWorker {
    target: WatchTarget,
    directory: PathBuf,
    allocator: NameAllocator,
    filter: ImageFilter,
    stabilization_delay: Duration,
    events: broadcast::Sender<SessionEvent>,
    renamed: usize,
}

impl RenameWorker {
    /// Worker for `target`, renaming with `names` and reporting on `events`
    pub fn new(
        target: WatchTarget,
        names: Vec<String>,
        settings: &EngineSettings,
        events: broadcast::Sender<SessionEvent>,
    ) -> Self {
        let directory = target.resolved();
        Self {
            allocator: NameAllocator::new(directory.clone(), names),
            directory,
            target,
            filter: settings.image_filter(),
            stabilization_delay: settings.stabilization_delay,
            events,
            renamed: 0,
        }
    }

    /// Directory this worker renames in
    pub fn target(&self) -> &WatchTarget {
        &self.target
    }

    /// True once the naming order is used up
    pub fn is_exhausted(&self) -> bool {
        self.allocator.is_exhausted()
    }

    /// Drive the loop until exhausted, cancelled, or the stream closes.
    ///
    /// The subscription is dropped, releasing the watch, on every return.
    pub async fn run(
        mut self,
        mut subscription: WatchSubscription,
        mut cancel: watch::Receiver<bool>,
    ) -> WorkerOutcome {
        if *cancel.borrow() {
            return WorkerOutcome::Cancelled { renamed: 0 };
        }

        info!(
            "Monitoring {:?} ({} names)",
            self.directory,
            self.allocator.remaining()
        );

        while !self.allocator.is_exhausted() {
            tokio::select! {
                biased;

                _ = cancel.changed() => {
                    info!("Stopping {:?}: cancelled", self.directory);
                    return WorkerOutcome::Cancelled { renamed: self.renamed };
                }
                candidate = subscription.candidates.recv() => {
                    let Some(path) = candidate else {
                        warn!("Event stream closed for {:?}", self.directory);
                        return WorkerOutcome::StreamClosed { renamed: self.renamed };
                    };
                    if let Step::Cancelled = self.handle_candidate(path, &mut cancel).await {
                        info!("Stopping {:?}: cancelled", self.directory);
                        return WorkerOutcome::Cancelled { renamed: self.renamed };
                    }
                }
                Some(err) = subscription.errors.recv() => {
                    warn!("Watch error on {:?}: {}", self.directory, err);
                    self.publish(SessionEvent::WatchError {
                        target: self.target.clone(),
                        message: err.to_string(),
                    });
                }
            }
        }

        info!(
            "Naming order exhausted for {:?} after {} renames",
            self.directory, self.renamed
        );
        WorkerOutcome::Exhausted { renamed: self.renamed }
    }

    async fn handle_candidate(&mut self, path: PathBuf, cancel: &mut watch::Receiver<bool>) -> Step {
        if !self.filter.is_candidate(&path) {
            self.skip(path, SkipReason::NotImage);
            return Step::Continue;
        }
        if self.allocator.is_exhausted() {
            self.skip(path, SkipReason::Exhausted);
            return Step::Continue;
        }

        // give the writer a moment to finish
        tokio::select! {
            biased;
            _ = cancel.changed() => return Step::Cancelled,
            _ = tokio::time::sleep(self.stabilization_delay) => {}
        }

        if !path.exists() {
            self.allocator.release(&path);
            self.skip(path, SkipReason::SourceMissing);
            return Step::Continue;
        }

        let event = match self.allocator.allocate(&path) {
            Ok(event) => event,
            Err(Refusal::Exhausted) => {
                self.skip(path, SkipReason::Exhausted);
                return Step::Continue;
            }
            Err(Refusal::Duplicate) => {
                self.skip(path, SkipReason::AlreadyAssigned);
                return Step::Continue;
            }
        };

        if event.target.exists() {
            warn!("Overwriting existing {:?}", event.target);
        }

        match std::fs::rename(&event.source, &event.target) {
            Ok(()) => {
                self.allocator.release(&event.source);
                self.renamed += 1;
                info!("Renamed {:?} -> {:?}", event.source, event.target);
                self.publish(SessionEvent::Renamed {
                    target: self.target.clone(),
                    from: event.source.clone(),
                    to: event.target.clone(),
                    name: event.name.clone(),
                });
            }
            Err(e) => {
                // the slot stays consumed and the source stays blocked
                error!("Failed to rename {:?} to {:?}: {}", event.source, event.target, e);
                self.publish(SessionEvent::RenameFailed {
                    target: self.target.clone(),
                    path: event.source.clone(),
                    name: event.name.clone(),
                    error: e.to_string(),
                });
            }
        }

        Step::Continue
    }

    fn skip(&self, path: PathBuf, reason: SkipReason) {
        debug!("Skipping {:?}: {:?}", path, reason);
        self.publish(SessionEvent::Skipped {
            target: self.target.clone(),
            path,
            reason,
        });
    }

    fn publish(&self, event: SessionEvent) {
        // no subscribers is fine
        let _ = self.events.send(event);
    }
}
