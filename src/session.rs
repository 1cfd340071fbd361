//! Latest-target-wins synchronization for one engine.
//!
//! A [`SyncSession`] owns an engine in a background task. Targets are
//! submitted through a watch channel, so a burst of submissions collapses
//! into the newest one. A sync already talking to the engine is allowed to
//! finish (sent commands can't be taken back), but if a newer target
//! arrived meanwhile its result is dropped and the newest target is synced
//! instead. Only results for the current target are reported.

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::debug;

use crate::engine::EngineActor;
use crate::error::SyncError;
use crate::sync::{SyncOutcome, SyncTarget, Synchronizer};

#[derive(Clone, Debug)]
struct Stamped {
    generation: u64,
    target: SyncTarget,
}

/// Result of syncing the target submitted as `generation`.
#[derive(Debug)]
pub struct SyncReport {
    pub generation: u64,
    pub result: Result<SyncOutcome, SyncError>,
}

pub struct SyncSession<A> {
    targets: watch::Sender<Option<Stamped>>,
    reports: mpsc::Receiver<SyncReport>,
    task: JoinHandle<A>,
    generation: u64,
}

impl<A: EngineActor + 'static> SyncSession<A> {
    /// Move `actor` into a background task driven by submitted targets.
    pub fn spawn(actor: A, synchronizer: Synchronizer) -> Self {
        let (targets, rx) = watch::channel(None);
        let (tx, reports) = mpsc::channel(16);
        let task = tokio::spawn(run(actor, synchronizer, rx, tx));
        SyncSession {
            targets,
            reports,
            task,
            generation: 0,
        }
    }

    /// Queue `target`, superseding anything not yet synced. Returns its generation.
    pub fn submit(&mut self, target: SyncTarget) -> u64 {
        self.generation += 1;
        self.targets.send_replace(Some(Stamped {
            generation: self.generation,
            target,
        }));
        self.generation
    }

    /// Generation of the most recent submission.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Next report; `None` once the task has stopped.
    pub async fn next_report(&mut self) -> Option<SyncReport> {
        self.reports.recv().await
    }

    /// Wait for the report of the latest submission, skipping older ones.
    pub async fn settle(&mut self) -> Option<SyncReport> {
        while let Some(report) = self.reports.recv().await {
            if report.generation == self.generation {
                return Some(report);
            }
        }
        None
    }

    /// Stop accepting targets and hand the engine back.
    pub async fn shutdown(self) -> Option<A> {
        drop(self.targets);
        self.task.await.ok()
    }
}

async fn run<A: EngineActor>(
    mut actor: A,
    synchronizer: Synchronizer,
    mut targets: watch::Receiver<Option<Stamped>>,
    reports: mpsc::Sender<SyncReport>,
) -> A {
    while targets.changed().await.is_ok() {
        loop {
            let current = targets.borrow_and_update().clone();
            let Some(Stamped { generation, target }) = current else {
                break;
            };

            let result = synchronizer.sync(&mut actor, &target).await;

            if targets.has_changed().unwrap_or(false) {
                debug!(generation, "discarding superseded sync result");
                continue;
            }
            if reports.send(SyncReport { generation, result }).await.is_err() {
                return actor;
            }
            break;
        }
    }
    actor
}
