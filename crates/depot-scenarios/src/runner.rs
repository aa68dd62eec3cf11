//! Thread-per-request scenario execution.

use std::thread;
use std::time::Duration;

use anyhow::Result;
use crossbeam_channel::{unbounded, Sender};
use depot::{
    ComponentId, DepotConfig, DeviceId, StorageScheduler, TransferError, TransferRequest,
};
use log::debug;

use crate::script::Op;

/// Which stage callback fired.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StageKind {
    Copy,
    Commit,
}

/// One stage callback observation. Channel delivery order gives a total
/// order consistent with real time across all caller threads.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StageEvent {
    pub component: ComponentId,
    pub kind: StageKind,
}

/// Outcome of a scenario run.
#[derive(Debug)]
pub struct ScenarioReport {
    pub events: Vec<StageEvent>,
    pub failures: Vec<(ComponentId, TransferError)>,
}

impl ScenarioReport {
    pub fn events_for(&self, component: ComponentId) -> Vec<StageEvent> {
        self.events
            .iter()
            .copied()
            .filter(|e| e.component == component)
            .collect()
    }
}

struct LoggedRequest {
    op: Op,
    log: Sender<StageEvent>,
}

impl TransferRequest for LoggedRequest {
    fn component_id(&self) -> ComponentId {
        self.op.component
    }

    fn source_id(&self) -> Option<DeviceId> {
        self.op.source
    }

    fn destination_id(&self) -> Option<DeviceId> {
        self.op.destination
    }

    fn prepare(&self) {
        let _ = self.log.send(StageEvent {
            component: self.op.component,
            kind: StageKind::Copy,
        });
    }

    fn perform(&self) {
        let _ = self.log.send(StageEvent {
            component: self.op.component,
            kind: StageKind::Commit,
        });
    }
}

/// Owns a scheduler and drives scripted workloads against it, one
/// caller thread per op.
pub struct ScenarioRunner {
    scheduler: StorageScheduler,
}

impl ScenarioRunner {
    pub fn new(config: DepotConfig) -> Result<Self> {
        let scheduler = StorageScheduler::new(config)?;
        Ok(Self { scheduler })
    }

    pub fn scheduler(&self) -> &StorageScheduler {
        &self.scheduler
    }

    /// Launches every op on its own thread, `stagger` apart in script
    /// order, and blocks until all of them have returned.
    pub fn run(&self, ops: &[Op], stagger: Duration) -> ScenarioReport {
        let (event_tx, event_rx) = unbounded();
        let (failure_tx, failure_rx) = unbounded::<(ComponentId, TransferError)>();

        thread::scope(|s| {
            for (idx, &op) in ops.iter().enumerate() {
                let request = LoggedRequest {
                    op,
                    log: event_tx.clone(),
                };
                let failure_tx = failure_tx.clone();
                let scheduler = &self.scheduler;
                s.spawn(move || {
                    if let Err(err) = scheduler.execute(&request) {
                        debug!("op {idx} rejected: {err}");
                        let _ = failure_tx.send((request.op.component, err));
                    }
                });
                thread::sleep(stagger);
            }
        });

        drop(event_tx);
        drop(failure_tx);
        ScenarioReport {
            events: event_rx.try_iter().collect(),
            failures: failure_rx.try_iter().collect(),
        }
    }
}
