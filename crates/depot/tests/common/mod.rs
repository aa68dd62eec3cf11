#![allow(dead_code)]
//! Shared scaffolding for the concurrency tests: a scripted request
//! whose stages can announce themselves and hold until released, and a
//! channel-backed event log establishing a total order across threads.

use std::collections::HashMap;

use crossbeam_channel::{unbounded, Receiver, Sender};
use depot::{ComponentId, DepotConfig, DeviceId, StorageScheduler, TransferRequest};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Stage {
    Copy,
    Commit,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Event {
    pub component: ComponentId,
    pub stage: Stage,
}

pub struct EventLog {
    tx: Sender<Event>,
    rx: Receiver<Event>,
}

impl EventLog {
    pub fn new() -> Self {
        let (tx, rx) = unbounded();
        Self { tx, rx }
    }

    pub fn recorder(&self) -> Sender<Event> {
        self.tx.clone()
    }

    pub fn drain(&self) -> Vec<Event> {
        self.rx.try_iter().collect()
    }
}

/// Position of an event in the drained log; panics if absent so a test
/// failure points at the missing stage.
pub fn index_of(events: &[Event], component: ComponentId, stage: Stage) -> usize {
    events
        .iter()
        .position(|e| e.component == component && e.stage == stage)
        .unwrap_or_else(|| panic!("no {stage:?} event for {component}"))
}

/// Transfer request whose stage-1 can be held back and observed.
pub struct ScriptedRequest {
    component: ComponentId,
    source: Option<DeviceId>,
    destination: Option<DeviceId>,
    log: Sender<Event>,
    copy_started: Option<Sender<()>>,
    copy_hold: Option<Receiver<()>>,
}

impl ScriptedRequest {
    pub fn new(
        component: ComponentId,
        source: Option<DeviceId>,
        destination: Option<DeviceId>,
        log: Sender<Event>,
    ) -> Self {
        Self {
            component,
            source,
            destination,
            log,
            copy_started: None,
            copy_hold: None,
        }
    }

    /// Announce on `tx` when stage-1 is entered.
    pub fn announcing_copy(mut self, tx: Sender<()>) -> Self {
        self.copy_started = Some(tx);
        self
    }

    /// Hold inside stage-1 until `rx` yields (or disconnects).
    pub fn holding_copy(mut self, rx: Receiver<()>) -> Self {
        self.copy_hold = Some(rx);
        self
    }
}

impl TransferRequest for ScriptedRequest {
    fn component_id(&self) -> ComponentId {
        self.component
    }

    fn source_id(&self) -> Option<DeviceId> {
        self.source
    }

    fn destination_id(&self) -> Option<DeviceId> {
        self.destination
    }

    fn prepare(&self) {
        if let Some(tx) = &self.copy_started {
            let _ = tx.send(());
        }
        if let Some(rx) = &self.copy_hold {
            let _ = rx.recv();
        }
        let _ = self.log.send(Event {
            component: self.component,
            stage: Stage::Copy,
        });
    }

    fn perform(&self) {
        let _ = self.log.send(Event {
            component: self.component,
            stage: Stage::Commit,
        });
    }
}

pub fn system(capacities: &[(u32, usize)], placement: &[(u32, u32)]) -> StorageScheduler {
    let config = DepotConfig::new(
        capacities
            .iter()
            .map(|&(d, c)| (DeviceId(d), c))
            .collect::<HashMap<_, _>>(),
        placement
            .iter()
            .map(|&(comp, d)| (ComponentId(comp), DeviceId(d)))
            .collect::<HashMap<_, _>>(),
    );
    StorageScheduler::new(config).expect("valid test config")
}

pub fn assert_accounting(sys: &StorageScheduler) {
    for snap in sys.snapshots() {
        assert_eq!(
            snap.free_slots + snap.resident.len(),
            snap.capacity,
            "{} accounting off: {snap:?}",
            snap.device
        );
    }
}
