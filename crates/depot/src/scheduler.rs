//! Transfer admission and chain execution.
//!
//! Every caller thread drives its own transfer through [`execute`]:
//! validation and all queue/slot bookkeeping happen in short critical
//! sections under one global state mutex, while the stage callbacks and
//! all gate waits run outside it. Chained transfers synchronize purely
//! through their [`GatePair`]s: a member opens its successor's prepare
//! gate when it enters stage-1 and the successor's perform gate when
//! stage-1 returns, so stage-1 of member k+1 overlaps stage-2 of member
//! k without ever committing into a slot that has not begun draining.
//!
//! [`execute`]: StorageScheduler::execute

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use log::{debug, trace};
use parking_lot::Mutex;
use smallvec::SmallVec;

use crate::config::DepotConfig;
use crate::device::{Device, DeviceSnapshot};
use crate::error::{ConfigError, TransferError, TransferResult};
use crate::gate::GatePair;
use crate::ids::{ComponentId, DeviceId};
use crate::pending::{Admission, PendingTransfer, Phase, TransferId};
use crate::request::TransferRequest;

/// Chains are short in practice; keep discovery allocation-free.
type Chain = SmallVec<[TransferId; 4]>;

/// Everything the scheduler mutates, guarded by one mutex.
#[derive(Debug)]
struct State {
    devices: HashMap<DeviceId, Device>,
    /// Components with an in-flight request; guards double submission.
    active: HashSet<ComponentId>,
    /// Arena of admitted-but-uncommitted transfers.
    transfers: HashMap<TransferId, PendingTransfer>,
    next_transfer: u64,
}

impl State {
    fn device(&self, id: DeviceId) -> &Device {
        &self.devices[&id]
    }

    fn device_mut(&mut self, id: DeviceId) -> &mut Device {
        self.devices.get_mut(&id).expect("device registry is immutable after construction")
    }

    fn entry(&self, id: TransferId) -> &PendingTransfer {
        &self.transfers[&id]
    }

    fn entry_mut(&mut self, id: TransferId) -> &mut PendingTransfer {
        self.transfers.get_mut(&id).expect("pending transfer outlives its chain neighbors")
    }

    fn alloc(&mut self, transfer: PendingTransfer) -> TransferId {
        let id = TransferId(self.next_transfer);
        self.next_transfer += 1;
        self.transfers.insert(id, transfer);
        id
    }

    fn validate(
        &self,
        component: ComponentId,
        source: Option<DeviceId>,
        destination: Option<DeviceId>,
    ) -> TransferResult<()> {
        if source.is_none() && destination.is_none() {
            return Err(TransferError::IllegalRequestShape(component));
        }
        if let Some(dst) = destination {
            let device = self
                .devices
                .get(&dst)
                .ok_or(TransferError::UnknownDevice(dst))?;
            if device.holds(component) {
                return Err(if source.is_none() {
                    TransferError::ComponentAlreadyPresent {
                        component,
                        device: dst,
                    }
                } else {
                    TransferError::TransferNotNeeded {
                        component,
                        device: dst,
                    }
                });
            }
        }
        if let Some(src) = source {
            let device = self
                .devices
                .get(&src)
                .ok_or(TransferError::UnknownDevice(src))?;
            if !device.holds(component) {
                return Err(TransferError::ComponentNotPresent {
                    component,
                    device: src,
                });
            }
        }
        if self.active.contains(&component) {
            return Err(TransferError::ComponentBusy(component));
        }
        Ok(())
    }

    fn link(&mut self, prev: TransferId, next: TransferId) {
        self.entry_mut(prev).next = Some(next);
        self.entry_mut(next).prev = Some(prev);
    }

    /// Builds the longest allowed chain rooted at `root`: the root
    /// vacates a slot on its source device, so the oldest queued
    /// transfer waiting to enter that device rides along instead of
    /// waiting for a generic slot grant, and the walk repeats on *its*
    /// source. A visited set stops the walk from draining one device
    /// twice. Claimed members leave their inbound queues here; the
    /// final member is registered as the attachable chain tail.
    fn build_chain(&mut self, root: TransferId) {
        let mut chain: Chain = SmallVec::new();
        chain.push(root);
        let mut tail = root;
        let mut visited: HashSet<DeviceId> = HashSet::new();
        let mut cursor = self.entry(root).source;

        while let Some(dev) = cursor {
            visited.insert(dev);
            let candidate = {
                let device = &self.devices[&dev];
                device
                    .inbound
                    .iter()
                    .copied()
                    .find(|&t| match self.transfers[&t].source {
                        None => true,
                        Some(s) => !visited.contains(&s),
                    })
            };
            let Some(claimed) = candidate else { break };
            self.device_mut(dev).remove_inbound(claimed);
            self.entry_mut(claimed).admission = Admission::Chained;
            chain.push(claimed);
            tail = claimed;
            cursor = self.entry(claimed).source;
        }

        for pair in chain.windows(2) {
            self.link(pair[0], pair[1]);
        }
        if let Some(src) = self.entry(tail).source {
            let component = self.entry(tail).component;
            self.device_mut(src).executing_outbound.insert(component, tail);
        }
        if chain.len() > 1 {
            debug!(
                "chain of {} rooted at {}",
                chain.len(),
                self.entry(root).component
            );
        }
    }

    /// Appends `tid` behind a chain tail already vacating `dst`, if one
    /// is registered. The tail may have progressed past the points
    /// where it would have opened our gates, so catch up from its
    /// phase; every transition past such a point happens in the same
    /// critical section that records the phase, which makes this read
    /// exact. The appended transfer then extends the chain from its
    /// own source.
    fn attach_to_executing(&mut self, tid: TransferId, dst: DeviceId) -> bool {
        let Some((&component, &tail)) = self.device(dst).executing_outbound.first_key_value()
        else {
            return false;
        };
        self.device_mut(dst).executing_outbound.remove(&component);
        self.link(tail, tid);
        self.entry_mut(tid).admission = Admission::Chained;

        let gates = Arc::clone(&self.entry(tid).gates);
        match self.entry(tail).phase {
            Phase::Waiting => {}
            Phase::Preparing => gates.prepare.open(),
            Phase::Performing | Phase::Done => {
                gates.prepare.open();
                gates.perform.open();
            }
        }

        self.build_chain(tid);
        true
    }

    /// Depth-first search over the wait-for relation: from `root`'s
    /// source device, follow queued inbound transfers back through
    /// their own source devices, looking for one whose source is
    /// `target` (the root's destination). A hit closes a loop in which
    /// every member vacates exactly the slot the next member needs, so
    /// the whole cohort runs with zero net free slots.
    fn find_cycle(&self, root: TransferId, target: DeviceId) -> Option<Chain> {
        let mut path: Chain = SmallVec::new();
        path.push(root);
        let mut visited: HashSet<DeviceId> = HashSet::new();
        if self.cycle_dfs(root, target, &mut path, &mut visited) {
            Some(path)
        } else {
            None
        }
    }

    fn cycle_dfs(
        &self,
        from: TransferId,
        target: DeviceId,
        path: &mut Chain,
        visited: &mut HashSet<DeviceId>,
    ) -> bool {
        let Some(src) = self.entry(from).source else {
            return false;
        };
        if src == target {
            return true;
        }
        if !visited.insert(src) {
            return false;
        }
        for &queued in &self.device(src).inbound {
            if self.entry(queued).source.is_none() {
                continue;
            }
            path.push(queued);
            if self.cycle_dfs(queued, target, path, visited) {
                return true;
            }
            path.pop();
        }
        false
    }

    /// Claims the members of a detected cycle and links them into a
    /// ring with `root` as the pre-opened first member.
    fn resolve_cycle(&mut self, root: TransferId, dst: DeviceId) -> bool {
        let Some(cycle) = self.find_cycle(root, dst) else {
            return false;
        };
        for &member in &cycle[1..] {
            let destination = self
                .entry(member)
                .destination
                .expect("queued transfers carry their destination");
            self.device_mut(destination).remove_inbound(member);
            self.entry_mut(member).admission = Admission::Chained;
        }
        for pair in cycle.windows(2) {
            self.link(pair[0], pair[1]);
        }
        let last = cycle[cycle.len() - 1];
        self.link(last, root);
        self.entry_mut(root).admission = Admission::Chained;
        self.entry(root).gates.open_both();
        debug!("cycle of {} closed through {dst}", cycle.len());
        true
    }

    /// Hands a slot freed on `device` to its oldest queued waiter, or
    /// returns it to the free pool when nobody waits. Handing over
    /// directly keeps a freed slot from sitting idle while admissible
    /// requests stay parked.
    fn release_slot(&mut self, device: DeviceId) {
        if let Some(waiter) = self.device_mut(device).inbound.pop_front() {
            let entry = self.entry_mut(waiter);
            entry.admission = Admission::Granted;
            debug!("slot on {device} granted to waiting {}", entry.component);
            entry.gates.open_both();
        } else {
            self.device_mut(device).free_slots += 1;
            trace!("slot on {device} returned to the free pool");
        }
    }
}

enum MoveDecision {
    /// Admitted (slot reserved, attached, or cycle head); run the protocol.
    Run(TransferId),
    /// Parked in the destination queue; wait to be chained or granted.
    Blocked(TransferId, Arc<GatePair>),
}

/// Admission scheduler for component transfers between fixed-capacity
/// storage devices.
///
/// Construction validates the static system shape; afterwards the
/// scheduler is driven exclusively through [`execute`], one blocking
/// call per caller thread. See the crate docs for the chain and cycle
/// semantics.
///
/// [`execute`]: StorageScheduler::execute
#[derive(Debug)]
pub struct StorageScheduler {
    state: Mutex<State>,
}

impl StorageScheduler {
    /// Builds a scheduler from device capacities and initial placement.
    pub fn new(config: DepotConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let mut devices: HashMap<DeviceId, Device> = config
            .capacities
            .iter()
            .map(|(&id, &capacity)| (id, Device::new(capacity)))
            .collect();
        for (&component, &placed_on) in &config.placement {
            let device = devices
                .get_mut(&placed_on)
                .expect("placement validated against the device map");
            device.resident.insert(component);
            device.free_slots -= 1;
        }
        Ok(Self {
            state: Mutex::new(State {
                devices,
                active: HashSet::new(),
                transfers: HashMap::new(),
                next_transfer: 0,
            }),
        })
    }

    /// Admits and runs one transfer to completion on the calling thread.
    ///
    /// Blocks until the transfer has fully committed, or fails with a
    /// [`TransferError`] before either stage callback has run and with
    /// no state change.
    pub fn execute(&self, request: &dyn TransferRequest) -> TransferResult<()> {
        let component = request.component_id();
        let source = request.source_id();
        let destination = request.destination_id();

        {
            let mut state = self.state.lock();
            state.validate(component, source, destination)?;
            state.active.insert(component);
        }

        match (source, destination) {
            (None, Some(dst)) => self.run_add(request, component, dst),
            (Some(src), None) => self.run_delete(request, component, src),
            (Some(src), Some(dst)) => self.run_move(request, component, src, dst),
            (None, None) => unreachable!("rejected by validation"),
        }

        self.state.lock().active.remove(&component);
        Ok(())
    }

    /// Point-in-time view of one device.
    pub fn device_snapshot(&self, device: DeviceId) -> Option<DeviceSnapshot> {
        let state = self.state.lock();
        state
            .devices
            .get(&device)
            .map(|d| DeviceSnapshot::of(device, d))
    }

    /// Point-in-time view of every device, ordered by device id.
    pub fn snapshots(&self) -> Vec<DeviceSnapshot> {
        let state = self.state.lock();
        let mut ids: Vec<DeviceId> = state.devices.keys().copied().collect();
        ids.sort_unstable();
        ids.into_iter()
            .map(|id| DeviceSnapshot::of(id, state.device(id)))
            .collect()
    }

    /// Whether `component` is currently resident on `device`.
    pub fn holds(&self, device: DeviceId, component: ComponentId) -> bool {
        let state = self.state.lock();
        state
            .devices
            .get(&device)
            .is_some_and(|d| d.holds(component))
    }

    fn run_add(&self, request: &dyn TransferRequest, component: ComponentId, dst: DeviceId) {
        let parked = {
            let mut state = self.state.lock();
            if state.device(dst).free_slots > 0 {
                state.device_mut(dst).free_slots -= 1;
                trace!("{component}: add admitted straight onto {dst}");
                None
            } else {
                let tid = state.alloc(PendingTransfer::queued(component, None, Some(dst)));
                state.device_mut(dst).inbound.push_back(tid);
                debug!("{component}: add parked behind full {dst}");
                Some((tid, Arc::clone(&state.entry(tid).gates)))
            }
        };

        match parked {
            None => {
                // Nothing to stagger with: the slot is reserved, so the
                // two stages run back to back on this thread.
                request.prepare();
                request.perform();
                self.state.lock().device_mut(dst).resident.insert(component);
            }
            Some((tid, gates)) => self.run_blocked(request, tid, gates),
        }
    }

    fn run_delete(&self, request: &dyn TransferRequest, component: ComponentId, src: DeviceId) {
        let tid = {
            let mut state = self.state.lock();
            let tid = state.alloc(PendingTransfer::root(component, Some(src), None));
            trace!("{component}: delete rooted on {src}");
            state.build_chain(tid);
            tid
        };
        self.run_protocol(request, tid);
    }

    fn run_move(
        &self,
        request: &dyn TransferRequest,
        component: ComponentId,
        src: DeviceId,
        dst: DeviceId,
    ) {
        let decision = {
            let mut state = self.state.lock();
            if state.device(dst).free_slots > 0 {
                // A move both consumes a destination slot (reserved
                // here) and frees its source slot, so it roots a chain
                // exactly like a delete.
                state.device_mut(dst).free_slots -= 1;
                let tid = state.alloc(PendingTransfer::root(component, Some(src), Some(dst)));
                trace!("{component}: move admitted into {dst}");
                state.build_chain(tid);
                MoveDecision::Run(tid)
            } else {
                let tid = state.alloc(PendingTransfer::queued(component, Some(src), Some(dst)));
                if state.attach_to_executing(tid, dst) {
                    debug!("{component}: attached behind chain vacating {dst}");
                    MoveDecision::Run(tid)
                } else if state.resolve_cycle(tid, dst) {
                    MoveDecision::Run(tid)
                } else {
                    state.device_mut(dst).inbound.push_back(tid);
                    debug!("{component}: move parked behind full {dst}");
                    MoveDecision::Blocked(tid, Arc::clone(&state.entry(tid).gates))
                }
            }
        };

        match decision {
            MoveDecision::Run(tid) => self.run_protocol(request, tid),
            MoveDecision::Blocked(tid, gates) => self.run_blocked(request, tid, gates),
        }
    }

    /// Parks on the prepare gate until a chain, ring, or slot grant
    /// releases this transfer, then continues down the matching path.
    fn run_blocked(&self, request: &dyn TransferRequest, tid: TransferId, gates: Arc<GatePair>) {
        gates.prepare.wait();
        {
            let mut state = self.state.lock();
            match state.entry(tid).admission {
                // Linked into a chain or ring; the protocol takes over.
                Admission::Chained => {}
                // A freed slot was handed over: re-enter as an admitted
                // root and pull a chain along from our own source.
                Admission::Granted => state.build_chain(tid),
                Admission::Queued => {
                    unreachable!("prepare gate opened while still queued")
                }
            }
        }
        self.run_protocol(request, tid);
    }

    /// The two-phase protocol, run by every admitted member on its own
    /// caller thread.
    fn run_protocol(&self, request: &dyn TransferRequest, tid: TransferId) {
        let gates = Arc::clone(&self.state.lock().entry(tid).gates);

        gates.prepare.wait();
        {
            let mut state = self.state.lock();
            state.entry_mut(tid).phase = Phase::Preparing;
            if let Some(next) = state.entry(tid).next {
                // Successor may start copying as soon as we begin
                // vacating; skip it if it already finished and left.
                if let Some(successor) = state.transfers.get(&next) {
                    successor.gates.prepare.open();
                }
            }
            trace!("{}: preparing", state.entry(tid).component);
        }
        request.prepare();
        {
            let mut state = self.state.lock();
            if let Some(next) = state.entry(tid).next {
                if let Some(successor) = state.transfers.get(&next) {
                    successor.gates.perform.open();
                }
            }
            state.entry_mut(tid).phase = Phase::Performing;
            trace!("{}: stage-1 done", state.entry(tid).component);
        }
        gates.perform.wait();
        request.perform();

        let mut state = self.state.lock();
        state.entry_mut(tid).phase = Phase::Done;
        let entry = state
            .transfers
            .remove(&tid)
            .expect("pending transfer entry lives until completion");
        if let Some(src) = entry.source {
            state.device_mut(src).resident.remove(&entry.component);
        }
        if let Some(dst) = entry.destination {
            state.device_mut(dst).resident.insert(entry.component);
        }
        trace!("{}: committed", entry.component);

        // If we are still the registered chain tail, the slot we
        // vacated is genuinely free now; nobody was appended to consume
        // it in-chain.
        if entry.next.is_none() {
            if let Some(src) = entry.source {
                if state.device(src).executing_outbound.get(&entry.component) == Some(&tid) {
                    state.device_mut(src).executing_outbound.remove(&entry.component);
                    state.release_slot(src);
                }
            }
        }
    }
}
