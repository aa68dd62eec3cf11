//! Per-device bookkeeping records.
//!
//! A `Device` has no locking of its own; every field is read and
//! mutated only while the scheduler's global state mutex is held.

use std::collections::{BTreeMap, HashSet, VecDeque};

use crate::ids::{ComponentId, DeviceId};
use crate::pending::TransferId;

/// One storage device of fixed slot capacity.
///
/// Slot accounting: `free_slots` counts slots not reserved by any
/// admitted transfer; `resident` holds committed components. A slot
/// freed by a finishing chain tail is handed to the oldest inbound
/// waiter before it may return to `free_slots`, so `free_slots > 0`
/// implies `inbound` is empty.
#[derive(Debug)]
pub(crate) struct Device {
    pub(crate) capacity: usize,
    pub(crate) free_slots: usize,
    pub(crate) resident: HashSet<ComponentId>,
    /// Blocked transfers whose destination is this device, oldest first.
    pub(crate) inbound: VecDeque<TransferId>,
    /// Chain tails currently vacating this device, keyed by component
    /// id so attachment pairs deterministically.
    pub(crate) executing_outbound: BTreeMap<ComponentId, TransferId>,
}

impl Device {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            capacity,
            free_slots: capacity,
            resident: HashSet::new(),
            inbound: VecDeque::new(),
            executing_outbound: BTreeMap::new(),
        }
    }

    pub(crate) fn holds(&self, component: ComponentId) -> bool {
        self.resident.contains(&component)
    }

    /// Removes a queued transfer, e.g. when a chain or cycle claims it.
    pub(crate) fn remove_inbound(&mut self, transfer: TransferId) {
        self.inbound.retain(|&t| t != transfer);
    }
}

/// Point-in-time view of a device, taken under the state lock.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeviceSnapshot {
    pub device: DeviceId,
    pub capacity: usize,
    pub free_slots: usize,
    pub resident: Vec<ComponentId>,
}

impl DeviceSnapshot {
    pub(crate) fn of(id: DeviceId, device: &Device) -> Self {
        let mut resident: Vec<ComponentId> = device.resident.iter().copied().collect();
        resident.sort_unstable();
        Self {
            device: id,
            capacity: device.capacity,
            free_slots: device.free_slots,
            resident,
        }
    }
}
