//! Arena records for transfers admitted but not yet committed.

use std::sync::Arc;

use crate::gate::GatePair;
use crate::ids::{ComponentId, DeviceId};

/// Arena key of a pending transfer. Keys are allocated monotonically
/// and never reused, so a stale key simply misses the arena.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub(crate) struct TransferId(pub(crate) u64);

/// Execution stage of a pending transfer.
///
/// Transitions run strictly Waiting → Preparing → Performing → Done,
/// each inside a state-lock critical section that also opens the
/// successor gate belonging to that stage. A late attacher can thus
/// read the phase and know exactly which of its own gates the
/// predecessor will still open.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) enum Phase {
    Waiting,
    Preparing,
    Performing,
    Done,
}

/// How a blocked transfer left the inbound queue.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Admission {
    /// Still parked in a destination's inbound queue.
    Queued,
    /// Linked into a chain or ring; the gate protocol drives it.
    Chained,
    /// Handed a freed slot outright; re-enters as a chain root.
    Granted,
}

/// One admitted transfer, linked into at most one chain.
#[derive(Debug)]
pub(crate) struct PendingTransfer {
    pub(crate) component: ComponentId,
    /// Device being vacated; `None` for an add.
    pub(crate) source: Option<DeviceId>,
    /// Device being entered; `None` for a delete.
    pub(crate) destination: Option<DeviceId>,
    /// Chain member that frees the slot this transfer needs.
    pub(crate) prev: Option<TransferId>,
    /// Chain member that will occupy the slot this transfer frees.
    pub(crate) next: Option<TransferId>,
    pub(crate) phase: Phase,
    pub(crate) admission: Admission,
    /// Shared with the caller thread, which parks on these outside the
    /// state lock while predecessors open them under it.
    pub(crate) gates: Arc<GatePair>,
}

impl PendingTransfer {
    /// A transfer admitted as a chain root: both gates pre-opened.
    pub(crate) fn root(
        component: ComponentId,
        source: Option<DeviceId>,
        destination: Option<DeviceId>,
    ) -> Self {
        Self::new(component, source, destination, GatePair::opened(), Admission::Chained)
    }

    /// A transfer parked in a destination queue: gates closed until a
    /// chain, ring, or slot grant releases it.
    pub(crate) fn queued(
        component: ComponentId,
        source: Option<DeviceId>,
        destination: Option<DeviceId>,
    ) -> Self {
        Self::new(component, source, destination, GatePair::closed(), Admission::Queued)
    }

    fn new(
        component: ComponentId,
        source: Option<DeviceId>,
        destination: Option<DeviceId>,
        gates: GatePair,
        admission: Admission,
    ) -> Self {
        Self {
            component,
            source,
            destination,
            prev: None,
            next: None,
            phase: Phase::Waiting,
            admission,
            gates: Arc::new(gates),
        }
    }
}
