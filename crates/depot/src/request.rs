//! The caller-facing transfer interface.

use crate::ids::{ComponentId, DeviceId};

/// One transfer request, supplied per [`execute`] call.
///
/// The request classifies itself by which endpoint it omits: no source
/// is an *add*, no destination a *delete*, both present a *move*.
/// Omitting both is rejected.
///
/// The scheduler invokes `prepare` (stage-1, the data copy/export) at
/// most once and then `perform` (stage-2, the durable commit) at most
/// once, always in that order and never under any scheduler lock. For
/// chained transfers, `prepare` runs only after the predecessor
/// vacating the needed slot has entered its own `prepare`, and
/// `perform` only after that predecessor's `prepare` has returned.
///
/// [`execute`]: crate::StorageScheduler::execute
pub trait TransferRequest: Send + Sync {
    fn component_id(&self) -> ComponentId;
    fn source_id(&self) -> Option<DeviceId>;
    fn destination_id(&self) -> Option<DeviceId>;

    /// Stage-1: export the component's data out of the source.
    fn prepare(&self);

    /// Stage-2: make the move visible and durable.
    fn perform(&self);
}
