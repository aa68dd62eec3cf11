//! Error surface of the scheduler.
//!
//! All admission errors are detected under the state lock before any
//! stage callback runs, so a rejected request leaves no trace. The
//! construction errors mirror the factory contract: a scheduler is
//! either built from a fully consistent configuration or not at all.

use thiserror::Error;

use crate::ids::{ComponentId, DeviceId};

/// Convenience result alias for admission outcomes.
pub type TransferResult<T, E = TransferError> = Result<T, E>;

/// Rejection reasons surfaced by [`StorageScheduler::execute`].
///
/// [`StorageScheduler::execute`]: crate::StorageScheduler::execute
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum TransferError {
    /// The request names neither a source nor a destination device.
    #[error("transfer of {0} names neither a source nor a destination")]
    IllegalRequestShape(ComponentId),

    /// A referenced device id is not part of the registry.
    #[error("{0} is not a registered device")]
    UnknownDevice(DeviceId),

    /// An add targets a device that already holds the component.
    #[error("{component} already resides on {device}")]
    ComponentAlreadyPresent {
        component: ComponentId,
        device: DeviceId,
    },

    /// The destination already holds the component, so moving is a no-op.
    #[error("{component} already resides on destination {device}")]
    TransferNotNeeded {
        component: ComponentId,
        device: DeviceId,
    },

    /// A delete or move names a source that does not hold the component.
    #[error("{component} does not reside on {device}")]
    ComponentNotPresent {
        component: ComponentId,
        device: DeviceId,
    },

    /// Another transfer for the same component is still in flight.
    #[error("{0} is already being transferred")]
    ComponentBusy(ComponentId),
}

/// Rejection reasons surfaced when building a scheduler from a
/// [`DepotConfig`](crate::DepotConfig).
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// The device map is empty.
    #[error("cannot build a storage system without devices")]
    NoDevices,

    /// A device was declared with zero slots.
    #[error("{device} declared with capacity 0")]
    InvalidCapacity { device: DeviceId },

    /// The initial placement references a device absent from the map.
    #[error("{component} placed on unregistered {device}")]
    UnknownPlacementDevice {
        component: ComponentId,
        device: DeviceId,
    },

    /// More components were placed on a device than it has slots.
    #[error("{device} assigned {assigned} components but holds {capacity} slots")]
    DeviceOverAssigned {
        device: DeviceId,
        capacity: usize,
        assigned: usize,
    },
}
