//! Identifiers for devices and the components they hold.
//!
//! Both ids are opaque integer newtypes. The scheduler never interprets
//! them beyond equality and ordering; ordering matters only for the
//! deterministic pairing of executing chain tails (see
//! `Device::executing_outbound`).

use std::fmt;

/// Identifier of a storage device registered at construction time.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DeviceId(pub u32);

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "dev-{}", self.0)
    }
}

/// Identifier of a logical component occupying one device slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ComponentId(pub u32);

impl fmt::Display for ComponentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "comp-{}", self.0)
    }
}
