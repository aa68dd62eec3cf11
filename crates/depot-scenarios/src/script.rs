//! Workload building blocks.

use depot::{ComponentId, DeviceId};

/// One transfer in a scripted workload.
#[derive(Clone, Copy, Debug)]
pub struct Op {
    pub component: ComponentId,
    pub source: Option<DeviceId>,
    pub destination: Option<DeviceId>,
}

impl Op {
    pub fn add(component: u32, destination: u32) -> Self {
        Self {
            component: ComponentId(component),
            source: None,
            destination: Some(DeviceId(destination)),
        }
    }

    pub fn delete(component: u32, source: u32) -> Self {
        Self {
            component: ComponentId(component),
            source: Some(DeviceId(source)),
            destination: None,
        }
    }

    pub fn mv(component: u32, source: u32, destination: u32) -> Self {
        Self {
            component: ComponentId(component),
            source: Some(DeviceId(source)),
            destination: Some(DeviceId(destination)),
        }
    }
}
