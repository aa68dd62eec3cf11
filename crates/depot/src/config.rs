//! System construction and the static checks performed once at startup.

use std::collections::HashMap;

use crate::error::ConfigError;
use crate::ids::{ComponentId, DeviceId};

/// Initial shape of a storage system: device capacities plus the
/// components already resident when the scheduler comes up.
#[derive(Clone, Debug, Default)]
pub struct DepotConfig {
    pub capacities: HashMap<DeviceId, usize>,
    pub placement: HashMap<ComponentId, DeviceId>,
}

impl DepotConfig {
    pub fn new(
        capacities: HashMap<DeviceId, usize>,
        placement: HashMap<ComponentId, DeviceId>,
    ) -> Self {
        Self {
            capacities,
            placement,
        }
    }

    /// Rejects configurations the scheduler must never start from:
    /// an empty device set, zero capacities, placements onto unknown
    /// devices, and over-assigned devices.
    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        if self.capacities.is_empty() {
            return Err(ConfigError::NoDevices);
        }
        for (&device, &capacity) in &self.capacities {
            if capacity == 0 {
                return Err(ConfigError::InvalidCapacity { device });
            }
        }

        let mut assigned: HashMap<DeviceId, usize> = HashMap::new();
        for (&component, &device) in &self.placement {
            if !self.capacities.contains_key(&device) {
                return Err(ConfigError::UnknownPlacementDevice { component, device });
            }
            *assigned.entry(device).or_default() += 1;
        }
        for (&device, &count) in &assigned {
            let capacity = self.capacities[&device];
            if count > capacity {
                return Err(ConfigError::DeviceOverAssigned {
                    device,
                    capacity,
                    assigned: count,
                });
            }
        }
        Ok(())
    }
}
