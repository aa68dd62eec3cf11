//! Post-run verification helpers.

use std::collections::HashMap;

use anyhow::{ensure, Result};
use depot::{ComponentId, DeviceId, StorageScheduler};

use crate::runner::{StageEvent, StageKind};

/// Every device satisfies `free_slots + resident == capacity` at
/// quiescence.
pub fn verify_accounting(scheduler: &StorageScheduler) -> Result<()> {
    for snap in scheduler.snapshots() {
        ensure!(
            snap.free_slots + snap.resident.len() == snap.capacity,
            "{} accounting off: {snap:?}",
            snap.device
        );
    }
    Ok(())
}

/// No component is resident on two devices at once.
pub fn verify_unique_residency(scheduler: &StorageScheduler) -> Result<()> {
    let mut seen: HashMap<ComponentId, DeviceId> = HashMap::new();
    for snap in scheduler.snapshots() {
        for &component in &snap.resident {
            if let Some(other) = seen.insert(component, snap.device) {
                anyhow::bail!("{component} resident on both {other} and {}", snap.device);
            }
        }
    }
    Ok(())
}

/// Each component fired at most one copy and one commit, in that order.
pub fn verify_stage_order(events: &[StageEvent]) -> Result<()> {
    let mut copies: HashMap<ComponentId, usize> = HashMap::new();
    let mut commits: HashMap<ComponentId, usize> = HashMap::new();
    for (idx, event) in events.iter().enumerate() {
        let bucket = match event.kind {
            StageKind::Copy => &mut copies,
            StageKind::Commit => &mut commits,
        };
        ensure!(
            bucket.insert(event.component, idx).is_none(),
            "{} fired {:?} twice",
            event.component,
            event.kind
        );
    }
    for (&component, &commit_idx) in &commits {
        let copy_idx = copies
            .get(&component)
            .copied()
            .ok_or_else(|| anyhow::anyhow!("{component} committed without a copy"))?;
        ensure!(
            copy_idx < commit_idx,
            "{component} committed before its copy"
        );
    }
    Ok(())
}
