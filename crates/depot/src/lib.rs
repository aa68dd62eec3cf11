//! Slot-capacity transfer scheduler for component storage systems.
//!
//! A system is a fixed set of devices, each holding whole-slot
//! components up to an immutable capacity. Callers submit add, delete,
//! and move requests, and the scheduler decides for each whether it
//! runs immediately, waits for room, or unlocks a whole waiting
//! cohort:
//!
//! * A delete (or an admitted move) roots a *chain*: the slot it frees
//!   is handed in-line to the oldest transfer queued for its source
//!   device, and so on, so a single vacancy drains a whole line of
//!   waiters in one pass.
//! * Moves that find their destination full can attach behind a chain
//!   already vacating it, or close a *cycle*: a ring of transfers in
//!   which every member vacates exactly the slot the next one needs,
//!   resolvable with zero net free slots.
//! * Each transfer runs two caller-supplied stages (data copy, then
//!   commit), pipelined across a chain by per-transfer one-shot gates
//!   so that stage-1 of a successor overlaps stage-2 of its
//!   predecessor.
//!
//! Callers block inside [`StorageScheduler::execute`] until their
//! transfer commits; the calling thread is the executor, there is no
//! worker pool. Capacity is never oversubscribed and a component is
//! never manipulated by two requests at once.

mod config;
mod device;
mod error;
mod gate;
mod ids;
mod pending;
mod request;
mod scheduler;

pub use config::DepotConfig;
pub use device::DeviceSnapshot;
pub use error::{ConfigError, TransferError, TransferResult};
pub use ids::{ComponentId, DeviceId};
pub use request::TransferRequest;
pub use scheduler::StorageScheduler;
