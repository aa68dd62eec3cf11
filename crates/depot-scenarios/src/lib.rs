//! Scripted concurrent workloads for the depot scheduler.
//!
//! A scenario is a list of [`Op`]s issued from one thread each, with a
//! configurable stagger between launches to bias the interleaving. The
//! runner collects a totally ordered stage-event log plus any admission
//! failures; the checks verify accounting, residency uniqueness, and
//! stage ordering over the result.

mod checks;
mod runner;
mod script;

pub use checks::{verify_accounting, verify_stage_order, verify_unique_residency};
pub use runner::{ScenarioReport, ScenarioRunner, StageEvent, StageKind};
pub use script::Op;
