//! Cost side of the optimizer: which server types are cheaper, and what a bulk move would save.

pub mod alternatives;
pub mod planner;

pub use alternatives::{find_alternatives, summarize, FleetSummary};
pub use planner::{
    build_plan, has_mixed_architectures, selectable_servers, MigrationPlan, PlanError,
    PlannedMigration,
};
