use crate::migration::{MigrationReport, MigrationRequest, Migrator};
use crate::notifications::EventSink;
use costwise_common::ApiKey;
use costwise_finops::MigrationPlan;
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum BulkResult {
    Succeeded { report: MigrationReport },
    Failed { error: String },
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct BulkOutcome {
    pub server_id: u64,
    pub server_name: String,
    pub target_type: String,
    pub result: BulkResult,
}

/// Per-server results of a bulk run, in plan order.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct BulkReport {
    pub run_id: Uuid,
    pub outcomes: Vec<BulkOutcome>,
}

impl BulkReport {
    pub fn succeeded(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.result, BulkResult::Succeeded { .. }))
            .count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.succeeded()
    }
}

/// Run every planned migration, one after the other.
///
/// A failing server is recorded and skipped; the batch always runs to the end. Nothing is rolled
/// back. Callers should refresh server state afterwards.
pub async fn execute_plan(
    migrator: &Migrator,
    key: &ApiKey,
    plan: &MigrationPlan,
    power_on_after: bool,
    sink: &dyn EventSink,
) -> BulkReport {
    let run_id = Uuid::new_v4();
    info!(
        "🚀 [bulk] run {} started: {} migration(s), power_on_after={}",
        run_id,
        plan.migrations.len(),
        power_on_after
    );

    let mut outcomes = Vec::with_capacity(plan.migrations.len());
    for (index, planned) in plan.migrations.iter().enumerate() {
        let request = MigrationRequest {
            server_id: planned.server_id,
            target_type: planned.target_type.name.clone(),
            upgrade_disk: false,
            power_on_after,
        };
        info!(
            "[bulk] {}/{}: {} ({} -> {})",
            index + 1,
            plan.migrations.len(),
            planned.server_name,
            planned.current_type,
            planned.target_type.name
        );
        let result = match migrator.migrate(key, &request, sink).await {
            Ok(report) => BulkResult::Succeeded { report },
            Err(e) => {
                warn!(
                    "⚠️ [bulk] failed to migrate server {} ({}): {}",
                    planned.server_name, planned.server_id, e
                );
                BulkResult::Failed {
                    error: e.to_string(),
                }
            }
        };
        outcomes.push(BulkOutcome {
            server_id: planned.server_id,
            server_name: planned.server_name.clone(),
            target_type: planned.target_type.name.clone(),
            result,
        });
    }

    let report = BulkReport { run_id, outcomes };
    info!(
        "✅ [bulk] run {} finished: {} succeeded, {} failed",
        run_id,
        report.succeeded(),
        report.failed()
    );
    report
}
