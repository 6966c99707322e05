use bigdecimal::{BigDecimal, Zero};
use costwise_common::{Architecture, CostAlternative, Server, ServerType};
use serde::Serialize;
use std::collections::{BTreeSet, HashMap, HashSet};
use tracing::{debug, info};

#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum PlanError {
    #[error("no servers selected")]
    EmptySelection,
    /// One confirmation cannot carry per-server compatibility warnings for both families.
    #[error("selection mixes architectures ({0:?}); bulk migration requires a single architecture")]
    MixedArchitectures(Vec<Architecture>),
    #[error("none of the selected servers has a cheaper alternative")]
    NoAlternatives,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PlannedMigration {
    pub server_id: u64,
    pub server_name: String,
    pub current_type: String,
    pub target_type: ServerType,
    pub monthly_savings: BigDecimal,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct MigrationPlan {
    /// Architecture shared by the current types of every planned server.
    pub architecture: Architecture,
    /// Execution order.
    pub migrations: Vec<PlannedMigration>,
    pub total_monthly_savings: BigDecimal,
    pub total_yearly_savings: BigDecimal,
    /// A target is ARM: the confirmation has to carry the ARM compatibility warning.
    pub targets_arm: bool,
}

/// True when the selection spans more than one architecture family.
pub fn has_mixed_architectures(selected: &[Server]) -> bool {
    selected
        .iter()
        .map(Server::architecture)
        .collect::<HashSet<_>>()
        .len()
        > 1
}

/// Ids of servers that have at least one alternative ("select all").
pub fn selectable_servers(
    servers: &[Server],
    alternatives_by_server: &HashMap<u64, Vec<CostAlternative>>,
) -> Vec<u64> {
    servers
        .iter()
        .filter(|s| {
            alternatives_by_server
                .get(&s.id)
                .map(|alts| !alts.is_empty())
                .unwrap_or(false)
        })
        .map(|s| s.id)
        .collect()
}

/// Plan moving every selected server to its best alternative.
///
/// Servers without an alternative are left out. Order follows the selection; a server listed
/// twice is planned once.
pub fn build_plan(
    selected: &[Server],
    alternatives_by_server: &HashMap<u64, Vec<CostAlternative>>,
) -> Result<MigrationPlan, PlanError> {
    if selected.is_empty() {
        return Err(PlanError::EmptySelection);
    }

    let architectures: BTreeSet<Architecture> =
        selected.iter().map(Server::architecture).collect();
    if architectures.len() > 1 {
        return Err(PlanError::MixedArchitectures(
            architectures.into_iter().collect(),
        ));
    }
    let architecture = selected[0].architecture();

    let mut seen = HashSet::new();
    let mut migrations = Vec::new();
    for server in selected {
        if !seen.insert(server.id) {
            continue;
        }
        let Some(best) = alternatives_by_server
            .get(&server.id)
            .and_then(|alts| alts.first())
        else {
            debug!("server {} has no alternative, left out of the plan", server.id);
            continue;
        };
        migrations.push(PlannedMigration {
            server_id: server.id,
            server_name: server.name.clone(),
            current_type: server.server_type.name.clone(),
            target_type: best.server_type.clone(),
            monthly_savings: best.monthly_savings.clone(),
        });
    }

    if migrations.is_empty() {
        return Err(PlanError::NoAlternatives);
    }

    let mut total_monthly_savings = BigDecimal::zero();
    for m in &migrations {
        total_monthly_savings += &m.monthly_savings;
    }
    let total_yearly_savings = &total_monthly_savings * &BigDecimal::from(12u32);
    let targets_arm = migrations
        .iter()
        .any(|m| m.target_type.architecture().is_arm());

    info!(
        "bulk plan built: {} of {} selected server(s), architecture={}, monthly_savings={}",
        migrations.len(),
        selected.len(),
        architecture.as_str(),
        total_monthly_savings
    );

    Ok(MigrationPlan {
        architecture,
        migrations,
        total_monthly_savings,
        total_yearly_savings,
        targets_arm,
    })
}
