use chrono::{DateTime, Utc};
use costwise_common::{ApiKey, CostAlternative, Server, ServerType};
use costwise_finops::{find_alternatives, summarize, FleetSummary};
use costwise_providers::{CloudProvider, ProviderError};
use serde::Serialize;
use std::collections::HashMap;
use tracing::info;

/// Servers, catalog and alternatives from one refresh. Replaced as a whole, never patched.
#[derive(Debug, Clone, Serialize)]
pub struct FleetSnapshot {
    pub servers: Vec<Server>,
    pub server_types: Vec<ServerType>,
    /// Only servers with at least one alternative have an entry.
    pub alternatives: HashMap<u64, Vec<CostAlternative>>,
    pub summary: FleetSummary,
    pub fetched_at: DateTime<Utc>,
}

impl FleetSnapshot {
    pub fn from_parts(servers: Vec<Server>, server_types: Vec<ServerType>) -> Self {
        let alternatives: HashMap<u64, Vec<CostAlternative>> = servers
            .iter()
            .map(|s| (s.id, find_alternatives(s, &server_types)))
            .filter(|(_, alts)| !alts.is_empty())
            .collect();
        let summary = summarize(&alternatives);
        Self {
            servers,
            server_types,
            alternatives,
            summary,
            fetched_at: Utc::now(),
        }
    }

    pub fn server(&self, server_id: u64) -> Option<&Server> {
        self.servers.iter().find(|s| s.id == server_id)
    }

    /// Resolve ids in the given order. Unknown ids come back in the second list.
    pub fn select(&self, server_ids: &[u64]) -> (Vec<Server>, Vec<u64>) {
        let mut found = Vec::with_capacity(server_ids.len());
        let mut missing = Vec::new();
        for id in server_ids {
            match self.server(*id) {
                Some(s) => found.push(s.clone()),
                None => missing.push(*id),
            }
        }
        (found, missing)
    }
}

/// Fetch servers and catalog concurrently and derive alternatives.
pub async fn refresh(
    provider: &dyn CloudProvider,
    key: &ApiKey,
) -> Result<FleetSnapshot, ProviderError> {
    let (servers, server_types) =
        tokio::try_join!(provider.list_servers(key), provider.list_server_types(key))?;
    let snapshot = FleetSnapshot::from_parts(servers, server_types);
    info!(
        "fleet refreshed from {}: {} server(s), {} type(s), {} with alternatives",
        provider.name(),
        snapshot.servers.len(),
        snapshot.server_types.len(),
        snapshot.summary.servers_with_alternatives
    );
    Ok(snapshot)
}
