use crate::{CloudProvider, ProviderError, ProviderResult};
use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use costwise_common::{
    ActionHandle, ActionStatus, ApiKey, Datacenter, Image, Location, Price, PriceQuote, Server,
    ServerStatus, ServerType,
};
use std::collections::{BTreeMap, HashMap};
use tokio::sync::Mutex;
use tracing::{debug, info};

/// Operations that can be forced to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MockOperation {
    ListServers,
    ListServerTypes,
    GetServer,
    PowerOff,
    PowerOn,
    ChangeType,
    Rebuild,
}

/// Every call the mock received, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderCall {
    ListServers,
    ListServerTypes,
    GetServer(u64),
    PowerOff(u64),
    PowerOn(u64),
    ChangeType {
        server_id: u64,
        server_type: String,
        upgrade_disk: bool,
    },
    Rebuild {
        server_id: u64,
        image: String,
    },
}

/// How a server reacts to a power-off action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerOffBehavior {
    /// Reports `stopping` for this many `get_server` calls, then `off`.
    AfterPolls(u32),
    /// Stays `stopping` forever.
    Never,
}

struct MockServer {
    server: Server,
    power_off: PowerOffBehavior,
    /// Polls left before a stopping server reports `off`.
    stopping_polls_left: Option<u32>,
}

#[derive(Default)]
struct MockState {
    servers: BTreeMap<u64, MockServer>,
    catalog: Vec<ServerType>,
    calls: Vec<ProviderCall>,
    failures: HashMap<(MockOperation, Option<u64>), (u16, String)>,
    next_action_id: u64,
}

impl MockState {
    fn injected_failure(&self, op: MockOperation, server_id: Option<u64>) -> ProviderResult<()> {
        let hit = self
            .failures
            .get(&(op, server_id))
            .or_else(|| self.failures.get(&(op, None)));
        match hit {
            Some((status, message)) => Err(api_error(*status, message)),
            None => Ok(()),
        }
    }

    fn server_mut(&mut self, server_id: u64) -> ProviderResult<&mut MockServer> {
        self.servers
            .get_mut(&server_id)
            .ok_or_else(|| api_error(404, "server not found"))
    }

    fn action(&mut self, command: &str) -> ActionHandle {
        self.next_action_id += 1;
        let now = Utc::now();
        ActionHandle {
            id: self.next_action_id,
            command: command.to_string(),
            status: ActionStatus::Success,
            progress: 100,
            started: now,
            finished: Some(now),
            error: None,
        }
    }
}

fn api_error(status: u16, message: &str) -> ProviderError {
    ProviderError::Api {
        status,
        code: None,
        message: message.to_string(),
    }
}

/// In-memory provider simulating a fleet: power transitions, type-change preconditions and
/// injected failures. Used for local runs (`COSTWISE_PROVIDER=mock`) and tests.
pub struct MockProvider {
    state: Mutex<MockState>,
    expected_key: Option<String>,
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl MockProvider {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MockState::default()),
            expected_key: None,
        }
    }

    /// Only accept this key; any other gets a 401.
    pub fn with_api_key(mut self, key: &str) -> Self {
        let key = key.trim();
        self.expected_key = (!key.is_empty()).then(|| key.to_string());
        self
    }

    pub fn with_server_type(mut self, server_type: ServerType) -> Self {
        self.state.get_mut().catalog.push(server_type);
        self
    }

    pub fn with_server(self, server: Server) -> Self {
        self.with_server_behavior(server, PowerOffBehavior::AfterPolls(1))
    }

    pub fn with_server_behavior(mut self, server: Server, power_off: PowerOffBehavior) -> Self {
        self.state.get_mut().servers.insert(
            server.id,
            MockServer {
                server,
                power_off,
                stopping_polls_left: None,
            },
        );
        self
    }

    /// Small mixed fleet for local runs without a provider account.
    pub fn demo() -> Self {
        let cx22 = server_type(1, "cx22", 2, 4.0, 40, "4.5100");
        let cx32 = server_type(2, "cx32", 4, 8.0, 80, "7.7200");
        let cpx21 = server_type(3, "cpx21", 3, 4.0, 80, "8.9100");
        let cpx31 = server_type(4, "cpx31", 4, 8.0, 160, "16.4100");
        let ccx13 = server_type(5, "ccx13", 2, 8.0, 80, "15.4700");
        let cax11 = server_type(6, "cax11", 2, 4.0, 40, "4.5100");
        let cax21 = server_type(7, "cax21", 4, 8.0, 80, "7.7200");
        let cax31 = server_type(8, "cax31", 8, 16.0, 160, "15.5900");

        let mut provider = Self::new();
        for t in [&cx22, &cx32, &cpx21, &cpx31, &ccx13, &cax11, &cax21, &cax31] {
            provider = provider.with_server_type(t.clone());
        }
        provider
            .with_server(server(101, "web-1", ServerStatus::Running, cpx21))
            .with_server(server(102, "db-1", ServerStatus::Running, ccx13))
            .with_server(server(103, "batch-arm", ServerStatus::Off, cax31))
    }

    pub async fn calls(&self) -> Vec<ProviderCall> {
        self.state.lock().await.calls.clone()
    }

    /// Make `op` fail with `status`/`message`; `server_id = None` applies to every server.
    pub async fn fail(&self, op: MockOperation, server_id: Option<u64>, status: u16, message: &str) {
        self.state
            .lock()
            .await
            .failures
            .insert((op, server_id), (status, message.to_string()));
    }

    pub async fn clear_failures(&self) {
        self.state.lock().await.failures.clear();
    }

    pub async fn set_power_off_behavior(&self, server_id: u64, behavior: PowerOffBehavior) {
        if let Some(s) = self.state.lock().await.servers.get_mut(&server_id) {
            s.power_off = behavior;
        }
    }

    fn authorize(&self, key: &ApiKey) -> ProviderResult<()> {
        match &self.expected_key {
            Some(expected) if expected != key.expose() => {
                Err(api_error(401, "unable to authenticate"))
            }
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl CloudProvider for MockProvider {
    async fn list_servers(&self, key: &ApiKey) -> ProviderResult<Vec<Server>> {
        let mut state = self.state.lock().await;
        state.calls.push(ProviderCall::ListServers);
        self.authorize(key)?;
        state.injected_failure(MockOperation::ListServers, None)?;
        Ok(state.servers.values().map(|s| s.server.clone()).collect())
    }

    async fn list_server_types(&self, key: &ApiKey) -> ProviderResult<Vec<ServerType>> {
        let mut state = self.state.lock().await;
        state.calls.push(ProviderCall::ListServerTypes);
        self.authorize(key)?;
        state.injected_failure(MockOperation::ListServerTypes, None)?;
        Ok(state.catalog.clone())
    }

    async fn get_server(&self, key: &ApiKey, server_id: u64) -> ProviderResult<Server> {
        let mut state = self.state.lock().await;
        state.calls.push(ProviderCall::GetServer(server_id));
        self.authorize(key)?;
        state.injected_failure(MockOperation::GetServer, Some(server_id))?;
        let entry = state.server_mut(server_id)?;
        if let Some(left) = entry.stopping_polls_left {
            if left == 0 {
                entry.server.status = ServerStatus::Off;
                entry.stopping_polls_left = None;
            } else {
                entry.stopping_polls_left = Some(left - 1);
            }
        }
        debug!(
            "[Mock Provider] server {} status: {}",
            server_id,
            entry.server.status.as_str()
        );
        Ok(entry.server.clone())
    }

    async fn power_off(&self, key: &ApiKey, server_id: u64) -> ProviderResult<ActionHandle> {
        let mut state = self.state.lock().await;
        state.calls.push(ProviderCall::PowerOff(server_id));
        self.authorize(key)?;
        state.injected_failure(MockOperation::PowerOff, Some(server_id))?;
        let entry = state.server_mut(server_id)?;
        if !entry.server.is_off() {
            match entry.power_off {
                PowerOffBehavior::AfterPolls(0) => entry.server.status = ServerStatus::Off,
                PowerOffBehavior::AfterPolls(n) => {
                    entry.server.status = ServerStatus::Stopping;
                    // The poll that observes `off` is the n-th one.
                    entry.stopping_polls_left = Some(n - 1);
                }
                PowerOffBehavior::Never => {
                    entry.server.status = ServerStatus::Stopping;
                    entry.stopping_polls_left = None;
                }
            }
        }
        info!("[Mock Provider] poweroff accepted: server_id={}", server_id);
        Ok(state.action("stop_server"))
    }

    async fn power_on(&self, key: &ApiKey, server_id: u64) -> ProviderResult<ActionHandle> {
        let mut state = self.state.lock().await;
        state.calls.push(ProviderCall::PowerOn(server_id));
        self.authorize(key)?;
        state.injected_failure(MockOperation::PowerOn, Some(server_id))?;
        let entry = state.server_mut(server_id)?;
        entry.server.status = ServerStatus::Running;
        entry.stopping_polls_left = None;
        info!("[Mock Provider] poweron accepted: server_id={}", server_id);
        Ok(state.action("start_server"))
    }

    async fn change_type(
        &self,
        key: &ApiKey,
        server_id: u64,
        server_type: &str,
        upgrade_disk: bool,
    ) -> ProviderResult<ActionHandle> {
        let mut state = self.state.lock().await;
        state.calls.push(ProviderCall::ChangeType {
            server_id,
            server_type: server_type.to_string(),
            upgrade_disk,
        });
        self.authorize(key)?;
        state.injected_failure(MockOperation::ChangeType, Some(server_id))?;
        let target = state
            .catalog
            .iter()
            .find(|t| t.name.eq_ignore_ascii_case(server_type))
            .cloned()
            .ok_or_else(|| api_error(404, "server type not found"))?;
        let entry = state.server_mut(server_id)?;
        if !entry.server.is_off() {
            return Err(api_error(409, "server must be powered off to change its type"));
        }
        if target.disk < entry.server.server_type.disk {
            return Err(api_error(
                422,
                "cannot change to a server type with a smaller disk",
            ));
        }
        info!(
            "[Mock Provider] change_type accepted: server_id={} {} -> {} upgrade_disk={}",
            server_id, entry.server.server_type.name, target.name, upgrade_disk
        );
        entry.server.server_type = target;
        Ok(state.action("change_server_type"))
    }

    async fn rebuild(
        &self,
        key: &ApiKey,
        server_id: u64,
        image: &str,
    ) -> ProviderResult<ActionHandle> {
        let mut state = self.state.lock().await;
        state.calls.push(ProviderCall::Rebuild {
            server_id,
            image: image.to_string(),
        });
        self.authorize(key)?;
        state.injected_failure(MockOperation::Rebuild, Some(server_id))?;
        let entry = state.server_mut(server_id)?;
        entry.server.image = Some(Image {
            id: 0,
            name: Some(image.to_string()),
            description: image.to_string(),
        });
        Ok(state.action("rebuild_server"))
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}

/// Catalog entry with a single `fsn1` quote.
pub fn server_type(
    id: u64,
    name: &str,
    cores: u32,
    memory: f64,
    disk: u64,
    monthly_gross: &str,
) -> ServerType {
    ServerType {
        id,
        name: name.to_string(),
        description: name.to_uppercase(),
        cores,
        memory,
        disk,
        prices: vec![PriceQuote {
            location: "fsn1".to_string(),
            price_hourly: Price {
                net: String::new(),
                gross: String::new(),
            },
            price_monthly: Price {
                net: monthly_gross.to_string(),
                gross: monthly_gross.to_string(),
            },
        }],
    }
}

pub fn server(id: u64, name: &str, status: ServerStatus, server_type: ServerType) -> Server {
    Server {
        id,
        name: name.to_string(),
        status,
        server_type,
        datacenter: Datacenter {
            id: 4,
            name: "fsn1-dc14".to_string(),
            location: Location {
                id: 1,
                name: "fsn1".to_string(),
                city: "Falkenstein".to_string(),
                country: "DE".to_string(),
            },
        },
        image: Some(Image {
            id: 114690387,
            name: Some("ubuntu-24.04".to_string()),
            description: "Ubuntu 24.04".to_string(),
        }),
        created: Utc.with_ymd_and_hms(2024, 1, 15, 9, 30, 0).single().unwrap_or_else(Utc::now),
    }
}
