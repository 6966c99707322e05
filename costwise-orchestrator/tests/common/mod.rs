// Shared fixtures for orchestrator integration tests
#![allow(dead_code)]

use async_trait::async_trait;
use costwise_common::{ApiKey, ServerStatus};
use costwise_orchestrator::api::{self, AppState};
use costwise_orchestrator::clock::Clock;
use costwise_orchestrator::migration::{MigrationPolicy, Migrator};
use costwise_providers::mock::{server, server_type, MockProvider, PowerOffBehavior};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const TEST_KEY: &str = "test-token";

/// Returns immediately and remembers every requested delay.
#[derive(Default)]
pub struct InstantClock {
    sleeps: Mutex<Vec<Duration>>,
}

impl InstantClock {
    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.lock().unwrap().clone()
    }

    pub fn total(&self) -> Duration {
        self.sleeps().iter().sum()
    }
}

#[async_trait]
impl Clock for InstantClock {
    async fn sleep(&self, duration: Duration) {
        self.sleeps.lock().unwrap().push(duration);
    }
}

/// Yields to the scheduler instead of sleeping, so joined runs interleave at every wait.
#[derive(Default)]
pub struct YieldingClock;

#[async_trait]
impl Clock for YieldingClock {
    async fn sleep(&self, _duration: Duration) {
        tokio::task::yield_now().await;
    }
}

pub fn key() -> ApiKey {
    ApiKey::new(TEST_KEY).unwrap()
}

/// Catalog with one cheaper x86 target (cx32) and one cheaper ARM target (cax21) for cpx31.
pub fn catalog_provider() -> MockProvider {
    MockProvider::new()
        .with_api_key(TEST_KEY)
        .with_server_type(server_type(1, "cpx21", 3, 4.0, 80, "8.91"))
        .with_server_type(server_type(2, "cpx31", 4, 8.0, 80, "16.41"))
        .with_server_type(server_type(3, "cx32", 4, 8.0, 80, "7.72"))
        .with_server_type(server_type(4, "cax21", 4, 8.0, 80, "7.72"))
        .with_server_type(server_type(5, "cax31", 8, 16.0, 160, "15.59"))
}

/// Three x86 servers: web (running), api (running), worker (off).
pub fn x86_fleet() -> MockProvider {
    let cpx31 = server_type(2, "cpx31", 4, 8.0, 80, "16.41");
    catalog_provider()
        .with_server(server(1, "web", ServerStatus::Running, cpx31.clone()))
        .with_server(server(2, "api", ServerStatus::Running, cpx31.clone()))
        .with_server(server(3, "worker", ServerStatus::Off, cpx31))
}

/// x86 fleet plus one ARM server that has no cheaper alternative.
pub fn mixed_fleet() -> MockProvider {
    let cax31 = server_type(5, "cax31", 8, 16.0, 160, "15.59");
    x86_fleet().with_server_behavior(
        server(9, "arm-batch", ServerStatus::Running, cax31),
        PowerOffBehavior::AfterPolls(1),
    )
}

pub fn migrator(provider: Arc<MockProvider>, clock: Arc<InstantClock>) -> Migrator {
    Migrator::new(provider, clock, MigrationPolicy::default())
}

pub fn test_app(provider: Arc<MockProvider>) -> axum::Router {
    let migrator = migrator(provider.clone(), Arc::new(InstantClock::default()));
    api::router(Arc::new(AppState { provider, migrator }))
}

pub fn bearer() -> String {
    format!("Bearer {}", TEST_KEY)
}
