use crate::claims::ServerClaims;
use crate::clock::Clock;
use crate::notifications::{EventSink, MigrationEvent, Severity};
use chrono::Utc;
use costwise_common::{ActionHandle, ApiKey};
use costwise_providers::{CloudProvider, ProviderError};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};
use uuid::Uuid;

/// Steps of a single server type change.
///
/// `Idle -> CheckingPower -> PoweringOff -> WaitingOff -> ChangingType -> (PoweringOn) -> Done`.
/// `Failed` is absorbing and can follow any step.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MigrationState {
    Idle,
    CheckingPower,
    PoweringOff,
    WaitingOff,
    ChangingType,
    PoweringOn,
    Done,
    Failed,
}

impl MigrationState {
    pub fn as_str(&self) -> &'static str {
        match self {
            MigrationState::Idle => "idle",
            MigrationState::CheckingPower => "checking_power",
            MigrationState::PoweringOff => "powering_off",
            MigrationState::WaitingOff => "waiting_off",
            MigrationState::ChangingType => "changing_type",
            MigrationState::PoweringOn => "powering_on",
            MigrationState::Done => "done",
            MigrationState::Failed => "failed",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MigrationPolicy {
    pub poll_interval: Duration,
    pub max_poll_attempts: u32,
    /// Wait between the type change and the power-on call.
    pub settle_delay: Duration,
}

impl Default for MigrationPolicy {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(2),
            max_poll_attempts: 30,
            settle_delay: Duration::from_secs(2),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationRequest {
    pub server_id: u64,
    pub target_type: String,
    pub upgrade_disk: bool,
    pub power_on_after: bool,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(tag = "status", content = "message", rename_all = "snake_case")]
pub enum PowerOnOutcome {
    NotRequested,
    PoweredOn,
    /// The new type is in place but the server stayed off.
    Failed(String),
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct MigrationReport {
    pub run_id: Uuid,
    pub server_id: u64,
    pub target_type: String,
    pub final_state: MigrationState,
    pub power_off_skipped: bool,
    /// Status polls spent waiting for `off`.
    pub polls: u32,
    pub change_type_action: ActionHandle,
    pub power_on: PowerOnOutcome,
}

#[derive(Debug, thiserror::Error)]
pub enum MigrationError {
    #[error("server {server_id} already has an operation in progress")]
    Busy { server_id: u64 },
    #[error("server did not power off in time (server {server_id}, {attempts} polls)")]
    PowerOffTimeout { server_id: u64, attempts: u32 },
    #[error("{} failed for server {server_id}: {source}", .state.as_str())]
    Provider {
        server_id: u64,
        state: MigrationState,
        #[source]
        source: ProviderError,
    },
}

impl MigrationError {
    /// Step the migration was in when it failed.
    pub fn state(&self) -> MigrationState {
        match self {
            MigrationError::Busy { .. } => MigrationState::Idle,
            MigrationError::PowerOffTimeout { .. } => MigrationState::WaitingOff,
            MigrationError::Provider { state, .. } => *state,
        }
    }
}

/// Tracks one run and turns each transition into an event.
struct Run<'a> {
    id: Uuid,
    server_id: u64,
    state: MigrationState,
    sink: &'a dyn EventSink,
}

impl<'a> Run<'a> {
    fn new(server_id: u64, sink: &'a dyn EventSink) -> Self {
        Self {
            id: Uuid::new_v4(),
            server_id,
            state: MigrationState::Idle,
            sink,
        }
    }

    fn notify(&self, severity: Severity, summary: String) {
        self.sink.emit(MigrationEvent {
            run_id: self.id,
            server_id: self.server_id,
            state: self.state,
            severity,
            summary,
            at: Utc::now(),
        });
    }

    fn transition(&mut self, to: MigrationState, severity: Severity, summary: impl Into<String>) {
        debug!(
            "🔄 [migration] {} -> {} (server {})",
            self.state.as_str(),
            to.as_str(),
            self.server_id
        );
        self.state = to;
        self.notify(severity, summary.into());
    }

    fn fail(&mut self, error: MigrationError) -> MigrationError {
        self.transition(
            MigrationState::Failed,
            Severity::Error,
            format!("Migration failed: {}", error),
        );
        error
    }

    fn provider_failure(&mut self, source: ProviderError) -> MigrationError {
        let error = MigrationError::Provider {
            server_id: self.server_id,
            state: self.state,
            source,
        };
        self.fail(error)
    }
}

/// Runs server type changes against a provider.
///
/// Only the power-off wait retries (by polling). Every other provider failure ends the run and is
/// returned to the caller, who decides whether to start over.
///
/// A server is claimed for the whole run; a second run on the same server fails with
/// [`MigrationError::Busy`] before any provider call.
pub struct Migrator {
    provider: Arc<dyn CloudProvider>,
    clock: Arc<dyn Clock>,
    policy: MigrationPolicy,
    claims: ServerClaims,
}

impl Migrator {
    pub fn new(provider: Arc<dyn CloudProvider>, clock: Arc<dyn Clock>, policy: MigrationPolicy) -> Self {
        Self {
            provider,
            clock,
            policy,
            claims: ServerClaims::new(),
        }
    }

    pub fn policy(&self) -> &MigrationPolicy {
        &self.policy
    }

    /// Claims held by running migrations. Other operations on a server claim it here too.
    pub fn claims(&self) -> &ServerClaims {
        &self.claims
    }

    pub async fn migrate(
        &self,
        key: &ApiKey,
        request: &MigrationRequest,
        sink: &dyn EventSink,
    ) -> Result<MigrationReport, MigrationError> {
        let server_id = request.server_id;
        let Some(_claim) = self.claims.claim(server_id) else {
            warn!("⚠️ [migration] server {} is busy, run rejected", server_id);
            return Err(MigrationError::Busy { server_id });
        };
        let mut run = Run::new(server_id, sink);

        run.transition(
            MigrationState::CheckingPower,
            Severity::Info,
            "Checking power state",
        );
        let server = match self.provider.get_server(key, server_id).await {
            Ok(s) => s,
            Err(e) => return Err(run.provider_failure(e)),
        };

        let power_off_skipped = server.is_off();
        let mut polls = 0;
        if power_off_skipped {
            debug!("server {} already off, skipping power-off", server_id);
        } else {
            run.transition(
                MigrationState::PoweringOff,
                Severity::Info,
                "Powering off server: it must be offline to change type",
            );
            if let Err(e) = self.provider.power_off(key, server_id).await {
                return Err(run.provider_failure(e));
            }

            run.transition(
                MigrationState::WaitingOff,
                Severity::Info,
                "Waiting for server to power off",
            );
            polls = match self.wait_until_off(key, server_id).await {
                Some(polls) => polls,
                None => {
                    return Err(run.fail(MigrationError::PowerOffTimeout {
                        server_id,
                        attempts: self.policy.max_poll_attempts,
                    }))
                }
            };
        }

        run.transition(
            MigrationState::ChangingType,
            Severity::Info,
            format!(
                "Changing server type: {} -> {}",
                server.server_type.name, request.target_type
            ),
        );
        let change_type_action = match self
            .provider
            .change_type(key, server_id, &request.target_type, request.upgrade_disk)
            .await
        {
            Ok(action) => action,
            Err(e) => return Err(run.provider_failure(e)),
        };

        let power_on = if request.power_on_after {
            run.transition(
                MigrationState::PoweringOn,
                Severity::Info,
                "Type changed, powering server back on",
            );
            self.clock.sleep(self.policy.settle_delay).await;
            match self.provider.power_on(key, server_id).await {
                Ok(_) => PowerOnOutcome::PoweredOn,
                Err(e) => {
                    // The type change already happened; the server stays off with the new type.
                    run.notify(Severity::Error, format!("Power on failed: {}", e));
                    PowerOnOutcome::Failed(e.to_string())
                }
            }
        } else {
            PowerOnOutcome::NotRequested
        };

        let (severity, summary) = match &power_on {
            PowerOnOutcome::PoweredOn => (
                Severity::Success,
                format!("Migration successful: now {} and powering on", request.target_type),
            ),
            PowerOnOutcome::NotRequested => (
                Severity::Success,
                format!(
                    "Migration successful: now {}, server left off",
                    request.target_type
                ),
            ),
            PowerOnOutcome::Failed(_) => (
                Severity::Warning,
                format!(
                    "Migration to {} done but the server is still off",
                    request.target_type
                ),
            ),
        };
        run.transition(MigrationState::Done, severity, summary);

        Ok(MigrationReport {
            run_id: run.id,
            server_id,
            target_type: request.target_type.clone(),
            final_state: run.state,
            power_off_skipped,
            polls,
            change_type_action,
            power_on,
        })
    }

    /// Poll until the server reports `off`. Returns the number of polls, or `None` once the
    /// attempt budget is spent. A failed poll uses up an attempt.
    async fn wait_until_off(&self, key: &ApiKey, server_id: u64) -> Option<u32> {
        for attempt in 1..=self.policy.max_poll_attempts {
            self.clock.sleep(self.policy.poll_interval).await;
            match self.provider.get_server(key, server_id).await {
                Ok(server) if server.is_off() => return Some(attempt),
                Ok(server) => debug!(
                    "server {} still {} (poll {}/{})",
                    server_id,
                    server.status.as_str(),
                    attempt,
                    self.policy.max_poll_attempts
                ),
                Err(e) => warn!(
                    "⚠️ status poll {}/{} for server {} failed: {}",
                    attempt, self.policy.max_poll_attempts, server_id, e
                ),
            }
        }
        None
    }
}
