use crate::migration::MigrationState;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Mutex;
use tracing::{error, info, warn};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Success,
    Warning,
    Error,
}

/// Status event emitted on each migration state transition.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct MigrationEvent {
    pub run_id: Uuid,
    pub server_id: u64,
    pub state: MigrationState,
    pub severity: Severity,
    pub summary: String,
    pub at: DateTime<Utc>,
}

/// Receives migration events. Presentation only: a sink can never influence the migration.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: MigrationEvent);
}

fn log_event(event: &MigrationEvent) {
    match event.severity {
        Severity::Info | Severity::Success => info!(
            run_id = %event.run_id,
            server_id = event.server_id,
            state = event.state.as_str(),
            "📝 [Migration] {}",
            event.summary
        ),
        Severity::Warning => warn!(
            run_id = %event.run_id,
            server_id = event.server_id,
            state = event.state.as_str(),
            "⚠️ [Migration] {}",
            event.summary
        ),
        Severity::Error => error!(
            run_id = %event.run_id,
            server_id = event.server_id,
            state = event.state.as_str(),
            "❌ [Migration] {}",
            event.summary
        ),
    }
}

/// Writes every event to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn emit(&self, event: MigrationEvent) {
        log_event(&event);
    }
}

/// Logs and keeps events so a request can return them with its result.
#[derive(Debug, Default)]
pub struct CollectingSink {
    events: Mutex<Vec<MigrationEvent>>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<MigrationEvent> {
        self.events
            .lock()
            .map(|e| e.clone())
            .unwrap_or_else(|poisoned| poisoned.into_inner().clone())
    }

    pub fn take(&self) -> Vec<MigrationEvent> {
        match self.events.lock() {
            Ok(mut e) => std::mem::take(&mut *e),
            Err(poisoned) => std::mem::take(&mut *poisoned.into_inner()),
        }
    }
}

impl EventSink for CollectingSink {
    fn emit(&self, event: MigrationEvent) {
        log_event(&event);
        match self.events.lock() {
            Ok(mut e) => e.push(event),
            Err(poisoned) => poisoned.into_inner().push(event),
        }
    }
}
