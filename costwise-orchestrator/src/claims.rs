use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;

/// Servers with an operation in progress.
///
/// A server can be claimed by one operation at a time. A second claim on a busy server fails
/// immediately instead of waiting, like a `SKIP LOCKED` row claim.
#[derive(Debug, Default, Clone)]
pub struct ServerClaims {
    busy: Arc<Mutex<HashSet<u64>>>,
}

impl ServerClaims {
    pub fn new() -> Self {
        Self::default()
    }

    /// `None` when another operation holds the server.
    pub fn claim(&self, server_id: u64) -> Option<ServerClaim> {
        if !lock(&self.busy).insert(server_id) {
            return None;
        }
        debug!("server {} claimed", server_id);
        Some(ServerClaim {
            busy: self.busy.clone(),
            server_id,
        })
    }

    pub fn is_busy(&self, server_id: u64) -> bool {
        lock(&self.busy).contains(&server_id)
    }
}

fn lock(busy: &Mutex<HashSet<u64>>) -> MutexGuard<'_, HashSet<u64>> {
    busy.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Held for the whole operation; the server is released on drop.
#[derive(Debug)]
pub struct ServerClaim {
    busy: Arc<Mutex<HashSet<u64>>>,
    server_id: u64,
}

impl ServerClaim {
    pub fn server_id(&self) -> u64 {
        self.server_id
    }
}

impl Drop for ServerClaim {
    fn drop(&mut self) {
        lock(&self.busy).remove(&self.server_id);
        debug!("server {} released", self.server_id);
    }
}
