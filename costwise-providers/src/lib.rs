use async_trait::async_trait;
use costwise_common::{ActionHandle, ApiKey, Server, ServerType};

/// Failure of a single provider round trip. No retries happen at this layer.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    /// Non-2xx answer. `message` comes from the JSON error body, or the status text when the
    /// body cannot be parsed.
    #[error("API Error: {status} - {message}")]
    Api {
        status: u16,
        code: Option<String>,
        message: String,
    },
    #[error("transport error: {0}")]
    Transport(String),
    #[error("unexpected response body: {0}")]
    Decode(String),
}

impl ProviderError {
    pub fn status(&self) -> Option<u16> {
        match self {
            ProviderError::Api { status, .. } => Some(*status),
            _ => None,
        }
    }
}

pub type ProviderResult<T> = std::result::Result<T, ProviderError>;

/// Operations the optimizer needs from a cloud provider.
///
/// The credential is passed on every call: implementations hold no per-user state.
#[async_trait]
pub trait CloudProvider: Send + Sync {
    async fn list_servers(&self, key: &ApiKey) -> ProviderResult<Vec<Server>>;

    async fn list_server_types(&self, key: &ApiKey) -> ProviderResult<Vec<ServerType>>;

    async fn get_server(&self, key: &ApiKey, server_id: u64) -> ProviderResult<Server>;

    async fn power_off(&self, key: &ApiKey, server_id: u64) -> ProviderResult<ActionHandle>;

    async fn power_on(&self, key: &ApiKey, server_id: u64) -> ProviderResult<ActionHandle>;

    /// `upgrade_disk = false` keeps the current disk size so the change can be reverted later;
    /// the provider refuses it when the target disk is smaller.
    async fn change_type(
        &self,
        key: &ApiKey,
        server_id: u64,
        server_type: &str,
        upgrade_disk: bool,
    ) -> ProviderResult<ActionHandle>;

    async fn rebuild(&self, key: &ApiKey, server_id: u64, image: &str)
        -> ProviderResult<ActionHandle>;

    /// Short provider name for logs.
    fn name(&self) -> &'static str;
}

#[cfg(feature = "mock")]
pub mod mock;

#[cfg(feature = "hetzner")]
pub mod hetzner;
