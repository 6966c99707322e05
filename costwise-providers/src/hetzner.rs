use crate::{CloudProvider, ProviderError, ProviderResult};
use async_trait::async_trait;
use costwise_common::{ActionHandle, ApiKey, Server, ServerType};
use reqwest::{Client, Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::{debug, error, info, warn};

pub const DEFAULT_API_BASE: &str = "https://api.hetzner.cloud/v1";

/// Largest page the list endpoints accept; lists are fetched in one round trip.
const PER_PAGE: &str = "50";

pub struct HetznerProvider {
    client: Client,
    base_url: String,
}

#[derive(Deserialize, Default)]
struct Pagination {
    next_page: Option<u64>,
}

#[derive(Deserialize, Default)]
struct Meta {
    #[serde(default)]
    pagination: Option<Pagination>,
}

impl Meta {
    fn next_page(meta: &Option<Meta>) -> Option<u64> {
        meta.as_ref()
            .and_then(|m| m.pagination.as_ref())
            .and_then(|p| p.next_page)
    }
}

#[derive(Deserialize)]
struct ServersEnvelope {
    servers: Vec<Server>,
    #[serde(default)]
    meta: Option<Meta>,
}

#[derive(Deserialize)]
struct ServerEnvelope {
    server: Server,
}

#[derive(Deserialize)]
struct ServerTypesEnvelope {
    server_types: Vec<ServerType>,
    #[serde(default)]
    meta: Option<Meta>,
}

/// Only the first page is fetched; a further page means the listing is incomplete.
fn warn_if_truncated(resource: &str, returned: usize, meta: &Option<Meta>) {
    if let Some(next) = Meta::next_page(meta) {
        warn!(
            "⚠️ [Hetzner API] {} listing truncated: {} entries returned, next_page={} not fetched",
            resource, returned, next
        );
    }
}

#[derive(Deserialize)]
struct ActionEnvelope {
    action: ActionHandle,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    code: Option<String>,
    message: Option<String>,
}

/// Pull `error.code` / `error.message` out of a failure body, if it is the provider's JSON shape.
fn parse_error_body(body: &str) -> (Option<String>, Option<String>) {
    match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(env) => (
            env.error.code,
            env.error.message.filter(|m| !m.trim().is_empty()),
        ),
        Err(_) => (None, None),
    }
}

impl HetznerProvider {
    pub fn new(
        base_url: &str,
        connect_timeout: Duration,
        request_timeout: Duration,
    ) -> ProviderResult<Self> {
        // Every call is bounded by the request timeout.
        let client = Client::builder()
            .connect_timeout(connect_timeout)
            .timeout(request_timeout)
            .build()
            .map_err(|e| ProviderError::Transport(e.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.trim().trim_end_matches('/').to_string(),
        })
    }

    fn headers(&self, key: &ApiKey) -> ProviderResult<reqwest::header::HeaderMap> {
        let mut headers = reqwest::header::HeaderMap::new();
        let mut auth = reqwest::header::HeaderValue::from_str(&format!("Bearer {}", key.expose()))
            .map_err(|_| ProviderError::Transport("api key is not a valid header value".into()))?;
        auth.set_sensitive(true);
        headers.insert(reqwest::header::AUTHORIZATION, auth);
        headers.insert(
            reqwest::header::CONTENT_TYPE,
            reqwest::header::HeaderValue::from_static("application/json"),
        );
        Ok(headers)
    }

    /// One round trip: send, map non-2xx to `ProviderError::Api`, decode the body.
    async fn request<T: DeserializeOwned>(
        &self,
        key: &ApiKey,
        method: Method,
        path: &str,
        query: &[(&str, &str)],
        body: Option<serde_json::Value>,
    ) -> ProviderResult<T> {
        let url = format!("{}{}", self.base_url, path);
        debug!("🔵 [Hetzner API] {} {}", method, url);

        let mut req = self
            .client
            .request(method.clone(), &url)
            .headers(self.headers(key)?);
        if !query.is_empty() {
            req = req.query(query);
        }
        if let Some(body) = body {
            req = req.json(&body);
        }

        let resp = req.send().await.map_err(|e| {
            error!("❌ [Hetzner API] {} {} transport failure: {}", method, url, e);
            ProviderError::Transport(e.to_string())
        })?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            let (code, message) = parse_error_body(&text);
            let message = message.unwrap_or_else(|| status_text(status));
            error!(
                "❌ [Hetzner API] {} {} failed: status={} code={:?} message={}",
                method,
                url,
                status.as_u16(),
                code,
                message
            );
            return Err(ProviderError::Api {
                status: status.as_u16(),
                code,
                message,
            });
        }

        debug!("✅ [Hetzner API] {} {} succeeded: status={}", method, url, status.as_u16());
        resp.json::<T>()
            .await
            .map_err(|e| ProviderError::Decode(e.to_string()))
    }

    async fn action(
        &self,
        key: &ApiKey,
        server_id: u64,
        action: &str,
        body: Option<serde_json::Value>,
    ) -> ProviderResult<ActionHandle> {
        let path = format!("/servers/{}/actions/{}", server_id, action);
        let env: ActionEnvelope = self.request(key, Method::POST, &path, &[], body).await?;
        info!(
            "✅ [Hetzner API] {} accepted: server_id={} action_id={} status={:?}",
            action, server_id, env.action.id, env.action.status
        );
        Ok(env.action)
    }
}

fn status_text(status: StatusCode) -> String {
    status
        .canonical_reason()
        .map(|s| s.to_string())
        .unwrap_or_else(|| format!("HTTP {}", status.as_u16()))
}

#[async_trait]
impl CloudProvider for HetznerProvider {
    async fn list_servers(&self, key: &ApiKey) -> ProviderResult<Vec<Server>> {
        let env: ServersEnvelope = self
            .request(key, Method::GET, "/servers", &[("per_page", PER_PAGE)], None)
            .await?;
        info!("✅ [Hetzner API] Found {} server(s)", env.servers.len());
        warn_if_truncated("servers", env.servers.len(), &env.meta);
        Ok(env.servers)
    }

    async fn list_server_types(&self, key: &ApiKey) -> ProviderResult<Vec<ServerType>> {
        let env: ServerTypesEnvelope = self
            .request(key, Method::GET, "/server_types", &[("per_page", PER_PAGE)], None)
            .await?;
        info!("✅ [Hetzner API] Found {} server type(s)", env.server_types.len());
        warn_if_truncated("server_types", env.server_types.len(), &env.meta);
        Ok(env.server_types)
    }

    async fn get_server(&self, key: &ApiKey, server_id: u64) -> ProviderResult<Server> {
        let path = format!("/servers/{}", server_id);
        let env: ServerEnvelope = self.request(key, Method::GET, &path, &[], None).await?;
        debug!(
            "🔍 [Hetzner API] Server {} status: {}",
            server_id,
            env.server.status.as_str()
        );
        Ok(env.server)
    }

    async fn power_off(&self, key: &ApiKey, server_id: u64) -> ProviderResult<ActionHandle> {
        self.action(key, server_id, "poweroff", None).await
    }

    async fn power_on(&self, key: &ApiKey, server_id: u64) -> ProviderResult<ActionHandle> {
        self.action(key, server_id, "poweron", None).await
    }

    async fn change_type(
        &self,
        key: &ApiKey,
        server_id: u64,
        server_type: &str,
        upgrade_disk: bool,
    ) -> ProviderResult<ActionHandle> {
        let body = json!({
            "server_type": server_type,
            "upgrade_disk": upgrade_disk,
        });
        self.action(key, server_id, "change_type", Some(body)).await
    }

    async fn rebuild(
        &self,
        key: &ApiKey,
        server_id: u64,
        image: &str,
    ) -> ProviderResult<ActionHandle> {
        self.action(key, server_id, "rebuild", Some(json!({ "image": image })))
            .await
    }

    fn name(&self) -> &'static str {
        "hetzner"
    }
}
