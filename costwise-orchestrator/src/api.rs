use crate::bulk::execute_plan;
use crate::fleet::{refresh, FleetSnapshot};
use crate::migration::{MigrationError, MigrationRequest, Migrator};
use crate::notifications::{CollectingSink, MigrationEvent};
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use axum::Router;
use costwise_common::{ActionHandle, ApiKey};
use costwise_finops::{build_plan, find_alternatives, PlanError};
use costwise_providers::{CloudProvider, ProviderError};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tracing::info;

pub struct AppState {
    pub provider: Arc<dyn CloudProvider>,
    pub migrator: Migrator,
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("missing or invalid bearer token")]
    Unauthorized,
    #[error(transparent)]
    Provider(#[from] ProviderError),
    #[error(transparent)]
    Migration(#[from] MigrationError),
    #[error(transparent)]
    Plan(#[from] PlanError),
    #[error("unknown server id(s): {0:?}")]
    UnknownServers(Vec<u64>),
    #[error("server {0} already has an operation in progress")]
    Busy(u64),
}

/// Provider 4xx answers are the caller's problem and pass through; anything else is a bad gateway.
fn provider_status(err: &ProviderError) -> StatusCode {
    match err.status() {
        Some(s) if (400..500).contains(&s) => {
            StatusCode::from_u16(s).unwrap_or(StatusCode::BAD_GATEWAY)
        }
        _ => StatusCode::BAD_GATEWAY,
    }
}

impl ApiError {
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            ApiError::Unauthorized => (StatusCode::UNAUTHORIZED, "unauthorized"),
            ApiError::Provider(e) => (provider_status(e), "provider_error"),
            ApiError::Migration(MigrationError::Busy { .. }) | ApiError::Busy(_) => {
                (StatusCode::CONFLICT, "server_busy")
            }
            ApiError::Migration(MigrationError::PowerOffTimeout { .. }) => {
                (StatusCode::GATEWAY_TIMEOUT, "power_off_timeout")
            }
            ApiError::Migration(MigrationError::Provider { source, .. }) => {
                (provider_status(source), "migration_failed")
            }
            ApiError::Plan(PlanError::EmptySelection) => {
                (StatusCode::UNPROCESSABLE_ENTITY, "empty_selection")
            }
            ApiError::Plan(PlanError::MixedArchitectures(_)) => {
                (StatusCode::UNPROCESSABLE_ENTITY, "mixed_architectures")
            }
            ApiError::Plan(PlanError::NoAlternatives) => {
                (StatusCode::UNPROCESSABLE_ENTITY, "no_alternatives")
            }
            ApiError::UnknownServers(_) => (StatusCode::NOT_FOUND, "server_not_found"),
        }
    }

    fn into_response_with_events(self, events: Vec<MigrationEvent>) -> Response {
        let (status, code) = self.status_and_code();
        (
            status,
            Json(json!({"error": code, "message": self.to_string(), "events": events})),
        )
            .into_response()
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();
        (
            status,
            Json(json!({"error": code, "message": self.to_string()})),
        )
            .into_response()
    }
}

/// The provider key travels with every request and is never stored.
fn extract_bearer(headers: &HeaderMap) -> Result<ApiKey, ApiError> {
    let Some(auth) = headers.get(axum::http::header::AUTHORIZATION) else {
        return Err(ApiError::Unauthorized);
    };
    let Ok(auth) = auth.to_str() else {
        return Err(ApiError::Unauthorized);
    };
    let auth = auth.trim();
    let prefix = "Bearer ";
    if auth.len() <= prefix.len() || !auth.starts_with(prefix) {
        return Err(ApiError::Unauthorized);
    }
    ApiKey::new(&auth[prefix.len()..]).map_err(|_| ApiError::Unauthorized)
}

fn default_power_on_after() -> bool {
    true
}

#[derive(Deserialize, Debug)]
pub struct MigrateBody {
    pub server_type: String,
    #[serde(default)]
    pub upgrade_disk: bool,
    #[serde(default = "default_power_on_after")]
    pub power_on_after: bool,
}

#[derive(Deserialize, Debug)]
pub struct RebuildBody {
    pub image: String,
}

#[derive(Deserialize, Debug)]
pub struct PlanBody {
    pub server_ids: Vec<u64>,
}

#[derive(Deserialize, Debug)]
pub struct BulkMigrateBody {
    pub server_ids: Vec<u64>,
    #[serde(default = "default_power_on_after")]
    pub power_on_after: bool,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/fleet", get(get_fleet))
        .route("/servers/{id}/alternatives", get(get_alternatives))
        .route("/servers/{id}/migrate", post(migrate_server))
        .route("/servers/{id}/rebuild", post(rebuild_server))
        .route("/bulk/plan", post(bulk_plan))
        .route("/bulk/migrate", post(bulk_migrate))
        .with_state(state)
}

async fn root() -> &'static str {
    "Costwise Orchestrator Online"
}

async fn get_fleet(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<FleetSnapshot>, ApiError> {
    let key = extract_bearer(&headers)?;
    Ok(Json(refresh(state.provider.as_ref(), &key).await?))
}

async fn get_alternatives(
    State(state): State<Arc<AppState>>,
    Path(id): Path<u64>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, ApiError> {
    let key = extract_bearer(&headers)?;
    let (server, catalog) = tokio::try_join!(
        state.provider.get_server(&key, id),
        state.provider.list_server_types(&key)
    )?;
    let alternatives = find_alternatives(&server, &catalog);
    Ok(Json(json!({
        "server_id": server.id,
        "current_type": server.server_type.name,
        "architecture": server.architecture(),
        "alternatives": alternatives,
    })))
}

async fn migrate_server(
    State(state): State<Arc<AppState>>,
    Path(id): Path<u64>,
    headers: HeaderMap,
    Json(body): Json<MigrateBody>,
) -> Response {
    let key = match extract_bearer(&headers) {
        Ok(k) => k,
        Err(e) => return e.into_response(),
    };
    let request = MigrationRequest {
        server_id: id,
        target_type: body.server_type.trim().to_string(),
        upgrade_disk: body.upgrade_disk,
        power_on_after: body.power_on_after,
    };
    info!(
        "🧩 migrate: server_id={} target={} upgrade_disk={} power_on_after={}",
        id, request.target_type, request.upgrade_disk, request.power_on_after
    );

    let sink = CollectingSink::new();
    match state.migrator.migrate(&key, &request, &sink).await {
        Ok(report) => (
            StatusCode::OK,
            Json(json!({"report": report, "events": sink.take()})),
        )
            .into_response(),
        Err(e) => ApiError::from(e).into_response_with_events(sink.take()),
    }
}

async fn rebuild_server(
    State(state): State<Arc<AppState>>,
    Path(id): Path<u64>,
    headers: HeaderMap,
    Json(body): Json<RebuildBody>,
) -> Result<Json<ActionHandle>, ApiError> {
    let key = extract_bearer(&headers)?;
    let Some(_claim) = state.migrator.claims().claim(id) else {
        return Err(ApiError::Busy(id));
    };
    info!("🧩 rebuild: server_id={} image={}", id, body.image);
    Ok(Json(state.provider.rebuild(&key, id, body.image.trim()).await?))
}

async fn bulk_plan(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<PlanBody>,
) -> Result<Json<costwise_finops::MigrationPlan>, ApiError> {
    let key = extract_bearer(&headers)?;
    let snapshot = refresh(state.provider.as_ref(), &key).await?;
    let (selected, missing) = snapshot.select(&body.server_ids);
    if !missing.is_empty() {
        return Err(ApiError::UnknownServers(missing));
    }
    Ok(Json(build_plan(&selected, &snapshot.alternatives)?))
}

async fn bulk_migrate(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<BulkMigrateBody>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let key = extract_bearer(&headers)?;
    // Plan from a fresh snapshot so targets reflect current types and prices.
    let snapshot = refresh(state.provider.as_ref(), &key).await?;
    let (selected, missing) = snapshot.select(&body.server_ids);
    if !missing.is_empty() {
        return Err(ApiError::UnknownServers(missing));
    }
    let plan = build_plan(&selected, &snapshot.alternatives)?;

    let sink = CollectingSink::new();
    let report = execute_plan(&state.migrator, &key, &plan, body.power_on_after, &sink).await;
    Ok(Json(json!({
        "plan": plan,
        "report": report,
        "events": sink.take(),
    })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(value: &str) -> HeaderMap {
        let mut h = HeaderMap::new();
        h.insert(
            axum::http::header::AUTHORIZATION,
            HeaderValue::from_str(value).unwrap(),
        );
        h
    }

    #[test]
    fn bearer_is_required() {
        assert!(matches!(extract_bearer(&HeaderMap::new()), Err(ApiError::Unauthorized)));
        assert!(matches!(extract_bearer(&headers("Bearer ")), Err(ApiError::Unauthorized)));
        assert!(matches!(extract_bearer(&headers("Basic abc")), Err(ApiError::Unauthorized)));
        assert_eq!(extract_bearer(&headers("Bearer tok")).unwrap().expose(), "tok");
    }

    #[test]
    fn provider_errors_map_to_http_status() {
        let api = |status| ProviderError::Api {
            status,
            code: None,
            message: "x".into(),
        };
        assert_eq!(provider_status(&api(401)), StatusCode::UNAUTHORIZED);
        assert_eq!(provider_status(&api(423)), StatusCode::LOCKED);
        assert_eq!(provider_status(&api(500)), StatusCode::BAD_GATEWAY);
        assert_eq!(
            provider_status(&ProviderError::Transport("reset".into())),
            StatusCode::BAD_GATEWAY
        );
    }

    #[test]
    fn busy_server_is_a_conflict() {
        let (status, code) =
            ApiError::Migration(MigrationError::Busy { server_id: 1 }).status_and_code();
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(code, "server_busy");
        assert_eq!(ApiError::Busy(1).status_and_code().0, StatusCode::CONFLICT);
    }
}
