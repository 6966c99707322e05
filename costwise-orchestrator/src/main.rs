use anyhow::Context;
use costwise_orchestrator::api::{self, AppState};
use costwise_orchestrator::clock::TokioClock;
use costwise_orchestrator::migration::Migrator;
use costwise_orchestrator::provider_manager::ProviderManager;
use costwise_orchestrator::settings::Settings;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt::init();

    let settings = Settings::from_env()?;
    let provider = ProviderManager::get_provider(&settings)?;
    let migrator = Migrator::new(provider.clone(), Arc::new(TokioClock), settings.policy);

    let state = Arc::new(AppState { provider, migrator });

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = api::router(state).layer(cors);

    let listener = tokio::net::TcpListener::bind(settings.listen_addr)
        .await
        .with_context(|| format!("failed to bind {}", settings.listen_addr))?;
    println!("🚀 Costwise Orchestrator listening on {}", settings.listen_addr);
    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}
