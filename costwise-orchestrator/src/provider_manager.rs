use crate::settings::Settings;
use costwise_providers::CloudProvider;
use std::sync::Arc;
use tracing::info;

pub struct ProviderManager;

impl ProviderManager {
    pub fn get_provider(settings: &Settings) -> anyhow::Result<Arc<dyn CloudProvider>> {
        match settings.provider.as_str() {
            #[cfg(feature = "provider-hetzner")]
            "hetzner" => {
                let provider = costwise_providers::hetzner::HetznerProvider::new(
                    &settings.api_base,
                    settings.connect_timeout,
                    settings.request_timeout,
                )?;
                info!("provider: hetzner ({})", settings.api_base);
                Ok(Arc::new(provider))
            }
            #[cfg(feature = "provider-mock")]
            "mock" => {
                let mut provider = costwise_providers::mock::MockProvider::demo();
                if let Some(key) = settings.mock_api_key.as_deref() {
                    provider = provider.with_api_key(key);
                }
                info!("provider: mock (in-memory demo fleet)");
                Ok(Arc::new(provider))
            }
            // Add other providers here.
            other => anyhow::bail!("unsupported provider {:?}", other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(provider: &str) -> Settings {
        let provider = provider.to_string();
        Settings::from_lookup(move |name| (name == "COSTWISE_PROVIDER").then(|| provider.clone()))
            .unwrap()
    }

    #[test]
    #[cfg(all(feature = "provider-mock", feature = "provider-hetzner"))]
    fn known_providers_resolve() {
        assert_eq!(ProviderManager::get_provider(&settings("mock")).unwrap().name(), "mock");
        assert_eq!(
            ProviderManager::get_provider(&settings("hetzner")).unwrap().name(),
            "hetzner"
        );
    }

    #[test]
    fn unknown_provider_is_an_error() {
        assert!(ProviderManager::get_provider(&settings("ovh")).is_err());
    }
}
