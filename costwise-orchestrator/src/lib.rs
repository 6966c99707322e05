pub mod api;
pub mod bulk;
pub mod claims;
pub mod clock;
pub mod fleet;
pub mod migration;
pub mod notifications;
pub mod provider_manager;
pub mod settings;
