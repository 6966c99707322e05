// Behaviour of the in-memory provider used by local runs and orchestrator tests.

use costwise_common::{ApiKey, ServerStatus};
use costwise_providers::mock::{
    server, server_type, MockOperation, MockProvider, PowerOffBehavior, ProviderCall,
};
use costwise_providers::CloudProvider;

fn key() -> ApiKey {
    ApiKey::new("mock-key").unwrap()
}

fn fleet(behavior: PowerOffBehavior) -> MockProvider {
    let small = server_type(1, "cx22", 2, 4.0, 40, "4.51");
    let big = server_type(2, "cpx31", 4, 8.0, 160, "16.41");
    MockProvider::new()
        .with_server_type(small)
        .with_server_type(big.clone())
        .with_server_behavior(server(10, "web", ServerStatus::Running, big), behavior)
}

#[tokio::test]
async fn test_power_off_reaches_off_after_configured_polls() {
    let p = fleet(PowerOffBehavior::AfterPolls(2));
    p.power_off(&key(), 10).await.unwrap();

    assert_eq!(p.get_server(&key(), 10).await.unwrap().status, ServerStatus::Stopping);
    assert_eq!(p.get_server(&key(), 10).await.unwrap().status, ServerStatus::Off);
}

#[tokio::test]
async fn test_never_powering_off_stays_stopping() {
    let p = fleet(PowerOffBehavior::Never);
    p.power_off(&key(), 10).await.unwrap();
    for _ in 0..5 {
        assert_eq!(p.get_server(&key(), 10).await.unwrap().status, ServerStatus::Stopping);
    }
}

#[tokio::test]
async fn test_change_type_requires_off_and_no_disk_shrink() {
    let p = fleet(PowerOffBehavior::AfterPolls(0));

    let err = p.change_type(&key(), 10, "cpx31", false).await.unwrap_err();
    assert_eq!(err.status(), Some(409));

    p.power_off(&key(), 10).await.unwrap();
    let err = p.change_type(&key(), 10, "cx22", false).await.unwrap_err();
    assert_eq!(err.status(), Some(422));

    let err = p.change_type(&key(), 10, "nope", false).await.unwrap_err();
    assert_eq!(err.status(), Some(404));
}

#[tokio::test]
async fn test_wrong_key_is_rejected_and_calls_recorded() {
    let p = fleet(PowerOffBehavior::AfterPolls(1)).with_api_key("mock-key");
    let wrong = ApiKey::new("other").unwrap();

    assert_eq!(p.list_servers(&wrong).await.unwrap_err().status(), Some(401));
    assert_eq!(p.list_servers(&key()).await.unwrap().len(), 1);
    assert_eq!(
        p.calls().await,
        vec![ProviderCall::ListServers, ProviderCall::ListServers]
    );
}

#[tokio::test]
async fn test_injected_failures_apply_per_server() {
    let p = fleet(PowerOffBehavior::AfterPolls(1));
    p.fail(MockOperation::PowerOn, Some(10), 423, "server is locked").await;

    let err = p.power_on(&key(), 10).await.unwrap_err();
    assert_eq!(err.to_string(), "API Error: 423 - server is locked");

    p.clear_failures().await;
    p.power_on(&key(), 10).await.unwrap();
    assert_eq!(p.get_server(&key(), 10).await.unwrap().status, ServerStatus::Running);
}

#[tokio::test]
async fn test_demo_fleet_is_populated() {
    let p = MockProvider::demo();
    assert_eq!(p.list_servers(&key()).await.unwrap().len(), 3);
    assert_eq!(p.list_server_types(&key()).await.unwrap().len(), 8);
}
