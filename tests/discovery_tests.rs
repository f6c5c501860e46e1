//! Integration tests for the discovery engine

use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use argus::{
    asset::{ServiceKind, GLOBAL_REGION},
    config::EngineConfig,
    discovery::{CellEvent, DiscoveryEngine, DiscoveryRequest},
    error::ProviderError,
    provider::MockProvider,
};

const ACCOUNT: &str = "123456789012";

fn regions() -> Vec<String> {
    vec!["us-east-1".to_string(), "eu-west-1".to_string()]
}

#[tokio::test]
async fn test_full_sample_account() {
    let provider = Arc::new(MockProvider::sample(ACCOUNT));
    let engine = DiscoveryEngine::new(provider.clone(), &EngineConfig::default());
    let result = engine.discover(ACCOUNT, &regions(), None).await;

    assert!(result.is_complete(), "errors: {:?}", result.errors);
    assert_eq!(result.account_id, ACCOUNT);
    assert_eq!(result.assets.len(), 11);

    let arns: HashSet<_> = result.assets.iter().map(|a| a.resource_arn.as_str()).collect();
    assert_eq!(arns.len(), result.assets.len());
    assert!(result.assets.iter().all(|a| a.account_id == ACCOUNT));

    // 9 regional services x 2 regions + one global iam cell
    let calls = provider.calls().await;
    assert_eq!(calls.len(), 19);
    let iam_calls: Vec<_> = calls.iter().filter(|(_, s)| *s == ServiceKind::Iam).collect();
    assert_eq!(iam_calls, vec![&(GLOBAL_REGION.to_string(), ServiceKind::Iam)]);

    assert!(result.regions_scanned.contains(&GLOBAL_REGION.to_string()));
    assert_eq!(result.services_scanned.len(), ServiceKind::ALL.len());
}

#[tokio::test]
async fn test_failures_are_isolated_per_cell() {
    let provider = MockProvider::sample(ACCOUNT)
        .with_failure("us-east-1", ServiceKind::Rds, ProviderError::AccessDenied("rds:DescribeDBInstances".into()))
        .with_failure("eu-west-1", ServiceKind::Eks, ProviderError::Throttled);
    let engine = DiscoveryEngine::new(Arc::new(provider), &EngineConfig::default());
    let result = engine.discover(ACCOUNT, &regions(), None).await;

    assert_eq!(result.assets.len(), 9);
    assert_eq!(result.errors.len(), 2);
    let failed: HashSet<_> = result.errors.iter().map(|e| (e.region.as_str(), e.service)).collect();
    assert!(failed.contains(&("us-east-1", ServiceKind::Rds)));
    assert!(failed.contains(&("eu-west-1", ServiceKind::Eks)));
    assert!(!result.cancelled);
}

#[tokio::test]
async fn test_slow_cell_times_out() {
    let provider = MockProvider::sample(ACCOUNT).with_cell_delay("us-east-1", ServiceKind::S3, Duration::from_secs(5));
    let config = EngineConfig::default().with_cell_timeout(100);
    let engine = DiscoveryEngine::new(Arc::new(provider), &config);

    let start = Instant::now();
    let result = engine
        .discover(ACCOUNT, &["us-east-1".to_string()], Some(&[ServiceKind::S3, ServiceKind::Vpc]))
        .await;

    assert!(start.elapsed() < Duration::from_secs(2));
    assert_eq!(result.errors.len(), 1);
    assert_eq!(result.errors[0].service, ServiceKind::S3);
    assert!(result.errors[0].error.contains("timed out"));
    assert_eq!(result.assets.len(), 1);
}

#[tokio::test]
async fn test_concurrency_limit_serializes_cells() {
    let provider = MockProvider::sample(ACCOUNT).with_delay(Duration::from_millis(50));
    let config = EngineConfig::default().with_max_concurrency(1);
    let engine = DiscoveryEngine::new(Arc::new(provider), &config);

    let start = Instant::now();
    let services = [ServiceKind::Ec2, ServiceKind::S3, ServiceKind::Rds, ServiceKind::Vpc];
    let result = engine.discover(ACCOUNT, &["us-east-1".to_string()], Some(&services)).await;

    assert!(start.elapsed() >= Duration::from_millis(200));
    assert!(result.is_complete());
}

#[tokio::test]
async fn test_cancellation_skips_remaining_cells() {
    let provider = MockProvider::sample(ACCOUNT).with_delay(Duration::from_millis(30));
    let token = CancellationToken::new();
    let (tx, mut rx) = mpsc::unbounded_channel();
    let engine = DiscoveryEngine::new(Arc::new(provider), &EngineConfig::default().with_max_concurrency(1))
        .with_cancellation(token.clone())
        .with_progress(tx);

    let canceller = async {
        while let Some(event) = rx.recv().await {
            if matches!(event, CellEvent::Completed { .. }) {
                token.cancel();
                break;
            }
        }
    };
    let request = DiscoveryRequest::new(ACCOUNT, regions());
    let (result, _) = tokio::join!(engine.discover_request(&request), canceller);

    assert!(result.cancelled);
    assert!(!result.is_complete());
    assert!(!result.cells_skipped.is_empty());
    let ran = request.cells().len() - result.cells_skipped.len();
    assert!(ran <= 2, "{} cells ran", ran);
    assert!(result.assets.len() < 11);
}

#[tokio::test]
async fn test_empty_regions_scan_only_global_services() {
    let provider = Arc::new(MockProvider::sample(ACCOUNT));
    let engine = DiscoveryEngine::new(provider.clone(), &EngineConfig::default());
    let result = engine.discover(ACCOUNT, &[], None).await;

    assert_eq!(result.regions_scanned, vec![GLOBAL_REGION.to_string()]);
    assert_eq!(result.assets.len(), 1);
    assert_eq!(provider.calls().await.len(), 1);
}
