//! Performance benchmarks for normalization, classification and discovery

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use serde_json::json;
use std::sync::Arc;
use tokio::runtime::Runtime;

use argus::{
    asset::{Asset, ResourceType, ScanContext, ServiceKind},
    classification::{ClassificationRule, RuleActions, RuleConditions, RuleSet, RuleType},
    config::EngineConfig,
    discovery::DiscoveryEngine,
    normalizers::NormalizerRegistry,
    provider::MockProvider,
};

const ACCOUNT: &str = "123456789012";

fn instance_descriptor(i: usize) -> serde_json::Value {
    json!({
        "InstanceId": format!("i-{:017x}", i),
        "InstanceType": "t3.micro",
        "State": {"Name": "running"},
        "PublicIpAddress": if i % 3 == 0 { Some("54.1.2.3") } else { None },
        "VpcId": "vpc-0bench",
        "SubnetId": "subnet-0bench",
        "SecurityGroups": [{"GroupId": "sg-0bench"}],
        "Tags": [
            {"Key": "Environment", "Value": ["production", "staging", "dev"][i % 3]},
            {"Key": "Team", "Value": format!("team-{}", i % 7)}
        ]
    })
}

fn assets(count: usize) -> Vec<Asset> {
    let registry = NormalizerRegistry::standard();
    let ctx = ScanContext::new(ACCOUNT, "us-east-1");
    (0..count)
        .flat_map(|i| {
            registry
                .normalize(ResourceType::ComputeInstance, instance_descriptor(i), &ctx)
                .unwrap()
        })
        .collect()
}

fn rules(count: usize) -> RuleSet {
    RuleSet::new(
        (0..count)
            .map(|i| ClassificationRule {
                id: format!("rule-{}", i),
                name: format!("team {} owns its assets", i % 7),
                organization_id: None,
                rule_type: if i % 2 == 0 { RuleType::TagMatch } else { RuleType::Custom },
                conditions: RuleConditions {
                    tag_key: Some("Team".to_string()),
                    tag_value: Some(format!("team-{}", i % 7)),
                    internet_exposed: (i % 2 == 1).then_some(true),
                    ..Default::default()
                },
                actions: RuleActions {
                    set_criticality: Some(["low", "medium", "high", "critical"][i % 4].to_string()),
                    ..Default::default()
                },
                priority: (i % 10) as i32,
                is_enabled: true,
            })
            .collect(),
    )
}

/// Benchmark descriptor normalization
fn bench_normalization(c: &mut Criterion) {
    let registry = NormalizerRegistry::standard();
    let ctx = ScanContext::new(ACCOUNT, "us-east-1");
    let descriptor = instance_descriptor(3);

    c.bench_function("normalize_compute_instance", |b| {
        b.iter(|| {
            let assets = registry
                .normalize(ResourceType::ComputeInstance, black_box(descriptor.clone()), &ctx)
                .unwrap();
            black_box(assets)
        })
    });
}

/// Benchmark rule evaluation over a batch of assets
fn bench_classification(c: &mut Criterion) {
    let mut group = c.benchmark_group("classification");
    let batch = assets(1000);

    for rule_count in [0, 10, 100] {
        let rules = rules(rule_count);
        group.bench_with_input(BenchmarkId::new("classify_1000_assets", rule_count), &rules, |b, rules| {
            b.iter(|| {
                for asset in &batch {
                    black_box(rules.classify(asset));
                }
            })
        });
    }

    group.finish();
}

/// Benchmark a full discovery run against the in-memory provider
fn bench_discovery(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let regions: Vec<String> = ["us-east-1", "us-west-2", "eu-west-1", "ap-southeast-2"]
        .iter()
        .map(|r| r.to_string())
        .collect();

    let mut provider = MockProvider::sample(ACCOUNT);
    for region in &regions {
        for i in 0..50 {
            provider = provider.with_resource(region, ResourceType::ComputeInstance, instance_descriptor(i));
        }
    }
    let engine = DiscoveryEngine::new(Arc::new(provider), &EngineConfig::default());

    c.bench_function("discover_four_regions", |b| {
        b.iter(|| {
            rt.block_on(async {
                let result = engine.discover(ACCOUNT, &regions, Some(&ServiceKind::ALL)).await;
                black_box(result)
            })
        })
    });
}

criterion_group!(benches, bench_normalization, bench_classification, bench_discovery);
criterion_main!(benches);
