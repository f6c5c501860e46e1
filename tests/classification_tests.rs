//! End-to-end classification of a discovered account

use std::io::Write;
use std::sync::Arc;

use argus::{
    asset::{Asset, ResourceType},
    classification::{
        classify, ClassificationRule, Criticality, DataClassification, Environment, RuleActions, RuleConditions,
        RuleSet, RuleType,
    },
    config::EngineConfig,
    discovery::{DiscoveryEngine, DiscoveryResult},
    inventory::classify_result,
    provider::MockProvider,
};

const ACCOUNT: &str = "123456789012";

fn discover_sample() -> DiscoveryResult {
    tokio_test::block_on(async {
        let engine = DiscoveryEngine::new(Arc::new(MockProvider::sample(ACCOUNT)), &EngineConfig::default());
        engine
            .discover(ACCOUNT, &["us-east-1".to_string(), "eu-west-1".to_string()], None)
            .await
    })
}

fn find(result: &DiscoveryResult, resource_type: ResourceType) -> Asset {
    result
        .assets
        .iter()
        .find(|a| a.resource_type == resource_type)
        .cloned()
        .unwrap_or_else(|| panic!("no {} in sample", resource_type))
}

fn tag_rule(id: &str, key: &str, value: &str, criticality: &str, priority: i32) -> ClassificationRule {
    ClassificationRule {
        id: id.to_string(),
        name: id.to_string(),
        organization_id: None,
        rule_type: RuleType::TagMatch,
        conditions: RuleConditions {
            tag_key: Some(key.to_string()),
            tag_value: Some(value.to_string()),
            ..Default::default()
        },
        actions: RuleActions {
            set_criticality: Some(criticality.to_string()),
            ..Default::default()
        },
        priority,
        is_enabled: true,
    }
}

#[test]
fn test_sample_baseline_classification() {
    let result = discover_sample();

    let db = classify(&find(&result, ResourceType::ManagedDatabase), &[]);
    assert_eq!(db.environment, Some(Environment::Production));
    assert_eq!(db.data_classification, Some(DataClassification::Restricted));
    assert_eq!(db.criticality, Criticality::Critical);
    assert!(db.internet_exposed);

    let instance = classify(&find(&result, ResourceType::ComputeInstance), &[]);
    assert_eq!(instance.team.as_deref(), Some("storefront"));
    assert_eq!(instance.criticality, Criticality::High);

    let bucket = classify(&find(&result, ResourceType::ObjectBucket), &[]);
    assert_eq!(bucket.environment, None);
    assert_eq!(bucket.data_classification, Some(DataClassification::Public));
    assert_eq!(bucket.criticality, Criticality::High);

    let table = classify(&find(&result, ResourceType::KvTable), &[]);
    assert_eq!(table.environment, Some(Environment::Staging));
    assert_eq!(table.criticality, Criticality::Medium);

    let key = classify(&find(&result, ResourceType::EncryptionKey), &[]);
    assert_eq!(key.team.as_deref(), Some("billing"));
    assert_eq!(key.criticality, Criticality::Medium);

    let role = classify(&find(&result, ResourceType::IdentityRole), &[]);
    assert_eq!(role.criticality, Criticality::Low);
    assert!(!role.internet_exposed);
}

#[test]
fn test_later_priority_overrides_earlier() {
    let result = discover_sample();
    let instance = find(&result, ResourceType::ComputeInstance);

    let rules = vec![
        tag_rule("p30", "Team", "storefront", "high", 30),
        tag_rule("p5", "Team", "storefront", "low", 5),
    ];
    assert_eq!(classify(&instance, &rules).criticality, Criticality::High);

    let outcome = RuleSet::new(rules).evaluate(&instance, argus::classification::initial_classification(&instance));
    assert_eq!(outcome.matched_rules, vec!["p5".to_string(), "p30".to_string()]);
}

#[test]
fn test_disabled_and_non_matching_rules_are_ignored() {
    let result = discover_sample();
    let instance = find(&result, ResourceType::ComputeInstance);

    let mut disabled = tag_rule("off", "Team", "storefront", "critical", 100);
    disabled.is_enabled = false;
    let other_team = tag_rule("billing", "Team", "billing", "critical", 100);

    let classification = classify(&instance, &[disabled, other_team]);
    assert_eq!(classification.criticality, Criticality::High);
}

#[test]
fn test_rules_file_applied_to_whole_run() {
    let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
    writeln!(
        file,
        r#"
[[rules]]
id = "exposed-is-critical"
name = "Anything internet facing is critical"
rule_type = "exposure"
priority = 10
conditions = {{ internet_exposed = true }}
actions = {{ set_criticality = "critical" }}

[[rules]]
id = "billing-owns-kms"
name = "KMS keys belong to security"
rule_type = "service_type"
priority = 20
conditions = {{ service = "kms" }}
actions = {{ set_team = "security", set_data_classification = "confidential" }}
"#
    )
    .unwrap();

    let rules = RuleSet::from_file(file.path()).unwrap();
    assert_eq!(rules.len(), 2);

    let result = discover_sample();
    let classified = classify_result(&result, &rules);
    assert_eq!(classified.len(), result.assets.len());

    for entry in &classified {
        if entry.asset.internet_exposed {
            assert_eq!(entry.classification.criticality, Criticality::Critical, "{}", entry.arn());
            assert!(entry.matched_rules.contains(&"exposed-is-critical".to_string()));
        }
        if entry.asset.resource_type == ResourceType::EncryptionKey {
            assert_eq!(entry.classification.team.as_deref(), Some("security"));
            assert_eq!(
                entry.classification.data_classification,
                Some(DataClassification::Confidential)
            );
        }
    }
}
