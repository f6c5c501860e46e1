//! Property tests for tag heuristics, baseline criticality and rule ordering

use proptest::prelude::*;
use std::collections::HashMap;

use argus::{
    asset::{Asset, ResourceConfiguration, ResourceType, ScanContext, VirtualNetworkConfig},
    classification::{
        baseline_criticality, classify, extract_data_classification, extract_environment, extract_team,
        ClassificationRule, Criticality, DataClassification, Environment, RuleActions, RuleConditions, RuleType,
    },
};

const RESOURCE_TYPES: [ResourceType; 11] = [
    ResourceType::ComputeInstance,
    ResourceType::ObjectBucket,
    ResourceType::ManagedDatabase,
    ResourceType::VirtualNetwork,
    ResourceType::IdentityRole,
    ResourceType::Function,
    ResourceType::Cluster,
    ResourceType::KvTable,
    ResourceType::EncryptionKey,
    ResourceType::BlockVolume,
    ResourceType::LoadBalancer,
];

fn single(key: &str, value: &str) -> HashMap<String, String> {
    HashMap::from([(key.to_string(), value.to_string())])
}

fn tagged_network(tags: HashMap<String, String>) -> Asset {
    let ctx = ScanContext::new("123456789012", "us-east-1");
    Asset::new(
        &ctx,
        "vpc-1",
        ctx.arn("ec2", "vpc/vpc-1"),
        "vpc-1",
        ResourceConfiguration::VirtualNetwork(VirtualNetworkConfig::default()),
    )
    .with_tags(tags)
}

fn criticality_rule(index: usize, priority: i32, level: Criticality) -> ClassificationRule {
    ClassificationRule {
        id: format!("rule-{}", index),
        name: String::new(),
        organization_id: None,
        rule_type: RuleType::TagMatch,
        conditions: RuleConditions {
            tag_key: Some("Team".to_string()),
            ..Default::default()
        },
        actions: RuleActions {
            set_criticality: Some(level.as_str().to_string()),
            ..Default::default()
        },
        priority,
        is_enabled: true,
    }
}

fn any_criticality() -> impl Strategy<Value = Criticality> {
    prop::sample::select(Criticality::ALL.to_vec())
}

proptest! {
    #[test]
    fn prod_anywhere_in_value_is_production(prefix in "[a-z-]{0,6}", suffix in "[a-z0-9-]{0,6}") {
        let value = format!("{}PROD{}", prefix, suffix);
        prop_assert_eq!(extract_environment(&single("Environment", &value)), Some(Environment::Production));
    }

    #[test]
    fn blank_tags_yield_nothing(blank in "[ \t]{0,5}") {
        prop_assert_eq!(extract_environment(&single("env", &blank)), None);
        prop_assert_eq!(extract_team(&single("team", &blank)), None);
        prop_assert_eq!(extract_data_classification(&single("classification", &blank)), None);
    }

    #[test]
    fn team_is_trimmed_but_otherwise_verbatim(team in "[A-Za-z][A-Za-z0-9 _-]{0,20}[A-Za-z0-9]") {
        let padded = format!("  {} ", team);
        prop_assert_eq!(extract_team(&single("Owner", &padded)), Some(team));
    }

    #[test]
    fn pii_dominates_other_labels(other in prop::sample::select(vec!["public", "internal", "confidential"])) {
        let value = format!("{}-pii", other);
        prop_assert_eq!(
            extract_data_classification(&single("DataClassification", &value)),
            Some(DataClassification::Restricted)
        );
    }

    #[test]
    fn production_is_never_below_high(index in 0..RESOURCE_TYPES.len(), exposed in any::<bool>()) {
        let prod = Environment::Production;
        let level = baseline_criticality(RESOURCE_TYPES[index], Some(&prod), exposed);
        prop_assert!(level >= Criticality::High);
    }

    #[test]
    fn unexposed_unknown_environment_is_never_critical(index in 0..RESOURCE_TYPES.len()) {
        let level = baseline_criticality(RESOURCE_TYPES[index], None, false);
        prop_assert!(level <= Criticality::Medium);
    }

    #[test]
    fn highest_priority_rule_wins(specs in prop::collection::vec((-50i32..50, any_criticality()), 1..8)) {
        let rules: Vec<_> = specs
            .iter()
            .enumerate()
            .map(|(i, (priority, level))| criticality_rule(i, *priority, *level))
            .collect();

        // stable ascending order, so the last rule holding the top priority applies last
        let top = specs.iter().map(|(p, _)| *p).max().unwrap();
        let expected = specs.iter().rev().find(|(p, _)| *p == top).map(|(_, l)| *l).unwrap();

        let asset = tagged_network(single("Team", "platform"));
        let classification = classify(&asset, &rules);
        prop_assert_eq!(classification.criticality, expected);
        prop_assert_eq!(classification.internet_exposed, asset.internet_exposed);
    }
}
