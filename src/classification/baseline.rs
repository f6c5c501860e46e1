//! Baseline criticality from resource type, environment and exposure

use super::{Criticality, Environment};
use crate::asset::ResourceType;

/// Data stores whose public exposure in production is always critical
const CRITICAL_WHEN_EXPOSED: [ResourceType; 3] = [
    ResourceType::ManagedDatabase,
    ResourceType::Cluster,
    ResourceType::KvTable,
];

const HIGH_WHEN_EXPOSED: [ResourceType; 3] = [
    ResourceType::ComputeInstance,
    ResourceType::LoadBalancer,
    ResourceType::ObjectBucket,
];

const MEDIUM_BY_TYPE: [ResourceType; 4] = [
    ResourceType::ManagedDatabase,
    ResourceType::KvTable,
    ResourceType::ObjectBucket,
    ResourceType::EncryptionKey,
];

/// First matching tier wins, top to bottom
pub fn baseline_criticality(
    resource_type: ResourceType,
    environment: Option<&Environment>,
    internet_exposed: bool,
) -> Criticality {
    let production = environment == Some(&Environment::Production);
    let staging = environment == Some(&Environment::Staging);

    if production && internet_exposed && CRITICAL_WHEN_EXPOSED.contains(&resource_type) {
        Criticality::Critical
    } else if production || (internet_exposed && HIGH_WHEN_EXPOSED.contains(&resource_type)) {
        Criticality::High
    } else if staging || MEDIUM_BY_TYPE.contains(&resource_type) {
        Criticality::Medium
    } else {
        Criticality::Low
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exposed_production_database_is_critical() {
        let prod = Environment::Production;
        assert_eq!(
            baseline_criticality(ResourceType::ManagedDatabase, Some(&prod), true),
            Criticality::Critical
        );
        assert_eq!(baseline_criticality(ResourceType::Cluster, Some(&prod), true), Criticality::Critical);
    }

    #[test]
    fn test_production_is_at_least_high() {
        let prod = Environment::Production;
        assert_eq!(baseline_criticality(ResourceType::IdentityRole, Some(&prod), false), Criticality::High);
        assert_eq!(baseline_criticality(ResourceType::ManagedDatabase, Some(&prod), false), Criticality::High);
    }

    #[test]
    fn test_exposed_edge_resources_are_high() {
        assert_eq!(baseline_criticality(ResourceType::LoadBalancer, None, true), Criticality::High);
        assert_eq!(baseline_criticality(ResourceType::Function, None, true), Criticality::Low);
    }

    #[test]
    fn test_medium_tier() {
        let staging = Environment::Staging;
        assert_eq!(baseline_criticality(ResourceType::Function, Some(&staging), false), Criticality::Medium);
        assert_eq!(baseline_criticality(ResourceType::EncryptionKey, None, false), Criticality::Medium);
        // exposed database outside production falls through to the type rule
        assert_eq!(baseline_criticality(ResourceType::KvTable, None, true), Criticality::Medium);
    }

    #[test]
    fn test_default_is_low() {
        let dev = Environment::Development;
        assert_eq!(baseline_criticality(ResourceType::BlockVolume, Some(&dev), false), Criticality::Low);
        assert_eq!(baseline_criticality(ResourceType::VirtualNetwork, None, true), Criticality::Low);
    }
}
