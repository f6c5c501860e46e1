//! Asset classification
//!
//! An initial classification is inferred from tags ([`heuristics`]) and a fixed
//! criticality baseline ([`baseline`]); a [`rules::RuleSet`] then refines it.

pub mod baseline;
pub mod heuristics;
pub mod rules;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::asset::Asset;

pub use baseline::baseline_criticality;
pub use heuristics::{extract_data_classification, extract_environment, extract_team};
pub use rules::{ClassificationRule, RuleActions, RuleConditions, RuleSet, RuleType};

/// Deployment environment. Values outside the known set are kept lowercased.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Environment {
    Production,
    Staging,
    Development,
    Testing,
    Sandbox,
    Other(String),
}

impl Environment {
    pub fn as_str(&self) -> &str {
        match self {
            Environment::Production => "production",
            Environment::Staging => "staging",
            Environment::Development => "development",
            Environment::Testing => "testing",
            Environment::Sandbox => "sandbox",
            Environment::Other(s) => s,
        }
    }
}

/// Unknown values are stored trimmed and lowercased, like the tag heuristic
impl From<String> for Environment {
    fn from(s: String) -> Self {
        let value = s.trim().to_lowercase();
        match value.as_str() {
            "production" => Environment::Production,
            "staging" => Environment::Staging,
            "development" => Environment::Development,
            "testing" => Environment::Testing,
            "sandbox" => Environment::Sandbox,
            _ => Environment::Other(value),
        }
    }
}

impl From<Environment> for String {
    fn from(e: Environment) -> Self {
        e.as_str().to_string()
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Data sensitivity. Values outside the known set are kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum DataClassification {
    Public,
    Internal,
    Confidential,
    Restricted,
    Other(String),
}

impl DataClassification {
    pub fn as_str(&self) -> &str {
        match self {
            DataClassification::Public => "public",
            DataClassification::Internal => "internal",
            DataClassification::Confidential => "confidential",
            DataClassification::Restricted => "restricted",
            DataClassification::Other(s) => s,
        }
    }
}

impl From<String> for DataClassification {
    fn from(s: String) -> Self {
        match s.to_lowercase().as_str() {
            "public" => DataClassification::Public,
            "internal" => DataClassification::Internal,
            "confidential" => DataClassification::Confidential,
            "restricted" => DataClassification::Restricted,
            _ => DataClassification::Other(s),
        }
    }
}

impl From<DataClassification> for String {
    fn from(d: DataClassification) -> Self {
        d.as_str().to_string()
    }
}

impl fmt::Display for DataClassification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Prioritization tier consumed by dashboards
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Criticality {
    Low,
    Medium,
    High,
    Critical,
}

impl Criticality {
    pub const ALL: [Criticality; 4] = [
        Criticality::Critical,
        Criticality::High,
        Criticality::Medium,
        Criticality::Low,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Criticality::Critical => "critical",
            Criticality::High => "high",
            Criticality::Medium => "medium",
            Criticality::Low => "low",
        }
    }
}

impl fmt::Display for Criticality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Criticality {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "critical" => Ok(Criticality::Critical),
            "high" => Ok(Criticality::High),
            "medium" => Ok(Criticality::Medium),
            "low" => Ok(Criticality::Low),
            other => Err(format!("Unknown criticality: {}", other)),
        }
    }
}

/// Security and ownership metadata derived for one asset
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Classification {
    pub environment: Option<Environment>,
    pub team: Option<String>,
    pub data_classification: Option<DataClassification>,
    pub criticality: Criticality,
    pub internet_exposed: bool,
}

/// Tag heuristics plus baseline criticality, before any rules apply
pub fn initial_classification(asset: &Asset) -> Classification {
    let environment = extract_environment(&asset.tags);
    let criticality = baseline_criticality(asset.resource_type, environment.as_ref(), asset.internet_exposed);
    Classification {
        environment,
        team: extract_team(&asset.tags),
        data_classification: extract_data_classification(&asset.tags),
        criticality,
        internet_exposed: asset.internet_exposed,
    }
}

/// Classify one asset against an unsorted rule list.
///
/// Builds a [`RuleSet`] on every call; when classifying many assets with the
/// same rules, build the set once and use [`RuleSet::classify`].
pub fn classify(asset: &Asset, rules: &[ClassificationRule]) -> Classification {
    RuleSet::new(rules.to_vec()).classify(asset)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asset::{ManagedDatabaseConfig, ResourceConfiguration, ScanContext};

    fn database(tags: &[(&str, &str)], exposed: bool) -> Asset {
        let ctx = ScanContext::new("123456789012", "us-east-1");
        Asset::new(
            &ctx,
            "orders",
            ctx.arn("rds", "db:orders"),
            "orders",
            ResourceConfiguration::ManagedDatabase(ManagedDatabaseConfig::default()),
        )
        .with_tags(tags.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect())
        .with_exposure(exposed)
    }

    #[test]
    fn test_initial_classification_combines_heuristics() {
        let asset = database(&[("Environment", "Prod"), ("Owner", "payments"), ("Sensitivity", "PCI")], true);
        let c = initial_classification(&asset);
        assert_eq!(c.environment, Some(Environment::Production));
        assert_eq!(c.team.as_deref(), Some("payments"));
        assert_eq!(c.data_classification, Some(DataClassification::Restricted));
        assert_eq!(c.criticality, Criticality::Critical);
        assert!(c.internet_exposed);
    }

    #[test]
    fn test_untagged_database_is_medium() {
        let c = initial_classification(&database(&[], false));
        assert_eq!(c.environment, None);
        assert_eq!(c.team, None);
        assert_eq!(c.criticality, Criticality::Medium);
    }

    #[test]
    fn test_open_set_values_serialize_as_strings() {
        let c = Classification {
            environment: Some(Environment::Other("qa".to_string())),
            team: None,
            data_classification: Some(DataClassification::Internal),
            criticality: Criticality::Low,
            internet_exposed: false,
        };
        let value = serde_json::to_value(&c).unwrap();
        assert_eq!(value["environment"], "qa");
        assert_eq!(value["data_classification"], "internal");
        assert_eq!(value["criticality"], "low");
        assert!(value["team"].is_null());

        let back: Classification = serde_json::from_value(value).unwrap();
        assert_eq!(back, c);
    }

    #[test]
    fn test_criticality_ordering() {
        assert!(Criticality::Critical > Criticality::High);
        assert!(Criticality::Medium > Criticality::Low);
        assert_eq!("HIGH".parse::<Criticality>().unwrap(), Criticality::High);
        assert!("urgent".parse::<Criticality>().is_err());
    }
}
