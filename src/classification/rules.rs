//! Declarative classification rules
//!
//! Rules are evaluated in ascending `priority` order and every match
//! overwrites the fields named in its actions, so for a field set by several
//! matching rules the one with the numerically largest priority wins.

use log::debug;
use serde::{Deserialize, Serialize};
use std::path::Path;

use super::{initial_classification, Classification, Criticality, DataClassification, Environment};
use crate::asset::{Asset, ResourceType, ServiceKind};
use crate::error::ArgusError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleType {
    TagMatch,
    ServiceType,
    Exposure,
    Custom,
    /// Any type this engine does not know; never matches
    #[serde(other)]
    Unknown,
}

/// Sparse predicates; absent fields are wildcards
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuleConditions {
    pub tag_key: Option<String>,
    pub tag_value: Option<String>,
    pub service: Option<String>,
    pub resource_type: Option<String>,
    pub internet_exposed: Option<bool>,
    pub region: Option<String>,
}

/// Sparse field overrides
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuleActions {
    pub set_environment: Option<String>,
    pub set_criticality: Option<String>,
    pub set_data_classification: Option<String>,
    pub set_team: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassificationRule {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub organization_id: Option<String>,
    pub rule_type: RuleType,
    #[serde(default)]
    pub conditions: RuleConditions,
    #[serde(default)]
    pub actions: RuleActions,
    /// Documented as lower number = higher precedence; see module docs for how ties resolve
    #[serde(default)]
    pub priority: i32,
    #[serde(default = "default_enabled")]
    pub is_enabled: bool,
}

fn default_enabled() -> bool {
    true
}

impl RuleConditions {
    fn tag_matches(&self, asset: &Asset) -> Option<bool> {
        let key = self.tag_key.as_ref()?;
        let matched = match (asset.tag(key), &self.tag_value) {
            (None, _) => false,
            (Some(_), None) => true,
            (Some(actual), Some(expected)) => actual.to_lowercase().contains(&expected.to_lowercase()),
        };
        Some(matched)
    }

    fn service_matches(&self, asset: &Asset) -> Option<bool> {
        let service = self
            .service
            .as_ref()
            .map(|s| s.parse::<ServiceKind>().map(|s| s == asset.service).unwrap_or(false));
        let resource_type = self
            .resource_type
            .as_ref()
            .map(|t| t.parse::<ResourceType>().map(|t| t == asset.resource_type).unwrap_or(false));
        match (service, resource_type) {
            (None, None) => None,
            (s, t) => Some(s.unwrap_or(true) && t.unwrap_or(true)),
        }
    }

    fn exposure_matches(&self, asset: &Asset) -> Option<bool> {
        self.internet_exposed.map(|flag| flag == asset.internet_exposed)
    }

    fn region_matches(&self, asset: &Asset) -> Option<bool> {
        self.region
            .as_ref()
            .map(|r| r.trim().eq_ignore_ascii_case(&asset.region))
    }
}

impl ClassificationRule {
    /// Whether this rule's conditions hold for `asset`, ignoring `is_enabled`
    pub fn matches(&self, asset: &Asset) -> bool {
        let c = &self.conditions;
        match self.rule_type {
            RuleType::TagMatch => c.tag_matches(asset).unwrap_or(false),
            RuleType::ServiceType => c.service_matches(asset).unwrap_or(false),
            RuleType::Exposure => c.exposure_matches(asset).unwrap_or(false),
            RuleType::Custom => [
                c.tag_matches(asset),
                c.service_matches(asset),
                c.exposure_matches(asset),
                c.region_matches(asset),
            ]
            .into_iter()
            .flatten()
            .all(|m| m),
            RuleType::Unknown => false,
        }
    }
}

impl RuleActions {
    /// Overwrite every field this action names. Values that do not parse are skipped.
    pub fn apply(&self, classification: &mut Classification) {
        if let Some(env) = non_blank(&self.set_environment) {
            classification.environment = Some(Environment::from(env.to_string()));
        }
        if let Some(level) = non_blank(&self.set_criticality) {
            match level.parse::<Criticality>() {
                Ok(c) => classification.criticality = c,
                Err(e) => debug!("Ignoring set_criticality: {}", e),
            }
        }
        if let Some(class) = non_blank(&self.set_data_classification) {
            classification.data_classification = Some(DataClassification::from(class.to_string()));
        }
        if let Some(team) = non_blank(&self.set_team) {
            classification.team = Some(team.to_string());
        }
    }
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// Classification after rules, plus the rules that fired in application order
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RuleOutcome {
    pub classification: Classification,
    pub matched_rules: Vec<String>,
}

/// Enabled rules in evaluation order, built once per run
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    rules: Vec<ClassificationRule>,
}

impl RuleSet {
    /// Drop disabled rules and sort the rest by priority; ties keep input order
    pub fn new(rules: Vec<ClassificationRule>) -> Self {
        let mut rules: Vec<_> = rules.into_iter().filter(|r| r.is_enabled).collect();
        rules.sort_by_key(|r| r.priority);
        Self { rules }
    }

    /// Load rules from a JSON array or a TOML file of `[[rules]]` tables
    pub fn from_file<P: AsRef<Path>>(path: P) -> crate::Result<Self> {
        Ok(Self::new(load_rules(path)?))
    }

    pub fn rules(&self) -> &[ClassificationRule] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Refine `initial` with every matching rule
    pub fn evaluate(&self, asset: &Asset, initial: Classification) -> RuleOutcome {
        let mut classification = initial;
        let mut matched_rules = Vec::new();
        for rule in self.rules.iter().filter(|r| r.matches(asset)) {
            debug!("Rule '{}' (priority {}) matched {}", rule.id, rule.priority, asset.resource_arn);
            rule.actions.apply(&mut classification);
            matched_rules.push(rule.id.clone());
        }
        // exposure always comes from the asset
        classification.internet_exposed = asset.internet_exposed;
        RuleOutcome {
            classification,
            matched_rules,
        }
    }

    /// Heuristics and baseline, then rules
    pub fn classify(&self, asset: &Asset) -> Classification {
        self.evaluate(asset, initial_classification(asset)).classification
    }
}

#[derive(Deserialize)]
struct RuleFile {
    #[serde(default)]
    rules: Vec<ClassificationRule>,
}

/// Read a rule file; `.json` files hold an array, anything else is TOML
pub fn load_rules<P: AsRef<Path>>(path: P) -> crate::Result<Vec<ClassificationRule>> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path)?;
    let is_json = path
        .extension()
        .map(|e| e.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let rules = if is_json {
        serde_json::from_str::<Vec<ClassificationRule>>(&content)?
    } else {
        toml::from_str::<RuleFile>(&content)?.rules
    };

    if let Some(rule) = rules.iter().find(|r| r.rule_type == RuleType::Unknown) {
        log::warn!("Rule '{}' has an unrecognized rule_type and will never match", rule.id);
    }
    if rules.is_empty() {
        return Err(ArgusError::ConfigError(format!("No rules found in {}", path.display())));
    }
    Ok(rules)
}
