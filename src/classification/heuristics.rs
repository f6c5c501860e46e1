//! Tag heuristics
//!
//! Each extractor walks its candidate keys in order and uses the first one
//! present with a non-blank value. Values from different keys are never merged.

use std::collections::HashMap;

use super::{DataClassification, Environment};

pub const ENVIRONMENT_KEYS: [&str; 6] = ["Environment", "environment", "Env", "env", "Stage", "stage"];
pub const TEAM_KEYS: [&str; 6] = ["Team", "team", "Owner", "owner", "OwnerTeam", "owner_team"];
pub const DATA_CLASSIFICATION_KEYS: [&str; 6] = [
    "DataClassification",
    "data_classification",
    "Classification",
    "classification",
    "Sensitivity",
    "sensitivity",
];

fn first_value<'a>(tags: &'a HashMap<String, String>, keys: &[&str]) -> Option<&'a str> {
    keys.iter()
        .filter_map(|k| tags.get(*k))
        .map(|v| v.trim())
        .find(|v| !v.is_empty())
}

/// Infer the deployment environment from tags
pub fn extract_environment(tags: &HashMap<String, String>) -> Option<Environment> {
    let value = first_value(tags, &ENVIRONMENT_KEYS)?.to_lowercase();
    let env = if value.contains("prod") {
        Environment::Production
    } else if value.contains("stag") {
        Environment::Staging
    } else if value.contains("dev") {
        Environment::Development
    } else if value.contains("test") {
        Environment::Testing
    } else if value.contains("sandbox") {
        Environment::Sandbox
    } else {
        Environment::Other(value)
    };
    Some(env)
}

/// Owning team, verbatim
pub fn extract_team(tags: &HashMap<String, String>) -> Option<String> {
    first_value(tags, &TEAM_KEYS).map(str::to_string)
}

/// Infer data sensitivity from tags
pub fn extract_data_classification(tags: &HashMap<String, String>) -> Option<DataClassification> {
    let raw = first_value(tags, &DATA_CLASSIFICATION_KEYS)?;
    let value = raw.to_lowercase();
    let has = |needles: &[&str]| needles.iter().any(|n| value.contains(n));

    let class = if has(&["restrict", "pci", "pii"]) {
        DataClassification::Restricted
    } else if has(&["confidential", "secret"]) {
        DataClassification::Confidential
    } else if has(&["internal", "private"]) {
        DataClassification::Internal
    } else if has(&["public"]) {
        DataClassification::Public
    } else {
        DataClassification::Other(raw.to_string())
    };
    Some(class)
}
