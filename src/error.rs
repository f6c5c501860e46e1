//! Error handling for the argus engine
//!
//! Failures inside a discovery run are isolated per cell and reported as data
//! (see [`crate::discovery::CellError`]); the enums here are what individual
//! operations return before being folded into those reports.

use std::time::Duration;
use thiserror::Error;

use crate::asset::{ResourceType, ServiceKind};

/// Main error type for engine operations
#[derive(Debug, Error)]
pub enum ArgusError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("Output error: {0}")]
    OutputError(String),

    #[error("Inventory error: {0}")]
    InventoryError(String),
}

/// Errors raised while validating a delegated-access connection
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConnectionError {
    #[error("Malformed role reference '{0}': expected arn:aws:iam::<12-digit account>:role/<name>")]
    MalformedRoleReference(String),

    #[error("Malformed external id: {0}")]
    MalformedExternalId(String),

    #[error("Role assumption failed: {0}")]
    ProbeFailed(String),

    #[error("Connection probe timed out after {}ms", .0.as_millis())]
    Timeout(Duration),

    #[error("Account mismatch: role belongs to {expected} but credentials resolved to {actual}")]
    AccountMismatch { expected: String, actual: String },
}

/// Errors returned by a provider client for a single (region, service) fetch
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProviderError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Access denied: {0}")]
    AccessDenied(String),

    #[error("Request throttled")]
    Throttled,

    #[error("Service {service} is not available in {region}")]
    Unsupported { service: ServiceKind, region: String },

    #[error("Malformed provider response: {0}")]
    MalformedResponse(String),
}

/// Errors raised while turning a raw descriptor into an asset
#[derive(Debug, Error)]
pub enum NormalizeError {
    #[error("Malformed {resource_type} descriptor: {source}")]
    MalformedDescriptor {
        resource_type: ResourceType,
        #[source]
        source: serde_json::Error,
    },

    #[error("{resource_type} descriptor is missing its identifier")]
    MissingIdentifier { resource_type: ResourceType },

    #[error("No normalizer registered for {0}")]
    UnsupportedResourceType(ResourceType),
}
