//! Provider client seam
//!
//! The engine never talks to a cloud SDK directly. A [`ResourceProvider`]
//! returns raw descriptors for one (account, region, service) cell and an
//! [`IdentityProbe`] performs the role assumption used to validate a
//! connection. [`mock`] ships fixture-driven implementations of both.

pub mod mock;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::asset::{ResourceType, ServiceKind};
use crate::connection::RoleReference;
use crate::error::ProviderError;

pub use mock::{MockProvider, StaticIdentityProbe};

/// One untyped resource descriptor as returned by a provider API
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawResource {
    pub resource_type: ResourceType,
    pub descriptor: Value,
}

impl RawResource {
    pub fn new(resource_type: ResourceType, descriptor: Value) -> Self {
        Self {
            resource_type,
            descriptor,
        }
    }
}

/// Lists resources for a single discovery cell
#[async_trait]
pub trait ResourceProvider: Send + Sync {
    /// `region` is [`crate::asset::GLOBAL_REGION`] for account-wide services
    async fn fetch(
        &self,
        account_id: &str,
        region: &str,
        service: ServiceKind,
    ) -> Result<Vec<RawResource>, ProviderError>;
}

/// Identity resolved after assuming a role
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallerIdentity {
    pub account_id: String,
    /// Assumed-role session ARN
    pub arn: String,
    #[serde(default)]
    pub accessible_regions: Vec<String>,
}

/// Assumes a delegated-access role and reports who we became
#[async_trait]
pub trait IdentityProbe: Send + Sync {
    async fn assume_role(&self, role: &RoleReference, external_id: &str) -> Result<CallerIdentity, ProviderError>;
}
