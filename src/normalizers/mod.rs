//! Resource normalizers
//!
//! One normalizer per resource kind. Each owns a typed descriptor matching the
//! provider API shape and decides for itself what "internet exposed" means for
//! that kind. Normalizers are pure: no I/O and no shared state.

pub mod dynamodb;
pub mod ebs;
pub mod ec2;
pub mod eks;
pub mod elb;
pub mod iam;
pub mod kms;
pub mod lambda;
pub mod policy;
pub mod rds;
pub mod s3;
pub mod vpc;

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

use crate::asset::{Asset, ResourceType, ScanContext};
use crate::error::NormalizeError;

pub use dynamodb::KvTableNormalizer;
pub use ebs::BlockVolumeNormalizer;
pub use ec2::ComputeInstanceNormalizer;
pub use eks::ClusterNormalizer;
pub use elb::LoadBalancerNormalizer;
pub use iam::IdentityRoleNormalizer;
pub use kms::EncryptionKeyNormalizer;
pub use lambda::FunctionNormalizer;
pub use rds::ManagedDatabaseNormalizer;
pub use s3::ObjectBucketNormalizer;
pub use vpc::VirtualNetworkNormalizer;

/// Typed normalizer for one resource kind
pub trait Normalizer: Send + Sync {
    /// Provider-specific descriptor shape
    type Descriptor: DeserializeOwned;

    fn resource_type(&self) -> ResourceType;

    /// Kind-specific exposure signal
    fn compute_exposure(&self, descriptor: &Self::Descriptor) -> bool;

    /// Map a descriptor to zero or more assets
    fn normalize(&self, descriptor: Self::Descriptor, ctx: &ScanContext) -> Result<Vec<Asset>, NormalizeError>;
}

/// Object-safe view of a [`Normalizer`] working on untyped descriptors
pub trait RawNormalizer: Send + Sync {
    fn kind(&self) -> ResourceType;

    fn normalize_raw(&self, raw: Value, ctx: &ScanContext) -> Result<Vec<Asset>, NormalizeError>;
}

impl<N: Normalizer> RawNormalizer for N {
    fn kind(&self) -> ResourceType {
        self.resource_type()
    }

    fn normalize_raw(&self, raw: Value, ctx: &ScanContext) -> Result<Vec<Asset>, NormalizeError> {
        let descriptor: N::Descriptor = serde_json::from_value(raw).map_err(|source| {
            NormalizeError::MalformedDescriptor {
                resource_type: self.resource_type(),
                source,
            }
        })?;
        self.normalize(descriptor, ctx)
    }
}

/// Lookup table from resource kind to its normalizer
#[derive(Clone)]
pub struct NormalizerRegistry {
    normalizers: HashMap<ResourceType, Arc<dyn RawNormalizer>>,
}

impl NormalizerRegistry {
    /// An empty registry
    pub fn empty() -> Self {
        Self {
            normalizers: HashMap::new(),
        }
    }

    /// Registry with a normalizer for every known resource kind
    pub fn standard() -> Self {
        let mut registry = Self::empty();
        registry.register(ComputeInstanceNormalizer);
        registry.register(BlockVolumeNormalizer);
        registry.register(ObjectBucketNormalizer);
        registry.register(ManagedDatabaseNormalizer);
        registry.register(VirtualNetworkNormalizer);
        registry.register(IdentityRoleNormalizer);
        registry.register(FunctionNormalizer);
        registry.register(ClusterNormalizer);
        registry.register(KvTableNormalizer);
        registry.register(EncryptionKeyNormalizer);
        registry.register(LoadBalancerNormalizer);
        registry
    }

    /// Register a normalizer, replacing any previous one for the same kind
    pub fn register<N: RawNormalizer + 'static>(&mut self, normalizer: N) {
        self.normalizers.insert(normalizer.kind(), Arc::new(normalizer));
    }

    pub fn get(&self, resource_type: ResourceType) -> Option<&Arc<dyn RawNormalizer>> {
        self.normalizers.get(&resource_type)
    }

    pub fn supports(&self, resource_type: ResourceType) -> bool {
        self.normalizers.contains_key(&resource_type)
    }

    pub fn normalize(
        &self,
        resource_type: ResourceType,
        raw: Value,
        ctx: &ScanContext,
    ) -> Result<Vec<Asset>, NormalizeError> {
        let normalizer = self
            .get(resource_type)
            .ok_or(NormalizeError::UnsupportedResourceType(resource_type))?;
        normalizer.normalize_raw(raw, ctx)
    }
}

impl Default for NormalizerRegistry {
    fn default() -> Self {
        Self::standard()
    }
}

/// Key/value tag as returned by most provider APIs (`Key`/`Value`, or `TagKey`/`TagValue` for KMS)
#[derive(Debug, Clone, Deserialize)]
pub struct Tag {
    #[serde(rename = "Key", alias = "TagKey")]
    pub key: String,
    #[serde(rename = "Value", alias = "TagValue", default)]
    pub value: String,
}

/// Tags arrive either as a list of pairs or as a plain map depending on the service
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum TagSet {
    List(Vec<Tag>),
    Map(HashMap<String, String>),
}

impl Default for TagSet {
    fn default() -> Self {
        TagSet::List(Vec::new())
    }
}

impl TagSet {
    pub fn into_map(self) -> HashMap<String, String> {
        match self {
            TagSet::List(tags) => tags.into_iter().map(|t| (t.key, t.value)).collect(),
            TagSet::Map(map) => map,
        }
    }

    /// `Name` tag, the console display name for many kinds
    pub fn name(&self) -> Option<String> {
        match self {
            TagSet::List(tags) => tags.iter().find(|t| t.key == "Name").map(|t| t.value.clone()),
            TagSet::Map(map) => map.get("Name").cloned(),
        }
        .filter(|v| !v.trim().is_empty())
    }
}

/// Reject descriptors whose identifier is blank
pub(crate) fn require_id(id: &str, resource_type: ResourceType) -> Result<(), NormalizeError> {
    if id.trim().is_empty() {
        Err(NormalizeError::MissingIdentifier { resource_type })
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_standard_registry_covers_all_kinds() {
        let registry = NormalizerRegistry::standard();
        for service in crate::asset::ServiceKind::ALL {
            for rt in service.resource_types() {
                assert!(registry.supports(*rt), "missing normalizer for {}", rt);
            }
        }
    }

    #[test]
    fn test_unregistered_kind_is_reported() {
        let registry = NormalizerRegistry::empty();
        let ctx = ScanContext::new("123456789012", "us-east-1");
        let err = registry
            .normalize(ResourceType::Cluster, json!({}), &ctx)
            .unwrap_err();
        assert!(matches!(err, NormalizeError::UnsupportedResourceType(ResourceType::Cluster)));
    }

    #[test]
    fn test_malformed_descriptor_is_reported() {
        let registry = NormalizerRegistry::standard();
        let ctx = ScanContext::new("123456789012", "us-east-1");
        let err = registry
            .normalize(ResourceType::BlockVolume, json!({"Size": "huge"}), &ctx)
            .unwrap_err();
        assert!(matches!(
            err,
            NormalizeError::MalformedDescriptor { resource_type: ResourceType::BlockVolume, .. }
        ));
    }

    #[test]
    fn test_tag_set_shapes() {
        let list: TagSet = serde_json::from_value(json!([
            {"Key": "Name", "Value": "web"},
            {"Key": "Team", "Value": "core"}
        ]))
        .unwrap();
        assert_eq!(list.name().as_deref(), Some("web"));
        assert_eq!(list.into_map().get("Team").map(String::as_str), Some("core"));

        let kms: TagSet = serde_json::from_value(json!([{"TagKey": "env", "TagValue": "prod"}])).unwrap();
        assert_eq!(kms.into_map().get("env").map(String::as_str), Some("prod"));

        let map: TagSet = serde_json::from_value(json!({"Owner": "data"})).unwrap();
        assert_eq!(map.into_map().get("Owner").map(String::as_str), Some("data"));
    }
}
