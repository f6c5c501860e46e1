//! KMS keys

use serde::Deserialize;
use serde_json::Value;

use super::{policy, require_id, Normalizer, TagSet};
use crate::asset::{Asset, EncryptionKeyConfig, ResourceConfiguration, ResourceType, ScanContext};
use crate::error::NormalizeError;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct KeyDescriptor {
    pub key_id: String,
    pub arn: Option<String>,
    pub key_state: Option<String>,
    pub key_manager: Option<String>,
    pub key_spec: Option<String>,
    pub key_usage: Option<String>,
    pub description: Option<String>,
    pub key_rotation_enabled: Option<bool>,
    /// Alias such as `alias/payments`, used as the display name
    pub alias_name: Option<String>,
    #[serde(default)]
    pub policy: Value,
    #[serde(default)]
    pub tags: TagSet,
}

pub struct EncryptionKeyNormalizer;

impl Normalizer for EncryptionKeyNormalizer {
    type Descriptor = KeyDescriptor;

    fn resource_type(&self) -> ResourceType {
        ResourceType::EncryptionKey
    }

    /// Key policy lets any principal use the key
    fn compute_exposure(&self, descriptor: &KeyDescriptor) -> bool {
        policy::grants_anonymous_access(&descriptor.policy)
    }

    fn normalize(&self, descriptor: KeyDescriptor, ctx: &ScanContext) -> Result<Vec<Asset>, NormalizeError> {
        require_id(&descriptor.key_id, ResourceType::EncryptionKey)?;

        let exposed = self.compute_exposure(&descriptor);
        let id = descriptor.key_id.clone();
        let arn = descriptor
            .arn
            .clone()
            .unwrap_or_else(|| ctx.arn("kms", &format!("key/{}", id)));
        let name = descriptor.alias_name.clone().unwrap_or_else(|| id.clone());

        let config = EncryptionKeyConfig {
            key_state: descriptor.key_state,
            key_manager: descriptor.key_manager,
            key_spec: descriptor.key_spec,
            key_usage: descriptor.key_usage,
            description: descriptor.description,
            rotation_enabled: descriptor.key_rotation_enabled,
        };

        Ok(vec![Asset::new(ctx, id, arn, name, ResourceConfiguration::EncryptionKey(config))
            .with_tags(descriptor.tags.into_map())
            .with_exposure(exposed)])
    }
}
