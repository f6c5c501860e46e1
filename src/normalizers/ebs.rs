//! EBS volumes

use serde::Deserialize;

use super::{require_id, Normalizer, TagSet};
use crate::asset::{Asset, BlockVolumeConfig, Relationship, ResourceConfiguration, ResourceType, ScanContext};
use crate::error::NormalizeError;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct VolumeDescriptor {
    pub volume_id: String,
    pub size: Option<i64>,
    pub volume_type: Option<String>,
    pub state: Option<String>,
    #[serde(default)]
    pub encrypted: bool,
    pub kms_key_id: Option<String>,
    pub iops: Option<i64>,
    pub availability_zone: Option<String>,
    #[serde(default)]
    pub attachments: Vec<VolumeAttachment>,
    #[serde(default)]
    pub tags: TagSet,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct VolumeAttachment {
    pub instance_id: String,
    pub device: Option<String>,
    pub state: Option<String>,
}

pub struct BlockVolumeNormalizer;

impl Normalizer for BlockVolumeNormalizer {
    type Descriptor = VolumeDescriptor;

    fn resource_type(&self) -> ResourceType {
        ResourceType::BlockVolume
    }

    /// Volumes are only reachable through the instance they are attached to
    fn compute_exposure(&self, _descriptor: &VolumeDescriptor) -> bool {
        false
    }

    fn normalize(&self, descriptor: VolumeDescriptor, ctx: &ScanContext) -> Result<Vec<Asset>, NormalizeError> {
        require_id(&descriptor.volume_id, ResourceType::BlockVolume)?;

        let exposed = self.compute_exposure(&descriptor);
        let id = descriptor.volume_id.clone();
        let arn = ctx.arn("ec2", &format!("volume/{}", id));
        let name = descriptor.tags.name().unwrap_or_else(|| id.clone());

        let mut relationships: Vec<Relationship> = descriptor
            .attachments
            .iter()
            .map(|a| {
                Relationship::new(
                    "attached_to",
                    ctx.arn("ec2", &format!("instance/{}", a.instance_id)),
                    ResourceType::ComputeInstance,
                )
            })
            .collect();
        if let Some(key) = &descriptor.kms_key_id {
            relationships.push(Relationship::new("encrypted_by", key.clone(), ResourceType::EncryptionKey));
        }

        let config = BlockVolumeConfig {
            size_gib: descriptor.size,
            volume_type: descriptor.volume_type,
            state: descriptor.state,
            encrypted: descriptor.encrypted,
            kms_key_id: descriptor.kms_key_id,
            iops: descriptor.iops,
            availability_zone: descriptor.availability_zone,
        };

        Ok(vec![Asset::new(ctx, id, arn, name, ResourceConfiguration::BlockVolume(config))
            .with_tags(descriptor.tags.into_map())
            .with_relationships(relationships)
            .with_exposure(exposed)])
    }
}
