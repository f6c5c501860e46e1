//! EC2 instances

use serde::Deserialize;

use super::{require_id, Normalizer, TagSet};
use crate::asset::{Asset, ComputeInstanceConfig, Relationship, ResourceConfiguration, ResourceType, ScanContext};
use crate::error::NormalizeError;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct InstanceDescriptor {
    pub instance_id: String,
    pub instance_type: Option<String>,
    pub image_id: Option<String>,
    pub state: Option<InstanceState>,
    pub platform_details: Option<String>,
    pub private_ip_address: Option<String>,
    pub public_ip_address: Option<String>,
    pub vpc_id: Option<String>,
    pub subnet_id: Option<String>,
    pub launch_time: Option<String>,
    pub ebs_optimized: Option<bool>,
    pub iam_instance_profile: Option<InstanceProfile>,
    #[serde(default)]
    pub security_groups: Vec<GroupIdentifier>,
    #[serde(default)]
    pub tags: TagSet,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct InstanceState {
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct InstanceProfile {
    pub arn: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct GroupIdentifier {
    pub group_id: String,
    pub group_name: Option<String>,
}

pub struct ComputeInstanceNormalizer;

impl ComputeInstanceNormalizer {
    fn state(descriptor: &InstanceDescriptor) -> Option<&str> {
        descriptor.state.as_ref().map(|s| s.name.as_str())
    }
}

impl Normalizer for ComputeInstanceNormalizer {
    type Descriptor = InstanceDescriptor;

    fn resource_type(&self) -> ResourceType {
        ResourceType::ComputeInstance
    }

    /// A public IPv4 address on an instance that still exists
    fn compute_exposure(&self, descriptor: &InstanceDescriptor) -> bool {
        let has_public_ip = descriptor
            .public_ip_address
            .as_deref()
            .map(|ip| !ip.trim().is_empty())
            .unwrap_or(false);
        has_public_ip && !matches!(Self::state(descriptor), Some("terminated"))
    }

    fn normalize(&self, descriptor: InstanceDescriptor, ctx: &ScanContext) -> Result<Vec<Asset>, NormalizeError> {
        require_id(&descriptor.instance_id, ResourceType::ComputeInstance)?;

        let exposed = self.compute_exposure(&descriptor);
        let id = descriptor.instance_id.clone();
        let arn = ctx.arn("ec2", &format!("instance/{}", id));
        let name = descriptor.tags.name().unwrap_or_else(|| id.clone());

        let mut relationships = Vec::new();
        if let Some(vpc) = &descriptor.vpc_id {
            relationships.push(Relationship::new("in_vpc", ctx.arn("ec2", &format!("vpc/{}", vpc)), ResourceType::VirtualNetwork));
        }
        if let Some(subnet) = &descriptor.subnet_id {
            relationships.push(Relationship::new("in_subnet", ctx.arn("ec2", &format!("subnet/{}", subnet)), ResourceType::VirtualNetwork));
        }
        for group in &descriptor.security_groups {
            relationships.push(Relationship::new(
                "uses_security_group",
                ctx.arn("ec2", &format!("security-group/{}", group.group_id)),
                ResourceType::VirtualNetwork,
            ));
        }
        if let Some(profile) = &descriptor.iam_instance_profile {
            relationships.push(Relationship::new("has_instance_profile", profile.arn.clone(), ResourceType::IdentityRole));
        }

        let config = ComputeInstanceConfig {
            instance_type: descriptor.instance_type,
            state: descriptor.state.map(|s| s.name),
            image_id: descriptor.image_id,
            platform: descriptor.platform_details,
            private_ip: descriptor.private_ip_address,
            public_ip: descriptor.public_ip_address,
            launch_time: descriptor.launch_time,
            ebs_optimized: descriptor.ebs_optimized,
        };

        let asset = Asset::new(ctx, id, arn, name, ResourceConfiguration::ComputeInstance(config))
            .with_tags(descriptor.tags.into_map())
            .with_relationships(relationships)
            .with_exposure(exposed);

        Ok(vec![asset])
    }
}
