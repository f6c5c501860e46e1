//! EKS clusters

use ipnetwork::IpNetwork;
use serde::Deserialize;

use super::{require_id, Normalizer, TagSet};
use crate::asset::{Asset, ClusterConfig, Relationship, ResourceConfiguration, ResourceType, ScanContext};
use crate::error::NormalizeError;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterDescriptor {
    pub name: String,
    pub arn: Option<String>,
    pub version: Option<String>,
    pub status: Option<String>,
    pub endpoint: Option<String>,
    pub role_arn: Option<String>,
    pub resources_vpc_config: Option<ClusterVpcConfig>,
    #[serde(default)]
    pub encryption_config: Vec<serde_json::Value>,
    #[serde(default)]
    pub tags: TagSet,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ClusterVpcConfig {
    pub vpc_id: Option<String>,
    pub subnet_ids: Vec<String>,
    pub security_group_ids: Vec<String>,
    pub endpoint_public_access: bool,
    pub endpoint_private_access: bool,
    pub public_access_cidrs: Vec<String>,
}

pub struct ClusterNormalizer;

impl ClusterNormalizer {
    /// `/0` networks admit every address; unparseable entries are ignored
    fn open_to_world(cidrs: &[String]) -> bool {
        cidrs.is_empty()
            || cidrs
                .iter()
                .filter_map(|c| c.parse::<IpNetwork>().ok())
                .any(|net| net.prefix() == 0)
    }
}

impl Normalizer for ClusterNormalizer {
    type Descriptor = ClusterDescriptor;

    fn resource_type(&self) -> ResourceType {
        ResourceType::Cluster
    }

    /// Public API endpoint reachable from any address
    fn compute_exposure(&self, descriptor: &ClusterDescriptor) -> bool {
        descriptor
            .resources_vpc_config
            .as_ref()
            .map(|vpc| vpc.endpoint_public_access && Self::open_to_world(&vpc.public_access_cidrs))
            .unwrap_or(false)
    }

    fn normalize(&self, descriptor: ClusterDescriptor, ctx: &ScanContext) -> Result<Vec<Asset>, NormalizeError> {
        require_id(&descriptor.name, ResourceType::Cluster)?;

        let exposed = self.compute_exposure(&descriptor);
        let name = descriptor.name.clone();
        let arn = descriptor
            .arn
            .clone()
            .unwrap_or_else(|| ctx.arn("eks", &format!("cluster/{}", name)));

        let vpc = descriptor.resources_vpc_config.unwrap_or_default();
        let mut relationships = Vec::new();
        if let Some(vpc_id) = &vpc.vpc_id {
            relationships.push(Relationship::new("in_vpc", ctx.arn("ec2", &format!("vpc/{}", vpc_id)), ResourceType::VirtualNetwork));
        }
        for subnet in &vpc.subnet_ids {
            relationships.push(Relationship::new("in_subnet", ctx.arn("ec2", &format!("subnet/{}", subnet)), ResourceType::VirtualNetwork));
        }
        if let Some(role) = &descriptor.role_arn {
            relationships.push(Relationship::new("assumes_role", role.clone(), ResourceType::IdentityRole));
        }

        let config = ClusterConfig {
            version: descriptor.version,
            status: descriptor.status,
            endpoint: descriptor.endpoint,
            endpoint_public_access: vpc.endpoint_public_access,
            endpoint_private_access: vpc.endpoint_private_access,
            public_access_cidrs: vpc.public_access_cidrs,
            secrets_encrypted: !descriptor.encryption_config.is_empty(),
        };

        Ok(vec![Asset::new(ctx, name.clone(), arn, name, ResourceConfiguration::Cluster(config))
            .with_tags(descriptor.tags.into_map())
            .with_relationships(relationships)
            .with_exposure(exposed)])
    }
}
