//! VPCs

use serde::Deserialize;

use super::{require_id, Normalizer, TagSet};
use crate::asset::{Asset, ResourceConfiguration, ResourceType, ScanContext, VirtualNetworkConfig};
use crate::error::NormalizeError;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct VpcDescriptor {
    pub vpc_id: String,
    pub cidr_block: Option<String>,
    pub state: Option<String>,
    #[serde(default)]
    pub is_default: bool,
    /// Internet gateways attached to this VPC, resolved by the provider client
    #[serde(default)]
    pub internet_gateway_ids: Vec<String>,
    #[serde(default)]
    pub tags: TagSet,
}

pub struct VirtualNetworkNormalizer;

impl Normalizer for VirtualNetworkNormalizer {
    type Descriptor = VpcDescriptor;

    fn resource_type(&self) -> ResourceType {
        ResourceType::VirtualNetwork
    }

    /// Routable from the internet once an internet gateway is attached
    fn compute_exposure(&self, descriptor: &VpcDescriptor) -> bool {
        descriptor.internet_gateway_ids.iter().any(|id| !id.trim().is_empty())
    }

    fn normalize(&self, descriptor: VpcDescriptor, ctx: &ScanContext) -> Result<Vec<Asset>, NormalizeError> {
        require_id(&descriptor.vpc_id, ResourceType::VirtualNetwork)?;

        let exposed = self.compute_exposure(&descriptor);
        let id = descriptor.vpc_id.clone();
        let arn = ctx.arn("ec2", &format!("vpc/{}", id));
        let name = descriptor.tags.name().unwrap_or_else(|| id.clone());

        let config = VirtualNetworkConfig {
            cidr_block: descriptor.cidr_block,
            is_default: descriptor.is_default,
            state: descriptor.state,
            internet_gateways: descriptor.internet_gateway_ids,
        };

        Ok(vec![Asset::new(ctx, id, arn, name, ResourceConfiguration::VirtualNetwork(config))
            .with_tags(descriptor.tags.into_map())
            .with_exposure(exposed)])
    }
}
