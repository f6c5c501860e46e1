//! Elastic Load Balancing (v2) load balancers

use serde::Deserialize;

use super::{require_id, Normalizer, TagSet};
use crate::asset::{Asset, ListenerConfig, LoadBalancerConfig, Relationship, ResourceConfiguration, ResourceType, ScanContext};
use crate::error::NormalizeError;

#[derive(Debug, Clone, Deserialize)]
pub struct LoadBalancerDescriptor {
    #[serde(rename = "LoadBalancerName")]
    pub load_balancer_name: String,
    #[serde(rename = "LoadBalancerArn")]
    pub load_balancer_arn: Option<String>,
    #[serde(rename = "DNSName")]
    pub dns_name: Option<String>,
    #[serde(rename = "Scheme")]
    pub scheme: Option<String>,
    #[serde(rename = "Type")]
    pub load_balancer_type: Option<String>,
    #[serde(rename = "State")]
    pub state: Option<LoadBalancerState>,
    #[serde(rename = "VpcId")]
    pub vpc_id: Option<String>,
    #[serde(rename = "SecurityGroups", default)]
    pub security_groups: Vec<String>,
    #[serde(rename = "Listeners", default)]
    pub listeners: Vec<Listener>,
    #[serde(rename = "Tags", default)]
    pub tags: TagSet,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct LoadBalancerState {
    pub code: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Listener {
    pub port: u16,
    pub protocol: String,
}

pub struct LoadBalancerNormalizer;

impl Normalizer for LoadBalancerNormalizer {
    type Descriptor = LoadBalancerDescriptor;

    fn resource_type(&self) -> ResourceType {
        ResourceType::LoadBalancer
    }

    fn compute_exposure(&self, descriptor: &LoadBalancerDescriptor) -> bool {
        descriptor
            .scheme
            .as_deref()
            .map(|s| s.eq_ignore_ascii_case("internet-facing"))
            .unwrap_or(false)
    }

    fn normalize(&self, descriptor: LoadBalancerDescriptor, ctx: &ScanContext) -> Result<Vec<Asset>, NormalizeError> {
        require_id(&descriptor.load_balancer_name, ResourceType::LoadBalancer)?;

        let exposed = self.compute_exposure(&descriptor);
        let name = descriptor.load_balancer_name.clone();
        let arn = descriptor
            .load_balancer_arn
            .clone()
            .unwrap_or_else(|| ctx.arn("elasticloadbalancing", &format!("loadbalancer/{}", name)));

        let mut relationships = Vec::new();
        if let Some(vpc) = &descriptor.vpc_id {
            relationships.push(Relationship::new("in_vpc", ctx.arn("ec2", &format!("vpc/{}", vpc)), ResourceType::VirtualNetwork));
        }
        for group in &descriptor.security_groups {
            relationships.push(Relationship::new(
                "uses_security_group",
                ctx.arn("ec2", &format!("security-group/{}", group)),
                ResourceType::VirtualNetwork,
            ));
        }

        let config = LoadBalancerConfig {
            dns_name: descriptor.dns_name,
            scheme: descriptor.scheme,
            load_balancer_type: descriptor.load_balancer_type,
            state: descriptor.state.map(|s| s.code),
            listeners: descriptor
                .listeners
                .into_iter()
                .map(|l| ListenerConfig { port: l.port, protocol: l.protocol })
                .collect(),
        };

        Ok(vec![Asset::new(ctx, name.clone(), arn, name, ResourceConfiguration::LoadBalancer(config))
            .with_tags(descriptor.tags.into_map())
            .with_relationships(relationships)
            .with_exposure(exposed)])
    }
}
