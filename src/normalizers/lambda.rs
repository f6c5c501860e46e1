//! Lambda functions

use serde::Deserialize;

use super::{require_id, Normalizer, TagSet};
use crate::asset::{Asset, FunctionConfig, Relationship, ResourceConfiguration, ResourceType, ScanContext};
use crate::error::NormalizeError;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct FunctionDescriptor {
    pub function_name: String,
    pub function_arn: Option<String>,
    pub runtime: Option<String>,
    pub handler: Option<String>,
    pub memory_size: Option<i64>,
    pub timeout: Option<i64>,
    pub role: Option<String>,
    pub vpc_config: Option<FunctionVpcConfig>,
    pub function_url_config: Option<FunctionUrlConfig>,
    #[serde(default)]
    pub tags: TagSet,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct FunctionVpcConfig {
    pub vpc_id: Option<String>,
    #[serde(default)]
    pub subnet_ids: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct FunctionUrlConfig {
    pub function_url: String,
    pub auth_type: String,
}

pub struct FunctionNormalizer;

impl Normalizer for FunctionNormalizer {
    type Descriptor = FunctionDescriptor;

    fn resource_type(&self) -> ResourceType {
        ResourceType::Function
    }

    /// Function URL callable without IAM auth
    fn compute_exposure(&self, descriptor: &FunctionDescriptor) -> bool {
        descriptor
            .function_url_config
            .as_ref()
            .map(|url| url.auth_type.eq_ignore_ascii_case("NONE"))
            .unwrap_or(false)
    }

    fn normalize(&self, descriptor: FunctionDescriptor, ctx: &ScanContext) -> Result<Vec<Asset>, NormalizeError> {
        require_id(&descriptor.function_name, ResourceType::Function)?;

        let exposed = self.compute_exposure(&descriptor);
        let name = descriptor.function_name.clone();
        let arn = descriptor
            .function_arn
            .clone()
            .unwrap_or_else(|| ctx.arn("lambda", &format!("function:{}", name)));

        let mut relationships = Vec::new();
        if let Some(role) = &descriptor.role {
            relationships.push(Relationship::new("assumes_role", role.clone(), ResourceType::IdentityRole));
        }
        if let Some(vpc) = descriptor.vpc_config.as_ref().and_then(|v| v.vpc_id.as_ref()) {
            if !vpc.is_empty() {
                relationships.push(Relationship::new("in_vpc", ctx.arn("ec2", &format!("vpc/{}", vpc)), ResourceType::VirtualNetwork));
            }
        }

        let (function_url, url_auth_type) = match descriptor.function_url_config {
            Some(url) => (Some(url.function_url), Some(url.auth_type)),
            None => (None, None),
        };
        let config = FunctionConfig {
            runtime: descriptor.runtime,
            handler: descriptor.handler,
            memory_mb: descriptor.memory_size,
            timeout_seconds: descriptor.timeout,
            role_arn: descriptor.role,
            function_url,
            url_auth_type,
        };

        Ok(vec![Asset::new(ctx, name.clone(), arn, name, ResourceConfiguration::Function(config))
            .with_tags(descriptor.tags.into_map())
            .with_relationships(relationships)
            .with_exposure(exposed)])
    }
}
