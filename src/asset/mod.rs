//! Canonical inventory records produced by the normalizers

pub mod configuration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

pub use configuration::*;

/// Provider name stamped on every asset
pub const PROVIDER: &str = "aws";

/// Region sentinel for account-wide resources
pub const GLOBAL_REGION: &str = "global";

/// Provider product areas that own resources
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceKind {
    Ec2,
    S3,
    Rds,
    Vpc,
    Iam,
    Lambda,
    Eks,
    #[serde(rename = "dynamodb")]
    DynamoDb,
    Kms,
    Elb,
}

impl ServiceKind {
    /// Canonical service list used when a discovery request names none
    pub const ALL: [ServiceKind; 10] = [
        ServiceKind::Ec2,
        ServiceKind::S3,
        ServiceKind::Rds,
        ServiceKind::Vpc,
        ServiceKind::Iam,
        ServiceKind::Lambda,
        ServiceKind::Eks,
        ServiceKind::DynamoDb,
        ServiceKind::Kms,
        ServiceKind::Elb,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            ServiceKind::Ec2 => "ec2",
            ServiceKind::S3 => "s3",
            ServiceKind::Rds => "rds",
            ServiceKind::Vpc => "vpc",
            ServiceKind::Iam => "iam",
            ServiceKind::Lambda => "lambda",
            ServiceKind::Eks => "eks",
            ServiceKind::DynamoDb => "dynamodb",
            ServiceKind::Kms => "kms",
            ServiceKind::Elb => "elb",
        }
    }

    /// Account-wide services are scanned once per run, not once per region
    pub fn is_global(&self) -> bool {
        matches!(self, ServiceKind::Iam)
    }

    /// Resource kinds a provider may return for this service
    pub fn resource_types(&self) -> &'static [ResourceType] {
        match self {
            ServiceKind::Ec2 => &[ResourceType::ComputeInstance, ResourceType::BlockVolume],
            ServiceKind::S3 => &[ResourceType::ObjectBucket],
            ServiceKind::Rds => &[ResourceType::ManagedDatabase],
            ServiceKind::Vpc => &[ResourceType::VirtualNetwork],
            ServiceKind::Iam => &[ResourceType::IdentityRole],
            ServiceKind::Lambda => &[ResourceType::Function],
            ServiceKind::Eks => &[ResourceType::Cluster],
            ServiceKind::DynamoDb => &[ResourceType::KvTable],
            ServiceKind::Kms => &[ResourceType::EncryptionKey],
            ServiceKind::Elb => &[ResourceType::LoadBalancer],
        }
    }

    /// Parse a comma separated list, ignoring blanks
    pub fn parse_list(s: &str) -> Result<Vec<ServiceKind>, String> {
        s.split(',')
            .map(str::trim)
            .filter(|x| !x.is_empty())
            .map(ServiceKind::from_str)
            .collect()
    }
}

impl fmt::Display for ServiceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ServiceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "ec2" => Ok(ServiceKind::Ec2),
            "s3" => Ok(ServiceKind::S3),
            "rds" => Ok(ServiceKind::Rds),
            "vpc" => Ok(ServiceKind::Vpc),
            "iam" => Ok(ServiceKind::Iam),
            "lambda" => Ok(ServiceKind::Lambda),
            "eks" => Ok(ServiceKind::Eks),
            "dynamodb" => Ok(ServiceKind::DynamoDb),
            "kms" => Ok(ServiceKind::Kms),
            "elb" | "elbv2" => Ok(ServiceKind::Elb),
            other => Err(format!("Unknown service: {}", other)),
        }
    }
}

/// Enumerated resource kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResourceType {
    ComputeInstance,
    ObjectBucket,
    ManagedDatabase,
    VirtualNetwork,
    IdentityRole,
    Function,
    Cluster,
    KvTable,
    EncryptionKey,
    BlockVolume,
    LoadBalancer,
}

impl ResourceType {
    pub fn name(&self) -> &'static str {
        match self {
            ResourceType::ComputeInstance => "compute-instance",
            ResourceType::ObjectBucket => "object-bucket",
            ResourceType::ManagedDatabase => "managed-database",
            ResourceType::VirtualNetwork => "virtual-network",
            ResourceType::IdentityRole => "identity-role",
            ResourceType::Function => "function",
            ResourceType::Cluster => "cluster",
            ResourceType::KvTable => "kv-table",
            ResourceType::EncryptionKey => "encryption-key",
            ResourceType::BlockVolume => "block-volume",
            ResourceType::LoadBalancer => "load-balancer",
        }
    }

    /// Service that owns this kind of resource
    pub fn service(&self) -> ServiceKind {
        match self {
            ResourceType::ComputeInstance | ResourceType::BlockVolume => ServiceKind::Ec2,
            ResourceType::ObjectBucket => ServiceKind::S3,
            ResourceType::ManagedDatabase => ServiceKind::Rds,
            ResourceType::VirtualNetwork => ServiceKind::Vpc,
            ResourceType::IdentityRole => ServiceKind::Iam,
            ResourceType::Function => ServiceKind::Lambda,
            ResourceType::Cluster => ServiceKind::Eks,
            ResourceType::KvTable => ServiceKind::DynamoDb,
            ResourceType::EncryptionKey => ServiceKind::Kms,
            ResourceType::LoadBalancer => ServiceKind::Elb,
        }
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ResourceType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace('_', "-");
        match normalized.as_str() {
            "compute-instance" => Ok(ResourceType::ComputeInstance),
            "object-bucket" => Ok(ResourceType::ObjectBucket),
            "managed-database" => Ok(ResourceType::ManagedDatabase),
            "virtual-network" => Ok(ResourceType::VirtualNetwork),
            "identity-role" => Ok(ResourceType::IdentityRole),
            "function" => Ok(ResourceType::Function),
            "cluster" => Ok(ResourceType::Cluster),
            "kv-table" => Ok(ResourceType::KvTable),
            "encryption-key" => Ok(ResourceType::EncryptionKey),
            "block-volume" => Ok(ResourceType::BlockVolume),
            "load-balancer" => Ok(ResourceType::LoadBalancer),
            other => Err(format!("Unknown resource type: {}", other)),
        }
    }
}

/// Directed edge from one asset to another
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relationship {
    pub relation_type: String,
    pub target_identifier: String,
    pub target_type: ResourceType,
}

impl Relationship {
    pub fn new(relation_type: &str, target_identifier: impl Into<String>, target_type: ResourceType) -> Self {
        Self {
            relation_type: relation_type.to_string(),
            target_identifier: target_identifier.into(),
            target_type,
        }
    }
}

/// Account and region a normalizer is working on
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanContext {
    pub account_id: String,
    pub region: String,
    pub discovered_at: DateTime<Utc>,
}

impl ScanContext {
    pub fn new(account_id: impl Into<String>, region: impl Into<String>) -> Self {
        Self {
            account_id: account_id.into(),
            region: region.into(),
            discovered_at: Utc::now(),
        }
    }

    pub fn with_discovered_at(mut self, discovered_at: DateTime<Utc>) -> Self {
        self.discovered_at = discovered_at;
        self
    }

    /// Build an ARN for a regional resource in this context
    pub fn arn(&self, service: &str, resource: &str) -> String {
        format!("arn:aws:{}:{}:{}:{}", service, self.region, self.account_id, resource)
    }
}

/// Normalized record of one discovered cloud resource
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Asset {
    pub resource_id: String,
    pub resource_arn: String,
    pub resource_type: ResourceType,
    pub resource_name: String,
    pub service: ServiceKind,
    pub provider: String,
    pub account_id: String,
    pub region: String,
    #[serde(default)]
    pub tags: HashMap<String, String>,
    pub configuration: ResourceConfiguration,
    #[serde(default)]
    pub relationships: Vec<Relationship>,
    pub internet_exposed: bool,
    pub discovered_at: DateTime<Utc>,
}

impl Asset {
    /// Create an asset; its type and service follow from the configuration variant
    pub fn new(
        ctx: &ScanContext,
        resource_id: impl Into<String>,
        resource_arn: impl Into<String>,
        resource_name: impl Into<String>,
        configuration: ResourceConfiguration,
    ) -> Self {
        let resource_type = configuration.resource_type();
        Self {
            resource_id: resource_id.into(),
            resource_arn: resource_arn.into(),
            resource_type,
            resource_name: resource_name.into(),
            service: resource_type.service(),
            provider: PROVIDER.to_string(),
            account_id: ctx.account_id.clone(),
            region: ctx.region.clone(),
            tags: HashMap::new(),
            configuration,
            relationships: Vec::new(),
            internet_exposed: false,
            discovered_at: ctx.discovered_at,
        }
    }

    pub fn with_tags(mut self, tags: HashMap<String, String>) -> Self {
        self.tags = tags;
        self
    }

    pub fn with_relationship(mut self, relationship: Relationship) -> Self {
        self.relationships.push(relationship);
        self
    }

    pub fn with_relationships(mut self, relationships: impl IntoIterator<Item = Relationship>) -> Self {
        self.relationships.extend(relationships);
        self
    }

    pub fn with_exposure(mut self, internet_exposed: bool) -> Self {
        self.internet_exposed = internet_exposed;
        self
    }

    /// Pin the region, used for account-wide kinds
    pub fn in_region(mut self, region: &str) -> Self {
        self.region = region.to_string();
        self
    }

    pub fn is_global(&self) -> bool {
        self.region == GLOBAL_REGION
    }

    pub fn tag(&self, key: &str) -> Option<&str> {
        self.tags.get(key).map(String::as_str)
    }

    /// Same resource state, ignoring when it was observed
    pub fn equivalent(&self, other: &Asset) -> bool {
        Asset {
            discovered_at: other.discovered_at,
            ..self.clone()
        } == *other
    }
}
