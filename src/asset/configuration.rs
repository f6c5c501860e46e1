//! Per-kind configuration attributes
//!
//! Each variant is owned by the normalizer for that resource kind and can grow
//! independently of the others.

use serde::{Deserialize, Serialize};

use super::ResourceType;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum ResourceConfiguration {
    ComputeInstance(ComputeInstanceConfig),
    ObjectBucket(ObjectBucketConfig),
    ManagedDatabase(ManagedDatabaseConfig),
    VirtualNetwork(VirtualNetworkConfig),
    IdentityRole(IdentityRoleConfig),
    Function(FunctionConfig),
    Cluster(ClusterConfig),
    KvTable(KvTableConfig),
    EncryptionKey(EncryptionKeyConfig),
    BlockVolume(BlockVolumeConfig),
    LoadBalancer(LoadBalancerConfig),
}

impl ResourceConfiguration {
    pub fn resource_type(&self) -> ResourceType {
        match self {
            ResourceConfiguration::ComputeInstance(_) => ResourceType::ComputeInstance,
            ResourceConfiguration::ObjectBucket(_) => ResourceType::ObjectBucket,
            ResourceConfiguration::ManagedDatabase(_) => ResourceType::ManagedDatabase,
            ResourceConfiguration::VirtualNetwork(_) => ResourceType::VirtualNetwork,
            ResourceConfiguration::IdentityRole(_) => ResourceType::IdentityRole,
            ResourceConfiguration::Function(_) => ResourceType::Function,
            ResourceConfiguration::Cluster(_) => ResourceType::Cluster,
            ResourceConfiguration::KvTable(_) => ResourceType::KvTable,
            ResourceConfiguration::EncryptionKey(_) => ResourceType::EncryptionKey,
            ResourceConfiguration::BlockVolume(_) => ResourceType::BlockVolume,
            ResourceConfiguration::LoadBalancer(_) => ResourceType::LoadBalancer,
        }
    }

    /// Whether data at rest is encrypted, for kinds where that is meaningful
    pub fn encrypted(&self) -> Option<bool> {
        match self {
            ResourceConfiguration::ObjectBucket(c) => Some(c.encryption.is_some()),
            ResourceConfiguration::ManagedDatabase(c) => Some(c.storage_encrypted),
            ResourceConfiguration::Cluster(c) => Some(c.secrets_encrypted),
            ResourceConfiguration::KvTable(c) => Some(c.encryption_type.is_some()),
            ResourceConfiguration::BlockVolume(c) => Some(c.encrypted),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ComputeInstanceConfig {
    pub instance_type: Option<String>,
    pub state: Option<String>,
    pub image_id: Option<String>,
    pub platform: Option<String>,
    pub private_ip: Option<String>,
    pub public_ip: Option<String>,
    pub launch_time: Option<String>,
    pub ebs_optimized: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ObjectBucketConfig {
    pub creation_date: Option<String>,
    /// Default server-side encryption algorithm, `None` when unencrypted
    pub encryption: Option<String>,
    pub kms_key_id: Option<String>,
    pub versioning: Option<String>,
    pub public_access_blocked: bool,
    pub policy_is_public: bool,
    pub public_acl_grants: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ManagedDatabaseConfig {
    pub engine: Option<String>,
    pub engine_version: Option<String>,
    pub instance_class: Option<String>,
    pub status: Option<String>,
    pub storage_encrypted: bool,
    pub multi_az: bool,
    pub endpoint: Option<String>,
    pub port: Option<u16>,
    pub allocated_storage_gib: Option<i64>,
    pub backup_retention_days: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VirtualNetworkConfig {
    pub cidr_block: Option<String>,
    pub is_default: bool,
    pub state: Option<String>,
    pub internet_gateways: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IdentityRoleConfig {
    pub role_id: Option<String>,
    pub path: Option<String>,
    pub create_date: Option<String>,
    pub max_session_duration: Option<i64>,
    pub trusted_principals: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FunctionConfig {
    pub runtime: Option<String>,
    pub handler: Option<String>,
    pub memory_mb: Option<i64>,
    pub timeout_seconds: Option<i64>,
    pub role_arn: Option<String>,
    pub function_url: Option<String>,
    pub url_auth_type: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterConfig {
    pub version: Option<String>,
    pub status: Option<String>,
    pub endpoint: Option<String>,
    pub endpoint_public_access: bool,
    pub endpoint_private_access: bool,
    pub public_access_cidrs: Vec<String>,
    pub secrets_encrypted: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KvTableConfig {
    pub status: Option<String>,
    pub item_count: Option<i64>,
    pub size_bytes: Option<i64>,
    pub billing_mode: Option<String>,
    pub encryption_type: Option<String>,
    pub kms_key_arn: Option<String>,
    pub stream_enabled: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EncryptionKeyConfig {
    pub key_state: Option<String>,
    pub key_manager: Option<String>,
    pub key_spec: Option<String>,
    pub key_usage: Option<String>,
    pub description: Option<String>,
    pub rotation_enabled: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BlockVolumeConfig {
    pub size_gib: Option<i64>,
    pub volume_type: Option<String>,
    pub state: Option<String>,
    pub encrypted: bool,
    pub kms_key_id: Option<String>,
    pub iops: Option<i64>,
    pub availability_zone: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoadBalancerConfig {
    pub dns_name: Option<String>,
    pub scheme: Option<String>,
    pub load_balancer_type: Option<String>,
    pub state: Option<String>,
    pub listeners: Vec<ListenerConfig>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ListenerConfig {
    pub port: u16,
    pub protocol: String,
}
