//! RDS database instances

use serde::Deserialize;

use super::{require_id, Normalizer, TagSet};
use crate::asset::{Asset, ManagedDatabaseConfig, Relationship, ResourceConfiguration, ResourceType, ScanContext};
use crate::error::NormalizeError;

#[derive(Debug, Clone, Deserialize)]
pub struct DbInstanceDescriptor {
    #[serde(rename = "DBInstanceIdentifier")]
    pub db_instance_identifier: String,
    #[serde(rename = "DBInstanceArn")]
    pub db_instance_arn: Option<String>,
    #[serde(rename = "DBInstanceClass")]
    pub db_instance_class: Option<String>,
    #[serde(rename = "DBInstanceStatus")]
    pub db_instance_status: Option<String>,
    #[serde(rename = "Engine")]
    pub engine: Option<String>,
    #[serde(rename = "EngineVersion")]
    pub engine_version: Option<String>,
    #[serde(rename = "PubliclyAccessible", default)]
    pub publicly_accessible: bool,
    #[serde(rename = "StorageEncrypted", default)]
    pub storage_encrypted: bool,
    #[serde(rename = "KmsKeyId")]
    pub kms_key_id: Option<String>,
    #[serde(rename = "MultiAZ", default)]
    pub multi_az: bool,
    #[serde(rename = "AllocatedStorage")]
    pub allocated_storage: Option<i64>,
    #[serde(rename = "BackupRetentionPeriod")]
    pub backup_retention_period: Option<i64>,
    #[serde(rename = "Endpoint")]
    pub endpoint: Option<DbEndpoint>,
    #[serde(rename = "DBSubnetGroup")]
    pub db_subnet_group: Option<DbSubnetGroup>,
    #[serde(rename = "TagList", default)]
    pub tag_list: TagSet,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DbEndpoint {
    pub address: Option<String>,
    pub port: Option<u16>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DbSubnetGroup {
    pub vpc_id: Option<String>,
}

pub struct ManagedDatabaseNormalizer;

impl Normalizer for ManagedDatabaseNormalizer {
    type Descriptor = DbInstanceDescriptor;

    fn resource_type(&self) -> ResourceType {
        ResourceType::ManagedDatabase
    }

    fn compute_exposure(&self, descriptor: &DbInstanceDescriptor) -> bool {
        descriptor.publicly_accessible
    }

    fn normalize(&self, descriptor: DbInstanceDescriptor, ctx: &ScanContext) -> Result<Vec<Asset>, NormalizeError> {
        require_id(&descriptor.db_instance_identifier, ResourceType::ManagedDatabase)?;

        let exposed = self.compute_exposure(&descriptor);
        let id = descriptor.db_instance_identifier.clone();
        let arn = descriptor
            .db_instance_arn
            .clone()
            .unwrap_or_else(|| ctx.arn("rds", &format!("db:{}", id)));

        let mut relationships = Vec::new();
        if let Some(vpc) = descriptor.db_subnet_group.as_ref().and_then(|g| g.vpc_id.as_ref()) {
            relationships.push(Relationship::new("in_vpc", ctx.arn("ec2", &format!("vpc/{}", vpc)), ResourceType::VirtualNetwork));
        }
        if let Some(key) = &descriptor.kms_key_id {
            relationships.push(Relationship::new("encrypted_by", key.clone(), ResourceType::EncryptionKey));
        }

        let (endpoint, port) = match descriptor.endpoint {
            Some(e) => (e.address, e.port),
            None => (None, None),
        };
        let config = ManagedDatabaseConfig {
            engine: descriptor.engine,
            engine_version: descriptor.engine_version,
            instance_class: descriptor.db_instance_class,
            status: descriptor.db_instance_status,
            storage_encrypted: descriptor.storage_encrypted,
            multi_az: descriptor.multi_az,
            endpoint,
            port,
            allocated_storage_gib: descriptor.allocated_storage,
            backup_retention_days: descriptor.backup_retention_period,
        };

        Ok(vec![Asset::new(ctx, id.clone(), arn, id, ResourceConfiguration::ManagedDatabase(config))
            .with_tags(descriptor.tag_list.into_map())
            .with_relationships(relationships)
            .with_exposure(exposed)])
    }
}
