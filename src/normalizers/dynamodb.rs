//! DynamoDB tables

use serde::Deserialize;
use serde_json::Value;

use super::{policy, require_id, Normalizer, TagSet};
use crate::asset::{Asset, KvTableConfig, Relationship, ResourceConfiguration, ResourceType, ScanContext};
use crate::error::NormalizeError;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TableDescriptor {
    pub table_name: String,
    pub table_arn: Option<String>,
    pub table_status: Option<String>,
    pub item_count: Option<i64>,
    pub table_size_bytes: Option<i64>,
    pub billing_mode_summary: Option<BillingModeSummary>,
    #[serde(rename = "SSEDescription")]
    pub sse_description: Option<SseDescription>,
    pub stream_specification: Option<StreamSpecification>,
    /// Resource-based policy attached to the table, if any
    #[serde(default)]
    pub resource_policy: Value,
    #[serde(default)]
    pub tags: TagSet,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct BillingModeSummary {
    pub billing_mode: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SseDescription {
    #[serde(rename = "Status")]
    pub status: Option<String>,
    #[serde(rename = "SSEType")]
    pub sse_type: Option<String>,
    #[serde(rename = "KMSMasterKeyArn")]
    pub kms_master_key_arn: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct StreamSpecification {
    #[serde(default)]
    pub stream_enabled: bool,
}

pub struct KvTableNormalizer;

impl Normalizer for KvTableNormalizer {
    type Descriptor = TableDescriptor;

    fn resource_type(&self) -> ResourceType {
        ResourceType::KvTable
    }

    /// Tables have no network endpoint of their own; only a public resource policy exposes one
    fn compute_exposure(&self, descriptor: &TableDescriptor) -> bool {
        policy::grants_anonymous_access(&descriptor.resource_policy)
    }

    fn normalize(&self, descriptor: TableDescriptor, ctx: &ScanContext) -> Result<Vec<Asset>, NormalizeError> {
        require_id(&descriptor.table_name, ResourceType::KvTable)?;

        let exposed = self.compute_exposure(&descriptor);
        let name = descriptor.table_name.clone();
        let arn = descriptor
            .table_arn
            .clone()
            .unwrap_or_else(|| ctx.arn("dynamodb", &format!("table/{}", name)));

        let sse = descriptor
            .sse_description
            .filter(|s| s.status.as_deref().map(|st| st.eq_ignore_ascii_case("ENABLED")).unwrap_or(true));
        let kms_key_arn = sse.as_ref().and_then(|s| s.kms_master_key_arn.clone());
        let relationships: Vec<Relationship> = kms_key_arn
            .iter()
            .map(|key| Relationship::new("encrypted_by", key.clone(), ResourceType::EncryptionKey))
            .collect();

        let config = KvTableConfig {
            status: descriptor.table_status,
            item_count: descriptor.item_count,
            size_bytes: descriptor.table_size_bytes,
            billing_mode: descriptor.billing_mode_summary.map(|b| b.billing_mode),
            encryption_type: sse.and_then(|s| s.sse_type),
            kms_key_arn,
            stream_enabled: descriptor.stream_specification.map(|s| s.stream_enabled).unwrap_or(false),
        };

        Ok(vec![Asset::new(ctx, name.clone(), arn, name, ResourceConfiguration::KvTable(config))
            .with_tags(descriptor.tags.into_map())
            .with_relationships(relationships)
            .with_exposure(exposed)])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalizers::RawNormalizer;
    use serde_json::json;

    #[test]
    fn test_kms_encrypted_table_fixture() {
        let ctx = ScanContext::new("111122223333", "us-east-1");
        let raw = json!({
            "TableName": "sessions",
            "TableArn": "arn:aws:dynamodb:us-east-1:111122223333:table/sessions",
            "TableStatus": "ACTIVE",
            "ItemCount": 42,
            "BillingModeSummary": {"BillingMode": "PAY_PER_REQUEST"},
            "SSEDescription": {"Status": "ENABLED", "SSEType": "KMS", "KMSMasterKeyArn": "arn:aws:kms:us-east-1:111122223333:key/k"},
            "Tags": [{"Key": "Sensitivity", "Value": "PII"}]
        });
        let asset = &KvTableNormalizer.normalize_raw(raw, &ctx).unwrap()[0];
        assert!(!asset.internet_exposed);
        assert_eq!(asset.relationships.len(), 1);
        match &asset.configuration {
            ResourceConfiguration::KvTable(c) => {
                assert_eq!(c.encryption_type.as_deref(), Some("KMS"));
                assert_eq!(c.billing_mode.as_deref(), Some("PAY_PER_REQUEST"));
                assert_eq!(c.item_count, Some(42));
            }
            other => panic!("unexpected configuration {:?}", other),
        }
    }

    #[test]
    fn test_public_resource_policy_exposes_table() {
        let d: TableDescriptor = serde_json::from_value(json!({
            "TableName": "t",
            "ResourcePolicy": {"Statement": [{"Effect": "Allow", "Principal": "*", "Action": "dynamodb:GetItem"}]}
        }))
        .unwrap();
        assert!(KvTableNormalizer.compute_exposure(&d));
    }
}
