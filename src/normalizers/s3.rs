//! S3 buckets
//!
//! Buckets are listed account-wide by the provider but each lives in a home
//! region; the provider client is expected to return a bucket only for the
//! region cell it belongs to.

use serde::Deserialize;

use super::{require_id, Normalizer, TagSet};
use crate::asset::{Asset, ObjectBucketConfig, Relationship, ResourceConfiguration, ResourceType, ScanContext};
use crate::error::NormalizeError;

const ALL_USERS_URI: &str = "http://acs.amazonaws.com/groups/global/AllUsers";
const AUTHENTICATED_USERS_URI: &str = "http://acs.amazonaws.com/groups/global/AuthenticatedUsers";

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct BucketDescriptor {
    pub name: String,
    pub creation_date: Option<String>,
    pub public_access_block: Option<PublicAccessBlock>,
    pub policy_status: Option<PolicyStatus>,
    #[serde(default)]
    pub grants: Vec<Grant>,
    pub encryption: Option<BucketEncryption>,
    pub versioning: Option<String>,
    #[serde(default)]
    pub tags: TagSet,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct PublicAccessBlock {
    pub block_public_acls: bool,
    pub ignore_public_acls: bool,
    pub block_public_policy: bool,
    pub restrict_public_buckets: bool,
}

impl PublicAccessBlock {
    fn neutralises_acls(&self) -> bool {
        self.block_public_acls && self.ignore_public_acls
    }

    fn neutralises_policy(&self) -> bool {
        self.block_public_policy && self.restrict_public_buckets
    }

    fn fully_blocked(&self) -> bool {
        self.neutralises_acls() && self.neutralises_policy()
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PolicyStatus {
    pub is_public: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Grant {
    pub grantee: Grantee,
    pub permission: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Grantee {
    #[serde(rename = "URI")]
    pub uri: Option<String>,
    pub id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BucketEncryption {
    #[serde(rename = "SSEAlgorithm")]
    pub sse_algorithm: String,
    #[serde(rename = "KMSMasterKeyID")]
    pub kms_master_key_id: Option<String>,
}

pub struct ObjectBucketNormalizer;

impl ObjectBucketNormalizer {
    fn public_grants(descriptor: &BucketDescriptor) -> Vec<String> {
        descriptor
            .grants
            .iter()
            .filter(|g| {
                matches!(g.grantee.uri.as_deref(), Some(ALL_USERS_URI) | Some(AUTHENTICATED_USERS_URI))
            })
            .map(|g| g.permission.clone())
            .collect()
    }
}

impl Normalizer for ObjectBucketNormalizer {
    type Descriptor = BucketDescriptor;

    fn resource_type(&self) -> ResourceType {
        ResourceType::ObjectBucket
    }

    /// Public bucket policy, or a public ACL grant, unless the public access block overrides it
    fn compute_exposure(&self, descriptor: &BucketDescriptor) -> bool {
        let block = descriptor.public_access_block.clone().unwrap_or_default();
        let policy_public = descriptor.policy_status.as_ref().map(|p| p.is_public).unwrap_or(false);
        let acl_public = !Self::public_grants(descriptor).is_empty();

        (policy_public && !block.neutralises_policy()) || (acl_public && !block.neutralises_acls())
    }

    fn normalize(&self, descriptor: BucketDescriptor, ctx: &ScanContext) -> Result<Vec<Asset>, NormalizeError> {
        require_id(&descriptor.name, ResourceType::ObjectBucket)?;

        let exposed = self.compute_exposure(&descriptor);
        let public_acl_grants = Self::public_grants(&descriptor);
        let name = descriptor.name.clone();
        let arn = format!("arn:aws:s3:::{}", name);

        let kms_key_id = descriptor.encryption.as_ref().and_then(|e| e.kms_master_key_id.clone());
        let relationships: Vec<Relationship> = kms_key_id
            .iter()
            .map(|key| Relationship::new("encrypted_by", key.clone(), ResourceType::EncryptionKey))
            .collect();

        let config = ObjectBucketConfig {
            creation_date: descriptor.creation_date,
            encryption: descriptor.encryption.map(|e| e.sse_algorithm),
            kms_key_id,
            versioning: descriptor.versioning,
            public_access_blocked: descriptor
                .public_access_block
                .as_ref()
                .map(PublicAccessBlock::fully_blocked)
                .unwrap_or(false),
            policy_is_public: descriptor.policy_status.map(|p| p.is_public).unwrap_or(false),
            public_acl_grants,
        };

        Ok(vec![Asset::new(ctx, name.clone(), arn, name, ResourceConfiguration::ObjectBucket(config))
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

    fn descriptor(value: serde_json::Value) -> BucketDescriptor {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_private_bucket_fixture() {
        let ctx = ScanContext::new("111122223333", "us-east-1");
        let raw = json!({
            "Name": "sample-bucket",
            "CreationDate": "2024-02-01T00:00:00Z",
            "PublicAccessBlock": {
                "BlockPublicAcls": true, "IgnorePublicAcls": true,
                "BlockPublicPolicy": true, "RestrictPublicBuckets": true
            },
            "Encryption": {"SSEAlgorithm": "aws:kms", "KMSMasterKeyID": "arn:aws:kms:us-east-1:111122223333:key/k1"},
            "Tags": [{"Key": "DataClassification", "Value": "confidential"}]
        });

        let assets = ObjectBucketNormalizer.normalize_raw(raw, &ctx).unwrap();
        let asset = &assets[0];
        assert_eq!(asset.resource_arn, "arn:aws:s3:::sample-bucket");
        assert_eq!(asset.resource_id, "sample-bucket");
        assert!(!asset.internet_exposed);
        match &asset.configuration {
            ResourceConfiguration::ObjectBucket(c) => {
                assert!(c.public_access_blocked);
                assert_eq!(c.encryption.as_deref(), Some("aws:kms"));
            }
            other => panic!("unexpected configuration {:?}", other),
        }
        assert_eq!(asset.relationships.len(), 1);
    }

    #[test]
    fn test_public_policy_exposes_bucket() {
        let d = descriptor(json!({"Name": "site", "PolicyStatus": {"IsPublic": true}}));
        assert!(ObjectBucketNormalizer.compute_exposure(&d));
    }

    #[test]
    fn test_public_acl_neutralised_by_block() {
        let grant = json!([{"Grantee": {"URI": ALL_USERS_URI}, "Permission": "READ"}]);
        let open = descriptor(json!({"Name": "a", "Grants": grant.clone()}));
        assert!(ObjectBucketNormalizer.compute_exposure(&open));

        let blocked = descriptor(json!({
            "Name": "b",
            "Grants": grant,
            "PublicAccessBlock": {"BlockPublicAcls": true, "IgnorePublicAcls": true}
        }));
        assert!(!ObjectBucketNormalizer.compute_exposure(&blocked));
    }
}
