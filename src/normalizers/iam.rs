//! IAM roles (account-wide)

use serde::Deserialize;
use serde_json::Value;

use super::{policy, require_id, Normalizer, TagSet};
use crate::asset::{Asset, IdentityRoleConfig, ResourceConfiguration, ResourceType, ScanContext, GLOBAL_REGION};
use crate::error::NormalizeError;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RoleDescriptor {
    pub role_name: String,
    pub role_id: Option<String>,
    pub arn: Option<String>,
    pub path: Option<String>,
    pub create_date: Option<String>,
    pub max_session_duration: Option<i64>,
    /// Trust policy, either a JSON object or the JSON-encoded string the API returns
    #[serde(default)]
    pub assume_role_policy_document: Value,
    #[serde(default)]
    pub tags: TagSet,
}

pub struct IdentityRoleNormalizer;

impl Normalizer for IdentityRoleNormalizer {
    type Descriptor = RoleDescriptor;

    fn resource_type(&self) -> ResourceType {
        ResourceType::IdentityRole
    }

    /// Anyone may assume the role: an unconditional trust in `*`
    fn compute_exposure(&self, descriptor: &RoleDescriptor) -> bool {
        policy::grants_anonymous_access(&descriptor.assume_role_policy_document)
    }

    fn normalize(&self, descriptor: RoleDescriptor, ctx: &ScanContext) -> Result<Vec<Asset>, NormalizeError> {
        require_id(&descriptor.role_name, ResourceType::IdentityRole)?;

        let exposed = self.compute_exposure(&descriptor);
        let name = descriptor.role_name.clone();
        let path = descriptor.path.clone().unwrap_or_else(|| "/".to_string());
        let arn = descriptor
            .arn
            .clone()
            .unwrap_or_else(|| format!("arn:aws:iam::{}:role{}{}", ctx.account_id, path, name));

        let config = IdentityRoleConfig {
            trusted_principals: policy::allowed_principals(&descriptor.assume_role_policy_document),
            role_id: descriptor.role_id,
            path: Some(path),
            create_date: descriptor.create_date,
            max_session_duration: descriptor.max_session_duration,
        };

        Ok(vec![Asset::new(ctx, name.clone(), arn, name, ResourceConfiguration::IdentityRole(config))
            .in_region(GLOBAL_REGION)
            .with_tags(descriptor.tags.into_map())
            .with_exposure(exposed)])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalizers::RawNormalizer;
    use serde_json::json;

    #[test]
    fn test_role_is_global_fixture() {
        let ctx = ScanContext::new("111122223333", "us-east-1");
        let raw = json!({
            "RoleName": "lambda-exec",
            "RoleId": "AROA123",
            "Path": "/service/",
            "AssumeRolePolicyDocument": r#"{"Statement":[{"Effect":"Allow","Principal":{"Service":"lambda.amazonaws.com"},"Action":"sts:AssumeRole"}]}"#,
            "Tags": [{"Key": "Team", "Value": "platform"}]
        });
        let asset = &IdentityRoleNormalizer.normalize_raw(raw, &ctx).unwrap()[0];
        assert_eq!(asset.region, GLOBAL_REGION);
        assert!(asset.is_global());
        assert_eq!(asset.resource_arn, "arn:aws:iam::111122223333:role/service/lambda-exec");
        assert!(!asset.internet_exposed);
        match &asset.configuration {
            ResourceConfiguration::IdentityRole(c) => {
                assert_eq!(c.trusted_principals, vec!["lambda.amazonaws.com".to_string()]);
            }
            other => panic!("unexpected configuration {:?}", other),
        }
    }

    #[test]
    fn test_wildcard_trust_is_exposed() {
        let d: RoleDescriptor = serde_json::from_value(json!({
            "RoleName": "open",
            "AssumeRolePolicyDocument": {"Statement": [{"Effect": "Allow", "Principal": {"AWS": "*"}}]}
        }))
        .unwrap();
        assert!(IdentityRoleNormalizer.compute_exposure(&d));
    }
}
