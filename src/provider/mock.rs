//! In-memory provider and identity probe
//!
//! Backed by static descriptors, either built in code, loaded from a JSON
//! fixture file, or taken from [`MockProvider::sample`]. Used by the CLI demo
//! mode and by tests.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;

use super::{CallerIdentity, IdentityProbe, RawResource, ResourceProvider};
use crate::asset::{ResourceType, ServiceKind, GLOBAL_REGION};
use crate::connection::RoleReference;
use crate::error::{ArgusError, ProviderError};

type CellKey = (String, ServiceKind);

/// Provider returning canned descriptors per (region, service)
#[derive(Debug, Default)]
pub struct MockProvider {
    resources: HashMap<CellKey, Vec<RawResource>>,
    failures: HashMap<CellKey, ProviderError>,
    panics: HashSet<CellKey>,
    delays: HashMap<CellKey, Duration>,
    default_delay: Option<Duration>,
    calls: Mutex<Vec<CellKey>>,
}

impl MockProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add descriptors to a cell; cells never configured return an empty list
    pub fn with_resources(mut self, region: &str, service: ServiceKind, resources: Vec<RawResource>) -> Self {
        self.resources
            .entry((region.to_string(), service))
            .or_default()
            .extend(resources);
        self
    }

    /// Add one descriptor, filed under the service that owns its type
    pub fn with_resource(self, region: &str, resource_type: ResourceType, descriptor: serde_json::Value) -> Self {
        let service = resource_type.service();
        self.with_resources(region, service, vec![RawResource::new(resource_type, descriptor)])
    }

    pub fn with_failure(mut self, region: &str, service: ServiceKind, error: ProviderError) -> Self {
        self.failures.insert((region.to_string(), service), error);
        self
    }

    /// Make the cell's task panic, simulating a crashed client
    pub fn with_panic(mut self, region: &str, service: ServiceKind) -> Self {
        self.panics.insert((region.to_string(), service));
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.default_delay = Some(delay);
        self
    }

    pub fn with_cell_delay(mut self, region: &str, service: ServiceKind, delay: Duration) -> Self {
        self.delays.insert((region.to_string(), service), delay);
        self
    }

    /// Every (region, service) fetched so far, in call order
    pub async fn calls(&self) -> Vec<(String, ServiceKind)> {
        self.calls.lock().await.clone()
    }

    /// Load a JSON fixture file (see [`Fixture`])
    pub fn from_fixture_file<P: AsRef<Path>>(path: P) -> crate::Result<Self> {
        Ok(Fixture::load(path)?.provider())
    }

    /// A small demo estate spread over `us-east-1`, `eu-west-1` and the global IAM scope
    pub fn sample(account_id: &str) -> Self {
        let arn = |service: &str, region: &str, resource: &str| {
            format!("arn:aws:{}:{}:{}:{}", service, region, account_id, resource)
        };

        Self::new()
            .with_resource(
                "us-east-1",
                ResourceType::ComputeInstance,
                json!({
                    "InstanceId": "i-0a1b2c3d4e5f60001",
                    "InstanceType": "m5.large",
                    "State": {"Name": "running"},
                    "PublicIpAddress": "54.210.10.4",
                    "PrivateIpAddress": "10.0.1.15",
                    "VpcId": "vpc-0prod",
                    "SubnetId": "subnet-0public",
                    "SecurityGroups": [{"GroupId": "sg-0web", "GroupName": "web"}],
                    "Tags": [
                        {"Key": "Name", "Value": "web-frontend"},
                        {"Key": "Environment", "Value": "production"},
                        {"Key": "Team", "Value": "storefront"}
                    ]
                }),
            )
            .with_resource(
                "us-east-1",
                ResourceType::BlockVolume,
                json!({
                    "VolumeId": "vol-0aa11",
                    "Size": 100,
                    "VolumeType": "gp3",
                    "State": "in-use",
                    "Encrypted": false,
                    "AvailabilityZone": "us-east-1a",
                    "Attachments": [{"InstanceId": "i-0a1b2c3d4e5f60001"}],
                    "Tags": [{"Key": "Environment", "Value": "production"}]
                }),
            )
            .with_resource(
                "us-east-1",
                ResourceType::ManagedDatabase,
                json!({
                    "DBInstanceIdentifier": "orders-db",
                    "DBInstanceArn": arn("rds", "us-east-1", "db:orders-db"),
                    "Engine": "postgres",
                    "EngineVersion": "15.4",
                    "DBInstanceClass": "db.r6g.large",
                    "DBInstanceStatus": "available",
                    "PubliclyAccessible": true,
                    "StorageEncrypted": true,
                    "MultiAZ": true,
                    "DBSubnetGroup": {"VpcId": "vpc-0prod"},
                    "TagList": [
                        {"Key": "Environment", "Value": "prod"},
                        {"Key": "DataClassification", "Value": "PII"}
                    ]
                }),
            )
            .with_resource(
                "us-east-1",
                ResourceType::ObjectBucket,
                json!({
                    "Name": format!("{}-static-assets", account_id),
                    "CreationDate": "2023-04-01T12:00:00Z",
                    "PolicyStatus": {"IsPublic": true},
                    "Tags": [{"Key": "classification", "Value": "public"}]
                }),
            )
            .with_resource(
                "us-east-1",
                ResourceType::VirtualNetwork,
                json!({
                    "VpcId": "vpc-0prod",
                    "CidrBlock": "10.0.0.0/16",
                    "State": "available",
                    "InternetGatewayIds": ["igw-0main"],
                    "Tags": [{"Key": "Name", "Value": "prod-vpc"}]
                }),
            )
            .with_resource(
                "us-east-1",
                ResourceType::LoadBalancer,
                json!({
                    "LoadBalancerName": "storefront-alb",
                    "LoadBalancerArn": arn("elasticloadbalancing", "us-east-1", "loadbalancer/app/storefront-alb/1a2b3c"),
                    "DNSName": "storefront-alb-123.us-east-1.elb.amazonaws.com",
                    "Scheme": "internet-facing",
                    "Type": "application",
                    "State": {"Code": "active"},
                    "VpcId": "vpc-0prod",
                    "Listeners": [{"Port": 443, "Protocol": "HTTPS"}],
                    "Tags": [{"Key": "env", "Value": "production"}]
                }),
            )
            .with_resource(
                "us-east-1",
                ResourceType::KvTable,
                json!({
                    "TableName": "sessions",
                    "TableStatus": "ACTIVE",
                    "ItemCount": 1200,
                    "BillingModeSummary": {"BillingMode": "PAY_PER_REQUEST"},
                    "Tags": [{"Key": "Stage", "Value": "staging"}]
                }),
            )
            .with_resource(
                "eu-west-1",
                ResourceType::Function,
                json!({
                    "FunctionName": "invoice-webhook",
                    "Runtime": "python3.12",
                    "Handler": "app.handler",
                    "MemorySize": 256,
                    "Timeout": 30,
                    "Role": format!("arn:aws:iam::{}:role/invoice-webhook", account_id),
                    "FunctionUrlConfig": {"FunctionUrl": "https://abc123.lambda-url.eu-west-1.on.aws/", "AuthType": "NONE"},
                    "Tags": {"Owner": "billing", "Environment": "dev"}
                }),
            )
            .with_resource(
                "eu-west-1",
                ResourceType::Cluster,
                json!({
                    "name": "analytics",
                    "version": "1.29",
                    "status": "ACTIVE",
                    "resourcesVpcConfig": {
                        "vpcId": "vpc-0eu",
                        "endpointPublicAccess": true,
                        "endpointPrivateAccess": true,
                        "publicAccessCidrs": ["0.0.0.0/0"]
                    },
                    "tags": {"team": "data-platform", "environment": "production"}
                }),
            )
            .with_resource(
                "eu-west-1",
                ResourceType::EncryptionKey,
                json!({
                    "KeyId": "7f1e2d3c-0000-4000-8000-000000000001",
                    "KeyState": "Enabled",
                    "KeyManager": "CUSTOMER",
                    "KeyUsage": "ENCRYPT_DECRYPT",
                    "KeyRotationEnabled": true,
                    "AliasName": "alias/billing",
                    "Tags": [{"TagKey": "Team", "TagValue": "billing"}]
                }),
            )
            .with_resource(
                GLOBAL_REGION,
                ResourceType::IdentityRole,
                json!({
                    "RoleName": "invoice-webhook",
                    "RoleId": "AROAEXAMPLE000001",
                    "Path": "/",
                    "AssumeRolePolicyDocument": {
                        "Version": "2012-10-17",
                        "Statement": [{"Effect": "Allow", "Principal": {"Service": "lambda.amazonaws.com"}, "Action": "sts:AssumeRole"}]
                    }
                }),
            )
    }
}

#[async_trait]
impl ResourceProvider for MockProvider {
    async fn fetch(
        &self,
        _account_id: &str,
        region: &str,
        service: ServiceKind,
    ) -> Result<Vec<RawResource>, ProviderError> {
        let key = (region.to_string(), service);
        self.calls.lock().await.push(key.clone());

        if let Some(delay) = self.delays.get(&key).copied().or(self.default_delay) {
            tokio::time::sleep(delay).await;
        }
        if self.panics.contains(&key) {
            panic!("simulated provider crash for {} in {}", service, region);
        }
        if let Some(err) = self.failures.get(&key) {
            return Err(err.clone());
        }
        Ok(self.resources.get(&key).cloned().unwrap_or_default())
    }
}

/// Probe that resolves every role to a fixed identity
#[derive(Debug)]
pub struct StaticIdentityProbe {
    result: Result<CallerIdentity, ProviderError>,
    delay: Option<Duration>,
    calls: AtomicUsize,
}

impl StaticIdentityProbe {
    pub fn new(account_id: &str, regions: Vec<String>) -> Self {
        Self::from_identity(CallerIdentity {
            account_id: account_id.to_string(),
            arn: format!("arn:aws:sts::{}:assumed-role/argus-scanner/argus", account_id),
            accessible_regions: regions,
        })
    }

    pub fn from_identity(identity: CallerIdentity) -> Self {
        Self {
            result: Ok(identity),
            delay: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing(error: ProviderError) -> Self {
        Self {
            result: Err(error),
            delay: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Number of `assume_role` calls made so far
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl IdentityProbe for StaticIdentityProbe {
    async fn assume_role(&self, role: &RoleReference, _external_id: &str) -> Result<CallerIdentity, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.result.clone().map(|mut identity| {
            if identity.arn.is_empty() {
                identity.arn = format!("arn:aws:sts::{}:assumed-role/{}/argus", identity.account_id, role.role_name());
            }
            identity
        })
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "snake_case")]
enum FailureKind {
    Network,
    AccessDenied,
    Throttled,
    Unsupported,
    MalformedResponse,
}

#[derive(Debug, Deserialize)]
struct FixtureCell {
    region: String,
    service: ServiceKind,
    #[serde(default)]
    resources: Vec<RawResource>,
}

#[derive(Debug, Deserialize)]
struct FixtureFailure {
    region: String,
    service: ServiceKind,
    error: FailureKind,
    #[serde(default)]
    message: String,
}

/// JSON fixture describing a fake account
///
/// ```json
/// {
///   "identity": {"account_id": "123456789012", "arn": "...", "accessible_regions": ["us-east-1"]},
///   "cells": [{"region": "us-east-1", "service": "ec2", "resources": [{"resource_type": "compute-instance", "descriptor": {}}]}],
///   "failures": [{"region": "eu-west-1", "service": "rds", "error": "access_denied", "message": "..."}]
/// }
/// ```
#[derive(Debug, Deserialize)]
pub struct Fixture {
    #[serde(default)]
    identity: Option<CallerIdentity>,
    #[serde(default)]
    cells: Vec<FixtureCell>,
    #[serde(default)]
    failures: Vec<FixtureFailure>,
}

impl Fixture {
    pub fn load<P: AsRef<Path>>(path: P) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        serde_json::from_str(&content).map_err(ArgusError::from)
    }

    pub fn provider(&self) -> MockProvider {
        let mut provider = MockProvider::new();
        for cell in &self.cells {
            provider = provider.with_resources(&cell.region, cell.service, cell.resources.clone());
        }
        for failure in &self.failures {
            let err = match failure.error {
                FailureKind::Network => ProviderError::Network(failure.message.clone()),
                FailureKind::AccessDenied => ProviderError::AccessDenied(failure.message.clone()),
                FailureKind::Throttled => ProviderError::Throttled,
                FailureKind::Unsupported => ProviderError::Unsupported {
                    service: failure.service,
                    region: failure.region.clone(),
                },
                FailureKind::MalformedResponse => ProviderError::MalformedResponse(failure.message.clone()),
            };
            provider = provider.with_failure(&failure.region, failure.service, err);
        }
        provider
    }

    /// Probe answering with the fixture's identity, if it declares one
    pub fn identity_probe(&self) -> Option<StaticIdentityProbe> {
        self.identity.clone().map(StaticIdentityProbe::from_identity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[tokio::test]
    async fn test_unconfigured_cell_is_empty() {
        let provider = MockProvider::new();
        let resources = provider.fetch("123456789012", "us-east-1", ServiceKind::Ec2).await.unwrap();
        assert!(resources.is_empty());
        assert_eq!(provider.calls().await, vec![("us-east-1".to_string(), ServiceKind::Ec2)]);
    }

    #[tokio::test]
    async fn test_configured_failure_is_returned() {
        let provider = MockProvider::new().with_failure("eu-west-1", ServiceKind::Rds, ProviderError::Throttled);
        let err = provider.fetch("123456789012", "eu-west-1", ServiceKind::Rds).await.unwrap_err();
        assert_eq!(err, ProviderError::Throttled);
    }

    #[tokio::test]
    async fn test_sample_has_global_roles() {
        let provider = MockProvider::sample("123456789012");
        let roles = provider.fetch("123456789012", GLOBAL_REGION, ServiceKind::Iam).await.unwrap();
        assert_eq!(roles.len(), 1);
        assert_eq!(roles[0].resource_type, ResourceType::IdentityRole);
    }

    #[tokio::test]
    async fn test_fixture_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{
                "identity": {{"account_id": "210987654321", "arn": "arn:aws:sts::210987654321:assumed-role/audit/argus"}},
                "cells": [{{"region": "us-west-2", "service": "s3", "resources": [{{"resource_type": "object-bucket", "descriptor": {{"Name": "b"}}}}]}}],
                "failures": [{{"region": "us-west-2", "service": "kms", "error": "access_denied", "message": "no kms:ListKeys"}}]
            }}"#
        )
        .unwrap();

        let fixture = Fixture::load(file.path()).unwrap();
        let provider = fixture.provider();
        let buckets = provider.fetch("210987654321", "us-west-2", ServiceKind::S3).await.unwrap();
        assert_eq!(buckets.len(), 1);
        let err = provider.fetch("210987654321", "us-west-2", ServiceKind::Kms).await.unwrap_err();
        assert!(matches!(err, ProviderError::AccessDenied(_)));

        let probe = fixture.identity_probe().unwrap();
        let role = RoleReference::parse("arn:aws:iam::210987654321:role/audit").unwrap();
        let identity = probe.assume_role(&role, "ext-id").await.unwrap();
        assert_eq!(identity.account_id, "210987654321");
        assert_eq!(probe.calls(), 1);
    }
}
