//! Delegated-access connection validation

use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::timeout;

use crate::error::ConnectionError;
use crate::provider::{CallerIdentity, IdentityProbe};

static ROLE_ARN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^arn:aws:iam::([0-9]{12}):role(/(?:[A-Za-z0-9_+=,.@-]+/)*)([A-Za-z0-9_+=,.@-]{1,64})$")
        .expect("role ARN pattern is valid")
});

/// Character set of an external id; length is checked separately
static EXTERNAL_ID: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_+=,.@:/-]+$").expect("external id pattern is valid"));

const EXTERNAL_ID_LEN: std::ops::RangeInclusive<usize> = 2..=1224;

/// A parsed IAM role ARN
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleReference {
    arn: String,
    account_id: String,
    path: String,
    role_name: String,
}

impl RoleReference {
    pub fn parse(reference: &str) -> Result<Self, ConnectionError> {
        let reference = reference.trim();
        let caps = ROLE_ARN
            .captures(reference)
            .ok_or_else(|| ConnectionError::MalformedRoleReference(reference.to_string()))?;
        Ok(Self {
            arn: reference.to_string(),
            account_id: caps[1].to_string(),
            path: caps[2].to_string(),
            role_name: caps[3].to_string(),
        })
    }

    pub fn arn(&self) -> &str {
        &self.arn
    }

    pub fn account_id(&self) -> &str {
        &self.account_id
    }

    /// Role path including leading and trailing `/`
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn role_name(&self) -> &str {
        &self.role_name
    }
}

impl fmt::Display for RoleReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.arn)
    }
}

pub fn validate_external_id(external_id: &str) -> Result<(), ConnectionError> {
    if EXTERNAL_ID_LEN.contains(&external_id.len()) && EXTERNAL_ID.is_match(external_id) {
        Ok(())
    } else if external_id.trim().is_empty() {
        Err(ConnectionError::MalformedExternalId("external id is empty".to_string()))
    } else {
        Err(ConnectionError::MalformedExternalId(
            "must be 2-1224 characters of letters, digits and +=,.@:/-".to_string(),
        ))
    }
}

/// Outcome of a connection test, always returned rather than raised
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionTestResult {
    pub success: bool,
    pub account_id: Option<String>,
    /// Assumed-role identity on success
    pub identity: Option<String>,
    pub accessible_regions: Vec<String>,
    pub error: Option<String>,
    pub tested_at: DateTime<Utc>,
    pub latency_ms: u64,
}

impl ConnectionTestResult {
    fn succeeded(identity: CallerIdentity, latency: Duration) -> Self {
        Self {
            success: true,
            account_id: Some(identity.account_id),
            identity: Some(identity.arn),
            accessible_regions: identity.accessible_regions,
            error: None,
            tested_at: Utc::now(),
            latency_ms: latency.as_millis() as u64,
        }
    }

    fn failed(error: ConnectionError, latency: Duration) -> Self {
        Self {
            success: false,
            account_id: None,
            identity: None,
            accessible_regions: Vec::new(),
            error: Some(error.to_string()),
            tested_at: Utc::now(),
            latency_ms: latency.as_millis() as u64,
        }
    }
}

/// Validates role references and probes them through an [`IdentityProbe`]
pub struct ConnectionValidator {
    probe: Arc<dyn IdentityProbe>,
    timeout: Duration,
}

impl ConnectionValidator {
    pub fn new(probe: Arc<dyn IdentityProbe>, timeout: Duration) -> Self {
        Self { probe, timeout }
    }

    /// Validate the inputs, assume the role once and report what was reachable.
    /// No retries; a failed probe is reported, not raised.
    pub async fn test_connection(&self, role_reference: &str, external_id: &str) -> ConnectionTestResult {
        let start = Instant::now();
        match self.connect(role_reference, external_id).await {
            Ok(identity) => {
                info!("Connection to account {} verified as {}", identity.account_id, identity.arn);
                ConnectionTestResult::succeeded(identity, start.elapsed())
            }
            Err(e) => {
                warn!("Connection test failed: {}", e);
                ConnectionTestResult::failed(e, start.elapsed())
            }
        }
    }

    /// Same checks as [`test_connection`](Self::test_connection) but returning the error
    pub async fn connect(&self, role_reference: &str, external_id: &str) -> Result<CallerIdentity, ConnectionError> {
        let role = RoleReference::parse(role_reference)?;
        validate_external_id(external_id)?;

        debug!("Assuming {} with a {}ms timeout", role, self.timeout.as_millis());
        let identity = timeout(self.timeout, self.probe.assume_role(&role, external_id))
            .await
            .map_err(|_| ConnectionError::Timeout(self.timeout))?
            .map_err(|e| ConnectionError::ProbeFailed(e.to_string()))?;

        if identity.account_id != role.account_id() {
            return Err(ConnectionError::AccountMismatch {
                expected: role.account_id().to_string(),
                actual: identity.account_id,
            });
        }
        Ok(identity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_role_reference() {
        let role = RoleReference::parse("arn:aws:iam::123456789012:role/ArgusReadOnly").unwrap();
        assert_eq!(role.account_id(), "123456789012");
        assert_eq!(role.role_name(), "ArgusReadOnly");
        assert_eq!(role.path(), "/");

        let nested = RoleReference::parse("arn:aws:iam::123456789012:role/security/audit/Argus").unwrap();
        assert_eq!(nested.path(), "/security/audit/");
        assert_eq!(nested.role_name(), "Argus");
    }

    #[test]
    fn test_reject_malformed_role_references() {
        for bad in [
            "",
            "ArgusReadOnly",
            "arn:aws:iam::12345:role/short-account",
            "arn:aws:iam::123456789012:user/alice",
            "arn:aws:s3:::bucket",
            "arn:aws:iam::123456789012:role/",
            "arn:aws:iam::١٢٣٤٥٦٧٨٩٠١٢:role/Argus",
            "arn:aws:iam::123456789012:role/Rôle",
        ] {
            assert!(
                matches!(RoleReference::parse(bad), Err(ConnectionError::MalformedRoleReference(_))),
                "accepted {:?}",
                bad
            );
        }
    }

    #[test]
    fn test_external_id_rules() {
        assert!(validate_external_id("argus-7f3a").is_ok());
        assert!(validate_external_id("").is_err());
        assert!(validate_external_id("x").is_err());
        assert!(validate_external_id("has space").is_err());
        assert!(validate_external_id(&"a".repeat(1224)).is_ok());
        assert!(validate_external_id(&"a".repeat(1225)).is_err());
        assert!(validate_external_id("tenant:42/prod@acme.example").is_ok());
        assert!(validate_external_id("clé-externe").is_err());
    }
}
