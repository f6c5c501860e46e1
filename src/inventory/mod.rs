//! Inventory hand-off
//!
//! Pairs each discovered asset with its final classification and upserts the
//! pairs into an [`InventorySink`], keyed by the asset's ARN.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;

use crate::asset::Asset;
use crate::classification::rules::RuleSet;
use crate::classification::{initial_classification, Classification};
use crate::discovery::DiscoveryResult;
use crate::error::ArgusError;

/// An asset together with its final classification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifiedAsset {
    pub asset: Asset,
    pub classification: Classification,
    /// Ids of the rules that changed the classification, in application order
    #[serde(default)]
    pub matched_rules: Vec<String>,
}

impl ClassifiedAsset {
    pub fn classify(asset: Asset, rules: &RuleSet) -> Self {
        let outcome = rules.evaluate(&asset, initial_classification(&asset));
        Self {
            asset,
            classification: outcome.classification,
            matched_rules: outcome.matched_rules,
        }
    }

    pub fn arn(&self) -> &str {
        &self.asset.resource_arn
    }
}

/// Classify every asset of a run with one prepared rule set
pub fn classify_result(result: &DiscoveryResult, rules: &RuleSet) -> Vec<ClassifiedAsset> {
    result
        .assets
        .iter()
        .cloned()
        .map(|asset| ClassifiedAsset::classify(asset, rules))
        .collect()
}

/// Counters returned by an upsert
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpsertStats {
    pub inserted: usize,
    /// Known assets whose record changed
    pub updated: usize,
    /// Known assets seen again with identical data
    pub unchanged: usize,
}

impl UpsertStats {
    pub fn total(&self) -> usize {
        self.inserted + self.updated + self.unchanged
    }
}

/// Persistence collaborator for classified assets
#[async_trait]
pub trait InventorySink: Send + Sync {
    async fn upsert(&self, account_id: &str, assets: Vec<ClassifiedAsset>) -> crate::Result<UpsertStats>;
}

/// Stored inventory entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InventoryRecord {
    pub account_id: String,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    #[serde(flatten)]
    pub entry: ClassifiedAsset,
}

/// Sink holding records in memory
#[derive(Debug, Default)]
pub struct MemoryInventory {
    records: RwLock<HashMap<String, InventoryRecord>>,
}

impl MemoryInventory {
    pub fn new() -> Self {
        Self::default()
    }

    fn from_records(records: Vec<InventoryRecord>) -> Self {
        let map = records
            .into_iter()
            .map(|r| (r.entry.arn().to_string(), r))
            .collect();
        Self {
            records: RwLock::new(map),
        }
    }

    pub async fn get(&self, arn: &str) -> Option<InventoryRecord> {
        self.records.read().await.get(arn).cloned()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }

    /// All records, sorted by ARN
    pub async fn snapshot(&self) -> Vec<InventoryRecord> {
        let mut records: Vec<_> = self.records.read().await.values().cloned().collect();
        records.sort_by(|a, b| a.entry.arn().cmp(b.entry.arn()));
        records
    }

    /// Records for an account not seen since `cutoff`
    pub async fn stale(&self, account_id: &str, cutoff: DateTime<Utc>) -> Vec<InventoryRecord> {
        self.snapshot()
            .await
            .into_iter()
            .filter(|r| r.account_id == account_id && r.last_seen < cutoff)
            .collect()
    }
}

#[async_trait]
impl InventorySink for MemoryInventory {
    async fn upsert(&self, account_id: &str, assets: Vec<ClassifiedAsset>) -> crate::Result<UpsertStats> {
        if let Some(foreign) = assets.iter().find(|a| a.asset.account_id != account_id) {
            return Err(ArgusError::InventoryError(format!(
                "{} belongs to account {}, not {}",
                foreign.arn(),
                foreign.asset.account_id,
                account_id
            )));
        }

        let mut stats = UpsertStats::default();
        let mut records = self.records.write().await;
        for entry in assets {
            let seen_at = entry.asset.discovered_at;
            match records.get_mut(entry.arn()) {
                Some(record) => {
                    if record.entry.asset.equivalent(&entry.asset) && record.entry.classification == entry.classification {
                        stats.unchanged += 1;
                    } else {
                        stats.updated += 1;
                    }
                    record.last_seen = record.last_seen.max(seen_at);
                    record.entry = entry;
                }
                None => {
                    stats.inserted += 1;
                    records.insert(
                        entry.arn().to_string(),
                        InventoryRecord {
                            account_id: account_id.to_string(),
                            first_seen: seen_at,
                            last_seen: seen_at,
                            entry,
                        },
                    );
                }
            }
        }

        debug!(
            "Upserted into memory inventory for {}: {} inserted, {} updated, {} unchanged",
            account_id, stats.inserted, stats.updated, stats.unchanged
        );
        Ok(stats)
    }
}

/// Memory inventory persisted to a JSON file after every upsert
pub struct JsonFileInventory {
    path: PathBuf,
    inner: MemoryInventory,
}

impl JsonFileInventory {
    /// Open the file, starting empty if it does not exist yet
    pub fn open<P: AsRef<Path>>(path: P) -> crate::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let inner = if path.exists() {
            let content = fs::read_to_string(&path)?;
            let records: Vec<InventoryRecord> = serde_json::from_str(&content)?;
            info!("Loaded {} inventory records from {}", records.len(), path.display());
            MemoryInventory::from_records(records)
        } else {
            MemoryInventory::new()
        };
        Ok(Self { path, inner })
    }

    pub fn inventory(&self) -> &MemoryInventory {
        &self.inner
    }

    async fn persist(&self) -> crate::Result<()> {
        let json = serde_json::to_string_pretty(&self.inner.snapshot().await)?;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, json)?;
        Ok(())
    }
}

#[async_trait]
impl InventorySink for JsonFileInventory {
    async fn upsert(&self, account_id: &str, assets: Vec<ClassifiedAsset>) -> crate::Result<UpsertStats> {
        let stats = self.inner.upsert(account_id, assets).await?;
        self.persist().await?;
        Ok(stats)
    }
}
