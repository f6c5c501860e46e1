//! Account discovery across the region x service matrix
//!
//! A run is split into cells, one per (region, service) pair, with account-wide
//! services collapsed into a single `global` cell. Cells are independent: a
//! failure in one is reported as a [`CellError`] and never aborts the others.

pub mod engine;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

use crate::asset::{Asset, ResourceType, ServiceKind, GLOBAL_REGION};

pub use engine::DiscoveryEngine;

/// One unit of discovery work
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Cell {
    pub region: String,
    pub service: ServiceKind,
}

impl Cell {
    pub fn new(region: impl Into<String>, service: ServiceKind) -> Self {
        Self {
            region: region.into(),
            service,
        }
    }

    pub fn is_global(&self) -> bool {
        self.region == GLOBAL_REGION
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.region, self.service)
    }
}

/// What to discover for one account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveryRequest {
    pub account_id: String,
    pub regions: Vec<String>,
    /// `None` scans every known service
    pub services: Option<Vec<ServiceKind>>,
}

impl DiscoveryRequest {
    pub fn new(account_id: impl Into<String>, regions: Vec<String>) -> Self {
        Self {
            account_id: account_id.into(),
            regions,
            services: None,
        }
    }

    pub fn with_services(mut self, services: Vec<ServiceKind>) -> Self {
        self.services = Some(services);
        self
    }

    /// Expand into cells. Duplicate and blank regions and duplicate services
    /// are dropped; global services yield exactly one cell each.
    pub fn cells(&self) -> Vec<Cell> {
        let mut seen_regions = HashSet::new();
        let regions: Vec<&str> = self
            .regions
            .iter()
            .map(|r| r.trim())
            .filter(|r| !r.is_empty() && seen_regions.insert(r.to_string()))
            .collect();

        let mut seen_services = HashSet::new();
        let services: Vec<ServiceKind> = self
            .services
            .clone()
            .unwrap_or_else(|| ServiceKind::ALL.to_vec())
            .into_iter()
            .filter(|s| seen_services.insert(*s))
            .collect();

        let mut cells = Vec::new();
        for region in &regions {
            for service in services.iter().filter(|s| !s.is_global()) {
                cells.push(Cell::new(*region, *service));
            }
        }
        for service in services.iter().filter(|s| s.is_global()) {
            cells.push(Cell::new(GLOBAL_REGION, *service));
        }
        cells
    }
}

/// A failure confined to one cell, or to one descriptor within it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellError {
    pub service: ServiceKind,
    pub region: String,
    /// Set when a single descriptor failed to normalize
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource_type: Option<ResourceType>,
    pub error: String,
}

impl CellError {
    pub fn new(cell: &Cell, error: impl fmt::Display) -> Self {
        Self {
            service: cell.service,
            region: cell.region.clone(),
            resource_type: None,
            error: error.to_string(),
        }
    }

    pub fn for_resource(cell: &Cell, resource_type: ResourceType, error: impl fmt::Display) -> Self {
        Self {
            resource_type: Some(resource_type),
            ..Self::new(cell, error)
        }
    }
}

impl fmt::Display for CellError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.resource_type {
            Some(rt) => write!(f, "{}/{} ({}): {}", self.region, self.service, rt, self.error),
            None => write!(f, "{}/{}: {}", self.region, self.service, self.error),
        }
    }
}

/// Progress notifications emitted while a run is in flight
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CellEvent {
    /// Total number of cells planned for the run
    Planned(usize),
    Completed { cell: Cell, assets: usize, errors: usize },
    Skipped(Cell),
}

/// Aggregate output of one discovery run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveryResult {
    pub scan_id: String,
    pub account_id: String,
    pub started_at: DateTime<Utc>,
    /// Unique by `resource_arn`
    pub assets: Vec<Asset>,
    pub services_scanned: Vec<ServiceKind>,
    pub regions_scanned: Vec<String>,
    pub errors: Vec<CellError>,
    pub duration_ms: u64,
    pub cancelled: bool,
    #[serde(default)]
    pub cells_skipped: Vec<Cell>,
}

impl DiscoveryResult {
    /// True when every planned cell ran without error
    pub fn is_complete(&self) -> bool {
        self.errors.is_empty() && self.cells_skipped.is_empty() && !self.cancelled
    }

    pub fn exposed_assets(&self) -> impl Iterator<Item = &Asset> {
        self.assets.iter().filter(|a| a.internet_exposed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_global_service_planned_once() {
        let request = DiscoveryRequest::new(
            "123456789012",
            vec!["us-east-1".to_string(), "eu-west-1".to_string(), "ap-south-1".to_string()],
        )
        .with_services(vec![ServiceKind::Ec2, ServiceKind::Iam]);

        let cells = request.cells();
        assert_eq!(cells.len(), 4);
        let iam: Vec<_> = cells.iter().filter(|c| c.service == ServiceKind::Iam).collect();
        assert_eq!(iam, vec![&Cell::new(GLOBAL_REGION, ServiceKind::Iam)]);
    }

    #[test]
    fn test_duplicates_collapse() {
        let request = DiscoveryRequest::new(
            "123456789012",
            vec!["us-east-1".to_string(), " us-east-1 ".to_string(), "".to_string()],
        )
        .with_services(vec![ServiceKind::S3, ServiceKind::S3]);
        assert_eq!(request.cells(), vec![Cell::new("us-east-1", ServiceKind::S3)]);
    }

    #[test]
    fn test_default_services_cover_all() {
        let request = DiscoveryRequest::new("123456789012", vec!["us-east-1".to_string()]);
        // nine regional services plus the global one
        assert_eq!(request.cells().len(), ServiceKind::ALL.len());
    }

    #[test]
    fn test_no_regions_still_plans_global_cells() {
        let request = DiscoveryRequest::new("123456789012", Vec::new());
        assert_eq!(request.cells(), vec![Cell::new(GLOBAL_REGION, ServiceKind::Iam)]);
    }

    #[test]
    fn test_cell_error_display() {
        let cell = Cell::new("eu-west-1", ServiceKind::Rds);
        let err = CellError::for_resource(&cell, ResourceType::ManagedDatabase, "bad descriptor");
        assert_eq!(err.to_string(), "eu-west-1/rds (managed-database): bad descriptor");
    }
}
