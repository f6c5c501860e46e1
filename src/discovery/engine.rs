//! Discovery engine: bounded fan-out over cells

use chrono::Utc;
use futures::future::join_all;
use log::{debug, error, info, warn};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, Semaphore};
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::{Cell, CellError, CellEvent, DiscoveryRequest, DiscoveryResult};
use crate::asset::{Asset, ScanContext, ServiceKind};
use crate::config::EngineConfig;
use crate::normalizers::NormalizerRegistry;
use crate::provider::ResourceProvider;

/// Per-cell result merged by the engine after all cells finish
struct CellOutcome {
    assets: Vec<Asset>,
    errors: Vec<CellError>,
}

/// Runs discovery for one account at a time
pub struct DiscoveryEngine {
    provider: Arc<dyn ResourceProvider>,
    registry: Arc<NormalizerRegistry>,
    max_concurrency: usize,
    cell_timeout: Duration,
    cancel: CancellationToken,
    progress: Option<mpsc::UnboundedSender<CellEvent>>,
}

impl DiscoveryEngine {
    /// Create a new engine using the standard normalizer registry
    pub fn new(provider: Arc<dyn ResourceProvider>, config: &EngineConfig) -> Self {
        Self {
            provider,
            registry: Arc::new(NormalizerRegistry::standard()),
            max_concurrency: config.max_concurrency.max(1),
            cell_timeout: config.cell_timeout(),
            cancel: CancellationToken::new(),
            progress: None,
        }
    }

    pub fn with_registry(mut self, registry: NormalizerRegistry) -> Self {
        self.registry = Arc::new(registry);
        self
    }

    /// Share a cancellation token with the caller
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn with_progress(mut self, sender: mpsc::UnboundedSender<CellEvent>) -> Self {
        self.progress = Some(sender);
        self
    }

    /// Token that cancels runs of this engine when triggered
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    fn notify(&self, event: CellEvent) {
        if let Some(tx) = &self.progress {
            // receiver may have gone away; progress is best effort
            let _ = tx.send(event);
        }
    }

    /// Convenience wrapper over [`discover_request`](Self::discover_request)
    pub async fn discover(
        &self,
        account_id: &str,
        regions: &[String],
        services: Option<&[ServiceKind]>,
    ) -> DiscoveryResult {
        let mut request = DiscoveryRequest::new(account_id, regions.to_vec());
        if let Some(services) = services {
            request = request.with_services(services.to_vec());
        }
        self.discover_request(&request).await
    }

    /// Discover every cell of `request`. Never fails as a whole: cell failures
    /// are reported in [`DiscoveryResult::errors`].
    pub async fn discover_request(&self, request: &DiscoveryRequest) -> DiscoveryResult {
        let start_time = Instant::now();
        let started_at = Utc::now();
        let scan_id = Uuid::new_v4().to_string();
        let cells = request.cells();

        info!(
            "Discovery {} started for account {}: {} cells, concurrency {}",
            scan_id,
            request.account_id,
            cells.len(),
            self.max_concurrency
        );
        self.notify(CellEvent::Planned(cells.len()));

        let semaphore = Arc::new(Semaphore::new(self.max_concurrency));
        let mut handles = Vec::new();
        let mut skipped = Vec::new();

        for cell in cells {
            // cancellation is only observed between cells
            let permit = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => None,
                permit = semaphore.clone().acquire_owned() => permit.ok(),
            };
            let permit = match permit {
                Some(permit) if !self.cancel.is_cancelled() => permit,
                _ => {
                    debug!("Skipping cell {} after cancellation", cell);
                    self.notify(CellEvent::Skipped(cell.clone()));
                    skipped.push(cell);
                    continue;
                }
            };

            let provider = self.provider.clone();
            let registry = self.registry.clone();
            let progress = self.progress.clone();
            let ctx = ScanContext::new(request.account_id.clone(), cell.region.clone()).with_discovered_at(started_at);
            let cell_timeout = self.cell_timeout;
            let task_cell = cell.clone();

            let handle = tokio::spawn(async move {
                let _permit = permit;
                let outcome = run_cell(provider.as_ref(), &registry, &task_cell, &ctx, cell_timeout).await;
                if let Some(tx) = progress {
                    let _ = tx.send(CellEvent::Completed {
                        cell: task_cell,
                        assets: outcome.assets.len(),
                        errors: outcome.errors.len(),
                    });
                }
                outcome
            });
            handles.push((cell, handle));
        }

        let (ran, handles): (Vec<Cell>, Vec<_>) = handles.into_iter().unzip();
        let results = join_all(handles).await;

        let mut assets = Vec::new();
        let mut errors = Vec::new();
        let mut seen_arns = HashSet::new();

        for (cell, result) in ran.iter().zip(results) {
            match result {
                Ok(outcome) => {
                    for asset in outcome.assets {
                        if seen_arns.insert(asset.resource_arn.clone()) {
                            assets.push(asset);
                        } else {
                            warn!("Dropping duplicate asset {} from {}", asset.resource_arn, cell);
                        }
                    }
                    errors.extend(outcome.errors);
                }
                Err(e) => {
                    error!("Worker for cell {} failed: {}", cell, e);
                    errors.push(CellError::new(cell, format!("worker failed: {}", e)));
                }
            }
        }

        let mut regions_scanned = Vec::new();
        let mut services_scanned = Vec::new();
        for cell in &ran {
            if !regions_scanned.contains(&cell.region) {
                regions_scanned.push(cell.region.clone());
            }
            if !services_scanned.contains(&cell.service) {
                services_scanned.push(cell.service);
            }
        }

        let duration_ms = start_time.elapsed().as_millis() as u64;
        let cancelled = self.cancel.is_cancelled();
        info!(
            "Discovery {} finished in {}ms: {} assets, {} errors, {} cells skipped{}",
            scan_id,
            duration_ms,
            assets.len(),
            errors.len(),
            skipped.len(),
            if cancelled { " (cancelled)" } else { "" }
        );

        DiscoveryResult {
            scan_id,
            account_id: request.account_id.clone(),
            started_at,
            assets,
            services_scanned,
            regions_scanned,
            errors,
            duration_ms,
            cancelled,
            cells_skipped: skipped,
        }
    }
}

/// Fetch one cell and normalize what came back. A bad descriptor only drops itself.
async fn run_cell(
    provider: &dyn ResourceProvider,
    registry: &NormalizerRegistry,
    cell: &Cell,
    ctx: &ScanContext,
    cell_timeout: Duration,
) -> CellOutcome {
    let mut outcome = CellOutcome {
        assets: Vec::new(),
        errors: Vec::new(),
    };

    let raw = match timeout(cell_timeout, provider.fetch(&ctx.account_id, &cell.region, cell.service)).await {
        Ok(Ok(raw)) => raw,
        Ok(Err(e)) => {
            warn!("Cell {} failed: {}", cell, e);
            outcome.errors.push(CellError::new(cell, e));
            return outcome;
        }
        Err(_) => {
            warn!("Cell {} timed out after {}ms", cell, cell_timeout.as_millis());
            outcome
                .errors
                .push(CellError::new(cell, format!("timed out after {}ms", cell_timeout.as_millis())));
            return outcome;
        }
    };

    debug!("Cell {} returned {} descriptors", cell, raw.len());
    for resource in raw {
        match registry.normalize(resource.resource_type, resource.descriptor, ctx) {
            Ok(assets) => outcome.assets.extend(assets),
            Err(e) => {
                warn!("Cell {}: {}", cell, e);
                outcome
                    .errors
                    .push(CellError::for_resource(cell, resource.resource_type, e));
            }
        }
    }
    outcome
}
