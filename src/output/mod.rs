//! Output formatting and management

use chrono::{DateTime, Utc};
use colored::Colorize;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::Write;
use std::path::PathBuf;

use crate::asset::ServiceKind;
use crate::classification::Criticality;
use crate::connection::ConnectionTestResult;
use crate::discovery::{CellError, DiscoveryResult};
use crate::error::ArgusError;
use crate::inventory::{ClassifiedAsset, UpsertStats};

/// Output format options
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" | "txt" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            _ => Err(format!("Unknown output format: {}", s)),
        }
    }
}

/// Output configuration
#[derive(Debug, Clone)]
pub struct OutputConfig {
    pub format: OutputFormat,
    pub file: Option<PathBuf>,
    pub colored: bool,
    /// Include relationships and matched rules in text output
    pub verbose: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: OutputFormat::Text,
            file: None,
            colored: true,
            verbose: false,
        }
    }
}

/// Counts used to prioritize follow-up
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskSummary {
    pub total_assets: usize,
    pub by_criticality: BTreeMap<String, usize>,
    pub by_service: BTreeMap<ServiceKind, usize>,
    pub internet_exposed: usize,
    /// Exposed and critical, the first things to look at
    pub exposed_critical: Vec<String>,
    pub unclassified_environment: usize,
    pub errors: usize,
}

impl RiskSummary {
    pub fn from_assets(assets: &[ClassifiedAsset], errors: &[CellError]) -> Self {
        let mut summary = RiskSummary {
            total_assets: assets.len(),
            errors: errors.len(),
            ..Default::default()
        };
        for level in Criticality::ALL {
            summary.by_criticality.insert(level.to_string(), 0);
        }

        for entry in assets {
            let c = &entry.classification;
            *summary.by_criticality.entry(c.criticality.to_string()).or_insert(0) += 1;
            *summary.by_service.entry(entry.asset.service).or_insert(0) += 1;
            if c.internet_exposed {
                summary.internet_exposed += 1;
                if c.criticality == Criticality::Critical {
                    summary.exposed_critical.push(entry.arn().to_string());
                }
            }
            if c.environment.is_none() {
                summary.unclassified_environment += 1;
            }
        }
        summary.exposed_critical.sort();
        summary
    }

    pub fn count(&self, level: Criticality) -> usize {
        self.by_criticality.get(level.as_str()).copied().unwrap_or(0)
    }
}

/// JSON shape of a discover/classify run
#[derive(Debug, Serialize, Deserialize)]
pub struct DiscoveryReport {
    pub scan_id: String,
    pub account_id: String,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub cancelled: bool,
    pub services_scanned: Vec<ServiceKind>,
    pub regions_scanned: Vec<String>,
    pub summary: RiskSummary,
    pub assets: Vec<ClassifiedAsset>,
    pub errors: Vec<CellError>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inventory: Option<UpsertStats>,
}

impl DiscoveryReport {
    pub fn new(result: &DiscoveryResult, assets: Vec<ClassifiedAsset>) -> Self {
        Self {
            scan_id: result.scan_id.clone(),
            account_id: result.account_id.clone(),
            started_at: result.started_at,
            duration_ms: result.duration_ms,
            cancelled: result.cancelled,
            services_scanned: result.services_scanned.clone(),
            regions_scanned: result.regions_scanned.clone(),
            summary: RiskSummary::from_assets(&assets, &result.errors),
            assets,
            errors: result.errors.clone(),
            inventory: None,
        }
    }

    pub fn with_inventory(mut self, stats: UpsertStats) -> Self {
        self.inventory = Some(stats);
        self
    }
}

/// Main output manager
pub struct OutputManager {
    config: OutputConfig,
}

impl OutputManager {
    pub fn new(config: OutputConfig) -> Self {
        Self { config }
    }

    /// Write a discovery report to the configured file or stdout
    pub fn write_report(&self, report: &DiscoveryReport) -> crate::Result<()> {
        let output = match self.config.format {
            OutputFormat::Text => self.format_report_text(report),
            OutputFormat::Json => serde_json::to_string_pretty(report)? + "\n",
        };
        self.emit(&output)
    }

    pub fn write_connection(&self, result: &ConnectionTestResult) -> crate::Result<()> {
        let output = match self.config.format {
            OutputFormat::Text => self.format_connection_text(result),
            OutputFormat::Json => serde_json::to_string_pretty(result)? + "\n",
        };
        self.emit(&output)
    }

    fn emit(&self, output: &str) -> crate::Result<()> {
        match &self.config.file {
            Some(path) => {
                let mut file = File::create(path)
                    .map_err(|e| ArgusError::OutputError(format!("Cannot create {}: {}", path.display(), e)))?;
                file.write_all(output.as_bytes())?;
            }
            None => {
                print!("{}", output);
            }
        }
        Ok(())
    }

    /// Format a report as text
    pub fn format_report_text(&self, report: &DiscoveryReport) -> String {
        let mut output = String::new();

        output.push_str(&self.colorize(
            &format!("Account {}  scan {}\n", report.account_id, report.scan_id),
            "bold",
        ));
        output.push_str(&format!(
            "Regions: {}  Services: {}  Duration: {}ms{}\n\n",
            report.regions_scanned.join(", "),
            report
                .services_scanned
                .iter()
                .map(|s| s.name())
                .collect::<Vec<_>>()
                .join(", "),
            report.duration_ms,
            if report.cancelled { "  (cancelled)" } else { "" }
        ));

        let mut assets: Vec<&ClassifiedAsset> = report.assets.iter().collect();
        assets.sort_by(|a, b| {
            b.classification
                .criticality
                .cmp(&a.classification.criticality)
                .then_with(|| a.arn().cmp(b.arn()))
        });

        if !assets.is_empty() {
            output.push_str(&format!(
                "  {:<9} {:<17} {:<14} {:<32} {:<12} {:<16} {}\n",
                "CRIT", "TYPE", "REGION", "NAME", "ENV", "TEAM", "EXPOSED"
            ));
        }
        for entry in assets {
            let c = &entry.classification;
            let line = format!(
                "  {:<9} {:<17} {:<14} {:<32} {:<12} {:<16} {}\n",
                c.criticality.as_str(),
                entry.asset.resource_type.name(),
                entry.asset.region,
                truncate(&entry.asset.resource_name, 32),
                c.environment.as_ref().map(|e| e.as_str()).unwrap_or("-"),
                truncate(c.team.as_deref().unwrap_or("-"), 16),
                if c.internet_exposed { "yes" } else { "no" }
            );
            output.push_str(&self.colorize(&line, criticality_color(c.criticality)));

            if self.config.verbose {
                for rel in &entry.asset.relationships {
                    output.push_str(&self.colorize(
                        &format!("      {} -> {}\n", rel.relation_type, rel.target_identifier),
                        "gray",
                    ));
                }
                if !entry.matched_rules.is_empty() {
                    output.push_str(&self.colorize(
                        &format!("      rules: {}\n", entry.matched_rules.join(", ")),
                        "gray",
                    ));
                }
            }
        }

        if !report.errors.is_empty() {
            output.push('\n');
            output.push_str(&self.colorize("Errors:\n", "yellow"));
            for err in &report.errors {
                output.push_str(&self.colorize(&format!("  {}\n", err), "yellow"));
            }
        }

        let s = &report.summary;
        output.push('\n');
        output.push_str(&format!(
            "{} assets: {} critical, {} high, {} medium, {} low; {} internet exposed; {} errors\n",
            s.total_assets,
            s.count(Criticality::Critical),
            s.count(Criticality::High),
            s.count(Criticality::Medium),
            s.count(Criticality::Low),
            s.internet_exposed,
            s.errors
        ));
        if let Some(stats) = &report.inventory {
            output.push_str(&format!(
                "Inventory: {} inserted, {} updated, {} unchanged\n",
                stats.inserted, stats.updated, stats.unchanged
            ));
        }
        output
    }

    pub fn format_connection_text(&self, result: &ConnectionTestResult) -> String {
        if result.success {
            let mut output = self.colorize("Connection OK\n", "green");
            output.push_str(&format!(
                "  Account:  {}\n  Identity: {}\n  Regions:  {}\n  Latency:  {}ms\n",
                result.account_id.as_deref().unwrap_or("-"),
                result.identity.as_deref().unwrap_or("-"),
                result.accessible_regions.join(", "),
                result.latency_ms
            ));
            output
        } else {
            self.colorize(
                &format!(
                    "Connection failed: {}\n",
                    result.error.as_deref().unwrap_or("unknown error")
                ),
                "red",
            )
        }
    }

    /// Apply color formatting if enabled
    fn colorize(&self, text: &str, color: &str) -> String {
        if !self.config.colored {
            return text.to_string();
        }
        match color {
            "red" => text.red().to_string(),
            "bright_red" => text.bright_red().bold().to_string(),
            "green" => text.green().to_string(),
            "yellow" => text.yellow().to_string(),
            "cyan" => text.cyan().to_string(),
            "gray" => text.bright_black().to_string(),
            "bold" => text.bold().to_string(),
            _ => text.to_string(),
        }
    }
}

fn criticality_color(level: Criticality) -> &'static str {
    match level {
        Criticality::Critical => "bright_red",
        Criticality::High => "red",
        Criticality::Medium => "yellow",
        Criticality::Low => "plain",
    }
}

fn truncate(s: &str, width: usize) -> String {
    if s.chars().count() <= width {
        s.to_string()
    } else {
        let mut out: String = s.chars().take(width.saturating_sub(1)).collect();
        out.push('~');
        out
    }
}
