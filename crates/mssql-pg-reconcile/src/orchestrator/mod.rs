//! Reconciliation orchestrator - main workflow coordinator.

mod mapping;

pub use mapping::{match_all, TablePair, TableSelection};

use std::time::{Duration, Instant};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::{Config, ReconcileConfig};
use crate::core::traits::{Connector, RowSource};
use crate::drivers::DriverConnector;
use crate::error::Result;
use crate::verify::{ComparisonResult, RunSummary, TableAuditor};

/// Reconciliation orchestrator.
pub struct Orchestrator {
    config: ReconcileConfig,
    source: Box<dyn Connector>,
    target: Box<dyn Connector>,
    auditor: TableAuditor,
}

/// Result of a connectivity check.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthCheckResult {
    /// Whether the source connection succeeded.
    pub source_connected: bool,

    /// Time to connect and list tables on the source (ms).
    pub source_latency_ms: u64,

    /// Error message if the source check failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_error: Option<String>,

    /// Number of base tables in the source schema.
    pub source_tables: usize,

    /// Whether the target connection succeeded.
    pub target_connected: bool,

    /// Time to connect and list tables on the target (ms).
    pub target_latency_ms: u64,

    /// Error message if the target check failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_error: Option<String>,

    /// Number of base tables in the target schema.
    pub target_tables: usize,

    /// Both sides reachable.
    pub healthy: bool,
}

impl Orchestrator {
    /// Create an orchestrator that connects with the configured drivers.
    pub fn new(config: &Config) -> Self {
        let timeout = Duration::from_secs(config.reconcile.command_timeout_seconds);
        Self::with_connectors(
            config.reconcile.clone(),
            Box::new(DriverConnector::new(config.source.clone(), timeout)),
            Box::new(DriverConnector::new(config.target.clone(), timeout)),
        )
    }

    /// Create an orchestrator over arbitrary connectors.
    pub fn with_connectors(
        config: ReconcileConfig,
        source: Box<dyn Connector>,
        target: Box<dyn Connector>,
    ) -> Self {
        let auditor = TableAuditor::new(&config);
        Self {
            config,
            source,
            target,
            auditor,
        }
    }

    /// Reconcile every selected table pair, one at a time.
    ///
    /// Only table selection failures are returned as errors; everything that
    /// goes wrong for a single table is recorded in its result.
    pub async fn run(&self) -> Result<RunSummary> {
        let start = Instant::now();
        let mut summary = RunSummary::new(self.config.hash_algorithm);
        summary.run_id = uuid::Uuid::new_v4().to_string();
        summary.started_at = Utc::now();

        info!(
            "Starting reconciliation run {}: {} -> {} ({})",
            summary.run_id,
            self.source.describe(),
            self.target.describe(),
            self.config.hash_algorithm
        );

        let pairs = self.resolve_pairs().await?;
        info!("Found {} table pairs to reconcile", pairs.len());

        for pair in &pairs {
            let result = self.reconcile_pair(pair).await;
            summary.add(result);
        }

        summary.completed_at = Utc::now();
        summary.duration_ms = start.elapsed().as_millis() as u64;

        info!(
            "Reconciliation finished: {} matched, {} with differences, {} errored ({:.2}% rows matching)",
            summary.tables_matched,
            summary.tables_with_differences,
            summary.tables_errored,
            summary.match_percentage()
        );
        Ok(summary)
    }

    /// Table pairs covered by the configured selection.
    pub async fn resolve_pairs(&self) -> Result<Vec<TablePair>> {
        let selection = TableSelection::parse(&self.config.tables)?.normalize(
            self.source.identifier_case(),
            self.target.identifier_case(),
        );

        match selection {
            TableSelection::Explicit(pairs) => Ok(pairs),
            TableSelection::All => {
                let source_schema = self.source.schema();
                let target_schema = self.target.schema();
                let source_tables = list_tables(self.source.as_ref(), &source_schema).await?;
                let target_tables = list_tables(self.target.as_ref(), &target_schema).await?;
                Ok(match_all(
                    &source_schema,
                    &source_tables,
                    &target_schema,
                    &target_tables,
                ))
            }
        }
    }

    async fn reconcile_pair(&self, pair: &TablePair) -> ComparisonResult {
        let start = Instant::now();
        let (source, target) = tokio::join!(self.source.connect(), self.target.connect());

        match (source, target) {
            (Ok(source), Ok(target)) => {
                let result = self
                    .auditor
                    .audit(source.as_ref(), target.as_ref(), pair)
                    .await;
                close_all(&[source.as_ref(), target.as_ref()]).await;
                result
            }
            (source, target) => {
                let mut errors = Vec::new();
                let mut opened: Vec<Box<dyn RowSource>> = Vec::new();
                for (side, conn) in [("source", source), ("target", target)] {
                    match conn {
                        Ok(c) => opened.push(c),
                        Err(e) => errors.push(format!("{}: {}", side, e)),
                    }
                }
                let refs: Vec<&dyn RowSource> = opened.iter().map(|c| c.as_ref()).collect();
                close_all(&refs).await;

                let message = errors.join("; ");
                warn!("{} failed: {}", pair.label(), message);
                let mut result =
                    ComparisonResult::new(pair.source.full_name(), pair.target.full_name())
                        .with_error(message);
                result.duration_ms = start.elapsed().as_millis() as u64;
                result
            }
        }
    }

    /// Connect to both sides and list their tables.
    pub async fn health_check(&self) -> HealthCheckResult {
        let (source, target) = tokio::join!(
            check_side(self.source.as_ref()),
            check_side(self.target.as_ref())
        );

        HealthCheckResult {
            source_connected: source.error.is_none(),
            source_latency_ms: source.latency_ms,
            source_tables: source.tables,
            healthy: source.error.is_none() && target.error.is_none(),
            source_error: source.error,
            target_connected: target.error.is_none(),
            target_latency_ms: target.latency_ms,
            target_tables: target.tables,
            target_error: target.error,
        }
    }
}

struct SideCheck {
    latency_ms: u64,
    tables: usize,
    error: Option<String>,
}

async fn check_side(connector: &dyn Connector) -> SideCheck {
    let start = Instant::now();
    let outcome = list_tables(connector, &connector.schema()).await;
    let latency_ms = start.elapsed().as_millis() as u64;
    match outcome {
        Ok(tables) => {
            info!(
                "{}: connected, {} tables ({}ms)",
                connector.describe(),
                tables.len(),
                latency_ms
            );
            SideCheck {
                latency_ms,
                tables: tables.len(),
                error: None,
            }
        }
        Err(e) => {
            warn!("{}: health check failed: {}", connector.describe(), e);
            SideCheck {
                latency_ms,
                tables: 0,
                error: Some(e.to_string()),
            }
        }
    }
}

/// Open a short-lived connection and list the base tables of a schema.
async fn list_tables(connector: &dyn Connector, schema: &str) -> Result<Vec<String>> {
    let conn = connector.connect().await?;
    let tables = conn.list_tables(schema).await;
    conn.close().await;
    tables
}

async fn close_all(sources: &[&dyn RowSource]) {
    for source in sources {
        source.close().await;
    }
}
