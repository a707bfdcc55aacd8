//! Run orchestrator - retries, timeout and cancellation around the pipeline.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::core::{JobStats, ObjectStore, Warehouse};
use crate::drivers;
use crate::error::{Result, TransferError};
use crate::pipeline::{new_run_id, PipelineState, RunPlan, Step, StepExecutor, StepOutcome};
use crate::state::{RunState, RunStatus, TaskStatus};

/// Run orchestrator.
pub struct Orchestrator {
    config: Config,
    run_id: String,
    state_file: Option<PathBuf>,
    warehouse: Arc<dyn Warehouse>,
    store: Arc<dyn ObjectStore>,
    executor: StepExecutor,
}

/// Result of a successful run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunResult {
    /// Unique run identifier.
    pub run_id: String,

    /// Workflow identifier.
    pub dag_id: String,

    /// Owner tag of the workflow.
    pub owner: String,

    /// Final status.
    pub status: RunStatus,

    /// Attempts made, including the successful one.
    pub attempts: u32,

    /// When the run started.
    pub started_at: DateTime<Utc>,

    /// When the run completed.
    pub completed_at: DateTime<Utc>,

    /// Total duration in seconds.
    pub duration_seconds: f64,

    /// Rows materialized by the query step.
    pub rows_queried: u64,

    /// Data rows written to the export object.
    pub rows_exported: u64,

    /// Rows appended to the destination.
    pub rows_loaded: u64,

    /// Malformed rows skipped by the load.
    pub bad_records: u64,

    /// Temporary table used by the run.
    pub temporary_table: String,

    /// Export object used by the run.
    pub export_uri: String,
}

/// Result of a health check.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthCheckResult {
    /// Warehouse backend.
    pub warehouse: String,

    /// Object store backend.
    pub object_store: String,

    /// One check per resource.
    pub checks: Vec<ResourceCheck>,

    /// Whether every check succeeded.
    pub healthy: bool,
}

/// Reachability of a single resource.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceCheck {
    /// What was checked, e.g. `source table`.
    pub name: String,

    /// Resource name.
    pub resource: String,

    /// Whether the resource is reachable.
    pub ok: bool,

    /// Check latency in milliseconds.
    pub latency_ms: u64,

    /// Error if the check failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Default)]
struct RowTotals {
    rows_queried: u64,
    rows_exported: u64,
    rows_loaded: u64,
    bad_records: u64,
}

impl RowTotals {
    fn record(&mut self, step: Step, stats: &JobStats) {
        match step {
            Step::Query => self.rows_queried = stats.rows.unwrap_or(0),
            // Extract jobs report bytes only; the export holds the queried rows.
            Step::Export => self.rows_exported = stats.rows.unwrap_or(self.rows_queried),
            Step::Load => {
                self.rows_loaded = stats.rows.unwrap_or(0);
                self.bad_records = stats.bad_records;
            }
            _ => {}
        }
    }
}

impl Orchestrator {
    /// Create an orchestrator over the given services.
    pub fn new(config: Config, warehouse: Arc<dyn Warehouse>, store: Arc<dyn ObjectStore>) -> Self {
        Self {
            config,
            run_id: new_run_id(),
            state_file: None,
            executor: StepExecutor::new(warehouse.clone(), store.clone()),
            warehouse,
            store,
        }
    }

    /// Create an orchestrator connected to BigQuery and Cloud Storage.
    pub fn connect(config: Config) -> Result<Self> {
        let (warehouse, store) = drivers::connect(&config)?;
        Ok(Self::new(config, warehouse, store))
    }

    /// Set the state file path.
    pub fn with_state_file(mut self, path: PathBuf) -> Self {
        self.state_file = Some(path);
        self
    }

    /// Use a caller-supplied run id instead of a generated one.
    pub fn with_run_id(mut self, run_id: impl Into<String>) -> Self {
        self.run_id = run_id.into();
        self
    }

    /// Run identifier.
    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Configuration of the run.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Resolve the plan of the run without calling any service.
    pub fn plan(&self) -> Result<RunPlan> {
        RunPlan::from_config(&self.config, &self.run_id)
    }

    /// Run the pipeline.
    ///
    /// A run dated before the configured `start_date` is refused. A failed
    /// attempt restarts the whole chain from `start` after the retry delay
    /// while attempts remain. The timeout bounds every attempt and delay
    /// together. Cancellation aborts the in-flight remote call; nothing is
    /// cleaned up after a failed, cancelled or timed-out run.
    pub async fn run(&self, cancel: CancellationToken) -> Result<RunResult> {
        let started_at = Utc::now();
        let start_date = self.config.effective_start_date();
        if start_date > started_at {
            return Err(TransferError::Config(format!(
                "{} cannot run before its start_date {}",
                self.config.dag_id,
                start_date.to_rfc3339()
            )));
        }

        let clock = Instant::now();
        let plan = self.plan()?;
        let mut state = RunState::new(plan.run_id.clone(), self.config.hash())
            .with_dag(&self.config.dag_id, &self.config.owner);
        let timeout = self.config.run.timeout();

        info!(
            "Starting run {} of {} (owner {}, {} -> {}, warehouse: {}, object store: {})",
            plan.run_id,
            self.config.dag_id,
            self.config.owner,
            plan.source,
            plan.destination,
            self.warehouse.name(),
            self.store.name()
        );
        if let Some(ref description) = self.config.description {
            debug!("{}: {}", self.config.dag_id, description);
        }
        self.save_state(&state)?;

        let outcome =
            match tokio::time::timeout(timeout, self.run_attempts(&plan, &mut state, &cancel))
                .await
            {
                Ok(outcome) => outcome,
                Err(_) => Err(TransferError::Timeout(timeout)),
            };

        let attempts = state.attempts.len() as u32;
        let totals = match outcome {
            Ok(totals) => totals,
            Err(e) => {
                let status = match e {
                    TransferError::Cancelled => RunStatus::Cancelled,
                    TransferError::Timeout(_) => RunStatus::TimedOut,
                    _ => RunStatus::Failed,
                };
                state.finish(status, Some(e.to_string()));
                if let Err(save_err) = self.save_state(&state) {
                    warn!("Could not save final state: {}", save_err);
                }
                error!(
                    "Run {} {:?} after {} attempt(s): {}",
                    plan.run_id, status, attempts, e
                );
                return Err(e);
            }
        };

        state.finish(RunStatus::Completed, None);
        self.save_state(&state)?;

        let completed_at = Utc::now();
        let result = RunResult {
            run_id: plan.run_id.clone(),
            dag_id: self.config.dag_id.clone(),
            owner: self.config.owner.clone(),
            status: RunStatus::Completed,
            attempts,
            started_at,
            completed_at,
            duration_seconds: clock.elapsed().as_secs_f64(),
            rows_queried: totals.rows_queried,
            rows_exported: totals.rows_exported,
            rows_loaded: totals.rows_loaded,
            bad_records: totals.bad_records,
            temporary_table: plan.temporary_table.to_string(),
            export_uri: plan.export_uri.to_string(),
        };

        info!(
            "Run {} completed: {} rows queried, {} exported, {} loaded in {:.1}s ({} attempt(s))",
            result.run_id,
            result.rows_queried,
            result.rows_exported,
            result.rows_loaded,
            result.duration_seconds,
            result.attempts
        );

        Ok(result)
    }

    async fn run_attempts(
        &self,
        plan: &RunPlan,
        state: &mut RunState,
        cancel: &CancellationToken,
    ) -> Result<RowTotals> {
        let max_attempts = self.config.run.max_attempts();
        let mut attempt = 1;

        loop {
            match self.run_attempt(plan, attempt, state, cancel).await {
                Ok(totals) => return Ok(totals),
                Err(e) if e.is_retryable() && attempt < max_attempts => {
                    let delay = self.config.run.retry_delay();
                    warn!(
                        "Attempt {}/{} failed: {}. Restarting from {} in {:?}",
                        attempt,
                        max_attempts,
                        e,
                        Step::Start,
                        delay
                    );
                    tokio::select! {
                        _ = cancel.cancelled() => return Err(TransferError::Cancelled),
                        _ = tokio::time::sleep(delay) => {}
                    }
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn run_attempt(
        &self,
        plan: &RunPlan,
        attempt: u32,
        state: &mut RunState,
        cancel: &CancellationToken,
    ) -> Result<RowTotals> {
        info!("Attempt {} of run {}", attempt, plan.run_id);
        state.begin_attempt(attempt);

        let mut pipeline = PipelineState::new();
        let mut totals = RowTotals::default();

        while let Some(step) = pipeline.current() {
            debug!("{}: started", step);
            state.begin_step(step)?;
            self.save_state(state)?;

            let outcome = if step.is_data_step() {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => Err(TransferError::Cancelled),
                    outcome = self.executor.execute(step, plan) => outcome,
                }
            } else {
                self.executor.execute(step, plan).await
            };

            match outcome {
                Ok(outcome) => {
                    let (status, stats) = match outcome {
                        StepOutcome::Job(stats) => {
                            totals.record(step, &stats);
                            (TaskStatus::Completed, Some(stats))
                        }
                        StepOutcome::Skipped => (TaskStatus::Skipped, None),
                        StepOutcome::Marker | StepOutcome::Cleaned { .. } => {
                            (TaskStatus::Completed, None)
                        }
                    };
                    state.finish_step(step, status, stats, None)?;
                    pipeline.advance()?;
                    state.set_pipeline(pipeline)?;
                }
                Err(e) => {
                    warn!("{}: failed: {}", step, e);
                    state.finish_step(step, TaskStatus::Failed, None, Some(e.to_string()))?;
                    pipeline.fail()?;
                    state.set_pipeline(pipeline)?;
                    self.save_state(state)?;
                    return Err(e);
                }
            }
        }

        self.save_state(state)?;
        Ok(totals)
    }

    /// Save state to file.
    fn save_state(&self, state: &RunState) -> Result<()> {
        if let Some(ref path) = self.state_file {
            state.save(path)?;
        }
        Ok(())
    }

    /// Check the source table, destination table and export bucket.
    pub async fn health_check(&self) -> Result<HealthCheckResult> {
        let source = self.config.source_table()?;
        let destination = self.config.destination_table()?;
        let bucket = self.config.export.bucket.clone();

        let mut checks = Vec::with_capacity(3);

        let start = Instant::now();
        let outcome = self.warehouse.table_info(&source).await.map(|_| ());
        checks.push(ResourceCheck::from_result("source table", source.to_string(), start, outcome));

        let start = Instant::now();
        let outcome = self.warehouse.table_info(&destination).await.map(|_| ());
        checks.push(ResourceCheck::from_result(
            "destination table",
            destination.to_string(),
            start,
            outcome,
        ));

        let start = Instant::now();
        let outcome = match self.store.bucket_exists(&bucket).await {
            Ok(true) => Ok(()),
            Ok(false) => Err(TransferError::reference(format!("Not found: bucket {}", bucket))),
            Err(e) => Err(e),
        };
        checks.push(ResourceCheck::from_result("export bucket", bucket, start, outcome));

        for check in checks.iter().filter(|c| !c.ok) {
            warn!(
                "Health check {} ({}) failed: {}",
                check.name,
                check.resource,
                check.error.as_deref().unwrap_or("")
            );
        }

        Ok(HealthCheckResult {
            warehouse: self.warehouse.name().to_string(),
            object_store: self.store.name().to_string(),
            healthy: checks.iter().all(|c| c.ok),
            checks,
        })
    }
}

impl ResourceCheck {
    fn from_result(name: &str, resource: String, start: Instant, result: Result<()>) -> Self {
        Self {
            name: name.to_string(),
            resource,
            ok: result.is_ok(),
            latency_ms: start.elapsed().as_millis() as u64,
            error: result.err().map(|e| e.to_string()),
        }
    }
}

impl RunResult {
    /// Convert to JSON string.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Column, FieldType, TableRef, TableSchema};
    use crate::drivers::memory::{MemoryObjectStore, MemoryWarehouse};

    const YAML: &str = r#"
source:
  project: my-project
  dataset: src
  table: emp
export:
  bucket: exports
  file_name: emp.csv
destination:
  project: my-project
  dataset: dst
  table: emp_all
"#;

    fn orchestrator(with_tables: bool) -> (Arc<MemoryWarehouse>, Orchestrator) {
        let store = Arc::new(MemoryObjectStore::with_buckets(["exports"]));
        let wh = Arc::new(MemoryWarehouse::new(store.clone()));
        if with_tables {
            wh.create_table(
                &TableRef::new("my-project", "src", "emp").unwrap(),
                TableSchema::new(vec![Column::new("id", FieldType::Integer)]),
                vec![vec![Some("1".into())]],
            );
            wh.create_table(
                &TableRef::new("my-project", "dst", "emp_all").unwrap(),
                TableSchema::new(vec![
                    Column::new("country", FieldType::String),
                    Column::new("id", FieldType::Integer),
                ]),
                vec![],
            );
        }
        let config = Config::from_yaml(YAML).unwrap();
        (wh.clone(), Orchestrator::new(config, wh, store))
    }

    #[tokio::test]
    async fn test_run_reports_counts() {
        let (wh, orch) = orchestrator(true);
        let result = orch.run(CancellationToken::new()).await.unwrap();
        assert_eq!(result.status, RunStatus::Completed);
        assert_eq!(result.attempts, 1);
        assert_eq!(result.rows_queried, 1);
        assert_eq!(result.rows_exported, 1);
        assert_eq!(result.rows_loaded, 1);
        assert_eq!(
            wh.row_count(&TableRef::new("my-project", "dst", "emp_all").unwrap()),
            Some(1)
        );

        let json = result.to_json().unwrap();
        assert!(json.contains("\"status\": \"completed\""));
    }

    #[tokio::test]
    async fn test_health_check() {
        let (_, orch) = orchestrator(true);
        let health = orch.health_check().await.unwrap();
        assert!(health.healthy);
        assert_eq!(health.checks.len(), 3);
        assert_eq!(health.warehouse, "memory");

        let (_, orch) = orchestrator(false);
        let health = orch.health_check().await.unwrap();
        assert!(!health.healthy);
        assert!(!health.checks[0].ok);
        assert!(health.checks[2].ok);
    }

    #[test]
    fn test_plan_uses_run_id() {
        let (_, orch) = orchestrator(false);
        let orch = orch.with_run_id("manual-1");
        let plan = orch.plan().unwrap();
        assert_eq!(plan.run_id, "manual-1");
        assert_eq!(plan.temporary_table.table, "temporary_table_manual1");
        assert_eq!(plan.export_uri.object, "emp_manual1.csv");
    }
}
