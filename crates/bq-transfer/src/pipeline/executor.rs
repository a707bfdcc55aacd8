//! Execution of single steps against the service boundaries.

use std::sync::Arc;

use tracing::{info, warn};

use crate::core::{JobStats, ObjectStore, Warehouse};
use crate::error::Result;

use super::plan::RunPlan;
use super::step::Step;

/// Outcome of a step that did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    /// Marker step, nothing to report.
    Marker,
    /// Remote job completed.
    Job(JobStats),
    /// Cleanup ran; `removed` lists what was deleted.
    Cleaned { removed: Vec<String> },
    /// Step disabled by configuration.
    Skipped,
}

/// Runs one step of a [`RunPlan`] at a time.
///
/// Errors of the data steps propagate unchanged. Cleanup never fails.
#[derive(Clone)]
pub struct StepExecutor {
    warehouse: Arc<dyn Warehouse>,
    store: Arc<dyn ObjectStore>,
}

impl StepExecutor {
    /// Create an executor over the given services.
    pub fn new(warehouse: Arc<dyn Warehouse>, store: Arc<dyn ObjectStore>) -> Self {
        Self { warehouse, store }
    }

    /// Run `step` of `plan`.
    pub async fn execute(&self, step: Step, plan: &RunPlan) -> Result<StepOutcome> {
        match step {
            Step::Start | Step::End => Ok(StepOutcome::Marker),
            Step::Query => {
                let stats = self.warehouse.run_query(&plan.query).await?;
                info!(
                    "{}: materialized {} row(s) into {}",
                    step,
                    fmt_rows(stats.rows),
                    plan.temporary_table
                );
                Ok(StepOutcome::Job(stats))
            }
            Step::Export => {
                let stats = self.warehouse.extract(&plan.extract).await?;
                info!("{}: exported {} to {}", step, plan.temporary_table, plan.export_uri);
                Ok(StepOutcome::Job(stats))
            }
            Step::Load => {
                let stats = self.warehouse.load(&plan.load).await?;
                if stats.bad_records > 0 {
                    warn!(
                        "{}: {} malformed row(s) skipped (tolerance {})",
                        step, stats.bad_records, plan.load.max_bad_records
                    );
                }
                info!(
                    "{}: appended {} row(s) to {}",
                    step,
                    fmt_rows(stats.rows),
                    plan.destination
                );
                Ok(StepOutcome::Job(stats))
            }
            Step::Cleanup if !plan.cleanup => Ok(StepOutcome::Skipped),
            Step::Cleanup => Ok(self.cleanup(plan).await),
        }
    }

    async fn cleanup(&self, plan: &RunPlan) -> StepOutcome {
        let mut removed = Vec::new();

        match self.warehouse.delete_table(&plan.temporary_table).await {
            Ok(()) => removed.push(plan.temporary_table.to_string()),
            Err(e) => warn!(
                "cleanup: could not delete {}: {}",
                plan.temporary_table, e
            ),
        }
        match self.store.delete_object(&plan.export_uri).await {
            Ok(()) => removed.push(plan.export_uri.to_string()),
            Err(e) => warn!("cleanup: could not delete {}: {}", plan.export_uri, e),
        }

        if !removed.is_empty() {
            info!("cleanup: removed {}", removed.join(", "));
        }
        StepOutcome::Cleaned { removed }
    }
}

fn fmt_rows(rows: Option<u64>) -> String {
    rows.map_or_else(|| "?".to_string(), |n| n.to_string())
}
