//! # bq-transfer
//!
//! BigQuery to Cloud Storage to BigQuery transfer pipeline.
//!
//! One run queries a source table into a temporary table, exports that table
//! to a CSV object, and appends the object to a destination table:
//!
//! - **Tagged query**: `SELECT '<tag>', a.* FROM <source> a`, overwrite
//! - **CSV export** with header row to a single object
//! - **Bulk load** with append semantics and a malformed-row tolerance
//! - **Per-run resources** suffixed with the run id and cleaned up afterwards
//! - **Whole-run retry**, run timeout and cancellation
//! - **Run state** recorded in a JSON file
//!
//! ## Example
//!
//! ```rust,no_run
//! use bq_transfer::{Config, Orchestrator};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> bq_transfer::Result<()> {
//!     let config = Config::load("config.yaml")?;
//!     let orchestrator = Orchestrator::connect(config)?;
//!     let result = orchestrator.run(CancellationToken::new()).await?;
//!     println!("Loaded {} rows", result.rows_loaded);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod core;
pub mod drivers;
pub mod error;
pub mod orchestrator;
pub mod pipeline;
pub mod state;

// Re-exports for convenient access
pub use config::Config;
pub use core::{ObjectStore, ObjectUri, TableRef, Warehouse};
pub use error::{Result, TransferError};
pub use orchestrator::{HealthCheckResult, Orchestrator, RunResult};
pub use pipeline::{RunPlan, Step};
pub use state::{RunState, RunStatus};
