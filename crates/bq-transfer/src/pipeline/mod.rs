//! Transfer pipeline: `start -> execute_query -> extract_to_gcs -> load_csv
//! -> cleanup -> end`.
//!
//! - [`Step`] and [`PipelineState`]: the steps and the per-attempt state
//!   machine
//! - [`RunPlan`]: every resource name and job request of a run, resolved
//!   once from the configuration
//! - [`StepExecutor`]: runs one step against the warehouse and object store
//!
//! Steps run strictly in sequence. Retries, timeouts and cancellation belong
//! to the orchestrator, which restarts the whole chain from `start`.

mod executor;
mod plan;
mod step;

pub use executor::{StepExecutor, StepOutcome};
pub use plan::{new_run_id, run_suffix, RunPlan};
pub use step::{PipelineState, Step};
