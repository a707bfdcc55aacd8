//! File-based run state.
//!
//! The state file records every attempt of a run and every step of each
//! attempt, so operators can see where a failed run stopped and which
//! intermediate resources it left behind.

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::JobStats;
use crate::error::{Result, TransferError};
use crate::pipeline::{PipelineState, Step};

/// State of one run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunState {
    /// Unique run identifier.
    pub run_id: String,

    /// Workflow identifier.
    #[serde(default)]
    pub dag_id: String,

    /// Owner tag of the workflow.
    #[serde(default)]
    pub owner: String,

    /// SHA256 hash of the configuration.
    pub config_hash: String,

    /// When the run started.
    pub started_at: DateTime<Utc>,

    /// Current run status.
    pub status: RunStatus,

    /// Attempts in order; a retry appends a new one.
    #[serde(default)]
    pub attempts: Vec<AttemptState>,

    /// When the run finished (if finished).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,

    /// Final error, if the run failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Overall run status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Running,
    Completed,
    Failed,
    Cancelled,
    TimedOut,
}

/// One pass through the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttemptState {
    /// 1-based attempt number.
    pub attempt: u32,

    /// When the attempt started.
    pub started_at: DateTime<Utc>,

    /// Pipeline state reached.
    pub pipeline: PipelineState,

    /// Steps started in this attempt.
    #[serde(default)]
    pub steps: Vec<StepState>,
}

/// Record of one step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepState {
    /// The step.
    pub step: Step,

    /// Task status.
    pub status: TaskStatus,

    /// When the step started.
    pub started_at: DateTime<Utc>,

    /// When the step finished.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,

    /// Remote job statistics, for data steps.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stats: Option<JobStats>,

    /// Error message if failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Task status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    InProgress,
    Completed,
    Failed,
    Skipped,
}

impl RunState {
    /// Create a new run state.
    pub fn new(run_id: String, config_hash: String) -> Self {
        Self {
            run_id,
            dag_id: String::new(),
            owner: String::new(),
            config_hash,
            started_at: Utc::now(),
            status: RunStatus::Running,
            attempts: Vec::new(),
            completed_at: None,
            error: None,
        }
    }

    /// Tag the state with the workflow it belongs to.
    pub fn with_dag(mut self, dag_id: &str, owner: &str) -> Self {
        self.dag_id = dag_id.to_string();
        self.owner = owner.to_string();
        self
    }

    /// Load state from a file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Save state to a file (atomic write).
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let content = serde_json::to_string_pretty(self)?;

        // Atomic write: write to temp file, then rename
        let temp_path = path.with_extension("tmp");
        std::fs::write(&temp_path, &content)?;
        std::fs::rename(&temp_path, path)?;

        Ok(())
    }

    /// Start a new attempt.
    pub fn begin_attempt(&mut self, attempt: u32) {
        self.attempts.push(AttemptState {
            attempt,
            started_at: Utc::now(),
            pipeline: PipelineState::new(),
            steps: Vec::new(),
        });
    }

    /// The attempt in progress.
    pub fn current_attempt(&self) -> Option<&AttemptState> {
        self.attempts.last()
    }

    fn attempt_mut(&mut self) -> Result<&mut AttemptState> {
        self.attempts.last_mut().ok_or_else(|| {
            TransferError::InvalidTransition("no attempt in progress".to_string())
        })
    }

    fn step_mut(&mut self, step: Step) -> Result<&mut StepState> {
        self.attempt_mut()?
            .steps
            .iter_mut()
            .rev()
            .find(|s| s.step == step)
            .ok_or_else(|| TransferError::InvalidTransition(format!("step {} not started", step)))
    }

    /// Record the start of a step.
    pub fn begin_step(&mut self, step: Step) -> Result<()> {
        self.attempt_mut()?.steps.push(StepState {
            step,
            status: TaskStatus::InProgress,
            started_at: Utc::now(),
            completed_at: None,
            stats: None,
            error: None,
        });
        Ok(())
    }

    /// Record the end of a step.
    pub fn finish_step(
        &mut self,
        step: Step,
        status: TaskStatus,
        stats: Option<JobStats>,
        error: Option<String>,
    ) -> Result<()> {
        let record = self.step_mut(step)?;
        record.status = status;
        record.completed_at = Some(Utc::now());
        record.stats = stats;
        record.error = error;
        Ok(())
    }

    /// Record the pipeline state of the current attempt.
    pub fn set_pipeline(&mut self, pipeline: PipelineState) -> Result<()> {
        self.attempt_mut()?.pipeline = pipeline;
        Ok(())
    }

    /// Close the run. Any step still in progress is marked failed.
    pub fn finish(&mut self, status: RunStatus, error: Option<String>) {
        let now = Utc::now();
        for attempt in &mut self.attempts {
            for step in &mut attempt.steps {
                if step.status == TaskStatus::InProgress {
                    step.status = TaskStatus::Failed;
                    step.completed_at = Some(now);
                    step.error = error.clone();
                }
            }
        }
        self.status = status;
        self.error = error;
        self.completed_at = Some(now);
    }
}
