//! Pipeline steps and the run state machine.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Result, TransferError};

/// One node of the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    /// Entry marker. No-op.
    Start,
    /// Materialize the tagged select into the temporary table.
    Query,
    /// Export the temporary table to the object store.
    Export,
    /// Append the exported object to the destination table.
    Load,
    /// Delete the temporary table and exported object.
    Cleanup,
    /// Exit marker. No-op.
    End,
}

impl Step {
    /// Every step in execution order.
    pub const ALL: [Step; 6] = [
        Step::Start,
        Step::Query,
        Step::Export,
        Step::Load,
        Step::Cleanup,
        Step::End,
    ];

    /// Task id of the step.
    pub fn task_id(&self) -> &'static str {
        match self {
            Step::Start => "start",
            Step::Query => "execute_query",
            Step::Export => "extract_to_gcs",
            Step::Load => "load_csv",
            Step::Cleanup => "cleanup",
            Step::End => "end",
        }
    }

    /// The step that follows, `None` after [`Step::End`].
    pub fn next(&self) -> Option<Step> {
        match self {
            Step::Start => Some(Step::Query),
            Step::Query => Some(Step::Export),
            Step::Export => Some(Step::Load),
            Step::Load => Some(Step::Cleanup),
            Step::Cleanup => Some(Step::End),
            Step::End => None,
        }
    }

    /// Whether the step calls a remote service and can fail the run.
    pub fn is_data_step(&self) -> bool {
        matches!(self, Step::Query | Step::Export | Step::Load)
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.task_id())
    }
}

/// State of one pass through the pipeline.
///
/// ```text
/// Start -> Query -> Export -> Load -> Cleanup -> End -> Completed
///            |        |        |
///            +--------+--------+--> Failed
/// ```
///
/// `Completed` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "state", content = "step")]
pub enum PipelineState {
    /// Step about to run or running.
    Running(Step),
    /// End marker passed.
    Completed,
    /// A data step failed.
    Failed(Step),
}

impl Default for PipelineState {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineState {
    /// Fresh state positioned at [`Step::Start`].
    pub fn new() -> Self {
        PipelineState::Running(Step::Start)
    }

    /// Step currently running, if any.
    pub fn current(&self) -> Option<Step> {
        match self {
            PipelineState::Running(step) => Some(*step),
            _ => None,
        }
    }

    /// Whether no further transition is possible.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, PipelineState::Running(_))
    }

    /// Mark the current step successful and move to the next.
    pub fn advance(&mut self) -> Result<PipelineState> {
        let next = match *self {
            PipelineState::Running(step) => match step.next() {
                Some(next) => PipelineState::Running(next),
                None => PipelineState::Completed,
            },
            terminal => {
                return Err(TransferError::InvalidTransition(format!(
                    "cannot advance from {:?}",
                    terminal
                )))
            }
        };
        *self = next;
        Ok(next)
    }

    /// Mark the current step failed.
    ///
    /// Only data steps can fail; markers and cleanup never do.
    pub fn fail(&mut self) -> Result<PipelineState> {
        match *self {
            PipelineState::Running(step) if step.is_data_step() => {
                *self = PipelineState::Failed(step);
                Ok(*self)
            }
            other => Err(TransferError::InvalidTransition(format!(
                "cannot fail from {:?}",
                other
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_ids() {
        let ids: Vec<_> = Step::ALL.iter().map(|s| s.to_string()).collect();
        assert_eq!(
            ids,
            vec![
                "start",
                "execute_query",
                "extract_to_gcs",
                "load_csv",
                "cleanup",
                "end"
            ]
        );
    }

    #[test]
    fn test_happy_path() {
        let mut state = PipelineState::new();
        let mut visited = vec![state.current().unwrap()];
        while let PipelineState::Running(_) = state.advance().unwrap() {
            visited.push(state.current().unwrap());
        }
        assert_eq!(visited, Step::ALL.to_vec());
        assert_eq!(state, PipelineState::Completed);
        assert!(state.advance().is_err());
    }

    #[test]
    fn test_failed_is_absorbing() {
        let mut state = PipelineState::new();
        state.advance().unwrap();
        state.advance().unwrap();
        assert_eq!(state.fail().unwrap(), PipelineState::Failed(Step::Export));
        assert!(state.is_terminal());
        assert!(state.advance().is_err());
        assert!(state.fail().is_err());
        assert_eq!(state, PipelineState::Failed(Step::Export));
    }

    #[test]
    fn test_markers_cannot_fail() {
        let mut state = PipelineState::new();
        assert!(state.fail().is_err());
        assert_eq!(state, PipelineState::Running(Step::Start));

        let mut state = PipelineState::Running(Step::Cleanup);
        assert!(state.fail().is_err());
    }

    #[test]
    fn test_state_serialization() {
        let json = serde_json::to_string(&PipelineState::Failed(Step::Load)).unwrap();
        assert_eq!(json, r#"{"state":"failed","step":"load"}"#);
        let json = serde_json::to_string(&PipelineState::Completed).unwrap();
        assert_eq!(json, r#"{"state":"completed"}"#);
    }
}
