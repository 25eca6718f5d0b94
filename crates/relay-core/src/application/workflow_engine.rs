use serde_json::json;
use std::sync::Arc;
use tracing::{info, warn};

use super::dispatcher::TransactionDispatcher;
use crate::domain::transaction::TransactionStatus;
use crate::domain::workflow::{
    StepOutcome, WorkflowExecutionResult, WorkflowId, WorkflowRegistry, WorkflowStep,
};
use crate::{CoreError, Payload};

/// Runs named workflows one step at a time, halting on the first failure
pub struct WorkflowEngine {
    workflows: Arc<WorkflowRegistry>,
    dispatcher: Arc<TransactionDispatcher>,
}

impl WorkflowEngine {
    /// Create a new workflow engine
    pub fn new(workflows: Arc<WorkflowRegistry>, dispatcher: Arc<TransactionDispatcher>) -> Self {
        Self {
            workflows,
            dispatcher,
        }
    }

    /// The registry workflows are resolved against
    pub fn workflows(&self) -> &WorkflowRegistry {
        &self.workflows
    }

    /// Execute a workflow.
    ///
    /// Each step's dispatch reaches a terminal status before the next step
    /// starts. A failed step is recorded and ends the run.
    pub async fn execute_workflow(
        &self,
        workflow_name: &str,
        payload: Payload,
    ) -> Result<WorkflowExecutionResult, CoreError> {
        let definition = self.workflows.resolve(workflow_name)?;
        let workflow_id = WorkflowId::generate();

        info!(
            workflow_id = %workflow_id,
            workflow = workflow_name,
            steps = definition.steps.len(),
            "Starting workflow"
        );

        let mut result =
            WorkflowExecutionResult::new(workflow_id.clone(), workflow_name, definition.steps.len());

        for step in &definition.steps {
            let step_payload = step_payload(&payload, &workflow_id, step);

            match self.dispatcher.dispatch(&step.action, step_payload).await {
                Ok(transaction) if transaction.status() == TransactionStatus::Completed => {
                    result
                        .steps
                        .push(StepOutcome::completed(step.step_index, transaction));
                }
                Ok(transaction) => {
                    let error = transaction
                        .error()
                        .unwrap_or("transaction did not complete")
                        .to_string();
                    warn!(
                        workflow_id = %workflow_id,
                        step_index = step.step_index,
                        action = %step.action,
                        error = %error,
                        "Workflow step failed, halting"
                    );
                    result
                        .steps
                        .push(StepOutcome::failed(step.step_index, Some(transaction), error));
                    break;
                }
                Err(err) => {
                    warn!(
                        workflow_id = %workflow_id,
                        step_index = step.step_index,
                        action = %step.action,
                        error = %err,
                        "Workflow step could not be dispatched, halting"
                    );
                    result
                        .steps
                        .push(StepOutcome::failed(step.step_index, None, err.to_string()));
                    break;
                }
            }
        }

        info!(
            workflow_id = %workflow_id,
            workflow = workflow_name,
            executed = result.steps.len(),
            success = result.is_success(),
            "Workflow finished"
        );

        Ok(result)
    }
}

/// The caller's payload plus the step bookkeeping keys
fn step_payload(payload: &Payload, workflow_id: &WorkflowId, step: &WorkflowStep) -> Payload {
    let mut merged = payload.clone();
    merged.insert("workflowId".to_string(), json!(workflow_id));
    merged.insert("stepIndex".to_string(), json!(step.step_index));
    merged.insert("module".to_string(), json!(step.module));
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payload_from;

    #[test]
    fn test_step_payload_merges_bookkeeping() {
        let payload = payload_from(json!({"batch": "B-7", "stepIndex": 99}));
        let workflow_id = WorkflowId("wf-1".to_string());
        let step = WorkflowStep::new(2, "MATERIAL_CONSUMED", "inventory");

        let merged = step_payload(&payload, &workflow_id, &step);
        assert_eq!(merged.get("batch"), Some(&json!("B-7")));
        assert_eq!(merged.get("workflowId"), Some(&json!("wf-1")));
        assert_eq!(merged.get("stepIndex"), Some(&json!(2)));
        assert_eq!(merged.get("module"), Some(&json!("inventory")));
        // The caller's payload is left untouched
        assert_eq!(payload.get("stepIndex"), Some(&json!(99)));
    }
}
