use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

use super::transaction::Transaction;
use super::transaction_type::TransactionTypeRegistry;
use crate::{CoreError, ModuleId};

/// One step of a workflow
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowStep {
    /// 1-based position, strictly increasing within a workflow
    pub step_index: u32,

    /// Transaction type dispatched for this step
    pub action: String,

    /// Module the step acts on
    pub module: ModuleId,
}

impl WorkflowStep {
    /// Create a new step
    pub fn new(step_index: u32, action: impl Into<String>, module: impl Into<ModuleId>) -> Self {
        Self {
            step_index,
            action: action.into(),
            module: module.into(),
        }
    }
}

/// Named, ordered list of steps
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowDefinition {
    /// Workflow name
    pub name: String,

    /// Description of the workflow
    #[serde(default)]
    pub description: String,

    /// Steps in execution order
    pub steps: Vec<WorkflowStep>,
}

impl WorkflowDefinition {
    /// Validate step ordering and that every action is a known transaction type
    pub fn validate(&self, types: &TransactionTypeRegistry) -> Result<(), CoreError> {
        if self.steps.is_empty() {
            return Err(CoreError::ValidationError(format!(
                "Workflow {} must have at least one step",
                self.name
            )));
        }

        let mut previous = 0;
        for step in &self.steps {
            if step.step_index <= previous {
                return Err(CoreError::ValidationError(format!(
                    "Workflow {} step indices must be 1-based and strictly increasing (found {} after {})",
                    self.name, step.step_index, previous
                )));
            }
            previous = step.step_index;

            if !types.contains(&step.action) {
                return Err(CoreError::ValidationError(format!(
                    "Workflow {} step {} uses unknown action {}",
                    self.name, step.step_index, step.action
                )));
            }
        }

        Ok(())
    }
}

/// Value object: Workflow execution ID
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkflowId(pub String);

impl WorkflowId {
    /// Allocate a fresh identifier
    pub fn generate() -> Self {
        Self(format!("wf-{}", Uuid::new_v4()))
    }

    /// Get the string representation
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for WorkflowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Outcome of a single step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    /// The step's transaction was recorded
    Completed,
    /// The step's transaction failed; the workflow halted here
    Failed,
}

/// Recorded result of one executed step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepOutcome {
    /// Index of the step
    pub step_index: u32,

    /// Step status
    pub status: StepStatus,

    /// The dispatched transaction, when one was built
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction: Option<Transaction>,

    /// Failure reason
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl StepOutcome {
    pub(crate) fn completed(step_index: u32, transaction: Transaction) -> Self {
        Self {
            step_index,
            status: StepStatus::Completed,
            transaction: Some(transaction),
            error: None,
        }
    }

    pub(crate) fn failed(
        step_index: u32,
        transaction: Option<Transaction>,
        error: impl Into<String>,
    ) -> Self {
        Self {
            step_index,
            status: StepStatus::Failed,
            transaction,
            error: Some(error.into()),
        }
    }
}

/// Result of one workflow invocation
///
/// Steps are appended in order; after the first failed step nothing follows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowExecutionResult {
    /// Unique id of this invocation
    pub workflow_id: WorkflowId,

    /// Name of the executed workflow
    pub workflow_name: String,

    /// Number of steps in the definition
    pub total_steps: usize,

    /// Executed steps in order
    pub steps: Vec<StepOutcome>,
}

impl WorkflowExecutionResult {
    pub(crate) fn new(workflow_id: WorkflowId, workflow_name: &str, total_steps: usize) -> Self {
        Self {
            workflow_id,
            workflow_name: workflow_name.to_string(),
            total_steps,
            steps: Vec::with_capacity(total_steps),
        }
    }

    /// Every step of the definition ran and completed
    pub fn is_success(&self) -> bool {
        self.steps.len() == self.total_steps && self.failed_step().is_none()
    }

    /// The step that halted the workflow, if any
    pub fn failed_step(&self) -> Option<&StepOutcome> {
        self.steps.iter().find(|s| s.status == StepStatus::Failed)
    }

    /// Completed steps in order
    pub fn completed_steps(&self) -> impl Iterator<Item = &StepOutcome> {
        self.steps.iter().filter(|s| s.status == StepStatus::Completed)
    }
}

/// Workflow definitions keyed by name
#[derive(Debug, Clone, Default)]
pub struct WorkflowRegistry {
    definitions: BTreeMap<String, WorkflowDefinition>,
}

impl WorkflowRegistry {
    /// Build a registry, validating each workflow against the type registry
    pub fn new(
        definitions: impl IntoIterator<Item = WorkflowDefinition>,
        types: &TransactionTypeRegistry,
    ) -> Result<Self, CoreError> {
        let mut map = BTreeMap::new();
        for definition in definitions {
            definition.validate(types)?;
            let name = definition.name.clone();
            if map.insert(name.clone(), definition).is_some() {
                return Err(CoreError::ValidationError(format!(
                    "Duplicate workflow: {}",
                    name
                )));
            }
        }
        Ok(Self { definitions: map })
    }

    pub(crate) fn from_map(definitions: BTreeMap<String, WorkflowDefinition>) -> Self {
        Self { definitions }
    }

    /// Validate every workflow against the type registry
    pub fn validate(&self, types: &TransactionTypeRegistry) -> Result<(), CoreError> {
        self.definitions.values().try_for_each(|d| d.validate(types))
    }

    /// Resolve a workflow by name
    pub fn resolve(&self, name: &str) -> Result<&WorkflowDefinition, CoreError> {
        self.definitions
            .get(name)
            .ok_or_else(|| CoreError::UnknownWorkflow(name.to_string()))
    }

    /// All workflow names, sorted
    pub fn workflow_names(&self) -> Vec<&str> {
        self.definitions.keys().map(String::as_str).collect()
    }

    /// Iterate over definitions in name order
    pub fn iter(&self) -> impl Iterator<Item = &WorkflowDefinition> {
        self.definitions.values()
    }

    /// Number of workflows
    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    /// Whether there are no workflows
    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }
}
