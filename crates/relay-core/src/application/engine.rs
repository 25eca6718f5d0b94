use std::sync::Arc;
use tracing::info;

use super::dispatcher::TransactionDispatcher;
use super::module_facade::{FacadeConfig, ModuleFacade};
use super::workflow_engine::WorkflowEngine;
use crate::domain::catalogue::Catalogue;
use crate::domain::gateway::BackendGateway;
use crate::domain::listener::ListenerRegistry;
use crate::domain::transaction::{Transaction, TransactionFactory};
use crate::domain::transaction_type::TransactionTypeRegistry;
use crate::domain::workflow::{WorkflowExecutionResult, WorkflowRegistry};
use crate::{CoreError, ModuleId, Payload};

/// The wired-up engine: registries, dispatcher and workflow engine sharing
/// one gateway and one listener registry.
///
/// Cloning is cheap; every clone refers to the same registries.
#[derive(Clone)]
pub struct RelayEngine {
    types: Arc<TransactionTypeRegistry>,
    workflows: Arc<WorkflowRegistry>,
    listeners: Arc<ListenerRegistry>,
    dispatcher: Arc<TransactionDispatcher>,
    workflow_engine: Arc<WorkflowEngine>,
    gateway: Arc<dyn BackendGateway>,
}

impl RelayEngine {
    /// Wire an engine from a catalogue and a gateway
    pub fn new(catalogue: Catalogue, gateway: Arc<dyn BackendGateway>) -> Self {
        let (types, workflows) = catalogue.into_parts();
        let types = Arc::new(types);
        let workflows = Arc::new(workflows);
        let listeners = Arc::new(ListenerRegistry::new());

        let dispatcher = Arc::new(TransactionDispatcher::new(
            TransactionFactory::new(types.clone()),
            gateway.clone(),
            listeners.clone(),
        ));
        let workflow_engine = Arc::new(WorkflowEngine::new(workflows.clone(), dispatcher.clone()));

        info!(
            transaction_types = types.len(),
            workflows = workflows.len(),
            "Relay engine ready"
        );

        Self {
            types,
            workflows,
            listeners,
            dispatcher,
            workflow_engine,
            gateway,
        }
    }

    /// Transaction type registry
    pub fn types(&self) -> &Arc<TransactionTypeRegistry> {
        &self.types
    }

    /// Workflow registry
    pub fn workflows(&self) -> &Arc<WorkflowRegistry> {
        &self.workflows
    }

    /// Listener registry
    pub fn listeners(&self) -> &Arc<ListenerRegistry> {
        &self.listeners
    }

    /// Transaction dispatcher
    pub fn dispatcher(&self) -> &Arc<TransactionDispatcher> {
        &self.dispatcher
    }

    /// Workflow engine
    pub fn workflow_engine(&self) -> &Arc<WorkflowEngine> {
        &self.workflow_engine
    }

    /// Backend gateway
    pub fn gateway(&self) -> &Arc<dyn BackendGateway> {
        &self.gateway
    }

    /// Dispatch a single transaction
    pub async fn dispatch(&self, type_name: &str, payload: Payload) -> Result<Transaction, CoreError> {
        self.dispatcher.dispatch(type_name, payload).await
    }

    /// Execute a named workflow
    pub async fn execute_workflow(
        &self,
        workflow_name: &str,
        payload: Payload,
    ) -> Result<WorkflowExecutionResult, CoreError> {
        self.workflow_engine.execute_workflow(workflow_name, payload).await
    }

    /// Activate a module façade with default settings
    pub async fn activate(&self, module: impl Into<ModuleId>) -> ModuleFacade {
        ModuleFacade::activate(self, module, FacadeConfig::default()).await
    }

    /// Activate a module façade with explicit settings
    pub async fn activate_with(&self, module: impl Into<ModuleId>, config: FacadeConfig) -> ModuleFacade {
        ModuleFacade::activate(self, module, config).await
    }
}

impl std::fmt::Debug for RelayEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RelayEngine")
            .field("transaction_types", &self.types.len())
            .field("workflows", &self.workflows.len())
            .field("listeners", &self.listeners)
            .finish()
    }
}
