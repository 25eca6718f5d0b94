//!
//! Relay Core - cross-module transaction propagation for the Relay platform
//!
//! A business event raised by one module (a sales order, a goods receipt, a
//! finished production run) is turned into a [`Transaction`], durably recorded
//! through a [`BackendGateway`] and then fanned out to every module the
//! transaction type names. Workflows chain such dispatches in order and stop
//! at the first failure.
//!
//! ```text
//!  ModuleFacade ──► TransactionDispatcher ──► BackendGateway
//!       │                    │
//!       │                    └──► ListenerRegistry ──► module listeners
//!       └──► WorkflowEngine ──► TransactionDispatcher (one step at a time)
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

/// Domain layer - transactions, registries, workflows and the gateway contract
pub mod domain;

/// Application services - dispatch, workflow execution and module façades
pub mod application;

/// Core value types shared by every layer
pub mod types;

/// Error types
pub mod error;

// Re-export key types
pub use error::CoreError;
pub use types::{payload_from, AnalyticsPeriod, AnalyticsSnapshot, ModuleId, Payload};

// Re-export main API types for easy use
pub use application::dispatcher::TransactionDispatcher;
pub use application::engine::RelayEngine;
pub use application::module_facade::{FacadeConfig, ModuleFacade, TransactionCache};
pub use application::workflow_engine::WorkflowEngine;
pub use domain::catalogue::Catalogue;
pub use domain::gateway::{BackendGateway, BackendReceipt, GatewayError};
pub use domain::listener::{listener_fn, ListenerError, ListenerHandle, ListenerRegistry, TransactionListener};
pub use domain::transaction::{Transaction, TransactionFactory, TransactionId, TransactionStatus};
pub use domain::transaction_type::{TransactionTypeDefinition, TransactionTypeRegistry};
pub use domain::workflow::{
    StepOutcome, StepStatus, WorkflowDefinition, WorkflowExecutionResult, WorkflowId,
    WorkflowRegistry, WorkflowStep,
};

#[cfg(feature = "testing")]
pub use domain::gateway::memory::{GatewayCall, InMemoryGateway};
