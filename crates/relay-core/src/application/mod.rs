/// Transaction dispatch and fan-out
pub mod dispatcher;

/// Sequential, fail-fast workflow execution
pub mod workflow_engine;

/// Per-module façade consumed by dashboards
pub mod module_facade;

/// Engine bundle wiring registries, dispatcher and workflow engine
pub mod engine;
