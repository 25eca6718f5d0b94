/// Transaction type definitions and their registry
pub mod transaction_type;

/// Transaction records, lifecycle and factory
pub mod transaction;

/// Listener registry and callback contract
pub mod listener;

/// Workflow definitions, registry and execution results
pub mod workflow;

/// Built-in and YAML-loaded catalogues of types and workflows
pub mod catalogue;

/// Backend gateway contract
pub mod gateway;
