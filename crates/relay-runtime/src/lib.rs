//! Relay runtime: configuration, engine wiring and command execution.

pub mod config;
pub mod error;

use clap::{Parser, Subcommand};
use relay_core::{
    payload_from, BackendGateway, Catalogue, InMemoryGateway, ModuleFacade, ModuleId, Payload,
    RelayEngine,
};
use relay_gateway_http::HttpBackendGateway;
use serde_json::{json, Map, Value};
use std::sync::Arc;
use tracing::info;

pub use config::RuntimeConfig;
pub use error::{RuntimeError, RuntimeResult};

/// Command line of the `relay` binary
#[derive(Parser, Debug)]
#[command(name = "relay", author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

impl Cli {
    /// The requested command; no subcommand prints the catalogue
    pub fn into_command(self) -> Command {
        self.command.unwrap_or(Command::Catalogue)
    }
}

/// What the `relay` binary was asked to do
#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Print the catalogue
    Catalogue,

    /// Execute a named workflow
    Run {
        /// Workflow name
        workflow: String,
        /// Caller payload as a JSON object
        #[arg(value_parser = parse_payload, default_value = "{}")]
        payload: Payload,
    },

    /// Dispatch a single transaction
    Dispatch {
        /// Transaction type
        #[arg(value_name = "TYPE")]
        type_name: String,
        /// Caller payload as a JSON object
        #[arg(value_parser = parse_payload, default_value = "{}")]
        payload: Payload,
    },
}

impl Command {
    /// Whether the command dispatches transactions, so module façades should be listening
    pub fn needs_modules(&self) -> bool {
        !matches!(self, Command::Catalogue)
    }
}

fn parse_payload(raw: &str) -> Result<Payload, String> {
    let value: Value =
        serde_json::from_str(raw).map_err(|e| format!("payload is not valid JSON: {}", e))?;
    Ok(payload_from(value))
}

/// Read the configured catalogue, or the built-in one
pub fn load_catalogue(config: &RuntimeConfig) -> RuntimeResult<Catalogue> {
    match &config.catalogue_file {
        Some(path) => {
            let yaml = std::fs::read_to_string(path).map_err(|source| RuntimeError::CatalogueFile {
                path: path.clone(),
                source,
            })?;
            let catalogue = Catalogue::from_yaml(&yaml)?;
            info!(path = %path.display(), "Loaded catalogue file");
            Ok(catalogue)
        }
        None => Ok(Catalogue::builtin()),
    }
}

/// Gateway selected by the backend URL
pub fn build_gateway(config: &RuntimeConfig) -> RuntimeResult<Arc<dyn BackendGateway>> {
    if config.uses_memory_backend() {
        info!("Using in-memory backend");
        return Ok(Arc::new(InMemoryGateway::new()));
    }

    let mut gateway = HttpBackendGateway::new(&config.backend_url, config.request_timeout())?;
    if let Some(token) = &config.api_token {
        gateway = gateway.with_api_token(token);
    }
    info!(backend_url = %gateway.base_url(), "Using HTTP backend");
    Ok(Arc::new(gateway))
}

/// Catalogue plus gateway, wired into an engine
pub fn build_engine(config: &RuntimeConfig) -> RuntimeResult<RelayEngine> {
    let catalogue = load_catalogue(config)?;
    let gateway = build_gateway(config)?;
    Ok(RelayEngine::new(catalogue, gateway))
}

/// Modules to activate: the configured list, or every module the catalogue mentions
pub fn modules_to_activate(engine: &RelayEngine, config: &RuntimeConfig) -> Vec<ModuleId> {
    if config.modules.is_empty() {
        engine.types().modules().into_iter().collect()
    } else {
        config.modules.clone()
    }
}

/// Activate one façade per module
pub async fn activate_modules(engine: &RelayEngine, config: &RuntimeConfig) -> Vec<ModuleFacade> {
    let mut facades = Vec::new();
    for module in modules_to_activate(engine, config) {
        facades.push(engine.activate_with(module, config.facade_config()).await);
    }
    facades
}

/// Catalogue as a JSON document
pub fn describe_catalogue(engine: &RelayEngine) -> Value {
    let types: Map<String, Value> = engine
        .types()
        .iter()
        .map(|(name, definition)| (name.to_string(), json!(definition)))
        .collect();
    let workflows: Vec<Value> = engine.workflows().iter().map(|w| json!(w)).collect();

    json!({
        "transaction_types": types,
        "workflows": workflows,
    })
}

/// Execute a command, returning the JSON document to print
pub async fn run(engine: &RelayEngine, command: Command) -> RuntimeResult<Value> {
    match command {
        Command::Catalogue => Ok(describe_catalogue(engine)),
        Command::Run { workflow, payload } => {
            let result = engine.execute_workflow(&workflow, payload).await?;
            Ok(json!(result))
        }
        Command::Dispatch { type_name, payload } => {
            let transaction = engine.dispatch(&type_name, payload).await?;
            Ok(json!(transaction))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::error::ErrorKind;
    use clap::CommandFactory;

    fn parse(args: &[&str]) -> Result<Command, clap::Error> {
        Cli::try_parse_from(std::iter::once("relay").chain(args.iter().copied())).map(Cli::into_command)
    }

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_commands() {
        assert_eq!(parse(&[]).unwrap(), Command::Catalogue);
        assert_eq!(parse(&["catalogue"]).unwrap(), Command::Catalogue);
        assert_eq!(
            parse(&["run", "MANUFACTURING_WORKFLOW"]).unwrap(),
            Command::Run {
                workflow: "MANUFACTURING_WORKFLOW".to_string(),
                payload: Payload::new(),
            }
        );

        match parse(&["dispatch", "SALES_ORDER_CREATED", r#"{"orderId": 5}"#]).unwrap() {
            Command::Dispatch { type_name, payload } => {
                assert_eq!(type_name, "SALES_ORDER_CREATED");
                assert_eq!(payload.get("orderId"), Some(&json!(5)));
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_flags_are_not_taken_as_names() {
        assert_eq!(parse(&["--help"]).unwrap_err().kind(), ErrorKind::DisplayHelp);
        assert_eq!(
            parse(&["dispatch", "--help"]).unwrap_err().kind(),
            ErrorKind::DisplayHelp
        );
        assert_eq!(
            parse(&["dispatch", "--verbose"]).unwrap_err().kind(),
            ErrorKind::UnknownArgument
        );
    }

    #[test]
    fn test_parse_rejects_bad_input() {
        assert_eq!(
            parse(&["run", "MANUFACTURING_WORKFLOW", "{not json"]).unwrap_err().kind(),
            ErrorKind::ValueValidation
        );
        assert_eq!(
            parse(&["dispatch"]).unwrap_err().kind(),
            ErrorKind::MissingRequiredArgument
        );
        assert_eq!(
            parse(&["run", "a", "{}", "extra"]).unwrap_err().kind(),
            ErrorKind::UnknownArgument
        );
        assert_eq!(
            parse(&["MANUFACTURING_WORKFLOW"]).unwrap_err().kind(),
            ErrorKind::InvalidSubcommand
        );
    }

    #[test]
    fn test_only_dispatching_commands_need_modules() {
        assert!(!Command::Catalogue.needs_modules());
        assert!(parse(&["run", "W"]).unwrap().needs_modules());
        assert!(parse(&["dispatch", "T"]).unwrap().needs_modules());
    }
}
