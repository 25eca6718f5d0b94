use relay_core::{ModuleId, TransactionStatus};
use relay_runtime::{
    activate_modules, build_engine, load_catalogue, modules_to_activate, run, Cli, Command,
    RuntimeConfig, RuntimeError,
};
use clap::Parser;
use serde_json::json;
use std::io::Write;

fn parse(args: &[&str]) -> Command {
    Cli::try_parse_from(std::iter::once("relay").chain(args.iter().copied()))
        .unwrap()
        .into_command()
}

fn memory_config() -> RuntimeConfig {
    RuntimeConfig {
        backend_url: "memory://local".to_string(),
        ..RuntimeConfig::default()
    }
}

const SUPPORT_CATALOGUE: &str = r#"
transaction_types:
  TICKET_OPENED:
    source: support
    targets: [reporting]
  TICKET_ESCALATED:
    source: support
    targets: [engineering, reporting]
workflows:
  - name: ESCALATION_WORKFLOW
    steps:
      - step_index: 1
        action: TICKET_OPENED
        module: support
      - step_index: 2
        action: TICKET_ESCALATED
        module: engineering
"#;

#[tokio::test]
async fn test_catalogue_command_lists_builtin_catalogue() {
    let engine = build_engine(&memory_config()).unwrap();

    let command = parse(&[]);
    assert!(!command.needs_modules());

    let output = run(&engine, command).await.unwrap();

    assert_eq!(
        output["transaction_types"]["SALES_ORDER_CREATED"]["source"],
        json!("sales")
    );
    assert_eq!(output["workflows"].as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn test_workflow_and_dispatch_commands() {
    let config = memory_config();
    let engine = build_engine(&config).unwrap();
    let facades = activate_modules(&engine, &config).await;
    assert_eq!(facades.len(), engine.types().modules().len());

    let workflow = run(
        &engine,
        parse(&["run", "PROCURE_TO_PAY_WORKFLOW", r#"{"po": "PO-1"}"#]),
    )
    .await
    .unwrap();
    assert_eq!(workflow["steps"].as_array().unwrap().len(), 3);

    let dispatched = run(
        &engine,
        parse(&["dispatch", "STOCK_TRANSFERRED"]),
    )
    .await
    .unwrap();
    assert_eq!(dispatched["status"], json!(TransactionStatus::Completed));

    let warehouse = facades
        .iter()
        .find(|f| f.module() == &ModuleId::from("warehouse"))
        .unwrap();
    // GOODS_RECEIVED from the workflow plus the stock transfer
    assert_eq!(warehouse.cached_transactions().len(), 2);

    for facade in facades {
        facade.deactivate();
    }
    assert!(engine.listeners().modules().is_empty());
}

#[tokio::test]
async fn test_unknown_workflow_surfaces_core_error() {
    let engine = build_engine(&memory_config()).unwrap();

    let err = run(
        &engine,
        Command::Run {
            workflow: "NOPE".to_string(),
            payload: Default::default(),
        },
    )
    .await
    .unwrap_err();

    assert!(matches!(err, RuntimeError::Core(_)));
}

#[test]
fn test_catalogue_file_replaces_builtin() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(SUPPORT_CATALOGUE.as_bytes()).unwrap();

    let config = RuntimeConfig {
        catalogue_file: Some(file.path().to_path_buf()),
        modules: vec![ModuleId::from("support")],
        ..memory_config()
    };

    let catalogue = load_catalogue(&config).unwrap();
    assert_eq!(catalogue.types().type_names(), vec!["TICKET_ESCALATED", "TICKET_OPENED"]);

    let engine = build_engine(&config).unwrap();
    assert_eq!(modules_to_activate(&engine, &config), vec![ModuleId::from("support")]);
}

#[test]
fn test_missing_catalogue_file() {
    let config = RuntimeConfig {
        catalogue_file: Some("/definitely/not/here.yaml".into()),
        ..memory_config()
    };

    assert!(matches!(
        load_catalogue(&config),
        Err(RuntimeError::CatalogueFile { .. })
    ));
}

#[test]
fn test_http_backend_is_built_from_url() {
    let config = RuntimeConfig {
        backend_url: "http://backend.internal/api".to_string(),
        api_token: Some("token".to_string()),
        ..RuntimeConfig::default()
    };

    let engine = build_engine(&config).unwrap();
    assert_eq!(engine.workflows().len(), 3);
}
