//! Catalogue of transaction types and workflows
//!
//! The catalogue is built once at startup, either from the built-in ERP table
//! or from a YAML document, and is immutable afterwards.
//!
//! ```yaml
//! transaction_types:
//!   SALES_ORDER_CREATED:
//!     source: sales
//!     targets: [inventory, accounting, warehouse]
//!     description: A customer order was confirmed
//! workflows:
//!   - name: ORDER_FULFILMENT
//!     steps:
//!       - step_index: 1
//!         action: SALES_ORDER_CREATED
//!         module: sales
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

use super::transaction_type::{TransactionTypeDefinition, TransactionTypeRegistry};
use super::workflow::{WorkflowDefinition, WorkflowRegistry, WorkflowStep};
use crate::CoreError;

/// Serialized form of a catalogue
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct CatalogueDocument {
    #[serde(default)]
    transaction_types: BTreeMap<String, TransactionTypeDefinition>,
    #[serde(default)]
    workflows: Vec<WorkflowDefinition>,
}

/// Transaction types together with the workflows built on them
#[derive(Debug, Clone)]
pub struct Catalogue {
    types: TransactionTypeRegistry,
    workflows: WorkflowRegistry,
}

impl Catalogue {
    /// Build a catalogue, validating workflows against the types
    pub fn new(
        types: TransactionTypeRegistry,
        workflows: impl IntoIterator<Item = WorkflowDefinition>,
    ) -> Result<Self, CoreError> {
        types.validate()?;
        let workflows = WorkflowRegistry::new(workflows, &types)?;
        Ok(Self { types, workflows })
    }

    /// Parse and validate a YAML catalogue
    pub fn from_yaml(yaml: &str) -> Result<Self, CoreError> {
        let document: CatalogueDocument = serde_yaml::from_str(yaml)?;
        if document.transaction_types.is_empty() {
            return Err(CoreError::ValidationError(
                "Catalogue must define at least one transaction type".to_string(),
            ));
        }

        let types = TransactionTypeRegistry::new(document.transaction_types)?;
        let catalogue = Self::new(types, document.workflows)?;
        debug!(
            transaction_types = catalogue.types.len(),
            workflows = catalogue.workflows.len(),
            "Parsed catalogue"
        );
        Ok(catalogue)
    }

    /// Render the catalogue as YAML
    pub fn to_yaml(&self) -> Result<String, CoreError> {
        let document = CatalogueDocument {
            transaction_types: self
                .types
                .iter()
                .map(|(name, definition)| (name.to_string(), definition.clone()))
                .collect(),
            workflows: self.workflows.iter().cloned().collect(),
        };
        Ok(serde_yaml::to_string(&document)?)
    }

    /// Validate types and workflows
    pub fn validate(&self) -> Result<(), CoreError> {
        self.types.validate()?;
        self.workflows.validate(&self.types)
    }

    /// The transaction type registry
    pub fn types(&self) -> &TransactionTypeRegistry {
        &self.types
    }

    /// The workflow registry
    pub fn workflows(&self) -> &WorkflowRegistry {
        &self.workflows
    }

    /// Split into the two registries
    pub fn into_parts(self) -> (TransactionTypeRegistry, WorkflowRegistry) {
        (self.types, self.workflows)
    }

    /// The built-in ERP catalogue
    pub fn builtin() -> Self {
        let types: BTreeMap<String, TransactionTypeDefinition> = BUILTIN_TYPES
            .iter()
            .map(|(name, source, targets, description)| {
                (
                    name.to_string(),
                    TransactionTypeDefinition::new(*source, targets, *description),
                )
            })
            .collect();

        let workflows: BTreeMap<String, WorkflowDefinition> = BUILTIN_WORKFLOWS
            .iter()
            .map(|(name, description, steps)| {
                let definition = WorkflowDefinition {
                    name: name.to_string(),
                    description: description.to_string(),
                    steps: steps
                        .iter()
                        .enumerate()
                        .map(|(i, (action, module))| WorkflowStep::new(i as u32 + 1, *action, *module))
                        .collect(),
                };
                (name.to_string(), definition)
            })
            .collect();

        Self {
            types: TransactionTypeRegistry::from_map(types),
            workflows: WorkflowRegistry::from_map(workflows),
        }
    }
}

impl Default for Catalogue {
    fn default() -> Self {
        Self::builtin()
    }
}

type TypeRow = (&'static str, &'static str, &'static [&'static str], &'static str);
type WorkflowRow = (&'static str, &'static str, &'static [(&'static str, &'static str)]);

const BUILTIN_TYPES: &[TypeRow] = &[
    ("SALES_ORDER_CREATED", "sales", &["inventory", "accounting", "warehouse"], "A customer order was confirmed"),
    ("SHIPMENT_DISPATCHED", "warehouse", &["sales", "inventory", "accounting"], "Goods left the warehouse for a customer"),
    ("INVOICE_CREATED", "accounting", &["sales", "reporting"], "A customer invoice was issued"),
    ("PAYMENT_RECEIVED", "accounting", &["sales", "reporting"], "A customer payment was booked"),
    ("PURCHASE_ORDER_CREATED", "procurement", &["inventory", "accounting"], "A purchase order was sent to a supplier"),
    ("GOODS_RECEIVED", "warehouse", &["inventory", "procurement", "accounting"], "Supplier goods were received"),
    ("VENDOR_PAYMENT_ISSUED", "accounting", &["procurement", "reporting"], "A supplier invoice was paid"),
    ("INVENTORY_ADJUSTED", "inventory", &["accounting", "reporting"], "Stock levels were corrected"),
    ("STOCK_TRANSFERRED", "warehouse", &["inventory"], "Stock moved between locations"),
    ("PRODUCTION_ORDER_CREATED", "manufacturing", &["inventory", "procurement"], "A production run was planned"),
    ("MATERIAL_CONSUMED", "manufacturing", &["inventory", "accounting"], "Raw materials were issued to production"),
    ("QUALITY_CHECK_COMPLETED", "manufacturing", &["inventory", "reporting"], "Finished goods passed inspection"),
    ("PRODUCTION_COMPLETED", "manufacturing", &["inventory", "warehouse", "accounting"], "Finished goods were put away"),
    ("POS_SALE_COMPLETED", "pos", &["inventory", "accounting", "reporting"], "A point-of-sale ticket was closed"),
    ("POS_REFUND_ISSUED", "pos", &["inventory", "accounting"], "A point-of-sale refund was issued"),
    ("JOURNAL_ENTRY_POSTED", "accounting", &["reporting"], "A manual journal entry was posted"),
];

const BUILTIN_WORKFLOWS: &[WorkflowRow] = &[
    (
        "MANUFACTURING_WORKFLOW",
        "Plan, consume, inspect and put away a production run",
        &[
            ("PRODUCTION_ORDER_CREATED", "manufacturing"),
            ("MATERIAL_CONSUMED", "inventory"),
            ("QUALITY_CHECK_COMPLETED", "manufacturing"),
            ("PRODUCTION_COMPLETED", "warehouse"),
        ],
    ),
    (
        "ORDER_TO_CASH_WORKFLOW",
        "Take an order, ship it, invoice it and collect payment",
        &[
            ("SALES_ORDER_CREATED", "sales"),
            ("SHIPMENT_DISPATCHED", "warehouse"),
            ("INVOICE_CREATED", "accounting"),
            ("PAYMENT_RECEIVED", "accounting"),
        ],
    ),
    (
        "PROCURE_TO_PAY_WORKFLOW",
        "Order from a supplier, receive the goods and pay",
        &[
            ("PURCHASE_ORDER_CREATED", "procurement"),
            ("GOODS_RECEIVED", "warehouse"),
            ("VENDOR_PAYMENT_ISSUED", "accounting"),
        ],
    ),
];

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ModuleId;

    #[test]
    fn test_builtin_catalogue_is_valid() {
        let catalogue = Catalogue::builtin();
        catalogue.validate().unwrap();
        assert_eq!(catalogue.types().len(), BUILTIN_TYPES.len());
        assert_eq!(
            catalogue.workflows().workflow_names(),
            vec!["MANUFACTURING_WORKFLOW", "ORDER_TO_CASH_WORKFLOW", "PROCURE_TO_PAY_WORKFLOW"]
        );
    }

    #[test]
    fn test_builtin_sales_order() {
        let catalogue = Catalogue::builtin();
        let definition = catalogue.types().resolve("SALES_ORDER_CREATED").unwrap();
        assert_eq!(definition.source, "sales");
        let targets: Vec<&str> = definition.targets.iter().map(ModuleId::as_str).collect();
        assert_eq!(targets, vec!["inventory", "accounting", "warehouse"]);
    }

    #[test]
    fn test_builtin_manufacturing_workflow_has_four_steps() {
        let catalogue = Catalogue::builtin();
        let workflow = catalogue.workflows().resolve("MANUFACTURING_WORKFLOW").unwrap();
        let indices: Vec<u32> = workflow.steps.iter().map(|s| s.step_index).collect();
        assert_eq!(indices, vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_from_yaml() {
        let yaml = r#"
transaction_types:
  TICKET_OPENED:
    source: support
    targets: [reporting]
  TICKET_CLOSED:
    source: support
    targets: [reporting, accounting]
    description: Ticket resolved
workflows:
  - name: SUPPORT_WORKFLOW
    steps:
      - step_index: 1
        action: TICKET_OPENED
        module: support
      - step_index: 2
        action: TICKET_CLOSED
        module: support
"#;
        let catalogue = Catalogue::from_yaml(yaml).unwrap();
        assert_eq!(catalogue.types().len(), 2);
        assert_eq!(
            catalogue.types().resolve("TICKET_CLOSED").unwrap().description,
            "Ticket resolved"
        );
        assert_eq!(catalogue.workflows().resolve("SUPPORT_WORKFLOW").unwrap().steps.len(), 2);
    }

    #[test]
    fn test_from_yaml_rejects_unknown_action() {
        let yaml = r#"
transaction_types:
  TICKET_OPENED:
    source: support
workflows:
  - name: BROKEN
    steps:
      - step_index: 1
        action: TICKET_REOPENED
        module: support
"#;
        assert!(matches!(
            Catalogue::from_yaml(yaml),
            Err(CoreError::ValidationError(_))
        ));
    }

    #[test]
    fn test_from_yaml_rejects_garbage() {
        assert!(matches!(
            Catalogue::from_yaml("transaction_types: [1, 2"),
            Err(CoreError::SerializationError(_))
        ));
        assert!(Catalogue::from_yaml("workflows: []").is_err());
    }

    #[test]
    fn test_yaml_round_trip_of_builtin() {
        let yaml = Catalogue::builtin().to_yaml().unwrap();
        let parsed = Catalogue::from_yaml(&yaml).unwrap();
        assert_eq!(parsed.types().type_names(), Catalogue::builtin().types().type_names());
    }
}
