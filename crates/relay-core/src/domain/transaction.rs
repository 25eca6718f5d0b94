use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

use super::transaction_type::TransactionTypeRegistry;
use crate::{CoreError, ModuleId, Payload};

/// Value object: Transaction ID
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransactionId(pub String);

impl TransactionId {
    /// Allocate a fresh, process-unique identifier
    pub fn generate() -> Self {
        Self(format!("txn-{}", Uuid::new_v4()))
    }

    /// Get the string representation
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Transaction lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    /// Created, not yet recorded by the backend
    Pending,

    /// Recorded by the backend
    Completed,

    /// The backend rejected or could not record the transaction
    Failed,
}

impl TransactionStatus {
    /// Whether no further transition is allowed
    #[inline]
    pub fn is_terminal(&self) -> bool {
        !matches!(self, TransactionStatus::Pending)
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            TransactionStatus::Pending => "pending",
            TransactionStatus::Completed => "completed",
            TransactionStatus::Failed => "failed",
        };
        f.write_str(label)
    }
}

/// Aggregate: one cross-module business event
///
/// Everything except the status, backend id and error is fixed at creation
/// and only readable afterwards. The status moves from `Pending` to exactly
/// one terminal value, once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    id: TransactionId,

    #[serde(rename = "type")]
    transaction_type: String,

    source: ModuleId,

    targets: Vec<ModuleId>,

    #[serde(default)]
    payload: Payload,

    timestamp: DateTime<Utc>,

    status: TransactionStatus,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    backend_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl Transaction {
    /// Unique identifier
    pub fn id(&self) -> &TransactionId {
        &self.id
    }

    /// Name of the transaction type
    pub fn transaction_type(&self) -> &str {
        &self.transaction_type
    }

    /// Originating module, copied from the type definition
    pub fn source(&self) -> &ModuleId {
        &self.source
    }

    /// Notified modules, copied from the type definition
    pub fn targets(&self) -> &[ModuleId] {
        &self.targets
    }

    /// Module-supplied data
    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    /// Creation timestamp
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Current status
    #[inline]
    pub fn status(&self) -> TransactionStatus {
        self.status
    }

    /// Correlation id assigned by the backend, once completed
    pub fn backend_id(&self) -> Option<&str> {
        self.backend_id.as_deref()
    }

    /// Failure reason, once failed
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Whether the status is terminal
    #[inline]
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Whether the module is the source or a target of this transaction
    pub fn concerns(&self, module: &ModuleId) -> bool {
        &self.source == module || self.targets.contains(module)
    }

    /// Source first, then every target in order
    pub fn notified_modules(&self) -> impl Iterator<Item = &ModuleId> {
        std::iter::once(&self.source).chain(self.targets.iter())
    }

    /// Mark the transaction as recorded by the backend
    pub(crate) fn complete(&mut self, backend_id: String) -> Result<(), CoreError> {
        self.ensure_pending(TransactionStatus::Completed)?;
        self.status = TransactionStatus::Completed;
        self.backend_id = Some(backend_id);
        Ok(())
    }

    /// Mark the transaction as failed
    pub(crate) fn fail(&mut self, error: impl Into<String>) -> Result<(), CoreError> {
        self.ensure_pending(TransactionStatus::Failed)?;
        self.status = TransactionStatus::Failed;
        self.error = Some(error.into());
        Ok(())
    }

    fn ensure_pending(&self, next: TransactionStatus) -> Result<(), CoreError> {
        if self.status.is_terminal() {
            return Err(CoreError::InvalidStateTransition(format!(
                "transaction {} cannot move from {} to {}",
                self.id, self.status, next
            )));
        }
        Ok(())
    }
}

/// Builds pending transactions from a type name and a payload
#[derive(Debug, Clone)]
pub struct TransactionFactory {
    registry: Arc<TransactionTypeRegistry>,
}

impl TransactionFactory {
    /// Create a factory over a type registry
    pub fn new(registry: Arc<TransactionTypeRegistry>) -> Self {
        Self { registry }
    }

    /// The registry types are resolved against
    pub fn registry(&self) -> &TransactionTypeRegistry {
        &self.registry
    }

    /// Create a pending transaction
    pub fn create(&self, type_name: &str, payload: Payload) -> Result<Transaction, CoreError> {
        let definition = self.registry.resolve(type_name)?;

        Ok(Transaction {
            id: TransactionId::generate(),
            transaction_type: type_name.to_string(),
            source: definition.source.clone(),
            targets: definition.targets.clone(),
            payload,
            timestamp: Utc::now(),
            status: TransactionStatus::Pending,
            backend_id: None,
            error: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::transaction_type::TransactionTypeDefinition;
    use crate::payload_from;
    use serde_json::json;
    use std::collections::HashSet;

    fn factory() -> TransactionFactory {
        let registry = TransactionTypeRegistry::new(vec![(
            "SALES_ORDER_CREATED",
            TransactionTypeDefinition::new(
                "sales",
                &["inventory", "accounting", "warehouse"],
                "Sales order placed",
            ),
        )])
        .unwrap();
        TransactionFactory::new(Arc::new(registry))
    }

    #[test]
    fn test_create_copies_definition() {
        let tx = factory()
            .create("SALES_ORDER_CREATED", payload_from(json!({"orderId": 42})))
            .unwrap();

        assert_eq!(tx.transaction_type(), "SALES_ORDER_CREATED");
        assert_eq!(tx.source(), "sales");
        assert_eq!(tx.targets().len(), 3);
        assert_eq!(tx.status(), TransactionStatus::Pending);
        assert!(tx.backend_id().is_none());
        assert!(tx.error().is_none());
        assert_eq!(tx.payload().get("orderId"), Some(&json!(42)));
    }

    #[test]
    fn test_create_unknown_type() {
        let err = factory().create("UNKNOWN", Payload::new()).unwrap_err();
        assert!(matches!(err, CoreError::UnknownTransactionType(name) if name == "UNKNOWN"));
    }

    #[test]
    fn test_ids_are_unique() {
        let factory = factory();
        let ids: HashSet<TransactionId> = (0..500)
            .map(|_| factory.create("SALES_ORDER_CREATED", Payload::new()).unwrap().id().clone())
            .collect();
        assert_eq!(ids.len(), 500);
    }

    #[test]
    fn test_terminal_status_is_final() {
        let factory = factory();

        let mut completed = factory.create("SALES_ORDER_CREATED", Payload::new()).unwrap();
        completed.complete("backend-1".to_string()).unwrap();
        assert_eq!(completed.status(), TransactionStatus::Completed);
        assert!(completed.fail("late failure").is_err());
        assert!(completed.complete("backend-2".to_string()).is_err());
        assert_eq!(completed.backend_id(), Some("backend-1"));
        assert!(completed.error().is_none());

        let mut failed = factory.create("SALES_ORDER_CREATED", Payload::new()).unwrap();
        failed.fail("backend down").unwrap();
        assert_eq!(failed.status(), TransactionStatus::Failed);
        assert!(matches!(
            failed.complete("backend-3".to_string()),
            Err(CoreError::InvalidStateTransition(_))
        ));
        assert_eq!(failed.error(), Some("backend down"));
        assert!(failed.backend_id().is_none());
    }

    #[test]
    fn test_notified_modules_and_concerns() {
        let tx = factory().create("SALES_ORDER_CREATED", Payload::new()).unwrap();
        let modules: Vec<&str> = tx.notified_modules().map(ModuleId::as_str).collect();
        assert_eq!(modules, vec!["sales", "inventory", "accounting", "warehouse"]);
        assert!(tx.concerns(&ModuleId::from("accounting")));
        assert!(!tx.concerns(&ModuleId::from("pos")));
    }

    #[test]
    fn test_serialized_shape() {
        let mut tx = factory().create("SALES_ORDER_CREATED", Payload::new()).unwrap();
        tx.complete("b-7".to_string()).unwrap();
        let value = serde_json::to_value(&tx).unwrap();

        assert_eq!(value["type"], json!("SALES_ORDER_CREATED"));
        assert_eq!(value["source"], json!("sales"));
        assert_eq!(value["targets"], json!(["inventory", "accounting", "warehouse"]));
        assert_eq!(value["id"], json!(tx.id().as_str()));
        assert!(value["timestamp"].is_string());
        assert_eq!(value["status"], json!("completed"));
        assert_eq!(value["backend_id"], json!("b-7"));
        assert!(value.get("error").is_none());

        let back: Transaction = serde_json::from_value(value).unwrap();
        assert_eq!(back, tx);
    }
}
