use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::domain::gateway::BackendGateway;
use crate::domain::listener::ListenerRegistry;
use crate::domain::transaction::{Transaction, TransactionFactory};
use crate::{CoreError, Payload};

/// Service that records a transaction and fans it out to every module
pub struct TransactionDispatcher {
    /// Builds pending transactions
    factory: TransactionFactory,

    /// Durable record of transactions
    gateway: Arc<dyn BackendGateway>,

    /// Per-module listeners
    listeners: Arc<ListenerRegistry>,
}

impl TransactionDispatcher {
    /// Create a new dispatcher
    pub fn new(
        factory: TransactionFactory,
        gateway: Arc<dyn BackendGateway>,
        listeners: Arc<ListenerRegistry>,
    ) -> Self {
        Self {
            factory,
            gateway,
            listeners,
        }
    }

    /// The factory used to build transactions
    pub fn factory(&self) -> &TransactionFactory {
        &self.factory
    }

    /// The listener registry notified after each dispatch
    pub fn listeners(&self) -> &Arc<ListenerRegistry> {
        &self.listeners
    }

    /// Build, record and fan out a transaction.
    ///
    /// Unknown types fail before any I/O. Gateway failures do not fail the
    /// call: they are captured as the transaction's `Failed` status, and the
    /// failed transaction is still delivered to every module.
    pub async fn dispatch(&self, type_name: &str, payload: Payload) -> Result<Transaction, CoreError> {
        let mut transaction = self.factory.create(type_name, payload)?;

        debug!(
            transaction_id = %transaction.id(),
            transaction_type = %transaction.transaction_type(),
            source = %transaction.source(),
            "Dispatching transaction"
        );

        match self.gateway.record_transaction(&transaction).await {
            Ok(receipt) if !receipt.backend_id.trim().is_empty() => {
                transaction.complete(receipt.backend_id)?;
            }
            Ok(_) => {
                warn!(transaction_id = %transaction.id(), "Backend returned an empty correlation id");
                transaction.fail("Backend returned an empty correlation id")?;
            }
            Err(err) => {
                warn!(
                    transaction_id = %transaction.id(),
                    transaction_type = %transaction.transaction_type(),
                    error = %err,
                    "Backend failed to record transaction"
                );
                transaction.fail(err.to_string())?;
            }
        }

        self.fan_out(&transaction).await;

        info!(
            transaction_id = %transaction.id(),
            transaction_type = %transaction.transaction_type(),
            status = %transaction.status(),
            "Transaction dispatched"
        );

        Ok(transaction)
    }

    /// Notify the source and every target exactly once
    async fn fan_out(&self, transaction: &Transaction) {
        for module in transaction.notified_modules() {
            let delivered = self.listeners.notify(module, transaction).await;
            debug!(
                transaction_id = %transaction.id(),
                module = %module,
                delivered,
                "Notified module"
            );
        }
    }
}
