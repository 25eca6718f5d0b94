//! Backend gateway contract
//!
//! The gateway is the only network-bound collaborator of the engine. It
//! durably records transactions and serves per-module history and analytics.
//! Implementations live outside this crate (see `relay-gateway-http`); an
//! in-memory implementation is provided for tests and local runs.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::transaction::Transaction;
use crate::{AnalyticsPeriod, AnalyticsSnapshot, ModuleId};

/// Failure reported by a backend gateway
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GatewayError {
    /// The request never reached the backend or the connection broke
    #[error("Backend transport error: {0}")]
    Transport(String),

    /// The backend answered with a non-success status
    #[error("Backend rejected request with status {status}: {message}")]
    Rejected {
        /// HTTP-like status code
        status: u16,
        /// Message returned by the backend
        message: String,
    },

    /// The backend answered with a body that could not be decoded
    #[error("Backend response could not be decoded: {0}")]
    Decode(String),

    /// The backend is not available
    #[error("Backend unavailable: {0}")]
    Unavailable(String),
}

/// Acknowledgement of a recorded transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendReceipt {
    /// Correlation id assigned by the backend
    pub backend_id: String,
}

impl BackendReceipt {
    /// Create a new receipt
    pub fn new(backend_id: impl Into<String>) -> Self {
        Self {
            backend_id: backend_id.into(),
        }
    }
}

/// Backend collaborator consumed by the dispatcher and the module façades
#[async_trait]
pub trait BackendGateway: Send + Sync {
    /// Durably record a transaction (type, source, targets and payload)
    async fn record_transaction(
        &self,
        transaction: &Transaction,
    ) -> Result<BackendReceipt, GatewayError>;

    /// Most recent transactions concerning the module, newest first
    async fn list_module_transactions(
        &self,
        module: &ModuleId,
        limit: usize,
    ) -> Result<Vec<Transaction>, GatewayError>;

    /// Aggregate analytics for the module over the period
    async fn get_module_analytics(
        &self,
        module: &ModuleId,
        period: AnalyticsPeriod,
    ) -> Result<AnalyticsSnapshot, GatewayError>;
}

/// Memory implementation for testing and local runs
#[cfg(feature = "testing")]
pub mod memory {
    use super::*;
    use crate::domain::transaction::TransactionId;
    use parking_lot::Mutex;
    use serde_json::json;
    use std::collections::{HashMap, HashSet};
    use std::time::Duration;
    use tracing::debug;

    /// A call observed by the in-memory gateway
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum GatewayCall {
        /// `record_transaction` was entered
        RecordStarted(TransactionId),
        /// `record_transaction` returned
        RecordFinished(TransactionId),
        /// `list_module_transactions` was called
        ListTransactions(ModuleId, usize),
        /// `get_module_analytics` was called
        Analytics(ModuleId, AnalyticsPeriod),
    }

    #[derive(Default)]
    struct MemoryState {
        record_calls: usize,
        fail_on_calls: HashSet<usize>,
        failing_types: HashSet<String>,
        submitted: Vec<Transaction>,
        recorded: Vec<Transaction>,
        history: HashMap<ModuleId, Vec<Transaction>>,
        analytics: HashMap<ModuleId, AnalyticsSnapshot>,
        unavailable: bool,
        calls: Vec<GatewayCall>,
    }

    /// In-memory backend gateway with failure injection
    ///
    /// Without canned data, history and analytics are derived from the
    /// transactions recorded so far.
    #[derive(Default)]
    pub struct InMemoryGateway {
        state: Mutex<MemoryState>,
        latency: Option<Duration>,
        history_latency: Option<Duration>,
    }

    impl InMemoryGateway {
        /// Create an empty gateway
        pub fn new() -> Self {
            Self::default()
        }

        /// Delay every record call by `latency`
        pub fn with_latency(mut self, latency: Duration) -> Self {
            self.latency = Some(latency);
            self
        }

        /// Delay every history fetch by `latency`
        pub fn with_history_latency(mut self, latency: Duration) -> Self {
            self.history_latency = Some(latency);
            self
        }

        /// Fail the n-th record call (1-based)
        pub fn fail_on_record_call(&self, call: usize) {
            self.state.lock().fail_on_calls.insert(call);
        }

        /// Fail every record call for the transaction type
        pub fn fail_transaction_type(&self, type_name: impl Into<String>) {
            self.state.lock().failing_types.insert(type_name.into());
        }

        /// Make every call fail as unavailable
        pub fn set_unavailable(&self, unavailable: bool) {
            self.state.lock().unavailable = unavailable;
        }

        /// Serve a fixed history for the module
        pub fn set_history(&self, module: impl Into<ModuleId>, transactions: Vec<Transaction>) {
            self.state.lock().history.insert(module.into(), transactions);
        }

        /// Serve a fixed analytics snapshot for the module
        pub fn set_analytics(&self, module: impl Into<ModuleId>, snapshot: AnalyticsSnapshot) {
            self.state.lock().analytics.insert(module.into(), snapshot);
        }

        /// Number of record calls made
        pub fn record_calls(&self) -> usize {
            self.state.lock().record_calls
        }

        /// Every transaction submitted for recording, in call order
        pub fn submitted(&self) -> Vec<Transaction> {
            self.state.lock().submitted.clone()
        }

        /// Transactions recorded successfully, in call order
        pub fn recorded(&self) -> Vec<Transaction> {
            self.state.lock().recorded.clone()
        }

        /// Every call observed, in order
        pub fn calls(&self) -> Vec<GatewayCall> {
            self.state.lock().calls.clone()
        }

        /// Number of analytics requests made for the module
        pub fn analytics_requests(&self, module: &ModuleId) -> usize {
            self.state
                .lock()
                .calls
                .iter()
                .filter(|call| matches!(call, GatewayCall::Analytics(m, _) if m == module))
                .count()
        }

        fn ensure_available(state: &MemoryState) -> Result<(), GatewayError> {
            if state.unavailable {
                return Err(GatewayError::Unavailable("in-memory gateway offline".to_string()));
            }
            Ok(())
        }
    }

    #[async_trait]
    impl BackendGateway for InMemoryGateway {
        async fn record_transaction(
            &self,
            transaction: &Transaction,
        ) -> Result<BackendReceipt, GatewayError> {
            let call = {
                let mut state = self.state.lock();
                state.record_calls += 1;
                state.calls.push(GatewayCall::RecordStarted(transaction.id().clone()));
                state.submitted.push(transaction.clone());
                state.record_calls
            };

            if let Some(latency) = self.latency {
                tokio::time::sleep(latency).await;
            }

            let mut state = self.state.lock();
            state.calls.push(GatewayCall::RecordFinished(transaction.id().clone()));
            Self::ensure_available(&state)?;

            if state.fail_on_calls.contains(&call)
                || state.failing_types.contains(transaction.transaction_type())
            {
                debug!(call, transaction_id = %transaction.id(), "Injected record failure");
                return Err(GatewayError::Rejected {
                    status: 503,
                    message: format!("injected failure on record call {}", call),
                });
            }

            state.recorded.push(transaction.clone());
            Ok(BackendReceipt::new(format!("mem-{}", call)))
        }

        async fn list_module_transactions(
            &self,
            module: &ModuleId,
            limit: usize,
        ) -> Result<Vec<Transaction>, GatewayError> {
            if let Some(latency) = self.history_latency {
                tokio::time::sleep(latency).await;
            }

            let mut state = self.state.lock();
            state.calls.push(GatewayCall::ListTransactions(module.clone(), limit));
            Self::ensure_available(&state)?;

            if let Some(history) = state.history.get(module) {
                return Ok(history.iter().take(limit).cloned().collect());
            }

            Ok(state
                .recorded
                .iter()
                .rev()
                .filter(|tx| tx.concerns(module))
                .take(limit)
                .cloned()
                .collect())
        }

        async fn get_module_analytics(
            &self,
            module: &ModuleId,
            period: AnalyticsPeriod,
        ) -> Result<AnalyticsSnapshot, GatewayError> {
            let mut state = self.state.lock();
            state.calls.push(GatewayCall::Analytics(module.clone(), period));
            Self::ensure_available(&state)?;

            if let Some(snapshot) = state.analytics.get(module) {
                return Ok(snapshot.clone());
            }

            let outgoing = state.recorded.iter().filter(|tx| tx.source() == module).count();
            let incoming = state
                .recorded
                .iter()
                .filter(|tx| tx.targets().contains(module))
                .count();

            Ok(AnalyticsSnapshot::new(json!({
                "module": module,
                "period": period,
                "incoming_count": incoming,
                "outgoing_count": outgoing,
            })))
        }
    }

}
