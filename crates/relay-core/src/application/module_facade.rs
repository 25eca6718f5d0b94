//! Module integration façade
//!
//! One façade binds one module to the engine. While active it holds a
//! listener registration for its module and keeps a bounded, newest-first
//! cache of the transactions it was notified about, plus the last analytics
//! snapshot fetched from the backend. Reads never touch the network.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::dispatcher::TransactionDispatcher;
use super::engine::RelayEngine;
use super::workflow_engine::WorkflowEngine;
use crate::domain::gateway::{BackendGateway, GatewayError};
use crate::domain::listener::{ListenerError, ListenerHandle, ListenerRegistry, TransactionListener};
use crate::domain::transaction::{Transaction, TransactionId};
use crate::domain::workflow::WorkflowExecutionResult;
use crate::{AnalyticsPeriod, AnalyticsSnapshot, CoreError, ModuleId, Payload};

/// Default number of cached transactions
pub const DEFAULT_CACHE_CAPACITY: usize = 50;

/// Default number of historical transactions requested on activation
pub const DEFAULT_HISTORY_LIMIT: usize = 50;

/// Façade settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FacadeConfig {
    /// Maximum number of cached transactions
    pub cache_capacity: usize,

    /// Number of historical transactions requested from the backend
    pub history_limit: usize,

    /// Analytics window
    pub analytics_period: AnalyticsPeriod,
}

impl Default for FacadeConfig {
    fn default() -> Self {
        Self {
            cache_capacity: DEFAULT_CACHE_CAPACITY,
            history_limit: DEFAULT_HISTORY_LIMIT,
            analytics_period: AnalyticsPeriod::default(),
        }
    }
}

/// Bounded, newest-first transaction cache keyed by transaction id
#[derive(Debug, Clone)]
pub struct TransactionCache {
    entries: VecDeque<Transaction>,
    capacity: usize,
}

impl TransactionCache {
    /// Create an empty cache; a zero capacity is raised to one
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Insert at the front, or replace in place if the id is already cached.
    ///
    /// The oldest entry is evicted when the cache is full.
    pub fn upsert(&mut self, transaction: Transaction) {
        if let Some(existing) = self.entries.iter_mut().find(|tx| tx.id() == transaction.id()) {
            *existing = transaction;
            return;
        }

        self.entries.push_front(transaction);
        self.entries.truncate(self.capacity);
    }

    /// Append older transactions (newest first) behind what is already cached
    pub fn merge_history(&mut self, history: impl IntoIterator<Item = Transaction>) {
        for transaction in history {
            if self.entries.len() >= self.capacity {
                break;
            }
            if !self.contains(transaction.id()) {
                self.entries.push_back(transaction);
            }
        }
    }

    /// Replace with a backend view, keeping entries cached since `before` was taken.
    ///
    /// Kept entries stay in front, in their current order.
    pub fn replace_since(
        &mut self,
        before: &HashSet<TransactionId>,
        transactions: impl IntoIterator<Item = Transaction>,
    ) {
        self.entries.retain(|tx| !before.contains(tx.id()));
        self.merge_history(transactions);
    }

    /// Ids currently cached
    pub fn ids(&self) -> HashSet<TransactionId> {
        self.entries.iter().map(|tx| tx.id().clone()).collect()
    }

    /// Whether the id is cached
    pub fn contains(&self, id: &TransactionId) -> bool {
        self.entries.iter().any(|tx| tx.id() == id)
    }

    /// Look up a cached transaction
    pub fn get(&self, id: &TransactionId) -> Option<&Transaction> {
        self.entries.iter().find(|tx| tx.id() == id)
    }

    /// Copy of the cached transactions, newest first
    pub fn to_vec(&self) -> Vec<Transaction> {
        self.entries.iter().cloned().collect()
    }

    /// Number of cached transactions
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Maximum number of entries
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

/// State shared between a façade and its listener
struct FacadeState {
    module: ModuleId,
    gateway: Arc<dyn BackendGateway>,
    config: FacadeConfig,
    cache: RwLock<TransactionCache>,
    analytics: RwLock<Option<AnalyticsSnapshot>>,
}

impl FacadeState {
    async fn refresh_analytics(&self) -> Result<(), GatewayError> {
        let snapshot = self
            .gateway
            .get_module_analytics(&self.module, self.config.analytics_period)
            .await?;
        *self.analytics.write() = Some(snapshot);
        Ok(())
    }

    async fn fetch_history(&self) -> Result<Vec<Transaction>, GatewayError> {
        self.gateway
            .list_module_transactions(&self.module, self.config.history_limit)
            .await
    }
}

/// Listener registered by an active façade
struct FacadeListener {
    state: Arc<FacadeState>,
}

#[async_trait]
impl TransactionListener for FacadeListener {
    async fn on_transaction(&self, transaction: &Transaction) -> Result<(), ListenerError> {
        self.state.cache.write().upsert(transaction.clone());

        if transaction.concerns(&self.state.module) {
            self.state
                .refresh_analytics()
                .await
                .map_err(|e| ListenerError::Failed(format!("analytics refresh failed: {}", e)))?;
        }

        Ok(())
    }

    fn name(&self) -> &str {
        self.state.module.as_str()
    }
}

/// Per-module adapter exposing the engine to dashboard code
///
/// Dropping an active façade unregisters its listener.
pub struct ModuleFacade {
    state: Arc<FacadeState>,
    listener: Option<ListenerHandle>,
    listeners: Arc<ListenerRegistry>,
    dispatcher: Arc<TransactionDispatcher>,
    workflows: Arc<WorkflowEngine>,
}

impl ModuleFacade {
    /// Register the module's listener and seed the cache and analytics.
    ///
    /// Seeding failures are logged; the façade starts with an empty cache.
    pub async fn activate(
        engine: &RelayEngine,
        module: impl Into<ModuleId>,
        config: FacadeConfig,
    ) -> Self {
        let module = module.into();

        if engine.types().types_for_module(&module).is_empty() {
            warn!(module = %module, "Activating a module no transaction type mentions");
        }

        let state = Arc::new(FacadeState {
            module: module.clone(),
            gateway: engine.gateway().clone(),
            cache: RwLock::new(TransactionCache::new(config.cache_capacity)),
            analytics: RwLock::new(None),
            config,
        });

        let listener: ListenerHandle = Arc::new(FacadeListener {
            state: state.clone(),
        });
        engine.listeners().register(&module, listener.clone());

        match state.fetch_history().await {
            Ok(history) => state.cache.write().merge_history(history),
            Err(err) => warn!(module = %module, error = %err, "Could not load transaction history"),
        }
        if let Err(err) = state.refresh_analytics().await {
            warn!(module = %module, error = %err, "Could not load analytics");
        }

        info!(module = %module, cached = state.cache.read().len(), "Module activated");

        Self {
            state,
            listener: Some(listener),
            listeners: engine.listeners().clone(),
            dispatcher: engine.dispatcher().clone(),
            workflows: engine.workflow_engine().clone(),
        }
    }

    /// Unregister the module's listener
    pub fn deactivate(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if let Some(listener) = self.listener.take() {
            self.listeners.unregister(&self.state.module, &listener);
            info!(module = %self.state.module, "Module deactivated");
        }
    }

    /// Whether the listener is registered
    pub fn is_active(&self) -> bool {
        self.listener.is_some()
    }

    /// The module this façade is bound to
    pub fn module(&self) -> &ModuleId {
        &self.state.module
    }

    /// Façade settings
    pub fn config(&self) -> &FacadeConfig {
        &self.state.config
    }

    /// Dispatch a single transaction
    pub async fn create_transaction(
        &self,
        type_name: &str,
        payload: Payload,
    ) -> Result<Transaction, CoreError> {
        debug!(module = %self.state.module, transaction_type = type_name, "Creating transaction");
        self.dispatcher.dispatch(type_name, payload).await
    }

    /// Execute a named workflow
    pub async fn execute_workflow(
        &self,
        workflow_name: &str,
        payload: Payload,
    ) -> Result<WorkflowExecutionResult, CoreError> {
        debug!(module = %self.state.module, workflow = workflow_name, "Executing workflow");
        self.workflows.execute_workflow(workflow_name, payload).await
    }

    /// Cached transactions, newest first
    pub fn cached_transactions(&self) -> Vec<Transaction> {
        self.state.cache.read().to_vec()
    }

    /// Last analytics snapshot fetched
    pub fn cached_analytics(&self) -> Option<AnalyticsSnapshot> {
        self.state.analytics.read().clone()
    }

    /// Re-fetch history and analytics from the backend.
    ///
    /// Transactions delivered while the history fetch is outstanding survive
    /// the replacement even if the backend view does not include them yet.
    pub async fn refresh(&self) -> Result<(), CoreError> {
        let before = self.state.cache.read().ids();
        let history = self.state.fetch_history().await?;
        self.state.cache.write().replace_since(&before, history);
        self.state.refresh_analytics().await?;
        debug!(module = %self.state.module, "Module refreshed");
        Ok(())
    }
}

impl Drop for ModuleFacade {
    fn drop(&mut self) {
        self.release();
    }
}

impl std::fmt::Debug for ModuleFacade {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleFacade")
            .field("module", &self.state.module)
            .field("active", &self.is_active())
            .field("cached", &self.state.cache.read().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::catalogue::Catalogue;
    use crate::domain::transaction::TransactionFactory;

    fn transactions(count: usize) -> Vec<Transaction> {
        let (types, _) = Catalogue::builtin().into_parts();
        let factory = TransactionFactory::new(Arc::new(types));
        (0..count)
            .map(|_| factory.create("INVENTORY_ADJUSTED", Payload::new()).unwrap())
            .collect()
    }

    #[test]
    fn test_cache_newest_first_and_bounded() {
        let txs = transactions(4);
        let mut cache = TransactionCache::new(3);
        for tx in &txs {
            cache.upsert(tx.clone());
        }

        let ids: Vec<&TransactionId> = cache.entries.iter().map(|tx| tx.id()).collect();
        assert_eq!(ids, vec![txs[3].id(), txs[2].id(), txs[1].id()]);
        assert!(!cache.contains(txs[0].id()));
    }

    #[test]
    fn test_cache_replaces_in_place() {
        let txs = transactions(3);
        let mut cache = TransactionCache::new(10);
        for tx in &txs {
            cache.upsert(tx.clone());
        }

        let mut updated = txs[1].clone();
        updated.fail("backend down").unwrap();
        cache.upsert(updated);

        assert_eq!(cache.len(), 3);
        assert_eq!(cache.entries[1].id(), txs[1].id());
        assert_eq!(cache.entries[1].error(), Some("backend down"));
    }

    #[test]
    fn test_merge_history_keeps_live_entries_in_front() {
        let txs = transactions(4);
        let mut cache = TransactionCache::new(3);
        cache.upsert(txs[0].clone());

        // History overlaps the live entry and exceeds the capacity
        cache.merge_history(vec![txs[0].clone(), txs[1].clone(), txs[2].clone(), txs[3].clone()]);

        let ids: Vec<&TransactionId> = cache.entries.iter().map(|tx| tx.id()).collect();
        assert_eq!(ids, vec![txs[0].id(), txs[1].id(), txs[2].id()]);
    }

    #[test]
    fn test_replace_since_keeps_entries_cached_after_the_snapshot() {
        let txs = transactions(4);
        let mut cache = TransactionCache::new(10);
        cache.upsert(txs[0].clone());
        cache.upsert(txs[1].clone());

        let before = cache.ids();
        cache.upsert(txs[2].clone());
        cache.replace_since(&before, vec![txs[3].clone(), txs[1].clone()]);

        let ids: Vec<&TransactionId> = cache.entries.iter().map(|tx| tx.id()).collect();
        assert_eq!(ids, vec![txs[2].id(), txs[3].id(), txs[1].id()]);
        assert!(!cache.contains(txs[0].id()));
    }

    #[test]
    fn test_zero_capacity_is_raised() {
        let cache = TransactionCache::new(0);
        assert_eq!(cache.capacity(), 1);
    }
}
