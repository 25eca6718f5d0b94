//! Listener registry
//!
//! Modules subscribe callbacks per module identifier. A dispatch notifies the
//! source module and every target module; each notification runs the
//! callbacks registered for that module, in registration order, over a
//! snapshot of the list taken when the notification starts.

use async_trait::async_trait;
use dashmap::DashMap;
use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error};

use super::transaction::Transaction;
use crate::ModuleId;

/// Error raised by a listener callback
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ListenerError {
    /// The callback reported a failure
    #[error("Listener failed: {0}")]
    Failed(String),

    /// The callback panicked
    #[error("Listener panicked: {0}")]
    Panicked(String),
}

/// A callback notified of transactions relevant to a module
#[async_trait]
pub trait TransactionListener: Send + Sync {
    /// Handle a terminal transaction
    async fn on_transaction(&self, transaction: &Transaction) -> Result<(), ListenerError>;

    /// Name used in logs
    fn name(&self) -> &str {
        "listener"
    }
}

/// Shared handle to a registered listener; identity is pointer identity
pub type ListenerHandle = Arc<dyn TransactionListener>;

/// Adapter turning a plain closure into a listener
pub struct FnListener<F> {
    name: String,
    callback: F,
}

#[async_trait]
impl<F> TransactionListener for FnListener<F>
where
    F: Fn(&Transaction) -> Result<(), ListenerError> + Send + Sync,
{
    async fn on_transaction(&self, transaction: &Transaction) -> Result<(), ListenerError> {
        (self.callback)(transaction)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Wrap a synchronous closure as a listener handle
pub fn listener_fn<F>(name: impl Into<String>, callback: F) -> ListenerHandle
where
    F: Fn(&Transaction) -> Result<(), ListenerError> + Send + Sync + 'static,
{
    Arc::new(FnListener {
        name: name.into(),
        callback,
    })
}

#[inline]
fn same_handle(a: &ListenerHandle, b: &ListenerHandle) -> bool {
    // Compare data pointers only; vtable pointers may differ across codegen units.
    Arc::as_ptr(a) as *const () == Arc::as_ptr(b) as *const ()
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// Per-module lists of listener handles
#[derive(Default)]
pub struct ListenerRegistry {
    listeners: DashMap<ModuleId, Vec<ListenerHandle>>,
}

impl ListenerRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a listener to the module's list.
    ///
    /// Registering the same handle twice is allowed and results in two
    /// notifications per transaction.
    pub fn register(&self, module: &ModuleId, listener: ListenerHandle) {
        debug!(module = %module, listener = listener.name(), "Registering listener");
        self.listeners
            .entry(module.clone())
            .or_insert_with(Vec::new)
            .push(listener);
    }

    /// Remove the first registration of this exact handle.
    ///
    /// Returns whether a registration was removed; absent handles are a no-op.
    pub fn unregister(&self, module: &ModuleId, listener: &ListenerHandle) -> bool {
        let removed = match self.listeners.get_mut(module) {
            Some(mut entry) => match entry.iter().position(|l| same_handle(l, listener)) {
                Some(position) => {
                    entry.remove(position);
                    true
                }
                None => false,
            },
            None => false,
        };

        if removed {
            self.listeners.remove_if(module, |_, list| list.is_empty());
            debug!(module = %module, listener = listener.name(), "Unregistered listener");
        }

        removed
    }

    /// Number of registrations for the module
    pub fn listener_count(&self, module: &ModuleId) -> usize {
        self.listeners.get(module).map(|entry| entry.len()).unwrap_or(0)
    }

    /// Modules with at least one registration
    pub fn modules(&self) -> Vec<ModuleId> {
        self.listeners.iter().map(|entry| entry.key().clone()).collect()
    }

    /// Invoke every listener registered for the module.
    ///
    /// Listener failures and panics are logged and swallowed. Returns the
    /// number of listeners that handled the transaction without error.
    pub async fn notify(&self, module: &ModuleId, transaction: &Transaction) -> usize {
        let snapshot: Vec<ListenerHandle> = match self.listeners.get(module) {
            Some(entry) => entry.value().clone(),
            None => return 0,
        };

        let mut delivered = 0;
        for listener in snapshot {
            let outcome = AssertUnwindSafe(listener.on_transaction(transaction))
                .catch_unwind()
                .await
                .unwrap_or_else(|panic| Err(ListenerError::Panicked(panic_message(&*panic))));

            match outcome {
                Ok(()) => delivered += 1,
                Err(err) => {
                    error!(
                        module = %module,
                        listener = listener.name(),
                        transaction_id = %transaction.id(),
                        transaction_type = %transaction.transaction_type(),
                        error = %err,
                        "Listener callback failed"
                    );
                }
            }
        }

        delivered
    }
}

impl std::fmt::Debug for ListenerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let counts: Vec<(String, usize)> = self
            .listeners
            .iter()
            .map(|entry| (entry.key().to_string(), entry.value().len()))
            .collect();
        f.debug_struct("ListenerRegistry").field("listeners", &counts).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::transaction::TransactionFactory;
    use crate::domain::transaction_type::{TransactionTypeDefinition, TransactionTypeRegistry};
    use crate::Payload;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    fn transaction() -> Transaction {
        let registry = TransactionTypeRegistry::new(vec![(
            "INVENTORY_ADJUSTED",
            TransactionTypeDefinition::new("inventory", &["accounting"], ""),
        )])
        .unwrap();
        TransactionFactory::new(Arc::new(registry))
            .create("INVENTORY_ADJUSTED", Payload::new())
            .unwrap()
    }

    fn counting(counter: Arc<AtomicUsize>) -> ListenerHandle {
        listener_fn("counter", move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
    }

    #[tokio::test]
    async fn test_notify_absent_module_is_noop() {
        let registry = ListenerRegistry::new();
        assert_eq!(registry.notify(&ModuleId::from("pos"), &transaction()).await, 0);
    }

    #[tokio::test]
    async fn test_notify_in_registration_order() {
        let registry = ListenerRegistry::new();
        let module = ModuleId::from("accounting");
        let order = Arc::new(Mutex::new(Vec::new()));

        for label in ["first", "second", "third"] {
            let order = order.clone();
            registry.register(
                &module,
                listener_fn(label, move |_| {
                    order.lock().unwrap().push(label);
                    Ok(())
                }),
            );
        }

        assert_eq!(registry.notify(&module, &transaction()).await, 3);
        assert_eq!(*order.lock().unwrap(), vec!["first", "second", "third"]);
    }

    #[tokio::test]
    async fn test_duplicate_registration_notifies_twice() {
        let registry = ListenerRegistry::new();
        let module = ModuleId::from("accounting");
        let counter = Arc::new(AtomicUsize::new(0));
        let listener = counting(counter.clone());

        registry.register(&module, listener.clone());
        registry.register(&module, listener.clone());
        registry.notify(&module, &transaction()).await;
        assert_eq!(counter.load(Ordering::SeqCst), 2);

        // Removes one registration at a time
        assert!(registry.unregister(&module, &listener));
        assert_eq!(registry.listener_count(&module), 1);
    }

    #[tokio::test]
    async fn test_unregister_twice_is_noop() {
        let registry = ListenerRegistry::new();
        let module = ModuleId::from("accounting");
        let counter = Arc::new(AtomicUsize::new(0));
        let listener = counting(counter.clone());
        let other = counting(counter.clone());

        registry.register(&module, listener.clone());
        registry.register(&module, other.clone());

        assert!(registry.unregister(&module, &listener));
        assert!(!registry.unregister(&module, &listener));
        assert_eq!(registry.listener_count(&module), 1);

        registry.notify(&module, &transaction()).await;
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failing_and_panicking_listeners_are_isolated() {
        let registry = ListenerRegistry::new();
        let module = ModuleId::from("accounting");
        let counter = Arc::new(AtomicUsize::new(0));

        registry.register(
            &module,
            listener_fn("failing", |_| Err(ListenerError::Failed("boom".to_string()))),
        );
        registry.register(&module, listener_fn("panicking", |_| panic!("listener exploded")));
        registry.register(&module, counting(counter.clone()));

        let delivered = registry.notify(&module, &transaction()).await;
        assert_eq!(delivered, 1);
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    struct SelfRemovingListener {
        registry: Arc<ListenerRegistry>,
        module: ModuleId,
        me: Mutex<Option<ListenerHandle>>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl TransactionListener for SelfRemovingListener {
        async fn on_transaction(&self, _transaction: &Transaction) -> Result<(), ListenerError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let me = self.me.lock().unwrap().take();
            if let Some(me) = me {
                self.registry.unregister(&self.module, &me);
                // Registration during fan-out only affects later notifications
                self.registry.register(&self.module, listener_fn("late", |_| Ok(())));
            }
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_mutation_during_notify_uses_snapshot() {
        let registry = Arc::new(ListenerRegistry::new());
        let module = ModuleId::from("accounting");
        let counter = Arc::new(AtomicUsize::new(0));

        let remover = Arc::new(SelfRemovingListener {
            registry: registry.clone(),
            module: module.clone(),
            me: Mutex::new(None),
            calls: AtomicUsize::new(0),
        });
        let handle: ListenerHandle = remover.clone();
        *remover.me.lock().unwrap() = Some(handle.clone());

        registry.register(&module, handle);
        registry.register(&module, counting(counter.clone()));

        // Snapshot holds [remover, counter]; the late listener is not called
        assert_eq!(registry.notify(&module, &transaction()).await, 2);
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert_eq!(remover.calls.load(Ordering::SeqCst), 1);

        // Next round: [counter, late]
        assert_eq!(registry.notify(&module, &transaction()).await, 2);
        assert_eq!(remover.calls.load(Ordering::SeqCst), 1);
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }
}
