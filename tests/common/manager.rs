use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use transaction_hooks::{
    ConnectionId, ConnectionProvider, HookError, HookResult, ObserverRegistry, Placement,
    ScopeBody, TransactionAware, TransactionManager, TransactionOptions,
};

struct Scope {
    savepoint: bool,
    joinable: bool,
    observers: Vec<Arc<dyn TransactionAware>>,
}

/// In-memory transaction manager driving the integration tests.
///
/// Keeps a stack of scopes per connection and dispatches lifecycle
/// notifications with the same rules a real manager implementation must
/// follow: before-commit while the scope is still open, committed strictly
/// after the physical commit, savepoint releases transferring observers to
/// the parent scope, and the rollback signal absorbed only by the frame that
/// created the scope.
pub struct MemoryManager {
    connections: Mutex<HashMap<ConnectionId, Vec<Scope>>>,
    ambient: Mutex<Option<ConnectionId>>,
    commits: AtomicUsize,
    rollbacks: AtomicUsize,
    last_options: Mutex<Option<TransactionOptions>>,
}

impl MemoryManager {
    pub fn new() -> Self {
        Self {
            connections: Mutex::new(HashMap::new()),
            ambient: Mutex::new(None),
            commits: AtomicUsize::new(0),
            rollbacks: AtomicUsize::new(0),
            last_options: Mutex::new(None),
        }
    }

    /// Number of physical (outermost) commits performed.
    pub fn commit_count(&self) -> usize {
        self.commits.load(Ordering::SeqCst)
    }

    /// Number of rollbacks performed, savepoint rollbacks included.
    pub fn rollback_count(&self) -> usize {
        self.rollbacks.load(Ordering::SeqCst)
    }

    /// Whether an ambient connection was ever established.
    pub fn connection_established(&self) -> bool {
        self.ambient.lock().is_some()
    }

    /// Current scope nesting depth on `connection`.
    pub fn depth(&self, connection: &ConnectionId) -> usize {
        self.connections
            .lock()
            .get(connection)
            .map_or(0, Vec::len)
    }

    /// Options passed to the most recent scope-creating `transaction` call.
    pub fn last_options(&self) -> Option<TransactionOptions> {
        *self.last_options.lock()
    }

    async fn commit_scope(&self, connection: &ConnectionId) -> HookResult<()> {
        let (savepoint, pending) = {
            let map = self.connections.lock();
            let scope = map
                .get(connection)
                .and_then(|stack| stack.last())
                .ok_or_else(|| HookError::CommitFailed("no open scope".to_string()))?;
            (scope.savepoint, scope.observers.clone())
        };

        if !savepoint {
            // Before-commit runs while the transaction is still open; a
            // failure here aborts the commit and the scope rolls back.
            for observer in pending.iter() {
                if let Err(err) = observer.before_commit().await {
                    let _ = self.rollback_scope(connection).await;
                    return Err(err);
                }
            }
        }

        let (savepoint, observers) = {
            let mut map = self.connections.lock();
            let stack = map
                .get_mut(connection)
                .ok_or_else(|| HookError::CommitFailed("no open scope".to_string()))?;
            let scope = stack
                .pop()
                .ok_or_else(|| HookError::CommitFailed("no open scope".to_string()))?;
            if scope.savepoint {
                // Releasing a savepoint is not durable; its observers resolve
                // with the parent scope.
                let parent = stack
                    .last_mut()
                    .ok_or_else(|| HookError::CommitFailed("savepoint without parent".to_string()))?;
                parent.observers.extend(scope.observers);
                (true, Vec::new())
            } else {
                (false, scope.observers)
            }
        };

        if savepoint {
            return Ok(());
        }

        self.commits.fetch_add(1, Ordering::SeqCst);
        for observer in observers {
            observer.committed().await?;
        }
        Ok(())
    }

    async fn rollback_scope(&self, connection: &ConnectionId) -> HookResult<()> {
        let observers = {
            let mut map = self.connections.lock();
            let stack = map
                .get_mut(connection)
                .ok_or_else(|| HookError::RollbackFailed("no open scope".to_string()))?;
            stack
                .pop()
                .ok_or_else(|| HookError::RollbackFailed("no open scope".to_string()))?
                .observers
        };

        self.rollbacks.fetch_add(1, Ordering::SeqCst);
        for observer in observers {
            observer.rolled_back().await?;
        }
        Ok(())
    }
}

impl ObserverRegistry for MemoryManager {
    fn transaction_open(&self, connection: &ConnectionId) -> bool {
        self.depth(connection) > 0
    }

    fn joinable(&self, connection: &ConnectionId) -> bool {
        self.connections
            .lock()
            .get(connection)
            .and_then(|stack| stack.last())
            .is_some_and(|scope| scope.joinable)
    }

    fn track(
        &self,
        connection: &ConnectionId,
        observer: Arc<dyn TransactionAware>,
        placement: Placement,
    ) -> HookResult<()> {
        let mut map = self.connections.lock();
        let scope = map
            .get_mut(connection)
            .and_then(|stack| stack.last_mut())
            .ok_or_else(|| HookError::Tracking("no open transaction scope".to_string()))?;
        match placement {
            Placement::Append => scope.observers.push(observer),
            Placement::Prepend => scope.observers.insert(0, observer),
        }
        Ok(())
    }
}

#[async_trait]
impl TransactionManager for MemoryManager {
    async fn transaction(
        &self,
        connection: &ConnectionId,
        requires_new: bool,
        options: TransactionOptions,
        body: ScopeBody,
    ) -> HookResult<()> {
        let created = {
            let mut map = self.connections.lock();
            let stack = map.entry(*connection).or_default();
            if stack.is_empty() || requires_new {
                stack.push(Scope {
                    savepoint: !stack.is_empty(),
                    joinable: options.joinable,
                    observers: Vec::new(),
                });
                true
            } else {
                false
            }
        };

        if !created {
            // Joined to an existing scope: nothing to commit, nothing to
            // absorb, every error propagates to the scope's real owner.
            return body().await;
        }
        *self.last_options.lock() = Some(options);

        match body().await {
            Ok(()) => self.commit_scope(connection).await,
            Err(HookError::Rollback) => {
                // The abort-scope signal stops at the frame that created the
                // scope.
                self.rollback_scope(connection).await
            }
            Err(err) => {
                // The body's own failure wins over observer failures raised
                // on the rollback path.
                let _ = self.rollback_scope(connection).await;
                Err(err)
            }
        }
    }
}

impl ConnectionProvider for MemoryManager {
    fn active_connection(&self) -> Option<ConnectionId> {
        *self.ambient.lock()
    }

    fn default_connection(&self) -> HookResult<ConnectionId> {
        let mut ambient = self.ambient.lock();
        Ok(*ambient.get_or_insert_with(ConnectionId::new))
    }
}
