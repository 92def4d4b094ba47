use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::HookResult;
use crate::observer::TransactionAware;

/// Identifies one pooled database connection.
///
/// Every connection carries its own independent chain of pending observers;
/// callbacks registered against one connection never fire with another
/// connection's transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Where a newly tracked observer lands in its scope's notification list.
///
/// `Append` is the default: insertion order is dispatch order. `Prepend`
/// places the observer ahead of everything registered before it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Placement {
    #[default]
    Append,
    Prepend,
}

/// Standard SQL transaction isolation levels, passed through to the
/// transaction manager when a new scope is opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IsolationLevel {
    ReadUncommitted,
    ReadCommitted,
    RepeatableRead,
    Serializable,
}

impl IsolationLevel {
    /// SQL syntax for setting this isolation level.
    pub fn as_sql(&self) -> &'static str {
        match self {
            Self::ReadUncommitted => "READ UNCOMMITTED",
            Self::ReadCommitted => "READ COMMITTED",
            Self::RepeatableRead => "REPEATABLE READ",
            Self::Serializable => "SERIALIZABLE",
        }
    }
}

/// Options forwarded to the transaction manager when opening a scope.
#[derive(Debug, Clone, Copy)]
pub struct TransactionOptions {
    /// A non-joinable scope is a harness/fixture wrapper that application
    /// code must not attach callbacks to; registrations made inside one are
    /// treated as happening outside any transaction.
    pub joinable: bool,
    pub isolation: Option<IsolationLevel>,
}

impl Default for TransactionOptions {
    fn default() -> Self {
        Self {
            joinable: true,
            isolation: None,
        }
    }
}

/// Boxed body run inside a transaction scope.
pub type ScopeBody =
    Box<dyn FnOnce() -> Pin<Box<dyn Future<Output = HookResult<()>> + Send>> + Send>;

/// Object-safe tracking surface of a transaction manager.
///
/// Split out of [`TransactionManager`] so observers (which may need to
/// re-register themselves, see [`TransactionAware::reattach`]) can hold a
/// `&dyn ObserverRegistry` without knowing the concrete manager type.
pub trait ObserverRegistry: Send + Sync {
    /// Whether a transaction is currently open on `connection`.
    fn transaction_open(&self, connection: &ConnectionId) -> bool;

    /// Whether the innermost open transaction on `connection` accepts
    /// observers from application code.
    fn joinable(&self, connection: &ConnectionId) -> bool;

    /// Attach `observer` to the innermost open scope on `connection`, to be
    /// notified when that scope resolves. Fails with
    /// [`crate::HookError::Tracking`] if no scope is open.
    fn track(
        &self,
        connection: &ConnectionId,
        observer: Arc<dyn TransactionAware>,
        placement: Placement,
    ) -> HookResult<()>;
}

/// The external transaction manager this crate attaches to.
///
/// Implementations own the physical transactions, the per-connection scope
/// stack and the pending-observer lists; this crate only queries state and
/// appends observers.
#[async_trait]
pub trait TransactionManager: ObserverRegistry {
    /// Runs `body` within a transaction scope on `connection`.
    ///
    /// - No scope open: opens a real transaction.
    /// - Scope open and `requires_new`: opens a true savepoint sub-scope that
    ///   can roll back without aborting its parent.
    /// - Scope open and not `requires_new`: runs `body` joined to the current
    ///   scope. Nothing is created and nothing is absorbed; every error the
    ///   body returns, including [`crate::HookError::Rollback`], propagates.
    ///
    /// For a scope this call created: a body returning `Ok` takes the commit
    /// path (tracked observers get `before_commit` while the scope is still
    /// open, then the physical commit, then `committed` strictly after); a
    /// body returning `Err(Rollback)` takes the rollback path and the signal
    /// is swallowed; any other error takes the rollback path and propagates.
    ///
    /// Dispatch stops at the first observer failure and that failure
    /// surfaces to the caller; later same-phase observers are not notified.
    /// A `before_commit` failure aborts the commit entirely: the scope rolls
    /// back (its `rolled_back` observers run) and the failure propagates.
    ///
    /// A savepoint that commits transfers its observers to the parent scope,
    /// where they resolve with the parent; a savepoint that rolls back fires
    /// only its own `rolled_back` observers.
    async fn transaction(
        &self,
        connection: &ConnectionId,
        requires_new: bool,
        options: TransactionOptions,
        body: ScopeBody,
    ) -> HookResult<()>;
}

/// Resolves the ambient connection for the calling context.
pub trait ConnectionProvider: Send + Sync {
    /// The connection already checked out for this context, if any. Must
    /// never establish a new connection.
    fn active_connection(&self) -> Option<ConnectionId>;

    /// The ambient connection, establishing one if needed. Callers resolve
    /// this lazily so that "no transaction, no pool activity" paths never
    /// force a physical connection open.
    fn default_connection(&self) -> HookResult<ConnectionId>;
}
