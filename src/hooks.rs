use std::future::Future;
use std::sync::Arc;

use crate::error::{HookError, HookResult};
use crate::manager::{
    ConnectionId, ConnectionProvider, Placement, TransactionManager, TransactionOptions,
};
use crate::policy::{LifecyclePoint, WithoutTransaction};
use crate::record::{Callback, CallbackRecord};

/// Options for a single callback registration.
///
/// [`CallbackOptions::new`] applies the per-point policy default; the builder
/// methods override connection, policy and placement.
#[derive(Debug)]
pub struct CallbackOptions {
    pub connection: Option<ConnectionId>,
    pub point: LifecyclePoint,
    pub without_tx: WithoutTransaction,
    pub placement: Placement,
}

impl CallbackOptions {
    pub fn new(point: LifecyclePoint) -> Self {
        Self {
            connection: None,
            point,
            without_tx: point.default_policy(),
            placement: Placement::Append,
        }
    }

    /// Registers against an explicit connection instead of the ambient one.
    pub fn connection(mut self, connection: ConnectionId) -> Self {
        self.connection = Some(connection);
        self
    }

    /// Overrides the no-transaction policy.
    pub fn without_tx(mut self, policy: WithoutTransaction) -> Self {
        self.without_tx = policy;
        self
    }

    /// Notifies this callback before previously registered ones.
    pub fn prepend(mut self) -> Self {
        self.placement = Placement::Prepend;
        self
    }
}

/// Entry point for registering transactional callbacks from anywhere in an
/// application, without going through a persistent-record object.
///
/// `Hooks` is a thin handle over the external transaction manager; cloning is
/// cheap and clones share the manager.
pub struct Hooks<M> {
    manager: Arc<M>,
}

impl<M> Clone for Hooks<M> {
    fn clone(&self) -> Self {
        Self {
            manager: Arc::clone(&self.manager),
        }
    }
}

impl<M> Hooks<M>
where
    M: TransactionManager + ConnectionProvider + 'static,
{
    pub fn new(manager: Arc<M>) -> Self {
        Self { manager }
    }

    /// The transaction manager this handle registers against.
    pub fn manager(&self) -> &Arc<M> {
        &self.manager
    }

    /// Runs `callback` after successful commit of the outermost transaction
    /// on `connection` (ambient connection when `None`).
    ///
    /// Outside a transaction the callback runs immediately; use
    /// [`Hooks::register_callback`] to override that policy or to prepend.
    pub fn after_commit<F>(&self, connection: Option<ConnectionId>, callback: F) -> HookResult<()>
    where
        F: FnOnce() -> HookResult<()> + Send + 'static,
    {
        let mut options = CallbackOptions::new(LifecyclePoint::AfterCommit);
        options.connection = connection;
        self.register_callback(options, Some(Box::new(callback)))
    }

    /// Runs `callback` just before the outermost transaction on `connection`
    /// commits, while the transaction is still open.
    ///
    /// Outside a transaction a warning is emitted and the callback runs
    /// immediately.
    pub fn before_commit<F>(&self, connection: Option<ConnectionId>, callback: F) -> HookResult<()>
    where
        F: FnOnce() -> HookResult<()> + Send + 'static,
    {
        let mut options = CallbackOptions::new(LifecyclePoint::BeforeCommit);
        options.connection = connection;
        self.register_callback(options, Some(Box::new(callback)))
    }

    /// Runs `callback` after rollback of the transaction or savepoint it was
    /// registered in.
    ///
    /// Fails with [`HookError::NotInTransaction`] when no transaction is
    /// open: rolling back without a transaction is nonsensical.
    pub fn after_rollback<F>(
        &self,
        connection: Option<ConnectionId>,
        callback: F,
    ) -> HookResult<()>
    where
        F: FnOnce() -> HookResult<()> + Send + 'static,
    {
        let mut options = CallbackOptions::new(LifecyclePoint::AfterRollback);
        options.connection = connection;
        self.register_callback(options, Some(Box::new(callback)))
    }

    /// Registers `callback` per `options`. This is the full-control form
    /// behind the three convenience methods.
    ///
    /// Registrations against the same scope accumulate: all of them fire when
    /// the scope resolves, in registration order (prepended ones first, in
    /// reverse order of prepending). There is no replace semantics.
    ///
    /// Sharp edge: if a callback fails while a scope resolves, later
    /// same-phase callbacks in that scope are not invoked and the failure
    /// surfaces to whoever drove the commit or rollback.
    pub fn register_callback(
        &self,
        options: CallbackOptions,
        callback: Option<Callback>,
    ) -> HookResult<()> {
        let Some(callback) = callback else {
            return Err(HookError::MissingCallback(options.point));
        };

        if !self.in_transaction(options.connection) {
            return match options.without_tx {
                WithoutTransaction::WarnAndExecute => {
                    tracing::warn!(
                        point = %options.point,
                        "no transaction open, executing callback immediately"
                    );
                    callback()
                }
                WithoutTransaction::Execute => callback(),
                WithoutTransaction::Raise => Err(HookError::NotInTransaction(options.point)),
            };
        }

        let connection = match options.connection {
            Some(connection) => connection,
            None => self.manager.default_connection()?,
        };
        let record = CallbackRecord::new(connection).on(options.point, callback);
        self.manager
            .track(&connection, Arc::new(record), options.placement)
    }

    /// Whether a joinable transaction is currently open.
    ///
    /// With no explicit connection this never establishes one: if the
    /// context has no active connection there is nothing to be inside of.
    pub fn in_transaction(&self, connection: Option<ConnectionId>) -> bool {
        let connection = match connection.or_else(|| self.manager.active_connection()) {
            Some(connection) => connection,
            None => return false,
        };
        // Service transactions (test fixtures) are not joinable.
        self.manager.transaction_open(&connection) && self.manager.joinable(&connection)
    }

    /// Makes sure `body` runs inside a transaction, starting one when needed.
    ///
    /// When a transaction is already open and `requires_new` is false, `body`
    /// runs joined to that scope and every error it returns, including
    /// [`HookError::Rollback`], propagates: this helper did not create the
    /// scope and has no authority to absorb its control signal. Otherwise the
    /// transaction manager opens a scope (a forced savepoint sub-scope when
    /// `requires_new`) and resolves it around `body`.
    pub async fn run_in_transaction<F, Fut>(
        &self,
        connection: Option<ConnectionId>,
        requires_new: bool,
        options: TransactionOptions,
        body: F,
    ) -> HookResult<()>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = HookResult<()>> + Send + 'static,
    {
        let connection = match connection {
            Some(connection) => connection,
            None => self.manager.default_connection()?,
        };

        if !requires_new && self.in_transaction(Some(connection)) {
            return body().await;
        }

        self.manager
            .transaction(
                &connection,
                requires_new,
                options,
                Box::new(move || {
                    let fut: std::pin::Pin<Box<dyn Future<Output = HookResult<()>> + Send>> =
                        Box::pin(body());
                    fut
                }),
            )
            .await
    }
}
