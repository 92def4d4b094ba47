use std::sync::Arc;

use async_trait::async_trait;

use crate::error::HookResult;
use crate::manager::ObserverRegistry;

/// Trait for objects that need to be notified of transaction lifecycle events.
///
/// Implementors are registered with a transaction manager (see
/// [`ObserverRegistry::track`]) and receive callbacks when the scope they are
/// attached to commits or rolls back. This is the explicit capability set the
/// manager depends on; it treats any implementor the same way it would treat
/// a first-class persistent record.
#[async_trait]
pub trait TransactionAware: Send + Sync {
    /// Capability flag the manager may consult before tracking.
    fn has_transactional_callbacks(&self) -> bool {
        true
    }

    /// Called prior to the physical commit, while the transaction is still
    /// open.
    async fn before_commit(&self) -> HookResult<()> {
        Ok(())
    }

    /// Called strictly after a successful commit.
    ///
    /// Implementations should use this to finalize pending work, such as
    /// enqueueing jobs or invalidating caches.
    async fn committed(&self) -> HookResult<()>;

    /// Called after the owning scope rolls back, whether it was the outermost
    /// transaction or a savepoint.
    async fn rolled_back(&self) -> HookResult<()>;

    /// Re-registers this observer with the current innermost scope on its
    /// connection.
    ///
    /// Opening a forced-new sub-scope does not carry existing observers
    /// forward; a manager that needs an observer to follow it into such a
    /// scope calls this. Observers that never cross scope boundaries can keep
    /// the no-op default.
    async fn reattach(self: Arc<Self>, _registry: &dyn ObserverRegistry) -> HookResult<()> {
        Ok(())
    }
}
