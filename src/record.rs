use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::error::HookResult;
use crate::manager::{ConnectionId, ObserverRegistry, Placement};
use crate::observer::TransactionAware;
use crate::policy::LifecyclePoint;

/// A callback stored on a [`CallbackRecord`].
pub type Callback = Box<dyn FnOnce() -> HookResult<()> + Send>;

/// One registration's adapter object.
///
/// Holds up to one callback per lifecycle point for a single connection and
/// implements [`TransactionAware`] so the transaction manager can track it
/// like any other observer. Each stored callback is consumed on first fire,
/// so it runs at most once even if the record ends up attached to more than
/// one scope through [`TransactionAware::reattach`].
pub struct CallbackRecord {
    connection: ConnectionId,
    handlers: Mutex<BTreeMap<LifecyclePoint, Callback>>,
}

impl CallbackRecord {
    pub fn new(connection: ConnectionId) -> Self {
        Self {
            connection,
            handlers: Mutex::new(BTreeMap::new()),
        }
    }

    /// Stores `callback` for `point`, replacing any previous one at the same
    /// point on this record.
    pub fn on<F>(self, point: LifecyclePoint, callback: F) -> Self
    where
        F: FnOnce() -> HookResult<()> + Send + 'static,
    {
        self.handlers.lock().insert(point, Box::new(callback));
        self
    }

    /// The connection this record was registered against.
    pub fn connection(&self) -> ConnectionId {
        self.connection
    }

    /// True if no lifecycle point has a callback stored (or all have fired).
    pub fn is_empty(&self) -> bool {
        self.handlers.lock().is_empty()
    }

    fn fire(&self, point: LifecyclePoint) -> HookResult<()> {
        let handler = self.handlers.lock().remove(&point);
        match handler {
            Some(callback) => callback(),
            None => Ok(()),
        }
    }
}

impl fmt::Debug for CallbackRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallbackRecord")
            .field("connection", &self.connection)
            .field("points", &self.handlers.lock().keys().collect::<Vec<_>>())
            .finish()
    }
}

#[async_trait]
impl TransactionAware for CallbackRecord {
    async fn before_commit(&self) -> HookResult<()> {
        self.fire(LifecyclePoint::BeforeCommit)
    }

    async fn committed(&self) -> HookResult<()> {
        self.fire(LifecyclePoint::AfterCommit)
    }

    async fn rolled_back(&self) -> HookResult<()> {
        self.fire(LifecyclePoint::AfterRollback)
    }

    async fn reattach(self: Arc<Self>, registry: &dyn ObserverRegistry) -> HookResult<()> {
        let connection = self.connection;
        registry.track(&connection, self, Placement::Append)
    }
}
