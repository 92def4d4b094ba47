use crate::policy::LifecyclePoint;

/// Error type for callback registration and transaction-scope dispatch.
#[derive(Debug, thiserror::Error)]
pub enum HookError {
    #[error("no callback provided for {0}")]
    MissingCallback(LifecyclePoint),

    #[error("invalid without-transaction policy: {0:?}")]
    InvalidPolicy(String),

    #[error("{0} is useless outside of a transaction")]
    NotInTransaction(LifecyclePoint),

    /// Abort-scope signal. Returning this from a transaction body makes the
    /// frame that created the scope roll it back and swallow the signal;
    /// every other error rolls back and keeps propagating.
    #[error("transaction rollback requested")]
    Rollback,

    #[error("no default connection available")]
    NoDefaultConnection,

    #[error("failed to track transaction observer: {0}")]
    Tracking(String),

    #[error("callback failed: {0}")]
    Callback(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("transaction commit failed: {0}")]
    CommitFailed(String),

    #[error("transaction rollback failed: {0}")]
    RollbackFailed(String),
}

impl HookError {
    /// Wraps an arbitrary failure raised by a user callback.
    pub fn callback(err: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        HookError::Callback(err.into())
    }

    /// True for the abort-scope signal.
    pub fn is_rollback(&self) -> bool {
        matches!(self, HookError::Rollback)
    }
}

/// Result type for all operations in this crate.
pub type HookResult<T> = Result<T, HookError>;
