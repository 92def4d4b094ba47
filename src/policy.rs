use std::fmt;
use std::str::FromStr;

use crate::error::HookError;

/// The three points of a transaction's lifecycle a callback can target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LifecyclePoint {
    BeforeCommit,
    AfterCommit,
    AfterRollback,
}

impl LifecyclePoint {
    /// Default no-transaction policy for registrations at this point.
    ///
    /// After-rollback has no sensible meaning outside a transaction, so it
    /// defaults to failing.
    pub fn default_policy(self) -> WithoutTransaction {
        match self {
            LifecyclePoint::BeforeCommit => WithoutTransaction::WarnAndExecute,
            LifecyclePoint::AfterCommit => WithoutTransaction::Execute,
            LifecyclePoint::AfterRollback => WithoutTransaction::Raise,
        }
    }
}

impl fmt::Display for LifecyclePoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LifecyclePoint::BeforeCommit => "before_commit",
            LifecyclePoint::AfterCommit => "after_commit",
            LifecyclePoint::AfterRollback => "after_rollback",
        };
        f.write_str(name)
    }
}

/// Behavior of a registration made while no transaction is open.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum WithoutTransaction {
    /// Fail the registration with [`HookError::NotInTransaction`].
    Raise,
    /// Run the callback immediately, synchronously, and return its result.
    #[default]
    Execute,
    /// Emit a warning naming the lifecycle point, then run the callback
    /// immediately.
    WarnAndExecute,
}

impl fmt::Display for WithoutTransaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            WithoutTransaction::Raise => "raise",
            WithoutTransaction::Execute => "execute",
            WithoutTransaction::WarnAndExecute => "warn_and_execute",
        };
        f.write_str(name)
    }
}

impl FromStr for WithoutTransaction {
    type Err = HookError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "raise" => Ok(WithoutTransaction::Raise),
            "execute" => Ok(WithoutTransaction::Execute),
            "warn_and_execute" => Ok(WithoutTransaction::WarnAndExecute),
            other => Err(HookError::InvalidPolicy(other.to_string())),
        }
    }
}
