//! Transaction Hooks
//!
//! This crate lets arbitrary application code register callbacks that fire at
//! specific points of a database transaction's lifecycle: before commit,
//! after commit and after rollback. It does not manage transactions itself;
//! it attaches observers to an external transaction manager through the
//! boundary traits in [`manager`].
//!
//! Registration is correct under nested transactions (savepoints), multiple
//! independent connections, and the no-transaction edge case, where a
//! per-lifecycle-point policy decides between failing, executing immediately,
//! or warning and executing.

pub mod error;
pub mod hooks;
pub mod manager;
pub mod observer;
pub mod policy;
pub mod record;

pub use error::{HookError, HookResult};
pub use hooks::{CallbackOptions, Hooks};
pub use manager::{
    ConnectionId, ConnectionProvider, IsolationLevel, ObserverRegistry, Placement, ScopeBody,
    TransactionManager, TransactionOptions,
};
pub use observer::TransactionAware;
pub use policy::{LifecyclePoint, WithoutTransaction};
pub use record::{Callback, CallbackRecord};
