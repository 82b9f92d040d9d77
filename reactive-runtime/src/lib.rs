//! Transaction and version vocabulary shared by every node type in `reactive-graph`.
//!
//! This crate is the "leaf" layer: it knows nothing about nodes, dependency
//! graphs, or listeners. It only provides the primitives those concepts are
//! built from — a monotonic [`Version`], a scoped [`transaction`] id, the
//! [`Completion`] value that stands in for a thrown/returned outcome, the
//! [`SameValue`] equality predicate, and the [`Scheduler`] hook used to defer
//! notification after a write.

pub mod completion;
pub mod same_value;
pub mod scheduler;
pub mod transaction;

pub use completion::Completion;
pub use same_value::SameValue;
pub use scheduler::{InlineScheduler, Scheduler};
pub use transaction::{current_tx_id, enter_transaction, TransactionGuard};

/// Monotonic per-node counter. Bumped only when a node's observable state changes.
pub type Version = u64;

/// Identifies one read transaction. Allocated once per outermost engine entry.
pub type TxId = u64;
