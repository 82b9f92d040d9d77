//! A pull-based reactive computation graph.
//!
//! Three node kinds compose: [`Cell`] holds a mutable source value,
//! [`Formula`] memoizes a derived computation over other nodes, and
//! [`Subscription`] adapts an external push-or-pull source into the same
//! graph. Reads are pull-driven and recursively validate transitive
//! dependencies; writes are push-driven and fan out lazily, only as far as
//! anyone is actually listening.

mod cell;
mod error;
mod formula;
mod frame;
mod node;
mod subscription;

pub use cell::Cell;
pub use error::{EngineError, ReadError};
pub use formula::Formula;
pub use node::ListenerHandle;
pub use subscription::Subscription;

pub use reactive_runtime::{InlineScheduler, SameValue, Scheduler};
