//! Errors the engine itself can raise, as distinct from a formula's own
//! `Abrupt` completions (which travel through [`crate::ReadError::Abrupt`]
//! rather than this enum).

use thiserror::Error;

/// A misuse of the engine's entry points, detected synchronously.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum EngineError {
    /// `read_inside_formula` was called with no formula evaluation in progress
    /// to record the dependency against.
    #[error("read_inside_formula called with no active formula evaluation")]
    OutOfContext,
    /// `Cell::set` was called from within a formula's closure.
    #[error("Cell::set called while a formula evaluation is in progress")]
    SetDuringEvaluation,
}

/// The error half of reading a [`crate::Formula`] or [`crate::Subscription`]:
/// either the engine itself rejected the call, or the closure produced an
/// `Abrupt` completion.
#[derive(Debug, Clone, Error)]
pub enum ReadError<E> {
    #[error(transparent)]
    Context(#[from] EngineError),
    #[error("read observed an abrupt completion")]
    Abrupt(E),
}

impl<E> ReadError<E> {
    /// The abrupt payload, if that's what this is.
    pub fn into_abrupt(self) -> Option<E> {
        match self {
            ReadError::Abrupt(error) => Some(error),
            ReadError::Context(_) => None,
        }
    }
}
