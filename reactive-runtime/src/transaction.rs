//! Scoped transaction ids, short-circuiting repeated validation within one read.
//!
//! A fresh [`TxId`](crate::TxId) is allocated at the outermost call into the
//! engine; nested engine entries (a formula reading another formula) reuse
//! the current id. This is thread-local scoped state rather than a true
//! process-wide static, since the engine is single-threaded cooperative and
//! every thread that happens to drive one gets its own transaction sequence.

use std::cell::Cell;

use crate::TxId;

thread_local! {
    static NEXT_TX_ID: Cell<TxId> = const { Cell::new(1) };
    static CURRENT_TX_ID: Cell<Option<TxId>> = const { Cell::new(None) };
}

/// The transaction id the current call is running under, if any.
pub fn current_tx_id() -> Option<TxId> {
    CURRENT_TX_ID.with(|cell| cell.get())
}

/// Enters a transaction, allocating a fresh id only if none is active yet.
///
/// Drop the returned guard to leave the transaction. LIFO and panic-safe: if
/// the caller's closure unwinds, the guard still runs and restores the outer
/// (or absent) transaction id.
#[must_use = "dropping this guard immediately ends the transaction"]
pub fn enter_transaction() -> TransactionGuard {
    let owns_transaction = CURRENT_TX_ID.with(|cell| {
        if cell.get().is_some() {
            false
        } else {
            let id = NEXT_TX_ID.with(|counter| {
                let id = counter.get();
                counter.set(id + 1);
                id
            });
            cell.set(Some(id));
            #[cfg(feature = "tracing")]
            tracing::trace!(tx_id = id, "allocated new transaction");
            true
        }
    });
    TransactionGuard { owns_transaction }
}

/// RAII guard returned by [`enter_transaction`]. Only the call that actually
/// allocated the transaction id tears it back down.
pub struct TransactionGuard {
    owns_transaction: bool,
}

impl Drop for TransactionGuard {
    fn drop(&mut self) {
        if self.owns_transaction {
            CURRENT_TX_ID.with(|cell| cell.set(None));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nested_entries_reuse_the_outer_id() {
        assert_eq!(current_tx_id(), None);
        let outer = enter_transaction();
        let id = current_tx_id();
        assert!(id.is_some());
        {
            let _inner = enter_transaction();
            assert_eq!(current_tx_id(), id);
        }
        assert_eq!(current_tx_id(), id);
        drop(outer);
        assert_eq!(current_tx_id(), None);
    }

    #[test]
    fn sequential_transactions_get_distinct_ids() {
        let a = enter_transaction();
        let id_a = current_tx_id();
        drop(a);
        let b = enter_transaction();
        let id_b = current_tx_id();
        drop(b);
        assert_ne!(id_a, id_b);
    }
}
