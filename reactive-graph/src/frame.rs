//! The thread-local dependency frame a `Formula` (or `Subscription`) builds up
//! while its closure runs, and the RAII guards that install/restore it.
//!
//! Every node read through `read_inside_formula` records itself plus the
//! version it was read at into whatever frame is currently active. A formula
//! being recomputed installs a fresh, empty frame before running its closure
//! and takes the finished frame back as its new dependency set — panic-safe,
//! since the restore happens in `Drop` regardless of how the closure exits.

use std::cell::RefCell;
use std::rc::Rc;

use reactive_runtime::Version;

use crate::error::EngineError;
use crate::node::Node;

pub(crate) type DependencyEntry = (Rc<dyn Node>, Version);

thread_local! {
    static CURRENT_FRAME: RefCell<Option<Vec<DependencyEntry>>> = const { RefCell::new(None) };
}

/// Records a read against the active frame. Fails if nothing installed one —
/// `read_inside_formula` was called outside any formula's evaluation.
pub(crate) fn record_dependency(node: Rc<dyn Node>, version: Version) -> Result<(), EngineError> {
    CURRENT_FRAME.with(|frame| {
        let mut frame = frame.borrow_mut();
        match frame.as_mut() {
            Some(entries) => {
                if let Some(slot) = entries
                    .iter_mut()
                    .find(|(existing, _)| Rc::ptr_eq(existing, &node))
                {
                    slot.1 = version;
                } else {
                    entries.push((node, version));
                }
                Ok(())
            }
            None => Err(EngineError::OutOfContext),
        }
    })
}

pub(crate) fn is_inside_formula_evaluation() -> bool {
    CURRENT_FRAME.with(|frame| frame.borrow().is_some())
}

/// Installs a fresh dependency frame for a recomputation, handing back the
/// outer one (if any) on [`FrameGuard::finish`] — or on drop, if the
/// closure that ran in between unwound instead of returning.
#[must_use = "dropping this guard without calling finish() discards the recorded dependencies"]
pub(crate) struct FrameGuard {
    previous: Option<Vec<DependencyEntry>>,
    finished: bool,
}

impl FrameGuard {
    pub(crate) fn enter() -> Self {
        let previous = CURRENT_FRAME.with(|frame| frame.borrow_mut().replace(Vec::new()));
        FrameGuard {
            previous,
            finished: false,
        }
    }

    /// Takes the entries recorded since `enter` and restores the outer frame.
    pub(crate) fn finish(mut self) -> Vec<DependencyEntry> {
        let recorded = CURRENT_FRAME
            .with(|frame| frame.replace(self.previous.take()))
            .unwrap_or_default();
        self.finished = true;
        recorded
    }
}

impl Drop for FrameGuard {
    fn drop(&mut self) {
        if !self.finished {
            CURRENT_FRAME.with(|frame| *frame.borrow_mut() = self.previous.take());
        }
    }
}

/// Hides the active frame for the duration of a call that must not be
/// allowed to attach spurious dependencies — a subscription's external `get`.
pub(crate) struct FrameSuppressGuard {
    previous: Option<Vec<DependencyEntry>>,
}

impl FrameSuppressGuard {
    pub(crate) fn enter() -> Self {
        let previous = CURRENT_FRAME.with(|frame| frame.borrow_mut().take());
        FrameSuppressGuard { previous }
    }
}

impl Drop for FrameSuppressGuard {
    fn drop(&mut self) {
        CURRENT_FRAME.with(|frame| *frame.borrow_mut() = self.previous.take());
    }
}
