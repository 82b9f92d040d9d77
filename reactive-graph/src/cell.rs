//! The mutable leaves of the graph: values with no dependencies of their own.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use reactive_runtime::{InlineScheduler, SameValue, Scheduler, Version};

use crate::error::EngineError;
use crate::frame;
use crate::node::{ListenerHandle, Node, NodeBase};

struct CellState<T> {
    version: Version,
    value: T,
}

/// A reactive source with no upstream dependencies. Writes that don't change
/// the value (per [`SameValue`]) are no-ops: no version bump, no fanout.
pub struct Cell<T> {
    base: NodeBase,
    self_weak: Weak<Cell<T>>,
    state: RefCell<CellState<T>>,
    scheduler: Box<dyn Scheduler>,
}

impl<T: 'static + SameValue + Clone> Cell<T> {
    pub fn new(initial: T) -> Rc<Self> {
        Self::with_scheduler(initial, InlineScheduler)
    }

    /// Builds a cell whose post-write notification is deferred through a
    /// custom [`Scheduler`] instead of running inline.
    pub fn with_scheduler(initial: T, scheduler: impl Scheduler + 'static) -> Rc<Self> {
        Rc::new_cyclic(|weak_self| Cell {
            base: NodeBase::default(),
            self_weak: weak_self.clone(),
            state: RefCell::new(CellState {
                version: 0,
                value: initial,
            }),
            scheduler: Box::new(scheduler),
        })
    }

    /// Writes a new value. Fails with [`EngineError::SetDuringEvaluation`] if
    /// called from inside a formula's closure — a cell write there would
    /// invalidate nodes the very evaluation reading them depends on having
    /// stable versions for.
    pub fn set(&self, new_value: T) -> Result<(), EngineError> {
        if frame::is_inside_formula_evaluation() {
            return Err(EngineError::SetDuringEvaluation);
        }
        let changed = {
            let mut state = self.state.borrow_mut();
            if state.value.same_value(&new_value) {
                false
            } else {
                state.version += 1;
                state.value = new_value;
                true
            }
        };
        if changed {
            #[cfg(feature = "tracing")]
            tracing::trace!("cell write accepted, scheduling notify");
            let node: Weak<dyn Node> = self.self_weak.clone();
            self.scheduler.schedule(Box::new(move || {
                if let Some(node) = node.upgrade() {
                    node.notify();
                }
            }));
        }
        Ok(())
    }

    /// Reads the current value, recording this cell as a dependency of
    /// whatever formula is currently evaluating.
    pub fn read_inside_formula(&self) -> Result<T, EngineError> {
        let (version, value) = {
            let state = self.state.borrow();
            (state.version, state.value.clone())
        };
        let node: Rc<dyn Node> = self
            .self_weak
            .upgrade()
            .expect("cell is alive while reading from itself");
        frame::record_dependency(node, version)?;
        Ok(value)
    }

    /// Reads the current value without attaching it as a dependency of
    /// anything.
    pub fn read_without_listening(&self) -> T {
        self.state.borrow().value.clone()
    }

    pub fn add_listener(&self, f: impl Fn() + 'static) -> ListenerHandle {
        self.base.add_listener(f)
    }

    pub fn remove_listener(&self, handle: ListenerHandle) {
        self.base.remove_listener(handle);
    }
}

impl<T: 'static + SameValue + Clone> Node for Cell<T> {
    fn latest_version(&self) -> Version {
        self.state.borrow().version
    }

    fn add_dependent(&self, dependent: Weak<dyn Node>) {
        self.base.add_dependent(dependent);
    }

    fn remove_dependent(&self, dependent: &Weak<dyn Node>) {
        self.base.remove_dependent(dependent);
    }

    fn notify(&self) {
        self.base.fanout();
    }
}
