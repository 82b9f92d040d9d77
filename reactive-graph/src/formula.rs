//! Memoized derived computations: the pull-validated core of the graph.

use std::cell::RefCell;
use std::fmt::Debug;
use std::rc::{Rc, Weak};

use reactive_runtime::{enter_transaction, current_tx_id, Completion, SameValue, TxId, Version};

use crate::error::ReadError;
use crate::frame::{self, DependencyEntry};
use crate::node::{ListenerHandle, Node, NodeBase};

struct FormulaState<T, E> {
    /// `None` means Invalid (either never evaluated, or explicitly
    /// invalidated); `Some(tx)` means valid as of transaction `tx`.
    valid: Option<TxId>,
    version: Version,
    completion: Option<Completion<T, E>>,
    /// `None` only before the first evaluation ever runs.
    dependencies: Option<Vec<DependencyEntry>>,
}

/// A derived value recomputed lazily from a closure, memoized by comparing
/// successive completions with [`SameValue`] rather than by counting writes.
pub struct Formula<T, E> {
    base: NodeBase,
    self_weak: Weak<Formula<T, E>>,
    closure: RefCell<Box<dyn FnMut() -> Result<T, E>>>,
    state: RefCell<FormulaState<T, E>>,
}

impl<T, E> Formula<T, E>
where
    T: 'static + SameValue + Clone,
    E: 'static + SameValue + Clone + Debug,
{
    pub fn new(closure: impl FnMut() -> Result<T, E> + 'static) -> Rc<Self> {
        Rc::new_cyclic(|weak_self| Formula {
            base: NodeBase::default(),
            self_weak: weak_self.clone(),
            closure: RefCell::new(Box::new(closure)),
            state: RefCell::new(FormulaState {
                valid: None,
                version: 0,
                completion: None,
                dependencies: None,
            }),
        })
    }

    /// Reads the formula's value, recording it (at its freshly-validated
    /// version) as a dependency of whatever formula is currently evaluating.
    pub fn read_inside_formula(&self) -> Result<T, ReadError<E>> {
        self.validate();
        let (version, result) = {
            let state = self.state.borrow();
            let version = state.version;
            let result = state
                .completion
                .as_ref()
                .expect("validated formulas always have a completion")
                .as_result()
                .map(Clone::clone)
                .map_err(Clone::clone);
            (version, result)
        };
        let node: Rc<dyn Node> = self
            .self_weak
            .upgrade()
            .expect("formula is alive while reading from itself");
        frame::record_dependency(node, version)?;
        result.map_err(ReadError::Abrupt)
    }

    /// Reads the formula's value without attaching it as a dependency of
    /// anything.
    pub fn read_without_listening(&self) -> Result<T, E> {
        self.validate();
        let state = self.state.borrow();
        state
            .completion
            .as_ref()
            .expect("validated formulas always have a completion")
            .as_result()
            .map(Clone::clone)
            .map_err(Clone::clone)
    }

    pub fn add_listener(&self, f: impl Fn() + 'static) -> ListenerHandle {
        let was_listened_to = self.base.is_listened_to();
        let handle = self.base.add_listener(f);
        if !was_listened_to {
            self.on_listened_to_became_true();
        }
        handle
    }

    pub fn remove_listener(&self, handle: ListenerHandle) {
        self.base.remove_listener(handle);
        if !self.base.is_listened_to() {
            self.on_listened_to_became_false();
        }
    }

    /// The validation protocol: short-circuit within a transaction, else walk
    /// the dependency set for staleness, recomputing only if something
    /// upstream actually changed.
    fn validate(&self) -> Version {
        let _tx_guard = enter_transaction();
        let current_tx = current_tx_id().expect("a transaction is active inside validate");

        if self.state.borrow().valid == Some(current_tx) {
            return self.state.borrow().version;
        }

        let needs_recompute = {
            let state = self.state.borrow();
            match &state.dependencies {
                None => true,
                Some(dependencies) => dependencies
                    .iter()
                    .any(|(dependency, observed)| dependency.latest_version() > *observed),
            }
        };

        if needs_recompute {
            #[cfg(feature = "tracing")]
            tracing::trace!(tx_id = current_tx, "formula recomputing");
            self.recompute();
        }

        self.state.borrow_mut().valid = Some(current_tx);
        self.state.borrow().version
    }

    /// Runs the closure in a fresh dependency frame, applies the
    /// skip-on-equal-completion rule, and reconciles dependent registrations
    /// against the previous dependency set if this formula is listened-to.
    fn recompute(&self) {
        let frame_guard = frame::FrameGuard::enter();
        let result = (self.closure.borrow_mut())();
        let new_dependencies = frame_guard.finish();
        let new_completion = Completion::from_result(result);

        let previous_dependencies = {
            let mut state = self.state.borrow_mut();
            let is_first_evaluation = state.dependencies.is_none();
            let unchanged = !is_first_evaluation
                && state
                    .completion
                    .as_ref()
                    .is_some_and(|old| old.same_outcome_as(&new_completion));
            if !unchanged {
                state.version += 1;
                state.completion = Some(new_completion);
            }
            state.dependencies.replace(new_dependencies.clone())
        };

        if self.base.is_listened_to() {
            self.diff_dependencies(previous_dependencies.unwrap_or_default(), &new_dependencies);
        }
    }

    /// Adds dependent registrations for dependencies new to this evaluation
    /// and removes them for dependencies no longer present.
    fn diff_dependencies(&self, mut old: Vec<DependencyEntry>, new: &[DependencyEntry]) {
        let weak_self: Weak<dyn Node> = self.self_weak.clone();
        for (dependency, _) in new {
            if let Some(position) = old
                .iter()
                .position(|(existing, _)| Rc::ptr_eq(existing, dependency))
            {
                old.swap_remove(position);
            } else {
                dependency.add_dependent(weak_self.clone());
            }
        }
        for (dependency, _) in old {
            dependency.remove_dependent(&weak_self);
        }
    }

    fn on_listened_to_became_true(&self) {
        let never_evaluated = self.state.borrow().dependencies.is_none();
        if never_evaluated {
            // `recompute` (triggered via `validate`) sees `is_listened_to() ==
            // true` already, so it performs the full dependent registration
            // itself — no need to walk the dependency set again here.
            self.validate();
            return;
        }
        let weak_self: Weak<dyn Node> = self.self_weak.clone();
        let dependencies = self.state.borrow().dependencies.clone().unwrap_or_default();
        for (dependency, _) in dependencies {
            dependency.add_dependent(weak_self.clone());
        }
    }

    fn on_listened_to_became_false(&self) {
        let weak_self: Weak<dyn Node> = self.self_weak.clone();
        let dependencies = self.state.borrow().dependencies.clone().unwrap_or_default();
        for (dependency, _) in dependencies {
            dependency.remove_dependent(&weak_self);
        }
    }

    /// The push path: marks this formula invalid, drops its cached
    /// completion, and fans out to listeners/dependents — unless it's
    /// already invalid, in which case this is a no-op (this is what collapses
    /// diamond-shaped invalidation to one notification per node).
    fn invalidate(&self) {
        let mut state = self.state.borrow_mut();
        if state.valid.is_none() {
            return;
        }
        state.valid = None;
        state.completion = None;
        drop(state);
        #[cfg(feature = "tracing")]
        tracing::trace!("formula invalidated");
        self.base.fanout();
    }
}

impl<T, E> Node for Formula<T, E>
where
    T: 'static + SameValue + Clone,
    E: 'static + SameValue + Clone + Debug,
{
    fn latest_version(&self) -> Version {
        self.validate()
    }

    fn add_dependent(&self, dependent: Weak<dyn Node>) {
        let was_listened_to = self.base.is_listened_to();
        self.base.add_dependent(dependent);
        if !was_listened_to {
            self.on_listened_to_became_true();
        }
    }

    fn remove_dependent(&self, dependent: &Weak<dyn Node>) {
        self.base.remove_dependent(dependent);
        if !self.base.is_listened_to() {
            self.on_listened_to_became_false();
        }
    }

    fn notify(&self) {
        self.invalidate();
    }
}
