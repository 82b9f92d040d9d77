//! The object-safe core every node type (`Cell`, `Formula`, `Subscription`)
//! implements, plus the listener/back-edge bookkeeping ([`NodeBase`]) they
//! all embed.
//!
//! Dependency edges are deliberately asymmetric: a node's *forward* edges (its
//! own dependency set, held in `formula.rs`/`subscription.rs`) are strong
//! `Rc`s, since a node needs its dependencies to stay alive to read them. The
//! *back*-edges kept here — who depends on this node — are `Weak`, so a
//! formula with no remaining strong references can still be collected even
//! while its upstream cells list it as a dependent.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use reactive_runtime::Version;

/// Crate-internal vocabulary shared by every dependency/dependent edge and by
/// the dependency-frame machinery in `frame.rs`. Not exposed to callers: the
/// public surface is `Cell`/`Formula`/`Subscription` themselves.
pub(crate) trait Node {
    fn latest_version(&self) -> Version;
    fn add_dependent(&self, dependent: Weak<dyn Node>);
    fn remove_dependent(&self, dependent: &Weak<dyn Node>);
    fn notify(&self);
}

/// Opaque handle returned by `add_listener`. Rust closures aren't
/// pointer-comparable the way the distilled specification's "multiset of
/// function identities" assumes, so removal goes through this instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerHandle(usize);

/// The listener list and dependent back-edges shared by every node type.
#[derive(Default)]
pub(crate) struct NodeBase {
    listeners: RefCell<Vec<Option<Rc<dyn Fn()>>>>,
    dependents: RefCell<Vec<Weak<dyn Node>>>,
}

impl NodeBase {
    pub(crate) fn add_listener(&self, f: impl Fn() + 'static) -> ListenerHandle {
        let mut listeners = self.listeners.borrow_mut();
        listeners.push(Some(Rc::new(f)));
        ListenerHandle(listeners.len() - 1)
    }

    pub(crate) fn remove_listener(&self, handle: ListenerHandle) {
        if let Some(slot) = self.listeners.borrow_mut().get_mut(handle.0) {
            *slot = None;
        }
    }

    pub(crate) fn has_listeners(&self) -> bool {
        self.listeners.borrow().iter().any(Option::is_some)
    }

    pub(crate) fn add_dependent(&self, dependent: Weak<dyn Node>) {
        let mut dependents = self.dependents.borrow_mut();
        if !dependents.iter().any(|existing| Weak::ptr_eq(existing, &dependent)) {
            dependents.push(dependent);
        }
    }

    pub(crate) fn remove_dependent(&self, dependent: &Weak<dyn Node>) {
        self.dependents
            .borrow_mut()
            .retain(|existing| !Weak::ptr_eq(existing, dependent));
    }

    /// Prunes dependents whose formula has since been dropped, and reports
    /// whether any live one remains.
    pub(crate) fn has_live_dependents(&self) -> bool {
        let mut dependents = self.dependents.borrow_mut();
        dependents.retain(|d| d.strong_count() > 0);
        !dependents.is_empty()
    }

    pub(crate) fn is_listened_to(&self) -> bool {
        self.has_listeners() || self.has_live_dependents()
    }

    /// Runs every listener and dependent that existed when the fanout began.
    /// Listeners/dependents added mid-fanout (by a listener that itself
    /// subscribes) are left for the next notification, not fired this pass.
    pub(crate) fn fanout(&self) {
        let snapshot_len = self.listeners.borrow().len();
        for index in 0..snapshot_len {
            let listener = self.listeners.borrow().get(index).cloned().flatten();
            if let Some(listener) = listener {
                listener();
            }
        }
        let dependents_snapshot: Vec<Weak<dyn Node>> = self.dependents.borrow().clone();
        for dependent in dependents_snapshot {
            if let Some(dependent) = dependent.upgrade() {
                dependent.notify();
            }
        }
    }
}
