//! Adapts a push-or-pull external source (anything with a `get`, an
//! `add_listener`, and a `remove_listener`) into a graph node.
//!
//! Unlike a [`crate::Formula`], a subscription has no dependency set of its
//! own to validate against — its freshness is governed by whether anyone is
//! listening. While listened-to, the upstream listener is the sole source of
//! invalidation (`get` is not polled speculatively); while not listened-to,
//! every read polls `get` directly, since there is no standing registration
//! to keep the cache honest.

use std::cell::RefCell;
use std::fmt::Debug;
use std::rc::{Rc, Weak};

use reactive_runtime::{current_tx_id, Completion, SameValue, TxId, Version};

use crate::error::ReadError;
use crate::frame;
use crate::node::{ListenerHandle, Node, NodeBase};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Validity {
    /// Notified by the upstream source (or never evaluated): the cached
    /// completion is stale and `invalidate()` has already fanned out (or has
    /// nothing to fan out yet). A second `invalidate()` call while still in
    /// this state is a diamond-notification duplicate and must be a no-op.
    Invalid,
    /// Just became listened-to: the cache may have drifted out of sync with
    /// the upstream source while nobody was watching, so the next `refresh`
    /// must repoll regardless of transaction. Distinct from `Invalid` so that
    /// an upstream notification arriving before that repoll still fans out
    /// instead of being mistaken for an already-handled duplicate.
    PendingRepoll,
    Fresh,
    Tx(TxId),
}

impl Validity {
    fn needs_repoll(self) -> bool {
        matches!(self, Validity::Invalid | Validity::PendingRepoll)
    }
}

struct SubscriptionState<T, E> {
    validity: Validity,
    version: Version,
    completion: Option<Completion<T, E>>,
}

/// A graph node backed by an external, non-graph source.
pub struct Subscription<T, E> {
    base: NodeBase,
    self_weak: Weak<Subscription<T, E>>,
    get: RefCell<Box<dyn FnMut() -> Result<T, E>>>,
    add_upstream_listener: RefCell<Box<dyn FnMut(Rc<dyn Fn()>)>>,
    remove_upstream_listener: RefCell<Box<dyn FnMut()>>,
    state: RefCell<SubscriptionState<T, E>>,
}

impl<T, E> Subscription<T, E>
where
    T: 'static + SameValue + Clone,
    E: 'static + SameValue + Clone + Debug,
{
    /// `add_listener` installs a callback the external source should invoke
    /// on every change; `remove_listener` uninstalls it. Only one upstream
    /// listener is ever installed at a time, so `remove_listener` takes no
    /// token — it simply tears down whatever `add_listener` last installed.
    pub fn new(
        get: impl FnMut() -> Result<T, E> + 'static,
        add_listener: impl FnMut(Rc<dyn Fn()>) + 'static,
        remove_listener: impl FnMut() + 'static,
    ) -> Rc<Self> {
        Rc::new_cyclic(|weak_self| Subscription {
            base: NodeBase::default(),
            self_weak: weak_self.clone(),
            get: RefCell::new(Box::new(get)),
            add_upstream_listener: RefCell::new(Box::new(add_listener)),
            remove_upstream_listener: RefCell::new(Box::new(remove_listener)),
            state: RefCell::new(SubscriptionState {
                validity: Validity::Invalid,
                version: 0,
                completion: None,
            }),
        })
    }

    pub fn read_inside_formula(&self) -> Result<T, ReadError<E>> {
        let version = self.refresh();
        let result = {
            let state = self.state.borrow();
            state
                .completion
                .as_ref()
                .expect("refreshed subscriptions always have a completion")
                .as_result()
                .map(Clone::clone)
                .map_err(Clone::clone)
        };
        let node: Rc<dyn Node> = self
            .self_weak
            .upgrade()
            .expect("subscription is alive while reading from itself");
        frame::record_dependency(node, version)?;
        result.map_err(ReadError::Abrupt)
    }

    pub fn read_without_listening(&self) -> Result<T, E> {
        self.refresh();
        let state = self.state.borrow();
        state
            .completion
            .as_ref()
            .expect("refreshed subscriptions always have a completion")
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

    /// Returns the cached version if it's already fresh for the current
    /// transaction; otherwise polls `get` when not listened-to (no standing
    /// upstream registration to trust) or when explicitly invalidated.
    fn refresh(&self) -> Version {
        let current_tx = current_tx_id();
        let already_fresh_for_this_tx = {
            let state = self.state.borrow();
            matches!((state.validity, current_tx), (Validity::Tx(v), Some(tx)) if v == tx)
        };
        if already_fresh_for_this_tx {
            return self.state.borrow().version;
        }

        let should_poll = {
            let validity = self.state.borrow().validity;
            !self.base.is_listened_to() || validity.needs_repoll()
        };
        if should_poll {
            #[cfg(feature = "tracing")]
            tracing::trace!("subscription polling external source");
            let suppress = frame::FrameSuppressGuard::enter();
            let result = (self.get.borrow_mut())();
            drop(suppress);

            let new_completion = Completion::from_result(result);
            let mut state = self.state.borrow_mut();
            let is_first_poll = state.completion.is_none();
            let unchanged = !is_first_poll
                && state
                    .completion
                    .as_ref()
                    .is_some_and(|old| old.same_outcome_as(&new_completion));
            if !unchanged {
                state.version += 1;
                state.completion = Some(new_completion);
            }
            state.validity = match current_tx {
                Some(tx) => Validity::Tx(tx),
                None => Validity::Fresh,
            };
        }
        self.state.borrow().version
    }

    fn on_listened_to_became_true(&self) {
        {
            let mut state = self.state.borrow_mut();
            let already_fresh_for_this_tx =
                matches!((state.validity, current_tx_id()), (Validity::Tx(v), Some(c)) if v == c);
            if !already_fresh_for_this_tx {
                // Not `Validity::Invalid`: that state also means "already
                // notified and fanned out this cycle" to `invalidate()`'s
                // dedup check, and this attach has not itself notified
                // anyone.
                state.validity = Validity::PendingRepoll;
            }
        }
        let weak_self = self.self_weak.clone();
        (self.add_upstream_listener.borrow_mut())(Rc::new(move || {
            if let Some(this) = weak_self.upgrade() {
                Node::notify(&*this);
            }
        }));
    }

    fn on_listened_to_became_false(&self) {
        (self.remove_upstream_listener.borrow_mut())();
    }

    fn invalidate(&self) {
        let mut state = self.state.borrow_mut();
        if state.validity == Validity::Invalid {
            return;
        }
        state.validity = Validity::Invalid;
        state.completion = None;
        drop(state);
        self.base.fanout();
    }
}

impl<T, E> Node for Subscription<T, E>
where
    T: 'static + SameValue + Clone,
    E: 'static + SameValue + Clone + Debug,
{
    fn latest_version(&self) -> Version {
        self.refresh()
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
