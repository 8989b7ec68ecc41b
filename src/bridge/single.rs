use std::cell::{Cell, RefCell};
use std::rc::Rc;

use tracing::{debug, trace, warn};

use crate::runtime::{Hook, Invalidator, Scope};
use crate::store::{Readable, StoreId, Subscription};

struct Binding<S> {
    store: S,
    /// `None` while the instance is detached.
    subscription: Option<Subscription>,
}

/// Per-instance subscription state behind [`use_store`].
pub(crate) struct SubscriptionContext<S: Readable> {
    binding: RefCell<Option<Binding<S>>>,
    latest: Rc<RefCell<Option<S::Value>>>,
    invalidator: Invalidator,
    churn_warning: Option<usize>,
    churn: Cell<usize>,
    last_pass: Cell<Option<u64>>,
}

impl<S: Readable> SubscriptionContext<S> {
    pub(crate) fn new(invalidator: Invalidator, churn_warning: Option<usize>) -> Self {
        Self {
            binding: RefCell::new(None),
            latest: Rc::new(RefCell::new(None)),
            invalidator,
            churn_warning,
            churn: Cell::new(0),
            last_pass: Cell::new(None),
        }
    }

    /// Value for the render in progress, rebinding first if `store` is not
    /// the bound store.
    pub(crate) fn read(&self, store: &S, pass: u64) -> S::Value {
        let bound = self.binding.borrow().as_ref().map(|binding| binding.store.id());
        match bound {
            Some(id) if id == store.id() => self.track_churn(pass, false, id),
            Some(_) => {
                self.track_churn(pass, true, store.id());
                self.on_store_identity_change(store);
            }
            None => self.on_store_identity_change(store),
        }
        let latest = self.latest.borrow().clone();
        latest.unwrap_or_else(|| store.get())
    }

    /// Release the old subscription, then subscribe to `store`.
    pub(crate) fn on_store_identity_change(&self, store: &S) {
        let previous = self.binding.borrow_mut().take();
        if let Some(previous) = previous {
            debug!(from = %previous.store.id(), to = %store.id(), "store identity changed");
            if let Some(subscription) = previous.subscription {
                subscription.unsubscribe();
            }
        }

        self.latest.borrow_mut().take();
        let subscription = self.subscribe(store);
        *self.binding.borrow_mut() = Some(Binding {
            store: store.clone(),
            subscription: Some(subscription),
        });
    }

    fn subscribe(&self, store: &S) -> Subscription {
        let latest = Rc::clone(&self.latest);
        let invalidator = self.invalidator.clone();
        let id = store.id();
        let mut primed = false;

        let subscription = store.subscribe(move |value: &S::Value| {
            *latest.borrow_mut() = Some(value.clone());
            // The subscribe-time delivery is the value being rendered.
            if primed {
                trace!(store = %id, "store changed");
                invalidator.invalidate();
            } else {
                primed = true;
            }
        });
        trace!(store = %id, "bridge subscribed");
        subscription
    }

    fn track_churn(&self, pass: u64, changed: bool, store: StoreId) {
        if self.last_pass.replace(Some(pass)) == Some(pass) {
            return;
        }
        if !changed {
            self.churn.set(0);
            return;
        }
        let streak = self.churn.get() + 1;
        self.churn.set(streak);
        if self.churn_warning == Some(streak) {
            warn!(
                %store,
                renders = streak,
                "a new store was passed on every render; each one costs a full unsubscribe and resubscribe"
            );
        }
    }

    #[cfg(test)]
    fn is_subscribed(&self) -> bool {
        self.binding
            .borrow()
            .as_ref()
            .is_some_and(|binding| binding.subscription.is_some())
    }
}

impl<S: Readable> Hook for SubscriptionContext<S> {
    /// Resubscribe after a detach and re-render if the value moved meanwhile.
    fn on_attach(&self) {
        let store = match &*self.binding.borrow() {
            Some(binding) if binding.subscription.is_none() => binding.store.clone(),
            _ => return,
        };

        let rendered = self.latest.borrow().clone();
        let subscription = self.subscribe(&store);
        if let Some(binding) = self.binding.borrow_mut().as_mut() {
            binding.subscription = Some(subscription);
        }

        let current = self.latest.borrow().clone();
        if let (Some(rendered), Some(current)) = (rendered, current) {
            if !store.same_value(&rendered, &current) {
                debug!(store = %store.id(), "store changed while detached");
                self.invalidator.invalidate();
            }
        }
    }

    fn on_detach(&self) {
        let subscription = self
            .binding
            .borrow_mut()
            .as_mut()
            .and_then(|binding| binding.subscription.take());
        if let Some(subscription) = subscription {
            subscription.unsubscribe();
            trace!("bridge released subscription");
        }
    }
}

/// Read a store and re-render the calling component whenever it changes.
///
/// The first call subscribes; the value delivered during subscription is the
/// one returned and does not cause another render. Each later change the
/// store's equality accepts invalidates the component once. Passing a store
/// with a different [`StoreId`] releases the old subscription before the new
/// one is made, and unmounting releases the last one.
///
/// Creating a new store on every render works but resubscribes every time;
/// hold the store somewhere stable instead. [`HostConfig::store_churn_warning`]
/// turns on a warning for this.
///
/// [`HostConfig::store_churn_warning`]: crate::runtime::HostConfig::store_churn_warning
///
/// # Examples
///
/// ```
/// use tincan_bind::runtime::Host;
/// use tincan_bind::{use_store, Store};
///
/// let host = Host::default();
/// let count = Store::new(0);
/// let view = host.mount_fn({
///     let count = count.clone();
///     move |scope| format!("count: {}", use_store(scope, &count))
/// });
///
/// count.update(|n| n + 1);
/// host.flush().unwrap();
/// assert_eq!(view.last_output().as_deref(), Some("count: 1"));
/// ```
pub fn use_store<S: Readable>(scope: &mut Scope<'_>, store: &S) -> S::Value {
    let invalidator = scope.invalidator();
    let churn_warning = scope.config().churn_warning();
    let pass = scope.render_pass();
    let context = scope.use_hook(move || SubscriptionContext::<S>::new(invalidator, churn_warning));
    context.read(store, pass)
}
