use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use tracing::trace;

use super::collection::StoreCollection;
use crate::store::{Equality, Listeners, Readable, StoreId, Subscription};

struct DerivedInner<C: StoreCollection, U> {
    id: StoreId,
    inputs: C,
    combine: Box<dyn Fn(C::Output) -> U>,
    eq: Equality<U>,
    value: RefCell<Option<U>>,
    running: Cell<bool>,
    listeners: Listeners<U>,
    input_subscriptions: RefCell<Vec<Subscription>>,
}

impl<C: StoreCollection, U: Clone + 'static> DerivedInner<C, U> {
    fn compute(&self) -> U {
        (self.combine)(self.inputs.current())
    }

    fn start(self: &Rc<Self>) {
        let weak = Rc::downgrade(self);
        let on_change: Rc<dyn Fn()> = Rc::new(move || {
            if let Some(inner) = weak.upgrade() {
                inner.recompute();
            }
        });

        // Inputs are live from here on, so `compute` reads cached values.
        let subscriptions = self.inputs.watch(&on_change);
        trace!(store = %self.id, inputs = subscriptions.len(), "derived store started");
        *self.input_subscriptions.borrow_mut() = subscriptions;
        let value = self.compute();
        *self.value.borrow_mut() = Some(value);
        self.running.set(true);
    }

    fn stop(&self) {
        self.running.set(false);
        let subscriptions = std::mem::take(&mut *self.input_subscriptions.borrow_mut());
        trace!(store = %self.id, inputs = subscriptions.len(), "derived store stopped");
        drop(subscriptions);
    }

    fn recompute(&self) {
        let next = self.compute();
        let changed = match &*self.value.borrow() {
            Some(previous) => !(self.eq)(previous, &next),
            None => true,
        };
        if changed {
            *self.value.borrow_mut() = Some(next.clone());
            self.listeners.notify(next);
        }
    }

    fn current(&self) -> U {
        if self.running.get() {
            if let Some(value) = self.value.borrow().as_ref() {
                return value.clone();
            }
        }
        self.compute()
    }
}

/// A read-only store computed from a fixed collection of input stores.
///
/// Inputs are subscribed when the first listener arrives and released with
/// the last one. While running, the value is recomputed on every input
/// change and listeners hear about it only if the derived store's equality
/// reports a difference.
pub struct Derived<C: StoreCollection, U> {
    inner: Rc<DerivedInner<C, U>>,
}

impl<C: StoreCollection, U: Clone + 'static> Derived<C, U> {
    /// Derive with a custom equality comparator for the output.
    pub fn with_equality<F, E>(inputs: C, combine: F, eq: E) -> Self
    where
        F: Fn(C::Output) -> U + 'static,
        E: Fn(&U, &U) -> bool + 'static,
    {
        Self::from_parts(inputs, Box::new(combine), Rc::new(eq))
    }

    fn from_parts(inputs: C, combine: Box<dyn Fn(C::Output) -> U>, eq: Equality<U>) -> Self {
        Self {
            inner: Rc::new(DerivedInner {
                id: StoreId::next(),
                inputs,
                combine,
                eq,
                value: RefCell::new(None),
                running: Cell::new(false),
                listeners: Listeners::new(),
                input_subscriptions: RefCell::new(Vec::new()),
            }),
        }
    }

    pub fn id(&self) -> StoreId {
        self.inner.id
    }

    pub fn get(&self) -> U {
        self.inner.current()
    }

    pub fn inputs(&self) -> &C {
        &self.inner.inputs
    }

    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: FnMut(&U) + 'static,
    {
        if !self.inner.running.get() {
            self.inner.start();
        }

        let slot = self.inner.listeners.add(Box::new(listener));
        let current = self.inner.current();
        slot.deliver(&current);

        let inner = Rc::downgrade(&self.inner);
        Subscription::new(move || {
            let Some(inner) = inner.upgrade() else {
                return;
            };
            if inner.listeners.remove(&slot) && inner.listeners.is_empty() {
                inner.stop();
            }
        })
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.listeners.len()
    }
}

impl<C: StoreCollection, U> Clone for Derived<C, U> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<C: StoreCollection, U> fmt::Debug for Derived<C, U> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Derived")
            .field("id", &self.inner.id)
            .field("inputs", &self.inner.inputs.identity())
            .field("running", &self.inner.running.get())
            .finish()
    }
}

impl<C: StoreCollection, U: Clone + 'static> Readable for Derived<C, U> {
    type Value = U;

    fn id(&self) -> StoreId {
        self.inner.id
    }

    fn get(&self) -> U {
        self.inner.current()
    }

    fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: FnMut(&U) + 'static,
    {
        Derived::subscribe(self, listener)
    }

    fn same_value(&self, a: &U, b: &U) -> bool {
        (self.inner.eq)(a, b)
    }
}

/// Bundle a collection of stores into one store whose value is the
/// collection's values, in the same shape.
///
/// Elements are compared with their own store's equality, so the combined
/// store only notifies when some element really changed.
///
/// # Examples
///
/// ```
/// use tincan_bind::{combine, Store};
///
/// let a = Store::new(4);
/// let b = Store::new(2);
/// let both = combine(vec![a.clone(), b.clone()]);
/// assert_eq!(both.get(), vec![4, 2]);
///
/// a.set(10);
/// assert_eq!(both.get(), vec![10, 2]);
/// ```
pub fn combine<C: StoreCollection>(inputs: C) -> Derived<C, C::Output> {
    let policy = inputs.clone();
    Derived::from_parts(
        inputs,
        Box::new(|values: C::Output| values),
        Rc::new(move |a: &C::Output, b: &C::Output| policy.same_output(a, b)),
    )
}

/// Derive a store by applying `f` to the input values.
pub fn derive<C, U, F>(inputs: C, f: F) -> Derived<C, U>
where
    C: StoreCollection,
    U: Clone + PartialEq + 'static,
    F: Fn(C::Output) -> U + 'static,
{
    Derived::from_parts(inputs, Box::new(f), Rc::new(|a: &U, b: &U| a == b))
}
