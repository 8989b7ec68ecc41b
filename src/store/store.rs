use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tracing::trace;

use super::listeners::{Listeners, Subscription};

static NEXT_STORE_ID: AtomicUsize = AtomicUsize::new(0);

/// Identity of a store instance.
///
/// Every constructor allocates a fresh id; clones of a store share it. Bridges
/// compare ids, never values, to decide whether to resubscribe.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct StoreId(usize);

impl StoreId {
    /// Generate the next unique store id.
    pub(crate) fn next() -> Self {
        Self(NEXT_STORE_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for StoreId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "store#{}", self.0)
    }
}

pub(crate) type Equality<T> = Rc<dyn Fn(&T, &T) -> bool>;

/// Cleanup returned by a lazy store's start function.
pub type Stop = Box<dyn FnOnce()>;

type Start<T> = Box<dyn FnMut(&Store<T>) -> Option<Stop>>;

/// Read side of the store contract.
pub trait Readable: Clone + 'static {
    type Value: Clone + 'static;

    /// Identity shared by all clones of this store.
    fn id(&self) -> StoreId;

    /// Current value.
    fn get(&self) -> Self::Value;

    /// Register a listener.
    ///
    /// The listener runs synchronously with the current value before this
    /// returns, then once for every change the store's equality accepts.
    fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: FnMut(&Self::Value) + 'static;

    /// The store's own equality policy.
    fn same_value(&self, a: &Self::Value, b: &Self::Value) -> bool;
}

/// Write side of the store contract.
pub trait Writable: Readable {
    fn set(&self, value: Self::Value);

    fn update<F>(&self, f: F)
    where
        F: FnOnce(&Self::Value) -> Self::Value;
}

struct StoreInner<T> {
    id: StoreId,
    value: RefCell<T>,
    eq: Equality<T>,
    listeners: Listeners<T>,
    start: RefCell<Option<Start<T>>>,
    stop: RefCell<Option<Stop>>,
}

/// A single-threaded observable value with `set`/`update` semantics.
///
/// Writes that the store's equality considers unchanged are dropped without
/// notifying anyone.
///
/// # Examples
///
/// ```
/// use tincan_bind::Store;
/// use std::cell::RefCell;
/// use std::rc::Rc;
///
/// let store = Store::new(0);
/// let seen = Rc::new(RefCell::new(Vec::new()));
/// let seen_clone = seen.clone();
///
/// let sub = store.subscribe(move |v| seen_clone.borrow_mut().push(*v));
/// store.set(1);
/// store.set(1);
/// store.update(|n| n + 1);
/// sub.unsubscribe();
/// store.set(5);
///
/// assert_eq!(*seen.borrow(), vec![0, 1, 2]);
/// ```
pub struct Store<T> {
    inner: Rc<StoreInner<T>>,
}

impl<T: Clone + PartialEq + 'static> Store<T> {
    /// Create a new store compared with `PartialEq`.
    pub fn new(initial: T) -> Self {
        Self::from_parts(initial, Rc::new(|a: &T, b: &T| a == b), None)
    }

    /// Create a lazily started store.
    ///
    /// `start` runs when the first listener subscribes and may return a
    /// [`Stop`] that runs when the last listener releases.
    pub fn with_start<F>(initial: T, start: F) -> Self
    where
        F: FnMut(&Store<T>) -> Option<Stop> + 'static,
    {
        Self::from_parts(
            initial,
            Rc::new(|a: &T, b: &T| a == b),
            Some(Box::new(start)),
        )
    }
}

impl<T: Clone + 'static> Store<T> {
    /// Create a new store with a custom equality comparator.
    pub fn with_equality<E>(initial: T, eq: E) -> Self
    where
        E: Fn(&T, &T) -> bool + 'static,
    {
        Self::from_parts(initial, Rc::new(eq), None)
    }

    fn from_parts(initial: T, eq: Equality<T>, start: Option<Start<T>>) -> Self {
        Self {
            inner: Rc::new(StoreInner {
                id: StoreId::next(),
                value: RefCell::new(initial),
                eq,
                listeners: Listeners::new(),
                start: RefCell::new(start),
                stop: RefCell::new(None),
            }),
        }
    }

    pub fn id(&self) -> StoreId {
        self.inner.id
    }

    /// Get a clone of the current value.
    ///
    /// A lazy store with no listeners is started and stopped around the read.
    pub fn get(&self) -> T {
        if self.is_lazy() && self.inner.listeners.is_empty() {
            let probe = self.subscribe(|_| {});
            let value = self.inner.value.borrow().clone();
            probe.unsubscribe();
            return value;
        }
        self.inner.value.borrow().clone()
    }

    /// Read the value without cloning. `f` must not write to this store.
    pub fn with<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&T) -> R,
    {
        let value = self.inner.value.borrow();
        f(&*value)
    }

    /// Set a new value, notifying listeners if it differs from the old one.
    pub fn set(&self, value: T) {
        let unchanged = {
            let current = self.inner.value.borrow();
            (self.inner.eq)(&*current, &value)
        };
        if unchanged {
            return;
        }
        *self.inner.value.borrow_mut() = value.clone();
        trace!(
            store = %self.inner.id,
            listeners = self.inner.listeners.len(),
            "store value changed"
        );
        self.inner.listeners.notify(value);
    }

    /// Compute the next value from the current one.
    pub fn update<F>(&self, f: F)
    where
        F: FnOnce(&T) -> T,
    {
        let current = self.inner.value.borrow().clone();
        self.set(f(&current));
    }

    /// Subscribe to value changes.
    ///
    /// The listener is called immediately with the current value.
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: FnMut(&T) + 'static,
    {
        if self.inner.listeners.is_empty() {
            self.start();
        }

        let slot = self.inner.listeners.add(Box::new(listener));
        let current = self.inner.value.borrow().clone();
        slot.deliver(&current);
        trace!(store = %self.inner.id, listeners = self.inner.listeners.len(), "subscribed");

        let inner = Rc::downgrade(&self.inner);
        Subscription::new(move || {
            let Some(inner) = inner.upgrade() else {
                return;
            };
            if inner.listeners.remove(&slot) {
                trace!(store = %inner.id, listeners = inner.listeners.len(), "unsubscribed");
                if inner.listeners.is_empty() {
                    let stop = inner.stop.borrow_mut().take();
                    if let Some(stop) = stop {
                        stop();
                    }
                }
            }
        })
    }

    /// Number of live listeners.
    pub fn subscriber_count(&self) -> usize {
        self.inner.listeners.len()
    }

    /// Read-only view sharing this store's identity.
    pub fn readonly(&self) -> ReadStore<T> {
        ReadStore {
            store: self.clone(),
        }
    }

    fn is_lazy(&self) -> bool {
        self.inner.start.borrow().is_some()
    }

    fn start(&self) {
        // Taken out while running so `start` may freely read and write.
        let start = self.inner.start.borrow_mut().take();
        if let Some(mut start) = start {
            let stop = start(self);
            *self.inner.start.borrow_mut() = Some(start);
            *self.inner.stop.borrow_mut() = stop;
        }
    }
}

impl<T> Clone for Store<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Store<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Store")
            .field("id", &self.inner.id)
            .field("value", &self.inner.value.borrow())
            .finish()
    }
}

impl<T: Clone + 'static> Readable for Store<T> {
    type Value = T;

    fn id(&self) -> StoreId {
        Store::id(self)
    }

    fn get(&self) -> T {
        Store::get(self)
    }

    fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: FnMut(&T) + 'static,
    {
        Store::subscribe(self, listener)
    }

    fn same_value(&self, a: &T, b: &T) -> bool {
        (self.inner.eq)(a, b)
    }
}

impl<T: Clone + 'static> Writable for Store<T> {
    fn set(&self, value: T) {
        Store::set(self, value)
    }

    fn update<F>(&self, f: F)
    where
        F: FnOnce(&T) -> T,
    {
        Store::update(self, f)
    }
}

/// Read-only store handle.
pub struct ReadStore<T> {
    store: Store<T>,
}

impl<T: Clone + PartialEq + 'static> ReadStore<T> {
    /// A store that never changes.
    pub fn new(value: T) -> Self {
        Store::new(value).readonly()
    }

    /// A lazily started store whose only writer is `start`.
    pub fn lazy<F>(initial: T, start: F) -> Self
    where
        F: FnMut(&Store<T>) -> Option<Stop> + 'static,
    {
        Store::with_start(initial, start).readonly()
    }
}

impl<T: Clone + 'static> ReadStore<T> {
    pub fn id(&self) -> StoreId {
        self.store.id()
    }

    pub fn get(&self) -> T {
        self.store.get()
    }

    pub fn with<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&T) -> R,
    {
        self.store.with(f)
    }

    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: FnMut(&T) + 'static,
    {
        self.store.subscribe(listener)
    }

    pub fn subscriber_count(&self) -> usize {
        self.store.subscriber_count()
    }
}

impl<T> Clone for ReadStore<T> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for ReadStore<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ReadStore").field(&self.store).finish()
    }
}

impl<T: Clone + 'static> Readable for ReadStore<T> {
    type Value = T;

    fn id(&self) -> StoreId {
        self.store.id()
    }

    fn get(&self) -> T {
        self.store.get()
    }

    fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: FnMut(&T) + 'static,
    {
        self.store.subscribe(listener)
    }

    fn same_value(&self, a: &T, b: &T) -> bool {
        Readable::same_value(&self.store, a, b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[derive(Clone, Debug, PartialEq)]
    struct AppState {
        count: usize,
        name: String,
    }

    #[test]
    fn store_get_set() {
        let store = Store::new(AppState {
            count: 0,
            name: "test".to_string(),
        });

        assert_eq!(store.get().count, 0);

        store.set(AppState {
            count: 42,
            name: "updated".to_string(),
        });

        assert_eq!(store.get().count, 42);
        assert_eq!(store.get().name, "updated");
    }

    #[test]
    fn store_update() {
        let store = Store::new(AppState {
            count: 0,
            name: "test".to_string(),
        });

        store.update(|state| AppState {
            count: state.count + 10,
            ..state.clone()
        });

        assert_eq!(store.get().count, 10);
    }

    #[test]
    fn store_subscribe() {
        let store = Store::new(AppState {
            count: 0,
            name: "test".to_string(),
        });

        let call_count = Rc::new(Cell::new(0));
        let call_count_clone = call_count.clone();

        let _sub = store.subscribe(move |_state| {
            call_count_clone.set(call_count_clone.get() + 1);
        });

        // Initial delivery
        assert_eq!(call_count.get(), 1);

        store.update(|state| AppState {
            count: state.count + 1,
            ..state.clone()
        });
        assert_eq!(call_count.get(), 2);

        store.set(store.get());
        assert_eq!(call_count.get(), 2);
    }

    #[test]
    fn custom_equality_suppresses_notifications() {
        // Only the sign matters.
        let store = Store::with_equality(1i32, |a, b| a.signum() == b.signum());
        let seen = Rc::new(RefCell::new(Vec::new()));
        let seen_clone = seen.clone();
        let _sub = store.subscribe(move |v| seen_clone.borrow_mut().push(*v));

        store.set(5);
        store.set(-3);
        store.set(-8);
        store.set(0);

        assert_eq!(*seen.borrow(), vec![1, -3, 0]);
        assert_eq!(store.get(), 0);
    }

    #[test]
    fn lazy_store_starts_and_stops_with_listeners() {
        let starts = Rc::new(Cell::new(0));
        let stops = Rc::new(Cell::new(0));
        let (starts_c, stops_c) = (starts.clone(), stops.clone());

        let store = ReadStore::lazy(0, move |store| {
            starts_c.set(starts_c.get() + 1);
            store.set(7);
            let stops = stops_c.clone();
            Some(Box::new(move || stops.set(stops.get() + 1)) as Stop)
        });

        let a = store.subscribe(|_| {});
        let b = store.subscribe(|_| {});
        assert_eq!(starts.get(), 1);
        assert_eq!(store.get(), 7);

        a.unsubscribe();
        assert_eq!(stops.get(), 0);
        b.unsubscribe();
        assert_eq!(stops.get(), 1);
        assert_eq!(store.subscriber_count(), 0);
    }

    #[test]
    fn lazy_get_without_listeners_runs_start() {
        let starts = Rc::new(Cell::new(0));
        let starts_c = starts.clone();
        let store = ReadStore::lazy(0, move |store| {
            starts_c.set(starts_c.get() + 1);
            store.set(3);
            None
        });

        assert_eq!(store.get(), 3);
        assert_eq!(starts.get(), 1);
        assert_eq!(store.subscriber_count(), 0);
    }

    #[test]
    fn readonly_shares_identity() {
        let store = Store::new(1);
        let view = store.readonly();
        assert_eq!(view.id(), store.id());
        assert_ne!(Store::new(1).id(), store.id());

        store.set(2);
        assert_eq!(view.get(), 2);
    }

    #[test]
    fn listener_set_during_delivery_keeps_order() {
        let store = Store::new(0);
        let writer = store.clone();
        let _bump = store.subscribe(move |v| {
            if *v == 1 {
                writer.set(2);
            }
        });
        let seen = Rc::new(RefCell::new(Vec::new()));
        let seen_clone = seen.clone();
        let _watch = store.subscribe(move |v| seen_clone.borrow_mut().push(*v));

        store.set(1);
        assert_eq!(*seen.borrow(), vec![0, 1, 2]);
    }

    #[test]
    fn subscribe_during_delivery_sees_each_value_once() {
        let store = Store::new(0);
        let late_seen = Rc::new(RefCell::new(Vec::new()));
        let late_subscription = Rc::new(RefCell::new(None));

        let writer = store.clone();
        let seen = late_seen.clone();
        let holder = late_subscription.clone();
        let _first = store.subscribe(move |v| {
            if *v == 1 {
                writer.set(2);
                let seen = seen.clone();
                let sub = writer.subscribe(move |v| seen.borrow_mut().push(*v));
                *holder.borrow_mut() = Some(sub);
            }
        });

        store.set(1);
        assert_eq!(*late_seen.borrow(), vec![2]);

        store.set(3);
        assert_eq!(*late_seen.borrow(), vec![2, 3]);
        assert_eq!(store.subscriber_count(), 2);
    }
}
