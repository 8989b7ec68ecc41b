use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use tracing::trace;

use super::single::use_store;
use crate::runtime::{Hook, Scope};
use crate::store::{StoreId, Writable};

/// What a [`Setter`] call does: replace the value or compute it from the
/// previous one.
pub enum SetAction<T> {
    Replace(T),
    Update(Box<dyn FnOnce(&T) -> T>),
}

impl<T> SetAction<T> {
    pub fn update<F>(f: F) -> Self
    where
        F: FnOnce(&T) -> T + 'static,
    {
        Self::Update(Box::new(f))
    }
}

impl<T> From<T> for SetAction<T> {
    fn from(value: T) -> Self {
        Self::Replace(value)
    }
}

impl<T: fmt::Debug> fmt::Debug for SetAction<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Replace(value) => f.debug_tuple("Replace").field(value).finish(),
            Self::Update(_) => f.write_str("Update(..)"),
        }
    }
}

/// Write handle returned by [`use_writable`].
///
/// Clones share identity: [`ptr_eq`](Setter::ptr_eq) holds across renders for
/// as long as the component keeps passing the same store.
pub struct Setter<T> {
    store: StoreId,
    dispatch: Rc<dyn Fn(SetAction<T>)>,
}

impl<T: 'static> Setter<T> {
    pub(crate) fn new<W>(store: &W) -> Self
    where
        W: Writable<Value = T>,
    {
        let id = store.id();
        let store = store.clone();
        Self {
            store: id,
            dispatch: Rc::new(move |action: SetAction<T>| match action {
                SetAction::Replace(value) => {
                    trace!(store = %id, "setter replacing value");
                    store.set(value);
                }
                SetAction::Update(f) => {
                    trace!(store = %id, "setter updating value");
                    store.update(f);
                }
            }),
        }
    }

    /// Apply a replacement value or an updater.
    pub fn call(&self, action: impl Into<SetAction<T>>) {
        (self.dispatch)(action.into());
    }

    pub fn set(&self, value: T) {
        self.call(SetAction::Replace(value));
    }

    pub fn update<F>(&self, f: F)
    where
        F: FnOnce(&T) -> T + 'static,
    {
        self.call(SetAction::update(f));
    }

    pub fn store_id(&self) -> StoreId {
        self.store
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.dispatch, &other.dispatch)
    }
}

impl<T> Clone for Setter<T> {
    fn clone(&self) -> Self {
        Self {
            store: self.store,
            dispatch: Rc::clone(&self.dispatch),
        }
    }
}

impl<T> fmt::Debug for Setter<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Setter").field("store", &self.store).finish()
    }
}

struct SetterCell<T> {
    setter: RefCell<Option<Setter<T>>>,
}

impl<T: 'static> SetterCell<T> {
    fn new() -> Self {
        Self {
            setter: RefCell::new(None),
        }
    }

    fn setter_for<W>(&self, store: &W) -> Setter<T>
    where
        W: Writable<Value = T>,
    {
        let mut slot = self.setter.borrow_mut();
        if let Some(setter) = slot.as_ref().filter(|setter| setter.store == store.id()) {
            return setter.clone();
        }
        let setter = Setter::new(store);
        *slot = Some(setter.clone());
        setter
    }
}

impl<T: 'static> Hook for SetterCell<T> {}

/// [`use_store`] plus a setter that stays the same object while the store
/// does.
///
/// # Examples
///
/// ```
/// use tincan_bind::runtime::Host;
/// use tincan_bind::{use_writable, SetAction, Store};
///
/// let host = Host::default();
/// let count = Store::new(1);
/// let view = host.mount_fn({
///     let count = count.clone();
///     move |scope| use_writable(scope, &count)
/// });
///
/// let (_, setter) = view.last_output().unwrap();
/// setter.call(5);
/// setter.call(SetAction::update(|n| n * 2));
/// assert_eq!(count.get(), 10);
/// ```
pub fn use_writable<W: Writable>(
    scope: &mut Scope<'_>,
    store: &W,
) -> (W::Value, Setter<W::Value>) {
    let value = use_store(scope, store);
    let cell = scope.use_hook(SetterCell::<W::Value>::new);
    (value, cell.setter_for(store))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::{Host, HostConfig};
    use crate::store::{Readable, Store, Subscription};
    use std::cell::Cell;

    /// Records which write path each call took.
    #[derive(Clone)]
    struct Recording {
        store: Store<i32>,
        sets: Rc<Cell<usize>>,
        updates: Rc<Cell<usize>>,
    }

    impl Recording {
        fn new(initial: i32) -> Self {
            Self {
                store: Store::new(initial),
                sets: Rc::new(Cell::new(0)),
                updates: Rc::new(Cell::new(0)),
            }
        }
    }

    impl Readable for Recording {
        type Value = i32;

        fn id(&self) -> StoreId {
            self.store.id()
        }

        fn get(&self) -> i32 {
            self.store.get()
        }

        fn subscribe<F>(&self, listener: F) -> Subscription
        where
            F: FnMut(&i32) + 'static,
        {
            self.store.subscribe(listener)
        }

        fn same_value(&self, a: &i32, b: &i32) -> bool {
            a == b
        }
    }

    impl Writable for Recording {
        fn set(&self, value: i32) {
            self.sets.set(self.sets.get() + 1);
            self.store.set(value);
        }

        fn update<F>(&self, f: F)
        where
            F: FnOnce(&i32) -> i32,
        {
            self.updates.set(self.updates.get() + 1);
            self.store.update(f);
        }
    }

    #[test]
    fn values_route_to_set_and_functions_to_update() {
        let host = Host::default();
        let store = Recording::new(0);
        let view = host.mount_fn({
            let store = store.clone();
            move |scope| use_writable(scope, &store)
        });

        let (value, setter) = view.last_output().unwrap();
        assert_eq!(value, 0);

        setter.call(4);
        assert_eq!((store.sets.get(), store.updates.get()), (1, 0));

        setter.call(SetAction::update(|n| n + 1));
        assert_eq!((store.sets.get(), store.updates.get()), (1, 1));

        setter.set(9);
        setter.update(|n| n - 1);
        assert_eq!((store.sets.get(), store.updates.get()), (2, 2));

        host.flush().unwrap();
        assert_eq!(view.last_output().map(|(value, _)| value), Some(8));
    }

    #[test]
    fn setter_identity_is_stable_until_the_store_changes() {
        let host = Host::new(HostConfig::new().strict(true));
        let first = Store::new(1);
        let second = Store::new(2);
        let current = Rc::new(RefCell::new(first.clone()));

        let view = host.mount_fn({
            let current = current.clone();
            move |scope| {
                let store = current.borrow().clone();
                use_writable(scope, &store).1
            }
        });

        first.set(3);
        host.flush().unwrap();
        let setters = view.outputs();
        assert_eq!(setters.len(), 2);
        assert!(setters[0].ptr_eq(&setters[1]));

        *current.borrow_mut() = second.clone();
        view.update(|_| {}).unwrap();
        host.flush().unwrap();
        let latest = view.last_output().unwrap();
        assert!(!latest.ptr_eq(&setters[1]));
        assert_eq!(latest.store_id(), second.id());

        latest.set(20);
        assert_eq!(second.get(), 20);
        assert_eq!(first.get(), 3);
    }
}
