use crate::bridge::{use_store, use_stores, use_writable, Setter};
use crate::derived::StoreCollection;
use crate::runtime::{Component, Scope};
use crate::store::{Readable, Writable};

/// Renders `children` with the current value of one store.
pub struct StoreView<S, F> {
    store: S,
    children: F,
}

impl<S, F, O> StoreView<S, F>
where
    S: Readable,
    F: FnMut(S::Value) -> O + 'static,
{
    pub fn new(store: S, children: F) -> Self {
        Self { store, children }
    }

    /// Replace the store prop. Call through [`Mounted::update`] so the view
    /// re-renders.
    ///
    /// [`Mounted::update`]: crate::runtime::Mounted::update
    pub fn set_store(&mut self, store: S) {
        self.store = store;
    }

    pub fn store(&self) -> &S {
        &self.store
    }
}

impl<S, F, O> Component for StoreView<S, F>
where
    S: Readable,
    F: FnMut(S::Value) -> O + 'static,
    O: 'static,
{
    type Output = O;

    fn render(&mut self, scope: &mut Scope<'_>) -> O {
        let value = use_store(scope, &self.store);
        (self.children)(value)
    }
}

/// Renders `children` with a store's value and a setter for it.
pub struct WritableView<W, F> {
    store: W,
    children: F,
}

impl<W, F, O> WritableView<W, F>
where
    W: Writable,
    F: FnMut(W::Value, Setter<W::Value>) -> O + 'static,
{
    pub fn new(store: W, children: F) -> Self {
        Self { store, children }
    }

    pub fn set_store(&mut self, store: W) {
        self.store = store;
    }

    pub fn store(&self) -> &W {
        &self.store
    }
}

impl<W, F, O> Component for WritableView<W, F>
where
    W: Writable,
    F: FnMut(W::Value, Setter<W::Value>) -> O + 'static,
    O: 'static,
{
    type Output = O;

    fn render(&mut self, scope: &mut Scope<'_>) -> O {
        let (value, setter) = use_writable(scope, &self.store);
        (self.children)(value, setter)
    }
}

/// Renders `children` with the values of a collection of stores, in the
/// collection's shape.
pub struct StoresView<C, F> {
    stores: C,
    children: F,
}

impl<C, F, O> StoresView<C, F>
where
    C: StoreCollection,
    F: FnMut(C::Output) -> O + 'static,
{
    pub fn new(stores: C, children: F) -> Self {
        Self { stores, children }
    }

    pub fn set_stores(&mut self, stores: C) {
        self.stores = stores;
    }

    pub fn stores(&self) -> &C {
        &self.stores
    }
}

impl<C, F, O> Component for StoresView<C, F>
where
    C: StoreCollection,
    F: FnMut(C::Output) -> O + 'static,
    O: 'static,
{
    type Output = O;

    fn render(&mut self, scope: &mut Scope<'_>) -> O {
        let values = use_stores(scope, &self.stores);
        (self.children)(values)
    }
}
