use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use crate::store::{Readable, StoreId, Subscription};

/// The `(key, StoreId)` pairs of a collection, in iteration order.
///
/// Sequences and tuples use their indices as keys, so one comparison covers
/// every shape: two identities are equal iff they have the same length and
/// the same key and store at every position.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CollectionIdentity<K> {
    entries: Vec<(K, StoreId)>,
}

impl<K> CollectionIdentity<K> {
    pub fn new(entries: Vec<(K, StoreId)>) -> Self {
        Self { entries }
    }

    pub fn entries(&self) -> &[(K, StoreId)] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// A fixed collection of stores that can feed a derived store.
///
/// `Output` keeps the shape of the input: a `Vec` of stores yields a `Vec` of
/// values, a `BTreeMap` yields a `BTreeMap`, a tuple yields a tuple.
pub trait StoreCollection: Clone + 'static {
    type Key: Clone + PartialEq + fmt::Debug + 'static;
    type Output: Clone + 'static;

    fn identity(&self) -> CollectionIdentity<Self::Key>;

    /// Current value of every store.
    fn current(&self) -> Self::Output;

    /// Element-wise comparison, each element by its own store's equality.
    fn same_output(&self, a: &Self::Output, b: &Self::Output) -> bool;

    /// Subscribe to every store. `on_change` runs for each change after the
    /// subscribe-time delivery.
    fn watch(&self, on_change: &Rc<dyn Fn()>) -> Vec<Subscription>;
}

fn watch_one<S: Readable>(store: &S, on_change: &Rc<dyn Fn()>) -> Subscription {
    let on_change = Rc::clone(on_change);
    let mut primed = false;
    store.subscribe(move |_| {
        if primed {
            on_change();
        } else {
            primed = true;
        }
    })
}

impl<S: Readable> StoreCollection for Vec<S> {
    type Key = usize;
    type Output = Vec<S::Value>;

    fn identity(&self) -> CollectionIdentity<usize> {
        CollectionIdentity::new(self.iter().map(Readable::id).enumerate().collect())
    }

    fn current(&self) -> Vec<S::Value> {
        self.iter().map(Readable::get).collect()
    }

    fn same_output(&self, a: &Vec<S::Value>, b: &Vec<S::Value>) -> bool {
        a.len() == b.len()
            && self
                .iter()
                .zip(a.iter().zip(b.iter()))
                .all(|(store, (a, b))| store.same_value(a, b))
    }

    fn watch(&self, on_change: &Rc<dyn Fn()>) -> Vec<Subscription> {
        self.iter().map(|store| watch_one(store, on_change)).collect()
    }
}

impl<S: Readable, const N: usize> StoreCollection for [S; N] {
    type Key = usize;
    type Output = [S::Value; N];

    fn identity(&self) -> CollectionIdentity<usize> {
        CollectionIdentity::new(self.iter().map(Readable::id).enumerate().collect())
    }

    fn current(&self) -> [S::Value; N] {
        std::array::from_fn(|i| self[i].get())
    }

    fn same_output(&self, a: &[S::Value; N], b: &[S::Value; N]) -> bool {
        self.iter()
            .zip(a.iter().zip(b.iter()))
            .all(|(store, (a, b))| store.same_value(a, b))
    }

    fn watch(&self, on_change: &Rc<dyn Fn()>) -> Vec<Subscription> {
        self.iter().map(|store| watch_one(store, on_change)).collect()
    }
}

impl<K, S> StoreCollection for BTreeMap<K, S>
where
    K: Ord + Clone + fmt::Debug + 'static,
    S: Readable,
{
    type Key = K;
    type Output = BTreeMap<K, S::Value>;

    fn identity(&self) -> CollectionIdentity<K> {
        CollectionIdentity::new(
            self.iter()
                .map(|(key, store)| (key.clone(), store.id()))
                .collect(),
        )
    }

    fn current(&self) -> BTreeMap<K, S::Value> {
        self.iter()
            .map(|(key, store)| (key.clone(), store.get()))
            .collect()
    }

    fn same_output(&self, a: &BTreeMap<K, S::Value>, b: &BTreeMap<K, S::Value>) -> bool {
        a.len() == b.len()
            && self.iter().all(|(key, store)| match (a.get(key), b.get(key)) {
                (Some(a), Some(b)) => store.same_value(a, b),
                (None, None) => true,
                _ => false,
            })
    }

    fn watch(&self, on_change: &Rc<dyn Fn()>) -> Vec<Subscription> {
        self.values()
            .map(|store| watch_one(store, on_change))
            .collect()
    }
}

macro_rules! tuple_collection {
    ($(($idx:tt, $S:ident)),+) => {
        impl<$($S: Readable),+> StoreCollection for ($($S,)+) {
            type Key = usize;
            type Output = ($($S::Value,)+);

            fn identity(&self) -> CollectionIdentity<usize> {
                CollectionIdentity::new(vec![$(($idx, self.$idx.id())),+])
            }

            fn current(&self) -> Self::Output {
                ($(self.$idx.get(),)+)
            }

            fn same_output(&self, a: &Self::Output, b: &Self::Output) -> bool {
                true $(&& self.$idx.same_value(&a.$idx, &b.$idx))+
            }

            fn watch(&self, on_change: &Rc<dyn Fn()>) -> Vec<Subscription> {
                vec![$(watch_one(&self.$idx, on_change)),+]
            }
        }
    };
}

tuple_collection!((0, A));
tuple_collection!((0, A), (1, B));
tuple_collection!((0, A), (1, B), (2, C));
tuple_collection!((0, A), (1, B), (2, C), (3, D));
tuple_collection!((0, A), (1, B), (2, C), (3, D), (4, E));
tuple_collection!((0, A), (1, B), (2, C), (3, D), (4, E), (5, F));
