use std::cell::RefCell;

use tracing::debug;

use super::single::use_store;
use crate::derived::{combine, CollectionIdentity, Derived, StoreCollection};
use crate::runtime::{Hook, Scope};

type Combined<C> = Derived<C, <C as StoreCollection>::Output>;

/// Holds the derived store built for the last collection of stores seen.
struct CollectionCell<C: StoreCollection> {
    current: RefCell<Option<(CollectionIdentity<C::Key>, Combined<C>)>>,
}

impl<C: StoreCollection> CollectionCell<C> {
    fn new() -> Self {
        Self {
            current: RefCell::new(None),
        }
    }

    /// The cached derived store if `stores` has the same identity as last
    /// time, otherwise a fresh one.
    fn derived_for(&self, stores: &C) -> Combined<C> {
        let identity = stores.identity();
        let mut current = self.current.borrow_mut();
        if let Some((_, derived)) = current.as_ref().filter(|(seen, _)| *seen == identity) {
            return derived.clone();
        }

        let derived = combine(stores.clone());
        debug!(
            stores = identity.len(),
            derived = %derived.id(),
            "store collection changed; rebuilt combined store"
        );
        *current = Some((identity, derived.clone()));
        derived
    }
}

impl<C: StoreCollection> Hook for CollectionCell<C> {}

/// Read several stores at once and re-render when any of them changes.
///
/// The stores are combined into one derived store whose value has the same
/// shape as `stores`. The derived store is rebuilt only when the collection's
/// identity changes, meaning a different store at some key, a new key or a
/// different length; passing an equal collection built anew on each render is
/// free.
///
/// # Examples
///
/// ```
/// use tincan_bind::runtime::Host;
/// use tincan_bind::{use_stores, Store};
///
/// let host = Host::default();
/// let width = Store::new(4);
/// let height = Store::new(2);
/// let view = host.mount_fn({
///     let (width, height) = (width.clone(), height.clone());
///     move |scope| {
///         let (w, h) = use_stores(scope, &(width.clone(), height.clone()));
///         w * h
///     }
/// });
///
/// width.set(10);
/// host.flush().unwrap();
/// assert_eq!(view.outputs(), vec![8, 20]);
/// ```
pub fn use_stores<C: StoreCollection>(scope: &mut Scope<'_>, stores: &C) -> C::Output {
    let cell = scope.use_hook(CollectionCell::<C>::new);
    let derived = cell.derived_for(stores);
    use_store(scope, &derived)
}
