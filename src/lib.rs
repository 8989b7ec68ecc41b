//! # Tincan Bind
//!
//! Bind observable stores to components that re-render when those stores
//! change.
//!
//! ## Stores
//!
//! Single-threaded observable values:
//! - `Store<T>` - Writable store with an equality check on every write
//! - `ReadStore<T>` - Read-only store, optionally started lazily
//! - `Derived` - Store computed from a collection of stores (`combine`, `derive`)
//!
//! ## Bridges
//!
//! Hooks called from a component's render:
//! - `use_store` - Read one store and re-render on change
//! - `use_stores` - Read a list, array, map or tuple of stores at once
//! - `use_writable` - Read one store and get a stable `Setter` for it
//!
//! The `components` module wraps each bridge in a render-callback component,
//! and `runtime` holds the small host that mounts components and drives
//! re-renders.
//!
//! ```
//! use tincan_bind::runtime::{Host, HostConfig};
//! use tincan_bind::{use_stores, use_writable, Store};
//!
//! let host = Host::new(HostConfig::new().strict(true));
//! let a = Store::new(4);
//! let b = Store::new(2);
//!
//! let view = host.mount_fn({
//!     let (a, b) = (a.clone(), b.clone());
//!     move |scope| {
//!         let (value, set_a) = use_writable(scope, &a);
//!         let both = use_stores(scope, &vec![a.clone(), b.clone()]);
//!         (value, both, set_a)
//!     }
//! });
//!
//! let (_, _, set_a) = view.last_output().unwrap();
//! set_a.set(10);
//! host.flush().unwrap();
//!
//! let (value, both, _) = view.last_output().unwrap();
//! assert_eq!(value, 10);
//! assert_eq!(both, vec![10, 2]);
//! ```

pub mod bridge;
pub mod components;
pub mod derived;
pub mod runtime;
pub mod store;

// Re-export main types for convenience
pub use bridge::{use_store, use_stores, use_writable, SetAction, Setter};
pub use derived::{combine, derive, Derived};
pub use runtime::{Host, HostConfig};
pub use store::{ReadStore, Readable, Store, StoreId, Subscription, Writable};
