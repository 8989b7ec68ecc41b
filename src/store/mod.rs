//! The store contract and its reference implementation.
//!
//! Stores are single-threaded observable values. A listener receives the
//! current value synchronously when it subscribes, then every change that
//! fails the store's equality check, in the order the writes happened.

mod listeners;
mod store;

pub(crate) use listeners::Listeners;
pub(crate) use store::Equality;

pub use listeners::Subscription;
pub use store::{ReadStore, Readable, Stop, Store, StoreId, Writable};
