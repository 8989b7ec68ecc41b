//! Bridges from stores to components.
//!
//! - [`use_store`]: one store, re-render on change
//! - [`use_stores`]: a collection of stores, read as one combined value
//! - [`use_writable`]: one writable store plus a stable [`Setter`]

mod multi;
mod single;
mod write;

pub use multi::use_stores;
pub use single::use_store;
pub use write::{use_writable, SetAction, Setter};
