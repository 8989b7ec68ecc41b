//! Stores derived from a fixed collection of input stores.
//!
//! [`combine`] bundles the inputs' values without transforming them and is
//! what the multi-store bridge builds on. [`derive`] applies a combining
//! function.

mod collection;
mod derived;

pub use collection::{CollectionIdentity, StoreCollection};
pub use derived::{combine, derive, Derived};
