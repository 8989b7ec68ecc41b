//! Render-callback wrappers around the bridges, for callers that would rather
//! pass a store as a prop than call a hook.

mod views;

pub use views::{StoreView, StoresView, WritableView};
