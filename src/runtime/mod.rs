//! A minimal single-threaded component host.
//!
//! The host owns component instances, keeps their hooks alive between
//! renders, maps instance lifecycles onto [`Hook::on_attach`] and
//! [`Hook::on_detach`], and re-renders instances whose [`Invalidator`] fired
//! when [`Host::flush`] runs.

mod config;
mod error;
mod host;
mod scheduler;
mod scope;

pub use config::HostConfig;
pub use error::HostError;
pub use host::{Component, Host, Mounted, RenderFn};
pub use scheduler::{ComponentId, Invalidator};
pub use scope::{Hook, Scope};
