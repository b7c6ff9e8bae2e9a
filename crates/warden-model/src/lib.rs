//! Serializable data shared by the warden crates.
//!
//! Nothing here owns behaviour: the scheduler, runner and coordinator live in `warden-core`
//! and publish their state through these types.
mod domain;
pub use domain::*;
