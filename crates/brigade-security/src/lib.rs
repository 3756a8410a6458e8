//! Permission primitives for the Brigade kitchen simulator.
//!
//! Every agent carries a [`PermissionSet`]; a task only runs when the set
//! holds the [`Permission`] its handler requires.

/// Permission definitions.
pub mod permission;

pub use permission::{Permission, PermissionSet};
