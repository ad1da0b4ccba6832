//! Lifetime scopes for node tasks.
//!
//! A [`LifetimeContext`] bounds everything that belongs to one node instance:
//! its event loop, its in-flight dials, and any wait performed on its behalf.
//! Canceling a context cancels all of its children.

mod lifetime;

pub use lifetime::{Cancelled, LifetimeContext};
