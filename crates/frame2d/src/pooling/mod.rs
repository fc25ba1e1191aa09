//! Object pooling - amortized spawn/despawn for template-cloned instances
//!
//! Three pieces cooperate here:
//! - [`Pool`]: a bounded collection of interchangeable clones of one
//!   template, tracking which are free and which are on loan.
//! - [`PoolRegistry`]: a process-scoped directory routing acquire/release
//!   calls by template identity, creating pools lazily.
//! - [`PoolableHandle`]: per-instance bookkeeping (initial-state snapshot of
//!   the whole attachment subtree plus the current loan id), owned by the
//!   pool's side table.
//!
//! Clients receive a [`PooledInstance`] loan token from `acquire` and hand it
//! back through [`PooledInstance::return_to_pool`].

pub mod handle;
pub mod pool;
pub mod registry;

#[cfg(test)]
mod tests;

pub use handle::{PoolableHandle, PooledInstance};
pub use pool::{Pool, PoolConfig};
pub use registry::{PoolDefaults, PoolRegistry};
