//! Scene collaborator - transform tree, activation, and template cloning
//!
//! The pooling and camera subsystems never talk to a renderer or a scene
//! graph directly; they go through the [`SceneHost`] capability trait. The
//! in-crate implementation is [`SceneTree`], a slotmap-backed transform tree
//! suitable for headless use and for embedding under a real engine.

pub mod host;
pub mod tree;

pub use host::{DespawnHook, SceneHost};
pub use tree::{NodeId, SceneTree};
