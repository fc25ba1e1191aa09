//! # Frame2D
//!
//! Object pooling and 2D camera framing for scene-graph based games.
//!
//! ## Features
//!
//! - **Object Pooling**: Bounded, self-healing pools of scene subtrees with
//!   loan tracking and initial-state restoration
//! - **Pool Registry**: Process-wide directory routing acquire/release by
//!   template identity, with lazy pool creation
//! - **Camera Framing**: Deadzone-based target following with rotation
//!   tweening and pixel-perfect snapping
//! - **Scene Host Abstraction**: Bring your own scene graph behind the
//!   [`scene::SceneHost`] trait, or use the built-in [`scene::SceneTree`]
//!
//! ## Quick Start
//!
//! ```rust
//! use frame2d::prelude::*;
//! use std::sync::Arc;
//!
//! let scene = Arc::new(SceneTree::new());
//! let rocket = scene.create_node("rocket");
//!
//! let host: Arc<dyn SceneHost> = Arc::clone(&scene);
//! let registry = PoolRegistry::new(host, PoolDefaults::default());
//!
//! // Lazily creates a pool for the template, then loans out an instance.
//! if let Some(loan) = registry.acquire(rocket, Vec3::new(4.0, 2.0, 0.0), true) {
//!     // ... fly the rocket ...
//!     loan.return_to_pool(&registry);
//! }
//!
//! registry.begin_shutdown();
//! ```

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions, clippy::similar_names, clippy::too_many_arguments)]

pub mod camera;
pub mod config;
pub mod foundation;
pub mod pooling;
pub mod scene;

/// Common imports for crate users
pub mod prelude {
    pub use crate::{
        camera::{CameraFramingConfig, CameraFramingController, CameraLens, RotationReference},
        config::{Config, ConfigError, RuntimeConfig},
        foundation::{
            math::{Quat, Transform, Vec2, Vec3},
            time::FrameTimer,
        },
        pooling::{Pool, PoolConfig, PoolDefaults, PoolRegistry, PooledInstance},
        scene::{NodeId, SceneHost, SceneTree},
    };
}
