//! Scene capability traits
//!
//! [`SceneHost`] is the seam between the runtime services and whatever owns
//! the actual scene: cloning templates, (re)parenting, activation toggling,
//! and transform queries. Implementations use interior mutability so a single
//! shared host can be called from any thread.

use std::sync::Weak;

use crate::foundation::math::{Quat, Transform, Vec3};
use crate::scene::NodeId;

/// Capability interface over the engine's scene/transform tree
///
/// All methods take `&self`; implementations are expected to guard their own
/// state. Methods on dead node ids are no-ops or return `None`/`false`.
pub trait SceneHost: Send + Sync {
    /// Create a new empty node at the scene root
    fn create_node(&self, name: &str) -> NodeId;

    /// Deep-clone the subtree rooted at `template`
    ///
    /// The clone is detached (no parent) and preserves names, local
    /// transforms, and per-node active flags. Returns `None` if the template
    /// is not alive.
    fn instantiate(&self, template: NodeId) -> Option<NodeId>;

    /// Destroy a node and its entire subtree
    ///
    /// Fires the registered [`DespawnHook`] once per destroyed node, after
    /// all internal locks are released. Returns false if the node was not
    /// alive.
    fn destroy_node(&self, node: NodeId) -> bool;

    /// Check whether a node id refers to a live node
    fn is_alive(&self, node: NodeId) -> bool;

    /// Get a node's name
    fn node_name(&self, node: NodeId) -> Option<String>;

    /// Rename a node
    fn set_node_name(&self, node: NodeId, name: &str);

    /// Get a node's parent
    fn parent(&self, node: NodeId) -> Option<NodeId>;

    /// Get a node's direct children
    fn children(&self, node: NodeId) -> Vec<NodeId>;

    /// Attach a node under a new parent (or detach with `None`)
    ///
    /// The node keeps its local transform, so its world transform changes
    /// with the graft. Returns false if the graft would create a cycle or if
    /// either node is dead.
    fn set_parent(&self, node: NodeId, parent: Option<NodeId>) -> bool;

    /// Get a node's own active flag (not inherited from ancestors)
    fn is_active(&self, node: NodeId) -> bool;

    /// Set a node's own active flag
    fn set_active(&self, node: NodeId, active: bool);

    /// Get a node's local transform
    fn local_transform(&self, node: NodeId) -> Option<Transform>;

    /// Set a node's local transform
    fn set_local_transform(&self, node: NodeId, transform: Transform);

    /// Get a node's world transform (parent chain composed)
    fn world_transform(&self, node: NodeId) -> Option<Transform>;

    /// Get a node's world position
    fn world_position(&self, node: NodeId) -> Option<Vec3>;

    /// Move a node so its world position matches `position`
    fn set_world_position(&self, node: NodeId, position: Vec3);

    /// Get a node's world rotation
    fn world_rotation(&self, node: NodeId) -> Option<Quat>;

    /// Rotate a node so its world rotation matches `rotation`
    fn set_world_rotation(&self, node: NodeId, rotation: Quat);

    /// Register the observer notified when nodes are destroyed
    ///
    /// Only one hook is held at a time; the host keeps a weak reference so
    /// the observer's lifetime is not extended by the scene.
    fn set_despawn_hook(&self, hook: Weak<dyn DespawnHook>);
}

/// Observer for node destruction
///
/// The pool registry registers itself here so a pooled instance can never
/// silently vanish from pool bookkeeping while the process runs normally.
pub trait DespawnHook: Send + Sync {
    /// Called once for every destroyed node, outside the scene's locks
    fn on_node_despawned(&self, node: NodeId);
}
