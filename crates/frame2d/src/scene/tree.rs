//! Slotmap-backed transform tree
//!
//! [`SceneTree`] is the reference [`SceneHost`] implementation: a flat
//! slotmap of nodes with parent/children links and local TRS transforms.
//! World transforms are composed on demand from the parent chain. A single
//! `RwLock` guards the node storage; despawn notifications are dispatched
//! after the lock is released so observers may re-enter the tree.

use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard, Weak};

use log::warn;
use slotmap::{new_key_type, SlotMap};

use crate::foundation::math::{Quat, Transform, Vec3};
use crate::scene::host::{DespawnHook, SceneHost};

new_key_type! {
    /// Stable, opaque identity of a scene node
    ///
    /// Ids are never reused for a different node within the same generation,
    /// so a stale id held across a destroy simply stops resolving.
    pub struct NodeId;
}

/// One node of the transform tree
#[derive(Debug, Clone)]
struct Node {
    name: String,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    local: Transform,
    active: bool,
}

impl Node {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_owned(),
            parent: None,
            children: Vec::new(),
            local: Transform::identity(),
            active: true,
        }
    }
}

/// Shared transform tree implementing [`SceneHost`]
pub struct SceneTree {
    nodes: RwLock<SlotMap<NodeId, Node>>,
    despawn_hook: RwLock<Option<Weak<dyn DespawnHook>>>,
}

impl Default for SceneTree {
    fn default() -> Self {
        Self::new()
    }
}

impl SceneTree {
    /// Create an empty scene tree
    pub fn new() -> Self {
        Self {
            nodes: RwLock::new(SlotMap::with_key()),
            despawn_hook: RwLock::new(None),
        }
    }

    /// Get the number of live nodes
    pub fn len(&self) -> usize {
        self.read().len()
    }

    /// Check whether the tree has no nodes
    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    fn read(&self) -> RwLockReadGuard<'_, SlotMap<NodeId, Node>> {
        self.nodes.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, SlotMap<NodeId, Node>> {
        self.nodes.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Compose the world transform of `node` from its parent chain
    fn world_transform_of(nodes: &SlotMap<NodeId, Node>, node: NodeId) -> Option<Transform> {
        let mut chain = Vec::new();
        let mut current = Some(node);
        while let Some(id) = current {
            let entry = nodes.get(id)?;
            chain.push(id);
            current = entry.parent;
        }

        let mut world = Transform::identity();
        for id in chain.iter().rev() {
            world = world.combine(&nodes[*id].local);
        }
        Some(world)
    }

    /// Check whether `ancestor` appears on `node`'s parent chain
    fn is_ancestor(nodes: &SlotMap<NodeId, Node>, ancestor: NodeId, node: NodeId) -> bool {
        let mut current = nodes.get(node).and_then(|n| n.parent);
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            current = nodes.get(id).and_then(|n| n.parent);
        }
        false
    }

    fn detach_from_parent(nodes: &mut SlotMap<NodeId, Node>, node: NodeId) {
        if let Some(parent) = nodes.get(node).and_then(|n| n.parent) {
            if let Some(parent_node) = nodes.get_mut(parent) {
                parent_node.children.retain(|&c| c != node);
            }
        }
        if let Some(entry) = nodes.get_mut(node) {
            entry.parent = None;
        }
    }

    fn notify_despawned(&self, despawned: &[NodeId]) {
        let hook = {
            let guard = self
                .despawn_hook
                .read()
                .unwrap_or_else(PoisonError::into_inner);
            guard.as_ref().and_then(Weak::upgrade)
        };
        if let Some(hook) = hook {
            for &node in despawned {
                hook.on_node_despawned(node);
            }
        }
    }
}

impl SceneHost for SceneTree {
    fn create_node(&self, name: &str) -> NodeId {
        self.write().insert(Node::new(name))
    }

    fn instantiate(&self, template: NodeId) -> Option<NodeId> {
        let mut nodes = self.write();
        if !nodes.contains_key(template) {
            return None;
        }

        // Iterative subtree copy: (source node, parent of its clone).
        let mut clone_root = None;
        let mut pending = vec![(template, None::<NodeId>)];
        while let Some((source, clone_parent)) = pending.pop() {
            let mut copy = nodes[source].clone();
            copy.parent = clone_parent;
            copy.children = Vec::new();
            let clone = nodes.insert(copy);

            if let Some(parent) = clone_parent {
                nodes[parent].children.push(clone);
            } else {
                clone_root = Some(clone);
            }

            // Reverse push keeps the clone's child order matching the source.
            let children = nodes[source].children.clone();
            for &child in children.iter().rev() {
                pending.push((child, Some(clone)));
            }
        }
        clone_root
    }

    fn destroy_node(&self, node: NodeId) -> bool {
        let despawned = {
            let mut nodes = self.write();
            if !nodes.contains_key(node) {
                return false;
            }
            Self::detach_from_parent(&mut nodes, node);

            let mut removed = Vec::new();
            let mut pending = vec![node];
            while let Some(id) = pending.pop() {
                if let Some(entry) = nodes.remove(id) {
                    pending.extend(entry.children);
                    removed.push(id);
                }
            }
            removed
        };

        self.notify_despawned(&despawned);
        true
    }

    fn is_alive(&self, node: NodeId) -> bool {
        self.read().contains_key(node)
    }

    fn node_name(&self, node: NodeId) -> Option<String> {
        self.read().get(node).map(|n| n.name.clone())
    }

    fn set_node_name(&self, node: NodeId, name: &str) {
        if let Some(entry) = self.write().get_mut(node) {
            entry.name = name.to_owned();
        }
    }

    fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.read().get(node).and_then(|n| n.parent)
    }

    fn children(&self, node: NodeId) -> Vec<NodeId> {
        self.read()
            .get(node)
            .map(|n| n.children.clone())
            .unwrap_or_default()
    }

    fn set_parent(&self, node: NodeId, parent: Option<NodeId>) -> bool {
        let mut nodes = self.write();
        if !nodes.contains_key(node) {
            return false;
        }
        if let Some(parent) = parent {
            if !nodes.contains_key(parent) {
                return false;
            }
            if parent == node || Self::is_ancestor(&nodes, node, parent) {
                warn!("rejected reparent that would create a cycle");
                return false;
            }
        }

        Self::detach_from_parent(&mut nodes, node);
        if let Some(parent) = parent {
            nodes[parent].children.push(node);
            nodes[node].parent = Some(parent);
        }
        true
    }

    fn is_active(&self, node: NodeId) -> bool {
        self.read().get(node).is_some_and(|n| n.active)
    }

    fn set_active(&self, node: NodeId, active: bool) {
        if let Some(entry) = self.write().get_mut(node) {
            entry.active = active;
        }
    }

    fn local_transform(&self, node: NodeId) -> Option<Transform> {
        self.read().get(node).map(|n| n.local.clone())
    }

    fn set_local_transform(&self, node: NodeId, transform: Transform) {
        if let Some(entry) = self.write().get_mut(node) {
            entry.local = transform;
        }
    }

    fn world_transform(&self, node: NodeId) -> Option<Transform> {
        Self::world_transform_of(&self.read(), node)
    }

    fn world_position(&self, node: NodeId) -> Option<Vec3> {
        self.world_transform(node).map(|t| t.position)
    }

    fn set_world_position(&self, node: NodeId, position: Vec3) {
        let mut nodes = self.write();
        let Some(parent) = nodes.get(node).map(|n| n.parent) else {
            return;
        };
        let local_position = match parent.and_then(|p| Self::world_transform_of(&nodes, p)) {
            Some(parent_world) => parent_world.inverse().transform_point(position),
            None => position,
        };
        if let Some(entry) = nodes.get_mut(node) {
            entry.local.position = local_position;
        }
    }

    fn world_rotation(&self, node: NodeId) -> Option<Quat> {
        self.world_transform(node).map(|t| t.rotation)
    }

    fn set_world_rotation(&self, node: NodeId, rotation: Quat) {
        let mut nodes = self.write();
        let Some(parent) = nodes.get(node).map(|n| n.parent) else {
            return;
        };
        let local_rotation = match parent.and_then(|p| Self::world_transform_of(&nodes, p)) {
            Some(parent_world) => parent_world.rotation.inverse() * rotation,
            None => rotation,
        };
        if let Some(entry) = nodes.get_mut(node) {
            entry.local.rotation = local_rotation;
        }
    }

    fn set_despawn_hook(&self, hook: Weak<dyn DespawnHook>) {
        *self
            .despawn_hook
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(hook);
    }
}
