//! Per-instance pool bookkeeping
//!
//! Every pooled instance carries a [`PoolableHandle`] in its pool's side
//! table: the snapshot of its attachment subtree taken at creation time, and
//! the id of its current loan. Clients only ever see the lightweight
//! [`PooledInstance`] token.

use std::sync::atomic::{AtomicU64, Ordering};

use log::debug;

use crate::foundation::math::{Transform, Vec3};
use crate::scene::{NodeId, SceneHost};

/// Loan ids wrap before they can collide with the sign bit of consumers that
/// store them in signed 64-bit slots.
const LOAN_ID_WRAP: u64 = 0x7FFF_FFFF_FFFF_FFFF;

/// 0 is reserved for "not on loan"
static NEXT_LOAN_ID: AtomicU64 = AtomicU64::new(1);

/// Take the next process-wide loan id (nonzero, monotonic modulo wraparound)
pub(crate) fn next_loan_id() -> u64 {
    let result = NEXT_LOAN_ID.fetch_update(Ordering::Relaxed, Ordering::Relaxed, |id| {
        Some(if id + 1 >= LOAN_ID_WRAP { 1 } else { id + 1 })
    });
    result.unwrap_or(1)
}

/// Captured creation-time state of one node in an instance's subtree
#[derive(Debug, Clone, PartialEq)]
pub struct NodeSnapshot {
    /// Parent at capture time
    pub parent: Option<NodeId>,
    /// Own active flag at capture time
    pub active: bool,
    /// Local transform at capture time
    pub local: Transform,
}

/// Pool bookkeeping attached to one instance
#[derive(Debug, Clone)]
pub struct PoolableHandle {
    template: NodeId,
    node: NodeId,
    loan_id: u64,
    initial_states: Option<Vec<(NodeId, NodeSnapshot)>>,
}

impl PoolableHandle {
    /// Create bookkeeping for `node`, an instance cloned from `template`
    pub fn new(template: NodeId, node: NodeId) -> Self {
        Self {
            template,
            node,
            loan_id: 0,
            initial_states: None,
        }
    }

    /// The template this instance was cloned from
    pub fn template(&self) -> NodeId {
        self.template
    }

    /// The instance node
    pub fn node(&self) -> NodeId {
        self.node
    }

    /// Current loan id; 0 exactly when the instance is not on loan
    pub fn loan_id(&self) -> u64 {
        self.loan_id
    }

    /// Check whether the instance is currently on loan
    pub fn is_on_loan(&self) -> bool {
        self.loan_id != 0
    }

    pub(crate) fn set_loan_id(&mut self, loan_id: u64) {
        self.loan_id = loan_id;
    }

    /// Snapshot the instance's subtree: parent, active flag, and local
    /// transform of every attached node
    ///
    /// Idempotent: returns false without touching anything if a snapshot was
    /// already captured. Traversal is an explicit stack walk, so arbitrarily
    /// deep attachment trees cannot overflow the call stack.
    pub fn capture_initial_state(&mut self, scene: &dyn SceneHost) -> bool {
        if self.initial_states.is_some() {
            return false;
        }

        let mut states = Vec::new();
        let mut pending = vec![self.node];
        while let Some(node) = pending.pop() {
            if !scene.is_alive(node) {
                continue;
            }
            let snapshot = NodeSnapshot {
                parent: scene.parent(node),
                active: scene.is_active(node),
                local: scene.local_transform(node).unwrap_or_default(),
            };
            states.push((node, snapshot));
            pending.extend(scene.children(node));
        }

        debug!("captured initial state of {} node(s)", states.len());
        self.initial_states = Some(states);
        true
    }

    /// Reapply every captured snapshot in capture order
    ///
    /// Restores structure and transforms exactly as captured, so client code
    /// may leave a loaned instance in an arbitrary state without leaking
    /// mutations into the next loan. Nodes destroyed since capture are
    /// skipped.
    pub fn reset_to_initial_state(&self, scene: &dyn SceneHost) {
        let Some(states) = &self.initial_states else {
            return;
        };
        for (node, snapshot) in states {
            if !scene.is_alive(*node) {
                continue;
            }
            scene.set_active(*node, snapshot.active);
            scene.set_parent(*node, snapshot.parent);
            scene.set_local_transform(*node, snapshot.local.clone());
        }
    }

    /// Check whether a snapshot has been captured
    pub fn has_initial_state(&self) -> bool {
        self.initial_states.is_some()
    }
}

/// Loan token handed out by [`Pool::acquire`](crate::pooling::Pool::acquire)
///
/// Carries the instance node, its template identity, and the id of this
/// particular loan. Returning or removing the instance routes through the
/// registry by template identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PooledInstance {
    node: NodeId,
    template: NodeId,
    loan_id: u64,
}

impl PooledInstance {
    pub(crate) fn new(node: NodeId, template: NodeId, loan_id: u64) -> Self {
        Self {
            node,
            template,
            loan_id,
        }
    }

    /// The loaned instance node
    pub fn node(&self) -> NodeId {
        self.node
    }

    /// The template the instance was cloned from
    pub fn template(&self) -> NodeId {
        self.template
    }

    /// The id of this loan (nonzero while on loan, unique to this loan)
    pub fn loan_id(&self) -> u64 {
        self.loan_id
    }

    /// Return the instance to its pool
    ///
    /// On success the pool clears the loan id and restores the instance's
    /// initial-state snapshot. On failure (no pool registered, or the release
    /// was rejected) logs and returns false without touching loan state.
    pub fn return_to_pool(&self, registry: &crate::pooling::PoolRegistry) -> bool {
        let Some(pool) = registry.get_pool(self.template) else {
            debug!("no pool registered for template; cannot return instance");
            return false;
        };
        if !pool.release(self.node) {
            return false;
        }
        pool.finish_return(self.node);
        true
    }

    /// Drop the instance from its pool's bookkeeping entirely
    ///
    /// The node itself is not destroyed; it simply stops being pool-managed.
    pub fn remove_from_pool(&self, registry: &crate::pooling::PoolRegistry) -> bool {
        let Some(pool) = registry.get_pool(self.template) else {
            debug!("no pool registered for template; cannot remove instance");
            return false;
        };
        pool.remove(self.node)
    }

    /// Place the instance at `position` (world space)
    ///
    /// Convenience passthrough for callers that only hold the token.
    pub fn place_at(&self, scene: &dyn SceneHost, position: Vec3) {
        scene.set_world_position(self.node, position);
    }
}
