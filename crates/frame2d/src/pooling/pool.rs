//! Bounded instance pool for one template
//!
//! A [`Pool`] owns every clone it ever makes of its template: a mapping from
//! instance id to [`PoolableHandle`] plus the set of ids currently free. It
//! grows on demand in `grow_amount` batches up to `max_size` and never
//! shrinks. All mutations of the mapping and free-set funnel through one
//! mutex; template cloning runs with that mutex released (capacity is
//! reserved first, so the size cap holds under concurrent growth).

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use log::{error, warn};
use serde::{Deserialize, Serialize};

use crate::foundation::math::Vec3;
use crate::pooling::handle::{next_loan_id, PoolableHandle, PooledInstance};
use crate::scene::{NodeId, SceneHost};

/// Sizing parameters for one pool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolConfig {
    /// Number of pooled instances to start with
    pub initial_size: usize,

    /// Number of instances to add when the pool runs out
    pub grow_amount: usize,

    /// Maximum number of instances the pool can grow to contain
    pub max_size: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            initial_size: 8,
            grow_amount: 8,
            max_size: 128,
        }
    }
}

#[derive(Default)]
struct PoolState {
    /// instance id -> per-instance bookkeeping
    instances: HashMap<NodeId, PoolableHandle>,

    /// ids currently available for acquisition
    free: HashSet<NodeId>,

    /// instances registered plus clone slots reserved but not yet registered
    total: usize,
}

/// Bounded pool of interchangeable clones of one template
pub struct Pool {
    scene: Arc<dyn SceneHost>,
    template: NodeId,
    root: NodeId,
    name: String,
    config: PoolConfig,
    state: Mutex<PoolState>,
}

impl Pool {
    /// Set up a pool for `template` and pre-populate it
    ///
    /// Creates the pool's private root node (`"<template> (Pool)"`, parented
    /// under `container` when given) and clones `initial_size` instances,
    /// clamped by `max_size`. Returns `None` (after logging) if the template
    /// is not alive.
    pub fn initialize(
        scene: Arc<dyn SceneHost>,
        template: NodeId,
        config: PoolConfig,
        container: Option<NodeId>,
    ) -> Option<Arc<Self>> {
        if !scene.is_alive(template) {
            error!("cannot initialize pool: template node is not alive");
            return None;
        }

        let name = scene
            .node_name(template)
            .unwrap_or_else(|| "template".to_owned());
        let root = scene.create_node(&format!("{name} (Pool)"));
        if let Some(container) = container {
            scene.set_parent(root, Some(container));
        }

        let pool = Arc::new(Self {
            scene,
            template,
            root,
            name,
            config,
            state: Mutex::new(PoolState::default()),
        });
        pool.create_instances(i64::try_from(pool.config.initial_size).unwrap_or(i64::MAX));
        Some(pool)
    }

    /// The template this pool clones
    pub fn template(&self) -> NodeId {
        self.template
    }

    /// The pool's private root node, under which free instances are parked
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// The pool's sizing parameters
    pub fn config(&self) -> PoolConfig {
        self.config
    }

    /// Number of instances currently registered
    pub fn len(&self) -> usize {
        self.lock_state().instances.len()
    }

    /// Check whether the pool has no instances
    pub fn is_empty(&self) -> bool {
        self.lock_state().instances.is_empty()
    }

    /// Maximum number of instances the pool may ever hold
    pub fn capacity(&self) -> usize {
        self.config.max_size
    }

    /// Number of instances currently free
    pub fn free_count(&self) -> usize {
        self.lock_state().free.len()
    }

    /// Number of instances currently on loan
    pub fn in_use_count(&self) -> usize {
        let state = self.lock_state();
        state.instances.len() - state.free.len()
    }

    /// Check whether an instance belongs to this pool
    pub fn contains(&self, instance: NodeId) -> bool {
        self.lock_state().instances.contains_key(&instance)
    }

    /// Look up the current loan id of an instance (0 when not on loan)
    pub fn loan_id_of(&self, instance: NodeId) -> Option<u64> {
        self.lock_state()
            .instances
            .get(&instance)
            .map(PoolableHandle::loan_id)
    }

    /// Clone up to `min(count, max_size - len)` new instances
    ///
    /// A `count` of zero or below still attempts exactly one creation pass
    /// before the capacity clamp is applied; callers that pass a computed
    /// count get at least one instance. Each clone is deactivated, parked
    /// under the pool
    /// root at the root's position, snapshotted, and registered as free.
    /// Returns the number of instances actually created.
    pub fn create_instances(&self, count: i64) -> usize {
        let requested = usize::try_from(count).unwrap_or(0).max(1);

        // Reserve capacity up front so concurrent growth cannot overshoot
        // max_size while the clones are made outside the lock.
        let reserved = {
            let mut state = self.lock_state();
            let headroom = self.config.max_size.saturating_sub(state.total);
            let granted = requested.min(headroom);
            state.total += granted;
            granted
        };
        if reserved == 0 {
            return 0;
        }

        let park_position = self.scene.world_position(self.root);
        let mut created = 0;
        for _ in 0..reserved {
            let Some(instance) = self.scene.instantiate(self.template) else {
                warn!("template clone failed while growing '{}' pool", self.name);
                break;
            };
            self.scene.set_active(instance, false);
            self.scene.set_parent(instance, Some(self.root));
            if let Some(position) = park_position {
                self.scene.set_world_position(instance, position);
            }

            let mut handle = PoolableHandle::new(self.template, instance);
            handle.capture_initial_state(self.scene.as_ref());

            let mut state = self.lock_state();
            self.scene.set_node_name(
                instance,
                &format!("{}: INST {}", self.name, state.instances.len()),
            );
            state.free.insert(instance);
            state.instances.insert(instance, handle);
            created += 1;
        }

        if created < reserved {
            // Give unused reservations back.
            self.lock_state().total -= reserved - created;
        }
        created
    }

    /// Acquire a free instance, activated and placed at `position`
    ///
    /// Grows by `grow_amount` first when the free-set is empty and
    /// `expand_if_empty` is set. Stale free-set entries (mapping missing, or
    /// instance active despite being marked free) are purged as a side
    /// effect; if purging occurred and nothing usable was found, the pool
    /// grows once more and rescans a single time without further expansion.
    /// Returns `None` when no instance is available after that retry.
    pub fn acquire(&self, position: Vec3, expand_if_empty: bool) -> Option<PooledInstance> {
        self.acquire_inner(position, expand_if_empty, true)
    }

    fn acquire_inner(
        &self,
        position: Vec3,
        expand_if_empty: bool,
        allow_retry: bool,
    ) -> Option<PooledInstance> {
        let exhausted = self.lock_state().free.is_empty();
        if exhausted && expand_if_empty {
            self.grow();
        }

        let purged;
        {
            let mut state = self.lock_state();
            if state.free.is_empty() {
                return None;
            }

            let mut chosen = None;
            let mut stale = Vec::new();
            for &id in &state.free {
                let usable = state.instances.contains_key(&id)
                    && self.scene.is_alive(id)
                    && !self.scene.is_active(id);
                if usable {
                    chosen = Some(id);
                    break;
                }
                stale.push(id);
            }

            purged = stale.len();
            for id in &stale {
                state.free.remove(id);
            }
            if purged > 0 {
                warn!(
                    "purged {} invalid entries from '{}' pool free-set",
                    purged, self.name
                );
            }

            if let Some(id) = chosen {
                state.free.remove(&id);
                let loan = next_loan_id();
                if let Some(handle) = state.instances.get_mut(&id) {
                    handle.set_loan_id(loan);
                }
                // Detach and activate while still exclusive so a concurrent
                // acquire cannot observe a free-but-active instance.
                self.scene.set_parent(id, None);
                self.scene.set_world_position(id, position);
                self.scene.set_active(id, true);
                return Some(PooledInstance::new(id, self.template, loan));
            }
        }

        // A dirty free-set can mask exhaustion and block normal growth, so
        // grow once more and rescan a single time, expansion disabled.
        if purged > 0 && allow_retry && expand_if_empty {
            self.grow();
            return self.acquire_inner(position, false, false);
        }
        None
    }

    /// Return an instance to the free-set
    ///
    /// Rejects the template itself, dead nodes, and nodes this pool does not
    /// manage. Deactivates the instance and parks it under the pool root at
    /// the root's position. Does not restore the initial-state snapshot; see
    /// [`PoolableHandle::reset_to_initial_state`].
    pub fn release(&self, instance: NodeId) -> bool {
        if instance == self.template {
            warn!("refusing to store the template itself in '{}' pool", self.name);
            return false;
        }
        if !self.scene.is_alive(instance) {
            return false;
        }

        let mut state = self.lock_state();
        if !state.instances.contains_key(&instance) {
            return false;
        }
        self.scene.set_active(instance, false);
        self.scene.set_parent(instance, Some(self.root));
        if let Some(position) = self.scene.world_position(self.root) {
            self.scene.set_world_position(instance, position);
        }
        state.free.insert(instance);
        true
    }

    /// Clear the loan id and restore the initial-state snapshot
    ///
    /// Completes a successful release; the snapshot is applied outside the
    /// pool's critical section.
    pub(crate) fn finish_return(&self, instance: NodeId) {
        let handle = {
            let mut state = self.lock_state();
            let Some(handle) = state.instances.get_mut(&instance) else {
                return;
            };
            handle.set_loan_id(0);
            handle.clone()
        };
        handle.reset_to_initial_state(self.scene.as_ref());
    }

    /// Drop an instance from both the free-set and the mapping
    ///
    /// Used for teardown and explicit deletion; the node itself is not
    /// destroyed. Always succeeds (a node id cannot be null).
    pub fn remove(&self, instance: NodeId) -> bool {
        let mut state = self.lock_state();
        state.free.remove(&instance);
        if state.instances.remove(&instance).is_some() {
            state.total -= 1;
        }
        true
    }

    /// Rebuild the free-set from scratch
    ///
    /// Re-adds every mapped instance that is alive and inactive. This is a
    /// consistency-repair operation, not part of the hot path.
    pub fn reconcile_free_set(&self) {
        let mut state = self.lock_state();
        let free: Vec<NodeId> = state
            .instances
            .keys()
            .copied()
            .filter(|&id| self.scene.is_alive(id) && !self.scene.is_active(id))
            .collect();
        state.free.clear();
        state.free.extend(free);
    }

    fn grow(&self) {
        self.create_instances(i64::try_from(self.config.grow_amount).unwrap_or(i64::MAX));
    }

    fn lock_state(&self) -> MutexGuard<'_, PoolState> {
        // A panicked client thread must not wedge the whole pool.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
