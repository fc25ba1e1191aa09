//! Process-scoped pool directory
//!
//! One [`PoolRegistry`] lives for the process's lifetime: created once at
//! startup, told about shutdown via [`PoolRegistry::begin_shutdown`], and
//! dropped once at exit. It maps template identities to their pools, creates
//! pools lazily on demand, and routes acquire/release/remove calls by
//! template identity. The registry also watches the scene for node
//! destruction so a pooled instance can never silently disappear from pool
//! bookkeeping while the process runs normally.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use log::{error, warn};
use serde::{Deserialize, Serialize};

use crate::foundation::math::Vec3;
use crate::pooling::handle::PooledInstance;
use crate::pooling::pool::{Pool, PoolConfig};
use crate::scene::{DespawnHook, NodeId, SceneHost};

/// How many registries are currently alive; more than one is caller misuse.
static LIVE_REGISTRIES: AtomicUsize = AtomicUsize::new(0);

/// Registry-wide sizing defaults for lazily created pools
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolDefaults {
    /// Default initial size for procedurally created pools
    pub initial_size: usize,

    /// Default grow amount for procedurally created pools
    pub grow_amount: usize,

    /// Default max size for procedurally created pools
    pub max_size: usize,
}

impl Default for PoolDefaults {
    fn default() -> Self {
        Self {
            initial_size: 16,
            grow_amount: 16,
            max_size: 128,
        }
    }
}

/// Directory mapping template identity to its [`Pool`]
pub struct PoolRegistry {
    scene: Arc<dyn SceneHost>,
    root: NodeId,
    defaults: PoolDefaults,
    pools: Mutex<HashMap<NodeId, Arc<Pool>>>,
    shutting_down: AtomicBool,
}

impl PoolRegistry {
    /// Create the process's pool registry
    ///
    /// Creates a container node all pool roots are parented under, and
    /// registers the registry as the scene's despawn observer. Logs an error
    /// if another registry is still alive (callers are expected to keep
    /// exactly one for the process's lifetime).
    pub fn new(scene: Arc<dyn SceneHost>, defaults: PoolDefaults) -> Arc<Self> {
        let live = LIVE_REGISTRIES.fetch_add(1, Ordering::SeqCst) + 1;
        if live > 1 {
            error!("more than one pool registry is live ({live})");
        }

        let root = scene.create_node("PoolRegistry");
        let registry = Arc::new(Self {
            scene,
            root,
            defaults,
            pools: Mutex::new(HashMap::new()),
            shutting_down: AtomicBool::new(false),
        });

        let hook_arc: Arc<dyn DespawnHook> = Arc::clone(&registry) as Arc<dyn DespawnHook>;
        let hook: Weak<dyn DespawnHook> = Arc::downgrade(&hook_arc);
        registry.scene.set_despawn_hook(hook);
        registry
    }

    /// The registry's container node for pool roots
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// The sizing defaults applied to lazily created pools
    pub fn defaults(&self) -> PoolDefaults {
        self.defaults
    }

    /// Look up the pool registered for `template`
    pub fn get_pool(&self, template: NodeId) -> Option<Arc<Pool>> {
        self.lock_pools().get(&template).cloned()
    }

    /// Register a new pool for `template`
    ///
    /// Unspecified sizing parameters fall back to the registry defaults.
    /// Fails (logging an error) if a pool for the template already exists or
    /// the template is not alive.
    pub fn add_pool(
        &self,
        template: NodeId,
        initial_size: Option<usize>,
        grow_amount: Option<usize>,
        max_size: Option<usize>,
    ) -> bool {
        let config = self.config_with(initial_size, grow_amount, max_size);
        let mut pools = self.lock_pools();
        if pools.contains_key(&template) {
            error!("a pool for this template already exists");
            return false;
        }
        match Pool::initialize(Arc::clone(&self.scene), template, config, Some(self.root)) {
            Some(pool) => {
                pools.insert(template, pool);
                true
            }
            None => false,
        }
    }

    /// Look up the pool for `template`, creating and registering one if absent
    ///
    /// Returns `None` only when a pool had to be created and initialization
    /// failed (dead template).
    pub fn get_or_create_pool(
        &self,
        template: NodeId,
        initial_size: Option<usize>,
        grow_amount: Option<usize>,
        max_size: Option<usize>,
    ) -> Option<Arc<Pool>> {
        let config = self.config_with(initial_size, grow_amount, max_size);
        let mut pools = self.lock_pools();
        if let Some(pool) = pools.get(&template) {
            return Some(Arc::clone(pool));
        }
        let pool = Pool::initialize(Arc::clone(&self.scene), template, config, Some(self.root))?;
        pools.insert(template, Arc::clone(&pool));
        Some(pool)
    }

    /// Acquire an instance of `template` at `position`
    ///
    /// Routes to the registered pool; with `create_if_missing` a pool is
    /// created on demand using the registry defaults.
    pub fn acquire(
        &self,
        template: NodeId,
        position: Vec3,
        create_if_missing: bool,
    ) -> Option<PooledInstance> {
        let pool = if create_if_missing {
            self.get_or_create_pool(template, None, None, None)
        } else {
            let pool = self.get_pool(template);
            if pool.is_none() {
                warn!("could not locate a pool for the requested template");
            }
            pool
        }?;
        pool.acquire(position, true)
    }

    /// Return an instance of `template` to its pool's free-set
    ///
    /// Thin router to [`Pool::release`]; false if no pool is registered.
    /// Loan state and the initial-state snapshot are handled by
    /// [`PooledInstance::return_to_pool`].
    pub fn release(&self, template: NodeId, instance: NodeId) -> bool {
        self.get_pool(template)
            .is_some_and(|pool| pool.release(instance))
    }

    /// Drop an instance of `template` from its pool's bookkeeping
    ///
    /// Thin router to [`Pool::remove`]; false if no pool is registered.
    pub fn remove(&self, template: NodeId, instance: NodeId) -> bool {
        self.get_pool(template)
            .is_some_and(|pool| pool.remove(instance))
    }

    /// Mark the process as shutting down
    ///
    /// Suppresses the integrity check that would otherwise flag destruction
    /// of pool-registered instances during teardown.
    pub fn begin_shutdown(&self) {
        self.shutting_down.store(true, Ordering::SeqCst);
    }

    /// Check whether shutdown has begun
    pub fn is_shutting_down(&self) -> bool {
        self.shutting_down.load(Ordering::SeqCst)
    }

    fn config_with(
        &self,
        initial_size: Option<usize>,
        grow_amount: Option<usize>,
        max_size: Option<usize>,
    ) -> PoolConfig {
        PoolConfig {
            initial_size: initial_size.unwrap_or(self.defaults.initial_size),
            grow_amount: grow_amount.unwrap_or(self.defaults.grow_amount),
            max_size: max_size.unwrap_or(self.defaults.max_size),
        }
    }

    fn lock_pools(&self) -> MutexGuard<'_, HashMap<NodeId, Arc<Pool>>> {
        self.pools.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl DespawnHook for PoolRegistry {
    fn on_node_despawned(&self, node: NodeId) {
        if self.is_shutting_down() {
            return;
        }
        let pools: Vec<Arc<Pool>> = self.lock_pools().values().cloned().collect();
        for pool in pools {
            if pool.contains(node) {
                error!("pool-registered instance destroyed outside shutdown; evicting it");
                pool.remove(node);
            }
        }
    }
}

impl Drop for PoolRegistry {
    fn drop(&mut self) {
        LIVE_REGISTRIES.fetch_sub(1, Ordering::SeqCst);
        if !self.is_shutting_down() {
            error!("pool registry dropped without begin_shutdown()");
        }
    }
}
