//! Integration tests across the pooling subsystem
//!
//! Exercises the pool/registry/handle trio together against a live
//! [`SceneTree`], including the concurrency guarantees.

use std::sync::Arc;
use std::thread;

use crate::foundation::math::{Transform, Vec3};
use crate::pooling::{PoolDefaults, PoolRegistry};
use crate::scene::{NodeId, SceneHost, SceneTree};

/// Scene with a two-level template (root + one child), plus a registry.
fn setup(defaults: PoolDefaults) -> (Arc<SceneTree>, Arc<PoolRegistry>, NodeId) {
    let scene = Arc::new(SceneTree::new());
    let template = scene.create_node("rocket");
    let fin = scene.create_node("fin");
    scene.set_parent(fin, Some(template));
    scene.set_local_transform(fin, Transform::from_position(Vec3::new(0.0, 0.5, 0.0)));

    let host: Arc<dyn SceneHost> = Arc::clone(&scene) as Arc<dyn SceneHost>;
    let registry = PoolRegistry::new(host, defaults);
    (scene, registry, template)
}

fn small_defaults() -> PoolDefaults {
    PoolDefaults {
        initial_size: 2,
        grow_amount: 2,
        max_size: 8,
    }
}

#[test]
fn test_pool_accounting_invariant() {
    let (_scene, registry, template) = setup(small_defaults());
    let pool = registry.get_or_create_pool(template, None, None, None).unwrap();

    assert_eq!(pool.len(), 2);
    assert_eq!(pool.free_count() + pool.in_use_count(), pool.len());

    let loan = pool.acquire(Vec3::zeros(), true).unwrap();
    assert_eq!(pool.free_count() + pool.in_use_count(), pool.len());
    assert_eq!(pool.in_use_count(), 1);

    assert!(loan.return_to_pool(&registry));
    assert_eq!(pool.free_count() + pool.in_use_count(), pool.len());
    assert_eq!(pool.in_use_count(), 0);
    assert!(pool.len() <= pool.config().max_size);
}

#[test]
fn test_create_instances_clamps_to_max_size() {
    let (_scene, registry, template) = setup(small_defaults());
    let pool = registry
        .get_or_create_pool(template, Some(2), Some(2), Some(5))
        .unwrap();

    assert_eq!(pool.create_instances(1000), 3);
    assert_eq!(pool.len(), 5);

    // At capacity, even the tolerant one-clone pass creates nothing.
    assert_eq!(pool.create_instances(0), 0);
    assert_eq!(pool.create_instances(-4), 0);
    assert_eq!(pool.len(), 5);
}

#[test]
fn test_create_instances_zero_or_negative_attempts_one() {
    let (_scene, registry, template) = setup(small_defaults());
    let pool = registry
        .get_or_create_pool(template, Some(1), Some(1), Some(8))
        .unwrap();

    assert_eq!(pool.len(), 1);
    assert_eq!(pool.create_instances(0), 1);
    assert_eq!(pool.len(), 2);
    assert_eq!(pool.create_instances(-7), 1);
    assert_eq!(pool.len(), 3);
}

#[test]
fn test_exhaustion_scenario() {
    // initial 2, grow 2, max 3: the third acquire grows by a clamped batch of
    // one; the fourth finds the pool exhausted and unable to grow.
    let (_scene, registry, template) = setup(small_defaults());
    let pool = registry
        .get_or_create_pool(template, Some(2), Some(2), Some(3))
        .unwrap();

    let first = pool.acquire(Vec3::zeros(), true);
    let second = pool.acquire(Vec3::zeros(), true);
    let third = pool.acquire(Vec3::zeros(), true);
    assert!(first.is_some() && second.is_some() && third.is_some());
    assert_eq!(pool.len(), 3);
    assert_eq!(pool.free_count(), 0);

    assert!(pool.acquire(Vec3::zeros(), true).is_none());
    assert_eq!(pool.len(), 3);
}

#[test]
fn test_loan_id_lifecycle() {
    let (_scene, registry, template) = setup(small_defaults());
    let pool = registry.get_or_create_pool(template, None, None, None).unwrap();

    let loan = pool.acquire(Vec3::zeros(), true).unwrap();
    assert_ne!(loan.loan_id(), 0);
    assert_eq!(pool.loan_id_of(loan.node()), Some(loan.loan_id()));

    assert!(loan.return_to_pool(&registry));
    assert_eq!(pool.loan_id_of(loan.node()), Some(0));

    // Successive loans of any instance carry strictly increasing ids
    // (modulo a wraparound that cannot occur within one test run).
    let next = pool.acquire(Vec3::zeros(), true).unwrap();
    assert!(next.loan_id() > loan.loan_id());
}

#[test]
fn test_acquire_release_restores_initial_state() {
    let (scene, registry, template) = setup(small_defaults());
    let pool = registry.get_or_create_pool(template, None, None, None).unwrap();

    let loan = pool.acquire(Vec3::new(40.0, -3.0, 0.0), true).unwrap();
    let instance = loan.node();
    assert!(scene.is_active(instance));
    assert_eq!(scene.parent(instance), None);

    // Client mangles the loaned instance arbitrarily
    let fin = scene.children(instance)[0];
    scene.set_parent(fin, None);
    scene.set_active(fin, false);
    scene.set_local_transform(fin, Transform::from_position(Vec3::new(7.0, 7.0, 7.0)));

    assert!(loan.return_to_pool(&registry));

    // Parked exactly as it was before the loan
    assert!(!scene.is_active(instance));
    assert_eq!(scene.parent(instance), Some(pool.root()));
    assert_eq!(scene.parent(fin), Some(instance));
    assert!(scene.is_active(fin));
    assert_eq!(
        scene.local_transform(fin).unwrap().position,
        Vec3::new(0.0, 0.5, 0.0)
    );
}

#[test]
fn test_release_rejects_template_and_strangers() {
    let (scene, registry, template) = setup(small_defaults());
    let pool = registry.get_or_create_pool(template, None, None, None).unwrap();

    assert!(!pool.release(template));

    let stranger = scene.create_node("stranger");
    assert!(!pool.release(stranger));
}

#[test]
fn test_stale_free_entry_is_purged_and_pool_self_heals() {
    let (scene, registry, template) = setup(small_defaults());
    let pool = registry
        .get_or_create_pool(template, Some(1), Some(1), Some(4))
        .unwrap();

    // Corrupt the free-set: the single parked instance gets activated behind
    // the pool's back, so its free entry is stale.
    let parked = scene.children(pool.root())[0];
    scene.set_active(parked, true);

    // Acquire purges the stale entry, grows once, and still succeeds.
    let loan = pool.acquire(Vec3::zeros(), true).unwrap();
    assert_ne!(loan.node(), parked);
    assert_eq!(pool.free_count() + pool.in_use_count(), pool.len());
}

#[test]
fn test_reconcile_free_set_rebuilds_from_mapping() {
    let (scene, registry, template) = setup(small_defaults());
    let pool = registry
        .get_or_create_pool(template, Some(3), Some(1), Some(8))
        .unwrap();

    // One instance activated out-of-band: no longer eligible to be free.
    let parked = scene.children(pool.root())[0];
    scene.set_active(parked, true);

    pool.reconcile_free_set();
    assert_eq!(pool.len(), 3);
    assert_eq!(pool.free_count(), 2);

    scene.set_active(parked, false);
    pool.reconcile_free_set();
    assert_eq!(pool.free_count(), 3);
}

#[test]
fn test_registry_routes_by_template_identity() {
    let (scene, registry, template) = setup(small_defaults());

    // Nothing registered yet
    let unknown = scene.create_node("unknown");
    assert!(registry.get_pool(unknown).is_none());
    assert!(registry.acquire(unknown, Vec3::zeros(), false).is_none());
    assert!(!registry.release(unknown, unknown));
    assert!(!registry.remove(unknown, unknown));

    // Lazy creation through acquire
    let loan = registry.acquire(template, Vec3::zeros(), true).unwrap();
    let pool = registry.get_pool(template).unwrap();
    assert_eq!(pool.config().initial_size, 2);
    assert!(pool.contains(loan.node()));

    assert!(registry.release(template, loan.node()));
    assert_eq!(pool.in_use_count(), 0);
}

#[test]
fn test_duplicate_pool_registration_fails() {
    let (_scene, registry, template) = setup(small_defaults());

    assert!(registry.add_pool(template, None, None, None));
    assert!(!registry.add_pool(template, None, None, None));
}

#[test]
fn test_despawn_outside_shutdown_evicts_instance() {
    let (scene, registry, template) = setup(small_defaults());
    let pool = registry.get_or_create_pool(template, None, None, None).unwrap();

    let loan = pool.acquire(Vec3::zeros(), true).unwrap();
    assert!(pool.contains(loan.node()));

    // Destroying a loaned instance is caller misuse; the registry notices
    // and drops it from the bookkeeping so the pool stays consistent.
    scene.destroy_node(loan.node());
    assert!(!pool.contains(loan.node()));
    assert_eq!(pool.free_count() + pool.in_use_count(), pool.len());
}

#[test]
fn test_shutdown_suppresses_despawn_integrity_check() {
    let (scene, registry, template) = setup(small_defaults());
    let pool = registry.get_or_create_pool(template, None, None, None).unwrap();
    let loan = pool.acquire(Vec3::zeros(), true).unwrap();

    registry.begin_shutdown();
    assert!(registry.is_shutting_down());

    scene.destroy_node(loan.node());
    // The hook stands down during teardown; bookkeeping is torn down with
    // the registry rather than patched per node.
    assert!(pool.contains(loan.node()));
}

#[test]
fn test_concurrent_acquires_never_share_an_instance() {
    let (_scene, registry, template) = setup(PoolDefaults {
        initial_size: 64,
        grow_amount: 8,
        max_size: 64,
    });
    let pool = registry.get_or_create_pool(template, None, None, None).unwrap();

    let mut workers = Vec::new();
    for _ in 0..8 {
        let pool = Arc::clone(&pool);
        workers.push(thread::spawn(move || {
            let mut loans = Vec::new();
            for _ in 0..8 {
                if let Some(loan) = pool.acquire(Vec3::zeros(), true) {
                    loans.push(loan);
                }
            }
            loans
        }));
    }

    let mut nodes = Vec::new();
    let mut loan_ids = Vec::new();
    for worker in workers {
        for loan in worker.join().unwrap() {
            nodes.push(loan.node());
            loan_ids.push(loan.loan_id());
        }
    }

    assert_eq!(nodes.len(), 64);
    nodes.sort();
    nodes.dedup();
    assert_eq!(nodes.len(), 64, "an instance was double-allocated");

    loan_ids.sort_unstable();
    loan_ids.dedup();
    assert_eq!(loan_ids.len(), 64, "a loan id was reused");
}

#[test]
fn test_concurrent_acquire_release_cycles_stay_consistent() {
    let (_scene, registry, template) = setup(PoolDefaults {
        initial_size: 4,
        grow_amount: 4,
        max_size: 16,
    });
    let pool = registry.get_or_create_pool(template, None, None, None).unwrap();

    let mut workers = Vec::new();
    for _ in 0..4 {
        let pool = Arc::clone(&pool);
        let registry = Arc::clone(&registry);
        workers.push(thread::spawn(move || {
            for _ in 0..50 {
                if let Some(loan) = pool.acquire(Vec3::zeros(), true) {
                    assert!(loan.return_to_pool(&registry));
                }
            }
        }));
    }
    for worker in workers {
        worker.join().unwrap();
    }

    assert_eq!(pool.in_use_count(), 0);
    assert_eq!(pool.free_count(), pool.len());
    assert!(pool.len() <= 16);
}
