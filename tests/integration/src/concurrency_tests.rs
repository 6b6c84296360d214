//! Concurrent access to one manager

use std::sync::mpsc;
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

use repo_manager::{FactoryRegistry, ImplConfig, Manager, RepositoryConfig};
use repo_store::Repository;
use repo_test_utils::{
    BlockingFactory, CountingFactory, Gate, TestManager, memory_config, proxy_config,
};

const THREADS: usize = 8;

#[test]
fn test_concurrent_first_access_builds_one_handle() {
    let counting = CountingFactory::new("counting").with_delay(Duration::from_millis(20));
    let mut registry = FactoryRegistry::with_builtins();
    registry.register(counting.clone());
    let fixture = TestManager::with_registry(registry);
    fixture
        .manager()
        .add_repository_config(&RepositoryConfig::new("x", ImplConfig::new("counting")))
        .unwrap();

    let barrier = Barrier::new(THREADS);
    let handles: Vec<Arc<dyn Repository>> = thread::scope(|scope| {
        let workers: Vec<_> = (0..THREADS)
            .map(|_| {
                scope.spawn(|| {
                    barrier.wait();
                    fixture.manager().get_repository("x").unwrap().unwrap()
                })
            })
            .collect();
        workers.into_iter().map(|w| w.join().unwrap()).collect()
    });

    assert_eq!(counting.created(), 1);
    assert_eq!(handles.len(), THREADS);
    assert!(handles.iter().all(|h| Arc::ptr_eq(h, &handles[0])));
}

#[test]
fn test_concurrent_access_to_many_ids_builds_each_once() {
    let counting = CountingFactory::new("counting");
    let mut registry = FactoryRegistry::with_builtins();
    registry.register(counting.clone());
    let fixture = TestManager::with_registry(registry);
    let ids: Vec<String> = (0..4).map(|i| format!("repo-{i}")).collect();
    for id in &ids {
        fixture
            .manager()
            .add_repository_config(&RepositoryConfig::new(id, ImplConfig::new("counting")))
            .unwrap();
    }

    let barrier = Barrier::new(THREADS);
    thread::scope(|scope| {
        for worker in 0..THREADS {
            let barrier = &barrier;
            let ids = &ids;
            let manager = fixture.manager();
            scope.spawn(move || {
                barrier.wait();
                for round in 0..ids.len() {
                    let id = &ids[(worker + round) % ids.len()];
                    assert!(manager.get_repository(id).unwrap().is_some());
                }
            });
        }
    });

    assert_eq!(counting.created(), ids.len());
}

#[test]
fn test_hung_initialize_blocks_other_ids() {
    let gate = Gate::new();
    let mut registry = FactoryRegistry::with_builtins();
    registry.register(BlockingFactory::new("blocking", Arc::clone(&gate)));
    let fixture = TestManager::with_registry(registry);
    let manager = Arc::clone(fixture.manager());
    manager
        .add_repository_config(&RepositoryConfig::new("slow", ImplConfig::new("blocking")))
        .unwrap();
    manager.add_repository_config(&memory_config("fast")).unwrap();

    let slow = {
        let manager = Arc::clone(&manager);
        thread::spawn(move || manager.get_repository("slow").map(|r| r.is_some()))
    };
    assert!(gate.wait_entered(1, Duration::from_secs(5)));

    let (tx, rx) = mpsc::channel();
    let fast = {
        let manager = Arc::clone(&manager);
        thread::spawn(move || {
            let found = manager.get_repository("fast").map(|r| r.is_some());
            let _ = tx.send(found.unwrap_or(false));
        })
    };

    // Construction is serialized across ids, so "fast" waits for "slow".
    assert_eq!(
        rx.recv_timeout(Duration::from_millis(200)),
        Err(mpsc::RecvTimeoutError::Timeout)
    );

    gate.open();
    assert_eq!(rx.recv_timeout(Duration::from_secs(5)), Ok(true));
    assert!(slow.join().unwrap().unwrap());
    fast.join().unwrap();
    assert_eq!(gate.entered(), 1);
}

#[test]
fn test_concurrent_writers_and_readers_settle() {
    let fixture = TestManager::new();
    fixture
        .manager()
        .add_repository_config(&memory_config("shared"))
        .unwrap();

    let barrier = Barrier::new(THREADS);
    thread::scope(|scope| {
        for worker in 0..THREADS {
            let barrier = &barrier;
            let manager = fixture.manager();
            scope.spawn(move || {
                barrier.wait();
                let own = format!("worker-{worker}");
                manager.add_repository_config(&memory_config(&own)).unwrap();
                manager
                    .add_repository_config(&proxy_config(&format!("{own}-alias"), "shared"))
                    .unwrap();
                for _ in 0..5 {
                    assert!(manager.get_repository(&own).unwrap().is_some());
                    let alias = manager.get_repository(&format!("{own}-alias")).unwrap().unwrap();
                    alias.connection().unwrap().size(&[]).unwrap();
                }
            });
        }
    });

    let ids = fixture.manager().repository_ids().unwrap();
    assert_eq!(ids.len(), 2 + 2 * THREADS);

    // Every handle built during the race reflects a stored config.
    for id in fixture.manager().initialized_repository_ids() {
        assert!(ids.contains(&id), "{id} has no config");
    }
}
