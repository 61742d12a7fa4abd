//! Integration Tests for the cache library
//!
//! Exercises MemCache and FileCache through the public API only.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use bytes::Bytes;
use tidecache::cache::{loader, Clock, FileCache, ManualClock, MemCache, PathPolicy};
use tidecache::{CacheError, PathError};

#[test]
fn test_generic_keys_and_values() {
    #[derive(Debug, Clone, PartialEq, Eq, Hash)]
    struct OrderId(u64);

    let cache: MemCache<OrderId, Vec<u32>> = MemCache::new();
    cache.insert(OrderId(7), vec![1, 2, 3], None);

    assert_eq!(cache.find(&OrderId(7)), Some(vec![1, 2, 3]));
    assert_eq!(cache.find(&OrderId(8)), None);
}

#[test]
fn test_expiry_follows_clock() {
    let clock = ManualClock::new();
    let cache: MemCache<&'static str, u32, ManualClock> = MemCache::with_clock(clock.clone());

    cache.insert("a", 1, Some(Duration::from_millis(500)));
    clock.advance(Duration::from_millis(499));
    assert_eq!(cache.find("a"), Some(1));
    assert_eq!(
        cache.find_with_ttl("a").unwrap().remaining,
        Some(Duration::from_millis(1))
    );

    clock.advance(Duration::from_millis(1));
    assert_eq!(cache.find("a"), None);
    assert_eq!(cache.purge_expired(), 1);
    assert!(cache.is_empty());
}

#[test]
fn test_purge_counts_exactly_dead_entries() {
    let cache: MemCache<String, u32> = MemCache::new().with_batch_size(4);

    for i in 0..25 {
        cache.insert(format!("dead-{}", i), i, Some(Duration::ZERO));
    }
    for i in 0..10 {
        cache.insert(format!("live-{}", i), i, None);
    }

    assert_eq!(cache.purge_expired(), 25);
    assert_eq!(cache.len(), 10);
    assert_eq!(cache.stats().purged, 25);
}

#[test]
fn test_purge_concurrent_with_reinsert_keeps_new_entries() {
    let cache: Arc<MemCache<u32, u32>> = Arc::new(MemCache::new().with_batch_size(8));
    for i in 0..2_000 {
        cache.insert(i, 0, Some(Duration::ZERO));
    }

    let writer = {
        let cache = Arc::clone(&cache);
        thread::spawn(move || {
            for i in 0..2_000 {
                cache.insert(i, 1, None);
            }
        })
    };
    let removed = cache.purge_expired();
    writer.join().unwrap();

    // Every key ends up holding the live rewrite, whichever side won each race
    assert!(removed <= 2_000);
    for i in 0..2_000 {
        assert_eq!(cache.find(&i), Some(1), "key {} lost its rewrite", i);
    }
}

#[test]
fn test_concurrent_readers_and_writers() {
    let cache: Arc<MemCache<String, String>> = Arc::new(MemCache::new());
    let handles: Vec<_> = (0..4)
        .map(|t| {
            let cache = Arc::clone(&cache);
            thread::spawn(move || {
                for i in 0..500 {
                    let key = format!("{}-{}", t, i % 50);
                    let value = format!("{}:{}", key, i);
                    cache.insert(key.clone(), value, Some(Duration::from_secs(60)));
                    let read = cache.find(&key).expect("own write must be visible");
                    assert!(read.starts_with(&key), "torn value {}", read);
                    if i % 7 == 0 {
                        cache.remove(&key);
                    }
                    if i % 100 == 0 {
                        cache.purge_expired();
                    }
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }
    assert!(cache.len() <= 200);
}

#[test]
fn test_file_cache_path_equivalence() {
    let cache = FileCache::new();

    cache.insert("a/b", "content", Some(Duration::from_secs(30))).unwrap();

    assert_eq!(cache.find_path("a/./b").unwrap(), Some(Bytes::from("content")));
    assert_eq!(cache.find("a/b"), Some(Bytes::from("content")));
    let hit = cache.find_path_with_ttl("a//b").unwrap().unwrap();
    assert!(hit.remaining.unwrap() <= Duration::from_secs(30));
}

#[test]
fn test_file_cache_traversal_is_reported() {
    let cache = FileCache::new();

    let err = cache.find_path("../../etc/shadow").unwrap_err();
    assert!(matches!(err, CacheError::InvalidPath(PathError::EscapesRoot(_))));

    let permissive = FileCache::with_policy(PathPolicy::permissive());
    assert_eq!(permissive.find_path("../../etc/shadow").unwrap(), None);
}

#[test]
fn test_file_cache_swap() {
    let a = FileCache::new();
    let b = FileCache::new();
    a.insert("/one", "1", None).unwrap();
    b.insert("/two", "2", Some(Duration::from_secs(60))).unwrap();

    a.swap(&b);

    assert!(a.find("/two").is_some());
    assert!(b.find("/one").is_some());
    assert!(a.find("/one").is_none());
}

#[test]
fn test_loader_then_remove_prefix() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir_all(dir.path().join("img")).unwrap();
    std::fs::write(dir.path().join("img/a.png"), [0u8, 1, 2]).unwrap();
    std::fs::write(dir.path().join("img/b.png"), [3u8]).unwrap();
    std::fs::write(dir.path().join("index.html"), "<p>").unwrap();

    let cache = FileCache::new();
    assert_eq!(loader::insert_dir(&cache, dir.path(), "/site", None).unwrap(), 3);

    assert_eq!(cache.find("/site/img/a.png"), Some(Bytes::from_static(&[0, 1, 2])));
    assert_eq!(cache.remove_prefix("/site/img").unwrap(), 2);
    assert_eq!(cache.len(), 1);
}

#[test]
fn test_manual_clock_is_a_clock() {
    fn now_of(clock: &dyn Clock) -> u64 {
        clock.now().as_nanos()
    }

    let clock = ManualClock::new();
    clock.advance(Duration::from_nanos(42));
    assert_eq!(now_of(&clock), 42);
}

#[test]
fn test_sweeper_drains_both_caches() {
    use tidecache::{spawn_sweep_task, SweepConfig, SweepTarget};

    let kv: Arc<MemCache<String, String>> = Arc::new(MemCache::new());
    let files = Arc::new(FileCache::new());
    kv.insert("gone".to_string(), "v".to_string(), Some(Duration::ZERO));
    kv.insert("kept".to_string(), "v".to_string(), None);
    files.insert("/gone", "x", Some(Duration::ZERO)).unwrap();

    tokio_test::block_on(async {
        let handle = spawn_sweep_task(
            vec![
                SweepTarget::new("kv", kv.clone()),
                SweepTarget::new("files", files.clone()),
            ],
            SweepConfig {
                interval: Duration::from_millis(10),
                lock_timeout: Duration::from_millis(10),
            },
        );
        assert!(handle.is_running());

        for _ in 0..100 {
            if kv.len() == 1 && files.is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        handle.shutdown().await;
    });

    assert_eq!(kv.len(), 1);
    assert!(kv.find("kept").is_some());
    assert!(files.is_empty());
}
