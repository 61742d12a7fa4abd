//! Expiry Sweep Task
//!
//! Background task that periodically removes expired cache entries.

use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::cache::{Clock, FileCache, MemCache};
use crate::error::Result;

// == Sweep Trait ==
/// A cache that can drop its expired entries on demand.
pub trait Sweep: Send + Sync {
    /// Removes expired entries, waiting at most `lock_timeout` for each lock
    /// acquisition. Returns how many entries were removed.
    fn sweep(&self, lock_timeout: Duration) -> Result<usize>;
}

impl<K, V, C> Sweep for MemCache<K, V, C>
where
    K: Eq + Hash + Clone + Send + Sync,
    V: Clone + Send + Sync,
    C: Clock,
{
    fn sweep(&self, lock_timeout: Duration) -> Result<usize> {
        self.try_purge_expired(lock_timeout)
    }
}

impl<C: Clock> Sweep for FileCache<C> {
    fn sweep(&self, lock_timeout: Duration) -> Result<usize> {
        self.try_purge_expired(lock_timeout)
    }
}

/// A named cache handed to the sweeper.
#[derive(Clone)]
pub struct SweepTarget {
    pub name: &'static str,
    pub cache: Arc<dyn Sweep>,
}

impl SweepTarget {
    pub fn new(name: &'static str, cache: Arc<dyn Sweep>) -> Self {
        Self { name, cache }
    }
}

/// Sweep schedule.
#[derive(Debug, Clone, Copy)]
pub struct SweepConfig {
    /// Time between sweeps; zero disables the task
    pub interval: Duration,
    /// Longest a sweep waits for a lock before skipping the cycle
    pub lock_timeout: Duration,
}

// == Sweep Handle ==
/// Owner of a running sweep task.
///
/// Dropping the handle also stops the task, but only [`SweepHandle::shutdown`]
/// waits for it to finish.
#[derive(Debug)]
pub struct SweepHandle {
    stop: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl SweepHandle {
    /// True if a task was started and has not yet exited.
    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    /// Signals the task to stop and waits for it to exit.
    pub async fn shutdown(mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        if let Some(task) = self.task.take() {
            if let Err(err) = task.await {
                warn!("Sweep task ended abnormally: {}", err);
            }
        }
    }
}

/// Spawns a background task that periodically sweeps the given caches.
///
/// Each sweep runs on the blocking pool so a slow lock never stalls the
/// runtime. A sweep that cannot get its lock in time is skipped and retried
/// on the next tick.
///
/// # Example
/// ```ignore
/// let kv = Arc::new(MemCache::<String, String>::new());
/// let handle = spawn_sweep_task(
///     vec![SweepTarget::new("kv", kv.clone())],
///     SweepConfig { interval: Duration::from_secs(1), lock_timeout: Duration::from_millis(10) },
/// );
/// // Later, during shutdown:
/// handle.shutdown().await;
/// ```
pub fn spawn_sweep_task(targets: Vec<SweepTarget>, config: SweepConfig) -> SweepHandle {
    if config.interval.is_zero() || targets.is_empty() {
        info!("Background sweep disabled");
        return SweepHandle {
            stop: None,
            task: None,
        };
    }

    let (stop_tx, mut stop_rx) = oneshot::channel::<()>();

    let task = tokio::spawn(async move {
        info!(
            "Starting expiry sweep task with interval of {:?} over {} cache(s)",
            config.interval,
            targets.len()
        );

        let mut ticker = tokio::time::interval(config.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // The first tick completes immediately
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = &mut stop_rx => {
                    info!("Expiry sweep task stopping");
                    break;
                }
                _ = ticker.tick() => {
                    for target in &targets {
                        sweep_once(target, config.lock_timeout).await;
                    }
                }
            }
        }
    });

    SweepHandle {
        stop: Some(stop_tx),
        task: Some(task),
    }
}

async fn sweep_once(target: &SweepTarget, lock_timeout: Duration) {
    let cache = Arc::clone(&target.cache);
    let outcome = tokio::task::spawn_blocking(move || cache.sweep(lock_timeout)).await;

    match outcome {
        Ok(Ok(0)) => debug!(cache = target.name, "Sweep: no expired entries found"),
        Ok(Ok(removed)) => info!(cache = target.name, "Sweep: removed {} expired entries", removed),
        Ok(Err(err)) if err.is_transient() => {
            debug!(cache = target.name, "Sweep skipped: {}", err)
        }
        Ok(Err(err)) => warn!(cache = target.name, "Sweep failed: {}", err),
        Err(err) => warn!(cache = target.name, "Sweep worker panicked: {}", err),
    }
}
